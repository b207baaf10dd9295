//! Delaunay triangulation of the sampled point set.
//!
//! Delaunay maximizes the minimum angle over all triangles, so the mesh
//! avoids long slivers that would read as rendering artifacts, and it has
//! no tunable parameters: the same point set always yields the same mesh.
//!
//! The four corners of the image rectangle are inserted alongside the
//! sampled points. The convex hull is then the whole image, so the
//! rendered canvas has no uncovered margin.

use serde::{Deserialize, Serialize};
use spade::{DelaunayTriangulation, Point2, Triangulation};

use crate::types::{Dimensions, Point, Triangle};

/// Triangles with an area at or below this are treated as degenerate.
pub const MIN_TRIANGLE_AREA: f64 = 1e-9;

/// Counts describing one triangulation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TriangulationStats {
    /// Points handed to the triangulator (corners not included).
    pub input_points: usize,
    /// Points rejected before or during insertion (non-finite, outside
    /// the image rectangle, or refused by the triangulation).
    pub rejected_points: usize,
    /// Faces produced by the raw Delaunay triangulation.
    pub raw_faces: usize,
    /// Faces dropped because a vertex fell outside the image.
    pub out_of_bounds: usize,
    /// Faces dropped for having no area.
    pub degenerate: usize,
}

/// The corners of the image rectangle `[0, width] x [0, height]`.
#[must_use]
pub fn boundary_anchors(dimensions: Dimensions) -> [Point; 4] {
    let w = f64::from(dimensions.width);
    let h = f64::from(dimensions.height);
    [
        Point::new(0.0, 0.0),
        Point::new(w, 0.0),
        Point::new(0.0, h),
        Point::new(w, h),
    ]
}

/// Triangulate `points` inside the image rectangle.
///
/// Every returned triangle has all vertices in
/// `[0, width] x [0, height]` and an area above [`MIN_TRIANGLE_AREA`].
/// Output order carries no meaning.
#[must_use]
pub fn triangulate(points: &[Point], dimensions: Dimensions) -> Vec<Triangle> {
    triangulate_with_stats(points, dimensions).0
}

/// Triangulate and report what was inserted and filtered.
#[must_use]
pub fn triangulate_with_stats(
    points: &[Point],
    dimensions: Dimensions,
) -> (Vec<Triangle>, TriangulationStats) {
    let mut stats = TriangulationStats {
        input_points: points.len(),
        ..TriangulationStats::default()
    };
    if dimensions.width == 0 || dimensions.height == 0 {
        stats.rejected_points = points.len();
        return (Vec::new(), stats);
    }

    let mut delaunay: DelaunayTriangulation<Point2<f64>> = DelaunayTriangulation::new();
    for anchor in boundary_anchors(dimensions) {
        // Corners are finite and in range, so insertion cannot fail.
        let _ = delaunay.insert(Point2::new(anchor.x, anchor.y));
    }

    for point in points {
        if !point.is_within(dimensions) {
            stats.rejected_points += 1;
            continue;
        }
        if let Err(err) = delaunay.insert(Point2::new(point.x, point.y)) {
            tracing::trace!(x = point.x, y = point.y, ?err, "point rejected by triangulation");
            stats.rejected_points += 1;
        }
    }

    let mut triangles = Vec::with_capacity(delaunay.num_inner_faces());
    for face in delaunay.inner_faces() {
        stats.raw_faces += 1;
        let [a, b, c] = face.vertices().map(|v| {
            let p = v.position();
            Point::new(p.x, p.y)
        });
        let triangle = Triangle::new(a, b, c);

        if !triangle.is_within(dimensions) {
            stats.out_of_bounds += 1;
            continue;
        }
        if triangle.area() <= MIN_TRIANGLE_AREA {
            stats.degenerate += 1;
            continue;
        }
        triangles.push(triangle);
    }

    tracing::debug!(
        input_points = stats.input_points,
        rejected_points = stats.rejected_points,
        raw_faces = stats.raw_faces,
        kept = triangles.len(),
        "triangulated point set"
    );
    (triangles, stats)
}
