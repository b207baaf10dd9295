//! Paint colored triangles onto a fresh canvas.
//!
//! Triangles are painted in input order, so where two overlap the later
//! one wins. Each triangle is first filled without anti-aliasing, which
//! covers every pixel whose center it contains, so the mesh leaves no
//! background showing through. An anti-aliased fill and a thin same-color
//! stroke then smooth its edges.

use image::RgbImage;
use tiny_skia::{Color, FillRule, LineJoin, Paint, Path, PathBuilder, Pixmap, Stroke, Transform};

use crate::types::{ColoredTriangle, Triangle};

/// Canvas settings for [`render`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderOptions {
    /// Color wherever no triangle is painted.
    pub background: [u8; 3],
    /// Width of the same-color seam stroke. Zero (or any non-positive or
    /// non-finite value) disables it.
    pub seam_width: f32,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            background: [255, 255, 255],
            seam_width: 1.0,
        }
    }
}

/// Render `triangles` onto a `width x height` canvas.
///
/// The canvas starts as `options.background`. Triangles whose path cannot
/// be built (non-finite vertices) are skipped.
#[must_use]
pub fn render(
    width: u32,
    height: u32,
    triangles: &[ColoredTriangle],
    options: &RenderOptions,
) -> RgbImage {
    let [br, bg, bb] = options.background;
    let Some(mut pixmap) = Pixmap::new(width, height) else {
        if width > 0 && height > 0 {
            tracing::warn!(width, height, "could not allocate canvas, returning background");
        }
        return RgbImage::from_pixel(width, height, image::Rgb(options.background));
    };
    pixmap.fill(Color::from_rgba8(br, bg, bb, 255));

    let seam = (options.seam_width.is_finite() && options.seam_width > 0.0).then(|| Stroke {
        width: options.seam_width,
        line_join: LineJoin::Round,
        ..Stroke::default()
    });

    let mut painted = 0usize;
    for colored in triangles {
        let Some(path) = triangle_path(&colored.triangle) else {
            continue;
        };
        let [r, g, b] = colored.color;
        let mut paint = Paint::default();
        paint.set_color_rgba8(r, g, b, 255);

        paint.anti_alias = false;
        pixmap.fill_path(&path, &paint, FillRule::Winding, Transform::identity(), None);
        paint.anti_alias = true;
        pixmap.fill_path(&path, &paint, FillRule::Winding, Transform::identity(), None);
        if let Some(stroke) = &seam {
            pixmap.stroke_path(&path, &paint, stroke, Transform::identity(), None);
        }
        painted += 1;
    }
    tracing::debug!(painted, total = triangles.len(), "rendered canvas");

    into_rgb(&pixmap)
}

#[allow(clippy::cast_possible_truncation)]
fn triangle_path(triangle: &Triangle) -> Option<Path> {
    let [a, b, c] = triangle.vertices;
    let mut pb = PathBuilder::new();
    pb.move_to(a.x as f32, a.y as f32);
    pb.line_to(b.x as f32, b.y as f32);
    pb.line_to(c.x as f32, c.y as f32);
    pb.close();
    pb.finish()
}

/// Drop the alpha channel. The background fill is opaque and every paint
/// is opaque, so the premultiplied data is already straight RGB.
fn into_rgb(pixmap: &Pixmap) -> RgbImage {
    let mut img = RgbImage::new(pixmap.width(), pixmap.height());
    for (pixel, rgba) in img.pixels_mut().zip(pixmap.data().chunks_exact(4)) {
        *pixel = image::Rgb([rgba[0], rgba[1], rgba[2]]);
    }
    img
}
