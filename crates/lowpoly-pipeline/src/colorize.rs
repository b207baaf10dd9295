//! Per-triangle flat colors from prefix sums.
//!
//! Each triangle is colored with the mean of the source pixels inside its
//! bounding box. Three prefix-sum tables (one per channel) are built in a
//! single pass, after which any box sum is four table lookups, so the cost
//! per triangle is constant regardless of its size.
//!
//! Triangles are independent and the tables are read-only once built, so
//! aggregation fans out over a rayon pool with no locking: every worker
//! returns its own `Result`, and the results are gathered afterwards.
//! A triangle that cannot be colored comes back as a [`SkipReason`] and is
//! left out of the output; it never aborts the pass.

use image::RgbImage;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::types::{ColoredTriangle, Dimensions, Triangle};

/// Why a triangle was left out of the colored output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkipReason {
    /// The bounding box, clipped to the image, contains no pixels.
    DegenerateBox,
    /// An arithmetic or lookup fault while summing the box (non-finite
    /// vertex, overflow, out-of-range cell, or a mean above 255).
    AggregationFault,
}

/// Number of skipped triangles per [`SkipReason`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SkipCounts {
    /// Triangles skipped with [`SkipReason::DegenerateBox`].
    pub degenerate_box: usize,
    /// Triangles skipped with [`SkipReason::AggregationFault`].
    pub aggregation_fault: usize,
}

impl SkipCounts {
    /// Count one skipped triangle.
    pub const fn record(&mut self, reason: SkipReason) {
        match reason {
            SkipReason::DegenerateBox => self.degenerate_box += 1,
            SkipReason::AggregationFault => self.aggregation_fault += 1,
        }
    }

    /// Total skipped triangles.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.degenerate_box + self.aggregation_fault
    }
}

/// Inclusive pixel rectangle `[min_x, max_x] x [min_y, max_y]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Leftmost pixel column.
    pub min_x: u32,
    /// Rightmost pixel column (inclusive).
    pub max_x: u32,
    /// Topmost pixel row.
    pub min_y: u32,
    /// Bottom pixel row (inclusive).
    pub max_y: u32,
}

impl BoundingBox {
    /// Bounding box of `triangle` in pixel coordinates, clipped to the
    /// image.
    ///
    /// Vertex coordinates are truncated to whole pixels first, so a vertex
    /// on the far image border (`x == width`) lands in the last column.
    ///
    /// # Errors
    ///
    /// [`SkipReason::AggregationFault`] for non-finite vertices,
    /// [`SkipReason::DegenerateBox`] when nothing of the box remains
    /// inside the image.
    pub fn clipped(triangle: &Triangle, dimensions: Dimensions) -> Result<Self, SkipReason> {
        if dimensions.width == 0 || dimensions.height == 0 {
            return Err(SkipReason::DegenerateBox);
        }
        if triangle
            .vertices
            .iter()
            .any(|v| !v.x.is_finite() || !v.y.is_finite())
        {
            return Err(SkipReason::AggregationFault);
        }

        let xs = triangle.vertices.map(|v| v.x.trunc());
        let ys = triangle.vertices.map(|v| v.y.trunc());
        let (min_x, max_x) = clip_span(&xs, dimensions.width - 1)?;
        let (min_y, max_y) = clip_span(&ys, dimensions.height - 1)?;
        Ok(Self {
            min_x,
            max_x,
            min_y,
            max_y,
        })
    }

    /// Number of pixels in the box.
    #[must_use]
    pub fn pixel_count(&self) -> u64 {
        u64::from(self.max_x - self.min_x + 1) * u64::from(self.max_y - self.min_y + 1)
    }
}

/// Clamp the span of `coords` to `[0, last]`, failing if it lies entirely
/// outside.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn clip_span(coords: &[f64; 3], last: u32) -> Result<(u32, u32), SkipReason> {
    let lo = coords.iter().copied().fold(f64::INFINITY, f64::min);
    let hi = coords.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let lo = lo.max(0.0);
    let hi = hi.min(f64::from(last));
    if hi < lo {
        return Err(SkipReason::DegenerateBox);
    }
    // Both values are whole numbers in [0, last] here.
    Ok((lo as u32, hi as u32))
}

/// One channel's summed-area table.
///
/// Cell `(row, col)` holds the sum of the channel over columns `[0, col)`
/// and rows `[0, row)`, so row 0 and column 0 are all zero and the table
/// is `(width + 1) x (height + 1)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefixSumChannel {
    stride: usize,
    rows: usize,
    cells: Vec<u64>,
}

impl PrefixSumChannel {
    fn zeroed(dimensions: Dimensions) -> Self {
        let stride = dimensions.width as usize + 1;
        let rows = dimensions.height as usize + 1;
        Self {
            stride,
            rows,
            cells: vec![0; stride * rows],
        }
    }

    /// The accumulated value at `(row, col)`, or `None` if out of range.
    #[must_use]
    pub fn cell(&self, row: usize, col: usize) -> Option<u64> {
        if row >= self.rows || col >= self.stride {
            return None;
        }
        self.cells.get(row * self.stride + col).copied()
    }

    /// Sum of the channel over an inclusive pixel box.
    ///
    /// Returns `None` if the box reaches outside the table or the
    /// arithmetic overflows.
    #[must_use]
    pub fn box_sum(&self, bbox: &BoundingBox) -> Option<u64> {
        let x0 = bbox.min_x as usize;
        let y0 = bbox.min_y as usize;
        let x1 = (bbox.max_x as usize).checked_add(1)?;
        let y1 = (bbox.max_y as usize).checked_add(1)?;

        let total = self.cell(y1, x1)?;
        let left = self.cell(y1, x0)?;
        let above = self.cell(y0, x1)?;
        let corner = self.cell(y0, x0)?;
        // Add the corner back first so no intermediate goes negative.
        total.checked_add(corner)?.checked_sub(left)?.checked_sub(above)
    }
}

/// Red, green and blue summed-area tables for one image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefixSums {
    dimensions: Dimensions,
    channels: [PrefixSumChannel; 3],
}

impl PrefixSums {
    /// Build all three tables in one pass over the image.
    #[must_use]
    pub fn new(image: &RgbImage) -> Self {
        let dimensions = Dimensions {
            width: image.width(),
            height: image.height(),
        };
        let mut channels: [PrefixSumChannel; 3] =
            std::array::from_fn(|_| PrefixSumChannel::zeroed(dimensions));
        let stride = dimensions.width as usize + 1;

        for (y, row) in image.rows().enumerate() {
            let mut running = [0u64; 3];
            for (x, pixel) in row.enumerate() {
                let above = y * stride + x + 1;
                let here = above + stride;
                for (c, channel) in channels.iter_mut().enumerate() {
                    running[c] += u64::from(pixel.0[c]);
                    channel.cells[here] = channel.cells[above] + running[c];
                }
            }
        }

        Self {
            dimensions,
            channels,
        }
    }

    /// Dimensions of the image the tables were built from.
    #[must_use]
    pub const fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    /// The table for channel `index` (0 = red, 1 = green, 2 = blue).
    #[must_use]
    pub fn channel(&self, index: usize) -> Option<&PrefixSumChannel> {
        self.channels.get(index)
    }

    /// Mean color over an inclusive box, each channel truncated.
    ///
    /// # Errors
    ///
    /// [`SkipReason::AggregationFault`] if any lookup or division fails.
    pub fn box_mean(&self, bbox: &BoundingBox) -> Result<[u8; 3], SkipReason> {
        let count = bbox.pixel_count();
        let mut color = [0u8; 3];
        for (slot, channel) in color.iter_mut().zip(&self.channels) {
            let sum = channel
                .box_sum(bbox)
                .ok_or(SkipReason::AggregationFault)?;
            let mean = sum
                .checked_div(count)
                .ok_or(SkipReason::AggregationFault)?;
            *slot = u8::try_from(mean).map_err(|_| SkipReason::AggregationFault)?;
        }
        Ok(color)
    }
}

/// Color a single triangle.
///
/// # Errors
///
/// Returns the [`SkipReason`] when the triangle cannot be colored.
pub fn color_triangle(
    sums: &PrefixSums,
    triangle: &Triangle,
) -> Result<ColoredTriangle, SkipReason> {
    let bbox = BoundingBox::clipped(triangle, sums.dimensions())?;
    let color = sums.box_mean(&bbox)?;
    Ok(ColoredTriangle {
        triangle: *triangle,
        color,
    })
}

/// Thread pool used for color aggregation.
#[derive(Debug)]
pub enum WorkerPool {
    /// Rayon's global pool.
    Global,
    /// A dedicated pool with a fixed number of threads.
    Dedicated(rayon::ThreadPool),
}

impl WorkerPool {
    /// Pool for the configured thread count.
    ///
    /// `None` or `Some(0)` selects the global pool. If a dedicated pool
    /// cannot be built, the global pool is used instead.
    #[must_use]
    pub fn new(threads: Option<usize>) -> Self {
        match threads {
            None | Some(0) => Self::Global,
            Some(n) => match rayon::ThreadPoolBuilder::new()
                .num_threads(n)
                .thread_name(|i| format!("lowpoly-colorize-{i}"))
                .build()
            {
                Ok(pool) => Self::Dedicated(pool),
                Err(err) => {
                    tracing::warn!(threads = n, %err, "falling back to global thread pool");
                    Self::Global
                }
            },
        }
    }

    /// Number of worker threads the pool runs.
    #[must_use]
    pub fn threads(&self) -> usize {
        match self {
            Self::Global => rayon::current_num_threads(),
            Self::Dedicated(pool) => pool.current_num_threads(),
        }
    }

    /// Run `op` inside the pool.
    pub fn install<OP, R>(&self, op: OP) -> R
    where
        OP: FnOnce() -> R + Send,
        R: Send,
    {
        match self {
            Self::Global => op(),
            Self::Dedicated(pool) => pool.install(op),
        }
    }
}

/// Colored triangles plus the tally of those left out.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColorizeOutcome {
    /// Triangles that received a color.
    pub colored: Vec<ColoredTriangle>,
    /// Triangles skipped, by reason.
    pub skipped: SkipCounts,
}

/// Color every triangle from the source image.
///
/// Builds the prefix sums once, then colors triangles in parallel on
/// `pool`. Skipped triangles are counted and dropped.
#[must_use]
pub fn colorize(image: &RgbImage, triangles: &[Triangle], pool: &WorkerPool) -> ColorizeOutcome {
    let sums = PrefixSums::new(image);
    let results: Vec<Result<ColoredTriangle, SkipReason>> = pool.install(|| {
        triangles
            .par_iter()
            .map(|triangle| color_triangle(&sums, triangle))
            .collect()
    });

    let mut outcome = ColorizeOutcome {
        colored: Vec::with_capacity(results.len()),
        skipped: SkipCounts::default(),
    };
    for result in results {
        match result {
            Ok(colored) => outcome.colored.push(colored),
            Err(reason) => outcome.skipped.record(reason),
        }
    }

    if outcome.skipped.total() > 0 {
        tracing::debug!(
            degenerate_box = outcome.skipped.degenerate_box,
            aggregation_fault = outcome.skipped.aggregation_fault,
            "skipped triangles during color aggregation"
        );
    }
    outcome
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::Point;

    /// 7x5 image with distinct values in every channel.
    #[allow(clippy::cast_possible_truncation)]
    fn test_image() -> RgbImage {
        RgbImage::from_fn(7, 5, |x, y| {
            image::Rgb([
                (x * 37 + y * 11) as u8,
                (x * 5 + y * 50) as u8,
                (255 - x * 20 - y * 13) as u8,
            ])
        })
    }

    fn brute_force_mean(image: &RgbImage, bbox: &BoundingBox) -> [u8; 3] {
        let mut sums = [0u64; 3];
        for y in bbox.min_y..=bbox.max_y {
            for x in bbox.min_x..=bbox.max_x {
                let p = image.get_pixel(x, y).0;
                for c in 0..3 {
                    sums[c] += u64::from(p[c]);
                }
            }
        }
        let count = bbox.pixel_count();
        sums.map(|s| u8::try_from(s / count).unwrap())
    }

    fn tri(a: (f64, f64), b: (f64, f64), c: (f64, f64)) -> Triangle {
        Triangle::new(
            Point::new(a.0, a.1),
            Point::new(b.0, b.1),
            Point::new(c.0, c.1),
        )
    }

    #[test]
    fn first_row_and_column_are_zero() {
        let sums = PrefixSums::new(&test_image());
        for c in 0..3 {
            let channel = sums.channel(c).unwrap();
            for col in 0..=7 {
                assert_eq!(channel.cell(0, col), Some(0));
            }
            for row in 0..=5 {
                assert_eq!(channel.cell(row, 0), Some(0));
            }
            assert_eq!(channel.cell(6, 0), None);
            assert_eq!(channel.cell(0, 8), None);
        }
    }

    #[test]
    fn full_table_cell_is_channel_total() {
        let img = test_image();
        let sums = PrefixSums::new(&img);
        let red_total: u64 = img.pixels().map(|p| u64::from(p.0[0])).sum();
        assert_eq!(sums.channel(0).unwrap().cell(5, 7), Some(red_total));
    }

    #[test]
    fn box_sums_match_brute_force_for_every_box() {
        let img = test_image();
        let sums = PrefixSums::new(&img);
        for min_y in 0..5 {
            for max_y in min_y..5 {
                for min_x in 0..7 {
                    for max_x in min_x..7 {
                        let bbox = BoundingBox {
                            min_x,
                            max_x,
                            min_y,
                            max_y,
                        };
                        assert_eq!(
                            sums.box_mean(&bbox).unwrap(),
                            brute_force_mean(&img, &bbox),
                            "mismatch for {bbox:?}",
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn box_sum_outside_table_is_none() {
        let sums = PrefixSums::new(&test_image());
        let bbox = BoundingBox {
            min_x: 0,
            max_x: 7,
            min_y: 0,
            max_y: 1,
        };
        assert_eq!(sums.channel(1).unwrap().box_sum(&bbox), None);
        assert_eq!(sums.box_mean(&bbox), Err(SkipReason::AggregationFault));
    }

    #[test]
    fn triangle_color_is_mean_of_clipped_bounding_box() {
        let img = test_image();
        let sums = PrefixSums::new(&img);
        let t = tri((1.7, 0.2), (5.9, 3.8), (2.0, 4.0));
        let colored = color_triangle(&sums, &t).unwrap();
        let bbox = BoundingBox {
            min_x: 1,
            max_x: 5,
            min_y: 0,
            max_y: 4,
        };
        assert_eq!(BoundingBox::clipped(&t, sums.dimensions()), Ok(bbox));
        assert_eq!(colored.color, brute_force_mean(&img, &bbox));
        assert_eq!(colored.triangle, t);
    }

    #[test]
    fn far_border_vertices_clip_to_last_pixel() {
        let sums = PrefixSums::new(&test_image());
        let t = tri((0.0, 0.0), (7.0, 0.0), (7.0, 5.0));
        let bbox = BoundingBox::clipped(&t, sums.dimensions()).unwrap();
        assert_eq!(
            bbox,
            BoundingBox {
                min_x: 0,
                max_x: 6,
                min_y: 0,
                max_y: 4,
            }
        );
        assert!(color_triangle(&sums, &t).is_ok());
    }

    #[test]
    fn single_column_triangle_uses_that_column() {
        let img = test_image();
        let sums = PrefixSums::new(&img);
        let t = tri((6.0, 0.0), (7.0, 0.0), (7.0, 5.0));
        let colored = color_triangle(&sums, &t).unwrap();
        let bbox = BoundingBox {
            min_x: 6,
            max_x: 6,
            min_y: 0,
            max_y: 4,
        };
        assert_eq!(colored.color, brute_force_mean(&img, &bbox));
    }

    #[test]
    fn triangle_outside_image_is_degenerate() {
        let sums = PrefixSums::new(&test_image());
        let t = tri((20.0, 1.0), (30.0, 1.0), (25.0, 4.0));
        assert_eq!(color_triangle(&sums, &t), Err(SkipReason::DegenerateBox));
    }

    #[test]
    fn non_finite_vertex_is_an_aggregation_fault() {
        let sums = PrefixSums::new(&test_image());
        let t = tri((f64::NAN, 1.0), (3.0, 1.0), (2.0, 4.0));
        assert_eq!(color_triangle(&sums, &t), Err(SkipReason::AggregationFault));
    }

    #[test]
    fn channels_are_not_swapped() {
        let img = RgbImage::from_pixel(4, 4, image::Rgb([200, 10, 60]));
        let sums = PrefixSums::new(&img);
        let colored = color_triangle(&sums, &tri((0.0, 0.0), (4.0, 0.0), (0.0, 4.0))).unwrap();
        assert_eq!(colored.color, [200, 10, 60]);
    }

    #[test]
    fn repeated_aggregation_is_bit_identical() {
        let sums = PrefixSums::new(&test_image());
        let t = tri((0.5, 0.5), (6.5, 1.5), (3.0, 4.5));
        let first = color_triangle(&sums, &t).unwrap();
        let second = color_triangle(&sums, &t).unwrap();
        assert_eq!(first, second);
        assert_eq!(PrefixSums::new(&test_image()), sums);
    }

    #[test]
    fn colorize_drops_skipped_triangles_and_counts_them() {
        let img = test_image();
        let triangles = vec![
            tri((0.0, 0.0), (7.0, 0.0), (0.0, 5.0)),
            tri((20.0, 1.0), (30.0, 1.0), (25.0, 4.0)),
            tri((f64::INFINITY, 1.0), (3.0, 1.0), (2.0, 4.0)),
            tri((7.0, 0.0), (7.0, 5.0), (0.0, 5.0)),
        ];
        let outcome = colorize(&img, &triangles, &WorkerPool::Global);
        assert_eq!(outcome.colored.len(), 2);
        assert_eq!(outcome.skipped.degenerate_box, 1);
        assert_eq!(outcome.skipped.aggregation_fault, 1);
        assert_eq!(outcome.skipped.total(), 2);
    }

    #[test]
    fn dedicated_pool_matches_sequential_results() {
        let img = test_image();
        let sums = PrefixSums::new(&img);
        let triangles: Vec<Triangle> = (0..40)
            .map(|i| {
                let o = f64::from(i % 6);
                tri((o, 0.0), (o + 1.5, 2.0), (o * 0.5, 4.5))
            })
            .collect();
        let sequential: Vec<ColoredTriangle> = triangles
            .iter()
            .filter_map(|t| color_triangle(&sums, t).ok())
            .collect();

        let pool = WorkerPool::new(Some(2));
        assert_eq!(pool.threads(), 2);
        let outcome = colorize(&img, &triangles, &pool);

        let mut parallel = outcome.colored;
        let mut expected = sequential;
        let key = |c: &ColoredTriangle| {
            (
                c.triangle.vertices[0].x.to_bits(),
                c.triangle.vertices[1].x.to_bits(),
                c.triangle.vertices[2].x.to_bits(),
            )
        };
        parallel.sort_by_key(key);
        expected.sort_by_key(key);
        assert_eq!(parallel, expected);
    }

    #[test]
    fn zero_threads_selects_global_pool() {
        assert!(matches!(WorkerPool::new(Some(0)), WorkerPool::Global));
        assert!(matches!(WorkerPool::new(None), WorkerPool::Global));
    }
}
