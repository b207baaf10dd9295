//! Shared types for the low-poly image pipeline.

use serde::{Deserialize, Serialize};

/// Re-export `RgbImage` so downstream crates can hand source images to
/// the pipeline and receive canvases back without depending on `image`
/// directly.
pub use image::RgbImage;

/// Re-export `GrayImage` so downstream crates can inspect the edge map
/// without depending on `image` directly.
pub use image::GrayImage;

/// A 2D point in image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal position (pixels from left edge).
    pub x: f64,
    /// Vertical position (pixels from top edge).
    pub y: f64,
}

impl Point {
    /// Create a new point.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Returns `true` if the point lies inside the closed rectangle
    /// `[0, width] x [0, height]`.
    #[must_use]
    pub fn is_within(self, dimensions: Dimensions) -> bool {
        (0.0..=f64::from(dimensions.width)).contains(&self.x)
            && (0.0..=f64::from(dimensions.height)).contains(&self.y)
    }
}

/// Three mesh vertices in image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Triangle {
    /// The corners, in the order the triangulation produced them.
    pub vertices: [Point; 3],
}

impl Triangle {
    /// Create a triangle from its three corners.
    #[must_use]
    pub const fn new(a: Point, b: Point, c: Point) -> Self {
        Self {
            vertices: [a, b, c],
        }
    }

    /// Unsigned area via the shoelace formula.
    #[must_use]
    pub fn area(&self) -> f64 {
        let [a, b, c] = self.vertices;
        let cross = (b.x - a.x).mul_add(c.y - a.y, -((c.x - a.x) * (b.y - a.y)));
        cross.abs() / 2.0
    }

    /// Returns `true` if every vertex lies inside `[0, width] x [0, height]`.
    #[must_use]
    pub fn is_within(&self, dimensions: Dimensions) -> bool {
        self.vertices.iter().all(|v| v.is_within(dimensions))
    }
}

/// A triangle paired with the flat color it is painted with.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColoredTriangle {
    /// Mesh geometry.
    pub triangle: Triangle,
    /// Fill color as `[red, green, blue]`.
    pub color: [u8; 3],
}

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// Dimensions of a source image, rejecting empty images.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidDimensions`] if either side is zero.
    pub fn of(image: &RgbImage) -> Result<Self, PipelineError> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(PipelineError::InvalidDimensions { width, height });
        }
        Ok(Self { width, height })
    }

    /// Total pixel count (`width * height`).
    #[must_use]
    pub fn pixel_count(self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }
}

/// Configuration for the low-poly pipeline.
///
/// `num_points` and `detail_level` are stylistic knobs: out-of-range
/// values are clamped rather than rejected, so the fields are signed to
/// let callers pass zero or negative values straight through. Use
/// [`effective_num_points`](Self::effective_num_points) and
/// [`effective_detail_level`](Self::effective_detail_level) to read the
/// values the stages actually use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Total feature point budget. Clamped to at least
    /// [`sample::MIN_NUM_POINTS`](crate::sample::MIN_NUM_POINTS).
    pub num_points: i64,

    /// Edge detail level. Clamped to
    /// [`edge::MIN_DETAIL_LEVEL`](crate::edge::MIN_DETAIL_LEVEL)..=
    /// [`edge::MAX_DETAIL_LEVEL`](crate::edge::MAX_DETAIL_LEVEL).
    /// Controls the smoothing kernel applied before edge detection.
    pub detail_level: i64,

    /// Seed for the point sampler. `None` draws a fresh seed from the
    /// operating system on every run.
    pub seed: Option<u64>,

    /// Number of worker threads for per-triangle color aggregation.
    /// `None` (or zero) uses the global rayon pool.
    pub worker_threads: Option<usize>,

    /// Width in pixels of the same-color outline painted around each
    /// triangle to soften its anti-aliased edges. Zero disables it.
    pub seam_width: f32,

    /// Canvas color visible wherever no triangle is painted.
    pub background: [u8; 3],
}

impl PipelineConfig {
    /// Default feature point budget.
    pub const DEFAULT_NUM_POINTS: i64 = 1000;
    /// Default edge detail level.
    pub const DEFAULT_DETAIL_LEVEL: i64 = 5;
    /// Default seam stroke width in pixels.
    pub const DEFAULT_SEAM_WIDTH: f32 = 1.0;
    /// Default canvas background (white).
    pub const DEFAULT_BACKGROUND: [u8; 3] = [255, 255, 255];

    /// The point budget after clamping.
    #[must_use]
    pub fn effective_num_points(&self) -> usize {
        crate::sample::clamp_num_points(self.num_points)
    }

    /// The detail level after clamping.
    #[must_use]
    pub fn effective_detail_level(&self) -> u8 {
        crate::edge::clamp_detail_level(self.detail_level)
    }

    /// Renderer options derived from this configuration.
    #[must_use]
    pub const fn render_options(&self) -> crate::render::RenderOptions {
        crate::render::RenderOptions {
            background: self.background,
            seam_width: self.seam_width,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            num_points: Self::DEFAULT_NUM_POINTS,
            detail_level: Self::DEFAULT_DETAIL_LEVEL,
            seed: None,
            worker_threads: None,
            seam_width: Self::DEFAULT_SEAM_WIDTH,
            background: Self::DEFAULT_BACKGROUND,
        }
    }
}

/// Result of running the full pipeline.
#[derive(Debug, Clone)]
pub struct ProcessResult {
    /// The rendered low-poly canvas, same size as the source.
    pub image: RgbImage,

    /// Dimensions of the source image in pixels.
    pub dimensions: Dimensions,

    /// Number of triangles painted onto the canvas.
    pub triangle_count: usize,
}

/// Result of running the pipeline with all intermediate stage outputs
/// preserved.
///
/// Each field captures the output of one pipeline stage so callers can
/// inspect or visualize every step of the mesh construction.
#[derive(Debug, Clone)]
pub struct StagedResult {
    /// Stage 0: decoded source image.
    pub original: RgbImage,
    /// Stage 1: binary edge map (255 = edge).
    pub edges: GrayImage,
    /// Stage 1: feature points taken from the edge map.
    pub edge_points: Vec<Point>,
    /// Stage 2: the sampled point set fed to the triangulator.
    pub points: Vec<Point>,
    /// Stage 2: how the point budget was split.
    pub budget: crate::sample::PointBudget,
    /// Stage 3: filtered Delaunay triangles.
    pub triangles: Vec<Triangle>,
    /// Stage 4: triangles that received a color.
    pub colored: Vec<ColoredTriangle>,
    /// Stage 4: triangles dropped during color aggregation, by reason.
    pub skipped: crate::colorize::SkipCounts,
    /// Stage 5: the rendered canvas.
    pub canvas: RgbImage,
    /// Source image dimensions in pixels.
    pub dimensions: Dimensions,
}

impl StagedResult {
    /// Consumes the staged result, keeping only the final output.
    #[must_use]
    pub fn into_process_result(self) -> ProcessResult {
        ProcessResult {
            image: self.canvas,
            dimensions: self.dimensions,
            triangle_count: self.colored.len(),
        }
    }
}

/// Errors that can occur during pipeline processing.
///
/// Only input problems surface as errors. Degenerate geometry and
/// aggregation faults are handled inside their stages and reported
/// through diagnostics instead.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Failed to decode the input image.
    #[error("failed to decode image: {0}")]
    ImageDecode(#[from] image::ImageError),

    /// The input image bytes were empty.
    #[error("input image data is empty")]
    EmptyInput,

    /// The input is not a JPEG or PNG image.
    #[error("unsupported image format: {0}")]
    UnsupportedFormat(String),

    /// The image has zero width or height.
    #[error("invalid image dimensions {width}x{height}")]
    InvalidDimensions {
        /// Width in pixels.
        width: u32,
        /// Height in pixels.
        height: u32,
    },

    /// Encoding the rendered canvas failed.
    #[error("failed to encode image: {0}")]
    ImageEncode(String),
}
