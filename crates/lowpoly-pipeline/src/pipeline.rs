//! Incremental pipeline: advance stage-by-stage, inspecting each
//! intermediate result before continuing.
//!
//! Unlike [`crate::process_staged`] which runs the entire pipeline in one
//! call, [`Pipeline`] lets the caller drive execution one step at a time:
//!
//! ```rust
//! # use lowpoly_pipeline::{Pipeline, PipelineConfig, PipelineError};
//! # fn run(jpeg: Vec<u8>) -> Result<(), PipelineError> {
//! let config = PipelineConfig::default();
//! let staged = Pipeline::new(jpeg, config)
//!     .decode()?
//!     .extract_edges()
//!     .sample_points()
//!     .triangulate()
//!     .colorize()
//!     .render()
//!     .into_result();
//! # Ok(())
//! # }
//! ```
//!
//! Each stage method consumes `self` and returns the next pipeline state,
//! carrying every previously computed intermediate forward. Earlier
//! outputs are never modified by later stages. Only decoding can fail;
//! every later stage recovers from degenerate input locally and reports
//! what it dropped through [`StageMetrics`].

use rand::Rng;

use crate::colorize::{SkipCounts, WorkerPool};
use crate::diagnostics::StageMetrics;
use crate::edge::EdgeDetection;
use crate::sample::PointBudget;
use crate::triangulate::TriangulationStats;
use crate::types::{
    ColoredTriangle, Dimensions, GrayImage, PipelineConfig, PipelineError, Point, RgbImage,
    StagedResult, Triangle,
};

// ───────────────────────── Stage 0: Pending ──────────────────────────

/// Pipeline state before any processing has occurred.
///
/// The source image bytes and config are stored but not yet touched.
/// Call [`decode`](Self::decode) to advance to the next stage.
#[must_use = "pipeline stages are consumed by advancing, call .decode() to continue"]
pub struct Pending {
    config: PipelineConfig,
    source: Vec<u8>,
}

impl Pending {
    /// The raw source image bytes.
    #[must_use]
    pub fn source(&self) -> &[u8] {
        &self.source
    }

    /// Decode the source image and advance to the [`Decoded`] stage.
    ///
    /// # Errors
    ///
    /// Any error from [`crate::codec::decode`]: empty input, a format
    /// other than JPEG or PNG, corrupt data, or a zero-sized image.
    pub fn decode(self) -> Result<Decoded, PipelineError> {
        let _span = tracing::debug_span!("decode").entered();
        let original = crate::codec::decode(&self.source)?;
        let dimensions = Dimensions::of(&original)?;
        Ok(Decoded {
            config: self.config,
            original,
            dimensions,
            source_len: self.source.len(),
        })
    }
}

// ───────────────────────── Stage 1: Decoded ──────────────────────────

/// Pipeline state holding the source image.
///
/// Call [`extract_edges`](Self::extract_edges) to advance.
#[must_use = "pipeline stages are consumed by advancing, call .extract_edges() to continue"]
pub struct Decoded {
    config: PipelineConfig,
    original: RgbImage,
    dimensions: Dimensions,
    source_len: usize,
}

impl Decoded {
    /// The decoded source image.
    #[must_use]
    pub const fn original(&self) -> &RgbImage {
        &self.original
    }

    /// Source image dimensions.
    #[must_use]
    pub const fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    /// Detect edges and collect edge pixels as feature points.
    pub fn extract_edges(self) -> EdgesExtracted {
        let _span = tracing::debug_span!("edge_extraction").entered();
        let requested = self.config.detail_level;
        let detail_level = self.config.effective_detail_level();
        if i64::from(detail_level) != requested {
            tracing::debug!(requested, detail_level, "clamped detail level");
        }

        let detection = crate::edge::detect(&self.original, detail_level);
        let edge_points = crate::edge::edge_points(&detection.edges);
        EdgesExtracted {
            config: self.config,
            original: self.original,
            dimensions: self.dimensions,
            detection,
            edge_points,
        }
    }
}

// ───────────────────────── Stage 2: EdgesExtracted ───────────────────

/// Pipeline state after edge extraction.
///
/// Call [`sample_points`](Self::sample_points) (or
/// [`sample_points_with`](Self::sample_points_with) to supply the random
/// generator) to advance.
#[must_use = "pipeline stages are consumed by advancing, call .sample_points() to continue"]
pub struct EdgesExtracted {
    config: PipelineConfig,
    original: RgbImage,
    dimensions: Dimensions,
    detection: EdgeDetection,
    edge_points: Vec<Point>,
}

impl EdgesExtracted {
    /// The binary edge map.
    #[must_use]
    pub const fn edges(&self) -> &GrayImage {
        &self.detection.edges
    }

    /// Parameters and thresholds the edge detector ran with.
    #[must_use]
    pub const fn detection(&self) -> &EdgeDetection {
        &self.detection
    }

    /// One feature point per edge pixel.
    #[must_use]
    pub fn edge_points(&self) -> &[Point] {
        &self.edge_points
    }

    /// Sample the point set with a generator seeded from
    /// [`PipelineConfig::seed`] (or from entropy when unset).
    pub fn sample_points(self) -> PointsSampled {
        let mut rng = crate::sample::rng_from_seed(self.config.seed);
        self.sample_points_with(&mut rng)
    }

    /// Sample the point set using the caller's random generator.
    pub fn sample_points_with<R: Rng + ?Sized>(self, rng: &mut R) -> PointsSampled {
        let _span = tracing::debug_span!("sampling").entered();
        let requested = self.config.num_points;
        let num_points = self.config.effective_num_points();
        if i64::try_from(num_points).ok() != Some(requested) {
            tracing::debug!(requested, num_points, "clamped point budget");
        }

        let (points, budget) =
            crate::sample::sample_with_budget(&self.edge_points, self.dimensions, num_points, rng);
        PointsSampled {
            config: self.config,
            original: self.original,
            dimensions: self.dimensions,
            detection: self.detection,
            edge_points: self.edge_points,
            points,
            budget,
        }
    }
}

// ───────────────────────── Stage 3: PointsSampled ────────────────────

/// Pipeline state after point sampling.
///
/// Call [`triangulate`](Self::triangulate) to advance.
#[must_use = "pipeline stages are consumed by advancing, call .triangulate() to continue"]
pub struct PointsSampled {
    config: PipelineConfig,
    original: RgbImage,
    dimensions: Dimensions,
    detection: EdgeDetection,
    edge_points: Vec<Point>,
    points: Vec<Point>,
    budget: PointBudget,
}

impl PointsSampled {
    /// The sampled point set.
    #[must_use]
    pub fn points(&self) -> &[Point] {
        &self.points
    }

    /// How the point budget was split.
    #[must_use]
    pub const fn budget(&self) -> PointBudget {
        self.budget
    }

    /// Build the Delaunay mesh over the sampled points.
    pub fn triangulate(self) -> Triangulated {
        let _span = tracing::debug_span!("triangulation").entered();
        let (triangles, stats) =
            crate::triangulate::triangulate_with_stats(&self.points, self.dimensions);
        Triangulated {
            config: self.config,
            original: self.original,
            dimensions: self.dimensions,
            detection: self.detection,
            edge_points: self.edge_points,
            points: self.points,
            budget: self.budget,
            triangles,
            stats,
        }
    }
}

// ───────────────────────── Stage 4: Triangulated ─────────────────────

/// Pipeline state after triangulation.
///
/// Call [`colorize`](Self::colorize) to advance.
#[must_use = "pipeline stages are consumed by advancing, call .colorize() to continue"]
pub struct Triangulated {
    config: PipelineConfig,
    original: RgbImage,
    dimensions: Dimensions,
    detection: EdgeDetection,
    edge_points: Vec<Point>,
    points: Vec<Point>,
    budget: PointBudget,
    triangles: Vec<Triangle>,
    stats: TriangulationStats,
}

impl Triangulated {
    /// The filtered mesh.
    #[must_use]
    pub fn triangles(&self) -> &[Triangle] {
        &self.triangles
    }

    /// Counts of inserted and filtered geometry.
    #[must_use]
    pub const fn stats(&self) -> TriangulationStats {
        self.stats
    }

    /// Color every triangle on a pool sized by
    /// [`PipelineConfig::worker_threads`].
    pub fn colorize(self) -> Colorized {
        let pool = WorkerPool::new(self.config.worker_threads);
        self.colorize_with(&pool)
    }

    /// Color every triangle on the given pool.
    pub fn colorize_with(self, pool: &WorkerPool) -> Colorized {
        let _span = tracing::debug_span!("colorization").entered();
        let outcome = crate::colorize::colorize(&self.original, &self.triangles, pool);
        Colorized {
            config: self.config,
            original: self.original,
            dimensions: self.dimensions,
            detection: self.detection,
            edge_points: self.edge_points,
            points: self.points,
            budget: self.budget,
            triangles: self.triangles,
            colored: outcome.colored,
            skipped: outcome.skipped,
            worker_threads: pool.threads(),
        }
    }
}

// ───────────────────────── Stage 5: Colorized ────────────────────────

/// Pipeline state after color aggregation.
///
/// Call [`render`](Self::render) to advance.
#[must_use = "pipeline stages are consumed by advancing, call .render() to continue"]
pub struct Colorized {
    config: PipelineConfig,
    original: RgbImage,
    dimensions: Dimensions,
    detection: EdgeDetection,
    edge_points: Vec<Point>,
    points: Vec<Point>,
    budget: PointBudget,
    triangles: Vec<Triangle>,
    colored: Vec<ColoredTriangle>,
    skipped: SkipCounts,
    worker_threads: usize,
}

impl Colorized {
    /// Triangles that received a color.
    #[must_use]
    pub fn colored(&self) -> &[ColoredTriangle] {
        &self.colored
    }

    /// Triangles dropped during aggregation, by reason.
    #[must_use]
    pub const fn skipped(&self) -> SkipCounts {
        self.skipped
    }

    /// Paint the colored triangles onto a fresh canvas.
    pub fn render(self) -> Rendered {
        let _span = tracing::debug_span!("rendering").entered();
        let canvas = crate::render::render(
            self.dimensions.width,
            self.dimensions.height,
            &self.colored,
            &self.config.render_options(),
        );
        Rendered {
            config: self.config,
            original: self.original,
            dimensions: self.dimensions,
            detection: self.detection,
            edge_points: self.edge_points,
            points: self.points,
            budget: self.budget,
            triangles: self.triangles,
            colored: self.colored,
            skipped: self.skipped,
            canvas,
        }
    }
}

// ───────────────────────── Stage 6: Rendered ─────────────────────────

/// Final pipeline state: the canvas is painted.
#[must_use = "call .into_result() or .into_canvas() to take the output"]
pub struct Rendered {
    config: PipelineConfig,
    original: RgbImage,
    dimensions: Dimensions,
    detection: EdgeDetection,
    edge_points: Vec<Point>,
    points: Vec<Point>,
    budget: PointBudget,
    triangles: Vec<Triangle>,
    colored: Vec<ColoredTriangle>,
    skipped: SkipCounts,
    canvas: RgbImage,
}

impl Rendered {
    /// The low-poly canvas.
    #[must_use]
    pub const fn canvas(&self) -> &RgbImage {
        &self.canvas
    }

    /// Image dimensions.
    #[must_use]
    pub const fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    /// Consume the pipeline, keeping only the canvas.
    #[must_use]
    pub fn into_canvas(self) -> RgbImage {
        self.canvas
    }

    /// Consume the pipeline and return the full [`StagedResult`].
    #[must_use]
    pub fn into_result(self) -> StagedResult {
        StagedResult {
            original: self.original,
            edges: self.detection.edges,
            edge_points: self.edge_points,
            points: self.points,
            budget: self.budget,
            triangles: self.triangles,
            colored: self.colored,
            skipped: self.skipped,
            canvas: self.canvas,
            dimensions: self.dimensions,
        }
    }
}

// ──────────────────────── PipelineStage trait ────────────────────────

/// Total number of processing stages (excluding [`Pending`]).
pub const STAGE_COUNT: usize = 6;

/// Implemented by every stage that has done work, so diagnostics can
/// treat them uniformly.
pub trait PipelineStage {
    /// Short stage name (e.g. `"decode"`, `"sampling"`).
    const NAME: &str;

    /// One-based position in the pipeline (`1` for [`Decoded`] through
    /// [`STAGE_COUNT`] for [`Rendered`]).
    const INDEX: usize;

    /// Metrics describing the work done to reach this state.
    fn metrics(&self) -> StageMetrics;
}

impl PipelineStage for Decoded {
    const NAME: &str = "decode";
    const INDEX: usize = 1;

    fn metrics(&self) -> StageMetrics {
        StageMetrics::Decode {
            input_bytes: self.source_len,
            width: self.dimensions.width,
            height: self.dimensions.height,
            pixel_count: self.dimensions.pixel_count(),
        }
    }
}

impl PipelineStage for EdgesExtracted {
    const NAME: &str = "edge_extraction";
    const INDEX: usize = 2;

    fn metrics(&self) -> StageMetrics {
        StageMetrics::EdgeExtraction {
            detail_level: self.detection.detail_level,
            kernel_size: self.detection.kernel_size,
            sigma: self.detection.sigma,
            otsu_level: self.detection.otsu_level,
            low_threshold: self.detection.low_threshold,
            high_threshold: self.detection.high_threshold,
            edge_pixel_count: crate::edge::count_edge_pixels(&self.detection.edges),
            total_pixel_count: self.dimensions.pixel_count(),
        }
    }
}

impl PipelineStage for PointsSampled {
    const NAME: &str = "sampling";
    const INDEX: usize = 3;

    fn metrics(&self) -> StageMetrics {
        StageMetrics::Sampling {
            requested: self.budget.requested,
            edge_candidates: self.budget.edge_candidates,
            edge_selected: self.budget.edge_selected,
            random: self.budget.random,
            total: self.points.len(),
        }
    }
}

impl PipelineStage for Triangulated {
    const NAME: &str = "triangulation";
    const INDEX: usize = 4;

    fn metrics(&self) -> StageMetrics {
        StageMetrics::Triangulation {
            input_points: self.stats.input_points,
            rejected_points: self.stats.rejected_points,
            raw_faces: self.stats.raw_faces,
            out_of_bounds: self.stats.out_of_bounds,
            degenerate: self.stats.degenerate,
            triangle_count: self.triangles.len(),
        }
    }
}

impl PipelineStage for Colorized {
    const NAME: &str = "colorization";
    const INDEX: usize = 5;

    fn metrics(&self) -> StageMetrics {
        StageMetrics::Colorization {
            input_triangles: self.triangles.len(),
            colored: self.colored.len(),
            degenerate_box: self.skipped.degenerate_box,
            aggregation_fault: self.skipped.aggregation_fault,
            worker_threads: self.worker_threads,
        }
    }
}

impl PipelineStage for Rendered {
    const NAME: &str = "rendering";
    const INDEX: usize = 6;

    fn metrics(&self) -> StageMetrics {
        StageMetrics::Rendering {
            width: self.canvas.width(),
            height: self.canvas.height(),
            triangle_count: self.colored.len(),
            seam_width: self.config.seam_width,
        }
    }
}

// ───────────────────── Pipeline entry point ──────────────────────────

/// Incremental low-poly pipeline.
///
/// Created via [`Pipeline::new`] from encoded bytes, or via
/// [`Pipeline::from_image`] from an already-decoded image. Each stage
/// method consumes the current state and returns the next, making it a
/// compile-time error to skip stages or call them out of order.
pub struct Pipeline;

impl Pipeline {
    /// Create a new pipeline from source image bytes and config.
    ///
    /// No processing is performed; the bytes and config are simply
    /// stored. Call [`.decode()`](Pending::decode) to begin.
    #[allow(clippy::new_ret_no_self)]
    pub const fn new(image_bytes: Vec<u8>, config: PipelineConfig) -> Pending {
        Pending {
            config,
            source: image_bytes,
        }
    }

    /// Start from a decoded image, skipping the decode stage.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidDimensions`] if the image has zero
    /// width or height.
    pub fn from_image(image: RgbImage, config: PipelineConfig) -> Result<Decoded, PipelineError> {
        let dimensions = Dimensions::of(&image)?;
        Ok(Decoded {
            config,
            original: image,
            dimensions,
            source_len: 0,
        })
    }
}
