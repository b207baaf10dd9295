//! lowpoly-pipeline: Pure low-poly image pipeline (sans-IO).
//!
//! Converts a raster photograph into a flat-shaded triangle mesh through:
//! edge extraction -> point sampling -> Delaunay triangulation ->
//! per-triangle color aggregation -> rendering.
//!
//! This crate has **no I/O dependencies**: it operates on in-memory byte
//! slices and images and returns structured data. Reading files, timing
//! and log output belong to the caller (see `lowpoly-bench`).

pub mod blur;
pub mod codec;
pub mod colorize;
pub mod diagnostics;
pub mod edge;
pub mod grayscale;
pub mod pipeline;
pub mod render;
pub mod sample;
pub mod triangulate;
pub mod types;

pub use colorize::{SkipCounts, SkipReason, WorkerPool};
pub use pipeline::Pipeline;
pub use render::RenderOptions;
pub use types::{
    ColoredTriangle, Dimensions, GrayImage, PipelineConfig, PipelineError, Point, ProcessResult,
    RgbImage, StagedResult, Triangle,
};

/// Run the full pipeline on encoded JPEG or PNG bytes.
///
/// # Pipeline steps
///
/// 1. Decode the image
/// 2. Blur, Otsu threshold and Canny edge detection
/// 3. Sample up to `num_points` points (edges first, then uniform fill)
/// 4. Delaunay triangulation bounded to the image rectangle
/// 5. Mean color per triangle from prefix sums (parallel)
/// 6. Render every triangle onto a fresh canvas
///
/// # Errors
///
/// Returns [`PipelineError`] if the bytes cannot be decoded. No later
/// stage fails.
pub fn process(
    image_bytes: &[u8],
    config: &PipelineConfig,
) -> Result<ProcessResult, PipelineError> {
    process_staged(image_bytes, config).map(StagedResult::into_process_result)
}

/// Run the full pipeline, keeping every intermediate result.
///
/// # Errors
///
/// Returns [`PipelineError`] if the bytes cannot be decoded.
pub fn process_staged(
    image_bytes: &[u8],
    config: &PipelineConfig,
) -> Result<StagedResult, PipelineError> {
    Ok(Pipeline::new(image_bytes.to_vec(), config.clone())
        .decode()?
        .extract_edges()
        .sample_points()
        .triangulate()
        .colorize()
        .render()
        .into_result())
}

/// Produce the low-poly rendering of an already-decoded image.
///
/// The result has exactly the dimensions of `image`.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidDimensions`] if the image has zero
/// width or height.
pub fn low_poly(image: &RgbImage, config: &PipelineConfig) -> Result<RgbImage, PipelineError> {
    Ok(Pipeline::from_image(image.clone(), config.clone())?
        .extract_edges()
        .sample_points()
        .triangulate()
        .colorize()
        .render()
        .into_canvas())
}

/// Produce the low-poly rendering of `image` with the given point budget
/// and detail level, using defaults for every other setting.
///
/// `num_points` below 100 (including zero and negative values) is raised
/// to 100; `detail_level` is clamped to `1..=5`.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidDimensions`] if the image has zero
/// width or height.
pub fn produce_low_poly_image(
    image: &RgbImage,
    num_points: i64,
    detail_level: i64,
) -> Result<RgbImage, PipelineError> {
    let config = PipelineConfig {
        num_points,
        detail_level,
        ..PipelineConfig::default()
    };
    low_poly(image, &config)
}
