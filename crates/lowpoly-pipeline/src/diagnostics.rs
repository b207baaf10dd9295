//! Pipeline diagnostics: timing, counts, and other metrics for each stage.
//!
//! These diagnostics are permanent instrumentation intended for
//! parameter experimentation. [`process_staged_with_diagnostics`] runs the
//! same stages as [`process_staged`](crate::process_staged) and records a
//! [`StageDiagnostics`] for each.
//!
//! The library never reads a clock itself. Callers supply a [`Clock`]
//! implementation, so the crate stays free of platform timing APIs.
//!
//! Durations are serialized as fractional seconds (`f64`) for JSON
//! compatibility, since `std::time::Duration` does not implement serde
//! traits.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::pipeline::{Pipeline, PipelineStage};
use crate::types::{PipelineConfig, PipelineError, StagedResult};

/// Source of timestamps for stage timing.
pub trait Clock {
    /// Opaque point in time.
    type Instant;

    /// The current time.
    fn now(&self) -> Self::Instant;

    /// Time elapsed since `since`.
    fn elapsed(&self, since: &Self::Instant) -> Duration;
}

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a `Duration` as fractional seconds (`f64`).
    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    /// Deserialize a `Duration` from fractional seconds (`f64`).
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// Diagnostics collected from a single pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineDiagnostics {
    /// Stage 1: image decoding.
    pub decode: StageDiagnostics,
    /// Stage 2: blur, Otsu and Canny edge extraction.
    pub edge_extraction: StageDiagnostics,
    /// Stage 3: point sampling.
    pub sampling: StageDiagnostics,
    /// Stage 4: Delaunay triangulation.
    pub triangulation: StageDiagnostics,
    /// Stage 5: per-triangle color aggregation.
    pub colorization: StageDiagnostics,
    /// Stage 6: rasterization.
    pub rendering: StageDiagnostics,
    /// Total wall-clock duration of the entire pipeline (seconds).
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
    /// Summary counts across all stages.
    pub summary: PipelineSummary,
}

/// Diagnostics for a single pipeline stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDiagnostics {
    /// Wall-clock duration of this stage (seconds).
    #[serde(with = "duration_serde")]
    pub duration: Duration,
    /// Stage-specific metrics (counts, sizes, etc.).
    pub metrics: StageMetrics,
}

/// Stage-specific metrics that vary by pipeline stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StageMetrics {
    /// Image decoding metrics.
    Decode {
        /// Size of the input image bytes (zero when the pipeline started
        /// from a decoded image).
        input_bytes: usize,
        /// Decoded image width in pixels.
        width: u32,
        /// Decoded image height in pixels.
        height: u32,
        /// Total pixel count (`width * height`).
        pixel_count: u64,
    },
    /// Edge extraction metrics.
    EdgeExtraction {
        /// Detail level after clamping.
        detail_level: u8,
        /// Smoothing kernel size.
        kernel_size: u32,
        /// Gaussian sigma for that kernel size.
        sigma: f32,
        /// Otsu level of the smoothed luminance.
        otsu_level: u8,
        /// Low threshold (after clamping).
        low_threshold: f32,
        /// High threshold (after clamping).
        high_threshold: f32,
        /// Number of edge pixels in the output.
        edge_pixel_count: u64,
        /// Total pixel count for computing edge density.
        total_pixel_count: u64,
    },
    /// Point sampling metrics.
    Sampling {
        /// Point budget after clamping.
        requested: usize,
        /// Edge points available.
        edge_candidates: usize,
        /// Edge points kept.
        edge_selected: usize,
        /// Uniform random points added.
        random: usize,
        /// Points handed to the triangulator.
        total: usize,
    },
    /// Triangulation metrics.
    Triangulation {
        /// Points offered to the triangulator.
        input_points: usize,
        /// Points refused (non-finite or outside the image).
        rejected_points: usize,
        /// Faces in the raw Delaunay triangulation.
        raw_faces: usize,
        /// Faces dropped for a vertex outside the image.
        out_of_bounds: usize,
        /// Faces dropped for zero area.
        degenerate: usize,
        /// Triangles kept.
        triangle_count: usize,
    },
    /// Color aggregation metrics.
    Colorization {
        /// Triangles offered for coloring.
        input_triangles: usize,
        /// Triangles that received a color.
        colored: usize,
        /// Triangles skipped because their clipped box was empty.
        degenerate_box: usize,
        /// Triangles skipped after an arithmetic or lookup fault.
        aggregation_fault: usize,
        /// Worker threads in the pool that ran the aggregation.
        worker_threads: usize,
    },
    /// Rendering metrics.
    Rendering {
        /// Canvas width in pixels.
        width: u32,
        /// Canvas height in pixels.
        height: u32,
        /// Triangles painted.
        triangle_count: usize,
        /// Seam stroke width in pixels.
        seam_width: f32,
    },
}

/// High-level summary counts for the entire pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSummary {
    /// Source image width in pixels.
    pub image_width: u32,
    /// Source image height in pixels.
    pub image_height: u32,
    /// Total pixel count.
    pub pixel_count: u64,
    /// Edge pixels found by edge extraction.
    pub edge_point_count: usize,
    /// Points fed to the triangulator.
    pub point_count: usize,
    /// Triangles painted onto the canvas.
    pub triangle_count: usize,
    /// Triangles dropped during color aggregation.
    pub skipped_triangles: usize,
}

/// Time one stage transition and capture the resulting stage's metrics.
fn timed<C, S, F>(clock: &C, advance: F) -> (S, StageDiagnostics)
where
    C: Clock,
    S: PipelineStage,
    F: FnOnce() -> S,
{
    let start = clock.now();
    let stage = advance();
    let duration = clock.elapsed(&start);
    tracing::debug!(stage = S::NAME, index = S::INDEX, ?duration, "stage finished");
    let diagnostics = StageDiagnostics {
        duration,
        metrics: stage.metrics(),
    };
    (stage, diagnostics)
}

/// Run the full pipeline, recording per-stage timing and metrics.
///
/// Produces exactly the same [`StagedResult`] as
/// [`process_staged`](crate::process_staged) for the same input and a
/// seeded config.
///
/// # Errors
///
/// Returns [`PipelineError`] if the image cannot be decoded.
pub fn process_staged_with_diagnostics<C: Clock>(
    image_bytes: &[u8],
    config: &PipelineConfig,
    clock: &C,
) -> Result<(StagedResult, PipelineDiagnostics), PipelineError> {
    let total_start = clock.now();

    let decode_start = clock.now();
    let decoded = Pipeline::new(image_bytes.to_vec(), config.clone()).decode()?;
    let decode = StageDiagnostics {
        duration: clock.elapsed(&decode_start),
        metrics: decoded.metrics(),
    };

    let (edges, edge_extraction) = timed(clock, || decoded.extract_edges());
    let (sampled, sampling) = timed(clock, || edges.sample_points());
    let (triangulated, triangulation) = timed(clock, || sampled.triangulate());
    let (colorized, colorization) = timed(clock, || triangulated.colorize());
    let (rendered, rendering) = timed(clock, || colorized.render());

    let total_duration = clock.elapsed(&total_start);
    let staged = rendered.into_result();

    let summary = PipelineSummary {
        image_width: staged.dimensions.width,
        image_height: staged.dimensions.height,
        pixel_count: staged.dimensions.pixel_count(),
        edge_point_count: staged.edge_points.len(),
        point_count: staged.points.len(),
        triangle_count: staged.colored.len(),
        skipped_triangles: staged.skipped.total(),
    };

    let diagnostics = PipelineDiagnostics {
        decode,
        edge_extraction,
        sampling,
        triangulation,
        colorization,
        rendering,
        total_duration,
        summary,
    };
    Ok((staged, diagnostics))
}

impl PipelineDiagnostics {
    /// Stage names paired with their diagnostics, in pipeline order.
    #[must_use]
    pub fn stages(&self) -> [(&'static str, &StageDiagnostics); 6] {
        [
            ("Decode", &self.decode),
            ("Edge Extraction", &self.edge_extraction),
            ("Sampling", &self.sampling),
            ("Triangulation", &self.triangulation),
            ("Colorization", &self.colorization),
            ("Rendering", &self.rendering),
        ]
    }

    /// Format diagnostics as a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Pipeline Diagnostics Report\n{}", "=".repeat(60)));
        lines.push(format!(
            "Image: {}x{} ({} pixels)",
            self.summary.image_width, self.summary.image_height, self.summary.pixel_count,
        ));
        lines.push(format!(
            "Total duration: {:.3}ms",
            duration_ms(self.total_duration),
        ));
        lines.push(String::new());

        lines.push(format!(
            "{:<24} {:>10} {:>10}  {}",
            "Stage", "Duration", "% Total", "Details"
        ));
        lines.push("-".repeat(80));

        let total_ms = duration_ms(self.total_duration);
        for (name, diag) in self.stages() {
            let ms = duration_ms(diag.duration);
            let pct = if total_ms > 0.0 {
                ms / total_ms * 100.0
            } else {
                0.0
            };
            let details = format_metrics(&diag.metrics);
            lines.push(format!("{name:<24} {ms:>8.3}ms {pct:>9.1}%  {details}"));
        }

        lines.push(String::new());
        lines.push(format!(
            "Edge points: {}  |  Points: {}  |  Triangles: {}  |  Skipped: {}",
            self.summary.edge_point_count,
            self.summary.point_count,
            self.summary.triangle_count,
            self.summary.skipped_triangles,
        ));

        lines.join("\n")
    }
}

/// Convert a `Duration` to milliseconds as `f64`.
fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Format stage metrics into a compact detail string.
fn format_metrics(metrics: &StageMetrics) -> String {
    match metrics {
        StageMetrics::Decode {
            input_bytes,
            width,
            height,
            ..
        } => {
            format!("{input_bytes} bytes -> {width}x{height}")
        }
        StageMetrics::EdgeExtraction {
            detail_level,
            kernel_size,
            sigma,
            otsu_level,
            low_threshold,
            high_threshold,
            edge_pixel_count,
            total_pixel_count,
        } => {
            #[allow(clippy::cast_precision_loss)]
            let density = if *total_pixel_count > 0 {
                *edge_pixel_count as f64 / *total_pixel_count as f64 * 100.0
            } else {
                0.0
            };
            format!(
                "detail={detail_level} k={kernel_size} sigma={sigma:.2} otsu={otsu_level} low={low_threshold:.1} high={high_threshold:.1} edges={edge_pixel_count} ({density:.1}%)",
            )
        }
        StageMetrics::Sampling {
            requested,
            edge_candidates,
            edge_selected,
            random,
            total,
        } => {
            format!(
                "budget={requested} edges={edge_selected}/{edge_candidates} random={random} total={total}",
            )
        }
        StageMetrics::Triangulation {
            input_points,
            rejected_points,
            raw_faces,
            out_of_bounds,
            degenerate,
            triangle_count,
        } => {
            format!(
                "{input_points} pts ({rejected_points} rejected), {raw_faces} faces -> {triangle_count} triangles (oob={out_of_bounds} degenerate={degenerate})",
            )
        }
        StageMetrics::Colorization {
            input_triangles,
            colored,
            degenerate_box,
            aggregation_fault,
            worker_threads,
        } => {
            format!(
                "{colored}/{input_triangles} colored (empty box={degenerate_box} fault={aggregation_fault}) on {worker_threads} threads",
            )
        }
        StageMetrics::Rendering {
            width,
            height,
            triangle_count,
            seam_width,
        } => {
            format!("{triangle_count} triangles on {width}x{height} (seam={seam_width:.1}px)")
        }
    }
}
