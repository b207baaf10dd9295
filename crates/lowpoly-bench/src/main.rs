//! lowpoly-bench: CLI tool for rendering low-poly images and inspecting
//! per-stage diagnostics.
//!
//! Runs the pipeline on a given image file with configurable parameters,
//! optionally writes the rendered JPEG, and prints detailed per-stage
//! diagnostics. Useful for:
//!
//! - Tuning the point budget and detail level for a photograph
//! - Measuring per-stage durations to identify bottlenecks
//! - Comparing worker pool sizes for color aggregation
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin lowpoly-bench -- [OPTIONS] <IMAGE_PATH>
//! ```

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::{ArgAction, Parser};
use lowpoly_pipeline::PipelineConfig;
use lowpoly_pipeline::diagnostics::{Clock, PipelineDiagnostics};

/// Low-poly rendering and diagnostics.
///
/// Runs the low-poly pipeline on a JPEG or PNG image and prints per-stage
/// timing and count diagnostics.
#[derive(Parser)]
#[command(name = "lowpoly-bench", version)]
struct Cli {
    /// Path to the input image (JPEG or PNG).
    image_path: PathBuf,

    /// Total feature point budget (values below 100 are raised to 100).
    #[arg(
        long,
        default_value_t = PipelineConfig::DEFAULT_NUM_POINTS,
        allow_negative_numbers = true
    )]
    num_points: i64,

    /// Edge detail level (clamped to 1-5).
    #[arg(
        long,
        default_value_t = PipelineConfig::DEFAULT_DETAIL_LEVEL,
        allow_negative_numbers = true
    )]
    detail_level: i64,

    /// Seed for point sampling. Omit for a different mesh on every run.
    #[arg(long)]
    seed: Option<u64>,

    /// Worker threads for color aggregation (0 = rayon's global pool).
    #[arg(long)]
    workers: Option<usize>,

    /// Width of the same-color seam stroke in pixels (0 disables).
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_SEAM_WIDTH)]
    seam_width: f32,

    /// Write the rendered image to this path as JPEG.
    #[arg(long, short)]
    output: Option<PathBuf>,

    /// JPEG quality for `--output` (1-100).
    #[arg(
        long,
        default_value_t = lowpoly_pipeline::codec::DEFAULT_JPEG_QUALITY,
        value_parser = clap::value_parser!(u8).range(1..=100)
    )]
    quality: u8,

    /// Number of runs for averaging.
    #[arg(
        long,
        default_value_t = 1,
        value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..)
    )]
    runs: usize,

    /// Output diagnostics as JSON instead of human-readable report.
    #[arg(long)]
    json: bool,

    /// Full pipeline config as a JSON string.
    ///
    /// When provided, all other pipeline parameter flags are ignored.
    /// Missing fields take their default values.
    #[arg(long)]
    config_json: Option<String>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(long, short, action = ArgAction::Count)]
    verbose: u8,
}

/// Build a [`PipelineConfig`] from CLI arguments.
///
/// If `--config-json` is provided, the JSON is parsed directly and all
/// individual parameter flags are ignored. Otherwise, a config is
/// assembled from the individual flags.
fn config_from_cli(cli: &Cli) -> Result<PipelineConfig, String> {
    if let Some(ref json) = cli.config_json {
        return serde_json::from_str(json).map_err(|e| format!("Error parsing --config-json: {e}"));
    }

    Ok(PipelineConfig {
        num_points: cli.num_points,
        detail_level: cli.detail_level,
        seed: cli.seed,
        worker_threads: cli.workers,
        seam_width: cli.seam_width,
        ..PipelineConfig::default()
    })
}

/// Install the stderr log subscriber. `RUST_LOG` directives are honored
/// alongside the level chosen by `-v`.
fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = match config_from_cli(&cli) {
        Ok(c) => c,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    let image_bytes = match std::fs::read(&cli.image_path) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("Error reading {}: {e}", cli.image_path.display());
            return ExitCode::FAILURE;
        }
    };

    eprintln!(
        "Image: {} ({} bytes)",
        cli.image_path.display(),
        image_bytes.len(),
    );
    eprintln!("Config: {config:#?}");
    eprintln!("Runs: {}", cli.runs);
    eprintln!();
    tracing::info!(path = %cli.image_path.display(), runs = cli.runs, "starting");

    let mut all_diagnostics = Vec::with_capacity(cli.runs);

    for run in 0..cli.runs {
        if cli.runs > 1 {
            eprintln!("--- Run {}/{} ---", run + 1, cli.runs);
        }

        match lowpoly_pipeline::diagnostics::process_staged_with_diagnostics(
            &image_bytes,
            &config,
            &StdClock,
        ) {
            Ok((staged, diagnostics)) => {
                if cli.json {
                    match serde_json::to_string_pretty(&diagnostics) {
                        Ok(json) => println!("{json}"),
                        Err(e) => {
                            eprintln!("Error serializing diagnostics: {e}");
                            return ExitCode::FAILURE;
                        }
                    }
                } else {
                    println!("{}", diagnostics.report());
                }

                // Write the image on the first run only.
                if run == 0
                    && let Some(ref out_path) = cli.output
                {
                    match lowpoly_pipeline::codec::encode_jpeg(&staged.canvas, cli.quality) {
                        Ok(jpeg) => match std::fs::write(out_path, &jpeg) {
                            Ok(()) => {
                                eprintln!(
                                    "JPEG written to {} ({} bytes)",
                                    out_path.display(),
                                    jpeg.len(),
                                );
                            }
                            Err(e) => {
                                eprintln!("Error writing JPEG to {}: {e}", out_path.display());
                            }
                        },
                        Err(e) => {
                            eprintln!("Error encoding JPEG: {e}");
                        }
                    }
                }

                all_diagnostics.push(diagnostics);
            }
            Err(e) => {
                eprintln!("Pipeline error: {e}");
                return ExitCode::FAILURE;
            }
        }

        if cli.runs > 1 {
            eprintln!();
        }
    }

    if cli.runs > 1 {
        print_multi_run_summary(&all_diagnostics);
    }

    ExitCode::SUCCESS
}

/// [`Clock`] implementation backed by [`std::time::Instant`].
struct StdClock;

impl Clock for StdClock {
    type Instant = Instant;

    fn now(&self) -> Instant {
        Instant::now()
    }

    fn elapsed(&self, since: &Instant) -> Duration {
        since.elapsed()
    }
}

/// Print aggregated statistics across multiple runs.
#[allow(clippy::cast_precision_loss)]
fn print_multi_run_summary(all_diagnostics: &[PipelineDiagnostics]) {
    println!();
    println!(
        "Summary ({} runs)\n{}",
        all_diagnostics.len(),
        "=".repeat(60),
    );

    let Some(first) = all_diagnostics.first() else {
        println!("Warning: no diagnostics to summarize");
        return;
    };

    let durations: Vec<f64> = all_diagnostics
        .iter()
        .map(|d| d.total_duration.as_secs_f64() * 1000.0)
        .collect();

    let min = durations.iter().copied().reduce(f64::min).unwrap_or(0.0);
    let max = durations.iter().copied().reduce(f64::max).unwrap_or(0.0);
    let mean = durations.iter().sum::<f64>() / durations.len() as f64;

    println!("Total duration: min={min:.3}ms  mean={mean:.3}ms  max={max:.3}ms");

    println!();
    println!("{:<24} {:>12}", "Stage", "Mean (ms)");
    println!("{}", "-".repeat(40));

    for (index, (name, _)) in first.stages().iter().enumerate() {
        let stage_total: f64 = all_diagnostics
            .iter()
            .map(|d| d.stages()[index].1.duration.as_secs_f64() * 1000.0)
            .sum();
        let stage_mean = stage_total / all_diagnostics.len() as f64;
        println!("{name:<24} {stage_mean:>10.3}ms");
    }

    // Unseeded runs sample different meshes, so triangle counts vary.
    let triangles: Vec<usize> = all_diagnostics
        .iter()
        .map(|d| d.summary.triangle_count)
        .collect();
    let tri_min = triangles.iter().min().copied().unwrap_or(0);
    let tri_max = triangles.iter().max().copied().unwrap_or(0);
    println!();
    println!("Triangles: min={tri_min}  max={tri_max}");
}
