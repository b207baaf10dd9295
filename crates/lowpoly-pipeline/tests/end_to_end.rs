//! End-to-end scenarios: whole images through the full pipeline.

#![allow(clippy::unwrap_used)]

use lowpoly_pipeline::{
    Pipeline, PipelineConfig, PipelineError, RgbImage, low_poly, produce_low_poly_image,
};

fn seeded(num_points: i64, detail_level: i64) -> PipelineConfig {
    PipelineConfig {
        num_points,
        detail_level,
        seed: Some(2024),
        ..PipelineConfig::default()
    }
}

/// 200x200 image split into 2x2 quadrants: black top-left and
/// bottom-right, white elsewhere.
fn checkerboard() -> RgbImage {
    RgbImage::from_fn(200, 200, |x, y| {
        if (x < 100) == (y < 100) {
            image::Rgb([0, 0, 0])
        } else {
            image::Rgb([255, 255, 255])
        }
    })
}

/// Smooth color ramp with a bright disc, so both edges and flat regions
/// are present.
#[allow(clippy::cast_possible_truncation)]
fn photo_like(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        let dx = f64::from(x) - f64::from(width) / 2.0;
        let dy = f64::from(y) - f64::from(height) / 2.0;
        if dx.hypot(dy) < f64::from(width.min(height)) / 4.0 {
            image::Rgb([250, 220, 40])
        } else {
            image::Rgb([(x * 255 / width) as u8, 60, (y * 255 / height) as u8])
        }
    })
}

#[test]
fn output_has_input_dimensions() {
    for (w, h) in [(3, 50), (64, 48), (121, 77)] {
        let out = low_poly(&photo_like(w, h), &seeded(300, 3)).unwrap();
        assert_eq!(out.dimensions(), (w, h), "size changed for {w}x{h}");
    }
}

#[test]
fn point_budget_below_minimum_behaves_like_minimum() {
    let img = photo_like(80, 60);
    let one = low_poly(&img, &seeded(1, 3)).unwrap();
    let hundred = low_poly(&img, &seeded(100, 3)).unwrap();
    assert_eq!(one, hundred);
}

#[test]
fn detail_level_is_clamped_at_both_ends() {
    let img = photo_like(80, 60);
    assert_eq!(
        low_poly(&img, &seeded(400, 0)).unwrap(),
        low_poly(&img, &seeded(400, 1)).unwrap(),
    );
    assert_eq!(
        low_poly(&img, &seeded(400, 9)).unwrap(),
        low_poly(&img, &seeded(400, 5)).unwrap(),
    );
}

#[test]
fn uniform_gray_image_is_fully_covered_in_gray() {
    let img = RgbImage::from_pixel(100, 100, image::Rgb([128, 128, 128]));
    let staged = Pipeline::from_image(img, seeded(100, 3))
        .unwrap()
        .extract_edges()
        .sample_points()
        .triangulate()
        .colorize()
        .render()
        .into_result();

    assert!(staged.edge_points.is_empty(), "uniform image has no edges");
    assert_eq!(staged.points.len(), 100);
    assert_eq!(staged.budget.random, 100);
    assert!(!staged.triangles.is_empty());
    assert_eq!(staged.skipped.total(), 0);
    assert_eq!(staged.colored.len(), staged.triangles.len());
    for colored in &staged.colored {
        assert_eq!(colored.color, [128, 128, 128]);
    }

    // Every pixel is gray within rounding; no background shows through.
    for (x, y, p) in staged.canvas.enumerate_pixels() {
        assert!(
            p.0.iter().all(|c| c.abs_diff(128) <= 2),
            "pixel ({x}, {y}) = {:?} is not gray",
            p.0,
        );
    }
}

#[test]
fn uniform_gray_is_covered_for_many_seeds() {
    let img = RgbImage::from_pixel(100, 100, image::Rgb([128, 128, 128]));
    for seed in 0..10 {
        let config = PipelineConfig {
            num_points: 100,
            detail_level: 3,
            seed: Some(seed),
            ..PipelineConfig::default()
        };
        let canvas = low_poly(&img, &config).unwrap();
        let off = canvas
            .pixels()
            .filter(|p| p.0.iter().any(|c| c.abs_diff(128) > 2))
            .count();
        assert_eq!(off, 0, "seed {seed}: {off} pixels are not gray");
    }
}

#[test]
fn checkerboard_edges_dominate_and_transitions_are_sharp() {
    let staged = Pipeline::from_image(checkerboard(), seeded(500, 5))
        .unwrap()
        .extract_edges()
        .sample_points()
        .triangulate()
        .colorize()
        .render()
        .into_result();

    // Quota is floor(0.8 * 500) = 400.
    assert!(
        staged.budget.edge_selected >= 200,
        "only {} edge points selected",
        staged.budget.edge_selected,
    );
    assert_eq!(staged.points.len(), 500);

    let canvas = &staged.canvas;
    let luma = |x: u32, y: u32| canvas.get_pixel(x, y).0[0];
    assert!(luma(50, 50) < 64, "top-left should be dark");
    assert!(luma(150, 150) < 64, "bottom-right should be dark");
    assert!(luma(150, 50) > 191, "top-right should be bright");
    assert!(luma(50, 150) > 191, "bottom-left should be bright");

    // Across the vertical boundary the color jumps from dark to bright.
    assert!(luma(90, 50) < 64);
    assert!(luma(110, 50) > 191);

    let total = canvas.pixels().count();
    let near_black = canvas.pixels().filter(|p| p.0[0] < 40).count();
    let near_white = canvas.pixels().filter(|p| p.0[0] > 215).count();
    assert!(near_black * 10 >= total * 3, "near-black share too small");
    assert!(near_white * 10 >= total * 3, "near-white share too small");
}

#[test]
fn non_positive_point_budget_still_builds_a_mesh() {
    for num_points in [0, -1, -500] {
        let staged = Pipeline::from_image(photo_like(60, 40), seeded(num_points, 2))
            .unwrap()
            .extract_edges()
            .sample_points()
            .triangulate()
            .colorize()
            .render()
            .into_result();
        assert_eq!(staged.budget.requested, 100);
        assert!(staged.points.len() <= 100);
        assert!(!staged.triangles.is_empty());
        assert!(!staged.colored.is_empty());
        assert_eq!(staged.canvas.dimensions(), (60, 40));
    }
}

#[test]
fn unseeded_entry_point_runs() {
    let out = produce_low_poly_image(&photo_like(50, 50), 0, -3).unwrap();
    assert_eq!(out.dimensions(), (50, 50));
}

#[test]
fn empty_image_is_rejected() {
    let result = low_poly(&RgbImage::new(0, 0), &PipelineConfig::default());
    assert!(matches!(
        result,
        Err(PipelineError::InvalidDimensions {
            width: 0,
            height: 0
        })
    ));
}

#[test]
fn jpeg_bytes_round_trip_through_process() {
    let bytes = lowpoly_pipeline::codec::encode_jpeg(&photo_like(64, 40), 90).unwrap();
    let result = lowpoly_pipeline::process(&bytes, &seeded(250, 4)).unwrap();
    assert_eq!(result.image.dimensions(), (64, 40));
    let encoded = lowpoly_pipeline::codec::encode_jpeg(&result.image, 90).unwrap();
    assert!(!encoded.is_empty());
}
