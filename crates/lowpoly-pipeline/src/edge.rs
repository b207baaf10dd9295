//! Feature points from intensity discontinuities.
//!
//! Luminance is smoothed with a detail-dependent Gaussian kernel, an Otsu
//! threshold is derived from the smoothed histogram, and Canny runs with
//! hysteresis bounds at half and one-and-a-half times that threshold.
//! Every pixel Canny marks becomes a feature point.
//!
//! Deriving the thresholds from the histogram means no fixed brightness
//! assumption is baked in: dark and bright photographs both get bounds
//! that sit between their own dominant intensity modes.

use image::{GrayImage, RgbImage};

use crate::types::Point;

/// Lowest accepted detail level.
pub const MIN_DETAIL_LEVEL: u8 = 1;

/// Highest accepted detail level.
pub const MAX_DETAIL_LEVEL: u8 = 5;

/// Minimum allowed Canny threshold.
///
/// A low threshold of zero causes every pixel with any gradient to be
/// treated as a potential edge. Uniform images have an Otsu level of zero,
/// so without this floor they would be marked as all-edge.
pub const MIN_THRESHOLD: f32 = 1.0;
const _: () = assert!(MIN_THRESHOLD > 0.0);

/// Scale applied to the Otsu level for the low hysteresis bound.
pub const LOW_THRESHOLD_SCALE: f32 = 0.5;

/// Scale applied to the Otsu level for the high hysteresis bound.
pub const HIGH_THRESHOLD_SCALE: f32 = 1.5;

/// Clamp a requested detail level into
/// [`MIN_DETAIL_LEVEL`]`..=`[`MAX_DETAIL_LEVEL`].
#[must_use]
pub fn clamp_detail_level(requested: i64) -> u8 {
    let clamped = requested.clamp(i64::from(MIN_DETAIL_LEVEL), i64::from(MAX_DETAIL_LEVEL));
    u8::try_from(clamped).unwrap_or(MAX_DETAIL_LEVEL)
}

/// Everything edge detection computed for one image.
#[derive(Debug, Clone)]
pub struct EdgeDetection {
    /// Binary edge map: 255 for edge pixels, 0 otherwise.
    pub edges: GrayImage,
    /// Detail level the detection ran with (already clamped).
    pub detail_level: u8,
    /// Smoothing kernel size derived from the detail level.
    pub kernel_size: u32,
    /// Gaussian sigma equivalent to `kernel_size`.
    pub sigma: f32,
    /// Otsu level of the smoothed luminance.
    pub otsu_level: u8,
    /// Low hysteresis bound actually used (after clamping).
    pub low_threshold: f32,
    /// High hysteresis bound actually used (after clamping).
    pub high_threshold: f32,
}

/// Hysteresis bounds derived from an Otsu level.
#[must_use]
pub fn hysteresis_thresholds(otsu_level: u8) -> (f32, f32) {
    let level = f32::from(otsu_level);
    (level * LOW_THRESHOLD_SCALE, level * HIGH_THRESHOLD_SCALE)
}

/// Detect edges using the Canny algorithm.
///
/// Returns a binary image: 255 for edge pixels, 0 for non-edge.
///
/// Internally, Canny performs its own light Gaussian pass, Sobel gradient
/// computation, non-maximum suppression, and hysteresis thresholding.
/// Pixels with gradient magnitude above `high_threshold` are definite
/// edges; those between `low_threshold` and `high_threshold` are edges
/// only if connected to a definite edge.
///
/// Both thresholds are clamped to a minimum of [`MIN_THRESHOLD`] and
/// `low_threshold` is clamped to be at most `high_threshold`.
#[must_use = "returns the binary edge map"]
pub fn canny(image: &GrayImage, low_threshold: f32, high_threshold: f32) -> GrayImage {
    let high = high_threshold.max(MIN_THRESHOLD);
    let low = low_threshold.max(MIN_THRESHOLD).min(high);
    imageproc::edges::canny(image, low, high)
}

/// Run the full edge detection chain on a color image.
///
/// `detail_level` is clamped to the accepted range first.
#[must_use]
pub fn detect(image: &RgbImage, detail_level: u8) -> EdgeDetection {
    let detail_level = detail_level.clamp(MIN_DETAIL_LEVEL, MAX_DETAIL_LEVEL);
    let kernel_size = crate::blur::kernel_size(detail_level);
    let sigma = crate::blur::sigma_for_kernel_size(kernel_size);

    let gray = crate::grayscale::luminance(image);
    let smoothed = crate::blur::gaussian_blur(&gray, sigma);

    let otsu_level = imageproc::contrast::otsu_level(&smoothed);
    let (low, high) = hysteresis_thresholds(otsu_level);
    let high_threshold = high.max(MIN_THRESHOLD);
    let low_threshold = low.max(MIN_THRESHOLD).min(high_threshold);

    let edges = canny(&smoothed, low_threshold, high_threshold);
    tracing::debug!(
        detail_level,
        kernel_size,
        sigma,
        otsu_level,
        low_threshold,
        high_threshold,
        "edge detection finished"
    );

    EdgeDetection {
        edges,
        detail_level,
        kernel_size,
        sigma,
        otsu_level,
        low_threshold,
        high_threshold,
    }
}

/// Collect the coordinates of every marked pixel in an edge map.
#[must_use]
pub fn edge_points(edges: &GrayImage) -> Vec<Point> {
    edges
        .enumerate_pixels()
        .filter(|(_, _, p)| p.0[0] > 0)
        .map(|(x, y, _)| Point::new(f64::from(x), f64::from(y)))
        .collect()
}

/// Extract feature points concentrated on strong intensity edges.
///
/// `detail_level` is clamped to
/// [`MIN_DETAIL_LEVEL`]`..=`[`MAX_DETAIL_LEVEL`]. The result is empty for
/// a uniform image; point order carries no meaning.
#[must_use]
pub fn extract(image: &RgbImage, detail_level: i64) -> Vec<Point> {
    let detection = detect(image, clamp_detail_level(detail_level));
    edge_points(&detection.edges)
}

/// Count edge pixels (value > 0) in an edge map.
#[must_use]
pub fn count_edge_pixels(edges: &GrayImage) -> u64 {
    edges.pixels().map(|p| u64::from(p.0[0] > 0)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 40x40 image with a sharp vertical boundary at x = 20.
    fn sharp_edge_image() -> RgbImage {
        RgbImage::from_fn(40, 40, |x, _y| {
            if x < 20 {
                image::Rgb([0, 0, 0])
            } else {
                image::Rgb([255, 255, 255])
            }
        })
    }

    #[test]
    fn detail_level_is_clamped() {
        assert_eq!(clamp_detail_level(-3), 1);
        assert_eq!(clamp_detail_level(0), 1);
        assert_eq!(clamp_detail_level(3), 3);
        assert_eq!(clamp_detail_level(9), 5);
        assert_eq!(clamp_detail_level(i64::MAX), 5);
    }

    #[test]
    fn hysteresis_bounds_bracket_otsu_level() {
        let (low, high) = hysteresis_thresholds(100);
        assert!((low - 50.0).abs() < f32::EPSILON);
        assert!((high - 150.0).abs() < f32::EPSILON);
    }

    #[test]
    fn uniform_image_produces_no_points() {
        let img = RgbImage::from_pixel(30, 30, image::Rgb([128, 128, 128]));
        let points = extract(&img, 3);
        assert!(points.is_empty(), "expected no edges, got {}", points.len());
    }

    #[test]
    fn uniform_image_thresholds_respect_floor() {
        let img = RgbImage::from_pixel(30, 30, image::Rgb([0, 0, 0]));
        let detection = detect(&img, 5);
        assert!(detection.low_threshold >= MIN_THRESHOLD);
        assert!(detection.high_threshold >= detection.low_threshold);
        assert_eq!(count_edge_pixels(&detection.edges), 0);
    }

    #[test]
    fn sharp_edge_points_cluster_on_boundary() {
        let points = extract(&sharp_edge_image(), 1);
        assert!(!points.is_empty(), "expected edges at sharp boundary");
        for p in &points {
            assert!(
                (p.x - 20.0).abs() <= 3.0,
                "edge point ({}, {}) is far from the boundary",
                p.x,
                p.y,
            );
        }
    }

    #[test]
    fn points_lie_on_pixel_grid_inside_image() {
        for p in extract(&sharp_edge_image(), 5) {
            assert!(p.x >= 0.0 && p.x < 40.0);
            assert!(p.y >= 0.0 && p.y < 40.0);
            assert!((p.x.fract()).abs() < f64::EPSILON);
            assert!((p.y.fract()).abs() < f64::EPSILON);
        }
    }

    #[test]
    fn out_of_range_detail_behaves_like_nearest_bound() {
        let img = sharp_edge_image();
        assert_eq!(extract(&img, 0), extract(&img, 1));
        assert_eq!(extract(&img, 9), extract(&img, 5));
    }

    #[test]
    fn detection_records_parameters() {
        let detection = detect(&sharp_edge_image(), 2);
        assert_eq!(detection.detail_level, 2);
        assert_eq!(detection.kernel_size, 9);
        assert_eq!(detection.edges.dimensions(), (40, 40));
    }

    #[test]
    fn edge_points_reads_marked_pixels() {
        let mut edges = GrayImage::new(5, 5);
        edges.put_pixel(1, 2, image::Luma([255]));
        edges.put_pixel(4, 0, image::Luma([255]));
        let mut points = edge_points(&edges);
        points.sort_by(|a, b| a.x.total_cmp(&b.x));
        assert_eq!(points, vec![Point::new(1.0, 2.0), Point::new(4.0, 0.0)]);
        assert_eq!(count_edge_pixels(&edges), 2);
    }

    #[test]
    fn zero_low_threshold_is_clamped_to_min() {
        let gray = crate::grayscale::luminance(&sharp_edge_image());
        assert_eq!(canny(&gray, 0.0, 150.0), canny(&gray, MIN_THRESHOLD, 150.0));
    }

    #[test]
    fn low_above_high_is_clamped() {
        let gray = crate::grayscale::luminance(&sharp_edge_image());
        assert_eq!(canny(&gray, 200.0, 100.0), canny(&gray, 100.0, 100.0));
    }
}
