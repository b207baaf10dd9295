//! Gaussian smoothing ahead of edge detection.
//!
//! The detail level is expressed as a kernel size (`5 + 2 * level`, forced
//! odd so the kernel has a center pixel). [`imageproc`] blurs by standard
//! deviation, so the kernel size is converted with the conventional
//! `0.3 * ((ksize - 1) * 0.5 - 1) + 0.8` rule.

use image::GrayImage;

/// Smoothing kernel size for a (clamped) detail level.
///
/// Always odd. Level 1 gives 7, level 5 gives 15.
#[must_use]
#[allow(clippy::cast_lossless)]
pub const fn kernel_size(detail_level: u8) -> u32 {
    let size = 5 + 2 * detail_level as u32;
    if size % 2 == 0 { size + 1 } else { size }
}

/// Standard deviation equivalent to a Gaussian kernel of `size` taps.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn sigma_for_kernel_size(size: u32) -> f32 {
    0.3f32.mul_add((size as f32 - 1.0).mul_add(0.5, -1.0), 0.8)
}

/// Apply Gaussian blur to a grayscale image.
///
/// Higher `sigma` values produce more smoothing. Non-positive sigma values
/// (zero or negative) return the image unchanged, since `imageproc`'s
/// underlying function panics on `sigma <= 0.0`.
#[must_use = "returns the blurred image"]
pub fn gaussian_blur(image: &GrayImage, sigma: f32) -> GrayImage {
    if sigma <= 0.0 {
        return image.clone();
    }

    imageproc::filter::gaussian_blur_f32(image, sigma)
}
