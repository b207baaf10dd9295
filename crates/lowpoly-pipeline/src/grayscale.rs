//! Luminance conversion.
//!
//! Edge extraction works on a single intensity channel; this module turns
//! the decoded RGB source into that channel.

use image::{GrayImage, RgbImage};

/// Convert an RGB image to single-channel luminance.
///
/// Uses the `image` crate's weighted luminance conversion, so green
/// contributes most and blue least, matching perceived brightness rather
/// than a plain channel average.
#[must_use = "returns the luminance image"]
pub fn luminance(image: &RgbImage) -> GrayImage {
    image::imageops::grayscale(image)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single_pixel(r: u8, g: u8, b: u8) -> RgbImage {
        RgbImage::from_pixel(1, 1, image::Rgb([r, g, b]))
    }

    #[test]
    fn white_stays_white() {
        let gray = luminance(&RgbImage::from_pixel(2, 2, image::Rgb([255, 255, 255])));
        for pixel in gray.pixels() {
            assert_eq!(pixel.0[0], 255);
        }
    }

    #[test]
    fn output_dimensions_match_input() {
        let gray = luminance(&RgbImage::new(17, 31));
        assert_eq!(gray.width(), 17);
        assert_eq!(gray.height(), 31);
    }

    #[test]
    fn luminance_weights_green_over_red_over_blue() {
        let r_val = luminance(&single_pixel(255, 0, 0)).get_pixel(0, 0).0[0];
        let g_val = luminance(&single_pixel(0, 255, 0)).get_pixel(0, 0).0[0];
        let b_val = luminance(&single_pixel(0, 0, 255)).get_pixel(0, 0).0[0];

        assert!(
            g_val > r_val && r_val > b_val,
            "expected green > red > blue luminance, got R={r_val} G={g_val} B={b_val}",
        );
    }
}
