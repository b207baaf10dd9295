//! Byte-level image I/O: decode uploaded JPEG/PNG data, encode the
//! rendered canvas as JPEG.
//!
//! Everything here works on in-memory buffers; reading and writing files
//! is left to the caller.

use image::codecs::jpeg::JpegEncoder;
use image::{ImageFormat, RgbImage};

use crate::types::{Dimensions, PipelineError};

/// JPEG quality used when the caller does not pick one.
pub const DEFAULT_JPEG_QUALITY: u8 = 90;

/// Decode JPEG or PNG bytes into an RGB image.
///
/// # Errors
///
/// - [`PipelineError::EmptyInput`] for zero bytes.
/// - [`PipelineError::UnsupportedFormat`] if the data is not JPEG or PNG.
/// - [`PipelineError::ImageDecode`] if the data is corrupt.
/// - [`PipelineError::InvalidDimensions`] if the image has no pixels.
pub fn decode(bytes: &[u8]) -> Result<RgbImage, PipelineError> {
    if bytes.is_empty() {
        return Err(PipelineError::EmptyInput);
    }

    let format = image::guess_format(bytes)
        .map_err(|_| PipelineError::UnsupportedFormat("unrecognized".to_string()))?;
    if !matches!(format, ImageFormat::Jpeg | ImageFormat::Png) {
        return Err(PipelineError::UnsupportedFormat(format!("{format:?}")));
    }

    let image = image::load_from_memory_with_format(bytes, format)?.to_rgb8();
    let dimensions = Dimensions::of(&image)?;
    tracing::debug!(
        ?format,
        width = dimensions.width,
        height = dimensions.height,
        bytes = bytes.len(),
        "decoded source image"
    );
    Ok(image)
}

/// Encode an RGB image as JPEG.
///
/// `quality` is clamped to `1..=100`.
///
/// # Errors
///
/// Returns [`PipelineError::ImageEncode`] if the encoder rejects the image
/// (for example a zero-sized canvas).
pub fn encode_jpeg(image: &RgbImage, quality: u8) -> Result<Vec<u8>, PipelineError> {
    let quality = quality.clamp(1, 100);
    let mut out = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut out, quality);
    image
        .write_with_encoder(encoder)
        .map_err(|e| PipelineError::ImageEncode(e.to_string()))?;
    Ok(out)
}
