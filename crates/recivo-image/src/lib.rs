//! In-memory receipt image optimizer.
//!
//! Shrinks an uploaded receipt photo before it is submitted to the vision
//! API, to cut API cost and latency. Pure bytes-in/bytes-out: decode,
//! downscale, re-encode as JPEG. No filesystem, no network.

use std::io::Cursor;

use image::{codecs::jpeg::JpegEncoder, imageops::FilterType, DynamicImage};
use recivo_core::ExtractionError;
use tracing::debug;

/// Longest edge of the optimized image. Receipts stay legible for OCR
/// well below this.
const MAX_DIMENSION: u32 = 1024;

/// JPEG quality of the re-encoded image.
const JPEG_QUALITY: u8 = 80;

/// Decodes an image from memory, downscales it so its longest edge is at
/// most [`MAX_DIMENSION`] pixels, and re-encodes it as JPEG.
///
/// Images already within bounds are re-encoded without resizing (never
/// upscaled). Undecodable or empty input is an [`ExtractionError::Image`].
pub fn optimize(bytes: &[u8]) -> Result<Vec<u8>, ExtractionError> {
    let img = image::load_from_memory(bytes)
        .map_err(|e| ExtractionError::Image(format!("decode failed: {}", e)))?;

    let (width, height) = (img.width(), img.height());
    let resized = if width.max(height) > MAX_DIMENSION {
        img.resize(MAX_DIMENSION, MAX_DIMENSION, FilterType::Lanczos3)
    } else {
        img
    };

    // JPEG has no alpha channel; flatten before encoding.
    let rgb = DynamicImage::ImageRgb8(resized.to_rgb8());

    let mut out = Vec::new();
    let encoder = JpegEncoder::new_with_quality(Cursor::new(&mut out), JPEG_QUALITY);
    rgb.write_with_encoder(encoder)
        .map_err(|e| ExtractionError::Image(format!("encode failed: {}", e)))?;

    debug!(
        "optimized image: {}x{} ({} bytes) -> {}x{} ({} bytes)",
        width,
        height,
        bytes.len(),
        rgb.width(),
        rgb.height(),
        out.len()
    );

    Ok(out)
}
