//! Image decoding from raw bytes
//!
//! Page images come out of containers as raw bytes; the format is guessed
//! from the content, never from the entry name.

use crate::utils::error::{DocumentError, Result};
use image::{DynamicImage, ImageReader, RgbaImage};
use std::io::Cursor;

/// Decode image from raw bytes
///
/// Supports every format enabled on the `image` dependency.
///
/// # Returns
/// * `Ok(DynamicImage)` - Successfully decoded image
/// * `Err(DocumentError::Image)` - Failed to decode (invalid format or corrupt data)
pub fn decode_image(data: &[u8]) -> Result<DynamicImage> {
    if data.is_empty() {
        return Err(DocumentError::Image("Empty image data".to_string()));
    }

    let reader = ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(|e| DocumentError::Image(format!("Format detection failed: {}", e)))?;

    let img = reader
        .decode()
        .map_err(|e| DocumentError::Image(format!("Failed to decode image: {}", e)))?;

    tracing::debug!("Decoded image: {}x{}", img.width(), img.height());
    Ok(img)
}

/// Decode straight to 8-bit RGBA, the pixel layout every reader hands out
pub fn decode_rgba(data: &[u8]) -> Result<RgbaImage> {
    decode_image(data).map(|img| img.to_rgba8())
}
