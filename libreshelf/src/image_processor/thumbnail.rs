//! Cover thumbnail pipeline
//!
//! 1. Decode image from raw bytes
//! 2. Fit inside the configured box (aspect ratio preserved, no upscaling)
//! 3. Resize with the configured filter
//! 4. Flatten transparency onto the background colour

use image::{GenericImageView, RgbaImage};

use super::decoder;
use super::resizer::{self, ResizeFilter};
use crate::utils::error::{DocumentError, Result};

/// Cover generation configuration
#[derive(Debug, Clone)]
pub struct CoverConfig {
    pub max_width: u32,
    pub max_height: u32,

    /// Background for transparent pixels (RGBA). Default opaque white.
    pub background_color: (u8, u8, u8, u8),

    pub resize_filter: ResizeFilter,
}

impl Default for CoverConfig {
    fn default() -> Self {
        Self {
            max_width: 300,
            max_height: 450,
            background_color: (255, 255, 255, 255),
            resize_filter: ResizeFilter::Triangle,
        }
    }
}

impl CoverConfig {
    pub fn with_size(max_width: u32, max_height: u32) -> Self {
        Self {
            max_width,
            max_height,
            ..Default::default()
        }
    }
}

/// Create a cover thumbnail from encoded image bytes
pub fn create_cover(image_data: &[u8], config: &CoverConfig) -> Result<RgbaImage> {
    let img = decoder::decode_image(image_data).map_err(|e| {
        tracing::debug!("Cover decode failed for {} bytes: {}", image_data.len(), e);
        e
    })?;

    let (src_width, src_height) = img.dimensions();
    tracing::debug!("Cover source: {}x{}", src_width, src_height);

    create_cover_from_image(img.to_rgba8(), config)
}

/// Create a cover thumbnail from already decoded pixels (rendered PDF pages)
pub fn create_cover_from_image(mut rgba: RgbaImage, config: &CoverConfig) -> Result<RgbaImage> {
    let (src_width, src_height) = rgba.dimensions();
    let (target_width, target_height) =
        resizer::fit_within(src_width, src_height, config.max_width, config.max_height);

    if target_width == 0 || target_height == 0 {
        return Err(DocumentError::Image(
            "Invalid image dimensions (0x0)".to_string(),
        ));
    }

    if (target_width, target_height) != (src_width, src_height) {
        rgba = resizer::resize_image(&rgba, target_width, target_height, config.resize_filter)?;
    }

    apply_background(&mut rgba, config.background_color);
    Ok(rgba)
}

/// Composite every pixel over `bg` and make the result fully opaque
///
/// ```text
/// final_color = pixel_color * alpha + background_color * (1 - alpha)
/// ```
fn apply_background(rgba: &mut RgbaImage, bg: (u8, u8, u8, u8)) {
    for pixel in rgba.pixels_mut() {
        let alpha = pixel[3] as f32 / 255.0;

        if alpha < 1.0 {
            pixel[0] = ((pixel[0] as f32 * alpha) + (bg.0 as f32 * (1.0 - alpha))) as u8;
            pixel[1] = ((pixel[1] as f32 * alpha) + (bg.1 as f32 * (1.0 - alpha))) as u8;
            pixel[2] = ((pixel[2] as f32 * alpha) + (bg.2 as f32 * (1.0 - alpha))) as u8;
        }

        pixel[3] = 255;
    }
}
