//! Image resizing with aspect ratio preservation
//!
//! Size calculation plus SIMD resizing through `fast_image_resize`.

use crate::utils::error::{DocumentError, Result};
use fast_image_resize as fr;
use fast_image_resize::images::Image;
use image::RgbaImage;
use serde::Deserialize;

/// Resize filter algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResizeFilter {
    /// Bilinear filtering (fastest, good quality)
    #[default]
    Triangle,

    /// Lanczos3 filtering (slower, highest quality)
    Lanczos3,
}

impl From<ResizeFilter> for fr::FilterType {
    fn from(filter: ResizeFilter) -> Self {
        match filter {
            ResizeFilter::Triangle => fr::FilterType::Bilinear,
            ResizeFilter::Lanczos3 => fr::FilterType::Lanczos3,
        }
    }
}

/// Fit `src` inside `max`, keeping the aspect ratio and never upscaling
///
/// Returns `(0, 0)` for an empty source. Any non-empty result is at least 1x1.
pub fn fit_within(src_width: u32, src_height: u32, max_width: u32, max_height: u32) -> (u32, u32) {
    if src_width == 0 || src_height == 0 {
        return (0, 0);
    }

    let rx = max_width as f32 / src_width as f32;
    let ry = max_height as f32 / src_height as f32;
    let scale = rx.min(ry);

    if scale >= 1.0 {
        return (src_width, src_height);
    }

    let new_width = (src_width as f32 * scale).round() as u32;
    let new_height = (src_height as f32 * scale).round() as u32;

    (new_width.max(1), new_height.max(1))
}

/// Resize image to exact target dimensions
pub fn resize_image(
    source: &RgbaImage,
    target_width: u32,
    target_height: u32,
    filter: ResizeFilter,
) -> Result<RgbaImage> {
    let (src_width, src_height) = source.dimensions();

    if target_width == 0 || target_height == 0 {
        return Err(DocumentError::Image(
            "Target dimensions must be greater than zero".to_string(),
        ));
    }

    if src_width == target_width && src_height == target_height {
        return Ok(source.clone());
    }

    let src_view = Image::from_vec_u8(
        src_width,
        src_height,
        source.as_raw().to_vec(),
        fr::PixelType::U8x4,
    )
    .map_err(|e| DocumentError::Image(format!("Failed to create source view: {}", e)))?;

    let mut dst_image = Image::new(target_width, target_height, fr::PixelType::U8x4);

    let mut resizer = fr::Resizer::new();
    resizer
        .resize(
            &src_view,
            &mut dst_image,
            &fr::ResizeOptions::new().resize_alg(fr::ResizeAlg::Convolution(filter.into())),
        )
        .map_err(|e| DocumentError::Image(format!("Resize operation failed: {}", e)))?;

    RgbaImage::from_raw(target_width, target_height, dst_image.into_vec())
        .ok_or_else(|| DocumentError::Image("Failed to create output image".to_string()))
}
