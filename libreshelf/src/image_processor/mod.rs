//! Image processing for page images and covers
//!
//! - **decoder**: decodes images from raw bytes using the `image` crate
//! - **magic**: verifies page image headers before decoding
//! - **resizer**: aspect-preserving size calculation and SIMD resizing
//! - **thumbnail**: cover pipeline (decode, fit, resize, flatten on white)

pub mod decoder;
pub mod magic;
pub mod resizer;
pub mod thumbnail;

pub use decoder::{decode_image, decode_rgba};
pub use magic::{detect_page_format, PageFormat};
pub use resizer::ResizeFilter;
pub use thumbnail::{create_cover, create_cover_from_image, CoverConfig};
