//! Page image verification using magic headers
//!
//! Comic entries are selected by extension, but a mislabelled or truncated
//! entry should fail with a clear error before the decoder sees it. Only the
//! formats accepted as comic pages are recognised:
//!
//! - **JPEG**: `FF D8 FF`
//! - **PNG**: `89 50 4E 47 0D 0A 1A 0A`
//! - **GIF**: `GIF87a` / `GIF89a`
//! - **BMP**: `42 4D`
//! - **WebP**: `RIFF....WEBP`

use crate::utils::error::{DocumentError, Result};

/// Detected page image format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageFormat {
    Jpeg,
    Png,
    Gif,
    Bmp,
    WebP,
}

impl PageFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Jpeg => "JPEG",
            Self::Png => "PNG",
            Self::Gif => "GIF",
            Self::Bmp => "BMP",
            Self::WebP => "WebP",
        }
    }
}

/// Signatures checked in order; JPEG first as the most common comic page
const SIGNATURES: &[(PageFormat, usize, &[u8])] = &[
    (PageFormat::Jpeg, 0, &[0xFF, 0xD8, 0xFF]),
    (PageFormat::Png, 0, b"\x89PNG\r\n\x1A\n"),
    (PageFormat::Gif, 0, b"GIF87a"),
    (PageFormat::Gif, 0, b"GIF89a"),
    (PageFormat::Bmp, 0, b"BM"),
];

/// Detect the page image format from magic bytes
pub fn detect_page_format(data: &[u8]) -> Result<PageFormat> {
    if data.is_empty() {
        return Err(DocumentError::Image("Empty data".to_string()));
    }

    for (format, offset, signature) in SIGNATURES {
        if data.len() >= offset + signature.len()
            && &data[*offset..offset + signature.len()] == *signature
        {
            return Ok(*format);
        }
    }

    // RIFF container with a WEBP form type
    if data.len() >= 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WEBP" {
        return Ok(PageFormat::WebP);
    }

    Err(DocumentError::Image(format!(
        "Unrecognized image format (first bytes: {:02X?})",
        &data[..data.len().min(16)]
    )))
}
