use image::RgbaImage;
///! Document readers
///!
///! One reader per format behind the [`DocumentReader`] trait. A reader holds
///! at most one open document; opening another closes the current one first.
use std::path::{Path, PathBuf};

pub mod comic;
pub mod epub;
pub mod pdf;
pub mod session;
pub mod worker;

pub use comic::ComicReader;
pub use epub::{Chapter, EpubMetadata, EpubReader, TocItem};
pub use pdf::PdfReader;
pub use session::ReadingSession;
pub use worker::DocumentWorker;

use crate::utils::error::{DocumentError, Result};

/// Declared format of a book file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BookFormat {
    Epub,
    Pdf,
    Cbz,
    Cbr,
    Cb7,
    Unknown,
}

impl BookFormat {
    /// Map a file extension (without the dot, any case) to a format
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_ascii_lowercase().as_str() {
            "epub" => Self::Epub,
            "pdf" => Self::Pdf,
            "cbz" => Self::Cbz,
            "cbr" => Self::Cbr,
            "cb7" => Self::Cb7,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Epub => "EPUB",
            Self::Pdf => "PDF",
            Self::Cbz => "CBZ",
            Self::Cbr => "CBR",
            Self::Cb7 => "CB7",
            Self::Unknown => "UNKNOWN",
        }
    }

    pub fn is_comic(&self) -> bool {
        matches!(self, Self::Cbz | Self::Cbr | Self::Cb7)
    }
}

/// One fetched content unit
#[derive(Debug, Clone)]
pub enum Content {
    /// Raw chapter markup (EPUB)
    Markup(String),
    /// Decoded or rendered page (comics, PDF)
    Image(RgbaImage),
}

impl Content {
    pub fn as_markup(&self) -> Option<&str> {
        match self {
            Self::Markup(text) => Some(text),
            Self::Image(_) => None,
        }
    }

    pub fn as_image(&self) -> Option<&RgbaImage> {
        match self {
            Self::Image(img) => Some(img),
            Self::Markup(_) => None,
        }
    }
}

/// Result of a successful open
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentSummary {
    pub format: BookFormat,
    pub path: PathBuf,
    pub unit_count: usize,
}

/// Common contract of every document reader
///
/// open → enumerate → random-access fetch → close. Readers are `Send` but not
/// internally locked; wrap them in [`DocumentWorker`] to share across tasks.
pub trait DocumentReader: Send {
    fn format(&self) -> BookFormat;

    /// Open a document, closing any document this reader already holds.
    ///
    /// A failed open leaves the reader closed.
    fn open(&mut self, path: &Path) -> Result<DocumentSummary>;

    /// Number of content units (chapters or pages)
    fn unit_count(&self) -> Result<usize>;

    /// Fetch one content unit by index
    fn fetch(&self, index: usize) -> Result<Content>;

    /// Release the open document. Safe to call repeatedly.
    fn close(&mut self);

    fn is_open(&self) -> bool;
}

/// Select the reader for a declared format
///
/// `Unknown` has no reader; callers decide what to tell the user.
pub fn reader_for(format: BookFormat) -> Option<Box<dyn DocumentReader>> {
    match format {
        BookFormat::Epub => Some(Box::new(EpubReader::new())),
        BookFormat::Pdf => Some(Box::new(PdfReader::new())),
        BookFormat::Cbz | BookFormat::Cbr | BookFormat::Cb7 => {
            Some(Box::new(ComicReader::new(format)))
        }
        BookFormat::Unknown => None,
    }
}

/// Uniform index validation shared by every reader
pub(crate) fn check_index(index: usize, count: usize) -> Result<()> {
    if index >= count {
        return Err(DocumentError::Index { index, count });
    }
    Ok(())
}
