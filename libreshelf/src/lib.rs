//! LibreShelf - core of a personal e-book library
//!
//! Reads EPUB, PDF and comic archives (CBZ, CBR, CB7) through one
//! [`DocumentReader`] contract, and lists and downloads books from SMB,
//! WebDAV/Nextcloud and FTP sources through the [`NetworkDispatcher`].

pub mod archive;
pub mod config;
pub mod document;
pub mod image_processor;
pub mod remote;
pub mod utils;

pub use config::ShelfConfig;
pub use document::{
    reader_for, BookFormat, ComicReader, Content, DocumentReader, DocumentSummary,
    DocumentWorker, EpubReader, PdfReader, ReadingSession,
};
pub use remote::{NetworkDispatcher, NetworkSource, NetworkType, RemoteClient, RemoteFileEntry};
pub use utils::error::{ConfigError, DocumentError, RemoteError};
