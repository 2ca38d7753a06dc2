//! Error types for LibreShelf
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the archive layer and the document readers.
#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid document structure: {0}")]
    Format(String),

    #[error("Index {index} out of range (document has {count} units)")]
    Index { index: usize, count: usize },

    #[error("No document is open")]
    NotOpen,

    #[error("Archive error: {0}")]
    Archive(String),

    #[error("Image processing error: {0}")]
    Image(String),

    #[error("Render error: {0}")]
    Render(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
}

/// Errors raised by the remote protocol clients.
///
/// The dispatcher flattens these to empty listings and `false`, but they stay
/// available through the `try_*` operations and in the logs.
#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("Authentication rejected: {0}")]
    Auth(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected status: {0}")]
    Status(u16),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed listing: {0}")]
    Parse(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Unsupported: {0}")]
    Unsupported(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Could not determine the configuration directory")]
    NoConfigDir,
}

pub type Result<T> = std::result::Result<T, DocumentError>;

pub type RemoteResult<T> = std::result::Result<T, RemoteError>;
