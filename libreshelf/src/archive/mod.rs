use crate::utils::error::{DocumentError, Result};
///! Archive container handling
///!
///! ZIP, RAR and 7z containers behind one trait. EPUB and CBZ are ZIP
///! containers; CBR and CB7 use RAR and 7z.
use std::fs::File;
use std::io::Read;
use std::path::Path;

mod rar;
mod sevenz;
pub mod utils;
mod zip;

pub use rar::RarArchive;
pub use sevenz::SevenZipArchive;
pub use utils::{is_image_file, natural_cmp, sort_pages, MAX_ENTRY_SIZE};
pub use zip::ZipArchive;

/// Represents an entry in an archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub name: String,
    pub size: u64,
    pub is_directory: bool,
}

/// Archive type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveType {
    Zip,
    Rar,
    SevenZip,
}

impl ArchiveType {
    /// Detect archive type from file extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "zip" | "cbz" | "epub" => Some(Self::Zip),
            "rar" | "cbr" => Some(Self::Rar),
            "7z" | "cb7" => Some(Self::SevenZip),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Zip => "ZIP",
            Self::Rar => "RAR",
            Self::SevenZip => "7-Zip",
        }
    }
}

/// Archive trait for different container formats
///
/// Implementations own their file handle (or path) and release it on drop.
pub trait Archive: Send {
    /// List every entry in container order
    fn entries(&self) -> Result<Vec<ArchiveEntry>>;

    /// Extract a named entry to a byte vector, refusing entries over `max_size`
    fn extract_entry(&self, name: &str, max_size: u64) -> Result<Vec<u8>>;

    /// Get archive type
    fn archive_type(&self) -> ArchiveType;
}

/// Detect archive type from the first bytes of a container
pub fn detect_archive_type_from_bytes(data: &[u8]) -> Result<ArchiveType> {
    if data.len() < 4 {
        return Err(DocumentError::UnsupportedFormat(format!(
            "Data too short: {} bytes",
            data.len()
        )));
    }

    let magic = &data[0..4];
    if magic == b"PK\x03\x04" || magic == b"PK\x05\x06" || magic == b"PK\x07\x08" {
        return Ok(ArchiveType::Zip);
    }

    if data.len() >= 6 && &data[0..6] == b"7z\xBC\xAF\x27\x1C" {
        return Ok(ArchiveType::SevenZip);
    }

    // RAR 4.x: "Rar!\x1A\x07\x00", RAR 5.x: "Rar!\x1A\x07\x01\x00"
    if data.len() >= 7 && &data[0..6] == b"Rar!\x1A\x07" {
        return Ok(ArchiveType::Rar);
    }

    Err(DocumentError::UnsupportedFormat(format!(
        "Unrecognized container (first bytes: {:02X?})",
        &data[..data.len().min(8)]
    )))
}

/// Open an archive of any supported type from a file path
///
/// The container type comes from the file's magic bytes, so a CBR that is
/// really a ZIP (a common mislabel) still opens. The extension is only used
/// when the header is not recognised.
pub fn open_archive(path: &Path) -> Result<Box<dyn Archive>> {
    let mut magic = [0u8; 8];
    let read = {
        let mut file = File::open(path)?;
        read_prefix(&mut file, &mut magic)?
    };

    let archive_type = match detect_archive_type_from_bytes(&magic[..read]) {
        Ok(archive_type) => archive_type,
        Err(err) => {
            let by_extension = path
                .extension()
                .and_then(|s| s.to_str())
                .and_then(ArchiveType::from_extension);
            match by_extension {
                Some(archive_type) => {
                    tracing::debug!(
                        "Header not recognised for {:?}, trying {} by extension",
                        path,
                        archive_type.as_str()
                    );
                    archive_type
                }
                None => return Err(err),
            }
        }
    };

    tracing::debug!("Opening {} container: {:?}", archive_type.as_str(), path);

    match archive_type {
        ArchiveType::Zip => Ok(Box::new(ZipArchive::open(path)?)),
        ArchiveType::Rar => Ok(Box::new(RarArchive::open(path)?)),
        ArchiveType::SevenZip => Ok(Box::new(SevenZipArchive::open(path)?)),
    }
}

/// Error for a container that exists but cannot be parsed
pub(crate) fn corrupt(msg: String) -> DocumentError {
    DocumentError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, msg))
}

/// Fill as much of `buf` as the reader allows
fn read_prefix(reader: &mut impl Read, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..])? {
            0 => break,
            n => filled += n,
        }
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_zip() {
        let data = b"PK\x03\x04\x14\x00\x00\x00";
        assert_eq!(detect_archive_type_from_bytes(data).unwrap(), ArchiveType::Zip);
    }

    #[test]
    fn test_detect_rar() {
        let rar4 = b"Rar!\x1A\x07\x00\x00";
        let rar5 = b"Rar!\x1A\x07\x01\x00";
        assert_eq!(detect_archive_type_from_bytes(rar4).unwrap(), ArchiveType::Rar);
        assert_eq!(detect_archive_type_from_bytes(rar5).unwrap(), ArchiveType::Rar);
    }

    #[test]
    fn test_detect_7z() {
        let data = b"7z\xBC\xAF\x27\x1C\x00\x04";
        assert_eq!(
            detect_archive_type_from_bytes(data).unwrap(),
            ArchiveType::SevenZip
        );
    }

    #[test]
    fn test_detect_unknown() {
        assert!(detect_archive_type_from_bytes(b"%PDF-1.7").is_err());
        assert!(detect_archive_type_from_bytes(b"PK").is_err());
    }

    #[test]
    fn test_from_extension() {
        assert_eq!(ArchiveType::from_extension("CBZ"), Some(ArchiveType::Zip));
        assert_eq!(ArchiveType::from_extension("epub"), Some(ArchiveType::Zip));
        assert_eq!(ArchiveType::from_extension("cbr"), Some(ArchiveType::Rar));
        assert_eq!(ArchiveType::from_extension("cb7"), Some(ArchiveType::SevenZip));
        assert_eq!(ArchiveType::from_extension("pdf"), None);
    }

    #[test]
    fn test_open_archive_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = open_archive(&dir.path().join("missing.cbz"));
        assert!(matches!(result, Err(DocumentError::Io(_))));
    }

    #[test]
    fn test_open_archive_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garbage.bin");
        std::fs::write(&path, b"definitely not an archive").unwrap();
        assert!(matches!(
            open_archive(&path),
            Err(DocumentError::UnsupportedFormat(_))
        ));
    }
}
