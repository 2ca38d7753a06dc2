///! RAR container implementation
///!
///! Backs CBR comics using the `unrar` crate. unrar works per call on a
///! path, so the handler keeps the path and reopens for every operation.
use std::path::{Path, PathBuf};
use unrar::Archive as UnrarArchive;

use super::corrupt;
use crate::archive::{Archive, ArchiveEntry, ArchiveType};
use crate::utils::error::{DocumentError, Result};

/// RAR archive handler
pub struct RarArchive {
    path: PathBuf,
}

impl RarArchive {
    /// Open a RAR archive from path
    pub fn open(path: &Path) -> Result<Self> {
        tracing::debug!("Opening RAR archive: {:?}", path);

        if !path.is_file() {
            return Err(DocumentError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{:?} is not a file", path),
            )));
        }

        // Validate by attempting to read the first header
        let archive = UnrarArchive::new(path)
            .open_for_listing()
            .map_err(|e| corrupt(format!("Failed to open RAR archive: {:?}", e)))?;

        if let Some(Err(e)) = archive.into_iter().next() {
            return Err(corrupt(format!("RAR listing error: {:?}", e)));
        }

        Ok(Self {
            path: path.to_path_buf(),
        })
    }
}

impl Archive for RarArchive {
    fn entries(&self) -> Result<Vec<ArchiveEntry>> {
        let archive = UnrarArchive::new(&self.path)
            .open_for_listing()
            .map_err(|e| DocumentError::Archive(format!("Failed to open RAR for listing: {:?}", e)))?;

        let mut entries = Vec::new();

        for entry_result in archive {
            let entry = entry_result
                .map_err(|e| DocumentError::Archive(format!("RAR entry error: {:?}", e)))?;

            entries.push(ArchiveEntry {
                name: entry.filename.to_string_lossy().to_string(),
                size: entry.unpacked_size,
                is_directory: entry.is_directory(),
            });
        }

        tracing::debug!("RAR {:?}: {} entries", self.path, entries.len());
        Ok(entries)
    }

    fn extract_entry(&self, name: &str, max_size: u64) -> Result<Vec<u8>> {
        let mut archive = UnrarArchive::new(&self.path)
            .open_for_processing()
            .map_err(|e| {
                DocumentError::Archive(format!("Failed to open RAR for processing: {:?}", e))
            })?;

        loop {
            let header = match archive.read_header() {
                Ok(Some(header)) => header,
                Ok(None) => break,
                Err(e) => {
                    return Err(DocumentError::Archive(format!(
                        "Failed to read RAR header: {:?}",
                        e
                    )))
                }
            };

            if header.entry().filename.to_string_lossy() != name {
                archive = header
                    .skip()
                    .map_err(|e| DocumentError::Archive(format!("Failed to skip RAR entry: {:?}", e)))?;
                continue;
            }

            let size = header.entry().unpacked_size;
            if size > max_size {
                tracing::warn!("Entry too large: {} ({} bytes, max {})", name, size, max_size);
                return Err(DocumentError::Archive(format!(
                    "Entry too large: {} bytes (max {})",
                    size, max_size
                )));
            }

            let (data, _) = header
                .read()
                .map_err(|e| DocumentError::Archive(format!("Failed to extract RAR entry: {:?}", e)))?;

            tracing::debug!("Extracted {} ({} bytes) from RAR", name, data.len());
            return Ok(data);
        }

        Err(DocumentError::Archive(format!("Entry not found in RAR: {}", name)))
    }

    fn archive_type(&self) -> ArchiveType {
        ArchiveType::Rar
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_missing_rar() {
        let dir = tempfile::tempdir().unwrap();
        let result = RarArchive::open(&dir.path().join("missing.cbr"));
        assert!(matches!(result, Err(DocumentError::Io(_))));
    }

    #[test]
    fn test_open_invalid_rar() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("invalid.cbr");
        std::fs::write(&path, b"Rar!\x1A\x07\x00 but truncated").unwrap();

        assert!(RarArchive::open(&path).is_err());
    }
}
