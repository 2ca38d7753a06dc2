///! ZIP container implementation
///!
///! Backs CBZ comics and EPUB books using the `zip` crate
use std::cell::RefCell;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use zip::result::ZipError;
use zip::ZipArchive as ZipReader;

use super::corrupt;
use crate::archive::{Archive, ArchiveEntry, ArchiveType};
use crate::utils::error::{DocumentError, Result};

/// ZIP archive handler
///
/// Holds the open file for its whole lifetime; dropping it closes the file.
pub struct ZipArchive {
    archive: RefCell<ZipReader<BufReader<File>>>,
    path: PathBuf,
}

impl ZipArchive {
    /// Open a ZIP archive from path
    pub fn open(path: &Path) -> Result<Self> {
        tracing::debug!("Opening ZIP archive: {:?}", path);

        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let archive = ZipReader::new(reader)
            .map_err(|e| corrupt(format!("Invalid ZIP archive {:?}: {}", path, e)))?;

        Ok(Self {
            archive: RefCell::new(archive),
            path: path.to_path_buf(),
        })
    }

    /// Run `f` over a streaming reader for the named entry
    ///
    /// Returns `Ok(None)` when the entry does not exist, so callers can decide
    /// whether absence is fatal.
    pub fn with_entry<T>(
        &self,
        name: &str,
        f: impl FnOnce(&mut dyn Read) -> Result<T>,
    ) -> Result<Option<T>> {
        let mut archive = self.archive.borrow_mut();

        let mut zip_entry = match archive.by_name(name) {
            Ok(entry) => entry,
            Err(ZipError::FileNotFound) => return Ok(None),
            Err(e) => {
                return Err(DocumentError::Archive(format!(
                    "Failed to read entry {}: {}",
                    name, e
                )))
            }
        };

        f(&mut zip_entry).map(Some)
    }
}

impl Archive for ZipArchive {
    fn entries(&self) -> Result<Vec<ArchiveEntry>> {
        let mut archive = self.archive.borrow_mut();
        let mut entries = Vec::with_capacity(archive.len());

        for i in 0..archive.len() {
            let zip_entry = archive
                .by_index(i)
                .map_err(|e| DocumentError::Archive(format!("Failed to get entry {}: {}", i, e)))?;

            entries.push(ArchiveEntry {
                name: zip_entry.name().to_string(),
                size: zip_entry.size(),
                is_directory: zip_entry.is_dir(),
            });
        }

        tracing::debug!("ZIP {:?}: {} entries", self.path, entries.len());
        Ok(entries)
    }

    fn extract_entry(&self, name: &str, max_size: u64) -> Result<Vec<u8>> {
        let mut archive = self.archive.borrow_mut();

        let mut zip_entry = archive
            .by_name(name)
            .map_err(|e| DocumentError::Archive(format!("Entry not found: {}: {}", name, e)))?;

        // Guard against decompression bombs
        if zip_entry.size() > max_size {
            tracing::warn!(
                "Entry too large: {} ({} bytes, max {})",
                name,
                zip_entry.size(),
                max_size
            );
            return Err(DocumentError::Archive(format!(
                "Entry too large: {} bytes (max {})",
                zip_entry.size(),
                max_size
            )));
        }

        // The declared size can lie; never inflate past the cap
        let mut buffer = Vec::with_capacity(zip_entry.size().min(max_size) as usize);
        (&mut zip_entry)
            .take(max_size.saturating_add(1))
            .read_to_end(&mut buffer)
            .map_err(|e| DocumentError::Archive(format!("Failed to extract entry: {}", e)))?;

        if buffer.len() as u64 > max_size {
            tracing::warn!("Entry {} inflates past its declared size (max {})", name, max_size);
            return Err(DocumentError::Archive(format!(
                "Entry too large: more than {} bytes",
                max_size
            )));
        }

        tracing::debug!("Extracted {} ({} bytes)", name, buffer.len());
        Ok(buffer)
    }

    fn archive_type(&self) -> ArchiveType {
        ArchiveType::Zip
    }
}
