use sevenz_rust::{Password, SevenZReader};
///! 7-Zip container implementation
///!
///! Backs CB7 comics using the `sevenz-rust` crate
use std::fs::File;
use std::path::{Path, PathBuf};

use super::corrupt;
use crate::archive::{Archive, ArchiveEntry, ArchiveType};
use crate::utils::error::{DocumentError, Result};

/// 7-Zip archive handler
pub struct SevenZipArchive {
    path: PathBuf,
}

impl SevenZipArchive {
    /// Open a 7z archive from path
    pub fn open(path: &Path) -> Result<Self> {
        tracing::debug!("Opening 7-Zip archive: {:?}", path);

        // Validate the header up front; reads reopen the file
        let _reader = Self::reader(path).map_err(|e| match e {
            DocumentError::Archive(msg) => corrupt(msg),
            other => other,
        })?;

        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    fn reader(path: &Path) -> Result<SevenZReader<File>> {
        let file = File::open(path)?;
        let file_len = file.metadata()?.len();

        SevenZReader::new(file, file_len, Password::empty())
            .map_err(|e| DocumentError::Archive(format!("Invalid 7z archive: {}", e)))
    }
}

impl Archive for SevenZipArchive {
    fn entries(&self) -> Result<Vec<ArchiveEntry>> {
        let mut archive = Self::reader(&self.path)?;
        let mut entries = Vec::new();

        archive
            .for_each_entries(|entry, _reader| {
                entries.push(ArchiveEntry {
                    name: entry.name().to_string(),
                    size: entry.size(),
                    is_directory: entry.is_directory(),
                });
                Ok(true)
            })
            .map_err(|e| DocumentError::Archive(format!("7z iteration error: {}", e)))?;

        tracing::debug!("7z {:?}: {} entries", self.path, entries.len());
        Ok(entries)
    }

    fn extract_entry(&self, name: &str, max_size: u64) -> Result<Vec<u8>> {
        let mut archive = Self::reader(&self.path)?;
        let mut extracted: Option<Result<Vec<u8>>> = None;

        archive
            .for_each_entries(|entry, reader| {
                if entry.name() != name {
                    return Ok(true);
                }

                if entry.size() > max_size {
                    extracted = Some(Err(DocumentError::Archive(format!(
                        "Entry too large: {} bytes (max {})",
                        entry.size(),
                        max_size
                    ))));
                    return Ok(false);
                }

                let mut buffer = Vec::with_capacity(entry.size() as usize);
                std::io::copy(reader, &mut buffer)
                    .map_err(|e| sevenz_rust::Error::Io(e, "Extract failed".into()))?;
                extracted = Some(Ok(buffer));
                Ok(false)
            })
            .map_err(|e| DocumentError::Archive(format!("7z extraction error: {}", e)))?;

        match extracted {
            Some(result) => {
                if let Ok(data) = &result {
                    tracing::debug!("Extracted {} ({} bytes) from 7z", name, data.len());
                }
                result
            }
            None => Err(DocumentError::Archive(format!("Entry not found: {}", name))),
        }
    }

    fn archive_type(&self) -> ArchiveType {
        ArchiveType::SevenZip
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sevenz_rust::SevenZWriter;

    /// Create a test 7z archive on disk
    fn create_test_7z_file(path: &Path, files: &[(&str, &[u8])]) {
        let file = File::create(path).unwrap();
        let mut sz = SevenZWriter::new(file).unwrap();

        for (name, content) in files {
            sz.push_archive_entry(
                sevenz_rust::SevenZArchiveEntry::from_path(Path::new(name), (*name).to_string()),
                Some(std::io::Cursor::new(content)),
            )
            .unwrap();
        }

        sz.finish().unwrap();
    }

    #[test]
    fn test_open_invalid_7z() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("invalid.cb7");
        std::fs::write(&path, b"not a 7z file").unwrap();

        assert!(matches!(
            SevenZipArchive::open(&path),
            Err(DocumentError::Io(_))
        ));
    }

    #[test]
    fn test_entries_and_extract() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.cb7");
        create_test_7z_file(&path, &[("page2.png", b"two"), ("page1.png", b"one")]);

        let archive = SevenZipArchive::open(&path).unwrap();
        assert_eq!(archive.archive_type(), ArchiveType::SevenZip);

        let mut names: Vec<String> = archive
            .entries()
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();
        names.sort();
        assert_eq!(names, vec!["page1.png", "page2.png"]);

        assert_eq!(archive.extract_entry("page1.png", 1024).unwrap(), b"one");
        assert!(archive.extract_entry("page3.png", 1024).is_err());
    }
}
