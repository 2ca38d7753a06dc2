///! EPUB reader
///!
///! An EPUB is a ZIP container: `META-INF/container.xml` points at the
///! package document, whose spine gives the reading order of the chapters.
use std::io::BufReader;
use std::path::{Path, PathBuf};

pub mod package;

pub use package::EpubMetadata;

use self::package::{
    package_dir, parse_container, parse_package, resolve_href, CONTAINER_PATH,
    DEFAULT_PACKAGE_PATH,
};
use super::{check_index, BookFormat, Content, DocumentReader, DocumentSummary};
use crate::archive::ZipArchive;
use crate::utils::error::{DocumentError, Result};

/// One spine entry resolved through the manifest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chapter {
    pub index: usize,
    pub title: String,
    /// Zip entry name, already prefixed with the package directory
    pub href: String,
}

/// Table of contents entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TocItem {
    pub title: String,
    pub chapter_index: usize,
}

struct OpenBook {
    archive: ZipArchive,
    path: PathBuf,
    package_path: String,
    metadata: EpubMetadata,
    chapters: Vec<Chapter>,
}

enum State {
    Closed,
    Open(OpenBook),
}

/// EPUB reader holding at most one open book
pub struct EpubReader {
    state: State,
}

impl Default for EpubReader {
    fn default() -> Self {
        Self::new()
    }
}

impl EpubReader {
    pub fn new() -> Self {
        Self {
            state: State::Closed,
        }
    }

    fn book(&self) -> Result<&OpenBook> {
        match &self.state {
            State::Open(book) => Ok(book),
            State::Closed => Err(DocumentError::NotOpen),
        }
    }

    fn load(path: &Path) -> Result<OpenBook> {
        let archive = ZipArchive::open(path)?;

        let package_path = archive
            .with_entry(CONTAINER_PATH, parse_container)?
            .flatten()
            .unwrap_or_else(|| {
                tracing::debug!("No rootfile in {:?}, using {}", path, DEFAULT_PACKAGE_PATH);
                DEFAULT_PACKAGE_PATH.to_string()
            });

        let package = archive
            .with_entry(&package_path, |reader| parse_package(BufReader::new(reader)))?
            .ok_or_else(|| {
                DocumentError::Format(format!("Package document {} not found", package_path))
            })?;

        let dir = package_dir(&package_path);
        let chapters: Vec<Chapter> = package
            .spine
            .iter()
            .filter_map(|idref| {
                let href = package.manifest.get(idref);
                if href.is_none() {
                    tracing::debug!("Spine idref {} has no manifest item, skipping", idref);
                }
                href
            })
            .enumerate()
            .map(|(index, href)| Chapter {
                index,
                title: format!("Chapter {}", index + 1),
                href: resolve_href(dir, href),
            })
            .collect();

        Ok(OpenBook {
            archive,
            path: path.to_path_buf(),
            package_path,
            metadata: package.metadata,
            chapters,
        })
    }

    pub fn metadata(&self) -> Result<&EpubMetadata> {
        Ok(&self.book()?.metadata)
    }

    pub fn chapters(&self) -> Result<&[Chapter]> {
        Ok(&self.book()?.chapters)
    }

    /// Zip entry name of the package document in use
    pub fn package_path(&self) -> Result<&str> {
        Ok(&self.book()?.package_path)
    }

    pub fn table_of_contents(&self) -> Result<Vec<TocItem>> {
        Ok(self
            .book()?
            .chapters
            .iter()
            .map(|chapter| TocItem {
                title: chapter.title.clone(),
                chapter_index: chapter.index,
            })
            .collect())
    }

    /// Raw markup of one chapter
    ///
    /// A spine entry whose file is missing from the container is a `Format`
    /// error.
    pub fn chapter_content(&self, index: usize) -> Result<String> {
        let book = self.book()?;
        check_index(index, book.chapters.len())?;

        let chapter = &book.chapters[index];
        let bytes = book
            .archive
            .with_entry(&chapter.href, |reader| {
                let mut buf = Vec::new();
                reader.read_to_end(&mut buf)?;
                Ok(buf)
            })?
            .ok_or_else(|| {
                DocumentError::Format(format!("Chapter file {} not found", chapter.href))
            })?;

        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

impl DocumentReader for EpubReader {
    fn format(&self) -> BookFormat {
        BookFormat::Epub
    }

    fn open(&mut self, path: &Path) -> Result<DocumentSummary> {
        self.close();

        let book = Self::load(path)?;
        let unit_count = book.chapters.len();
        tracing::info!(
            "Opened EPUB {:?}: \"{}\" by {}, {} chapters",
            path,
            book.metadata.title,
            book.metadata.author,
            unit_count
        );

        self.state = State::Open(book);
        Ok(DocumentSummary {
            format: BookFormat::Epub,
            path: path.to_path_buf(),
            unit_count,
        })
    }

    fn unit_count(&self) -> Result<usize> {
        Ok(self.book()?.chapters.len())
    }

    fn fetch(&self, index: usize) -> Result<Content> {
        self.chapter_content(index).map(Content::Markup)
    }

    fn close(&mut self) {
        if let State::Open(book) = std::mem::replace(&mut self.state, State::Closed) {
            tracing::debug!("Closed EPUB {:?}", book.path);
        }
    }

    fn is_open(&self) -> bool {
        matches!(self.state, State::Open(_))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::{FileOptions, ZipWriter};

    pub(crate) const CONTAINER: &str = r#"<?xml version="1.0"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>"#;

    pub(crate) const OPF: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" xmlns:dc="http://purl.org/dc/elements/1.1/" version="2.0">
  <metadata>
    <dc:title>Test Book</dc:title>
    <dc:creator>Jane Doe</dc:creator>
    <dc:identifier opf:scheme="ISBN" xmlns:opf="http://www.idpf.org/2007/opf">978-3-16-148410-0</dc:identifier>
  </metadata>
  <manifest>
    <item id="c1" href="chap1.xhtml" media-type="application/xhtml+xml"/>
    <item id="c2" href="chap2.xhtml" media-type="application/xhtml+xml"/>
  </manifest>
  <spine>
    <itemref idref="c1"/>
    <itemref idref="c2"/>
  </spine>
</package>"#;

    pub(crate) const CHAP1: &str = "<html><body><p>One</p></body></html>";
    pub(crate) const CHAP2: &str = "<html><body><p>Two</p></body></html>";

    pub(crate) fn write_zip(path: &Path, files: &[(&str, &str)]) {
        let file = std::fs::File::create(path).unwrap();
        let mut zip = ZipWriter::new(file);
        let options = FileOptions::default();

        for (name, content) in files {
            zip.start_file(*name, options).unwrap();
            zip.write_all(content.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
    }

    /// Two-chapter book laid out under OEBPS/
    pub(crate) fn sample_epub(dir: &Path) -> PathBuf {
        let path = dir.join("book.epub");
        write_zip(
            &path,
            &[
                ("mimetype", "application/epub+zip"),
                ("META-INF/container.xml", CONTAINER),
                ("OEBPS/content.opf", OPF),
                ("OEBPS/chap1.xhtml", CHAP1),
                ("OEBPS/chap2.xhtml", CHAP2),
            ],
        );
        path
    }

    #[test]
    fn test_open_and_fetch() {
        let dir = tempfile::tempdir().unwrap();
        let path = sample_epub(dir.path());

        let mut reader = EpubReader::new();
        let summary = reader.open(&path).unwrap();
        assert_eq!(summary.unit_count, 2);
        assert_eq!(summary.format, BookFormat::Epub);
        assert_eq!(reader.unit_count().unwrap(), 2);

        match reader.fetch(0).unwrap() {
            Content::Markup(text) => assert_eq!(text, CHAP1),
            Content::Image(_) => panic!("EPUB fetch returned an image"),
        }
        assert_eq!(reader.chapter_content(1).unwrap(), CHAP2);
    }

    #[test]
    fn test_chapters_and_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let path = sample_epub(dir.path());

        let mut reader = EpubReader::new();
        reader.open(&path).unwrap();

        let chapters = reader.chapters().unwrap();
        assert_eq!(chapters[0].href, "OEBPS/chap1.xhtml");
        assert_eq!(chapters[1].title, "Chapter 2");
        assert_eq!(reader.package_path().unwrap(), "OEBPS/content.opf");

        let meta = reader.metadata().unwrap();
        assert_eq!(meta.title, "Test Book");
        assert_eq!(meta.author, "Jane Doe");
        assert_eq!(meta.isbn, "978-3-16-148410-0");

        let toc = reader.table_of_contents().unwrap();
        assert_eq!(
            toc,
            vec![
                TocItem { title: "Chapter 1".into(), chapter_index: 0 },
                TocItem { title: "Chapter 2".into(), chapter_index: 1 },
            ]
        );
    }

    #[test]
    fn test_index_bounds() {
        let dir = tempfile::tempdir().unwrap();
        let path = sample_epub(dir.path());

        let mut reader = EpubReader::new();
        reader.open(&path).unwrap();

        assert!(reader.fetch(1).is_ok());
        assert!(matches!(
            reader.fetch(2),
            Err(DocumentError::Index { index: 2, count: 2 })
        ));
        assert!(matches!(reader.fetch(usize::MAX), Err(DocumentError::Index { .. })));
    }

    #[test]
    fn test_reopen_is_stable() {
        let dir = tempfile::tempdir().unwrap();
        let path = sample_epub(dir.path());

        let mut reader = EpubReader::new();
        reader.open(&path).unwrap();
        let first_count = reader.unit_count().unwrap();
        let first: Vec<String> = reader.chapters().unwrap().iter().map(|c| c.title.clone()).collect();

        reader.open(&path).unwrap();
        let second: Vec<String> = reader.chapters().unwrap().iter().map(|c| c.title.clone()).collect();

        assert_eq!(reader.unit_count().unwrap(), first_count);
        assert_eq!(first, second);
    }

    #[test]
    fn test_fallback_to_default_package() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flat.epub");
        let opf = OPF.replace("chap1.xhtml", "one.xhtml");
        write_zip(
            &path,
            &[("content.opf", opf.as_str()), ("one.xhtml", CHAP1), ("chap2.xhtml", CHAP2)],
        );

        let mut reader = EpubReader::new();
        assert_eq!(reader.open(&path).unwrap().unit_count, 2);
        assert_eq!(reader.chapters().unwrap()[0].href, "one.xhtml");
        assert_eq!(reader.chapter_content(0).unwrap(), CHAP1);
    }

    #[test]
    fn test_missing_package_is_format_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.epub");
        write_zip(&path, &[("META-INF/container.xml", CONTAINER)]);

        let mut reader = EpubReader::new();
        assert!(matches!(reader.open(&path), Err(DocumentError::Format(_))));
        assert!(!reader.is_open());
    }

    #[test]
    fn test_missing_spine_targets_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gaps.epub");
        let opf = OPF.replace(r#"<itemref idref="c1"/>"#, r#"<itemref idref="nav"/><itemref idref="c1"/>"#);
        write_zip(
            &path,
            &[
                ("META-INF/container.xml", CONTAINER),
                ("OEBPS/content.opf", opf.as_str()),
                ("OEBPS/chap1.xhtml", CHAP1),
            ],
        );

        let mut reader = EpubReader::new();
        assert_eq!(reader.open(&path).unwrap().unit_count, 2);
        assert_eq!(reader.chapter_content(0).unwrap(), CHAP1);
        // listed in the spine but absent from the container
        assert!(matches!(reader.chapter_content(1), Err(DocumentError::Format(_))));
    }

    #[test]
    fn test_not_a_zip_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fake.epub");
        std::fs::write(&path, b"plain text").unwrap();

        let mut reader = EpubReader::new();
        assert!(matches!(reader.open(&path), Err(DocumentError::Io(_))));
    }

    #[test]
    fn test_close_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = sample_epub(dir.path());

        let mut reader = EpubReader::new();
        reader.close();
        reader.open(&path).unwrap();
        reader.close();
        reader.close();

        assert!(!reader.is_open());
        assert!(matches!(reader.unit_count(), Err(DocumentError::NotOpen)));
        assert!(matches!(reader.metadata(), Err(DocumentError::NotOpen)));
    }

    #[test]
    fn test_failed_open_closes_previous() {
        let dir = tempfile::tempdir().unwrap();
        let path = sample_epub(dir.path());

        let mut reader = EpubReader::new();
        reader.open(&path).unwrap();
        assert!(reader.open(&dir.path().join("missing.epub")).is_err());
        assert!(!reader.is_open());
    }
}
