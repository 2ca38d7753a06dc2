///! Comic archive reader (CBZ, CBR, CB7)
///!
///! Pages are the image entries of the container in natural order. Every
///! fetch extracts and decodes its page again; nothing is cached.
use image::RgbaImage;
use std::path::{Path, PathBuf};

use super::{check_index, BookFormat, Content, DocumentReader, DocumentSummary};
use crate::archive::{open_archive, sort_pages, Archive, MAX_ENTRY_SIZE};
use crate::image_processor::{create_cover, decode_rgba, detect_page_format, CoverConfig};
use crate::utils::error::{DocumentError, Result};

struct OpenComic {
    archive: Box<dyn Archive>,
    path: PathBuf,
    pages: Vec<String>,
}

enum State {
    Closed,
    Open(OpenComic),
}

/// Page-image archive reader holding at most one open comic
pub struct ComicReader {
    format: BookFormat,
    max_entry_size: u64,
    state: State,
}

impl ComicReader {
    /// `format` is the declared format; the container type itself is
    /// detected from the file.
    pub fn new(format: BookFormat) -> Self {
        Self {
            format,
            max_entry_size: MAX_ENTRY_SIZE,
            state: State::Closed,
        }
    }

    /// Refuse page entries larger than `max_entry_size` bytes
    pub fn with_max_entry_size(mut self, max_entry_size: u64) -> Self {
        self.max_entry_size = max_entry_size;
        self
    }

    fn comic(&self) -> Result<&OpenComic> {
        match &self.state {
            State::Open(comic) => Ok(comic),
            State::Closed => Err(DocumentError::NotOpen),
        }
    }

    fn load(path: &Path) -> Result<OpenComic> {
        let archive = open_archive(path)?;

        let names = archive
            .entries()?
            .into_iter()
            .filter(|entry| !entry.is_directory)
            .map(|entry| entry.name);
        let pages = sort_pages(names);

        Ok(OpenComic {
            archive,
            path: path.to_path_buf(),
            pages,
        })
    }

    /// Page entry names in reading order
    pub fn page_names(&self) -> Result<&[String]> {
        Ok(&self.comic()?.pages)
    }

    /// Raw bytes of one page, header-checked but not decoded
    pub fn page_bytes(&self, index: usize) -> Result<Vec<u8>> {
        let comic = self.comic()?;
        check_index(index, comic.pages.len())?;

        let name = &comic.pages[index];
        let data = comic.archive.extract_entry(name, self.max_entry_size)?;

        let format = detect_page_format(&data)
            .map_err(|e| DocumentError::Image(format!("Page {} ({}): {}", index, name, e)))?;
        tracing::debug!("Page {} is {} ({} bytes)", name, format.as_str(), data.len());

        Ok(data)
    }

    /// Decode one page
    pub fn page(&self, index: usize) -> Result<RgbaImage> {
        let data = self.page_bytes(index)?;
        decode_rgba(&data)
    }

    /// Thumbnail of the first page, flattened on white
    pub fn cover(&self, config: &CoverConfig) -> Result<RgbaImage> {
        let data = self.page_bytes(0)?;
        create_cover(&data, config)
    }
}

impl DocumentReader for ComicReader {
    fn format(&self) -> BookFormat {
        self.format
    }

    fn open(&mut self, path: &Path) -> Result<DocumentSummary> {
        self.close();

        let comic = Self::load(path)?;
        let unit_count = comic.pages.len();
        tracing::info!(
            "Opened {} {:?} ({} container): {} pages",
            self.format.as_str(),
            path,
            comic.archive.archive_type().as_str(),
            unit_count
        );

        self.state = State::Open(comic);
        Ok(DocumentSummary {
            format: self.format,
            path: path.to_path_buf(),
            unit_count,
        })
    }

    fn unit_count(&self) -> Result<usize> {
        Ok(self.comic()?.pages.len())
    }

    fn fetch(&self, index: usize) -> Result<Content> {
        self.page(index).map(Content::Image)
    }

    fn close(&mut self) {
        if let State::Open(comic) = std::mem::replace(&mut self.state, State::Closed) {
            tracing::debug!("Closed comic {:?}", comic.path);
        }
    }

    fn is_open(&self) -> bool {
        matches!(self.state, State::Open(_))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::image_processor::decoder::tests::encoded_image;
    use crate::image_processor::ResizeFilter;
    use image::ImageFormat;
    use std::io::Write;
    use zip::write::{FileOptions, ZipWriter};

    pub(crate) fn write_cbz(path: &Path, files: &[(&str, Vec<u8>)]) {
        let file = std::fs::File::create(path).unwrap();
        let mut zip = ZipWriter::new(file);
        let options = FileOptions::default();

        for (name, content) in files {
            if name.ends_with('/') {
                zip.add_directory(name.trim_end_matches('/'), options).unwrap();
            } else {
                zip.start_file(*name, options).unwrap();
                zip.write_all(content).unwrap();
            }
        }
        zip.finish().unwrap();
    }

    /// Pages whose width equals their number, stored out of order
    pub(crate) fn sample_cbz(dir: &Path) -> PathBuf {
        let path = dir.join("issue.cbz");
        write_cbz(
            &path,
            &[
                ("page1.jpg", encoded_image(1, 4, ImageFormat::Jpeg)),
                ("page10.jpg", encoded_image(10, 4, ImageFormat::Jpeg)),
                ("ComicInfo.xml", b"<ComicInfo/>".to_vec()),
                ("extras/", Vec::new()),
                ("page2.jpg", encoded_image(2, 4, ImageFormat::Jpeg)),
            ],
        );
        path
    }

    fn page_width(reader: &ComicReader, index: usize) -> u32 {
        match reader.fetch(index).unwrap() {
            Content::Image(img) => img.width(),
            Content::Markup(_) => panic!("comic fetch returned markup"),
        }
    }

    #[test]
    fn test_pages_in_natural_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = sample_cbz(dir.path());

        let mut reader = ComicReader::new(BookFormat::Cbz);
        assert_eq!(reader.open(&path).unwrap().unit_count, 3);
        assert_eq!(
            reader.page_names().unwrap(),
            &["page1.jpg", "page2.jpg", "page10.jpg"]
        );

        assert_eq!(page_width(&reader, 0), 1);
        assert_eq!(page_width(&reader, 1), 2);
        assert_eq!(page_width(&reader, 2), 10);
    }

    #[test]
    fn test_fetch_is_repeatable_in_any_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = sample_cbz(dir.path());

        let mut reader = ComicReader::new(BookFormat::Cbz);
        reader.open(&path).unwrap();

        assert_eq!(page_width(&reader, 2), 10);
        assert_eq!(page_width(&reader, 0), 1);
        assert_eq!(page_width(&reader, 2), 10);
    }

    #[test]
    fn test_index_bounds() {
        let dir = tempfile::tempdir().unwrap();
        let path = sample_cbz(dir.path());

        let mut reader = ComicReader::new(BookFormat::Cbz);
        reader.open(&path).unwrap();

        assert!(matches!(
            reader.fetch(3),
            Err(DocumentError::Index { index: 3, count: 3 })
        ));
        assert!(matches!(reader.page_bytes(99), Err(DocumentError::Index { .. })));
    }

    #[test]
    fn test_open_supersedes_previous() {
        let dir = tempfile::tempdir().unwrap();
        let first = sample_cbz(dir.path());
        let second = dir.path().join("single.cbz");
        write_cbz(&second, &[("001.png", encoded_image(7, 7, ImageFormat::Png))]);

        let mut reader = ComicReader::new(BookFormat::Cbz);
        reader.open(&first).unwrap();
        reader.open(&second).unwrap();

        assert_eq!(reader.unit_count().unwrap(), 1);
        assert_eq!(page_width(&reader, 0), 7);
    }

    #[test]
    fn test_failed_open_leaves_reader_closed() {
        let dir = tempfile::tempdir().unwrap();
        let path = sample_cbz(dir.path());
        let corrupt = dir.path().join("corrupt.cbz");
        std::fs::write(&corrupt, b"PK\x03\x04 truncated").unwrap();

        let mut reader = ComicReader::new(BookFormat::Cbz);
        reader.open(&path).unwrap();

        assert!(matches!(reader.open(&corrupt), Err(DocumentError::Io(_))));
        assert!(!reader.is_open());
        assert!(matches!(reader.fetch(0), Err(DocumentError::NotOpen)));
    }

    #[test]
    fn test_close_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = sample_cbz(dir.path());

        let mut reader = ComicReader::new(BookFormat::Cbz);
        reader.close();
        reader.open(&path).unwrap();
        reader.close();
        reader.close();

        assert!(!reader.is_open());
        assert!(matches!(reader.unit_count(), Err(DocumentError::NotOpen)));
    }

    #[test]
    fn test_mislabelled_page_is_image_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.cbz");
        write_cbz(&path, &[("page1.jpg", b"not really a jpeg".to_vec())]);

        let mut reader = ComicReader::new(BookFormat::Cbz);
        reader.open(&path).unwrap();
        assert!(matches!(reader.fetch(0), Err(DocumentError::Image(_))));
    }

    #[test]
    fn test_oversized_page_refused() {
        let dir = tempfile::tempdir().unwrap();
        let path = sample_cbz(dir.path());

        let mut reader = ComicReader::new(BookFormat::Cbz).with_max_entry_size(8);
        reader.open(&path).unwrap();
        assert!(matches!(reader.fetch(0), Err(DocumentError::Archive(_))));
    }

    #[test]
    fn test_cbr_label_on_zip_container() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("really-a-zip.cbr");
        write_cbz(&path, &[("a.png", encoded_image(3, 3, ImageFormat::Png))]);

        let mut reader = ComicReader::new(BookFormat::Cbr);
        let summary = reader.open(&path).unwrap();
        assert_eq!(summary.format, BookFormat::Cbr);
        assert_eq!(summary.unit_count, 1);
    }

    #[test]
    fn test_cover() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cover.cbz");
        write_cbz(&path, &[("01.png", encoded_image(40, 80, ImageFormat::Png))]);

        let mut reader = ComicReader::new(BookFormat::Cbz);
        reader.open(&path).unwrap();
        assert_eq!(
            reader.cover(&CoverConfig::with_size(20, 20)).unwrap().dimensions(),
            (10, 20)
        );

        let sharp = CoverConfig {
            resize_filter: ResizeFilter::Lanczos3,
            ..CoverConfig::with_size(8, 40)
        };
        assert_eq!(reader.cover(&sharp).unwrap().dimensions(), (8, 16));
    }

    #[test]
    fn test_empty_comic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.cbz");
        write_cbz(&path, &[("notes.txt", b"no pages".to_vec())]);

        let mut reader = ComicReader::new(BookFormat::Cbz);
        assert_eq!(reader.open(&path).unwrap().unit_count, 0);
        assert!(matches!(reader.fetch(0), Err(DocumentError::Index { .. })));
        assert!(reader.cover(&CoverConfig::with_size(10, 10)).is_err());
    }
}
