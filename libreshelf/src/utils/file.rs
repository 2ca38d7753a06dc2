use crate::document::BookFormat;
///! File system utility functions
use std::path::Path;

/// Lowercased extension of a file name, empty when there is none
pub fn file_extension(name: &str) -> String {
    Path::new(name)
        .extension()
        .and_then(|s| s.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_default()
}

/// Detect the declared book format from a path's extension
///
/// # Supported Extensions
/// - EPUB: .epub
/// - PDF: .pdf
/// - Comic archives: .cbz, .cbr, .cb7
///
/// Anything else maps to [`BookFormat::Unknown`]; no reader handles it.
pub fn detect_book_format(path: &Path) -> BookFormat {
    path.extension()
        .and_then(|s| s.to_str())
        .map(BookFormat::from_extension)
        .unwrap_or(BookFormat::Unknown)
}

/// Check whether a file name looks like something the library can read
pub fn is_book_file(name: &str) -> bool {
    BookFormat::from_extension(&file_extension(name)) != BookFormat::Unknown
}

/// Format a byte count for display (B, KB, MB, GB; integer division)
pub fn format_file_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    match bytes {
        b if b < KB => format!("{} B", b),
        b if b < MB => format!("{} KB", b / KB),
        b if b < GB => format!("{} MB", b / MB),
        b => format!("{} GB", b / GB),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_book_format() {
        assert_eq!(detect_book_format(Path::new("a/b/book.epub")), BookFormat::Epub);
        assert_eq!(detect_book_format(Path::new("manual.PDF")), BookFormat::Pdf);
        assert_eq!(detect_book_format(Path::new("issue1.cbz")), BookFormat::Cbz);
        assert_eq!(detect_book_format(Path::new("issue1.CBR")), BookFormat::Cbr);
        assert_eq!(detect_book_format(Path::new("issue1.cb7")), BookFormat::Cb7);
        assert_eq!(detect_book_format(Path::new("notes.txt")), BookFormat::Unknown);
        assert_eq!(detect_book_format(Path::new("noextension")), BookFormat::Unknown);
    }

    #[test]
    fn test_is_book_file() {
        assert!(is_book_file("Dune.epub"));
        assert!(is_book_file("scan.Pdf"));
        assert!(is_book_file("vol 01.cbr"));
        assert!(!is_book_file("cover.jpg"));
        assert!(!is_book_file(""));
    }

    #[test]
    fn test_format_file_size() {
        assert_eq!(format_file_size(0), "0 B");
        assert_eq!(format_file_size(1023), "1023 B");
        assert_eq!(format_file_size(1024), "1 KB");
        assert_eq!(format_file_size(5 * 1024 * 1024 + 10), "5 MB");
        assert_eq!(format_file_size(3 * 1024 * 1024 * 1024), "3 GB");
    }

    #[test]
    fn test_file_extension() {
        assert_eq!(file_extension("Page.JPG"), "jpg");
        assert_eq!(file_extension("archive.tar.gz"), "gz");
        assert_eq!(file_extension("README"), "");
    }
}
