///! Shared utilities for archive processing
///!
///! Provides page-image detection and the natural-order comparator
use std::cmp::Ordering;
use std::path::Path;

/// Default maximum uncompressed size for a single entry (32MB)
pub const MAX_ENTRY_SIZE: u64 = 32 * 1024 * 1024;

/// Extensions recognised as comic pages
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "bmp"];

/// Check if filename is a page image based on extension
pub fn is_image_file(name: &str) -> bool {
    if let Some(ext) = Path::new(name).extension().and_then(|s| s.to_str()) {
        IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str())
    } else {
        false
    }
}

/// Split a name into maximal runs of ASCII digits and non-digits
fn split_runs(s: &str) -> Vec<&str> {
    let mut runs = Vec::new();
    let mut start = 0;
    let mut prev_digit: Option<bool> = None;

    for (i, c) in s.char_indices() {
        let digit = c.is_ascii_digit();
        if let Some(prev) = prev_digit {
            if prev != digit {
                runs.push(&s[start..i]);
                start = i;
            }
        }
        prev_digit = Some(digit);
    }

    if start < s.len() {
        runs.push(&s[start..]);
    }
    runs
}

/// Natural-order comparison ("page2" before "page10")
///
/// Runs are compared pairwise: numerically when both parse as integers,
/// lexically otherwise. The first difference wins; when every compared run
/// is equal the name with fewer runs sorts first.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let a_runs = split_runs(a);
    let b_runs = split_runs(b);

    for (x, y) in a_runs.iter().zip(b_runs.iter()) {
        let ordering = match (x.parse::<u64>(), y.parse::<u64>()) {
            (Ok(xn), Ok(yn)) => xn.cmp(&yn),
            _ => x.cmp(y),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }

    a_runs.len().cmp(&b_runs.len())
}

/// Keep page images only and order them naturally
pub fn sort_pages<I>(names: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut pages: Vec<String> = names.into_iter().filter(|n| is_image_file(n)).collect();
    pages.sort_by(|a, b| natural_cmp(a, b));
    pages
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_image_file() {
        assert!(is_image_file("test.jpg"));
        assert!(is_image_file("TEST.PNG"));
        assert!(is_image_file("image.webp"));
        assert!(is_image_file("photo.JPEG"));
        assert!(is_image_file("graphic.bmp"));
        assert!(is_image_file("anim.gif"));
        assert!(is_image_file("chapter1/page01.jpg"));

        assert!(!is_image_file("readme.txt"));
        assert!(!is_image_file("ComicInfo.xml"));
        assert!(!is_image_file("scan.tiff"));
        assert!(!is_image_file("noextension"));
        assert!(!is_image_file(".jpg"));
    }

    #[test]
    fn test_split_runs() {
        assert_eq!(split_runs("page10.jpg"), vec!["page", "10", ".jpg"]);
        assert_eq!(split_runs("12ab3"), vec!["12", "ab", "3"]);
        assert_eq!(split_runs("abc"), vec!["abc"]);
        assert!(split_runs("").is_empty());
    }

    #[test]
    fn test_natural_cmp_numeric_suffix() {
        assert_eq!(natural_cmp("page2", "page10"), Ordering::Less);
        assert_eq!(natural_cmp("page10", "page100"), Ordering::Less);
        assert_eq!(natural_cmp("page2", "page100"), Ordering::Less);
        assert_eq!(natural_cmp("page10", "page2"), Ordering::Greater);
        assert_eq!(natural_cmp("page1.jpg", "page1.jpg"), Ordering::Equal);
    }

    #[test]
    fn test_natural_cmp_lexical_fallback() {
        assert_eq!(natural_cmp("apple.jpg", "banana.jpg"), Ordering::Less);
        // digit run against letter run compares lexically
        assert_eq!(natural_cmp("1a", "a1"), Ordering::Less);
        // uppercase sorts before lowercase
        assert_eq!(natural_cmp("Page", "page"), Ordering::Less);
    }

    #[test]
    fn test_natural_cmp_fewer_runs_first() {
        assert_eq!(natural_cmp("page", "page1"), Ordering::Less);
        assert_eq!(natural_cmp("page1", "page1a"), Ordering::Less);
        assert_eq!(natural_cmp("", "a"), Ordering::Less);
    }

    #[test]
    fn test_natural_cmp_leading_zeros() {
        // numerically equal runs fall through to the following runs
        assert_eq!(natural_cmp("p01.jpg", "p1.png"), Ordering::Less);
        assert_eq!(natural_cmp("p007", "p7"), Ordering::Equal);
    }

    #[test]
    fn test_natural_cmp_overflowing_numbers() {
        // too large for u64: compared lexically
        let a = "page99999999999999999999999";
        let b = "page100000000000000000000000";
        assert_eq!(natural_cmp(a, b), Ordering::Greater);
    }

    #[test]
    fn test_sort_pages() {
        let names = vec![
            "page10.jpg".to_string(),
            "readme.txt".to_string(),
            "page2.jpg".to_string(),
            "page1.jpg".to_string(),
        ];
        assert_eq!(sort_pages(names), vec!["page1.jpg", "page2.jpg", "page10.jpg"]);
    }

    #[test]
    fn test_sort_pages_empty() {
        assert!(sort_pages(Vec::new()).is_empty());
    }

    #[test]
    fn test_max_entry_size() {
        assert_eq!(MAX_ENTRY_SIZE, 32 * 1024 * 1024);
    }
}
