use percent_encoding::percent_decode_str;
///! EPUB container pointer and package document parsing
///!
///! Both documents are pulled event by event straight off the zip entry
///! stream. Element and attribute names are matched on their local part, so
///! `dc:title` and `title` are treated alike.
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::HashMap;
use std::io::{BufRead, BufReader, Read};

use crate::utils::error::{DocumentError, Result};

/// Fixed location of the container pointer file
pub const CONTAINER_PATH: &str = "META-INF/container.xml";

/// Package document used when the pointer file names none
pub const DEFAULT_PACKAGE_PATH: &str = "content.opf";

/// Descriptive metadata from the package `<metadata>` block
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EpubMetadata {
    pub title: String,
    pub author: String,
    pub publisher: String,
    pub description: String,
    pub language: String,
    /// Identifier whose `scheme` is `ISBN`, empty when there is none
    pub isbn: String,
}

/// Everything the reader needs from the package document
#[derive(Debug, Default)]
pub struct Package {
    pub metadata: EpubMetadata,
    /// Manifest id → href, as written in the document
    pub manifest: HashMap<String, String>,
    /// Spine idrefs in reading order
    pub spine: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Title,
    Author,
    Publisher,
    Description,
    Language,
    Isbn,
}

fn xml_error(doc: &str, e: impl std::fmt::Display) -> DocumentError {
    DocumentError::Format(format!("Malformed {}: {}", doc, e))
}

/// Attribute value by local name, entity-unescaped
fn attribute(el: &BytesStart, local: &[u8]) -> Option<String> {
    el.attributes().filter_map(|a| a.ok()).find_map(|a| {
        if a.key.local_name().as_ref() != local {
            return None;
        }
        let raw = String::from_utf8_lossy(&a.value).into_owned();
        Some(match quick_xml::escape::unescape(&raw) {
            Ok(text) => text.into_owned(),
            Err(_) => raw,
        })
    })
}

/// Find the first `rootfile@full-path` in the container pointer document
pub fn parse_container(input: &mut dyn Read) -> Result<Option<String>> {
    let mut reader = Reader::from_reader(BufReader::new(input));
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(el)) | Ok(Event::Empty(el))
                if el.local_name().as_ref() == b"rootfile" =>
            {
                if let Some(path) = attribute(&el, b"full-path").filter(|p| !p.is_empty()) {
                    return Ok(Some(path));
                }
            }
            Ok(Event::Eof) => return Ok(None),
            Err(e) => return Err(xml_error("container.xml", e)),
            _ => {}
        }
        buf.clear();
    }
}

/// Parse metadata, manifest and spine in a single pass
pub fn parse_package<R: BufRead>(input: R) -> Result<Package> {
    let mut reader = Reader::from_reader(input);
    let mut buf = Vec::new();

    let mut package = Package::default();
    let mut in_metadata = false;
    let mut in_manifest = false;
    let mut in_spine = false;
    let mut capture: Option<(Field, String)> = None;

    loop {
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|e| xml_error("package document", e))?;

        match event {
            Event::Start(el) => match el.local_name().as_ref() {
                b"metadata" => in_metadata = true,
                b"manifest" => in_manifest = true,
                b"spine" => in_spine = true,
                _ if in_metadata => {
                    capture = metadata_field(&el).map(|field| (field, String::new()));
                }
                _ => collect_entry(&mut package, &el, in_manifest, in_spine),
            },
            Event::Empty(el) => collect_entry(&mut package, &el, in_manifest, in_spine),
            Event::Text(text) => {
                if let Some((_, value)) = capture.as_mut() {
                    match text.decode() {
                        Ok(t) => value.push_str(&t),
                        Err(_) => value.push_str(&String::from_utf8_lossy(&text)),
                    }
                }
            }
            Event::CData(cdata) => {
                if let Some((_, value)) = capture.as_mut() {
                    value.push_str(&String::from_utf8_lossy(&cdata));
                }
            }
            Event::GeneralRef(entity) => {
                if let Some((_, value)) = capture.as_mut() {
                    if let Ok(Some(ch)) = entity.resolve_char_ref() {
                        value.push(ch);
                    } else if let Some(resolved) = entity
                        .decode()
                        .ok()
                        .and_then(|name| quick_xml::escape::resolve_predefined_entity(&name))
                    {
                        value.push_str(resolved);
                    }
                }
            }
            Event::End(el) => match el.local_name().as_ref() {
                b"metadata" => {
                    in_metadata = false;
                    capture = None;
                }
                b"manifest" => in_manifest = false,
                b"spine" => in_spine = false,
                _ => {
                    if let Some((field, value)) = capture.take() {
                        store(&mut package.metadata, field, value.trim());
                    }
                }
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if package.metadata.title.is_empty() {
        package.metadata.title = "Unknown".to_string();
    }
    if package.metadata.author.is_empty() {
        package.metadata.author = "Unknown".to_string();
    }

    tracing::debug!(
        "Package parsed: {} manifest items, {} spine entries",
        package.manifest.len(),
        package.spine.len()
    );
    Ok(package)
}

/// Record a manifest `item` or spine `itemref`
fn collect_entry(package: &mut Package, el: &BytesStart, in_manifest: bool, in_spine: bool) {
    match el.local_name().as_ref() {
        b"item" if in_manifest => {
            if let (Some(id), Some(href)) = (attribute(el, b"id"), attribute(el, b"href")) {
                package.manifest.insert(id, href);
            }
        }
        b"itemref" if in_spine => {
            if let Some(idref) = attribute(el, b"idref") {
                package.spine.push(idref);
            }
        }
        _ => {}
    }
}

fn metadata_field(el: &BytesStart) -> Option<Field> {
    match el.local_name().as_ref() {
        b"title" => Some(Field::Title),
        b"creator" => Some(Field::Author),
        b"publisher" => Some(Field::Publisher),
        b"description" => Some(Field::Description),
        b"language" => Some(Field::Language),
        b"identifier" => match attribute(el, b"scheme") {
            Some(scheme) if scheme == "ISBN" => Some(Field::Isbn),
            _ => None,
        },
        _ => None,
    }
}

/// Later occurrences of the same element win
fn store(metadata: &mut EpubMetadata, field: Field, value: &str) {
    let slot = match field {
        Field::Title => &mut metadata.title,
        Field::Author => &mut metadata.author,
        Field::Publisher => &mut metadata.publisher,
        Field::Description => &mut metadata.description,
        Field::Language => &mut metadata.language,
        Field::Isbn => &mut metadata.isbn,
    };
    *slot = value.to_string();
}

/// Directory holding the package document, empty at the container root
pub fn package_dir(package_path: &str) -> &str {
    match package_path.rfind('/') {
        Some(pos) => &package_path[..pos],
        None => "",
    }
}

/// Resolve a manifest href against the package directory into a zip entry name
///
/// Fragments are dropped, percent-escapes decoded and `.`/`..` segments
/// folded.
pub fn resolve_href(dir: &str, href: &str) -> String {
    let href = href.split('#').next().unwrap_or_default();
    let decoded = percent_decode_str(href).decode_utf8_lossy();

    let mut segments: Vec<&str> = Vec::new();
    let joined = if dir.is_empty() {
        decoded.to_string()
    } else {
        format!("{}/{}", dir, decoded)
    };

    for segment in joined.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }
    segments.join("/")
}
