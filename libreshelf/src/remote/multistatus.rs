///! WebDAV `207 Multi-Status` listing parser
///!
///! A small state machine over quick-xml events. Element names are matched on
///! their local part, so `D:href`, `d:href` and `href` are all accepted.
use chrono::{DateTime, Utc};
use percent_encoding::percent_decode_str;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::io::BufRead;

use super::{child_path, RemoteFileEntry};
use crate::utils::error::{RemoteError, RemoteResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Prop {
    Href,
    DisplayName,
    ContentLength,
    LastModified,
}

#[derive(Debug, Default)]
struct Response {
    href: String,
    display_name: String,
    content_length: String,
    last_modified: String,
    is_collection: bool,
}

/// Parse a PROPFIND body into the children of `request_path`
///
/// `request_path` is the unencoded server path that was queried and
/// `base_path` the source's base path; returned entry paths are relative to
/// the latter.
pub fn parse_multistatus<R: BufRead>(
    input: R,
    request_path: &str,
    base_path: &str,
) -> RemoteResult<Vec<RemoteFileEntry>> {
    let mut reader = Reader::from_reader(input);
    let mut buf = Vec::new();

    let mut entries = Vec::new();
    let mut current: Option<Response> = None;
    let mut capture: Option<Prop> = None;

    loop {
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|e| RemoteError::Parse(format!("Malformed multistatus: {}", e)))?;

        match event {
            Event::Start(el) => match el.local_name().as_ref() {
                b"response" => current = Some(Response::default()),
                b"href" => capture = Some(Prop::Href),
                b"displayname" => capture = Some(Prop::DisplayName),
                b"getcontentlength" => capture = Some(Prop::ContentLength),
                b"getlastmodified" => capture = Some(Prop::LastModified),
                b"collection" => mark_collection(&mut current),
                _ => {}
            },
            Event::Empty(el) => {
                if el.local_name().as_ref() == b"collection" {
                    mark_collection(&mut current);
                }
            }
            Event::Text(text) => {
                if let (Some(prop), Some(response)) = (capture, current.as_mut()) {
                    match text.decode() {
                        Ok(t) => push(response, prop, &t),
                        Err(_) => push(response, prop, &String::from_utf8_lossy(&text)),
                    }
                }
            }
            Event::CData(cdata) => {
                if let (Some(prop), Some(response)) = (capture, current.as_mut()) {
                    push(response, prop, &String::from_utf8_lossy(&cdata));
                }
            }
            Event::GeneralRef(entity) => {
                if let (Some(prop), Some(response)) = (capture, current.as_mut()) {
                    if let Ok(Some(ch)) = entity.resolve_char_ref() {
                        push(response, prop, ch.encode_utf8(&mut [0; 4]));
                    } else if let Some(resolved) = entity
                        .decode()
                        .ok()
                        .and_then(|name| quick_xml::escape::resolve_predefined_entity(&name))
                    {
                        push(response, prop, resolved);
                    }
                }
            }
            Event::End(el) => match el.local_name().as_ref() {
                b"response" => {
                    capture = None;
                    if let Some(response) = current.take() {
                        if let Some(entry) = to_entry(response, request_path, base_path) {
                            entries.push(entry);
                        }
                    }
                }
                b"href" | b"displayname" | b"getcontentlength" | b"getlastmodified" => {
                    capture = None
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    tracing::debug!("Multistatus for {}: {} entries", request_path, entries.len());
    Ok(entries)
}

fn mark_collection(current: &mut Option<Response>) {
    if let Some(response) = current.as_mut() {
        response.is_collection = true;
    }
}

fn push(response: &mut Response, prop: Prop, text: &str) {
    let field = match prop {
        Prop::Href => &mut response.href,
        Prop::DisplayName => &mut response.display_name,
        Prop::ContentLength => &mut response.content_length,
        Prop::LastModified => &mut response.last_modified,
    };
    field.push_str(text);
}

/// Decoded server path of an href, which may be absolute or a full URL
fn href_path(href: &str) -> String {
    let href = href.trim();
    let path = match href.find("://") {
        Some(pos) => {
            let rest = &href[pos + 3..];
            rest.find('/').map_or("/", |slash| &rest[slash..])
        }
        None => href,
    };
    percent_decode_str(path).decode_utf8_lossy().into_owned()
}

fn to_entry(response: Response, request_path: &str, base_path: &str) -> Option<RemoteFileEntry> {
    let path = href_path(&response.href);
    let path = path.trim_matches('/');

    // The queried collection lists itself
    if path == request_path.trim_matches('/') {
        return None;
    }

    let name = match response.display_name.trim() {
        "" => path.rsplit('/').find(|s| !s.is_empty()).unwrap_or_default(),
        display => display,
    };
    if name.is_empty() {
        return None;
    }

    let base = base_path.trim_matches('/');
    let relative = if base.is_empty() {
        path
    } else {
        path.strip_prefix(base)
            .and_then(|rest| rest.strip_prefix('/'))
            .unwrap_or(path)
    };

    Some(RemoteFileEntry {
        name: name.to_string(),
        path: if relative.is_empty() {
            child_path("", name)
        } else {
            relative.to_string()
        },
        is_directory: response.is_collection,
        size: response.content_length.trim().parse().unwrap_or(0),
        last_modified: parse_http_date(&response.last_modified),
    })
}

/// RFC 1123 date as used by `getlastmodified`; `None` when unparseable
pub fn parse_http_date(text: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(text.trim())
        .ok()
        .map(|date| date.with_timezone(&Utc))
}
