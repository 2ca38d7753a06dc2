///! WebDAV client (also used for Nextcloud)
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{CONTENT_TYPE, HeaderValue};
use reqwest::{Method, StatusCode};
use std::io::{BufReader, Write};
use url::Url;

use super::multistatus::parse_multistatus;
use super::{NetworkSource, RemoteClient, RemoteFileEntry, Timeouts};
use crate::utils::error::{RemoteError, RemoteResult};

const PROPFIND_BODY: &str = concat!(
    r#"<?xml version="1.0" encoding="utf-8"?>"#,
    r#"<D:propfind xmlns:D="DAV:"><D:prop>"#,
    "<D:displayname/><D:getcontentlength/><D:getlastmodified/><D:resourcetype/>",
    "</D:prop></D:propfind>"
);

pub struct WebDavClient {
    timeouts: Timeouts,
}

impl WebDavClient {
    pub fn new(timeouts: Timeouts) -> Self {
        Self { timeouts }
    }

    fn http(&self) -> RemoteResult<Client> {
        Client::builder()
            .connect_timeout(self.timeouts.connect)
            .timeout(self.timeouts.read)
            .user_agent(concat!("libreshelf/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| RemoteError::Connect(format!("Failed to build HTTP client: {}", e)))
    }

    fn request(&self, method: Method, url: Url, source: &NetworkSource) -> RemoteResult<RequestBuilder> {
        let request = self.http()?.request(method, url);
        Ok(if source.username.is_empty() {
            request
        } else {
            request.basic_auth(&source.username, Some(&source.password))
        })
    }
}

impl Default for WebDavClient {
    fn default() -> Self {
        Self::new(Timeouts::default())
    }
}

/// `https` on port 443, `http` otherwise; the port is written out unless it
/// is 80 or 443
pub fn base_url(source: &NetworkSource) -> String {
    let port = source.effective_port();
    let scheme = if port == 443 { "https" } else { "http" };
    match port {
        80 | 443 => format!("{}://{}", scheme, source.host),
        _ => format!("{}://{}:{}", scheme, source.host, port),
    }
}

/// Unencoded server path of `path` under the source's base path
pub fn server_path(source: &NetworkSource, path: &str) -> String {
    let segments: Vec<&str> = source
        .path
        .split('/')
        .chain(path.split('/'))
        .filter(|s| !s.is_empty())
        .collect();
    format!("/{}", segments.join("/"))
}

/// Full request URL for `path`, percent-encoding each segment
///
/// Collections get a trailing slash so servers answer directly instead of
/// redirecting.
pub fn resource_url(source: &NetworkSource, path: &str, collection: bool) -> RemoteResult<Url> {
    let mut url = Url::parse(&base_url(source))?;
    {
        let mut segments = url
            .path_segments_mut()
            .map_err(|_| RemoteError::Protocol(format!("Cannot use {} as a base", source.host)))?;
        segments.clear();
        for segment in server_path(source, path).split('/').filter(|s| !s.is_empty()) {
            segments.push(segment);
        }
        if collection {
            segments.push("");
        }
    }
    Ok(url)
}

fn send(request: RequestBuilder) -> RemoteResult<Response> {
    let response = request.send().map_err(|e| {
        if e.is_connect() || e.is_timeout() {
            RemoteError::Connect(e.to_string())
        } else {
            RemoteError::Http(e)
        }
    })?;

    match response.status() {
        status if status.is_success() => Ok(response),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(RemoteError::Auth(format!(
            "{} answered {}",
            response.url(),
            response.status()
        ))),
        status => Err(RemoteError::Status(status.as_u16())),
    }
}

impl RemoteClient for WebDavClient {
    fn list(&self, source: &NetworkSource, path: &str) -> RemoteResult<Vec<RemoteFileEntry>> {
        let url = resource_url(source, path, true)?;
        tracing::debug!("PROPFIND {}", url);

        let method = Method::from_bytes(b"PROPFIND")
            .map_err(|e| RemoteError::Protocol(format!("PROPFIND: {}", e)))?;
        let request = self
            .request(method, url, source)?
            .header("Depth", "1")
            .header(
                CONTENT_TYPE,
                HeaderValue::from_static("application/xml; charset=utf-8"),
            )
            .body(PROPFIND_BODY);

        let response = send(request)?;
        parse_multistatus(
            BufReader::new(response),
            &server_path(source, path),
            &server_path(source, ""),
        )
    }

    fn download(
        &self,
        source: &NetworkSource,
        remote_path: &str,
        out: &mut dyn Write,
    ) -> RemoteResult<u64> {
        let url = resource_url(source, remote_path, false)?;
        tracing::debug!("GET {}", url);

        let mut response = send(self.request(Method::GET, url, source)?)?;
        let written = response.copy_to(out)?;
        Ok(written)
    }

    fn test_connection(&self, source: &NetworkSource) -> RemoteResult<()> {
        let url = resource_url(source, "", true)?;
        tracing::debug!("OPTIONS {}", url);

        send(self.request(Method::OPTIONS, url, source)?)?;
        Ok(())
    }
}
