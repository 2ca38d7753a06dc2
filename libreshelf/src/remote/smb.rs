///! SMB client
///!
///! Backed by libsmbclient through `pavao`, compiled in with the default
///! `smb` feature. Builds with `--no-default-features` leave it out, and
///! every call then fails with `RemoteError::Unsupported`.
use std::io::Write;

use super::{NetworkSource, RemoteClient, RemoteFileEntry};
use crate::utils::error::{RemoteError, RemoteResult};

/// Stateless SMB client; timeouts are libsmbclient's own
#[derive(Debug, Default)]
pub struct SmbClient;

impl SmbClient {
    pub fn new() -> Self {
        Self
    }
}

/// `smb://host` with the port appended when it is not 445
pub fn server_url(source: &NetworkSource) -> String {
    match source.effective_port() {
        445 => format!("smb://{}", source.host),
        port => format!("smb://{}:{}", source.host, port),
    }
}

/// Split the source path into the share and the base directory inside it
pub fn share_and_base(source: &NetworkSource) -> (String, String) {
    let path = source.path.trim_matches('/');
    match path.split_once('/') {
        Some((share, base)) => (format!("/{}", share), base.trim_matches('/').to_string()),
        None => (format!("/{}", path), String::new()),
    }
}

/// Share-relative path of `path` under the base directory
#[cfg_attr(not(feature = "smb"), allow(dead_code))]
fn share_path(base: &str, path: &str) -> String {
    let segments: Vec<&str> = base
        .split('/')
        .chain(path.split('/'))
        .filter(|s| !s.is_empty())
        .collect();
    format!("/{}", segments.join("/"))
}

/// Directory listings include the `.` and `..` links
#[cfg_attr(not(feature = "smb"), allow(dead_code))]
fn is_navigation_entry(name: &str) -> bool {
    name == "." || name == ".."
}

/// Classify a libsmbclient failure by its message
#[cfg_attr(not(feature = "smb"), allow(dead_code))]
fn classify_error(text: String) -> RemoteError {
    let lower = text.to_lowercase();
    if lower.contains("permission") || lower.contains("access denied") || lower.contains("logon failure") {
        RemoteError::Auth(text)
    } else if ["connection refused", "timed out", "unreachable", "no route", "not known", "connection reset"]
        .iter()
        .any(|needle| lower.contains(needle))
    {
        RemoteError::Connect(text)
    } else {
        RemoteError::Protocol(text)
    }
}

#[cfg(feature = "smb")]
mod backend {
    use chrono::{DateTime, Utc};
    use pavao::{
        SmbClient as Context, SmbCredentials, SmbDirentType, SmbError, SmbOpenOptions, SmbOptions,
    };
    use std::io::Write;

    use super::{classify_error, is_navigation_entry, share_and_base, share_path, server_url};
    use crate::remote::{child_path, NetworkSource, RemoteFileEntry};
    use crate::utils::error::{RemoteError, RemoteResult};

    fn smb_error(e: SmbError) -> RemoteError {
        classify_error(e.to_string())
    }

    /// One authenticated share connection, released on drop
    pub struct Session {
        context: Context,
        base: String,
    }

    impl Session {
        pub fn open(source: &NetworkSource) -> RemoteResult<Self> {
            let (share, base) = share_and_base(source);
            let server = server_url(source);
            tracing::debug!("Connecting to {}{}", server, share);

            let credentials = SmbCredentials::default()
                .server(server)
                .share(share)
                .username(source.username.as_str())
                .password(source.password.as_str());
            let options = SmbOptions::default()
                .one_share_per_server(true)
                .case_sensitive(false);

            let context = Context::new(credentials, options)
                .map_err(|e| RemoteError::Connect(e.to_string()))?;

            // libsmbclient connects lazily; stat the base so failures surface here
            context
                .stat(share_path(&base, "").as_str())
                .map_err(smb_error)?;

            Ok(Self { context, base })
        }

        pub fn list(&self, path: &str) -> RemoteResult<Vec<RemoteFileEntry>> {
            let dir = path.trim_matches('/');
            let full = share_path(&self.base, dir);

            let mut entries = Vec::new();
            for dirent in self.context.list_dir(full.as_str()).map_err(smb_error)? {
                let name = dirent.name();
                if is_navigation_entry(name) {
                    continue;
                }

                let is_directory = matches!(dirent.get_type(), SmbDirentType::Dir);
                let (size, last_modified) = match self.context.stat(share_path(&full, name).as_str()) {
                    Ok(stat) => (stat.size, Some(DateTime::<Utc>::from(stat.modified))),
                    Err(e) => {
                        tracing::debug!("stat {} failed: {}", name, e);
                        (0, None)
                    }
                };

                entries.push(RemoteFileEntry {
                    name: name.to_string(),
                    path: child_path(dir, name),
                    is_directory,
                    size,
                    last_modified,
                });
            }
            Ok(entries)
        }

        pub fn download(&self, remote_path: &str, out: &mut dyn Write) -> RemoteResult<u64> {
            let full = share_path(&self.base, remote_path);
            let mut file = self
                .context
                .open_with(full.as_str(), SmbOpenOptions::default().read(true))
                .map_err(smb_error)?;
            Ok(std::io::copy(&mut file, out)?)
        }
    }
}

impl RemoteClient for SmbClient {
    #[cfg(feature = "smb")]
    fn list(&self, source: &NetworkSource, path: &str) -> RemoteResult<Vec<RemoteFileEntry>> {
        backend::Session::open(source)?.list(path)
    }

    #[cfg(feature = "smb")]
    fn download(
        &self,
        source: &NetworkSource,
        remote_path: &str,
        out: &mut dyn Write,
    ) -> RemoteResult<u64> {
        backend::Session::open(source)?.download(remote_path, out)
    }

    #[cfg(feature = "smb")]
    fn test_connection(&self, source: &NetworkSource) -> RemoteResult<()> {
        backend::Session::open(source).map(|_| ())
    }

    #[cfg(not(feature = "smb"))]
    fn list(&self, _source: &NetworkSource, _path: &str) -> RemoteResult<Vec<RemoteFileEntry>> {
        Err(unsupported())
    }

    #[cfg(not(feature = "smb"))]
    fn download(
        &self,
        _source: &NetworkSource,
        _remote_path: &str,
        _out: &mut dyn Write,
    ) -> RemoteResult<u64> {
        Err(unsupported())
    }

    #[cfg(not(feature = "smb"))]
    fn test_connection(&self, _source: &NetworkSource) -> RemoteResult<()> {
        Err(unsupported())
    }
}

#[cfg(not(feature = "smb"))]
fn unsupported() -> RemoteError {
    RemoteError::Unsupported("built without the `smb` feature".to_string())
}
