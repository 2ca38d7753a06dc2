use chrono::{DateTime, Utc};
///! Remote library sources
///!
///! One stateless client per protocol behind [`RemoteClient`], selected by
///! [`NetworkDispatcher`]. Clients return typed errors; the dispatcher is the
///! only place they are flattened.
use serde::Deserialize;
use std::fmt;
use std::io::Write;
use std::time::Duration;

pub mod dispatcher;
pub mod ftp;
pub mod multistatus;
pub mod smb;
pub mod webdav;

pub use dispatcher::NetworkDispatcher;
pub use ftp::FtpClient;
pub use smb::SmbClient;
pub use webdav::WebDavClient;

use crate::utils::error::RemoteResult;

/// Protocol spoken by a network source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkType {
    Smb,
    WebDav,
    Ftp,
    Sftp,
    Nextcloud,
}

impl NetworkType {
    /// Port used when a source leaves `port` unset
    pub fn default_port(&self) -> u16 {
        match self {
            Self::Smb => 445,
            Self::WebDav => 80,
            Self::Nextcloud => 443,
            Self::Ftp => 21,
            Self::Sftp => 22,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Smb => "SMB",
            Self::WebDav => "WebDAV",
            Self::Ftp => "FTP",
            Self::Sftp => "SFTP",
            Self::Nextcloud => "Nextcloud",
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_sync_interval() -> u32 {
    60
}

/// A configured remote library location
///
/// Read from the `[[sources]]` tables of the configuration file and never
/// mutated by the clients.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct NetworkSource {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: NetworkType,
    pub host: String,
    /// 0 selects the protocol's default port
    #[serde(default)]
    pub port: u16,
    /// Base path on the server (SMB: the share name)
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub auto_sync: bool,
    #[serde(default = "default_sync_interval")]
    pub sync_interval_minutes: u32,
}

impl NetworkSource {
    pub fn new(id: &str, name: &str, kind: NetworkType, host: &str, port: u16) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            kind,
            host: host.to_string(),
            port,
            path: String::new(),
            username: String::new(),
            password: String::new(),
            is_active: true,
            auto_sync: false,
            sync_interval_minutes: default_sync_interval(),
        }
    }

    pub fn effective_port(&self) -> u16 {
        if self.port == 0 {
            self.kind.default_port()
        } else {
            self.port
        }
    }
}

// Keeps passwords out of logs
impl fmt::Debug for NetworkSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetworkSource")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("path", &self.path)
            .field("username", &self.username)
            .field("password", &if self.password.is_empty() { "" } else { "***" })
            .field("is_active", &self.is_active)
            .field("auto_sync", &self.auto_sync)
            .field("sync_interval_minutes", &self.sync_interval_minutes)
            .finish()
    }
}

/// One entry of a remote directory listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFileEntry {
    pub name: String,
    /// Path relative to the source's base path, usable with `download`
    pub path: String,
    pub is_directory: bool,
    pub size: u64,
    pub last_modified: Option<DateTime<Utc>>,
}

/// Network timeouts shared by every client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub connect: Duration,
    pub read: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(30),
            read: Duration::from_secs(30),
        }
    }
}

/// Protocol client contract
///
/// Clients keep no state between calls: every call opens its own connection
/// and closes it before returning, whatever the outcome.
pub trait RemoteClient: Send + Sync {
    /// List the directory at `path`, relative to the source's base path
    fn list(&self, source: &NetworkSource, path: &str) -> RemoteResult<Vec<RemoteFileEntry>>;

    /// Stream the file at `remote_path` into `out`, returning the byte count
    fn download(
        &self,
        source: &NetworkSource,
        remote_path: &str,
        out: &mut dyn Write,
    ) -> RemoteResult<u64>;

    /// Connect and authenticate, then disconnect
    fn test_connection(&self, source: &NetworkSource) -> RemoteResult<()>;
}

/// Join a listed directory and an entry name into a source-relative path
pub(crate) fn child_path(dir: &str, name: &str) -> String {
    let dir = dir.trim_matches('/');
    if dir.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", dir, name)
    }
}
