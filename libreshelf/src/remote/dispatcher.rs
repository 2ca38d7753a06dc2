///! Routes each network source to its protocol client
///!
///! The `try_*` operations return the typed error; `list`, `download` and
///! `test_connection` log it and flatten to an empty listing or `false`.
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::{
    FtpClient, NetworkSource, NetworkType, RemoteClient, RemoteFileEntry, SmbClient, Timeouts,
    WebDavClient,
};
use crate::utils::error::{RemoteError, RemoteResult};

#[derive(Clone)]
pub struct NetworkDispatcher {
    smb: Arc<dyn RemoteClient>,
    webdav: Arc<dyn RemoteClient>,
    ftp: Arc<dyn RemoteClient>,
}

impl NetworkDispatcher {
    pub fn new(timeouts: Timeouts) -> Self {
        Self::with_clients(
            Arc::new(SmbClient::new()),
            Arc::new(WebDavClient::new(timeouts)),
            Arc::new(FtpClient::new(timeouts)),
        )
    }

    pub fn with_clients(
        smb: Arc<dyn RemoteClient>,
        webdav: Arc<dyn RemoteClient>,
        ftp: Arc<dyn RemoteClient>,
    ) -> Self {
        Self { smb, webdav, ftp }
    }

    /// SMB → SMB; WebDAV and Nextcloud → WebDAV; FTP and SFTP → FTP
    pub fn client_for(&self, kind: NetworkType) -> Arc<dyn RemoteClient> {
        match kind {
            NetworkType::Smb => Arc::clone(&self.smb),
            NetworkType::WebDav | NetworkType::Nextcloud => Arc::clone(&self.webdav),
            NetworkType::Ftp | NetworkType::Sftp => Arc::clone(&self.ftp),
        }
    }

    async fn run<T, F>(&self, source: &NetworkSource, f: F) -> RemoteResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&dyn RemoteClient, &NetworkSource) -> RemoteResult<T> + Send + 'static,
    {
        let client = self.client_for(source.kind);
        let source = source.clone();

        tokio::task::spawn_blocking(move || f(client.as_ref(), &source))
            .await
            .map_err(|e| RemoteError::Io(std::io::Error::other(format!("Remote task failed: {}", e))))?
    }

    pub async fn try_list(
        &self,
        source: &NetworkSource,
        path: &str,
    ) -> RemoteResult<Vec<RemoteFileEntry>> {
        let path = path.to_string();
        self.run(source, move |client, source| client.list(source, &path))
            .await
    }

    /// Download into `destination`, returning the byte count
    ///
    /// Data lands in `<destination>.part` first and is renamed into place
    /// only once the transfer has completed.
    pub async fn try_download(
        &self,
        source: &NetworkSource,
        remote_path: &str,
        destination: &Path,
    ) -> RemoteResult<u64> {
        let remote_path = remote_path.to_string();
        let destination = destination.to_path_buf();
        self.run(source, move |client, source| {
            download_atomically(client, source, &remote_path, &destination)
        })
        .await
    }

    pub async fn try_test_connection(&self, source: &NetworkSource) -> RemoteResult<()> {
        self.run(source, |client, source| client.test_connection(source))
            .await
    }

    /// Directory listing, empty on any failure
    pub async fn list(&self, source: &NetworkSource, path: &str) -> Vec<RemoteFileEntry> {
        match self.try_list(source, path).await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(
                    "Listing {:?} on {} ({}) failed: {}",
                    path,
                    source.name,
                    source.kind.as_str(),
                    e
                );
                Vec::new()
            }
        }
    }

    /// `true` once the file is complete at `destination`
    pub async fn download(
        &self,
        source: &NetworkSource,
        remote_path: &str,
        destination: &Path,
    ) -> bool {
        match self.try_download(source, remote_path, destination).await {
            Ok(bytes) => {
                tracing::info!("Downloaded {} ({} bytes) to {:?}", remote_path, bytes, destination);
                true
            }
            Err(e) => {
                tracing::warn!(
                    "Downloading {:?} from {} ({}) failed: {}",
                    remote_path,
                    source.name,
                    source.kind.as_str(),
                    e
                );
                false
            }
        }
    }

    pub async fn test_connection(&self, source: &NetworkSource) -> bool {
        match self.try_test_connection(source).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(
                    "Connection test for {} ({}) failed: {}",
                    source.name,
                    source.kind.as_str(),
                    e
                );
                false
            }
        }
    }
}

impl Default for NetworkDispatcher {
    fn default() -> Self {
        Self::new(Timeouts::default())
    }
}

/// `<destination>.part`
pub fn partial_path(destination: &Path) -> PathBuf {
    let mut name = OsString::from(destination.as_os_str());
    name.push(".part");
    PathBuf::from(name)
}

fn write_partial(
    client: &dyn RemoteClient,
    source: &NetworkSource,
    remote_path: &str,
    part: &Path,
) -> RemoteResult<u64> {
    let mut out = BufWriter::new(File::create(part)?);
    let bytes = client.download(source, remote_path, &mut out)?;
    out.flush()?;
    Ok(bytes)
}

fn download_atomically(
    client: &dyn RemoteClient,
    source: &NetworkSource,
    remote_path: &str,
    destination: &Path,
) -> RemoteResult<u64> {
    let part = partial_path(destination);

    let result = write_partial(client, source, remote_path, &part)
        .and_then(|bytes| fs::rename(&part, destination).map(|_| bytes).map_err(RemoteError::from));

    if result.is_err() {
        if let Err(e) = fs::remove_file(&part) {
            tracing::debug!("Could not remove {:?}: {}", part, e);
        }
    }
    result
}
