///! FTP client
///!
///! Plain FTP only. Sources declared as SFTP are refused rather than spoken
///! to over an unencrypted control channel.
use chrono::{DateTime, Utc};
use std::io::Write;
use std::net::{SocketAddr, ToSocketAddrs};
use suppaftp::list::File as ListEntry;
use suppaftp::types::{FileType, FtpError, Mode};
use suppaftp::{FtpStream, Status};

use super::{child_path, NetworkSource, NetworkType, RemoteClient, RemoteFileEntry, Timeouts};
use crate::utils::error::{RemoteError, RemoteResult};

pub struct FtpClient {
    timeouts: Timeouts,
}

impl FtpClient {
    pub fn new(timeouts: Timeouts) -> Self {
        Self { timeouts }
    }

    fn resolve(source: &NetworkSource) -> RemoteResult<SocketAddr> {
        (source.host.as_str(), source.effective_port())
            .to_socket_addrs()
            .map_err(|e| RemoteError::Connect(format!("Cannot resolve {}: {}", source.host, e)))?
            .next()
            .ok_or_else(|| RemoteError::Connect(format!("No address for {}", source.host)))
    }

    fn connect(&self, source: &NetworkSource) -> RemoteResult<FtpStream> {
        if source.kind == NetworkType::Sftp {
            tracing::warn!("Refusing SFTP source {}: only plain FTP is supported", source.name);
            return Err(RemoteError::Unsupported(
                "SFTP sources are not supported".to_string(),
            ));
        }

        let addr = Self::resolve(source)?;
        tracing::debug!("Connecting to ftp://{}", addr);

        let mut ftp = FtpStream::connect_timeout(addr, self.timeouts.connect).map_err(ftp_error)?;
        if let Err(e) = self.prepare(&mut ftp, source) {
            quit(&mut ftp, &source.host);
            return Err(e);
        }
        Ok(ftp)
    }

    fn prepare(&self, ftp: &mut FtpStream, source: &NetworkSource) -> RemoteResult<()> {
        ftp.get_ref()
            .set_read_timeout(Some(self.timeouts.read))?;

        let user = if source.username.is_empty() {
            "anonymous"
        } else {
            source.username.as_str()
        };
        ftp.login(user, &source.password).map_err(ftp_error)?;

        ftp.set_mode(Mode::Passive);
        ftp.transfer_type(FileType::Binary).map_err(ftp_error)?;

        let base = source.path.trim_end_matches('/');
        if !base.is_empty() {
            ftp.cwd(base).map_err(ftp_error)?;
        }
        Ok(())
    }

    /// Connect, run `f`, and always say goodbye
    fn session<T>(
        &self,
        source: &NetworkSource,
        f: impl FnOnce(&mut FtpStream) -> RemoteResult<T>,
    ) -> RemoteResult<T> {
        let mut ftp = self.connect(source)?;
        let result = f(&mut ftp);
        quit(&mut ftp, &source.host);
        result
    }
}

fn quit(ftp: &mut FtpStream, host: &str) {
    if let Err(e) = ftp.quit() {
        tracing::debug!("QUIT to {} failed: {}", host, e);
    }
}

impl Default for FtpClient {
    fn default() -> Self {
        Self::new(Timeouts::default())
    }
}

fn ftp_error(e: FtpError) -> RemoteError {
    match e {
        FtpError::ConnectionError(io) => RemoteError::Connect(io.to_string()),
        FtpError::UnexpectedResponse(response) if response.status == Status::NotLoggedIn => {
            RemoteError::Auth(String::from_utf8_lossy(&response.body).trim().to_string())
        }
        other => RemoteError::Protocol(other.to_string()),
    }
}

/// Turn raw LIST lines of `dir` into entries, skipping `.`, `..` and lines
/// in formats we cannot read
pub fn parse_listing(dir: &str, lines: &[String]) -> Vec<RemoteFileEntry> {
    lines
        .iter()
        .filter_map(|line| match ListEntry::try_from(line.as_str()) {
            Ok(file) => Some(file),
            Err(e) => {
                tracing::debug!("Skipping LIST line {:?}: {}", line, e);
                None
            }
        })
        .filter(|file| file.name() != "." && file.name() != "..")
        .map(|file| RemoteFileEntry {
            name: file.name().to_string(),
            path: child_path(dir, file.name()),
            is_directory: file.is_directory(),
            size: file.size() as u64,
            last_modified: Some(DateTime::<Utc>::from(file.modified())),
        })
        .collect()
}

impl RemoteClient for FtpClient {
    fn list(&self, source: &NetworkSource, path: &str) -> RemoteResult<Vec<RemoteFileEntry>> {
        self.session(source, |ftp| {
            let dir = path.trim_matches('/');
            let lines = ftp
                .list(if dir.is_empty() { None } else { Some(dir) })
                .map_err(ftp_error)?;
            Ok(parse_listing(dir, &lines))
        })
    }

    fn download(
        &self,
        source: &NetworkSource,
        remote_path: &str,
        out: &mut dyn Write,
    ) -> RemoteResult<u64> {
        self.session(source, |ftp| {
            let mut stream = ftp
                .retr_as_stream(remote_path.trim_start_matches('/'))
                .map_err(ftp_error)?;
            let copied = std::io::copy(&mut stream, out);
            ftp.finalize_retr_stream(stream).map_err(ftp_error)?;
            Ok(copied?)
        })
    }

    fn test_connection(&self, source: &NetworkSource) -> RemoteResult<()> {
        self.session(source, |_| Ok(()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;
    use std::io::{BufRead, BufReader, Write};
    use std::net::TcpListener;
    use std::thread;
    use std::time::Duration;

    fn client() -> FtpClient {
        FtpClient::new(Timeouts {
            connect: Duration::from_secs(2),
            read: Duration::from_secs(2),
        })
    }

    #[test]
    fn test_sftp_is_refused() {
        let source = NetworkSource::new("s", "secure", NetworkType::Sftp, "127.0.0.1", 22);
        let client = client();

        assert!(matches!(
            client.list(&source, ""),
            Err(RemoteError::Unsupported(_))
        ));
        assert!(matches!(
            client.test_connection(&source),
            Err(RemoteError::Unsupported(_))
        ));
        let mut sink = Vec::new();
        assert!(matches!(
            client.download(&source, "a.cbz", &mut sink),
            Err(RemoteError::Unsupported(_))
        ));
    }

    #[test]
    fn test_unreachable_server() {
        let source = NetworkSource::new("f", "ftp", NetworkType::Ftp, "127.0.0.1", 1);
        assert!(matches!(
            client().list(&source, ""),
            Err(RemoteError::Connect(_))
        ));
    }

    #[test]
    fn test_rejected_login_still_quits() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        // Greets, refuses every login, and records the commands it saw
        let server = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut writer = stream.try_clone().unwrap();
            writer.write_all(b"220 ready\r\n").unwrap();

            let mut commands = Vec::new();
            for line in BufReader::new(stream).lines().map_while(|line| line.ok()) {
                let quitting = line.starts_with("QUIT");
                let reply: &[u8] = if quitting {
                    b"221 bye\r\n"
                } else {
                    b"530 Not logged in\r\n"
                };
                writer.write_all(reply).unwrap();
                commands.push(line);
                if quitting {
                    break;
                }
            }
            commands
        });

        let source = NetworkSource::new("f", "ftp", NetworkType::Ftp, "127.0.0.1", port);
        assert!(matches!(
            client().test_connection(&source),
            Err(RemoteError::Auth(_))
        ));
        assert_eq!(server.join().unwrap(), vec!["USER anonymous", "QUIT"]);
    }

    #[test]
    fn test_parse_unix_listing() {
        let lines: Vec<String> = [
            "drwxr-xr-x    2 ftp      ftp          4096 Jan 10  2023 .",
            "drwxr-xr-x    2 ftp      ftp          4096 Jan 10  2023 ..",
            "drwxr-xr-x    2 ftp      ftp          4096 Jan 10  2023 manga",
            "-rw-r--r--    1 ftp      ftp       5242880 Mar 03  2021 Issue 1.cbz",
            "this is not a listing line",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        let entries = parse_listing("comics/", &lines);
        assert_eq!(entries.len(), 2);

        assert_eq!(entries[0].name, "manga");
        assert_eq!(entries[0].path, "comics/manga");
        assert!(entries[0].is_directory);

        assert_eq!(entries[1].name, "Issue 1.cbz");
        assert_eq!(entries[1].path, "comics/Issue 1.cbz");
        assert!(!entries[1].is_directory);
        assert_eq!(entries[1].size, 5_242_880);
        assert_eq!(entries[1].last_modified.unwrap().year(), 2021);
    }

    #[test]
    fn test_parse_dos_listing() {
        let lines = vec![
            "04-27-20  09:09PM       <DIR>          books".to_string(),
            "04-27-20  09:09PM                 2048 novel.epub".to_string(),
        ];

        let entries = parse_listing("", &lines);
        assert_eq!(entries.len(), 2);
        assert!(entries[0].is_directory);
        assert_eq!(entries[1].path, "novel.epub");
        assert_eq!(entries[1].size, 2048);
    }
}
