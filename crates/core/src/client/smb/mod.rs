//! SMB2 share browsing with NTLMv2 authentication.
//!
//! Speaks SMB 2.0.2 / 2.1 directly over TCP port 445. Supports read-only
//! operations: directory enumeration and whole-file reads. Signing is
//! applied when the server requires it for authenticated sessions.

mod connection;
mod crypto;
mod messages;
mod ntlm;
#[cfg(test)]
mod test_peer;

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info};

use self::connection::Connection;
use self::messages::DirectoryEntry;
use self::ntlm::Credentials;
use super::{CatalogClient, ClientError, HostType};
use crate::catalog::CatalogItem;
use crate::downloader::DownloadRequest;

pub const DEFAULT_PORT: u16 = 445;

/// Connection settings for an SMB share.
#[derive(Debug, Clone)]
pub struct SmbConfig {
    pub host: String,
    /// 0 means 445.
    pub port: u16,
    pub username: String,
    pub password: String,
    pub share: String,
    /// Entries whose name contains any of these are hidden.
    pub extension_filters: Vec<String>,
    pub timeout: Duration,
}

pub struct SmbClient {
    host: String,
    port: u16,
    share: String,
    extension_filters: Vec<String>,
    conn: Mutex<Connection>,
}

impl SmbClient {
    /// Connect, authenticate and mount the share.
    ///
    /// Every failure here is reported as [`ClientError::Connection`].
    pub async fn connect(config: SmbConfig) -> Result<Self, ClientError> {
        if config.share.trim().is_empty() {
            return Err(ClientError::Configuration(
                "smb sources require share_name".to_string(),
            ));
        }

        let host = strip_scheme(&config.host).to_string();
        let port = if config.port == 0 {
            DEFAULT_PORT
        } else {
            config.port
        };
        let credentials = Credentials::new(&config.username, &config.password);

        let conn = Connection::open(&host, port, &config.share, &credentials, config.timeout)
            .await
            .map_err(|e| match e {
                ClientError::Connection(_) => e,
                other => ClientError::Connection(format!(
                    "smb://{}:{}/{}: {}",
                    host, port, config.share, other
                )),
            })?;

        info!(host = %host, share = %config.share, guest = credentials.is_guest(), "SMB share mounted");

        Ok(Self {
            host,
            port,
            share: config.share,
            extension_filters: normalize_filters(config.extension_filters),
            conn: Mutex::new(conn),
        })
    }
}

/// Lowercase the deny-list and drop empty entries, which would match
/// every name.
fn normalize_filters(filters: Vec<String>) -> Vec<String> {
    filters
        .into_iter()
        .map(|f| f.to_lowercase())
        .filter(|f| !f.is_empty())
        .collect()
}

/// Turn raw directory entries into catalog items. `.` and `..` are dropped,
/// as is every entry whose name contains one of the lowercased `filters`.
/// Order is kept and each entry appears at most once.
fn visible_items(entries: Vec<DirectoryEntry>, filters: &[String]) -> Vec<CatalogItem> {
    entries
        .into_iter()
        .filter(|e| e.name != "." && e.name != "..")
        .filter(|e| {
            let lower = e.name.to_lowercase();
            !filters.iter().any(|f| lower.contains(f.as_str()))
        })
        .map(to_item)
        .collect()
}

/// Accept `smb://host/`, `\\host` or a bare host.
fn strip_scheme(host: &str) -> &str {
    let host = host.trim();
    let host = host.strip_prefix("smb://").unwrap_or(host);
    host.trim_start_matches(['\\', '/']).trim_end_matches(['\\', '/'])
}

/// Share-relative path with backslash separators and no leading slash.
pub fn share_path(parts: &[&str]) -> String {
    parts
        .iter()
        .flat_map(|p| p.split(['/', '\\']))
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("\\")
}

fn to_item(entry: DirectoryEntry) -> CatalogItem {
    let last_modified = entry
        .modified()
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_default();
    CatalogItem {
        filename: if entry.is_directory {
            format!("{}/", entry.name)
        } else {
            entry.name
        },
        file_size: if entry.is_directory {
            String::new()
        } else {
            entry.size.to_string()
        },
        last_modified,
        is_directory: entry.is_directory,
        ..Default::default()
    }
}

#[async_trait]
impl CatalogClient for SmbClient {
    fn host_type(&self) -> HostType {
        HostType::Smb
    }

    async fn list_directory(&self, locator: &str) -> Result<Vec<CatalogItem>, ClientError> {
        let path = share_path(&[locator]);
        debug!(share = %self.share, path = %path, "Listing SMB directory");

        let entries = self.conn.lock().await.list(&path).await?;
        Ok(visible_items(entries, &self.extension_filters))
    }

    fn source_url(&self, locator: &str, filename: &str) -> Result<String, ClientError> {
        let path = share_path(&[&self.share, locator, filename]).replace('\\', "/");
        Ok(format!("smb://{}:{}/{}", self.host, self.port, path))
    }

    async fn fetch(&self, request: &DownloadRequest) -> Result<u64, ClientError> {
        let path = share_path(&[&request.locator, &request.remote_filename]);
        let data = self.conn.lock().await.read_file(&path).await?;

        write_file(&request.destination_path, &data).await?;
        Ok(data.len() as u64)
    }

    /// Tree disconnect, logoff and transport shutdown are all attempted;
    /// the first failure is returned.
    async fn close(&self) -> Result<(), ClientError> {
        let mut conn = self.conn.lock().await;
        let disconnected = conn.tree_disconnect().await;
        let logged_off = conn.logoff().await;
        let shut_down = conn.shutdown().await;
        debug!(host = %self.host, share = %self.share, "SMB connection closed");
        disconnected.and(logged_off).and(shut_down)
    }
}

async fn write_file(dest: &Path, data: &[u8]) -> Result<PathBuf, ClientError> {
    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(dest, data).await?;
    Ok(dest.to_path_buf())
}
