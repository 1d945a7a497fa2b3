//! Protocol clients for remote ROM repositories.
//!
//! Every backend implements [`CatalogClient`]. [`build_client`] picks the
//! implementation from a source's [`HostType`].

mod builder;
pub mod html_table;
pub mod http;
mod http_table;
mod json_directory;
mod romm;
pub mod smb;
mod types;

pub use builder::{build_client, build_client_with, ClientFactory, ClientOptions, DefaultClientFactory};
pub use http_table::HttpTableClient;
pub use json_directory::JsonDirectoryClient;
pub use romm::{RommClient, RommPlatform};
pub use smb::{SmbClient, SmbConfig};
pub use types::*;

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;

use crate::catalog::CatalogItem;
use crate::downloader::DownloadRequest;

/// Errors that can occur when talking to a remote host.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Source is missing a required setting.
    #[error("Invalid client configuration: {0}")]
    Configuration(String),

    /// Could not connect, authenticate or mount.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// Server answered with something we could not interpret.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Non-success HTTP status.
    #[error("HTTP {status} from {url}")]
    Http { status: u16, url: String },

    /// HTTP transport failure.
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// SMB command failed with an NT status code.
    #[error("SMB {command} failed with status {status:#010x}")]
    Smb { command: &'static str, status: u32 },

    /// Remote name that is not a single plain path component.
    #[error("Unsafe remote filename: {0:?}")]
    UnsafeFilename(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Uniform contract over every supported backend.
///
/// Locators are opaque: a subdirectory path for table, JSON and SMB hosts,
/// a platform id for listings and a rom id for downloads on RomM.
#[async_trait]
pub trait CatalogClient: Send + Sync {
    fn host_type(&self) -> HostType;

    /// List a directory in server order.
    async fn list_directory(&self, locator: &str) -> Result<Vec<CatalogItem>, ClientError>;

    /// Download `filename` into `destination_dir`, keeping its name.
    async fn download_file(
        &self,
        locator: &str,
        destination_dir: &Path,
        filename: &str,
    ) -> Result<PathBuf, ClientError> {
        self.download_file_rename(locator, destination_dir, filename, filename)
            .await
    }

    /// Download `remote_filename` and save it under the stem of
    /// `local_filename` with the remote extension.
    async fn download_file_rename(
        &self,
        locator: &str,
        destination_dir: &Path,
        remote_filename: &str,
        local_filename: &str,
    ) -> Result<PathBuf, ClientError> {
        plain_file_name(remote_filename)?;
        plain_file_name(local_filename)?;
        let destination_path = renamed_target(destination_dir, remote_filename, local_filename);
        let request = DownloadRequest {
            source_url: self.source_url(locator, remote_filename)?,
            destination_path: destination_path.clone(),
            display_name: local_filename.to_string(),
            authorization: None,
            locator: locator.to_string(),
            remote_filename: remote_filename.to_string(),
        };
        self.fetch(&request).await?;
        Ok(destination_path)
    }

    /// Retrieval URL of an item.
    fn source_url(&self, locator: &str, filename: &str) -> Result<String, ClientError>;

    /// Execute one prepared download. Returns bytes written.
    async fn fetch(&self, request: &DownloadRequest) -> Result<u64, ClientError>;

    /// Release the connection. Only meaningful for session protocols.
    async fn close(&self) -> Result<(), ClientError> {
        Ok(())
    }
}

/// Accept `name` only when it is exactly one normal path component, so
/// joining it onto a local folder cannot leave that folder.
pub fn plain_file_name(name: &str) -> Result<&str, ClientError> {
    let unsafe_name = || ClientError::UnsafeFilename(name.to_string());
    let drive_prefix = name.len() >= 2 && name.as_bytes()[0].is_ascii_alphabetic() && name.as_bytes()[1] == b':';
    if name.contains(['/', '\\']) || drive_prefix {
        return Err(unsafe_name());
    }
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(name),
        _ => Err(unsafe_name()),
    }
}

/// Target path for a renamed download: local stem plus remote extension.
pub fn renamed_target(destination_dir: &Path, remote_filename: &str, local_filename: &str) -> PathBuf {
    if remote_filename == local_filename {
        return destination_dir.join(remote_filename);
    }
    let stem = crate::catalog::file_stem(local_filename);
    match Path::new(remote_filename).extension() {
        Some(ext) => destination_dir.join(format!("{}.{}", stem, ext.to_string_lossy())),
        None => destination_dir.join(stem),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_renamed_target() {
        let dir = Path::new("/roms/.media");
        assert_eq!(
            renamed_target(dir, "Tetris (World).png", "Tetris (World) (Rev 1).gb"),
            PathBuf::from("/roms/.media/Tetris (World) (Rev 1).png")
        );
        assert_eq!(
            renamed_target(dir, "cover.jpg", "cover.jpg"),
            PathBuf::from("/roms/.media/cover.jpg")
        );
        assert_eq!(
            renamed_target(dir, "noext", "Game.zip"),
            PathBuf::from("/roms/.media/Game")
        );
    }

    #[test]
    fn test_plain_file_name() {
        assert_eq!(plain_file_name("Tetris (World).gb").unwrap(), "Tetris (World).gb");
        assert!(plain_file_name(".hidden").is_ok());

        for name in ["../x.zip", "/abs/path.zip", "gb/Tetris.gb", "..\\x.zip", "C:evil.zip", "..", ".", ""] {
            assert!(
                matches!(plain_file_name(name), Err(ClientError::UnsafeFilename(_))),
                "accepted {:?}",
                name
            );
        }
    }
}
