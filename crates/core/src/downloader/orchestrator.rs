//! Bounded-concurrency batch downloader.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use super::types::{CompletedDownload, DownloadRequest, DownloadResult, FailedDownload};
use crate::catalog::CatalogItem;
use crate::client::http::basic_auth_header;
use crate::client::{plain_file_name, CatalogClient, ClientError, HostType};
use crate::config::{DownloadConfig, Section, Source};
use crate::metrics;

/// Downloads selected items of one section through one client.
pub struct DownloadOrchestrator {
    client: Arc<dyn CatalogClient>,
    source: Source,
    section: Section,
    max_concurrent: usize,
}

impl DownloadOrchestrator {
    pub fn new(
        client: Arc<dyn CatalogClient>,
        source: Source,
        section: Section,
        config: &DownloadConfig,
    ) -> Self {
        Self {
            client,
            source,
            section,
            max_concurrent: config.max_concurrent.max(1),
        }
    }

    /// Build the request for one item. Names that would resolve outside the
    /// section folder are rejected.
    pub fn build_request(&self, item: &CatalogItem) -> Result<DownloadRequest, ClientError> {
        let filename = plain_file_name(&item.filename)?;
        let host_type = self.client.host_type();
        let locator = match (host_type, item.source_id.as_deref()) {
            (HostType::Romm, Some(id)) => id.to_string(),
            (HostType::Romm, None) => {
                return Err(ClientError::Configuration(format!(
                    "RomM item '{}' has no rom id",
                    item.filename
                )))
            }
            _ => self.section.host_subdirectory.clone(),
        };

        let authorization = if host_type == HostType::Romm && self.source.has_credentials() {
            Some(basic_auth_header(&self.source.username, &self.source.password))
        } else {
            None
        };

        Ok(DownloadRequest {
            source_url: self.client.source_url(&locator, &item.filename)?,
            destination_path: self.section.local_directory.join(filename),
            display_name: item.title().to_string(),
            authorization,
            locator,
            remote_filename: item.filename.clone(),
        })
    }

    /// Download every item. Failures are collected, never propagated, and
    /// leave no partial file behind. Each transfer lands in `<dest>.part` and
    /// only replaces `<dest>` once it has finished.
    pub async fn download(&self, items: &[CatalogItem]) -> DownloadResult {
        info!(
            source = %self.source.display_name,
            section = %self.section.name,
            count = items.len(),
            max_concurrent = self.max_concurrent,
            "Starting download batch"
        );

        let outcomes: Vec<Result<CompletedDownload, FailedDownload>> = stream::iter(items.iter().cloned())
            .map(|item| self.download_one(item))
            .buffer_unordered(self.max_concurrent)
            .collect()
            .await;

        let mut result = DownloadResult::default();
        for outcome in outcomes {
            match outcome {
                Ok(done) => result.completed.push(done),
                Err(failed) => result.failed.push(failed),
            }
        }

        info!(
            source = %self.source.display_name,
            section = %self.section.name,
            completed = result.completed.len(),
            failed = result.failed.len(),
            "Download batch finished"
        );
        result
    }

    async fn download_one(&self, item: CatalogItem) -> Result<CompletedDownload, FailedDownload> {
        metrics::DOWNLOADS_STARTED.inc();

        let request = match self.build_request(&item) {
            Ok(request) => request,
            Err(e) => {
                metrics::DOWNLOADS_FAILED.inc();
                warn!(file = %item.filename, error = %e, "Download rejected");
                return Err(FailedDownload {
                    path: self.section.local_directory.clone(),
                    item,
                    error: e.to_string(),
                });
            }
        };

        let destination = request.destination_path.clone();
        let partial = DownloadRequest {
            destination_path: part_path(&destination),
            ..request
        };

        debug!(url = %partial.source_url, dest = %destination.display(), "Fetching");
        let fetched = match self.client.fetch(&partial).await {
            Ok(bytes) => tokio::fs::rename(&partial.destination_path, &destination)
                .await
                .map(|()| bytes)
                .map_err(ClientError::from),
            Err(e) => Err(e),
        };

        match fetched {
            Ok(bytes) => {
                metrics::DOWNLOADS_COMPLETED.inc();
                metrics::DOWNLOADED_BYTES.inc_by(bytes);
                Ok(CompletedDownload {
                    item,
                    path: destination,
                    bytes,
                })
            }
            Err(e) => {
                metrics::DOWNLOADS_FAILED.inc();
                warn!(file = %item.filename, error = %e, "Download failed");
                remove_partial(&partial.destination_path).await;
                Err(FailedDownload {
                    item,
                    path: destination,
                    error: e.to_string(),
                })
            }
        }
    }
}

/// In-progress name for a download target.
fn part_path(target: &Path) -> PathBuf {
    let mut name = target.as_os_str().to_os_string();
    name.push(".part");
    PathBuf::from(name)
}

async fn remove_partial(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!(path = %path.display(), "Removed partial download"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove partial download"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockCatalogClient;
    use tempfile::TempDir;

    fn source(host_type: HostType) -> Source {
        Source {
            display_name: "Mock".to_string(),
            host_type,
            root_uri: "http://mock.invalid/".to_string(),
            port: 0,
            username: "user".to_string(),
            password: "pass".to_string(),
            share_name: String::new(),
            extension_filters: vec![],
            table_columns: Default::default(),
            source_replacements: Default::default(),
            filters: Default::default(),
            sections: vec![],
        }
    }

    fn section(dir: &std::path::Path) -> Section {
        Section {
            name: "GB".to_string(),
            local_directory: dir.to_path_buf(),
            host_subdirectory: "gb/".to_string(),
            romm_platform_id: "7".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_build_request_http_has_no_auth() {
        let temp = TempDir::new().unwrap();
        let orchestrator = DownloadOrchestrator::new(
            Arc::new(MockCatalogClient::new(HostType::Apache)),
            source(HostType::Apache),
            section(temp.path()),
            &DownloadConfig::default(),
        );
        let request = orchestrator.build_request(&CatalogItem::new("Tetris.gb")).unwrap();
        assert_eq!(request.locator, "gb/");
        assert_eq!(request.authorization, None);
        assert_eq!(request.destination_path, temp.path().join("Tetris.gb"));
        assert_eq!(request.display_name, "Tetris");
    }

    #[test]
    fn test_build_request_romm_uses_rom_id_and_basic_auth() {
        let temp = TempDir::new().unwrap();
        let orchestrator = DownloadOrchestrator::new(
            Arc::new(MockCatalogClient::new(HostType::Romm)),
            source(HostType::Romm),
            section(temp.path()),
            &DownloadConfig::default(),
        );
        let item = CatalogItem {
            source_id: Some("42".to_string()),
            ..CatalogItem::new("Tetris.gb")
        };
        let request = orchestrator.build_request(&item).unwrap();
        assert_eq!(request.locator, "42");
        assert_eq!(request.authorization.as_deref(), Some("Basic dXNlcjpwYXNz"));

        let missing_id = orchestrator.build_request(&CatalogItem::new("Other.gb"));
        assert!(matches!(missing_id, Err(ClientError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_download_partial_failure_removes_file() {
        let temp = TempDir::new().unwrap();
        let client = MockCatalogClient::new(HostType::Apache)
            .with_file("a.zip", b"alpha".to_vec())
            .with_file("b.zip", b"bravo".to_vec())
            .with_file("c.zip", b"charlie".to_vec())
            .failing_fetch("b.zip");
        let orchestrator = DownloadOrchestrator::new(
            Arc::new(client),
            source(HostType::Apache),
            section(temp.path()),
            &DownloadConfig::default(),
        );

        let items: Vec<_> = ["a.zip", "b.zip", "c.zip"]
            .into_iter()
            .map(CatalogItem::new)
            .collect();
        let result = orchestrator.download(&items).await;

        assert_eq!(result.completed.len(), 2);
        assert_eq!(result.failed.len(), 1);
        assert_eq!(result.failed[0].item.filename, "b.zip");
        assert!(result.is_partial_success());
        assert_eq!(result.exit_code(), 1);
        assert!(temp.path().join("a.zip").exists());
        assert!(temp.path().join("c.zip").exists());
        assert!(!temp.path().join("b.zip").exists());
        assert!(!temp.path().join("b.zip.part").exists());
    }

    #[tokio::test]
    async fn test_failed_redownload_keeps_existing_file() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("b.zip"), b"good rom").unwrap();
        // No content scripted for b.zip, so the fetch answers 404.
        let orchestrator = DownloadOrchestrator::new(
            Arc::new(MockCatalogClient::new(HostType::Apache)),
            source(HostType::Apache),
            section(temp.path()),
            &DownloadConfig::default(),
        );

        let result = orchestrator.download(&[CatalogItem::new("b.zip")]).await;

        assert_eq!(result.failed.len(), 1);
        assert!(result.failed[0].error.contains("404"));
        assert_eq!(std::fs::read(temp.path().join("b.zip")).unwrap(), b"good rom");
        assert!(!temp.path().join("b.zip.part").exists());
    }

    #[tokio::test]
    async fn test_interrupted_redownload_keeps_existing_file() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("b.zip"), b"good rom").unwrap();
        let client = MockCatalogClient::new(HostType::Apache).failing_fetch("b.zip");
        let orchestrator = DownloadOrchestrator::new(
            Arc::new(client),
            source(HostType::Apache),
            section(temp.path()),
            &DownloadConfig::default(),
        );

        let result = orchestrator.download(&[CatalogItem::new("b.zip")]).await;

        assert_eq!(result.failed.len(), 1);
        assert_eq!(std::fs::read(temp.path().join("b.zip")).unwrap(), b"good rom");
        assert!(!temp.path().join("b.zip.part").exists());
    }

    #[tokio::test]
    async fn test_successful_download_replaces_existing_file() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("a.zip"), b"old").unwrap();
        let client = MockCatalogClient::new(HostType::Apache).with_file("a.zip", b"new".to_vec());
        let orchestrator = DownloadOrchestrator::new(
            Arc::new(client),
            source(HostType::Apache),
            section(temp.path()),
            &DownloadConfig::default(),
        );

        let result = orchestrator.download(&[CatalogItem::new("a.zip")]).await;

        assert_eq!(result.completed.len(), 1);
        assert_eq!(result.completed[0].path, temp.path().join("a.zip"));
        assert_eq!(std::fs::read(temp.path().join("a.zip")).unwrap(), b"new");
        assert!(!temp.path().join("a.zip.part").exists());
    }

    #[tokio::test]
    async fn test_remote_name_cannot_escape_section_folder() {
        let temp = TempDir::new().unwrap();
        let roms = temp.path().join("roms");
        let client = MockCatalogClient::new(HostType::Apache)
            .with_file("../escaped.zip", b"payload".to_vec())
            .with_file("/tmp/absolute.zip", b"payload".to_vec());
        let client = Arc::new(client);
        let orchestrator = DownloadOrchestrator::new(
            client.clone(),
            source(HostType::Apache),
            section(&roms),
            &DownloadConfig::default(),
        );

        let items = vec![
            CatalogItem::new("../escaped.zip"),
            CatalogItem::new("/tmp/absolute.zip"),
        ];
        let result = orchestrator.download(&items).await;

        assert!(result.completed.is_empty());
        assert_eq!(result.failed.len(), 2);
        assert!(result.failed.iter().all(|f| f.error.contains("Unsafe remote filename")));
        assert!(client.fetched().is_empty());
        assert!(!temp.path().join("escaped.zip").exists());
    }
}
