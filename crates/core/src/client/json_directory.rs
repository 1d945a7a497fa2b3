//! Client for nginx `autoindex_format json` listings.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use super::http::{fetch_to_path, get_text, join_url};
use super::{CatalogClient, ClientError, HostType};
use crate::catalog::CatalogItem;
use crate::downloader::DownloadRequest;

/// One entry of an nginx JSON directory listing.
#[derive(Debug, Deserialize)]
struct DirectoryEntry {
    name: String,
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    mtime: String,
    #[serde(default)]
    size: Option<u64>,
}

impl From<DirectoryEntry> for CatalogItem {
    fn from(entry: DirectoryEntry) -> Self {
        let is_directory = entry.kind == "directory";
        CatalogItem {
            filename: if is_directory && !entry.name.ends_with('/') {
                format!("{}/", entry.name)
            } else {
                entry.name
            },
            file_size: entry.size.map(|s| s.to_string()).unwrap_or_default(),
            last_modified: entry.mtime,
            is_directory,
            ..Default::default()
        }
    }
}

pub struct JsonDirectoryClient {
    http: Client,
    root_url: String,
}

impl JsonDirectoryClient {
    pub fn new(http: Client, root_url: impl Into<String>) -> Self {
        Self {
            http,
            root_url: root_url.into(),
        }
    }

    pub fn parse_listing(body: &str) -> Result<Vec<CatalogItem>, ClientError> {
        let entries: Vec<DirectoryEntry> = serde_json::from_str(body)
            .map_err(|e| ClientError::Protocol(format!("invalid nginx listing: {}", e)))?;
        Ok(entries.into_iter().map(CatalogItem::from).collect())
    }
}

#[async_trait]
impl CatalogClient for JsonDirectoryClient {
    fn host_type(&self) -> HostType {
        HostType::Nginx
    }

    async fn list_directory(&self, locator: &str) -> Result<Vec<CatalogItem>, ClientError> {
        let url: String = join_url(&self.root_url, &[locator], true)?.into();
        debug!(url = %url, "Listing nginx directory");
        let body = get_text(&self.http, &url, None).await?;
        Self::parse_listing(&body)
    }

    fn source_url(&self, locator: &str, filename: &str) -> Result<String, ClientError> {
        Ok(join_url(&self.root_url, &[locator, filename], false)?.into())
    }

    async fn fetch(&self, request: &DownloadRequest) -> Result<u64, ClientError> {
        fetch_to_path(
            &self.http,
            &request.source_url,
            request.authorization.as_deref(),
            &request.destination_path,
        )
        .await
    }
}
