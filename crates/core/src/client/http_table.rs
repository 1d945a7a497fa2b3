//! Client for hosts that publish directories as HTML tables.

use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use super::html_table::table_to_json;
use super::http::{fetch_to_path, get_text, join_url};
use super::{CatalogClient, ClientError, HostType, TableColumns};
use crate::catalog::CatalogItem;
use crate::downloader::DownloadRequest;

const PARENT_DIRECTORY: &str = "Parent Directory";

/// Scrapes Apache, Megathread and custom table listings.
pub struct HttpTableClient {
    http: Client,
    root_url: String,
    host_type: HostType,
    table_columns: TableColumns,
    replacements: Vec<(String, String)>,
}

impl HttpTableClient {
    pub fn new(
        http: Client,
        root_url: impl Into<String>,
        host_type: HostType,
        table_columns: TableColumns,
        source_replacements: &HashMap<String, String>,
    ) -> Result<Self, ClientError> {
        if !host_type.is_table() {
            return Err(ClientError::Configuration(format!(
                "{} is not a table host",
                host_type
            )));
        }
        if host_type == HostType::Custom && table_columns.filename_header.is_empty() {
            return Err(ClientError::Configuration(
                "custom hosts require table_columns.filename_header".to_string(),
            ));
        }

        // Longest first so overlapping keys replace deterministically.
        let mut replacements: Vec<(String, String)> = source_replacements
            .iter()
            .filter(|(from, _)| !from.is_empty())
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        replacements.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(&b.0)));

        Ok(Self {
            http,
            root_url: root_url.into(),
            host_type,
            table_columns,
            replacements,
        })
    }

    /// Listing URL of a subdirectory, with Apache table-mode parameters.
    pub fn listing_url(&self, subdirectory: &str) -> Result<String, ClientError> {
        let mut url = join_url(&self.root_url, &[subdirectory], true)?;
        if self.host_type == HostType::Apache {
            url.query_pairs_mut()
                .append_pair("F", "2")
                .append_pair("NameWidth", "*");
        }
        Ok(url.into())
    }

    /// Header text of the filename, size and date columns.
    fn column_headers(&self) -> (&str, &str, &str) {
        match self.host_type {
            HostType::Apache => ("Name", "Size", "Last modified"),
            HostType::Megathread => ("File Name", "File Size", "Date"),
            _ => (
                self.table_columns.filename_header.as_str(),
                self.table_columns.file_size_header.as_str(),
                self.table_columns.date_header.as_str(),
            ),
        }
    }

    /// Turn a page into items: table to JSON, raw replacements, header
    /// mapping, then header and separator rows dropped.
    pub fn parse_listing(&self, html: &str) -> Result<Vec<CatalogItem>, ClientError> {
        let raw = serde_json::to_string(&table_to_json(html)?)
            .map_err(|e| ClientError::Protocol(format!("failed to encode table: {}", e)))?;
        let cleaned = self.apply_replacements(raw);

        let rows: Vec<HashMap<String, Value>> = serde_json::from_str(&cleaned).map_err(|e| {
            ClientError::Protocol(format!("listing is not valid JSON after cleanup: {}", e))
        })?;

        let (name_key, size_key, date_key) = self.column_headers();
        let items = rows
            .into_iter()
            .skip(self.host_type.header_rows())
            .filter_map(|row| {
                let filename = cell(&row, name_key);
                if filename.is_empty() || filename == PARENT_DIRECTORY {
                    return None;
                }
                Some(CatalogItem {
                    is_directory: filename.ends_with('/'),
                    file_size: cell(&row, size_key),
                    last_modified: cell(&row, date_key),
                    filename,
                    ..Default::default()
                })
            })
            .collect();

        Ok(items)
    }

    fn apply_replacements(&self, mut document: String) -> String {
        if self.host_type == HostType::Megathread {
            document = document.replace("  ↓", "");
        }
        if self.host_type == HostType::Custom {
            for (from, to) in &self.replacements {
                document = document.replace(from.as_str(), to);
            }
        }
        document
    }
}

fn cell(row: &HashMap<String, Value>, key: &str) -> String {
    if key.is_empty() {
        return String::new();
    }
    match row.get(key) {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

#[async_trait]
impl CatalogClient for HttpTableClient {
    fn host_type(&self) -> HostType {
        self.host_type
    }

    async fn list_directory(&self, locator: &str) -> Result<Vec<CatalogItem>, ClientError> {
        let url = self.listing_url(locator)?;
        debug!(url = %url, host_type = %self.host_type, "Listing directory");
        let html = get_text(&self.http, &url, None).await?;
        let items = self.parse_listing(&html)?;
        debug!(url = %url, count = items.len(), "Listed directory");
        Ok(items)
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
