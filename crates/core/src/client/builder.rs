//! Construct the protocol client for a configured source.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use super::http::build_http_client;
use super::smb::{SmbClient, SmbConfig};
use super::{CatalogClient, ClientError, HostType, HttpTableClient, JsonDirectoryClient, RommClient};
use crate::config::{DownloadConfig, Source};

/// Settings shared by every client.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub timeout: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(300),
        }
    }
}

impl From<&DownloadConfig> for ClientOptions {
    fn from(config: &DownloadConfig) -> Self {
        Self {
            timeout: Duration::from_secs(u64::from(config.timeout_secs)),
        }
    }
}

/// Build a client for `source` with default options.
pub async fn build_client(source: &Source) -> Result<Box<dyn CatalogClient>, ClientError> {
    build_client_with(source, &ClientOptions::default()).await
}

/// Build a client for `source`.
///
/// Missing required fields are [`ClientError::Configuration`]. SMB connect,
/// auth and mount failures are [`ClientError::Connection`].
pub async fn build_client_with(
    source: &Source,
    options: &ClientOptions,
) -> Result<Box<dyn CatalogClient>, ClientError> {
    if source.root_uri.trim().is_empty() {
        return Err(ClientError::Configuration(format!(
            "source '{}' has no root_uri",
            source.display_name
        )));
    }

    debug!(source = %source.display_name, host_type = %source.host_type, "Building client");

    let client: Box<dyn CatalogClient> = match source.host_type {
        HostType::Apache | HostType::Megathread | HostType::Custom => {
            Box::new(HttpTableClient::new(
                build_http_client(options.timeout)?,
                &source.root_uri,
                source.host_type,
                source.table_columns.clone(),
                &source.source_replacements,
            )?)
        }
        HostType::Nginx => Box::new(JsonDirectoryClient::new(
            build_http_client(options.timeout)?,
            &source.root_uri,
        )),
        HostType::Romm => Box::new(RommClient::new(
            build_http_client(options.timeout)?,
            &source.root_uri,
            source.port,
            &source.username,
            &source.password,
        )?),
        HostType::Smb => Box::new(
            SmbClient::connect(SmbConfig {
                host: source.root_uri.clone(),
                port: source.port,
                username: source.username.clone(),
                password: source.password.clone(),
                share: source.share_name.clone(),
                extension_filters: source.extension_filters.clone(),
                timeout: options.timeout,
            })
            .await?,
        ),
    };

    Ok(client)
}

/// Opens clients for configured sources.
///
/// Callers that serve many requests hold one factory and connect per
/// request; tests swap in a factory that hands out mocks.
#[async_trait]
pub trait ClientFactory: Send + Sync {
    async fn connect(&self, source: &Source) -> Result<Arc<dyn CatalogClient>, ClientError>;
}

/// Factory backed by [`build_client_with`].
#[derive(Debug, Clone, Default)]
pub struct DefaultClientFactory {
    options: ClientOptions,
}

impl DefaultClientFactory {
    pub fn new(options: ClientOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }
}

#[async_trait]
impl ClientFactory for DefaultClientFactory {
    async fn connect(&self, source: &Source) -> Result<Arc<dyn CatalogClient>, ClientError> {
        build_client_with(source, &self.options).await.map(Arc::from)
    }
}
