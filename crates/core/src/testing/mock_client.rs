//! Mock catalog client for testing.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::catalog::CatalogItem;
use crate::client::{CatalogClient, ClientError, ClientFactory, HostType};
use crate::config::Source;
use crate::downloader::DownloadRequest;

/// In-memory [`CatalogClient`] with scripted listings and file contents.
///
/// Fetches of a name marked with [`failing_fetch`](Self::failing_fetch)
/// write a few bytes to the destination and then fail, the way an
/// interrupted transfer would.
///
/// # Example
///
/// ```rust,ignore
/// use romhaul_core::testing::MockCatalogClient;
///
/// let client = MockCatalogClient::new(HostType::Apache)
///     .with_listing("gb/", vec![CatalogItem::new("Tetris.gb")])
///     .with_file("Tetris.gb", b"rom".to_vec());
/// ```
#[derive(Debug)]
pub struct MockCatalogClient {
    host_type: HostType,
    listings: HashMap<String, Vec<CatalogItem>>,
    files: HashMap<String, Vec<u8>>,
    failing_fetches: HashSet<String>,
    fail_listings: bool,
    list_calls: AtomicUsize,
    fetched: Mutex<Vec<DownloadRequest>>,
}

impl MockCatalogClient {
    pub fn new(host_type: HostType) -> Self {
        Self {
            host_type,
            listings: HashMap::new(),
            files: HashMap::new(),
            failing_fetches: HashSet::new(),
            fail_listings: false,
            list_calls: AtomicUsize::new(0),
            fetched: Mutex::new(Vec::new()),
        }
    }

    /// Script the listing returned for `locator`.
    pub fn with_listing(mut self, locator: &str, items: Vec<CatalogItem>) -> Self {
        self.listings.insert(locator.to_string(), items);
        self
    }

    /// Script the content served for `filename`.
    pub fn with_file(mut self, filename: &str, content: Vec<u8>) -> Self {
        self.files.insert(filename.to_string(), content);
        self
    }

    /// Make every fetch of `filename` fail after a partial write.
    pub fn failing_fetch(mut self, filename: &str) -> Self {
        self.failing_fetches.insert(filename.to_string());
        self
    }

    /// Make every listing fail with a protocol error.
    pub fn failing_listings(mut self) -> Self {
        self.fail_listings = true;
        self
    }

    /// Number of `list_directory` calls so far.
    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    /// Every request passed to `fetch`, in call order.
    pub fn fetched(&self) -> Vec<DownloadRequest> {
        self.fetched
            .lock()
            .map(|f| f.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl CatalogClient for MockCatalogClient {
    fn host_type(&self) -> HostType {
        self.host_type
    }

    async fn list_directory(&self, locator: &str) -> Result<Vec<CatalogItem>, ClientError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_listings {
            return Err(ClientError::Protocol("scripted listing failure".to_string()));
        }
        Ok(self.listings.get(locator).cloned().unwrap_or_default())
    }

    fn source_url(&self, locator: &str, filename: &str) -> Result<String, ClientError> {
        Ok(format!("mock://{}/{}", locator.trim_matches('/'), filename))
    }

    async fn fetch(&self, request: &DownloadRequest) -> Result<u64, ClientError> {
        if let Ok(mut fetched) = self.fetched.lock() {
            fetched.push(request.clone());
        }

        if let Some(parent) = request.destination_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        if self.failing_fetches.contains(&request.remote_filename) {
            tokio::fs::write(&request.destination_path, b"partial").await?;
            return Err(ClientError::Connection(format!(
                "connection reset while fetching {}",
                request.remote_filename
            )));
        }

        let content = self.files.get(&request.remote_filename).ok_or_else(|| {
            ClientError::Http {
                status: 404,
                url: request.source_url.clone(),
            }
        })?;
        tokio::fs::write(&request.destination_path, content).await?;
        Ok(content.len() as u64)
    }
}

/// [`ClientFactory`] that hands out one shared mock for every source.
#[derive(Debug)]
pub struct MockClientFactory {
    client: Arc<MockCatalogClient>,
    connects: AtomicUsize,
    refuse: bool,
}

impl MockClientFactory {
    pub fn new(client: MockCatalogClient) -> Self {
        Self {
            client: Arc::new(client),
            connects: AtomicUsize::new(0),
            refuse: false,
        }
    }

    /// Make every connect fail, as an unreachable host would.
    pub fn refusing(mut self) -> Self {
        self.refuse = true;
        self
    }

    pub fn client(&self) -> &MockCatalogClient {
        &self.client
    }

    /// Number of `connect` calls so far.
    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ClientFactory for MockClientFactory {
    async fn connect(&self, source: &Source) -> Result<Arc<dyn CatalogClient>, ClientError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if self.refuse {
            return Err(ClientError::Connection(format!(
                "{} is unreachable",
                source.display_name
            )));
        }
        Ok(self.client.clone())
    }
}
