//! Common test utilities for API testing with mocks.
//!
//! The fixture builds the router in-process with a [`MockClientFactory`], so
//! every protocol call lands in a scripted [`MockCatalogClient`].

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use romhaul_core::client::HostType;
use romhaul_core::config::{ArtConfig, CacheConfig, Config, DownloadConfig, ServerConfig, Source};
use romhaul_core::testing::{MockCatalogClient, MockClientFactory};
use romhaul_core::{ArtMatcher, CatalogBrowser, CatalogCache, ClientOptions};
use romhaul_server::state::AppState;

/// Re-export fixtures for test convenience
pub use romhaul_core::testing::fixtures;

pub const SOURCE: &str = "Test Host";
pub const SECTION: &str = "GB";

/// Test fixture with one source holding one `GB` section.
///
/// # Example
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_listing() {
///     let client = MockCatalogClient::new(HostType::Apache)
///         .with_listing("gb/", vec![fixtures::item("Tetris.gb")]);
///     let fixture = TestFixture::new(client);
///
///     let response = fixture.get(&fixture.section_path("items")).await;
///     assert_eq!(response.status, 200);
/// }
/// ```
pub struct TestFixture {
    pub router: Router,
    pub factory: Arc<MockClientFactory>,
    pub temp_dir: TempDir,
    /// Local folder of the `GB` section.
    pub local_dir: PathBuf,
    pub cache_dir: PathBuf,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
    pub text: String,
}

/// Knobs for [`TestFixture::with_config`].
pub struct TestConfig {
    pub host_type: HostType,
    pub downloads: DownloadConfig,
    pub password: String,
    pub refuse_connections: bool,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            host_type: HostType::Apache,
            downloads: DownloadConfig::default(),
            password: String::new(),
            refuse_connections: false,
        }
    }
}

impl TestFixture {
    pub fn new(client: MockCatalogClient) -> Self {
        Self::with_config(client, TestConfig::default())
    }

    pub fn with_config(client: MockCatalogClient, test_config: TestConfig) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let local_dir = temp_dir.path().join("roms").join("Game Boy (GB)");
        let cache_dir = temp_dir.path().join("cache");

        let mut source: Source = fixtures::source(test_config.host_type, "http://mock.invalid/");
        source.display_name = SOURCE.to_string();
        source.password = test_config.password;
        if !source.password.is_empty() {
            source.username = "user".to_string();
        }
        let mut section = fixtures::section(SECTION, "gb/", &local_dir);
        section.romm_platform_id = "4".to_string();
        source.sections = vec![section];

        let config = Config {
            server: ServerConfig::default(),
            downloads: test_config.downloads,
            cache: CacheConfig {
                dir: cache_dir.clone(),
            },
            art: ArtConfig::default(),
            sources: vec![source],
        };

        let mut factory = MockClientFactory::new(client);
        if test_config.refuse_connections {
            factory = factory.refusing();
        }
        let factory = Arc::new(factory);

        let art = ArtMatcher::new(
            &config.art,
            config.downloads.art_kind,
            ClientOptions::default(),
        )
        .expect("Failed to build art matcher");
        let browser = CatalogBrowser::new(CatalogCache::new(&cache_dir));

        let state = Arc::new(AppState::new(config, browser, factory.clone(), art));
        let router = romhaul_server::api::create_router(state);

        Self {
            router,
            factory,
            temp_dir,
            local_dir,
            cache_dir,
        }
    }

    /// Path of a route under the fixture's section.
    pub fn section_path(&self, tail: &str) -> String {
        format!("/api/v1/sources/Test%20Host/sections/{}/{}", SECTION, tail)
    }

    pub fn client(&self) -> &MockCatalogClient {
        self.factory.client()
    }

    pub fn local_file(&self, name: &str) -> PathBuf {
        self.local_dir.join(name)
    }

    /// Seed the listing cache as an earlier browse would have.
    pub async fn seed_cache(&self, items: &[romhaul_core::CatalogItem]) {
        CatalogCache::new(&self.cache_dir)
            .put(SOURCE, SECTION, items)
            .await
            .expect("Failed to seed cache");
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, None).await
    }

    /// Send a POST request with JSON body.
    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.request("POST", path, Some(body)).await
    }

    /// Send a DELETE request.
    pub async fn delete(&self, path: &str) -> TestResponse {
        self.request("DELETE", path, None).await
    }

    async fn request(&self, method: &str, path: &str, body: Option<Value>) -> TestResponse {
        let builder = Request::builder().method(method).uri(path);
        let request = match body {
            Some(json) => builder
                .header("Content-Type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let text = String::from_utf8_lossy(&body_bytes).into_owned();
        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        TestResponse { status, body, text }
    }
}
