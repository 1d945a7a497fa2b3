//! API tests against the in-process router with a mock catalog client.

mod common;

use axum::http::StatusCode;
use serde_json::json;

use common::{fixtures, TestConfig, TestFixture};
use romhaul_core::client::HostType;
use romhaul_core::config::DownloadConfig;
use romhaul_core::testing::MockCatalogClient;
use romhaul_core::CatalogItem;

fn gb_listing() -> Vec<CatalogItem> {
    vec![
        fixtures::item("Tetris (World).gb"),
        fixtures::item("Tetris (Beta).gb"),
        fixtures::item("Alleyway (World).gb"),
    ]
}

// =============================================================================
// Health, config and metrics
// =============================================================================

#[tokio::test]
async fn test_health() {
    let fixture = TestFixture::new(MockCatalogClient::new(HostType::Apache));
    let response = fixture.get("/api/v1/health").await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["status"], "ok");
}

#[tokio::test]
async fn test_config_redacts_passwords() {
    let fixture = TestFixture::with_config(
        MockCatalogClient::new(HostType::Romm),
        TestConfig {
            host_type: HostType::Romm,
            password: "hunter2".to_string(),
            ..Default::default()
        },
    );

    let response = fixture.get("/api/v1/config").await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["sources"][0]["password_configured"], true);
    assert_eq!(response.body["sources"][0]["username"], "user");
    assert!(!response.text.contains("hunter2"));
}

#[tokio::test]
async fn test_metrics_endpoint_reports_requests() {
    let fixture = TestFixture::new(MockCatalogClient::new(HostType::Apache));
    fixture.get("/api/v1/health").await;

    let response = fixture.get("/api/v1/metrics").await;

    assert_eq!(response.status, StatusCode::OK);
    assert!(response.text.contains("romhaul_http_requests_total"));
    assert!(response.text.contains("/api/v1/health"));
}

// =============================================================================
// Sources and listings
// =============================================================================

#[tokio::test]
async fn test_list_sources() {
    let fixture = TestFixture::new(MockCatalogClient::new(HostType::Apache));
    let response = fixture.get("/api/v1/sources").await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(
        response.body,
        json!([{ "display_name": "Test Host", "host_type": "apache", "sections": ["GB"] }])
    );
}

#[tokio::test]
async fn test_list_items_sorted_and_searchable() {
    let client = MockCatalogClient::new(HostType::Apache).with_listing("gb/", gb_listing());
    let fixture = TestFixture::new(client);

    let response = fixture.get(&fixture.section_path("items")).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["total"], 3);
    assert_eq!(response.body["stale"], false);
    assert_eq!(response.body["items"][0]["filename"], "Alleyway (World).gb");
    assert_eq!(response.body["items"][0]["display_name"], "Alleyway (World)");

    let response = fixture.get(&fixture.section_path("items?search=tetris")).await;
    assert_eq!(response.body["total"], 2);
}

#[tokio::test]
async fn test_unknown_source_and_section_are_404() {
    let fixture = TestFixture::new(MockCatalogClient::new(HostType::Apache));

    let response = fixture.get("/api/v1/sources/Nope/sections/GB/items").await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert!(response.body["error"].as_str().unwrap().contains("Nope"));

    let response = fixture
        .get("/api/v1/sources/Test%20Host/sections/SNES/items")
        .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(fixture.factory.connects(), 0);
}

#[tokio::test]
async fn test_listing_failure_without_cache_is_bad_gateway() {
    let client = MockCatalogClient::new(HostType::Apache).failing_listings();
    let fixture = TestFixture::new(client);

    let response = fixture.get(&fixture.section_path("items")).await;

    assert_eq!(response.status, StatusCode::BAD_GATEWAY);
    assert!(response.body["error"].is_string());
}

#[tokio::test]
async fn test_unreachable_host_falls_back_to_cache() {
    let fixture = TestFixture::with_config(
        MockCatalogClient::new(HostType::Megathread),
        TestConfig {
            host_type: HostType::Megathread,
            refuse_connections: true,
            ..Default::default()
        },
    );
    fixture.seed_cache(&[fixtures::item("Old (World).gb")]).await;

    let response = fixture.get(&fixture.section_path("items")).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["stale"], true);
    assert_eq!(response.body["items"][0]["filename"], "Old (World).gb");
}

#[tokio::test]
async fn test_megathread_listing_cached_until_refresh() {
    let client = MockCatalogClient::new(HostType::Megathread).with_listing("gb/", gb_listing());
    let fixture = TestFixture::with_config(
        client,
        TestConfig {
            host_type: HostType::Megathread,
            ..Default::default()
        },
    );

    fixture.get(&fixture.section_path("items")).await;
    fixture.get(&fixture.section_path("items")).await;
    assert_eq!(fixture.client().list_calls(), 1);

    fixture.get(&fixture.section_path("items?refresh=true")).await;
    assert_eq!(fixture.client().list_calls(), 2);

    let response = fixture.delete("/api/v1/cache").await;
    assert_eq!(response.status, StatusCode::OK);
    assert!(!fixture.cache_dir().exists());

    fixture.get(&fixture.section_path("items")).await;
    assert_eq!(fixture.client().list_calls(), 3);
}

#[tokio::test]
async fn test_source_items_tagged_and_searchable() {
    let client = MockCatalogClient::new(HostType::Apache).with_listing("gb/", gb_listing());
    let fixture = TestFixture::new(client);

    let response = fixture.get("/api/v1/sources/Test%20Host/items").await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["total"], 3);
    assert_eq!(response.body["items"][0]["tag"], "GB");
    assert_eq!(response.body["failed_sections"], json!([]));

    let response = fixture
        .get("/api/v1/sources/Test%20Host/items?search=tetris")
        .await;
    assert_eq!(response.body["total"], 2);

    let response = fixture.get("/api/v1/sources/Nope/items").await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_source_items_unreachable_host() {
    let fixture = TestFixture::with_config(
        MockCatalogClient::new(HostType::Megathread),
        TestConfig {
            host_type: HostType::Megathread,
            refuse_connections: true,
            ..Default::default()
        },
    );

    let response = fixture.get("/api/v1/sources/Test%20Host/items").await;
    assert_eq!(response.status, StatusCode::BAD_GATEWAY);

    fixture.seed_cache(&[fixtures::item("Old (World).gb")]).await;
    let response = fixture.get("/api/v1/sources/Test%20Host/items").await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["stale_sections"], json!(["GB"]));
    assert_eq!(response.body["items"][0]["filename"], "Old (World).gb");
}

// =============================================================================
// Downloads
// =============================================================================

#[tokio::test]
async fn test_download_partial_failure() {
    let client = MockCatalogClient::new(HostType::Apache)
        .with_listing("gb/", gb_listing())
        .with_file("Tetris (World).gb", b"tetris".to_vec())
        .failing_fetch("Alleyway (World).gb");
    let fixture = TestFixture::new(client);

    let response = fixture
        .post(
            &fixture.section_path("downloads"),
            json!({ "filenames": ["Tetris (World).gb", "Alleyway (World).gb", "Ghost.gb"] }),
        )
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["completed"].as_array().unwrap().len(), 1);
    assert_eq!(response.body["completed"][0]["action"], "as_is");
    assert_eq!(response.body["failed"][0]["item"]["filename"], "Alleyway (World).gb");
    assert_eq!(response.body["not_found"], json!(["Ghost.gb"]));
    assert_eq!(response.body["exit_code"], 1);

    assert!(fixture.local_file("Tetris (World).gb").exists());
    assert!(!fixture.local_file("Alleyway (World).gb").exists());
    assert!(!fixture.local_file("Alleyway (World).gb.part").exists());
}

#[tokio::test]
async fn test_download_unzips_archive() {
    let archive = fixtures::zip_archive(&[("Pokemon Red.gb", b"rom")]);
    let client = MockCatalogClient::new(HostType::Apache)
        .with_listing("gb/", vec![fixtures::item("Pokemon Red.zip")])
        .with_file("Pokemon Red.zip", archive);
    let fixture = TestFixture::new(client);

    let response = fixture
        .post(
            &fixture.section_path("downloads"),
            json!({ "filenames": ["Pokemon Red.zip"] }),
        )
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["exit_code"], 0);
    assert_eq!(response.body["completed"][0]["action"], "unzipped");
    assert!(fixture.local_file("Pokemon Red.gb").exists());
    assert!(!fixture.local_file("Pokemon Red.zip").exists());
}

#[tokio::test]
async fn test_download_keeps_zip_when_unzip_disabled() {
    let archive = fixtures::zip_archive(&[("Pokemon Red.gb", b"rom")]);
    let client = MockCatalogClient::new(HostType::Apache)
        .with_listing("gb/", vec![fixtures::item("Pokemon Red.zip")])
        .with_file("Pokemon Red.zip", archive);
    let fixture = TestFixture::with_config(
        client,
        TestConfig {
            downloads: DownloadConfig {
                unzip: false,
                ..Default::default()
            },
            ..Default::default()
        },
    );

    let response = fixture
        .post(
            &fixture.section_path("downloads"),
            json!({ "filenames": ["Pokemon Red.zip"] }),
        )
        .await;

    assert_eq!(response.body["completed"][0]["action"], "as_is");
    assert!(fixture.local_file("Pokemon Red.zip").exists());
}

#[tokio::test]
async fn test_romm_download_fetches_art() {
    let item = CatalogItem {
        art_url: Some("/assets/romm/resources/roms/4/7/cover/big.png".to_string()),
        ..fixtures::romm_item("Tetris.gb", 7)
    };
    let client = MockCatalogClient::new(HostType::Romm)
        .with_listing("4", vec![item])
        .with_file("Tetris.gb", b"rom".to_vec())
        .with_file("big.png", vec![0x89, 0x50]);
    let fixture = TestFixture::with_config(
        client,
        TestConfig {
            host_type: HostType::Romm,
            password: "pass".to_string(),
            downloads: DownloadConfig {
                download_art: true,
                ..Default::default()
            },
            ..Default::default()
        },
    );

    let response = fixture
        .post(&fixture.section_path("downloads"), json!({ "filenames": ["Tetris.gb"] }))
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["exit_code"], 0);
    assert!(fixture.local_file("Tetris.gb").exists());
    assert!(fixture.local_file(".media/Tetris.png").exists());

    let fetched = fixture.client().fetched();
    assert_eq!(fetched[0].locator, "7");
    assert!(fetched[0].authorization.as_deref().unwrap().starts_with("Basic "));
}

#[tokio::test]
async fn test_download_without_filenames_is_400() {
    let fixture = TestFixture::new(MockCatalogClient::new(HostType::Apache));
    let response = fixture
        .post(&fixture.section_path("downloads"), json!({ "filenames": [] }))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

// =============================================================================
// Art and platforms
// =============================================================================

#[tokio::test]
async fn test_art_for_unlisted_file_is_404() {
    let client = MockCatalogClient::new(HostType::Romm).with_listing("4", vec![]);
    let fixture = TestFixture::with_config(
        client,
        TestConfig {
            host_type: HostType::Romm,
            ..Default::default()
        },
    );

    let response = fixture
        .post(&fixture.section_path("art"), json!({ "filename": "Nope.gb" }))
        .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_romm_art_without_cover_is_null() {
    let client = MockCatalogClient::new(HostType::Romm)
        .with_listing("4", vec![fixtures::romm_item("Tetris.gb", 7)]);
    let fixture = TestFixture::with_config(
        client,
        TestConfig {
            host_type: HostType::Romm,
            ..Default::default()
        },
    );

    let response = fixture
        .post(&fixture.section_path("art"), json!({ "filename": "Tetris.gb" }))
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["art"], serde_json::Value::Null);
}

#[tokio::test]
async fn test_platforms_require_romm_source() {
    let fixture = TestFixture::new(MockCatalogClient::new(HostType::Apache));

    let response = fixture.get("/api/v1/sources/Test%20Host/platforms").await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    let response = fixture.get("/api/v1/sources/Nope/platforms").await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}
