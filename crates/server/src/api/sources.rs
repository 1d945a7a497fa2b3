//! Source, section and download API handlers.

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use romhaul_core::catalog::search_items;
use romhaul_core::client::http::build_http_client;
use romhaul_core::client::{RommClient, RommPlatform};
use romhaul_core::downloader::FailedDownload;
use romhaul_core::postprocess::ProcessAction;
use romhaul_core::{
    ArtError, CatalogClient, CatalogItem, ClientError, ClientOptions, DownloadOrchestrator,
    HostType, Section, Source,
};

use crate::state::AppState;

// ============================================================================
// Request/Response types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub message: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

fn client_error(e: ClientError) -> ApiError {
    let status = match e {
        ClientError::Configuration(_) | ClientError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::BAD_GATEWAY,
    };
    api_error(status, e.to_string())
}

#[derive(Debug, Serialize)]
pub struct SourceSummary {
    pub display_name: String,
    pub host_type: HostType,
    pub sections: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct ItemsQuery {
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub refresh: bool,
}

#[derive(Debug, Serialize)]
pub struct ItemsResponse {
    pub source: String,
    pub section: String,
    pub items: Vec<CatalogItem>,
    pub total: usize,
    /// Served from the listing cache because the host could not be reached.
    pub stale: bool,
}

#[derive(Debug, Serialize)]
pub struct SourceItemsResponse {
    pub source: String,
    pub items: Vec<CatalogItem>,
    pub total: usize,
    /// Sections served from the listing cache because their listing failed.
    pub stale_sections: Vec<String>,
    /// Sections missing from `items` entirely.
    pub failed_sections: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct DownloadBody {
    pub filenames: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct DownloadedEntry {
    pub filename: String,
    pub bytes: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<ProcessAction>,
    pub files: Vec<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub art: Option<PathBuf>,
    /// Post-processing failure. The download itself succeeded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DownloadResponse {
    pub completed: Vec<DownloadedEntry>,
    pub failed: Vec<FailedDownload>,
    /// Requested names that the section does not list.
    pub not_found: Vec<String>,
    pub exit_code: i32,
}

#[derive(Debug, Deserialize)]
pub struct ArtBody {
    pub filename: String,
}

#[derive(Debug, Serialize)]
pub struct ArtResponse {
    pub filename: String,
    pub art: Option<PathBuf>,
}

// ============================================================================
// Helpers
// ============================================================================

fn lookup<'a>(
    state: &'a AppState,
    source: &str,
    section: &str,
) -> Result<(&'a Source, &'a Section), ApiError> {
    let src = state
        .config()
        .source(source)
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, format!("Source not found: {}", source)))?;
    let sec = src.section(section).ok_or_else(|| {
        api_error(
            StatusCode::NOT_FOUND,
            format!("Section not found: {} / {}", source, section),
        )
    })?;
    Ok((src, sec))
}

async fn connect(state: &AppState, source: &Source) -> Result<Arc<dyn CatalogClient>, ClientError> {
    state.factory().connect(source).await
}

async fn close(client: &dyn CatalogClient, source: &Source) {
    if let Err(e) = client.close().await {
        warn!(source = %source.display_name, error = %e, "Failed to close client");
    }
}

/// Fresh listing through the factory, or the cached one when the host fails.
async fn listing(
    state: &AppState,
    client: Result<&dyn CatalogClient, ClientError>,
    source: &Source,
    section: &Section,
    refresh: bool,
) -> Result<(Vec<CatalogItem>, bool), ApiError> {
    let result = match client {
        Ok(client) => {
            state
                .browser()
                .load_section(client, source, section, refresh)
                .await
        }
        Err(e) => Err(e),
    };

    match result {
        Ok(items) => Ok((items, false)),
        Err(e) => match state.browser().cached_section(source, section).await {
            Some(items) => {
                warn!(
                    source = %source.display_name,
                    section = %section.name,
                    error = %e,
                    "Listing failed, serving cached copy"
                );
                Ok((items, true))
            }
            None => Err(client_error(e)),
        },
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/v1/sources
pub async fn list_sources(State(state): State<Arc<AppState>>) -> Json<Vec<SourceSummary>> {
    Json(
        state
            .config()
            .sources
            .iter()
            .map(|s| SourceSummary {
                display_name: s.display_name.clone(),
                host_type: s.host_type,
                sections: s.sections.iter().map(|sec| sec.name.clone()).collect(),
            })
            .collect(),
    )
}

/// GET /api/v1/sources/{source}/sections/{section}/items
///
/// Filtered, sorted listing of a section. `search` narrows it further and
/// `refresh` skips the cache read for cacheable hosts.
pub async fn list_items(
    State(state): State<Arc<AppState>>,
    Path((source, section)): Path<(String, String)>,
    Query(params): Query<ItemsQuery>,
) -> Result<Json<ItemsResponse>, ApiError> {
    let (src, sec) = lookup(&state, &source, &section)?;

    let (items, stale) = match connect(&state, src).await {
        Ok(client) => {
            let listed = listing(&state, Ok(client.as_ref()), src, sec, params.refresh).await;
            close(client.as_ref(), src).await;
            listed?
        }
        Err(e) => listing(&state, Err(e), src, sec, params.refresh).await?,
    };

    let items = match params.search.as_deref() {
        Some(term) => search_items(&items, term),
        None => items,
    };

    Ok(Json(ItemsResponse {
        source,
        section,
        total: items.len(),
        items,
        stale,
    }))
}

/// GET /api/v1/sources/{source}/items
///
/// Every file of every section, tagged with its platform. Sections that
/// fail are reported and skipped; only a source where all of them fail is
/// an error.
pub async fn list_source_items(
    State(state): State<Arc<AppState>>,
    Path(source): Path<String>,
    Query(params): Query<ItemsQuery>,
) -> Result<Json<SourceItemsResponse>, ApiError> {
    let src = state
        .config()
        .source(&source)
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, format!("Source not found: {}", source)))?;

    let listing = match connect(&state, src).await {
        Ok(client) => {
            let listing = state
                .browser()
                .load_source(client.as_ref(), src, params.refresh)
                .await;
            close(client.as_ref(), src).await;
            listing
        }
        Err(e) => {
            warn!(source = %src.display_name, error = %e, "Host unreachable, serving cached sections");
            state.browser().cached_source(src).await
        }
    };

    if listing.all_failed(src) {
        return Err(api_error(
            StatusCode::BAD_GATEWAY,
            format!("No section of {} could be listed", src.display_name),
        ));
    }

    let items = match params.search.as_deref() {
        Some(term) => search_items(&listing.items, term),
        None => listing.items,
    };

    info!(source = %src.display_name, items = items.len(), "Listed source");
    Ok(Json(SourceItemsResponse {
        source,
        total: items.len(),
        items,
        stale_sections: listing.stale_sections,
        failed_sections: listing.failed_sections,
    }))
}

/// POST /api/v1/sources/{source}/sections/{section}/downloads
///
/// Download the named files, post-process each completed one and fetch art
/// when enabled.
pub async fn download(
    State(state): State<Arc<AppState>>,
    Path((source, section)): Path<(String, String)>,
    Json(body): Json<DownloadBody>,
) -> Result<Json<DownloadResponse>, ApiError> {
    let (src, sec) = lookup(&state, &source, &section)?;
    if body.filenames.is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "No filenames given"));
    }

    let client = connect(&state, src).await.map_err(client_error)?;
    let items = match listing(&state, Ok(client.as_ref()), src, sec, false).await {
        Ok((items, _)) => items,
        Err(e) => {
            close(client.as_ref(), src).await;
            return Err(e);
        }
    };

    let mut selected = Vec::new();
    let mut not_found = Vec::new();
    for name in &body.filenames {
        match items.iter().find(|i| &i.filename == name && !i.is_directory) {
            Some(item) => selected.push(item.clone()),
            None => not_found.push(name.clone()),
        }
    }

    let downloads = &state.config().downloads;
    let orchestrator = DownloadOrchestrator::new(client.clone(), src.clone(), sec.clone(), downloads);
    let result = orchestrator.download(&selected).await;

    let mut completed = Vec::with_capacity(result.completed.len());
    for done in &result.completed {
        let mut entry = DownloadedEntry {
            filename: done.item.filename.clone(),
            bytes: done.bytes,
            action: None,
            files: vec![done.path.clone()],
            art: None,
            error: None,
        };

        match state
            .processor()
            .process(&done.path, done.item.title(), &sec.local_directory)
            .await
        {
            Ok(outcome) => {
                entry.action = Some(outcome.action);
                entry.files = outcome.files;
            }
            Err(e) => {
                warn!(file = %done.item.filename, error = %e, "Post-processing failed");
                entry.error = Some(e.to_string());
            }
        }

        if downloads.download_art {
            // Lookup failures are logged and counted by the matcher.
            if let Ok(art) = state.art().find_art_with(client.as_ref(), sec, &done.item).await {
                entry.art = art;
            }
        }

        completed.push(entry);
    }

    close(client.as_ref(), src).await;

    let exit_code = if not_found.is_empty() { result.exit_code() } else { 1 };
    info!(
        source = %src.display_name,
        section = %sec.name,
        completed = completed.len(),
        failed = result.failed.len(),
        not_found = not_found.len(),
        "Download request finished"
    );

    Ok(Json(DownloadResponse {
        completed,
        failed: result.failed,
        not_found,
        exit_code,
    }))
}

/// POST /api/v1/sources/{source}/sections/{section}/art
pub async fn find_art(
    State(state): State<Arc<AppState>>,
    Path((source, section)): Path<(String, String)>,
    Json(body): Json<ArtBody>,
) -> Result<Json<ArtResponse>, ApiError> {
    let (src, sec) = lookup(&state, &source, &section)?;

    let client = connect(&state, src).await.map_err(client_error)?;
    let result = match listing(&state, Ok(client.as_ref()), src, sec, false).await {
        Ok((items, _)) => match items.into_iter().find(|i| i.filename == body.filename) {
            Some(item) => Ok(state.art().find_art_with(client.as_ref(), sec, &item).await),
            None => Err(api_error(
                StatusCode::NOT_FOUND,
                format!("File not listed: {}", body.filename),
            )),
        },
        Err(e) => Err(e),
    };
    close(client.as_ref(), src).await;

    match result? {
        Ok(art) => Ok(Json(ArtResponse {
            filename: body.filename,
            art,
        })),
        Err(ArtError::UnknownPlatform(tag)) => Err(api_error(
            StatusCode::BAD_REQUEST,
            format!("No thumbnail system for platform: {}", tag),
        )),
        Err(ArtError::Client(e)) => Err(client_error(e)),
        Err(e) => Err(api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())),
    }
}

/// GET /api/v1/sources/{source}/platforms
///
/// Platforms of a RomM source, for filling in `romm_platform_id`.
pub async fn list_platforms(
    State(state): State<Arc<AppState>>,
    Path(source): Path<String>,
) -> Result<Json<Vec<RommPlatform>>, ApiError> {
    let src = state
        .config()
        .source(&source)
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, format!("Source not found: {}", source)))?;
    if src.host_type != HostType::Romm {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            format!("Source '{}' is not a RomM server", source),
        ));
    }

    let options = ClientOptions::from(&state.config().downloads);
    let http = build_http_client(options.timeout).map_err(client_error)?;
    let romm = RommClient::new(http, &src.root_uri, src.port, &src.username, &src.password)
        .map_err(client_error)?;
    romm.list_platforms().await.map(Json).map_err(client_error)
}

/// DELETE /api/v1/cache
pub async fn clear_cache(
    State(state): State<Arc<AppState>>,
) -> Result<Json<SuccessResponse>, ApiError> {
    match state.browser().cache().clear().await {
        Ok(()) => Ok(Json(SuccessResponse {
            message: "Listing cache cleared".to_string(),
        })),
        Err(e) => Err(api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())),
    }
}
