use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::middleware::metrics_middleware;
use super::{handlers, sources};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    let api_routes = Router::new()
        // Health, config and metrics
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        .route("/metrics", get(handlers::metrics))
        // Listing cache
        .route("/cache", delete(sources::clear_cache))
        // Sources and sections
        .route("/sources", get(sources::list_sources))
        .route("/sources/{source}/items", get(sources::list_source_items))
        .route("/sources/{source}/platforms", get(sources::list_platforms))
        .route(
            "/sources/{source}/sections/{section}/items",
            get(sources::list_items),
        )
        .route(
            "/sources/{source}/sections/{section}/downloads",
            post(sources::download),
        )
        .route("/sources/{source}/sections/{section}/art", post(sources::find_art))
        .with_state(state);

    Router::new()
        .nest("/api/v1", api_routes)
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
}
