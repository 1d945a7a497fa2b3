use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use romhaul_core::catalog::ArcadeNames;
use romhaul_core::client::{ClientFactory, DefaultClientFactory};
use romhaul_core::{
    load_config, validate_config, ArtMatcher, CatalogBrowser, CatalogCache, ClientOptions,
};
use romhaul_server::api::create_router;
use romhaul_server::state::AppState;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config_path = std::env::var("ROMHAUL_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    validate_config(&config).context("Configuration validation failed")?;

    info!(
        sources = config.sources.len(),
        cache_dir = %config.cache.dir.display(),
        "Configuration loaded successfully"
    );

    let mut browser = CatalogBrowser::new(CatalogCache::new(&config.cache.dir));
    if let Some(path) = &config.downloads.arcade_mapping {
        let names = ArcadeNames::load(path)
            .with_context(|| format!("Failed to read arcade mapping {:?}", path))?;
        info!(entries = names.len(), "Arcade name mapping loaded");
        browser = browser.with_arcade_names(names);
    }

    let options = ClientOptions::from(&config.downloads);
    let art = ArtMatcher::new(&config.art, config.downloads.art_kind, options.clone())
        .context("Failed to set up art lookup")?;
    let factory: Arc<dyn ClientFactory> = Arc::new(DefaultClientFactory::new(options));

    let addr = SocketAddr::new(config.server.host, config.server.port);
    let state = Arc::new(AppState::new(config, browser, factory, art));
    let app = create_router(state);

    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server stopped");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
