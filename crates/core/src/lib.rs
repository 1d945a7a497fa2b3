pub mod art;
pub mod catalog;
pub mod client;
pub mod config;
pub mod downloader;
pub mod metrics;
pub mod postprocess;
pub mod testing;

pub use art::{ArtError, ArtMatcher};
pub use catalog::{CacheError, CatalogBrowser, CatalogCache, CatalogItem, Filters};
pub use client::{build_client, build_client_with, CatalogClient, ClientError, ClientOptions, HostType};
pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, SanitizedConfig,
    Section, Source,
};
pub use downloader::{DownloadOrchestrator, DownloadRequest, DownloadResult};
pub use postprocess::{PostProcessError, PostProcessor};
