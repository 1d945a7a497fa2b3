use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::IpAddr;
use std::path::PathBuf;

use crate::catalog::Filters;
use crate::client::{HostType, TableColumns};

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub downloads: DownloadConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub art: ArtConfig,
    #[serde(default)]
    pub sources: Vec<Source>,
}

impl Config {
    /// Look up a source by its display name.
    pub fn source(&self, display_name: &str) -> Option<&Source> {
        self.sources.iter().find(|s| s.display_name == display_name)
    }
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([127, 0, 0, 1])
}

fn default_port() -> u16 {
    8080
}

/// Global download and post-processing toggles.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DownloadConfig {
    /// Extract `.zip` downloads in place.
    #[serde(default = "default_true")]
    pub unzip: bool,
    /// Move BIN/CUE sets into a folder named after the cue sheet.
    #[serde(default = "default_true")]
    pub group_bin_cue: bool,
    /// Collect multi-disc titles into one folder with an M3U playlist.
    #[serde(default = "default_true")]
    pub group_multi_disc: bool,
    /// Fetch cover art after each successful download.
    #[serde(default)]
    pub download_art: bool,
    /// Which libretro thumbnail set to use.
    #[serde(default)]
    pub art_kind: ArtKind,
    /// Concurrent transfers per batch.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u32,
    /// Optional TSV mapping arcade ROM filenames to display names.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arcade_mapping: Option<PathBuf>,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            unzip: true,
            group_bin_cue: true,
            group_multi_disc: true,
            download_art: false,
            art_kind: ArtKind::default(),
            max_concurrent: default_max_concurrent(),
            timeout_secs: default_timeout(),
            arcade_mapping: None,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_max_concurrent() -> usize {
    4
}

fn default_timeout() -> u32 {
    300
}

/// Thumbnail flavour served by the libretro thumbnail repository.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtKind {
    #[default]
    BoxArt,
    TitleScreen,
    Snapshot,
}

impl ArtKind {
    /// Directory name used by the thumbnail repository.
    pub fn directory(&self) -> &'static str {
        match self {
            ArtKind::BoxArt => "Named_Boxarts",
            ArtKind::TitleScreen => "Named_Titles",
            ArtKind::Snapshot => "Named_Snaps",
        }
    }
}

/// Listing cache configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_dir")]
    pub dir: PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: default_cache_dir(),
        }
    }
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from(".cache")
}

/// Art lookup configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ArtConfig {
    /// Root of the Apache-style thumbnail repository.
    #[serde(default = "default_thumbnail_root")]
    pub thumbnail_root: String,
    /// JSON object overriding the built-in tag -> system name table.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub systems_mapping: Option<PathBuf>,
    /// Width in pixels thumbnails are resized to.
    #[serde(default = "default_resize_width")]
    pub resize_width: u32,
}

impl Default for ArtConfig {
    fn default() -> Self {
        Self {
            thumbnail_root: default_thumbnail_root(),
            systems_mapping: None,
            resize_width: default_resize_width(),
        }
    }
}

fn default_thumbnail_root() -> String {
    "https://thumbnails.libretro.com".to_string()
}

fn default_resize_width() -> u32 {
    500
}

/// A configured remote repository.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Source {
    pub display_name: String,
    pub host_type: HostType,
    pub root_uri: String,
    /// 0 means the protocol default.
    #[serde(default)]
    pub port: u16,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    /// SMB share to mount.
    #[serde(default)]
    pub share_name: String,
    /// SMB-only deny-list applied to raw directory entries.
    #[serde(default)]
    pub extension_filters: Vec<String>,
    /// Header names for `custom` table hosts.
    #[serde(default)]
    pub table_columns: TableColumns,
    /// Raw text replacements applied to `custom` table listings.
    #[serde(default)]
    pub source_replacements: HashMap<String, String>,
    #[serde(default)]
    pub filters: Filters,
    #[serde(default)]
    pub sections: Vec<Section>,
}

impl Source {
    /// Look up a section by name.
    pub fn section(&self, name: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.name == name)
    }

    pub fn has_credentials(&self) -> bool {
        !self.username.is_empty()
    }
}

/// A platform within a source.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Section {
    pub name: String,
    #[serde(default)]
    pub system_tag: String,
    #[serde(default)]
    pub local_directory: PathBuf,
    #[serde(default)]
    pub host_subdirectory: String,
    #[serde(default)]
    pub romm_platform_id: String,
}

impl Section {
    /// Protocol-scoped identifier passed to `list_directory`.
    pub fn locator(&self, host_type: HostType) -> &str {
        match host_type {
            HostType::Romm => &self.romm_platform_id,
            _ => &self.host_subdirectory,
        }
    }
}

/// Sanitized config for API responses (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub downloads: DownloadConfig,
    pub cache: CacheConfig,
    pub art: ArtConfig,
    pub sources: Vec<SanitizedSource>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedSource {
    pub display_name: String,
    pub host_type: HostType,
    pub root_uri: String,
    pub port: u16,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub username: String,
    pub password_configured: bool,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub share_name: String,
    pub filters: Filters,
    pub sections: Vec<Section>,
}

impl From<&Source> for SanitizedSource {
    fn from(source: &Source) -> Self {
        Self {
            display_name: source.display_name.clone(),
            host_type: source.host_type,
            root_uri: source.root_uri.clone(),
            port: source.port,
            username: source.username.clone(),
            password_configured: !source.password.is_empty(),
            share_name: source.share_name.clone(),
            filters: source.filters.clone(),
            sections: source.sections.clone(),
        }
    }
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            server: config.server.clone(),
            downloads: config.downloads.clone(),
            cache: config.cache.clone(),
            art: config.art.clone(),
            sources: config.sources.iter().map(SanitizedSource::from).collect(),
        }
    }
}
