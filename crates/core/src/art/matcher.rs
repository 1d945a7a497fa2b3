//! Cover art lookup for downloaded games.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use super::resize::resize_in_place;
use super::systems::SystemsMap;
use super::ArtError;
use crate::catalog::{extract_tag, CatalogItem};
use crate::client::http::build_http_client;
use crate::client::{build_client_with, CatalogClient, ClientOptions, HostType, HttpTableClient, TableColumns};
use crate::config::{ArtConfig, ArtKind, Section, Source};
use crate::metrics;

/// Directory under a section's local folder that receives art.
pub const MEDIA_DIR: &str = ".media";

/// Finds, downloads and resizes art for catalog items.
pub struct ArtMatcher {
    thumbnails: HttpTableClient,
    systems: SystemsMap,
    kind: ArtKind,
    resize_width: u32,
    options: ClientOptions,
}

impl ArtMatcher {
    pub fn new(config: &ArtConfig, kind: ArtKind, options: ClientOptions) -> Result<Self, ArtError> {
        let systems = match &config.systems_mapping {
            Some(path) => SystemsMap::with_overrides(path)?,
            None => SystemsMap::builtin(),
        };
        let thumbnails = HttpTableClient::new(
            build_http_client(options.timeout)?,
            config.thumbnail_root.as_str(),
            HostType::Apache,
            TableColumns {
                filename_header: "Name".to_string(),
                ..Default::default()
            },
            &HashMap::new(),
        )?;

        Ok(Self {
            thumbnails,
            systems,
            kind,
            resize_width: config.resize_width,
            options,
        })
    }

    pub fn kind(&self) -> ArtKind {
        self.kind
    }

    /// Find art for `item` and save it under `<local_dir>/.media`.
    ///
    /// RomM sources download the art the server advertises; every other
    /// source searches the thumbnail repository. `Ok(None)` means no art.
    pub async fn find_art(
        &self,
        source: &Source,
        section: &Section,
        item: &CatalogItem,
    ) -> Result<Option<PathBuf>, ArtError> {
        let result = if source.host_type == HostType::Romm {
            match build_client_with(source, &self.options).await {
                Ok(client) => romm_art(client.as_ref(), section, item).await,
                Err(e) => Err(e.into()),
            }
        } else {
            self.thumbnail_art(section, item).await
        };
        record_lookup(item, result)
    }

    /// Same as [`find_art`](Self::find_art) with an already connected
    /// client for the item's source.
    pub async fn find_art_with(
        &self,
        client: &dyn CatalogClient,
        section: &Section,
        item: &CatalogItem,
    ) -> Result<Option<PathBuf>, ArtError> {
        let result = if client.host_type() == HostType::Romm {
            romm_art(client, section, item).await
        } else {
            self.thumbnail_art(section, item).await
        };
        record_lookup(item, result)
    }

    /// Platform tag of a section: the configured tag, or the trailing
    /// `(TAG)` of its local folder name.
    pub fn platform_tag(section: &Section) -> Option<String> {
        if !section.system_tag.trim().is_empty() {
            return Some(section.system_tag.trim().to_string());
        }
        section
            .local_directory
            .file_name()
            .and_then(|name| extract_tag(&name.to_string_lossy()))
    }

    /// Thumbnail repository directory listing art of `kind` for a tag.
    pub fn thumbnail_locator(&self, tag: &str) -> Result<String, ArtError> {
        let system = self
            .systems
            .system(tag)
            .ok_or_else(|| ArtError::UnknownPlatform(tag.to_string()))?;
        Ok(format!("/{}/{}/", system, self.kind.directory()))
    }

    async fn thumbnail_art(&self, section: &Section, item: &CatalogItem) -> Result<Option<PathBuf>, ArtError> {
        let tag = Self::platform_tag(section)
            .ok_or_else(|| ArtError::UnknownPlatform(section.name.clone()))?;
        let locator = self.thumbnail_locator(&tag)?;

        let listing = self.thumbnails.list_directory(&locator).await?;
        let Some(hit) = match_thumbnail(&listing, item.title()) else {
            return Ok(None);
        };

        let media_dir = section.local_directory.join(MEDIA_DIR);
        let saved = self
            .thumbnails
            .download_file_rename(&locator, &media_dir, &hit.filename, &item.filename)
            .await?;
        resize_in_place(&saved, self.resize_width).await?;
        Ok(Some(saved))
    }
}

fn record_lookup(
    item: &CatalogItem,
    result: Result<Option<PathBuf>, ArtError>,
) -> Result<Option<PathBuf>, ArtError> {
    let label = match &result {
        Ok(Some(path)) => {
            info!(game = %item.title(), path = %path.display(), "Art saved");
            "found"
        }
        Ok(None) => {
            debug!(game = %item.title(), "No art found");
            "not_found"
        }
        Err(e) => {
            warn!(game = %item.title(), error = %e, "Art lookup failed");
            "error"
        }
    };
    metrics::ART_LOOKUPS.with_label_values(&[label]).inc();
    result
}

/// First listing entry whose filename contains the display name, ignoring
/// case. `&` is not allowed in thumbnail names and is matched as `_`.
pub fn match_thumbnail<'a>(listing: &'a [CatalogItem], display_name: &str) -> Option<&'a CatalogItem> {
    let needle = thumbnail_key(display_name);
    if needle.is_empty() {
        return None;
    }
    listing
        .iter()
        .filter(|art| !art.is_directory)
        .find(|art| thumbnail_key(&art.filename).contains(&needle))
}

/// Lowercase, `&` as `_`, no spaces around `_`.
fn thumbnail_key(name: &str) -> String {
    let replaced = name.replace('&', "_").to_lowercase();
    let mut key = String::with_capacity(replaced.len());
    for c in replaced.chars() {
        if c == '_' {
            while key.ends_with(' ') {
                key.pop();
            }
        } else if c == ' ' && key.ends_with('_') {
            continue;
        }
        key.push(c);
    }
    key.trim().to_string()
}

/// Download the art a RomM server advertises for `item`.
pub async fn romm_art(
    client: &dyn CatalogClient,
    section: &Section,
    item: &CatalogItem,
) -> Result<Option<PathBuf>, ArtError> {
    let Some(art_url) = item.art_url.as_deref().filter(|u| !u.is_empty()) else {
        return Ok(None);
    };
    let (directory, filename) = split_art_url(art_url);
    if filename.is_empty() {
        return Ok(None);
    }

    let media_dir = section.local_directory.join(MEDIA_DIR);
    let saved = client
        .download_file_rename(directory, &media_dir, filename, &item.filename)
        .await?;
    Ok(Some(saved))
}

/// Split an art URL into its directory and its filename without query.
fn split_art_url(art_url: &str) -> (&str, &str) {
    let (directory, filename) = art_url.rsplit_once('/').unwrap_or(("", art_url));
    let filename = filename.split('?').next().unwrap_or_default();
    (directory, filename)
}

/// Art path a downloaded item would get, whether or not it exists yet.
pub fn media_path(local_dir: &Path, art_filename: &str, item_filename: &str) -> PathBuf {
    crate::client::renamed_target(&local_dir.join(MEDIA_DIR), art_filename, item_filename)
}
