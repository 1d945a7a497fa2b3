//! Types for remote catalog listings.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One listed remote entry with normalized metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogItem {
    /// Remote filename. Identity within a section.
    pub filename: String,
    /// Human-facing name (filename without extension unless mapped).
    #[serde(default)]
    pub display_name: String,
    /// Size as reported by the server ("1.2M", "123456", ...).
    #[serde(default)]
    pub file_size: String,
    /// Modification date as reported by the server.
    #[serde(default)]
    pub last_modified: String,
    /// Opaque protocol handle (RomM rom id).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,
    /// Per-item cover image path (RomM).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub art_url: Option<String>,
    #[serde(default)]
    pub is_directory: bool,
    /// Classification string, e.g. the `GBA` of `Game Boy Advance (GBA)`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
}

impl CatalogItem {
    /// Create a plain file entry.
    pub fn new(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            ..Default::default()
        }
    }

    /// Filename without its final extension.
    pub fn stem(&self) -> &str {
        file_stem(&self.filename)
    }

    /// Display name, falling back to the trimmed stem.
    pub fn title(&self) -> &str {
        if self.display_name.is_empty() {
            self.stem().trim()
        } else {
            &self.display_name
        }
    }
}

/// Strip the final `.ext` from a filename, keeping dotfiles intact.
pub fn file_stem(filename: &str) -> &str {
    match filename.rfind('.') {
        Some(0) | None => filename,
        Some(idx) => &filename[..idx],
    }
}

/// Inclusive and exclusive keyword filters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filters {
    #[serde(default)]
    pub inclusive: Vec<String>,
    #[serde(default)]
    pub exclusive: Vec<String>,
}

impl Filters {
    pub fn is_empty(&self) -> bool {
        self.inclusive.is_empty() && self.exclusive.is_empty()
    }
}

/// Errors for the listing cache.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
