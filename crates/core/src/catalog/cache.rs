//! JSON file cache for slow directory listings.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use super::types::{CacheError, CatalogItem};

/// One JSON file per `(source, section)` pair under a cache directory.
#[derive(Debug, Clone)]
pub struct CatalogCache {
    dir: PathBuf,
}

impl CatalogCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Cache file path for a listing. Both parts are escaped so `_` only
    /// ever appears as the separator and distinct keys never share a file.
    pub fn entry_path(&self, source: &str, section: &str) -> PathBuf {
        self.dir
            .join(format!("{}_{}.json", escape_key(source), escape_key(section)))
    }

    /// Read a cached listing. Missing or unreadable entries are a miss.
    pub async fn get(&self, source: &str, section: &str) -> Option<Vec<CatalogItem>> {
        let path = self.entry_path(source, section);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "Cache miss");
                return None;
            }
        };

        match serde_json::from_slice(&bytes) {
            Ok(items) => Some(items),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Ignoring unreadable cache entry");
                None
            }
        }
    }

    /// Write a listing, creating the cache directory if needed.
    pub async fn put(
        &self,
        source: &str,
        section: &str,
        items: &[CatalogItem],
    ) -> Result<(), CacheError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.entry_path(source, section);
        let json = serde_json::to_vec(items)?;
        tokio::fs::write(&path, json).await?;
        info!(path = %path.display(), items = items.len(), "Cached listing");
        Ok(())
    }

    /// Remove every cached listing.
    pub async fn clear(&self) -> Result<(), CacheError> {
        match tokio::fs::remove_dir_all(&self.dir).await {
            Ok(()) => {
                info!(dir = %self.dir.display(), "Cache cleared");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Keep ASCII letters, digits, `-`, `.`, `(` and `)`. Every other byte,
/// `_` and `%` included, becomes `%XX`.
fn escape_key(part: &str) -> String {
    let mut escaped = String::with_capacity(part.len());
    for byte in part.bytes() {
        match byte {
            b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'-' | b'.' | b'(' | b')' => {
                escaped.push(byte as char)
            }
            _ => escaped.push_str(&format!("%{:02X}", byte)),
        }
    }
    escaped
}
