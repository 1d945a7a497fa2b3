//! Download batch request and result types.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::catalog::CatalogItem;

/// One prepared transfer. Built fresh for every batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    /// Protocol retrieval URL (for logging on SMB).
    pub source_url: String,
    /// Local file the payload is written to.
    pub destination_path: PathBuf,
    pub display_name: String,
    /// `Authorization` header value, when the host needs one.
    pub authorization: Option<String>,
    /// Protocol locator of the item (subdirectory or rom id).
    pub locator: String,
    pub remote_filename: String,
}

/// A transfer that finished.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletedDownload {
    pub item: CatalogItem,
    pub path: PathBuf,
    pub bytes: u64,
}

/// A transfer that failed. Its partial file has been removed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedDownload {
    pub item: CatalogItem,
    pub path: PathBuf,
    pub error: String,
}

/// Outcome of a batch, partitioned by result.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DownloadResult {
    pub completed: Vec<CompletedDownload>,
    pub failed: Vec<FailedDownload>,
}

impl DownloadResult {
    /// Some items completed and some failed.
    pub fn is_partial_success(&self) -> bool {
        !self.completed.is_empty() && !self.failed.is_empty()
    }

    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }

    /// Process exit code: 0 when nothing failed, 1 otherwise.
    pub fn exit_code(&self) -> i32 {
        if self.has_failures() {
            1
        } else {
            0
        }
    }

    pub fn total(&self) -> usize {
        self.completed.len() + self.failed.len()
    }
}
