//! Post-processing error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while unpacking or rearranging downloads.
#[derive(Debug, Error)]
pub enum PostProcessError {
    /// An archive entry would land outside the extraction directory.
    #[error("Archive entry escapes destination: {entry}")]
    PathTraversal { entry: String },

    /// The archive could not be read.
    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// Failed to move a file into its group folder.
    #[error("Failed to move file from {from} to {to}")]
    MoveFailed {
        from: PathBuf,
        to: PathBuf,
        #[source]
        error: std::io::Error,
    },

    /// Failed to create a group folder.
    #[error("Failed to create directory: {path}")]
    DirectoryCreationFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A blocking extraction task panicked or was cancelled.
    #[error("Background task failed: {0}")]
    TaskFailed(String),
}

impl PostProcessError {
    /// True for the security rejection of a hostile archive.
    pub fn is_security(&self) -> bool {
        matches!(self, PostProcessError::PathTraversal { .. })
    }
}
