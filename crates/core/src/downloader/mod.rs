//! Batch downloads from a catalog client into a section's local folder.

mod orchestrator;
mod types;

pub use orchestrator::DownloadOrchestrator;
pub use types::*;
