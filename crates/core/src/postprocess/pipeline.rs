//! Applies the configured post-processing steps to one download.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{info, warn};

use super::archive::{archive_is_multi_disc, has_bin_cue, is_multi_disc, list_zip_contents, unzip};
use super::error::PostProcessError;
use super::layout::{group_bin_cue, group_multi_disc};
use crate::config::DownloadConfig;
use crate::metrics;

/// Which step handled a download.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessAction {
    MultiDisc,
    BinCue,
    Unzipped,
    AsIs,
}

impl ProcessAction {
    fn metric_label(&self) -> &'static str {
        match self {
            ProcessAction::MultiDisc => "multi_disc",
            ProcessAction::BinCue => "bin_cue",
            ProcessAction::Unzipped => "unzip",
            ProcessAction::AsIs => "none",
        }
    }
}

/// Result of processing one download.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessOutcome {
    pub action: ProcessAction,
    /// Final location of every file the download produced.
    pub files: Vec<PathBuf>,
}

/// Post-processing toggles taken from [`DownloadConfig`].
#[derive(Debug, Clone, Copy)]
pub struct PostProcessor {
    unzip: bool,
    group_bin_cue: bool,
    group_multi_disc: bool,
}

impl PostProcessor {
    pub fn new(config: &DownloadConfig) -> Self {
        Self {
            unzip: config.unzip,
            group_bin_cue: config.group_bin_cue,
            group_multi_disc: config.group_multi_disc,
        }
    }

    /// Process `downloaded`, which lives in `local_dir`.
    ///
    /// Steps are tried in order: multi-disc grouping, BIN/CUE grouping,
    /// plain unzip. The first that applies wins; otherwise the file is left
    /// as is.
    pub async fn process(
        &self,
        downloaded: &Path,
        display_name: &str,
        local_dir: &Path,
    ) -> Result<ProcessOutcome, PostProcessError> {
        let is_zip = downloaded
            .extension()
            .is_some_and(|e| e.eq_ignore_ascii_case("zip"));

        let members = if is_zip && (self.unzip || self.group_bin_cue || self.group_multi_disc) {
            list_zip_contents(downloaded).await?
        } else {
            Vec::new()
        };

        let multi_disc = if is_zip {
            archive_is_multi_disc(&members)
        } else {
            downloaded
                .file_name()
                .is_some_and(|n| is_multi_disc(&n.to_string_lossy()))
        };

        let action = if self.group_multi_disc && multi_disc {
            ProcessAction::MultiDisc
        } else if self.group_bin_cue && is_zip && has_bin_cue(&members) {
            ProcessAction::BinCue
        } else if self.unzip && is_zip {
            ProcessAction::Unzipped
        } else {
            ProcessAction::AsIs
        };

        let result = self.run(action, downloaded, display_name, local_dir, is_zip).await;
        let label = action.metric_label();
        match &result {
            Ok(outcome) => {
                if action != ProcessAction::AsIs {
                    metrics::EXTRACTIONS_TOTAL
                        .with_label_values(&[label, "success"])
                        .inc();
                    info!(
                        file = %downloaded.display(),
                        step = label,
                        files = outcome.files.len(),
                        "Post-processed download"
                    );
                }
            }
            Err(e) => {
                metrics::EXTRACTIONS_TOTAL
                    .with_label_values(&[label, "error"])
                    .inc();
                warn!(file = %downloaded.display(), step = label, error = %e, "Post-processing failed");
            }
        }
        result
    }

    async fn run(
        &self,
        action: ProcessAction,
        downloaded: &Path,
        display_name: &str,
        local_dir: &Path,
        is_zip: bool,
    ) -> Result<ProcessOutcome, PostProcessError> {
        let files = match action {
            ProcessAction::MultiDisc => {
                let files = if is_zip {
                    unzip(downloaded, local_dir).await?
                } else {
                    vec![downloaded.to_path_buf()]
                };
                group_multi_disc(local_dir, display_name, &files).await?.files
            }
            ProcessAction::BinCue => {
                let files = unzip(downloaded, local_dir).await?;
                group_bin_cue(&files).await?
            }
            ProcessAction::Unzipped => unzip(downloaded, local_dir).await?,
            ProcessAction::AsIs => vec![downloaded.to_path_buf()],
        };
        Ok(ProcessOutcome { action, files })
    }
}
