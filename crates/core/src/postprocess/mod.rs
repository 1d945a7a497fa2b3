//! Post-processing of completed downloads.
//!
//! Zip archives are extracted with path validation, BIN/CUE sets get their
//! own folder and multi-disc titles are gathered under one folder with an
//! M3U playlist.

mod archive;
mod error;
mod layout;
mod pipeline;

pub use archive::{archive_is_multi_disc, has_bin_cue, is_multi_disc, list_zip_contents, unzip};
pub use error::PostProcessError;
pub use layout::{group_bin_cue, group_multi_disc, multi_disc_folder_name, MultiDiscGroup};
pub use pipeline::{PostProcessor, ProcessAction, ProcessOutcome};
