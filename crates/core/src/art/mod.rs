//! Cover art acquisition.
//!
//! RomM items carry their own art URL. Everything else is matched against
//! the libretro thumbnail repository by platform tag and display name.

mod matcher;
mod resize;
mod systems;

pub use matcher::{match_thumbnail, media_path, romm_art, ArtMatcher, MEDIA_DIR};
pub use resize::resize_in_place;
pub use systems::SystemsMap;

use thiserror::Error;

use crate::client::ClientError;

/// Errors that can occur during art lookup.
#[derive(Debug, Error)]
pub enum ArtError {
    #[error("Art download failed: {0}")]
    Client(#[from] ClientError),

    #[error("Image processing failed: {0}")]
    Image(#[from] image::ImageError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The section has no tag, or the tag has no thumbnail system.
    #[error("No thumbnail system for platform '{0}'")]
    UnknownPlatform(String),

    #[error("Invalid systems mapping: {0}")]
    InvalidMapping(String),

    #[error("Background task failed: {0}")]
    TaskFailed(String),
}
