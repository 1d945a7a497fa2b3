use std::path::Path;

use image::imageops::FilterType;

use super::ArtError;

/// Scale an image file to `width` with proportional height, overwriting it.
pub async fn resize_in_place(path: &Path, width: u32) -> Result<(), ArtError> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || {
        let img = image::open(&path)?;
        let (w, h) = (img.width(), img.height());
        if w == 0 || width == 0 {
            return Ok(());
        }
        let height = ((u64::from(h) * u64::from(width)) / u64::from(w)).max(1) as u32;
        img.resize_exact(width, height, FilterType::Lanczos3).save(&path)?;
        Ok(())
    })
    .await
    .map_err(|e| ArtError::TaskFailed(e.to_string()))?
}
