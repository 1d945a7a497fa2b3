//! Zip inspection and safe extraction.

use std::fs::{self, File};
use std::io;
use std::path::{Component, Path, PathBuf};

use tracing::{debug, warn};
use zip::ZipArchive;

use super::error::PostProcessError;

/// Extract every file of `archive` into `dest` and delete the archive.
///
/// All entry names are validated before anything is written; one hostile
/// entry rejects the whole archive. Each file is streamed to `<target>.tmp`
/// and renamed into place. Returns the extracted file paths in archive
/// order.
pub async fn unzip(archive: &Path, dest: &Path) -> Result<Vec<PathBuf>, PostProcessError> {
    let archive = archive.to_path_buf();
    let dest = dest.to_path_buf();

    let extracted = tokio::task::spawn_blocking({
        let archive = archive.clone();
        move || extract_all(&archive, &dest)
    })
    .await
    .map_err(|e| PostProcessError::TaskFailed(e.to_string()))??;

    tokio::fs::remove_file(&archive).await?;
    debug!(archive = %archive.display(), files = extracted.len(), "Archive extracted");
    Ok(extracted)
}

fn extract_all(archive: &Path, dest: &Path) -> Result<Vec<PathBuf>, PostProcessError> {
    let mut zip = ZipArchive::new(File::open(archive)?)?;

    let mut targets = Vec::with_capacity(zip.len());
    for index in 0..zip.len() {
        let entry = zip.by_index(index)?;
        let relative = safe_relative_path(entry.name())?;
        targets.push((relative, entry.is_dir()));
    }

    fs::create_dir_all(dest)?;
    let mut extracted = Vec::new();

    for (index, (relative, is_dir)) in targets.into_iter().enumerate() {
        let target = dest.join(&relative);
        if is_dir {
            fs::create_dir_all(&target)?;
            continue;
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }

        let temp = tmp_path(&target);
        let mut entry = zip.by_index(index)?;
        let written = File::create(&temp).and_then(|mut out| io::copy(&mut entry, &mut out));
        if let Err(e) = written.and_then(|_| fs::rename(&temp, &target)) {
            if let Err(cleanup) = fs::remove_file(&temp) {
                if cleanup.kind() != io::ErrorKind::NotFound {
                    warn!(path = %temp.display(), error = %cleanup, "Failed to remove temp file");
                }
            }
            return Err(e.into());
        }
        extracted.push(target);
    }

    Ok(extracted)
}

/// Reject names that are absolute, carry a drive prefix or climb out
/// with `..`.
fn safe_relative_path(name: &str) -> Result<PathBuf, PostProcessError> {
    let normalized = name.replace('\\', "/");
    let reject = || PostProcessError::PathTraversal {
        entry: name.to_string(),
    };

    if normalized.starts_with('/') || has_drive_prefix(&normalized) {
        return Err(reject());
    }

    let mut relative = PathBuf::new();
    for component in Path::new(&normalized).components() {
        match component {
            Component::Normal(part) => relative.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(reject())
            }
        }
    }
    if relative.as_os_str().is_empty() {
        return Err(reject());
    }
    Ok(relative)
}

fn has_drive_prefix(name: &str) -> bool {
    let bytes = name.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

fn tmp_path(target: &Path) -> PathBuf {
    let mut name = target.as_os_str().to_os_string();
    name.push(".tmp");
    PathBuf::from(name)
}

/// Entry names of a zip archive.
pub async fn list_zip_contents(archive: &Path) -> Result<Vec<String>, PostProcessError> {
    let archive = archive.to_path_buf();
    tokio::task::spawn_blocking(move || {
        let zip = ZipArchive::new(File::open(&archive)?)?;
        Ok(zip.file_names().map(str::to_string).collect())
    })
    .await
    .map_err(|e| PostProcessError::TaskFailed(e.to_string()))?
}

/// True when any name is a `.bin` or `.cue` file.
pub fn has_bin_cue(names: &[String]) -> bool {
    names.iter().any(|n| {
        let lower = n.to_lowercase();
        lower.ends_with(".bin") || lower.ends_with(".cue")
    })
}

/// True when a filename carries a `(Disc` or `(Disk` marker.
pub fn is_multi_disc(name: &str) -> bool {
    name.contains("(Disc") || name.contains("(Disk")
}

/// True when any archive member is one disc of a set.
pub fn archive_is_multi_disc(names: &[String]) -> bool {
    names.iter().any(|n| is_multi_disc(n))
}
