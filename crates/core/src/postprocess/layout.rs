//! Folder layout for BIN/CUE sets and multi-disc titles.

use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use super::error::PostProcessError;

const PLAYLIST_EXTENSIONS: [&str; 3] = ["cue", "chd", "pbp"];

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension()
        .is_some_and(|e| e.to_string_lossy().eq_ignore_ascii_case(ext))
}

fn file_name(path: &Path) -> Result<&std::ffi::OsStr, PostProcessError> {
    path.file_name().ok_or_else(|| {
        PostProcessError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("not a file path: {}", path.display()),
        ))
    })
}

async fn create_dir(path: &Path) -> Result<(), PostProcessError> {
    fs::create_dir_all(path)
        .await
        .map_err(|source| PostProcessError::DirectoryCreationFailed {
            path: path.to_path_buf(),
            source,
        })
}

/// Move a file, falling back to copy and delete across filesystems.
async fn move_file(from: &Path, to: &Path) -> Result<(), PostProcessError> {
    let failed = |error| PostProcessError::MoveFailed {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        error,
    };
    match fs::rename(from, to).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::CrossesDevices || e.raw_os_error() == Some(18) => {
            fs::copy(from, to).await.map_err(failed)?;
            fs::remove_file(from).await.map_err(failed)
        }
        Err(e) => Err(failed(e)),
    }
}

/// Give every `.cue` its own folder named after its stem and move the cue
/// plus every `.bin` from the same directory into it.
///
/// Returns the final location of every input file.
pub async fn group_bin_cue(files: &[PathBuf]) -> Result<Vec<PathBuf>, PostProcessError> {
    let mut placed: Vec<PathBuf> = files.to_vec();

    let cues: Vec<PathBuf> = files
        .iter()
        .filter(|f| has_extension(f, "cue"))
        .cloned()
        .collect();

    for cue in cues {
        let dir = cue.parent().map(Path::to_path_buf).unwrap_or_default();
        let stem = cue
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let folder = dir.join(&stem);
        create_dir(&folder).await?;

        for current in placed.iter_mut() {
            let belongs = *current == cue
                || (has_extension(current, "bin") && current.parent() == Some(dir.as_path()));
            if !belongs {
                continue;
            }
            let target = folder.join(file_name(current)?);
            move_file(current, &target).await?;
            *current = target;
        }

        debug!(cue = %cue.display(), folder = %folder.display(), "Grouped BIN/CUE set");
    }

    Ok(placed)
}

/// Folder name for a multi-disc title: the display name cut at the first
/// `(Disc` or `(Disk` marker. A name that starts with the marker is kept
/// whole.
pub fn multi_disc_folder_name(display_name: &str) -> String {
    let cut = ["(Disc", "(Disk"]
        .iter()
        .filter_map(|marker| display_name.find(marker))
        .min()
        .unwrap_or(display_name.len());
    match display_name[..cut].trim() {
        "" => display_name.trim().to_string(),
        title => title.to_string(),
    }
}

/// Files of one multi-disc title after grouping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultiDiscGroup {
    pub folder: PathBuf,
    pub playlist: PathBuf,
    pub files: Vec<PathBuf>,
}

/// Move `files` into `<local_dir>/<title>/` and append their disc images
/// to `<title>.m3u`, one filename per line.
pub async fn group_multi_disc(
    local_dir: &Path,
    display_name: &str,
    files: &[PathBuf],
) -> Result<MultiDiscGroup, PostProcessError> {
    let title = multi_disc_folder_name(display_name);
    let folder = local_dir.join(&title);
    if fs::try_exists(&folder).await? {
        debug!(folder = %folder.display(), "Game folder already exists");
    } else {
        create_dir(&folder).await?;
    }

    let mut moved = Vec::with_capacity(files.len());
    let mut discs = Vec::new();
    for file in files {
        let name = file_name(file)?;
        let target = folder.join(name);
        move_file(file, &target).await?;
        if PLAYLIST_EXTENSIONS.iter().any(|ext| has_extension(&target, ext)) {
            discs.push(name.to_string_lossy().into_owned());
        }
        moved.push(target);
    }

    let playlist = folder.join(format!("{}.m3u", title));
    if !discs.is_empty() {
        let mut m3u = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&playlist)
            .await?;
        for disc in &discs {
            m3u.write_all(format!("{}\n", disc).as_bytes()).await?;
        }
        m3u.flush().await?;
    }

    debug!(folder = %folder.display(), discs = discs.len(), "Grouped multi-disc title");
    Ok(MultiDiscGroup {
        folder,
        playlist,
        files: moved,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, name.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_multi_disc_folder_name() {
        assert_eq!(multi_disc_folder_name("Final Fantasy VII (USA) (Disc 1)"), "Final Fantasy VII (USA)");
        assert_eq!(multi_disc_folder_name("Myst (Disk 2) (Disc 1)"), "Myst");
        assert_eq!(multi_disc_folder_name("Tetris"), "Tetris");
        assert_eq!(multi_disc_folder_name("(Disc 1) Mystery"), "(Disc 1) Mystery");
    }

    #[tokio::test]
    async fn test_leading_disc_marker_still_gets_a_folder() {
        let temp = TempDir::new().unwrap();
        let disc = touch(temp.path(), "(Disc 1) Mystery.chd");

        let group = group_multi_disc(temp.path(), "(Disc 1) Mystery", &[disc])
            .await
            .unwrap();

        assert_eq!(group.folder, temp.path().join("(Disc 1) Mystery"));
        assert_eq!(group.playlist, group.folder.join("(Disc 1) Mystery.m3u"));
        assert!(group.folder.join("(Disc 1) Mystery.chd").exists());
        assert!(!temp.path().join(".m3u").exists());
    }

    #[tokio::test]
    async fn test_group_bin_cue() {
        let temp = TempDir::new().unwrap();
        let files = vec![
            touch(temp.path(), "A.cue"),
            touch(temp.path(), "A.bin"),
            touch(temp.path(), "B.txt"),
        ];

        let placed = group_bin_cue(&files).await.unwrap();

        let folder = temp.path().join("A");
        assert_eq!(
            placed,
            vec![folder.join("A.cue"), folder.join("A.bin"), temp.path().join("B.txt")]
        );
        assert!(folder.join("A.cue").exists());
        assert!(folder.join("A.bin").exists());
        assert!(temp.path().join("B.txt").exists());
        assert!(!temp.path().join("A.bin").exists());
    }

    #[tokio::test]
    async fn test_two_discs_share_one_playlist() {
        let temp = TempDir::new().unwrap();
        let disc1 = touch(temp.path(), "Game (USA) (Disc 1).chd");
        let disc2 = touch(temp.path(), "Game (USA) (Disc 2).chd");

        let first = group_multi_disc(temp.path(), "Game (USA) (Disc 1)", &[disc1])
            .await
            .unwrap();
        let second = group_multi_disc(temp.path(), "Game (USA) (Disc 2)", &[disc2])
            .await
            .unwrap();

        assert_eq!(first.folder, temp.path().join("Game (USA)"));
        assert_eq!(first.playlist, second.playlist);
        let playlist = std::fs::read_to_string(&first.playlist).unwrap();
        assert_eq!(
            playlist.lines().collect::<Vec<_>>(),
            vec!["Game (USA) (Disc 1).chd", "Game (USA) (Disc 2).chd"]
        );
        assert!(first.folder.join("Game (USA) (Disc 2).chd").exists());
    }

    #[tokio::test]
    async fn test_multi_disc_without_disc_images_writes_no_playlist() {
        let temp = TempDir::new().unwrap();
        let file = touch(temp.path(), "Game (Disk 1).adf");
        let group = group_multi_disc(temp.path(), "Game (Disk 1)", &[file]).await.unwrap();
        assert!(!group.playlist.exists());
        assert_eq!(group.files, vec![temp.path().join("Game").join("Game (Disk 1).adf")]);
    }
}
