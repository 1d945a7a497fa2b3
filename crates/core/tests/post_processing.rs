//! Post-processing integration tests on a real directory tree.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use romhaul_core::config::DownloadConfig;
use romhaul_core::postprocess::{group_bin_cue, unzip, PostProcessError, PostProcessor, ProcessAction};
use romhaul_core::testing::fixtures::zip_archive;

fn write(dir: &Path, name: &str, content: &[u8]) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).expect("Failed to write fixture");
    path
}

fn walk(dir: &Path) -> Vec<PathBuf> {
    let mut found = Vec::new();
    for entry in fs::read_dir(dir).unwrap() {
        let path = entry.unwrap().path();
        if path.is_dir() {
            found.extend(walk(&path));
        }
        found.push(path);
    }
    found
}

#[tokio::test]
async fn test_nested_archive_extracts_without_temp_files() {
    let temp = TempDir::new().unwrap();
    let archive = write(
        temp.path(),
        "Bundle.zip",
        &zip_archive(&[
            ("docs/", b""),
            ("docs/manual.txt", b"read me"),
            ("Bundle.gba", &[0u8; 4096]),
        ]),
    );

    let files = unzip(&archive, temp.path()).await.unwrap();

    assert_eq!(files.len(), 2);
    assert!(temp.path().join("docs").join("manual.txt").exists());
    assert!(walk(temp.path())
        .iter()
        .all(|p| p.extension().map_or(true, |e| e != "tmp")));
}

#[tokio::test]
async fn test_traversal_archive_writes_nothing_outside() {
    let temp = TempDir::new().unwrap();
    let dest = temp.path().join("roms");
    fs::create_dir(&dest).unwrap();
    let archive = write(&dest, "Evil.zip", &zip_archive(&[("../evil", b"x"), ("ok.gb", b"y")]));

    let err = unzip(&archive, &dest).await.unwrap_err();

    assert!(err.is_security());
    assert!(matches!(err, PostProcessError::PathTraversal { .. }));
    assert_eq!(walk(temp.path()), vec![dest.join("Evil.zip"), dest.clone()]);
}

#[tokio::test]
async fn test_group_bin_cue_layout() {
    let temp = TempDir::new().unwrap();
    let files = vec![
        write(temp.path(), "A.cue", b"FILE \"A.bin\" BINARY"),
        write(temp.path(), "A.bin", b"data"),
        write(temp.path(), "B.txt", b"notes"),
    ];

    group_bin_cue(&files).await.unwrap();

    assert!(temp.path().join("A").join("A.cue").is_file());
    assert!(temp.path().join("A").join("A.bin").is_file());
    assert!(temp.path().join("B.txt").is_file());
    assert!(!temp.path().join("A.cue").exists());
}

#[tokio::test]
async fn test_two_disc_downloads_build_one_playlist() {
    let temp = TempDir::new().unwrap();
    let processor = PostProcessor::new(&DownloadConfig::default());

    for disc in 1..=2 {
        let name = format!("Saga (USA) (Disc {})", disc);
        let chd = write(temp.path(), &format!("{}.chd", name), b"chd");
        let outcome = processor.process(&chd, &name, temp.path()).await.unwrap();
        assert_eq!(outcome.action, ProcessAction::MultiDisc);
    }

    let folder = temp.path().join("Saga (USA)");
    let playlist = fs::read_to_string(folder.join("Saga (USA).m3u")).unwrap();
    assert_eq!(playlist.lines().count(), 2);
    assert_eq!(
        playlist,
        "Saga (USA) (Disc 1).chd\nSaga (USA) (Disc 2).chd\n"
    );
}
