use crate::config::Config;
use crate::error::ExtractError;
use crate::extraction::*;
use crate::test_helpers::{
    RecordingTarHandler, create_tar_archive, create_tar_gz_archive, create_zip_archive,
};
use crate::types::ArchiveFormat;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn default_markers() -> Vec<String> {
    Config::default().extraction.junk_markers
}

/// Extractor with the in-process tar handler and default junk markers
fn native_extractor() -> Extractor {
    Extractor::new(Arc::new(NativeTarHandler), default_markers())
}

fn recording_extractor(handler: Arc<RecordingTarHandler>) -> Extractor {
    Extractor::new(handler, default_markers())
}

/// Relative paths of every regular file under `dir`, sorted
fn files_under(dir: &Path) -> Vec<String> {
    let mut files: Vec<String> = walkdir::WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| {
            e.path()
                .strip_prefix(dir)
                .unwrap()
                .to_string_lossy()
                .replace('\\', "/")
        })
        .collect();
    files.sort();
    files
}

// ---------------------------------------------------------------------------
// Junk filtering
// ---------------------------------------------------------------------------

#[test]
fn test_is_junk_matches_substrings() {
    let markers = default_markers();
    assert!(ZipExtractor::is_junk(".DS_Store", &markers));
    assert!(ZipExtractor::is_junk("images/.DS_Store", &markers));
    assert!(ZipExtractor::is_junk("__MACOSX/._img1.jpg", &markers));
    assert!(!ZipExtractor::is_junk("img1.jpg", &markers));
    assert!(!ZipExtractor::is_junk("MACOSX/img1.jpg", &markers));
}

#[test]
fn test_is_junk_ignores_empty_markers() {
    let markers = vec![String::new()];
    assert!(!ZipExtractor::is_junk("img1.jpg", &markers));
    assert!(!ZipExtractor::is_junk("anything", &[]));
}

#[tokio::test]
async fn test_zip_drops_macos_junk() {
    let temp_dir = TempDir::new().unwrap();
    let archive = temp_dir.path().join("images.zip");
    create_zip_archive(
        &archive,
        &[
            ("img1.jpg", b"jpeg"),
            ("__MACOSX/._img1.jpg", b"resource fork"),
            (".DS_Store", b"finder"),
        ],
    );

    let result = native_extractor().extract(&archive, true, true).await;

    assert_eq!(result.format, Some(ArchiveFormat::Zip));
    assert!(result.extracted);
    assert!(result.archive_deleted);
    assert_eq!(result.error, None);
    assert_eq!(result.files, vec![temp_dir.path().join("img1.jpg")]);
    assert_eq!(files_under(temp_dir.path()), vec!["img1.jpg"]);
    assert!(!temp_dir.path().join("__MACOSX").exists());
}

#[tokio::test]
async fn test_zip_with_nested_directories() {
    let temp_dir = TempDir::new().unwrap();
    let archive = temp_dir.path().join("nested.zip");
    create_zip_archive(
        &archive,
        &[("train/a.jpg", b"a"), ("train/sub/b.jpg", b"b")],
    );

    let result = native_extractor().extract(&archive, true, false).await;

    assert!(result.extracted);
    assert!(!result.archive_deleted);
    assert_eq!(
        files_under(temp_dir.path()),
        vec!["nested.zip", "train/a.jpg", "train/sub/b.jpg"]
    );
    assert_eq!(
        std::fs::read(temp_dir.path().join("train/sub/b.jpg")).unwrap(),
        b"b"
    );
}

// ---------------------------------------------------------------------------
// Tar formats
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_tar_gz_is_extracted_without_filtering() {
    let temp_dir = TempDir::new().unwrap();
    let archive = temp_dir.path().join("patch0.tar.gz");
    create_tar_gz_archive(
        &archive,
        &[("images/v1/img1.jpg", b"jpeg"), ("images/v1/.DS_Store", b"finder")],
    );

    let result = native_extractor().extract(&archive, true, true).await;

    assert_eq!(result.format, Some(ArchiveFormat::TarGz));
    assert!(result.extracted);
    assert!(result.archive_deleted);
    assert!(!archive.exists());
    assert_eq!(
        files_under(temp_dir.path()),
        vec!["images/v1/.DS_Store", "images/v1/img1.jpg"]
    );
}

#[tokio::test]
async fn test_plain_tar_is_extracted() {
    let temp_dir = TempDir::new().unwrap();
    let archive = temp_dir.path().join("labels.tar");
    create_tar_archive(&archive, &[("labels/a.txt", b"1 0.5 0.5 0.1 0.1")]);

    let result = native_extractor().extract(&archive, true, false).await;

    assert_eq!(result.format, Some(ArchiveFormat::Tar));
    assert!(result.extracted);
    assert!(archive.exists());
    assert_eq!(result.files, vec![temp_dir.path().join("labels/a.txt")]);
}

#[tokio::test]
async fn test_tar_handler_receives_parent_directory() {
    let temp_dir = TempDir::new().unwrap();
    let archive = temp_dir.path().join("patch3.tar.gz");
    create_tar_gz_archive(&archive, &[("img.jpg", b"x")]);

    let handler = Arc::new(RecordingTarHandler::default());
    let result = recording_extractor(handler.clone())
        .extract(&archive, true, false)
        .await;

    assert!(result.extracted);
    let calls = handler.calls.lock().unwrap();
    assert_eq!(
        *calls,
        vec![(
            archive.clone(),
            ArchiveFormat::TarGz,
            temp_dir.path().to_path_buf()
        )]
    );
}

#[tokio::test]
async fn test_zip_never_reaches_tar_handler() {
    let temp_dir = TempDir::new().unwrap();
    let archive = temp_dir.path().join("a.zip");
    create_zip_archive(&archive, &[("a.jpg", b"a")]);

    let handler = Arc::new(RecordingTarHandler::default());
    let result = recording_extractor(handler.clone())
        .extract(&archive, true, false)
        .await;

    assert!(result.extracted);
    assert!(handler.calls.lock().unwrap().is_empty());
}

/// Extractor running the system `tar`, or None when it is not installed
fn cli_extractor() -> Option<Extractor> {
    match CliTarHandler::from_path() {
        Some(cli) => Some(Extractor::new(Arc::new(cli), default_markers())),
        None => {
            println!("Skipping test: tar binary not found in PATH");
            None
        }
    }
}

#[tokio::test]
async fn test_system_tar_unpacks_both_formats_without_filtering() {
    let Some(extractor) = cli_extractor() else {
        return;
    };
    let temp_dir = TempDir::new().unwrap();
    let tar_gz = temp_dir.path().join("patch0.tar.gz");
    let plain = temp_dir.path().join("labels.tar");
    create_tar_gz_archive(
        &tar_gz,
        &[("images/v1/img1.jpg", b"jpeg"), ("images/v1/.DS_Store", b"finder")],
    );
    create_tar_archive(
        &plain,
        &[("labels/a.txt", b"0 0.5 0.5 0.1 0.1"), ("__MACOSX/._a.txt", b"fork")],
    );

    let gz_result = extractor.extract(&tar_gz, true, true).await;
    let tar_result = extractor.extract(&plain, true, false).await;

    assert_eq!(gz_result.format, Some(ArchiveFormat::TarGz));
    assert!(gz_result.extracted, "{:?}", gz_result.error);
    assert!(gz_result.archive_deleted);
    assert_eq!(tar_result.format, Some(ArchiveFormat::Tar));
    assert!(tar_result.extracted, "{:?}", tar_result.error);
    assert!(!tar_result.archive_deleted);

    // Every entry lands next to the archive, junk included
    assert_eq!(
        files_under(temp_dir.path()),
        vec![
            "__MACOSX/._a.txt",
            "images/v1/.DS_Store",
            "images/v1/img1.jpg",
            "labels.tar",
            "labels/a.txt",
        ]
    );
    assert_eq!(
        std::fs::read(temp_dir.path().join("images/v1/img1.jpg")).unwrap(),
        b"jpeg"
    );
}

#[tokio::test]
async fn test_system_tar_rejects_corrupt_archive() {
    let Some(cli) = CliTarHandler::from_path() else {
        println!("Skipping test: tar binary not found in PATH");
        return;
    };
    let temp_dir = TempDir::new().unwrap();
    let archive = temp_dir.path().join("broken.tar.gz");
    let mut bytes = vec![0x1f, 0x8b, 0x08, 0x00];
    bytes.extend_from_slice(&[0xa5; 600]);
    std::fs::write(&archive, &bytes).unwrap();

    let result = cli
        .unpack(&archive, ArchiveFormat::TarGz, temp_dir.path())
        .await;

    match result {
        Err(crate::error::Error::Extract(ExtractError::Failed { archive: failed, .. })) => {
            assert_eq!(failed, archive)
        }
        other => panic!("expected extraction failure, got {other:?}"),
    }
    assert!(archive.exists());
}

// ---------------------------------------------------------------------------
// Skips and failures
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_failed_download_is_not_touched() {
    let temp_dir = TempDir::new().unwrap();
    let archive = temp_dir.path().join("a.zip");
    create_zip_archive(&archive, &[("a.jpg", b"a")]);

    let result = native_extractor().extract(&archive, false, true).await;

    assert_eq!(result, crate::types::ExtractionResult::skipped());
    assert!(archive.exists());
    assert!(!temp_dir.path().join("a.jpg").exists());
}

#[tokio::test]
async fn test_non_archive_is_left_alone() {
    let temp_dir = TempDir::new().unwrap();
    let json = temp_dir.path().join("zhiyuan_objv2_val.json");
    std::fs::write(&json, br#"{"images": []}"#).unwrap();

    let handler = Arc::new(RecordingTarHandler::default());
    let result = recording_extractor(handler.clone())
        .extract(&json, true, true)
        .await;

    assert_eq!(result.format, None);
    assert!(!result.extracted);
    assert!(!result.archive_deleted);
    assert_eq!(result.error, None);
    assert!(json.exists());
    assert!(handler.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_corrupt_tar_gz_is_kept_and_reported() {
    let temp_dir = TempDir::new().unwrap();
    let archive = temp_dir.path().join("broken.tar.gz");
    // gzip magic followed by a header that names no known compression method
    let mut bytes = vec![0x1f, 0x8b, 0x63];
    bytes.extend_from_slice(&[0xa5; 600]);
    std::fs::write(&archive, &bytes).unwrap();

    let result = native_extractor().extract(&archive, true, true).await;

    assert_eq!(result.format, Some(ArchiveFormat::TarGz));
    assert!(!result.extracted);
    assert!(!result.archive_deleted);
    assert!(result.error.is_some());
    assert!(archive.exists(), "a failed extraction must keep the archive");
}

#[tokio::test]
async fn test_handler_failure_keeps_archive() {
    let temp_dir = TempDir::new().unwrap();
    let archive = temp_dir.path().join("patch0.tar.gz");
    create_tar_gz_archive(&archive, &[("img.jpg", b"x")]);

    let handler = Arc::new(RecordingTarHandler::failing());
    let result = recording_extractor(handler)
        .extract(&archive, true, true)
        .await;

    assert!(!result.extracted);
    assert!(
        result
            .error
            .as_deref()
            .is_some_and(|e| e.contains("told to fail"))
    );
    assert!(archive.exists());
}

#[tokio::test]
async fn test_missing_file_reports_error() {
    let temp_dir = TempDir::new().unwrap();
    let result = native_extractor()
        .extract(&temp_dir.path().join("gone.zip"), true, true)
        .await;

    assert!(!result.extracted);
    assert!(result.error.is_some());
}

// ---------------------------------------------------------------------------
// Construction
// ---------------------------------------------------------------------------

#[test]
fn test_from_config_without_external_tar_is_native() {
    let mut config = Config::default();
    config.tools.external_tar = false;
    assert_eq!(Extractor::from_config(&config).tar_handler_name(), "native-tar");
}

#[test]
fn test_from_config_with_explicit_tar_path_is_cli() {
    let mut config = Config::default();
    config.tools.tar_path = Some("/opt/bin/tar".into());
    assert_eq!(Extractor::from_config(&config).tar_handler_name(), "cli-tar");
}

#[test]
fn test_from_config_follows_path_lookup() {
    let config = Config::default();
    let expected = if which::which("tar").is_ok() {
        "cli-tar"
    } else {
        "native-tar"
    };
    assert_eq!(Extractor::from_config(&config).tar_handler_name(), expected);
}
