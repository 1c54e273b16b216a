//! Utility functions for source names and destination paths

use std::path::{Path, PathBuf};

/// Suffix of files that are still being transferred
pub const PART_SUFFIX: &str = "part";

/// URL schemes reqwest can fetch
pub const HTTP_SCHEMES: &[&str] = &["http", "https"];

/// URL schemes the `curl` tool can fetch
pub const CURL_SCHEMES: &[&str] = &["http", "https", "ftp"];

/// Whether `source` parses as a URL with one of `schemes`
#[must_use]
pub fn has_scheme(source: &str, schemes: &[&str]) -> bool {
    url::Url::parse(source)
        .map(|u| schemes.contains(&u.scheme()))
        .unwrap_or(false)
}

/// Whether `source` is a URL some transfer backend can fetch
///
/// # Examples
///
/// ```
/// use dataset_dl::utils::is_remote;
///
/// assert!(is_remote("https://example.com/patch0.tar.gz"));
/// assert!(!is_remote("/data/patch0.tar.gz"));
/// assert!(!is_remote("C:\\data\\patch0.tar.gz"));
/// ```
#[must_use]
pub fn is_remote(source: &str) -> bool {
    has_scheme(source, CURL_SCHEMES)
}

/// File name a source is saved under
///
/// For URLs this is the last path segment (query and fragment dropped,
/// percent escapes kept). For anything else it is the path's file name.
///
/// # Examples
///
/// ```
/// use dataset_dl::utils::file_name_from_source;
///
/// assert_eq!(
///     file_name_from_source("https://example.com/train/patch7.tar.gz?sig=abc").as_deref(),
///     Some("patch7.tar.gz")
/// );
/// assert_eq!(file_name_from_source("https://example.com/").as_deref(), None);
/// assert_eq!(file_name_from_source("images/a.zip").as_deref(), Some("a.zip"));
/// ```
#[must_use]
pub fn file_name_from_source(source: &str) -> Option<String> {
    if is_remote(source) {
        let parsed = url::Url::parse(source).ok()?;
        let last = parsed.path_segments()?.next_back()?;
        if last.is_empty() || last == "." || last == ".." {
            return None;
        }
        return Some(last.to_string());
    }

    Path::new(source)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
}

/// Path of the in-progress file for `destination`
///
/// # Examples
///
/// ```
/// use dataset_dl::utils::part_path;
/// use std::path::Path;
///
/// assert_eq!(
///     part_path(Path::new("/data/patch0.tar.gz")),
///     Path::new("/data/patch0.tar.gz.part")
/// );
/// ```
#[must_use]
pub fn part_path(destination: &Path) -> PathBuf {
    let mut name = destination.as_os_str().to_owned();
    name.push(".");
    name.push(PART_SUFFIX);
    PathBuf::from(name)
}

/// Create a directory and its parents, tolerating concurrent creation
pub fn ensure_dir(path: &Path) -> std::io::Result<()> {
    match std::fs::create_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists && path.is_dir() => Ok(()),
        Err(e) => Err(std::io::Error::new(
            e.kind(),
            format!("failed to create directory '{}': {}", path.display(), e),
        )),
    }
}
