//! Core types for dataset-dl

use crate::config::Config;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// One source to fetch into one directory
///
/// Created by the dispatcher per input source and never mutated.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DownloadTask {
    /// Existing local file path or remote URL
    pub source: String,
    /// Directory the fetched file is written to
    pub destination_dir: PathBuf,
}

impl DownloadTask {
    /// Create a new task
    pub fn new(source: impl Into<String>, destination_dir: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            destination_dir: destination_dir.into(),
        }
    }
}

/// Result of fetching one source
#[must_use]
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DownloadOutcome {
    /// Where the file lives (the source itself for local files)
    pub path: PathBuf,
    /// Whether the file is fully present
    pub succeeded: bool,
    /// Transfer attempts made; 0 when the file was already present
    pub attempts: u32,
}

impl DownloadOutcome {
    /// Outcome for a file that needed no transfer
    pub fn already_present(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            succeeded: true,
            attempts: 0,
        }
    }
}

/// Archive formats the extractor understands
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArchiveFormat {
    /// PKZIP container
    Zip,
    /// Uncompressed tar
    Tar,
    /// gzip-compressed tar
    TarGz,
}

impl std::fmt::Display for ArchiveFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ArchiveFormat::Zip => "zip",
            ArchiveFormat::Tar => "tar",
            ArchiveFormat::TarGz => "tar.gz",
        };
        f.write_str(name)
    }
}

/// Result of post-download extraction
#[must_use]
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ExtractionResult {
    /// Detected format, None if the file is not a supported archive or was not inspected
    pub format: Option<ArchiveFormat>,
    /// Whether the archive was unpacked
    pub extracted: bool,
    /// Whether the archive file was removed afterwards
    pub archive_deleted: bool,
    /// Files written by extraction, when the backend reports them
    pub files: Vec<PathBuf>,
    /// Why a detected archive could not be extracted
    pub error: Option<String>,
}

impl ExtractionResult {
    /// Nothing was extracted
    pub fn skipped() -> Self {
        Self::default()
    }
}

/// Per-call options for [`Dispatcher::dispatch`](crate::Dispatcher::dispatch)
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DispatchOptions {
    /// Extract archives after download (default: true)
    pub unzip: bool,
    /// Delete archives after a successful extraction (default: true)
    pub delete_after: bool,
    /// Additional attempts after the first failed transfer (default: 3)
    pub retry_limit: u32,
    /// Number of concurrent workers; values of 0 or 1 run sequentially (default: 1)
    pub workers: usize,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self {
            unzip: true,
            delete_after: true,
            retry_limit: 3,
            workers: 1,
        }
    }
}

impl From<&Config> for DispatchOptions {
    fn from(config: &Config) -> Self {
        Self {
            unzip: config.download.unzip,
            delete_after: config.download.delete_after,
            retry_limit: config.retry.max_retries,
            workers: config.download.workers,
        }
    }
}

/// A normalised list of sources
///
/// Lets `dispatch` accept a single URL or path as well as any collection of them.
///
/// ```
/// use dataset_dl::Sources;
///
/// assert_eq!(Sources::from("http://example.test/a.zip").len(), 1);
/// assert_eq!(Sources::from(vec!["a.zip", "b.zip"]).len(), 2);
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Sources(Vec<String>);

impl Sources {
    /// Number of sources
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when there is nothing to fetch
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate in input order
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl IntoIterator for Sources {
    type Item = String;
    type IntoIter = std::vec::IntoIter<String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl From<&str> for Sources {
    fn from(source: &str) -> Self {
        Self(vec![source.to_string()])
    }
}

impl From<String> for Sources {
    fn from(source: String) -> Self {
        Self(vec![source])
    }
}

impl From<&Path> for Sources {
    fn from(source: &Path) -> Self {
        Self(vec![source.to_string_lossy().into_owned()])
    }
}

impl From<PathBuf> for Sources {
    fn from(source: PathBuf) -> Self {
        Self::from(source.as_path())
    }
}

impl From<Vec<String>> for Sources {
    fn from(sources: Vec<String>) -> Self {
        Self(sources)
    }
}

impl From<Vec<&str>> for Sources {
    fn from(sources: Vec<&str>) -> Self {
        sources.into_iter().collect()
    }
}

impl From<&[&str]> for Sources {
    fn from(sources: &[&str]) -> Self {
        sources.iter().copied().collect()
    }
}

impl From<&[String]> for Sources {
    fn from(sources: &[String]) -> Self {
        Self(sources.to_vec())
    }
}

impl<S: Into<String>> FromIterator<S> for Sources {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// What happened to one source in a batch
#[derive(Clone, Debug, Serialize)]
pub struct TaskReport {
    /// The source as given by the caller
    pub source: String,
    /// Fetch result, None if the task failed before a fetch completed
    pub outcome: Option<DownloadOutcome>,
    /// Extraction result, None when extraction was disabled or not reached
    pub extraction: Option<ExtractionResult>,
    /// Task-local fault that stopped the task (I/O, panic)
    pub error: Option<String>,
}

impl TaskReport {
    /// A task succeeds when its file is present, no fault interrupted it and
    /// any archive it produced was extracted
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
            && self.outcome.as_ref().is_some_and(|o| o.succeeded)
            && self.extraction.as_ref().is_none_or(|e| e.error.is_none())
    }
}

/// Aggregate result of one dispatch call
///
/// Tasks appear in completion order, which is only the input order for
/// sequential dispatch.
#[must_use]
#[derive(Clone, Debug, Default, Serialize)]
pub struct BatchReport {
    /// One entry per source
    pub tasks: Vec<TaskReport>,
}

impl BatchReport {
    /// Number of tasks processed
    pub fn total(&self) -> usize {
        self.tasks.len()
    }

    /// Number of tasks whose file is present
    pub fn succeeded(&self) -> usize {
        self.tasks.iter().filter(|t| t.succeeded()).count()
    }

    /// Number of tasks that failed
    pub fn failed(&self) -> usize {
        self.total() - self.succeeded()
    }

    /// Sources of failed tasks
    pub fn failed_sources(&self) -> Vec<&str> {
        self.tasks
            .iter()
            .filter(|t| !t.succeeded())
            .map(|t| t.source.as_str())
            .collect()
    }

    /// Number of archives that were extracted
    pub fn extracted(&self) -> usize {
        self.tasks
            .iter()
            .filter(|t| t.extraction.as_ref().is_some_and(|e| e.extracted))
            .count()
    }

    /// Append another report, e.g. when a caller runs several batches
    pub fn merge(&mut self, other: BatchReport) {
        self.tasks.extend(other.tasks);
    }
}
