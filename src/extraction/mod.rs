//! Archive extraction
//!
//! Downloaded files are sniffed for their format and unpacked next to
//! themselves. Zip archives are unpacked in-process with junk entries
//! filtered out; tar and gzip-tar archives go through a [`TarHandler`]
//! unfiltered.

mod detect;
mod tar;
mod zip;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

// Re-exports
pub use detect::detect_archive_format;
pub use tar::{CliTarHandler, NativeTarHandler, TarHandler};
pub use zip::ZipExtractor;

use crate::config::Config;
use crate::error::{ExtractError, Result};
use crate::types::{ArchiveFormat, ExtractionResult};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::spawn_blocking;
use tracing::{debug, error, info, warn};

/// Unpacks downloaded archives
#[derive(Clone)]
pub struct Extractor {
    tar: Arc<dyn TarHandler>,
    junk_markers: Vec<String>,
}

impl Extractor {
    /// Create an extractor with a tar capability and zip junk markers
    pub fn new(tar: Arc<dyn TarHandler>, junk_markers: Vec<String>) -> Self {
        Self { tar, junk_markers }
    }

    /// Build the extractor described by `config`
    ///
    /// Uses the external tar tool when enabled and found, otherwise the
    /// in-process implementation.
    pub fn from_config(config: &Config) -> Self {
        let cli = if config.tools.external_tar {
            match &config.tools.tar_path {
                Some(path) => Some(CliTarHandler::new(path.clone())),
                None if config.tools.search_path => CliTarHandler::from_path(),
                None => None,
            }
        } else {
            None
        };

        let tar: Arc<dyn TarHandler> = match cli {
            Some(cli) => Arc::new(cli),
            None => {
                if config.tools.external_tar {
                    debug!("tar binary not found, using in-process extraction");
                }
                Arc::new(NativeTarHandler)
            }
        };
        Self::new(tar, config.extraction.junk_markers.clone())
    }

    /// Name of the tar capability in use
    pub fn tar_handler_name(&self) -> &'static str {
        self.tar.name()
    }

    /// Extract `file` if it was fetched and is a supported archive
    ///
    /// Never fails: a corrupt archive is logged, reported in
    /// [`ExtractionResult::error`] and left on disk. The archive is removed
    /// only when `delete_after` is set and extraction succeeded.
    pub async fn extract(&self, file: &Path, succeeded: bool, delete_after: bool) -> ExtractionResult {
        if !succeeded {
            return ExtractionResult::skipped();
        }

        let format = match sniff(file).await {
            Ok(Some(format)) => format,
            Ok(None) => {
                debug!(?file, "not an archive, leaving as is");
                return ExtractionResult::skipped();
            }
            Err(e) => {
                error!(?file, error = %e, "could not inspect downloaded file");
                return ExtractionResult {
                    error: Some(e.to_string()),
                    ..ExtractionResult::skipped()
                };
            }
        };

        info!(?file, %format, "Unzipping {}...", file.display());

        match self.unpack(file, format).await {
            Ok(files) => {
                let archive_deleted = delete_after && remove_archive(file).await;
                ExtractionResult {
                    format: Some(format),
                    extracted: true,
                    archive_deleted,
                    files,
                    error: None,
                }
            }
            Err(e) => {
                error!(?file, %format, error = %e, "extraction failed, keeping archive");
                ExtractionResult {
                    format: Some(format),
                    extracted: false,
                    archive_deleted: false,
                    files: Vec::new(),
                    error: Some(e.to_string()),
                }
            }
        }
    }

    /// Unpack `file` as `format` into its parent directory
    pub async fn unpack(&self, file: &Path, format: ArchiveFormat) -> Result<Vec<PathBuf>> {
        let dest = extraction_dir(file)?;

        match format {
            ArchiveFormat::Zip => {
                let archive = file.to_path_buf();
                let junk = self.junk_markers.clone();
                spawn_blocking(move || ZipExtractor::extract(&archive, &dest, &junk))
                    .await
                    .map_err(|e| {
                        ExtractError::failed(file, format!("extraction task panicked: {}", e))
                    })?
            }
            ArchiveFormat::Tar | ArchiveFormat::TarGz => self.tar.unpack(file, format, &dest).await,
        }
    }
}

/// Directory an archive is extracted into
fn extraction_dir(file: &Path) -> Result<PathBuf> {
    match file.parent() {
        Some(parent) if parent.as_os_str().is_empty() => Ok(PathBuf::from(".")),
        Some(parent) => Ok(parent.to_path_buf()),
        None => Err(ExtractError::InvalidPath {
            path: file.to_path_buf(),
            reason: "archive has no parent directory".to_string(),
        }
        .into()),
    }
}

async fn sniff(file: &Path) -> Result<Option<ArchiveFormat>> {
    let path = file.to_path_buf();
    let detected = spawn_blocking(move || detect_archive_format(&path))
        .await
        .map_err(|e| ExtractError::failed(file, format!("detection task panicked: {}", e)))??;
    Ok(detected)
}

async fn remove_archive(file: &Path) -> bool {
    match tokio::fs::remove_file(file).await {
        Ok(()) => {
            debug!(?file, "removed archive");
            true
        }
        Err(e) => {
            warn!(?file, error = %e, "failed to remove archive after extraction");
            false
        }
    }
}
