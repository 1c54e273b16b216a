//! Single-source fetch with bounded retries
//!
//! The fetcher resolves where a source lands on disk, skips the network when
//! the file is already there, and otherwise drives a [`Transfer`] through
//! [`download_with_retry`]. Bytes are staged in `<name>.part` and renamed into
//! place only once a transfer completes, so an existing destination file is
//! always a complete one.

use crate::config::RetryConfig;
use crate::error::{Error, Result, TransferError};
use crate::retry::{IsRetryable, download_with_retry};
use crate::transfer::Transfer;
use crate::types::DownloadOutcome;
use crate::utils::{file_name_from_source, is_remote, part_path};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Downloads one source into a directory
#[derive(Clone)]
pub struct Fetcher {
    transfer: Arc<dyn Transfer>,
    backoff: RetryConfig,
}

impl Fetcher {
    /// Create a fetcher using `transfer` and the delays in `backoff`
    ///
    /// The retry ceiling is passed per call; only the timing fields of
    /// `backoff` are used here.
    pub fn new(transfer: Arc<dyn Transfer>, backoff: RetryConfig) -> Self {
        Self { transfer, backoff }
    }

    /// Name of the underlying transfer backend
    pub fn transfer_name(&self) -> &'static str {
        self.transfer.name()
    }

    /// Fetch `source` into `destination_dir`
    ///
    /// Makes at most `retry_limit + 1` transfer attempts. A transfer that
    /// keeps failing yields `succeeded = false`, not an error; `Err` is
    /// reserved for local faults such as an unwritable destination.
    pub async fn fetch(
        &self,
        source: &str,
        destination_dir: &Path,
        retry_limit: u32,
        quiet: bool,
    ) -> Result<DownloadOutcome> {
        // A source that is already a file on disk needs no transfer
        let local = Path::new(source);
        if local.is_file() {
            debug!(source, "source is a local file, skipping download");
            return Ok(DownloadOutcome::already_present(local));
        }

        let name = file_name_from_source(source).ok_or_else(|| TransferError::NoFileName {
            source_url: source.to_string(),
        })?;
        let destination = destination_dir.join(&name);

        // Skip anything a previous run already finished
        if destination.is_file() {
            info!(source, path = ?destination, "already downloaded, skipping");
            return Ok(DownloadOutcome::already_present(destination));
        }

        if !is_remote(source) {
            error!(source, "source is neither an existing file nor a supported URL");
            return Ok(DownloadOutcome {
                path: destination,
                succeeded: false,
                attempts: 0,
            });
        }

        // The selected backend must speak the URL scheme
        if !self.transfer.supports(source) {
            error!(
                source,
                transfer = self.transfer.name(),
                "transfer backend cannot fetch this URL"
            );
            return Ok(DownloadOutcome {
                path: destination,
                succeeded: false,
                attempts: 0,
            });
        }

        // Bytes land in `<name>.part` until a transfer completes
        let partial = part_path(&destination);
        let total = retry_limit.saturating_add(1);
        let transfer = &*self.transfer;
        let (partial_ref, destination_ref) = (&partial, &destination);

        let outcome = download_with_retry(&self.backoff, retry_limit, source, move |attempt| {
            info!(
                source,
                attempt,
                total,
                "Downloading {} to {}...",
                source,
                destination_ref.display()
            );
            transfer.fetch(source, partial_ref, quiet)
        })
        .await;

        match outcome.result {
            // Publish the completed file under its final name
            Ok(bytes) => {
                tokio::fs::rename(&partial, &destination).await.map_err(|e| {
                    Error::Io(std::io::Error::new(
                        e.kind(),
                        format!(
                            "failed to move '{}' to '{}': {}",
                            partial.display(),
                            destination.display(),
                            e
                        ),
                    ))
                })?;
                debug!(source, bytes, attempts = outcome.attempts, "download complete");
                Ok(DownloadOutcome {
                    path: destination,
                    succeeded: true,
                    attempts: outcome.attempts,
                })
            }
            // retries exhausted; the batch carries on
            Err(e) if e.is_retryable() => Ok(DownloadOutcome {
                path: destination,
                succeeded: false,
                attempts: outcome.attempts,
            }),
            Err(e) => Err(e),
        }
    }
}
