//! Retry logic with exponential backoff
//!
//! Runs an operation up to `max_retries + 1` times, sleeping an exponentially
//! growing (optionally jittered) delay between attempts, and reports how many
//! attempts were used alongside the final result.
//!
//! # Example
//!
//! ```no_run
//! use dataset_dl::config::RetryConfig;
//! use dataset_dl::retry::download_with_retry;
//! use dataset_dl::{Error, TransferError};
//!
//! # async fn example() -> Result<(), Error> {
//! let config = RetryConfig::default();
//! let outcome = download_with_retry(&config, 3, "patch0.tar.gz", |attempt| async move {
//!     if attempt < 2 {
//!         return Err(Error::from(TransferError::Status {
//!             url: "https://example.com/patch0.tar.gz".into(),
//!             status: 503,
//!         }));
//!     }
//!     Ok(())
//! })
//! .await;
//! println!("took {} attempt(s)", outcome.attempts);
//! outcome.result
//! # }
//! ```

use crate::config::RetryConfig;
use crate::error::{Error, TransferError};
use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// Trait for errors that can be classified as retryable or not
///
/// Failed transfers (bad status, dropped connection, tool exit) return `true`.
/// Local faults (permission denied, missing directory, bad config) return `false`.
pub trait IsRetryable {
    /// Returns true if the error is transient and the operation should be retried
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for TransferError {
    fn is_retryable(&self) -> bool {
        !matches!(self, TransferError::NoFileName { .. })
    }
}

impl IsRetryable for Error {
    fn is_retryable(&self) -> bool {
        match self {
            // Every failed transfer attempt counts against the retry budget
            Error::Transfer(e) => e.is_retryable(),
            // I/O errors only when they look like a dropped connection
            Error::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::ConnectionRefused
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::NotConnected
                    | std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::Interrupted
            ),
            // A tool that cannot be spawned will not appear on a later attempt
            Error::ExternalTool(_) => false,
            Error::Extract(_) => false,
            Error::Config { .. } => false,
            Error::Serialization(_) => false,
            Error::NotSupported(_) => false,
            Error::Other(_) => false,
        }
    }
}

/// Final result of a retried operation
#[must_use]
#[derive(Debug)]
pub struct RetryOutcome<T, E> {
    /// Last result produced by the operation
    pub result: Result<T, E>,
    /// Number of times the operation ran
    pub attempts: u32,
}

/// Execute an async operation with exponential backoff retry logic
///
/// # Arguments
///
/// * `config` - Backoff timing (delays, multiplier, jitter)
/// * `max_retries` - Additional attempts allowed after the first
/// * `label` - What is being retried, used in log fields
/// * `operation` - Async closure receiving the 1-based attempt number
///
/// # Returns
///
/// The first success, or the last error once `max_retries + 1` attempts have
/// been made or a non-retryable error occurs, together with the attempt count.
pub async fn download_with_retry<F, Fut, T, E>(
    config: &RetryConfig,
    max_retries: u32,
    label: &str,
    mut operation: F,
) -> RetryOutcome<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: IsRetryable + std::fmt::Display,
{
    let mut attempt = 0;
    let mut delay = config.initial_delay;

    loop {
        attempt += 1;
        match operation(attempt).await {
            Ok(result) => {
                if attempt > 1 {
                    tracing::info!(label, attempts = attempt, "Operation succeeded after retry");
                }
                return RetryOutcome {
                    result: Ok(result),
                    attempts: attempt,
                };
            }
            Err(e) if e.is_retryable() && attempt <= max_retries => {
                tracing::warn!(
                    label,
                    error = %e,
                    "Download failure, retrying {}/{}",
                    attempt,
                    max_retries
                );

                let jittered_delay = if config.jitter {
                    add_jitter(delay)
                } else {
                    delay
                };

                tokio::time::sleep(jittered_delay).await;

                delay = next_delay(delay, config);
            }
            Err(e) => {
                if e.is_retryable() {
                    tracing::error!(
                        label,
                        error = %e,
                        attempts = attempt,
                        "Failed to download after all retry attempts"
                    );
                } else {
                    tracing::error!(label, error = %e, "Operation failed with non-retryable error");
                }
                return RetryOutcome {
                    result: Err(e),
                    attempts: attempt,
                };
            }
        }
    }
}

/// Grow `delay` by the backoff multiplier, capped at `max_delay`
///
/// A product too large for a [`Duration`] saturates to the cap.
fn next_delay(delay: Duration, config: &RetryConfig) -> Duration {
    Duration::try_from_secs_f64(delay.as_secs_f64() * config.backoff_multiplier)
        .unwrap_or(config.max_delay)
        .min(config.max_delay)
}

/// Add random jitter to a delay to prevent thundering herd
///
/// The actual delay will be between `delay` and `2 * delay`, or `delay`
/// itself when doubling would not fit in a [`Duration`].
fn add_jitter(delay: Duration) -> Duration {
    let mut rng = rand::thread_rng();
    let jitter_factor: f64 = rng.gen_range(0.0..=1.0);
    let jittered_secs = delay.as_secs_f64() * (1.0 + jitter_factor);
    Duration::try_from_secs_f64(jittered_secs).unwrap_or(delay)
}
