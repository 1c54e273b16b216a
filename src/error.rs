//! Error types for dataset-dl
//!
//! Errors are split by the stage that raises them:
//! - [`TransferError`] for a single failed fetch attempt (retryable)
//! - [`ExtractError`] for archives that cannot be unpacked (task-local)
//! - [`Error::Io`] for filesystem faults, fatal when the destination tree
//!   cannot be established

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for dataset-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for dataset-dl
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "workers")
        key: Option<String>,
    },

    /// A single transfer attempt failed
    #[error("transfer error: {0}")]
    Transfer(#[from] TransferError),

    /// Archive detection or extraction failed
    #[error("extraction error: {0}")]
    Extract(#[from] ExtractError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error (config files)
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// External tool execution failed (curl, tar)
    #[error("external tool error: {0}")]
    ExternalTool(String),

    /// Operation not supported (missing binary, unsupported source, etc.)
    #[error("not supported: {0}")]
    NotSupported(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Failure of one transfer attempt
#[derive(Debug, Error)]
pub enum TransferError {
    /// Server answered with a non-success status
    #[error("HTTP {status} fetching {url}")]
    Status {
        /// The URL being fetched
        url: String,
        /// The HTTP status code returned
        status: u16,
    },

    /// Network-level failure (connect, timeout, body stream)
    #[error("network error fetching {url}: {source}")]
    Network {
        /// The URL being fetched
        url: String,
        /// The underlying client error
        #[source]
        source: reqwest::Error,
    },

    /// External transfer tool exited unsuccessfully
    #[error("{tool} exited with {code:?} fetching {url}")]
    ToolExit {
        /// Name of the tool (e.g. "curl")
        tool: &'static str,
        /// The URL being fetched
        url: String,
        /// Exit code, if the process was not killed by a signal
        code: Option<i32>,
    },

    /// Source could not be turned into a destination file name
    #[error("cannot derive a file name from {source_url}")]
    NoFileName {
        /// The offending source
        source_url: String,
    },
}

/// Archive detection and extraction errors
#[derive(Debug, Error)]
pub enum ExtractError {
    /// Archive could not be read or unpacked
    #[error("extraction failed for {archive}: {reason}")]
    Failed {
        /// The archive file that failed to extract
        archive: PathBuf,
        /// The reason extraction failed
        reason: String,
    },

    /// Archive has no parent directory to extract into
    #[error("invalid path {path}: {reason}")]
    InvalidPath {
        /// The invalid path that was encountered
        path: PathBuf,
        /// The reason the path is invalid
        reason: String,
    },
}

impl ExtractError {
    pub(crate) fn failed(archive: &std::path::Path, reason: impl Into<String>) -> Self {
        ExtractError::Failed {
            archive: archive.to_path_buf(),
            reason: reason.into(),
        }
    }
}
