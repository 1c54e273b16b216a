//! # dataset-dl
//!
//! Bulk, parallel retrieval and extraction of large remote datasets.
//!
//! ## Design Philosophy
//!
//! dataset-dl is designed to be:
//! - **Resumable** - Interrupted transfers continue from the bytes already on disk
//! - **Idempotent** - Files that are already present are never fetched again
//! - **Fault tolerant** - One failing source never stops the rest of a batch
//! - **Dataset agnostic** - The dispatcher knows nothing about any dataset's layout
//!
//! ## Quick Start
//!
//! ```no_run
//! use dataset_dl::{Config, DispatchOptions, Dispatcher};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let dispatcher = Dispatcher::new(Config::default())?;
//!
//!     let urls: Vec<String> = (0..4)
//!         .map(|i| format!("https://example.com/train/patch{i}.tar.gz"))
//!         .collect();
//!     let options = DispatchOptions {
//!         workers: 4,
//!         delete_after: false,
//!         ..Default::default()
//!     };
//!
//!     let report = dispatcher.dispatch(urls, "images/train", &options).await?;
//!     for source in report.failed_sources() {
//!         eprintln!("failed: {}", source);
//!     }
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Dataset layouts and download plans
pub mod dataset;
/// Batch dispatch over a worker pool
pub mod dispatcher;
/// Error types
pub mod error;
/// Archive extraction
pub mod extraction;
/// Single-source fetching
pub mod fetcher;
/// Retry logic with exponential backoff
pub mod retry;
/// Transfer backends
pub mod transfer;
/// Core types
pub mod types;
/// Utility functions
pub mod utils;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod test_helpers;

// Re-export commonly used types
pub use config::Config;
pub use dispatcher::Dispatcher;
pub use error::{Error, ExtractError, Result, TransferError};
pub use extraction::Extractor;
pub use fetcher::Fetcher;
pub use types::{
    ArchiveFormat, BatchReport, DispatchOptions, DownloadOutcome, DownloadTask,
    ExtractionResult, Sources, TaskReport,
};
