//! Transfer backends
//!
//! A [`Transfer`] moves the bytes of one remote source into a partial file.
//! Both implementations continue from the partial file's current length, so
//! repeated attempts never re-download bytes already on disk.

mod curl;
mod http;

pub use curl::CurlTransfer;
pub use http::HttpTransfer;

use crate::config::{Config, TransferBackend};
use crate::error::{Error, Result};
use crate::utils::{HTTP_SCHEMES, has_scheme};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

/// One attempt at fetching a URL
///
/// Implementations report a failed attempt as [`Error::Transfer`], which the
/// fetcher retries, and local filesystem faults as [`Error::Io`], which it
/// does not.
#[async_trait]
pub trait Transfer: Send + Sync {
    /// Fetch `url` into `partial`, resuming from its current length
    ///
    /// `quiet` suppresses progress output; it is set when several workers
    /// share the terminal. Returns the final length of `partial`.
    async fn fetch(&self, url: &str, partial: &Path, quiet: bool) -> Result<u64>;

    /// Whether this backend can fetch `url` at all
    fn supports(&self, url: &str) -> bool {
        has_scheme(url, HTTP_SCHEMES)
    }

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}

/// Build the transfer backend selected by `config`
pub fn from_config(config: &Config) -> Result<Arc<dyn Transfer>> {
    match config.download.transfer {
        TransferBackend::Http => Ok(Arc::new(HttpTransfer::new(&config.download)?)),
        TransferBackend::Curl => {
            let curl = match &config.tools.curl_path {
                Some(path) => Some(CurlTransfer::new(path.clone())),
                None if config.tools.search_path => CurlTransfer::from_path(),
                None => None,
            };
            curl.map(|c| Arc::new(c) as Arc<dyn Transfer>).ok_or_else(|| {
                Error::NotSupported(
                    "curl transfer requires a curl binary. \
                     Configure curl_path or ensure curl is in PATH."
                        .into(),
                )
            })
        }
    }
}
