//! In-process HTTP transfer with Range resume

use super::Transfer;
use crate::config::DownloadConfig;
use crate::error::{Error, Result, TransferError};
use async_trait::async_trait;
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::StatusCode;
use reqwest::header::RANGE;
use std::path::Path;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

const PROGRESS_TEMPLATE: &str =
    "{msg} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})";

/// HTTP(S) transfer backed by `reqwest`
///
/// A non-empty partial file is continued with `Range: bytes=N-`. A `206`
/// response is appended, a `200` restarts the file from zero, and a `416`
/// means the partial file already holds the whole body.
pub struct HttpTransfer {
    client: reqwest::Client,
}

impl HttpTransfer {
    /// Create a transfer with the configured connect timeout and user agent
    pub fn new(config: &DownloadConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|e| Error::Other(format!("failed to create HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    /// Wrap an existing client
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    fn progress_bar(quiet: bool, total: Option<u64>, url: &str) -> ProgressBar {
        if quiet {
            return ProgressBar::hidden();
        }
        let bar = match total {
            Some(len) => ProgressBar::new(len),
            None => ProgressBar::new_spinner(),
        };
        if let Ok(style) = ProgressStyle::with_template(PROGRESS_TEMPLATE) {
            bar.set_style(style.progress_chars("#>-"));
        }
        let name = crate::utils::file_name_from_source(url).unwrap_or_else(|| url.to_string());
        bar.set_message(name);
        bar
    }
}

async fn partial_len(partial: &Path) -> Result<u64> {
    match fs::metadata(partial).await {
        Ok(meta) => Ok(meta.len()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(0),
        Err(e) => Err(Error::Io(e)),
    }
}

#[async_trait]
impl Transfer for HttpTransfer {
    async fn fetch(&self, url: &str, partial: &Path, quiet: bool) -> Result<u64> {
        let start = partial_len(partial).await?;

        let mut request = self.client.get(url);
        if start > 0 {
            debug!(url, resume_from = start, "resuming partial download");
            request = request.header(RANGE, format!("bytes={}-", start));
        }

        let response = request.send().await.map_err(|source| TransferError::Network {
            url: url.to_string(),
            source,
        })?;

        let status = response.status();
        if start > 0 && status == StatusCode::RANGE_NOT_SATISFIABLE {
            debug!(url, len = start, "partial file already complete");
            return Ok(start);
        }
        if !status.is_success() {
            return Err(TransferError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            }
            .into());
        }

        let append = start > 0 && status == StatusCode::PARTIAL_CONTENT;
        let mut file = if append {
            fs::OpenOptions::new().append(true).open(partial).await?
        } else {
            if start > 0 {
                debug!(url, "server ignored range request, restarting");
            }
            fs::File::create(partial).await?
        };

        let mut written = if append { start } else { 0 };
        let total = response.content_length().map(|len| len + written);
        let bar = Self::progress_bar(quiet, total, url);
        bar.set_position(written);

        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|source| TransferError::Network {
                url: url.to_string(),
                source,
            });
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    // keep what arrived so the next attempt resumes from here
                    file.flush().await?;
                    bar.abandon();
                    return Err(e.into());
                }
            };
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
            bar.set_position(written);
        }

        file.flush().await?;
        bar.finish_and_clear();
        debug!(url, bytes = written, "transfer complete");
        Ok(written)
    }

    fn name(&self) -> &'static str {
        "http"
    }
}
