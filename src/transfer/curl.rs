//! Transfer through the external curl binary

use super::Transfer;
use crate::error::{Error, Result, TransferError};
use crate::utils::{CURL_SCHEMES, has_scheme};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

/// Retries curl performs on its own within one attempt
const CURL_INNER_RETRIES: &str = "9";

/// Transfer that shells out to `curl`
///
/// Runs `curl -# -L --fail --retry 9 -C - -o <partial> <url>`, with `-sS`
/// in place of the progress bar when quiet. `-C -` lets curl continue from
/// the partial file's length.
///
/// # Examples
///
/// ```no_run
/// use dataset_dl::transfer::{CurlTransfer, Transfer};
/// use std::path::Path;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let curl = CurlTransfer::from_path().expect("curl not found in PATH");
/// curl.fetch("https://example.com/patch0.tar.gz", Path::new("patch0.tar.gz.part"), false)
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct CurlTransfer {
    binary_path: PathBuf,
}

impl CurlTransfer {
    /// Create a curl transfer with an explicit binary path
    pub fn new(binary_path: PathBuf) -> Self {
        Self { binary_path }
    }

    /// Attempt to find curl in PATH
    pub fn from_path() -> Option<Self> {
        which::which("curl").ok().map(Self::new)
    }

    /// Path of the curl binary this transfer runs
    pub fn binary_path(&self) -> &Path {
        &self.binary_path
    }

    fn command(&self, url: &str, partial: &Path, quiet: bool) -> Command {
        let mut cmd = Command::new(&self.binary_path);
        cmd.arg(if quiet { "-sS" } else { "-#" })
            .arg("-L")
            .arg("--fail")
            .arg("--retry")
            .arg(CURL_INNER_RETRIES)
            .arg("-C")
            .arg("-")
            .arg("-o")
            .arg(partial)
            .arg(url)
            .stdin(Stdio::null());
        cmd
    }
}

#[async_trait]
impl Transfer for CurlTransfer {
    async fn fetch(&self, url: &str, partial: &Path, quiet: bool) -> Result<u64> {
        let status = self
            .command(url, partial, quiet)
            .status()
            .await
            .map_err(|e| Error::ExternalTool(format!("Failed to execute curl: {}", e)))?;

        if !status.success() {
            return Err(TransferError::ToolExit {
                tool: "curl",
                url: url.to_string(),
                code: status.code(),
            }
            .into());
        }

        // curl can exit 0 without creating the file, e.g. for an empty body
        match tokio::fs::metadata(partial).await {
            Ok(meta) => Ok(meta.len()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tokio::fs::File::create(partial).await?;
                Ok(0)
            }
            Err(e) => Err(Error::Io(e)),
        }
    }

    fn supports(&self, url: &str) -> bool {
        has_scheme(url, CURL_SCHEMES)
    }

    fn name(&self) -> &'static str {
        "curl"
    }
}
