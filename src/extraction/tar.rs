//! Tarball extraction capability
//!
//! Tar and gzip-tar archives are unpacked whole, with no entry filtering.
//! [`CliTarHandler`] shells out to the system `tar`; [`NativeTarHandler`]
//! uses the `tar` and `flate2` crates in-process.

use crate::error::{Error, ExtractError, Result};
use crate::types::ArchiveFormat;
use async_trait::async_trait;
use flate2::read::GzDecoder;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tokio::task::spawn_blocking;
use tracing::{debug, warn};

/// Trait for unpacking tar and gzip-tar archives
///
/// # Examples
///
/// ```no_run
/// use dataset_dl::extraction::{CliTarHandler, NativeTarHandler, TarHandler};
/// use dataset_dl::ArchiveFormat;
/// use std::path::Path;
/// use std::sync::Arc;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let handler: Arc<dyn TarHandler> = match CliTarHandler::from_path() {
///     Some(cli) => Arc::new(cli),
///     None => Arc::new(NativeTarHandler),
/// };
/// handler
///     .unpack(Path::new("images/patch0.tar.gz"), ArchiveFormat::TarGz, Path::new("images"))
///     .await?;
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait TarHandler: Send + Sync {
    /// Unpack `archive` into `dest`
    ///
    /// `format` is [`ArchiveFormat::Tar`] or [`ArchiveFormat::TarGz`].
    /// Returns the extracted files when the implementation can tell; the
    /// external tool reports nothing.
    async fn unpack(&self, archive: &Path, format: ArchiveFormat, dest: &Path)
    -> Result<Vec<PathBuf>>;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}

/// Tar handler using the external `tar` binary
pub struct CliTarHandler {
    binary_path: PathBuf,
}

impl CliTarHandler {
    /// Create a CLI handler with an explicit binary path
    pub fn new(binary_path: PathBuf) -> Self {
        Self { binary_path }
    }

    /// Attempt to find tar in PATH
    pub fn from_path() -> Option<Self> {
        which::which("tar").ok().map(Self::new)
    }

    /// Path of the tar binary this handler runs
    pub fn binary_path(&self) -> &Path {
        &self.binary_path
    }

    fn command(&self, archive: &Path, format: ArchiveFormat, dest: &Path) -> Command {
        let mut cmd = Command::new(&self.binary_path);
        cmd.arg(if format == ArchiveFormat::TarGz { "xzf" } else { "xf" })
            .arg(archive)
            .arg("--directory")
            .arg(dest);
        cmd
    }
}

#[async_trait]
impl TarHandler for CliTarHandler {
    async fn unpack(
        &self,
        archive: &Path,
        format: ArchiveFormat,
        dest: &Path,
    ) -> Result<Vec<PathBuf>> {
        debug!(?archive, ?dest, %format, "running tar");
        let output = self
            .command(archive, format, dest)
            .output()
            .await
            .map_err(|e| Error::ExternalTool(format!("Failed to execute tar: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ExtractError::failed(
                archive,
                format!("tar exited with {:?}: {}", output.status.code(), stderr.trim()),
            )
            .into());
        }
        Ok(Vec::new())
    }

    fn name(&self) -> &'static str {
        "cli-tar"
    }
}

/// Tar handler using the `tar` and `flate2` crates
pub struct NativeTarHandler;

impl NativeTarHandler {
    fn unpack_blocking(archive: &Path, format: ArchiveFormat, dest: &Path) -> Result<Vec<PathBuf>> {
        let file = std::fs::File::open(archive)?;
        let reader = BufReader::with_capacity(1024 * 1024, file);
        let reader: Box<dyn Read> = match format {
            ArchiveFormat::TarGz => Box::new(GzDecoder::new(reader)),
            ArchiveFormat::Tar => Box::new(reader),
            ArchiveFormat::Zip => {
                return Err(ExtractError::failed(archive, "zip is not a tar format").into());
            }
        };

        let fail = |e: std::io::Error| ExtractError::failed(archive, e.to_string());
        let mut tarball = tar::Archive::new(reader);
        let mut files = Vec::new();

        for entry in tarball.entries().map_err(fail)? {
            let mut entry = entry.map_err(fail)?;
            let relative = entry.path().map_err(fail)?.into_owned();
            let is_file = entry.header().entry_type().is_file();
            if entry.unpack_in(dest).map_err(fail)? {
                if is_file {
                    files.push(dest.join(relative));
                }
            } else {
                warn!(entry = ?relative, "skipping entry with unsafe path");
            }
        }

        Ok(files)
    }
}

#[async_trait]
impl TarHandler for NativeTarHandler {
    async fn unpack(
        &self,
        archive: &Path,
        format: ArchiveFormat,
        dest: &Path,
    ) -> Result<Vec<PathBuf>> {
        let archive_owned = archive.to_path_buf();
        let dest_owned = dest.to_path_buf();
        spawn_blocking(move || Self::unpack_blocking(&archive_owned, format, &dest_owned))
            .await
            .map_err(|e| ExtractError::failed(archive, format!("extraction task panicked: {}", e)))?
    }

    fn name(&self) -> &'static str {
        "native-tar"
    }
}
