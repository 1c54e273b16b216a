//! Shared test helpers: fake transfers, fake tar handlers and fixture archives.

use crate::config::RetryConfig;
use crate::error::{ExtractError, Result, TransferError};
use crate::extraction::TarHandler;
use crate::transfer::Transfer;
use crate::types::ArchiveFormat;
use async_trait::async_trait;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

/// Backoff with no waiting, for fast retry tests
pub(crate) fn instant_backoff() -> RetryConfig {
    RetryConfig {
        max_retries: 3,
        initial_delay: Duration::ZERO,
        max_delay: Duration::ZERO,
        backoff_multiplier: 1.0,
        jitter: false,
    }
}

/// Transfer that fails a fixed number of times before writing `body`
pub(crate) struct FlakyTransfer {
    failures: u32,
    body: Vec<u8>,
    partial_chunk: Option<Vec<u8>>,
    pub(crate) calls: AtomicU32,
    pub(crate) saw_quiet: AtomicBool,
}

impl FlakyTransfer {
    pub(crate) fn new(failures: u32, body: &[u8]) -> Self {
        Self {
            failures,
            body: body.to_vec(),
            partial_chunk: None,
            calls: AtomicU32::new(0),
            saw_quiet: AtomicBool::new(false),
        }
    }

    pub(crate) fn succeeding(body: &[u8]) -> Self {
        Self::new(0, body)
    }

    pub(crate) fn always_failing() -> Self {
        Self::new(u32::MAX, b"")
    }

    /// Append `chunk` to the partial file on every failed attempt
    pub(crate) fn with_partial(mut self, chunk: &[u8]) -> Self {
        self.partial_chunk = Some(chunk.to_vec());
        self
    }
}

#[async_trait]
impl Transfer for FlakyTransfer {
    async fn fetch(&self, url: &str, partial: &Path, quiet: bool) -> Result<u64> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if quiet {
            self.saw_quiet.store(true, Ordering::SeqCst);
        }

        if call < self.failures {
            if let Some(chunk) = &self.partial_chunk {
                let mut file = std::fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(partial)?;
                file.write_all(chunk)?;
            }
            return Err(TransferError::Status {
                url: url.to_string(),
                status: 503,
            }
            .into());
        }

        tokio::fs::write(partial, &self.body).await?;
        Ok(self.body.len() as u64)
    }

    fn name(&self) -> &'static str {
        "flaky"
    }
}

/// Tar handler that records its calls and optionally fails
#[derive(Default)]
pub(crate) struct RecordingTarHandler {
    pub(crate) calls: Mutex<Vec<(PathBuf, ArchiveFormat, PathBuf)>>,
    pub(crate) fail: bool,
}

impl RecordingTarHandler {
    pub(crate) fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }
}

#[async_trait]
impl TarHandler for RecordingTarHandler {
    async fn unpack(
        &self,
        archive: &Path,
        format: ArchiveFormat,
        dest: &Path,
    ) -> Result<Vec<PathBuf>> {
        self.calls
            .lock()
            .unwrap()
            .push((archive.to_path_buf(), format, dest.to_path_buf()));
        if self.fail {
            return Err(ExtractError::failed(archive, "recording handler told to fail").into());
        }
        Ok(Vec::new())
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

/// Create a zip archive with the given entries (stored, no compression)
pub(crate) fn create_zip_archive(archive_path: &Path, files: &[(&str, &[u8])]) {
    let file = std::fs::File::create(archive_path).unwrap();
    let mut writer = ::zip::ZipWriter::new(file);
    let options =
        ::zip::write::FileOptions::default().compression_method(::zip::CompressionMethod::Stored);
    for (name, content) in files {
        writer.start_file(*name, options).unwrap();
        writer.write_all(content).unwrap();
    }
    writer.finish().unwrap();
}

/// Build an uncompressed tar in memory
pub(crate) fn tar_bytes(files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut builder = ::tar::Builder::new(Vec::new());
    for (name, content) in files {
        let mut header = ::tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(0o644);
        header.set_entry_type(::tar::EntryType::Regular);
        header.set_cksum();
        builder.append_data(&mut header, name, *content).unwrap();
    }
    builder.into_inner().unwrap()
}

/// Create an uncompressed tar archive with the given entries
pub(crate) fn create_tar_archive(archive_path: &Path, files: &[(&str, &[u8])]) {
    std::fs::write(archive_path, tar_bytes(files)).unwrap();
}

/// Create a gzip-compressed tar archive with the given entries
pub(crate) fn create_tar_gz_archive(archive_path: &Path, files: &[(&str, &[u8])]) {
    std::fs::write(archive_path, gzip(&tar_bytes(files))).unwrap();
}

/// gzip-compress arbitrary bytes
pub(crate) fn gzip(data: &[u8]) -> Vec<u8> {
    let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}
