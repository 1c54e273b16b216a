use crate::error::{Error, ExtractError, Result};
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Archive extractor for ZIP files
///
/// Entries whose name contains any junk marker (e.g. `__MACOSX`, `.DS_Store`)
/// are skipped without error.
pub struct ZipExtractor;

impl ZipExtractor {
    /// Whether an entry name contains one of the junk markers
    pub fn is_junk(name: &str, junk_markers: &[String]) -> bool {
        junk_markers
            .iter()
            .any(|marker| !marker.is_empty() && name.contains(marker.as_str()))
    }

    /// Write one entry under `dest_path`; returns the file written, if any
    fn write_entry(
        mut entry: zip::read::ZipFile,
        dest_path: &Path,
        archive_path: &Path,
    ) -> Result<Option<PathBuf>> {
        let Some(relative) = entry.enclosed_name().map(Path::to_path_buf) else {
            warn!(entry = entry.name(), "skipping entry with unsafe path");
            return Ok(None);
        };
        let target = dest_path.join(relative);

        // Directory entries only need the directory itself
        if entry.is_dir() {
            std::fs::create_dir_all(&target).map_err(|e| with_path(e, "create directory", &target))?;
            return Ok(None);
        }
        // Ensure parent directory exists
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent).map_err(|e| with_path(e, "create directory", parent))?;
        }

        // Stream the entry to disk
        let mut out = File::create(&target).map_err(|e| with_path(e, "create", &target))?;
        std::io::copy(&mut entry, &mut out).map_err(|e| {
            ExtractError::failed(archive_path, format!("failed to extract {}: {}", entry.name(), e))
        })?;
        Ok(Some(target))
    }

    /// Extract every non-junk entry of `archive_path` into `dest_path`
    pub fn extract(
        archive_path: &Path,
        dest_path: &Path,
        junk_markers: &[String],
    ) -> Result<Vec<PathBuf>> {
        debug!(?archive_path, ?dest_path, "attempting ZIP extraction");

        std::fs::create_dir_all(dest_path)
            .map_err(|e| with_path(e, "create directory", dest_path))?;
        // Open archive
        let file = File::open(archive_path).map_err(|e| with_path(e, "open", archive_path))?;
        let mut archive = zip::ZipArchive::new(file).map_err(|e| {
            ExtractError::failed(archive_path, format!("failed to read ZIP archive: {}", e))
        })?;

        let mut written = Vec::new();
        let mut skipped = 0usize;

        for i in 0..archive.len() {
            let entry = archive.by_index(i).map_err(|e| {
                ExtractError::failed(archive_path, format!("failed to read ZIP entry {}: {}", i, e))
            })?;

            // Drop macOS metadata and similar junk
            if Self::is_junk(entry.name(), junk_markers) {
                debug!(entry = entry.name(), "skipping junk entry");
                skipped += 1;
                continue;
            }

            written.extend(Self::write_entry(entry, dest_path, archive_path)?);
        }

        info!(
            ?archive_path,
            extracted_count = written.len(),
            skipped_count = skipped,
            "ZIP extraction successful"
        );
        Ok(written)
    }
}

fn with_path(e: std::io::Error, action: &str, path: &Path) -> Error {
    Error::Io(std::io::Error::new(
        e.kind(),
        format!("failed to {} '{}': {}", action, path.display(), e),
    ))
}
