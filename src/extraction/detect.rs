use crate::types::ArchiveFormat;
use flate2::read::GzDecoder;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Size of a tar header block
const TAR_BLOCK: usize = 512;
/// Offset of the POSIX `ustar` magic inside a tar header
const USTAR_MAGIC_OFFSET: usize = 257;
/// Checksum field of a tar header
const CHKSUM_RANGE: std::ops::Range<usize> = 148..156;
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Identify the archive format of a file by its content
///
/// - zip: the file opens as a zip container (central directory is readable)
/// - tar: the first block is a valid tar header (`ustar` magic or a matching
///   v7 checksum)
/// - tar.gz: gzip magic and the first decompressed block is a tar header, or
///   gzip magic and a `.gz`/`.tgz` suffix
///
/// Returns `Ok(None)` for anything else, including empty files.
pub fn detect_archive_format(path: &Path) -> std::io::Result<Option<ArchiveFormat>> {
    if ::zip::ZipArchive::new(File::open(path)?).is_ok() {
        return Ok(Some(ArchiveFormat::Zip));
    }

    let head = read_block(File::open(path)?)?;
    if is_tar_header(&head) {
        return Ok(Some(ArchiveFormat::Tar));
    }

    if head.starts_with(&GZIP_MAGIC) {
        let inner = read_block(GzDecoder::new(File::open(path)?)).unwrap_or_default();
        if is_tar_header(&inner) || has_gzip_suffix(path) {
            return Ok(Some(ArchiveFormat::TarGz));
        }
    }

    Ok(None)
}

/// Read up to one tar block from `reader`
fn read_block(reader: impl Read) -> std::io::Result<Vec<u8>> {
    let mut block = Vec::with_capacity(TAR_BLOCK);
    reader.take(TAR_BLOCK as u64).read_to_end(&mut block)?;
    Ok(block)
}

fn has_gzip_suffix(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("gz") || e.eq_ignore_ascii_case("tgz"))
}

/// Whether `block` is a tar header
pub(crate) fn is_tar_header(block: &[u8]) -> bool {
    if block.len() < TAR_BLOCK {
        return false;
    }
    if &block[USTAR_MAGIC_OFFSET..USTAR_MAGIC_OFFSET + 5] == b"ustar" {
        return true;
    }

    // v7 header: checksum field is octal, summed with itself read as spaces
    let Some(stored) = parse_octal(&block[CHKSUM_RANGE]) else {
        return false;
    };
    let computed: u64 = block[..TAR_BLOCK]
        .iter()
        .enumerate()
        .map(|(i, b)| {
            if CHKSUM_RANGE.contains(&i) {
                u64::from(b' ')
            } else {
                u64::from(*b)
            }
        })
        .sum();
    stored == computed
}

fn parse_octal(field: &[u8]) -> Option<u64> {
    let text = std::str::from_utf8(field).ok()?;
    let digits = text.trim_matches(|c: char| c == '\0' || c == ' ');
    if digits.is_empty() {
        return None;
    }
    u64::from_str_radix(digits, 8).ok()
}
