//! Bounded extraction of slot archives.
//!
//! Slot files arrive either as single-entry PKZIP archives (the TAB-delimited
//! record types) or as single-stream gzip (JSON-lines). Both run through the
//! same guard: output is accumulated in 64 KiB steps, and after every step
//! the absolute size cap and the running compression ratio are re-checked, so
//! a hostile archive is abandoned mid-extraction rather than after it has
//! filled memory.

use crate::error::{BombReason, FetchError};
use flate2::read::GzDecoder;
use std::io::{Cursor, Read};

/// Hard cap on compressed input.
pub const MAX_COMPRESSED: u64 = 100 * 1024 * 1024;
/// Hard cap on decompressed output.
pub const MAX_DECOMPRESSED: u64 = 500 * 1024 * 1024;
/// Cap on decompressed/compressed.
pub const MAX_RATIO: u64 = 100;

const STEP: usize = 64 * 1024;

/// Compression envelope detected from an artifact's magic number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Envelope {
    Gzip,
    ZipArchive,
    /// Plain content (the master index is served uncompressed).
    None,
}

pub fn detect_envelope(prefix: &[u8]) -> Envelope {
    if prefix.starts_with(&[0x1f, 0x8b]) {
        Envelope::Gzip
    } else if prefix.starts_with(&[0x50, 0x4b, 0x03, 0x04]) {
        Envelope::ZipArchive
    } else {
        Envelope::None
    }
}

/// Extracts the single contained file from `bytes`, whatever the envelope.
///
/// `url` is used only for error attribution.
pub fn extract(url: &str, bytes: &[u8]) -> Result<Vec<u8>, FetchError> {
    if bytes.len() as u64 > MAX_COMPRESSED {
        return Err(FetchError::DecompressBomb {
            url: url.to_string(),
            reason: BombReason::CompressedSize,
        });
    }
    match detect_envelope(bytes) {
        Envelope::None => Ok(bytes.to_vec()),
        Envelope::Gzip => {
            let counter = CountingReader::new(bytes);
            let compressed = counter.count.clone();
            let decoder = GzDecoder::new(counter);
            bounded_copy(url, decoder, move || {
                compressed.load(std::sync::atomic::Ordering::Relaxed)
            })
        }
        Envelope::ZipArchive => extract_zip(url, bytes),
    }
}

fn extract_zip(url: &str, bytes: &[u8]) -> Result<Vec<u8>, FetchError> {
    let corrupt = |detail: String| FetchError::CorruptArchive {
        url: url.to_string(),
        detail,
    };
    let mut archive =
        zip::ZipArchive::new(Cursor::new(bytes)).map_err(|err| corrupt(err.to_string()))?;
    if archive.len() != 1 {
        return Err(FetchError::MalformedArchive {
            url: url.to_string(),
            entries: archive.len(),
        });
    }
    let entry = archive
        .by_index(0)
        .map_err(|err| corrupt(err.to_string()))?;
    // The zip reader does not expose compressed bytes consumed, so the
    // running ratio is taken against the entry's total compressed size. The
    // absolute output cap still applies at every step.
    let compressed_total = entry.compressed_size().max(1);
    bounded_copy(url, entry, move || compressed_total)
}

/// Drains `reader` in 64 KiB steps, re-checking the caps after each step.
fn bounded_copy<R: Read>(
    url: &str,
    mut reader: R,
    compressed_so_far: impl Fn() -> u64,
) -> Result<Vec<u8>, FetchError> {
    let bomb = |reason: BombReason| FetchError::DecompressBomb {
        url: url.to_string(),
        reason,
    };
    let corrupt = |detail: String| FetchError::CorruptArchive {
        url: url.to_string(),
        detail,
    };

    let mut out = Vec::new();
    let mut chunk = vec![0u8; STEP];
    loop {
        let n = read_full(&mut reader, &mut chunk).map_err(|err| corrupt(err.to_string()))?;
        if n == 0 {
            return Ok(out);
        }
        out.extend_from_slice(&chunk[..n]);

        let decompressed = out.len() as u64;
        if decompressed > MAX_DECOMPRESSED {
            return Err(bomb(BombReason::DecompressedSize));
        }
        let compressed = compressed_so_far().max(1);
        if decompressed / compressed > MAX_RATIO {
            return Err(bomb(BombReason::Ratio));
        }
    }
}

/// Reads until `buf` is full or the stream ends.
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        }
    }
    Ok(filled)
}

/// Wraps a byte slice, counting how many compressed bytes the decoder has
/// consumed so the ratio check can use actual progress.
struct CountingReader<'a> {
    inner: &'a [u8],
    count: std::sync::Arc<std::sync::atomic::AtomicU64>,
}

impl<'a> CountingReader<'a> {
    fn new(inner: &'a [u8]) -> Self {
        CountingReader {
            inner,
            count: std::sync::Arc::new(std::sync::atomic::AtomicU64::new(0)),
        }
    }
}

impl Read for CountingReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.count
            .fetch_add(n as u64, std::sync::atomic::Ordering::Relaxed);
        Ok(n)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    fn gzip(content: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(content).unwrap();
        encoder.finish().unwrap()
    }

    fn single_zip(name: &str, content: &[u8]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        writer
            .start_file(name, zip::write::FileOptions::default())
            .unwrap();
        writer.write_all(content).unwrap();
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn gzip_and_zip_round_trip() {
        let content = b"a\tb\tc\n1\t2\t3\n";
        assert_eq!(extract("u", &gzip(content)).unwrap(), content);
        assert_eq!(
            extract("u", &single_zip("x.csv", content)).unwrap(),
            content
        );
        // Plain content passes through.
        assert_eq!(extract("u", content).unwrap(), content);
    }

    #[test]
    fn ratio_bomb_is_rejected_mid_extraction() {
        // ~1 GB of zeros compresses to ~1 MB: ratio far beyond 100:1.
        let content = vec![0u8; 64 * 1024 * 1024];
        let bomb = gzip(&content);
        assert!((bomb.len() as u64) < MAX_COMPRESSED);
        let err = extract("u", &bomb).unwrap_err();
        assert!(matches!(
            err,
            FetchError::DecompressBomb {
                reason: BombReason::Ratio,
                ..
            }
        ));
    }

    #[test]
    fn multi_entry_zip_is_malformed() {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for name in ["a.csv", "b.csv"] {
            writer
                .start_file(name, zip::write::FileOptions::default())
                .unwrap();
            writer.write_all(b"x").unwrap();
        }
        let bytes = writer.finish().unwrap().into_inner();
        assert!(matches!(
            extract("u", &bytes).unwrap_err(),
            FetchError::MalformedArchive { entries: 2, .. }
        ));
    }
}
