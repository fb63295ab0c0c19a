use std::time::Duration;

/// Why a decompression was aborted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BombReason {
    /// Compressed input exceeds the 100 MB hard cap.
    CompressedSize,
    /// Decompressed output exceeds the 500 MB hard cap.
    DecompressedSize,
    /// Decompressed-to-compressed ratio exceeds 100:1.
    Ratio,
}

impl std::fmt::Display for BombReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            BombReason::CompressedSize => "compressed size cap exceeded",
            BombReason::DecompressedSize => "decompressed size cap exceeded",
            BombReason::Ratio => "decompression ratio cap exceeded",
        };
        f.write_str(text)
    }
}

/// Failure modes of the file source. 404 is deliberately not represented:
/// an absent slot is `Ok(None)` on the fetch path, never an error.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("rate limited by {url} after {attempts} attempts")]
    RateLimited {
        url: String,
        attempts: u32,
        retry_after: Option<Duration>,
    },

    #[error("upstream unavailable for {url} after {attempts} attempts: {detail}")]
    UpstreamUnavailable {
        url: String,
        attempts: u32,
        detail: String,
    },

    #[error("request for {url} rejected with HTTP {status}")]
    BadRequest { url: String, status: u16 },

    #[error("refusing to extract {url}: {reason}")]
    DecompressBomb { url: String, reason: BombReason },

    #[error("archive at {url} holds {entries} entries, expected exactly one")]
    MalformedArchive { url: String, entries: usize },

    #[error("unsafe URL {url}: {reason}")]
    UnsafeUrl { url: String, reason: String },

    #[error("corrupt archive at {url}: {detail}")]
    CorruptArchive { url: String, detail: String },

    #[error("cache I/O failure: {0}")]
    Cache(#[from] std::io::Error),

    #[error("operation cancelled")]
    Cancelled,
}

impl FetchError {
    /// The HTTP status most closely associated with this failure, for the
    /// fetch-result failure ledger.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            FetchError::RateLimited { .. } => Some(429),
            FetchError::BadRequest { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            FetchError::RateLimited { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    /// True for the failure kinds that justify falling back to the
    /// warehouse: rate limiting and upstream unavailability. Safety
    /// violations and client errors do not trigger fallback.
    pub fn triggers_fallback(&self) -> bool {
        matches!(
            self,
            FetchError::RateLimited { .. } | FetchError::UpstreamUnavailable { .. }
        )
    }
}
