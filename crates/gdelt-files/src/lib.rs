//! The file source: turns a date range into slot URLs, downloads them with
//! bounded concurrency, extracts them under the decompression guard, and
//! yields artifacts as a backpressured stream.

pub mod cache;
pub mod guard;
pub mod safety;
pub mod slots;

mod client;
mod error;
mod stream;

pub use client::{Downloader, RetryPolicy};
pub use error::{BombReason, FetchError};
pub use stream::{SlotFailure, SlotFile, SlotStream};

use cache::{CachePolicy, DiskCache};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use gdelt_model::{DateRange, RecordType};
use safety::AllowedHosts;
use slots::{IndexEntry, Slot};
use std::sync::Arc;
use std::time::Duration;

/// Knobs for constructing a [`FileSource`]. The defaults match the
/// documented engine defaults.
#[derive(Debug, Clone)]
pub struct FileSourceOptions {
    pub timeout: Duration,
    pub max_retries: u32,
    /// Maximum concurrent downloads (the sliding window size).
    pub window: usize,
    pub extra_allowed_hosts: Vec<String>,
    pub cache_dir: Option<std::path::PathBuf>,
    /// Lifetime for cached recent artifacts.
    pub cache_ttl: Duration,
}

impl Default for FileSourceOptions {
    fn default() -> Self {
        FileSourceOptions {
            timeout: Duration::from_secs(30),
            max_retries: 5,
            window: 10,
            extra_allowed_hosts: Vec::new(),
            cache_dir: None,
            cache_ttl: cache::RECENT_TTL,
        }
    }
}

pub struct FileSource {
    downloader: Arc<Downloader>,
    cache: Option<Arc<DiskCache>>,
    window: usize,
}

impl FileSource {
    pub async fn new(options: FileSourceOptions) -> Result<FileSource, FetchError> {
        let cache = match &options.cache_dir {
            Some(dir) => Some(Arc::new(
                DiskCache::open_with(dir.clone(), options.cache_ttl).await?,
            )),
            None => None,
        };
        let allowed = AllowedHosts::with_extra(options.extra_allowed_hosts.clone());
        let downloader = Arc::new(Downloader::new(
            options.timeout,
            allowed,
            RetryPolicy::new(options.max_retries),
            cache.clone(),
        )?);
        Ok(FileSource {
            downloader,
            cache,
            window: options.window,
        })
    }

    /// Streams every artifact for `range`, including the translated variant
    /// when requested. Artifacts arrive in completion order, not slot order.
    pub fn stream(
        &self,
        record_type: RecordType,
        range: &DateRange,
        include_translated: bool,
    ) -> SlotStream {
        let primary = slots::enumerate(record_type, range, false);
        let urls: Box<dyn Iterator<Item = (Option<Slot>, String)> + Send> = if include_translated {
            let translated = slots::enumerate(record_type, range, true);
            Box::new(
                primary
                    .chain(translated)
                    .map(|(slot, url)| (Some(slot), url)),
            )
        } else {
            Box::new(primary.map(|(slot, url)| (Some(slot), url)))
        };
        SlotStream::new(self.downloader.clone(), urls, self.window)
    }

    /// Maintenance mode: streams explicit URLs (typically drawn from the
    /// master index) instead of computing them from the range.
    pub fn stream_urls(&self, urls: Vec<String>) -> SlotStream {
        let iter = urls.into_iter().map(|url| {
            let slot = slot_time_from_url(&url).map(|t| Slot::quantize(t, RecordType::Events));
            (slot, url)
        });
        SlotStream::new(self.downloader.clone(), Box::new(iter), self.window)
    }

    /// Fetches and parses the master file index, caching it briefly.
    pub async fn master_index(&self, translated: bool) -> Result<Vec<IndexEntry>, FetchError> {
        self.fetch_index(&slots::master_index_url(translated)).await
    }

    /// Fetches the most recently published slot descriptors
    /// (`lastupdate.txt`), the "latest" convenience probe.
    pub async fn latest_slots(&self, translated: bool) -> Result<Vec<IndexEntry>, FetchError> {
        self.fetch_index(&slots::last_update_url(translated)).await
    }

    async fn fetch_index(&self, url: &str) -> Result<Vec<IndexEntry>, FetchError> {
        if let Some(cache) = &self.cache {
            if let Some(bytes) = cache.get_fresh(url, cache::INDEX_TTL).await {
                let text = String::from_utf8_lossy(&bytes);
                return Ok(slots::parse_master_index(&text));
            }
        }
        let bytes = self
            .fetch_required(url)
            .await?;
        if let Some(cache) = &self.cache {
            if let Err(err) = cache.put(url, &bytes, CachePolicy::master_index()).await {
                tracing::warn!(url, error = %err, "failed to cache index; continuing");
            }
        }
        let text = String::from_utf8_lossy(&bytes);
        Ok(slots::parse_master_index(&text))
    }

    /// Like [`Downloader::fetch`] but where absence is unexpected.
    async fn fetch_required(&self, url: &str) -> Result<bytes::Bytes, FetchError> {
        match self.downloader.fetch(url).await? {
            Some(bytes) => Ok(bytes),
            None => Err(FetchError::UpstreamUnavailable {
                url: url.to_string(),
                attempts: 1,
                detail: "index endpoint returned 404".to_string(),
            }),
        }
    }

    pub fn downloader(&self) -> &Arc<Downloader> {
        &self.downloader
    }

    pub fn cache(&self) -> Option<&Arc<DiskCache>> {
        self.cache.as_ref()
    }
}

/// Recovers the slot timestamp embedded in a slot-file URL
/// (`.../20240115001500.export.CSV.zip` or the daily `.../20240115.gkg.csv.gz`).
pub fn slot_time_from_url(url: &str) -> Option<DateTime<Utc>> {
    let name = url.rsplit('/').next()?;
    let digits: String = name.chars().take_while(|c| c.is_ascii_digit()).collect();
    match digits.len() {
        14 => NaiveDateTime::parse_from_str(&digits, "%Y%m%d%H%M%S")
            .ok()
            .map(|naive| naive.and_utc()),
        8 => NaiveDate::parse_from_str(&digits, "%Y%m%d")
            .ok()
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .map(|naive| naive.and_utc()),
        _ => None,
    }
}
