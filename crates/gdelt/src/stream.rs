//! The streaming result surface: a lazy record sequence with per-request
//! failure accounting and terminal batch collectors.

use crate::error::Error;
use futures::Stream;
use gdelt_model::{DedupKey, DedupStrategy, RawRecord};
use std::collections::HashSet;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;

/// One slot that failed after retries, as recorded in the fetch result.
#[derive(Debug, Clone)]
pub struct FailedSlot {
    pub url: String,
    pub reason: String,
    pub http_status: Option<u16>,
    pub retry_after: Option<Duration>,
}

/// Terminal container produced by [`RecordStream::collect_batch`].
#[derive(Debug)]
pub struct FetchResult<T> {
    pub records: Vec<T>,
    pub failed: Vec<FailedSlot>,
}

impl<T> FetchResult<T> {
    /// True when every enumerated slot was either delivered or legitimately
    /// absent.
    pub fn complete(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn partial(&self) -> bool {
        !self.failed.is_empty()
    }
}

/// Shared failure ledger, written by the driving state machine and read by
/// the terminal collector.
pub(crate) type FailureLedger = Arc<Mutex<Vec<FailedSlot>>>;

/// In-memory dedup transducer. Keys derive from raw records, so duplicate
/// rows are dropped before validated-record construction spends anything on
/// them. Records without a derivable key pass through.
pub(crate) struct Deduper {
    strategy: DedupStrategy,
    seen: HashSet<DedupKey>,
}

impl Deduper {
    pub(crate) fn new(strategy: DedupStrategy) -> Deduper {
        Deduper {
            strategy,
            seen: HashSet::new(),
        }
    }

    /// True when `raw` should be kept (first sighting of its key).
    pub(crate) fn admit(&mut self, raw: &RawRecord) -> bool {
        match self.strategy.key_for(raw) {
            Some(key) => self.seen.insert(key),
            None => true,
        }
    }
}

/// A lazy, backpressured sequence of validated records.
///
/// The stream yields records as the underlying source produces them; slot
/// failures routed by the `warn`/`skip` error policies are recorded in the
/// failure ledger rather than interrupting the stream.
pub struct RecordStream<T> {
    inner: Pin<Box<dyn Stream<Item = Result<T, Error>> + Send>>,
    failures: FailureLedger,
}

impl<T> std::fmt::Debug for RecordStream<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordStream").finish_non_exhaustive()
    }
}

impl<T> RecordStream<T> {
    pub(crate) fn new(
        inner: Pin<Box<dyn Stream<Item = Result<T, Error>> + Send>>,
        failures: FailureLedger,
    ) -> RecordStream<T> {
        RecordStream { inner, failures }
    }

    /// Drains the stream into a [`FetchResult`]. A fatal error (or the first
    /// failure under the `raise` policy) interrupts collection; partial
    /// results are never silently lost because failures accumulate in the
    /// ledger as they happen.
    pub async fn collect_batch(mut self) -> Result<FetchResult<T>, Error> {
        use futures::StreamExt;

        let mut records = Vec::new();
        while let Some(item) = self.inner.next().await {
            records.push(item?);
        }
        let failed = self.failures.lock().unwrap().clone();
        Ok(FetchResult { records, failed })
    }

    /// Convenience terminal collector returning records only.
    pub async fn to_list(self) -> Result<Vec<T>, Error> {
        Ok(self.collect_batch().await?.records)
    }

    /// Failures recorded so far. Most callers read this after the stream is
    /// drained; it is shared state with the driver.
    pub fn failures(&self) -> Vec<FailedSlot> {
        self.failures.lock().unwrap().clone()
    }
}

impl<T> Stream for RecordStream<T> {
    type Item = Result<T, Error>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use gdelt_model::{FormatVersion, TabRow};

    fn event_raw(url: &str, root: &str) -> RawRecord {
        let mut fields = vec![String::new(); 61];
        fields[1] = "20240115".to_string();
        fields[28] = root.to_string();
        fields[56] = "38.0".to_string();
        fields[57] = "-77.0".to_string();
        fields[60] = url.to_string();
        RawRecord::Row(TabRow::new(fields, FormatVersion::V2))
    }

    #[test]
    fn dedup_is_idempotent() {
        let records: Vec<RawRecord> = vec![
            event_raw("http://a", "01"),
            event_raw("http://a", "01"),
            event_raw("http://b", "01"),
        ];

        let mut first = Deduper::new(DedupStrategy::UrlDateLocation);
        let once: Vec<&RawRecord> = records.iter().filter(|r| first.admit(r)).collect();
        assert_eq!(once.len(), 2);

        // A second pass over the deduplicated output admits everything: the
        // transducer is idempotent over its own output.
        let mut second = Deduper::new(DedupStrategy::UrlDateLocation);
        let twice: Vec<&&RawRecord> = once.iter().filter(|r| second.admit(r)).collect();
        assert_eq!(twice.len(), once.len());
    }

    #[test]
    fn aggressive_strategy_splits_on_root_code() {
        // Three duplicated pairs; location-keyed dedup folds each pair.
        let records = vec![
            event_raw("http://a", "01"),
            event_raw("http://a", "01"),
            event_raw("http://b", "02"),
            event_raw("http://b", "02"),
            event_raw("http://c", "03"),
            event_raw("http://c", "03"),
        ];
        let mut deduper = Deduper::new(DedupStrategy::UrlDateLocation);
        assert_eq!(records.iter().filter(|r| deduper.admit(r)).count(), 3);

        // Same shape, but one duplicate differs in root code: aggressive
        // keeps it as a fourth record.
        let mut records = records;
        records[1] = event_raw("http://a", "14");
        let mut aggressive = Deduper::new(DedupStrategy::Aggressive);
        assert_eq!(records.iter().filter(|r| aggressive.admit(r)).count(), 4);
    }
}
