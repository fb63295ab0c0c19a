//! The source dispatcher: drives one request over the file source, the
//! warehouse, or both (file-first with fallback), applying the filter's
//! error policy, deduplication, and limit along the way.

use crate::error::Error;
use crate::stream::{Deduper, FailedSlot, FailureLedger, RecordStream};
use futures::StreamExt;
use gdelt_bigquery::{BigQueryClient, QueryBuilder, RowStream};
use gdelt_files::{SlotFailure, SlotStream};
use gdelt_model::{DedupStrategy, ErrorPolicy, RawRecord, RecordError, RecordType};
use std::sync::{Arc, Mutex};

/// A prepared warehouse query, executed only if the dispatcher switches to
/// the warehouse (or starts there).
pub(crate) struct WarehousePlan {
    pub(crate) client: BigQueryClient,
    pub(crate) builder: QueryBuilder,
}

pub(crate) enum InitialSource {
    Files {
        stream: SlotStream,
        fallback: Option<WarehousePlan>,
    },
    Warehouse(WarehousePlan),
}

type FromRaw<T> = Box<dyn Fn(&RawRecord) -> Result<T, RecordError> + Send>;
type PostFilter<T> = Box<dyn Fn(&T) -> bool + Send>;

pub(crate) struct DispatchOptions<T> {
    pub(crate) record_type: RecordType,
    pub(crate) error_policy: ErrorPolicy,
    pub(crate) dedup: Option<DedupStrategy>,
    pub(crate) limit: Option<u64>,
    pub(crate) from_raw: FromRaw<T>,
    /// Client-side selector application. The warehouse already filters
    /// server-side; the file path has no server-side selectors, so this is
    /// where filter selectors take effect for it.
    pub(crate) post_filter: Option<PostFilter<T>>,
}

enum Phase {
    Files {
        stream: SlotStream,
        fallback: Option<WarehousePlan>,
        current: Option<gdelt_parser::RawIter>,
    },
    WarehousePending(Box<WarehousePlan>),
    Warehouse(RowStream),
    Done,
}

struct Driver<T> {
    phase: Phase,
    options: DispatchOptions<T>,
    deduper: Option<Deduper>,
    yielded: u64,
    failures: FailureLedger,
}

impl<T> Driver<T> {
    /// Validates one raw record, routing duplicates and malformed rows away.
    /// `Some` means "yield this".
    fn process_raw(&mut self, raw: RawRecord) -> Option<T> {
        if let Some(deduper) = self.deduper.as_mut() {
            if !deduper.admit(&raw) {
                return None;
            }
        }
        match (self.options.from_raw)(&raw) {
            Ok(record) => match &self.options.post_filter {
                Some(filter) if !filter(&record) => None,
                _ => Some(record),
            },
            Err(err) => {
                // Row-level failures are never surfaced, only logged.
                tracing::warn!(record_type = %self.options.record_type, error = %err, "skipping unparseable row");
                None
            }
        }
    }

    async fn step(&mut self) -> Option<Result<T, Error>> {
        loop {
            if let Some(limit) = self.options.limit {
                if self.yielded >= limit {
                    if let Phase::Files { stream, .. } =
                        std::mem::replace(&mut self.phase, Phase::Done)
                    {
                        stream.shutdown().await;
                    }
                    return None;
                }
            }

            match &mut self.phase {
                Phase::Done => return None,

                Phase::WarehousePending(_) => {
                    let Phase::WarehousePending(plan) =
                        std::mem::replace(&mut self.phase, Phase::Done)
                    else {
                        unreachable!()
                    };
                    match plan.client.query(plan.builder.clone()).await {
                        Ok(rows) => {
                            self.phase = Phase::Warehouse(rows);
                        }
                        Err(err) => {
                            // Warehouse failure is terminal: there is nothing
                            // further to fall back to.
                            return Some(Err(Error::Warehouse(err)));
                        }
                    }
                }

                Phase::Warehouse(rows) => match rows.next().await {
                    Some(Ok(raw)) => {
                        if let Some(record) = self.process_raw(raw) {
                            self.yielded += 1;
                            return Some(Ok(record));
                        }
                    }
                    Some(Err(err)) => {
                        self.phase = Phase::Done;
                        return Some(Err(Error::Warehouse(err)));
                    }
                    None => {
                        self.phase = Phase::Done;
                        return None;
                    }
                },

                Phase::Files {
                    stream,
                    fallback,
                    current,
                } => {
                    if let Some(iter) = current.as_mut() {
                        match iter.next() {
                            Some(raw) => {
                                if let Some(record) = self.process_raw(raw) {
                                    self.yielded += 1;
                                    return Some(Ok(record));
                                }
                                continue;
                            }
                            None => {
                                *current = None;
                            }
                        }
                    }

                    match stream.next().await {
                        Some(Ok(file)) => {
                            tracing::debug!(url = %file.url, bytes = file.bytes.len(), "parsing slot artifact");
                            *current =
                                Some(gdelt_parser::parse(self.options.record_type, file.bytes));
                        }
                        Some(Err(failure)) => {
                            record_failure(&self.failures, &failure);

                            if failure.error.triggers_fallback() && fallback.is_some() {
                                tracing::warn!(
                                    url = %failure.url,
                                    error = %failure.error,
                                    "file source degraded; falling back to warehouse for the remainder of this request"
                                );
                                let Phase::Files {
                                    stream, fallback, ..
                                } = std::mem::replace(&mut self.phase, Phase::Done)
                                else {
                                    unreachable!()
                                };
                                stream.shutdown().await;
                                self.phase = Phase::WarehousePending(Box::new(
                                    fallback.expect("fallback presence checked above"),
                                ));
                                continue;
                            }

                            match self.options.error_policy {
                                ErrorPolicy::Raise => {
                                    let Phase::Files { stream, .. } =
                                        std::mem::replace(&mut self.phase, Phase::Done)
                                    else {
                                        unreachable!()
                                    };
                                    stream.shutdown().await;
                                    return Some(Err(Error::Fetch(failure.error)));
                                }
                                ErrorPolicy::Warn => {
                                    tracing::warn!(url = %failure.url, error = %failure.error, "slot failed; continuing");
                                }
                                ErrorPolicy::Skip => {
                                    tracing::debug!(url = %failure.url, error = %failure.error, "slot failed; skipping");
                                }
                            }
                        }
                        None => {
                            self.phase = Phase::Done;
                            return None;
                        }
                    }
                }
            }
        }
    }
}

fn record_failure(ledger: &FailureLedger, failure: &SlotFailure) {
    ledger.lock().unwrap().push(FailedSlot {
        url: failure.url.clone(),
        reason: failure.error.to_string(),
        http_status: failure.error.http_status(),
        retry_after: failure.error.retry_after(),
    });
}

/// Builds the record stream for one request.
pub(crate) fn run<T: Send + 'static>(
    initial: InitialSource,
    options: DispatchOptions<T>,
) -> RecordStream<T> {
    let failures: FailureLedger = Arc::new(Mutex::new(Vec::new()));
    let deduper = options.dedup.map(Deduper::new);
    let phase = match initial {
        InitialSource::Files { stream, fallback } => Phase::Files {
            stream,
            fallback,
            current: None,
        },
        InitialSource::Warehouse(plan) => Phase::WarehousePending(Box::new(plan)),
    };
    let driver = Driver {
        phase,
        options,
        deduper,
        yielded: 0,
        failures: failures.clone(),
    };

    let inner = futures::stream::unfold(driver, |mut driver| async move {
        driver.step().await.map(|item| (item, driver))
    });
    RecordStream::new(Box::pin(inner), failures)
}
