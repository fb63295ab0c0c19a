//! The sliding-window download stream.
//!
//! At most `window` downloads are in flight at any time. When one completes
//! its artifact is yielded to the caller, and a single replacement task is
//! started the next time the stream is polled; the caller's consumption rate
//! is therefore the backpressure point, and peak residency is bounded by
//! `window` times the artifact cap. Absent slots (404) are consumed without
//! being yielded.
//!
//! Dropping the stream aborts every in-flight task; [`SlotStream::shutdown`]
//! additionally awaits their termination.

use crate::cache::CachePolicy;
use crate::client::Downloader;
use crate::error::FetchError;
use crate::slots::Slot;
use bytes::Bytes;
use chrono::Utc;
use futures::Stream;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::task::JoinSet;

/// One successfully fetched and extracted slot artifact.
#[derive(Debug)]
pub struct SlotFile {
    /// The slot the artifact belongs to; `None` for index-enumerated URLs
    /// whose name carries no parseable timestamp.
    pub slot: Option<Slot>,
    pub url: String,
    /// Extracted (decompressed) content.
    pub bytes: Bytes,
}

/// A slot that failed after retries. Absent slots are not failures and do
/// not appear here.
#[derive(Debug)]
pub struct SlotFailure {
    pub url: String,
    pub error: FetchError,
}

type TaskOutput = (Option<Slot>, String, Result<Option<Bytes>, FetchError>);

pub struct SlotStream {
    urls: Box<dyn Iterator<Item = (Option<Slot>, String)> + Send>,
    tasks: JoinSet<TaskOutput>,
    downloader: Arc<Downloader>,
    window: usize,
    exhausted: bool,
}

impl SlotStream {
    pub(crate) fn new(
        downloader: Arc<Downloader>,
        urls: Box<dyn Iterator<Item = (Option<Slot>, String)> + Send>,
        window: usize,
    ) -> SlotStream {
        SlotStream {
            urls,
            tasks: JoinSet::new(),
            downloader,
            window: window.max(1),
            exhausted: false,
        }
    }

    /// Tops the in-flight set back up to the window size.
    fn replenish(&mut self) {
        while !self.exhausted && self.tasks.len() < self.window {
            match self.urls.next() {
                Some((slot, url)) => {
                    let downloader = self.downloader.clone();
                    let policy = slot
                        .map(|s| CachePolicy::for_artifact(s.time(), Utc::now()))
                        .unwrap_or(CachePolicy::Ttl(crate::cache::RECENT_TTL));
                    self.tasks.spawn(async move {
                        let result = downloader.fetch_artifact(&url, policy).await;
                        (slot, url, result)
                    });
                }
                None => self.exhausted = true,
            }
        }
    }

    /// Aborts all in-flight downloads and awaits their termination. Dropping
    /// the stream aborts without awaiting.
    pub async fn shutdown(mut self) {
        self.tasks.shutdown().await;
    }

    /// Number of currently in-flight downloads. Never exceeds the window.
    pub fn in_flight(&self) -> usize {
        self.tasks.len()
    }
}

impl Stream for SlotStream {
    type Item = Result<SlotFile, SlotFailure>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let me = self.get_mut();
        loop {
            me.replenish();

            match me.tasks.poll_join_next(cx) {
                Poll::Ready(Some(Ok((slot, url, Ok(Some(bytes)))))) => {
                    return Poll::Ready(Some(Ok(SlotFile { slot, url, bytes })));
                }
                Poll::Ready(Some(Ok((_, _, Ok(None))))) => {
                    // Absent slot: not an error, nothing to yield; loop to
                    // replenish and keep waiting.
                    continue;
                }
                Poll::Ready(Some(Ok((_, url, Err(error))))) => {
                    return Poll::Ready(Some(Err(SlotFailure { url, error })));
                }
                Poll::Ready(Some(Err(join_err))) => {
                    if join_err.is_cancelled() {
                        continue;
                    }
                    tracing::error!(error = %join_err, "download task panicked");
                    return Poll::Ready(Some(Err(SlotFailure {
                        url: String::new(),
                        error: FetchError::Cancelled,
                    })));
                }
                Poll::Ready(None) => {
                    if me.exhausted {
                        return Poll::Ready(None);
                    }
                    // New tasks were not yet spawned (fresh stream); loop to
                    // replenish.
                    continue;
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
