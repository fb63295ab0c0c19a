//! HTTP download path: one shared client, retry with exponential backoff,
//! `Retry-After` support, and composition with the cache and the extraction
//! guard.

use crate::cache::{CachePolicy, DiskCache};
use crate::error::FetchError;
use crate::guard;
use crate::safety::{check_url, AllowedHosts};
use bytes::{Bytes, BytesMut};
use exponential_backoff::Backoff;
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;

/// Retry schedule for slot downloads: base 2 s, factor 2, cap 60 s, at most
/// five attempts. 429 and 5xx responses and transport errors are retried;
/// everything else is terminal.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    backoff: Backoff,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32) -> RetryPolicy {
        let mut backoff = Backoff::new(
            max_attempts,
            Duration::from_secs(2),
            Some(Duration::from_secs(60)),
        );
        backoff.set_factor(2);
        // exponential-backoff rejects exactly 0.0 (jitter must be > 0 and < 1),
        // and its internal jitter_factor = (jitter * 100) as u32 must be >= 1
        // or the RNG range becomes empty; 0.01 is the smallest value clearing both.
        backoff.set_jitter(0.01);
        RetryPolicy {
            max_attempts,
            backoff,
        }
    }

    /// Backoff after failed attempt `attempt` (1-based), or `None` once
    /// attempts are exhausted.
    fn delay(&self, attempt: u32) -> Option<Duration> {
        if attempt >= self.max_attempts {
            return None;
        }
        self.backoff
            .next(attempt)
            .or(Some(Duration::from_secs(60)))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy::new(5)
    }
}

/// Parses a `Retry-After` header value: either delta-seconds or an HTTP
/// date.
fn parse_retry_after(value: &str) -> Option<Duration> {
    if let Ok(seconds) = value.trim().parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }
    let when = chrono::DateTime::parse_from_rfc2822(value.trim()).ok()?;
    (when.with_timezone(&chrono::Utc) - chrono::Utc::now())
        .to_std()
        .ok()
}

#[derive(Debug)]
pub struct Downloader {
    client: reqwest::Client,
    allowed: AllowedHosts,
    retry: RetryPolicy,
    cache: Option<Arc<DiskCache>>,
}

impl Downloader {
    pub fn new(
        timeout: Duration,
        allowed: AllowedHosts,
        retry: RetryPolicy,
        cache: Option<Arc<DiskCache>>,
    ) -> Result<Downloader, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| FetchError::UpstreamUnavailable {
                url: String::new(),
                attempts: 0,
                detail: format!("failed to build HTTP client: {err}"),
            })?;
        Ok(Downloader {
            client,
            allowed,
            retry,
            cache,
        })
    }

    /// Fetches `url` with retries. `Ok(None)` is an absent slot (404).
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn fetch(&self, url: &str) -> Result<Option<Bytes>, FetchError> {
        let checked = check_url(url, &self.allowed)?;

        let mut rate_limited = false;
        let mut last_retry_after = None;
        let mut last_detail = String::new();
        for attempt in 1..=self.retry.max_attempts {
            let mut retry_after = None;
            match self.client.get(checked.clone()).send().await {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        return Ok(Some(read_body_capped(url, resp).await?));
                    }
                    if status.as_u16() == 404 {
                        tracing::debug!(url, "slot absent (404)");
                        return Ok(None);
                    }
                    retry_after = resp
                        .headers()
                        .get(reqwest::header::RETRY_AFTER)
                        .and_then(|v| v.to_str().ok())
                        .and_then(parse_retry_after);

                    if status.as_u16() == 429 {
                        rate_limited = true;
                        last_retry_after = retry_after;
                    } else if !status.is_server_error() {
                        return Err(FetchError::BadRequest {
                            url: url.to_string(),
                            status: status.as_u16(),
                        });
                    }
                    last_detail = format!("HTTP {status}");
                }
                Err(err) => {
                    last_detail = err.to_string();
                }
            }

            // Honor Retry-After when the server provided one, otherwise fall
            // back to the exponential schedule. No sleep after the final
            // attempt.
            let Some(backoff) = self.retry.delay(attempt) else {
                break;
            };
            let delay = retry_after.unwrap_or(backoff);
            tracing::debug!(url, attempt, ?delay, detail = %last_detail, "retrying");
            tokio::time::sleep(delay).await;
        }

        if rate_limited {
            Err(FetchError::RateLimited {
                url: url.to_string(),
                attempts: self.retry.max_attempts,
                retry_after: last_retry_after,
            })
        } else {
            Err(FetchError::UpstreamUnavailable {
                url: url.to_string(),
                attempts: self.retry.max_attempts,
                detail: last_detail,
            })
        }
    }

    /// Fetches and extracts one slot artifact, consulting the cache on both
    /// sides. The cache stores the response bytes (compressed), so a hit
    /// still runs extraction and its guards.
    pub async fn fetch_artifact(
        &self,
        url: &str,
        policy: CachePolicy,
    ) -> Result<Option<Bytes>, FetchError> {
        let cached = match &self.cache {
            Some(cache) => cache.get(url).await,
            None => None,
        };
        let raw = match cached {
            Some(bytes) => bytes,
            None => {
                let Some(bytes) = self.fetch(url).await? else {
                    return Ok(None);
                };
                if let Some(cache) = &self.cache {
                    if let Err(err) = cache.put(url, &bytes, policy).await {
                        tracing::warn!(url, error = %err, "cache write failed; continuing");
                    }
                }
                bytes
            }
        };

        // Extraction is CPU-bound and can touch hundreds of megabytes, so it
        // runs off the async workers.
        let url_owned = url.to_string();
        let extracted = tokio::task::spawn_blocking(move || guard::extract(&url_owned, &raw))
            .await
            .map_err(|_| FetchError::Cancelled)??;
        Ok(Some(Bytes::from(extracted)))
    }
}

/// Buffers a response body, failing as soon as it exceeds the compressed-size
/// cap rather than after it has been fully downloaded.
async fn read_body_capped(url: &str, resp: reqwest::Response) -> Result<Bytes, FetchError> {
    if let Some(len) = resp.content_length() {
        if len > guard::MAX_COMPRESSED {
            return Err(FetchError::DecompressBomb {
                url: url.to_string(),
                reason: crate::error::BombReason::CompressedSize,
            });
        }
    }
    let mut body = BytesMut::new();
    let mut stream = resp.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|err| FetchError::UpstreamUnavailable {
            url: url.to_string(),
            attempts: 1,
            detail: format!("body read failed: {err}"),
        })?;
        if (body.len() + chunk.len()) as u64 > guard::MAX_COMPRESSED {
            return Err(FetchError::DecompressBomb {
                url: url.to_string(),
                reason: crate::error::BombReason::CompressedSize,
            });
        }
        body.extend_from_slice(&chunk);
    }
    Ok(body.freeze())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn retry_after_parses_seconds_and_http_dates() {
        assert_eq!(parse_retry_after("7"), Some(Duration::from_secs(7)));
        assert_eq!(parse_retry_after(" 0 "), Some(Duration::from_secs(0)));
        assert!(parse_retry_after("garbage").is_none());

        let future = (chrono::Utc::now() + chrono::Duration::seconds(30)).to_rfc2822();
        let parsed = parse_retry_after(&future).unwrap();
        assert!(parsed <= Duration::from_secs(30));
        assert!(parsed >= Duration::from_secs(20));
    }

    #[test]
    fn backoff_caps_and_exhausts() {
        let policy = RetryPolicy::new(5);
        let first = policy.delay(1).unwrap();
        assert!(first >= Duration::from_secs(1), "first delay {first:?}");
        assert!(policy.delay(4).unwrap() <= Duration::from_secs(60));
        assert!(policy.delay(5).is_none());
        assert!(policy.delay(6).is_none());
    }
}
