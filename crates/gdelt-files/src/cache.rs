//! Two-tier filesystem cache for fetched artifacts.
//!
//! Historical artifacts (slot timestamp at least 30 days old) are immutable
//! upstream and cached indefinitely under `keep/`; recent artifacts and the
//! master index live under `ttl/` and expire. Writes go through a temp file
//! and a rename, so concurrent writers settle on last-writer-wins without
//! torn reads.

use crate::error::FetchError;
use crate::safety;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::time::{Duration, SystemTime};

/// Default lifetime for recent artifacts.
pub const RECENT_TTL: Duration = Duration::from_secs(60 * 60);
/// Lifetime for the master index, which changes every 15 minutes.
pub const INDEX_TTL: Duration = Duration::from_secs(5 * 60);
/// Age at which an artifact is treated as immutable.
const IMMUTABLE_AFTER_DAYS: i64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachePolicy {
    Indefinite,
    Ttl(Duration),
}

impl CachePolicy {
    /// Chooses the policy for a slot artifact from the timestamp embedded in
    /// its URL.
    pub fn for_artifact(slot_time: DateTime<Utc>, now: DateTime<Utc>) -> CachePolicy {
        if now - slot_time >= chrono::Duration::days(IMMUTABLE_AFTER_DAYS) {
            CachePolicy::Indefinite
        } else {
            CachePolicy::Ttl(RECENT_TTL)
        }
    }

    pub fn master_index() -> CachePolicy {
        CachePolicy::Ttl(INDEX_TTL)
    }

    fn dir(&self) -> &'static str {
        match self {
            CachePolicy::Indefinite => "keep",
            CachePolicy::Ttl(_) => "ttl",
        }
    }
}

#[derive(Debug)]
pub struct DiskCache {
    root: PathBuf,
    recent_ttl: Duration,
}

impl DiskCache {
    pub async fn open(root: impl Into<PathBuf>) -> Result<DiskCache, FetchError> {
        Self::open_with(root, RECENT_TTL).await
    }

    /// Opens the cache with a configured lifetime for TTL-tier entries.
    pub async fn open_with(
        root: impl Into<PathBuf>,
        recent_ttl: Duration,
    ) -> Result<DiskCache, FetchError> {
        let root = root.into();
        for tier in ["keep", "ttl"] {
            tokio::fs::create_dir_all(root.join(tier)).await?;
        }
        Ok(DiskCache { root, recent_ttl })
    }

    fn path_for(&self, key: &str, tier: &str) -> Result<PathBuf, FetchError> {
        let name = safety::cache_file_name(key);
        safety::resolve_cache_path(&self.root.join(tier), &name)
    }

    /// Looks up `key`, honoring the entry's tier: indefinite entries always
    /// hit, TTL entries hit only while fresh. A stale TTL entry is removed
    /// on the way out.
    pub async fn get(&self, key: &str) -> Option<Bytes> {
        let keep = self.path_for(key, "keep").ok()?;
        if let Ok(bytes) = tokio::fs::read(&keep).await {
            tracing::debug!(key, tier = "keep", "cache hit");
            return Some(Bytes::from(bytes));
        }

        let ttl_path = self.path_for(key, "ttl").ok()?;
        let meta = tokio::fs::metadata(&ttl_path).await.ok()?;
        let age = meta
            .modified()
            .ok()
            .and_then(|mtime| SystemTime::now().duration_since(mtime).ok())?;
        // TTL-tier entries share the artifact TTL; the master index uses
        // get_fresh with its shorter bound.
        if age > self.recent_ttl {
            tracing::debug!(key, "cache entry expired; removing");
            let _ = tokio::fs::remove_file(&ttl_path).await;
            return None;
        }
        match tokio::fs::read(&ttl_path).await {
            Ok(bytes) => {
                tracing::debug!(key, tier = "ttl", "cache hit");
                Some(Bytes::from(bytes))
            }
            Err(_) => None,
        }
    }

    /// Like [`get`](Self::get) but with an explicit freshness bound, used for
    /// the master index's shorter TTL.
    pub async fn get_fresh(&self, key: &str, max_age: Duration) -> Option<Bytes> {
        let ttl_path = self.path_for(key, "ttl").ok()?;
        let meta = tokio::fs::metadata(&ttl_path).await.ok()?;
        let age = meta
            .modified()
            .ok()
            .and_then(|mtime| SystemTime::now().duration_since(mtime).ok())?;
        if age > max_age {
            return None;
        }
        tokio::fs::read(&ttl_path).await.ok().map(Bytes::from)
    }

    pub async fn put(&self, key: &str, bytes: &[u8], policy: CachePolicy) -> Result<(), FetchError> {
        let path = self.path_for(key, policy.dir())?;
        let tmp = path.with_file_name(format!(
            "{}.tmp",
            path.file_name().and_then(|n| n.to_str()).unwrap_or("entry")
        ));
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;
        tracing::debug!(key, tier = policy.dir(), size = bytes.len(), "cache write");
        Ok(())
    }

    /// Removes TTL-tier entries last written before `before`. Indefinite
    /// entries are never pruned.
    pub async fn prune(&self, before: SystemTime) -> Result<usize, FetchError> {
        let mut removed = 0;
        let mut entries = tokio::fs::read_dir(self.root.join("ttl")).await?;
        while let Some(entry) = entries.next_entry().await? {
            let stale = entry
                .metadata()
                .await
                .ok()
                .and_then(|meta| meta.modified().ok())
                .map_or(false, |mtime| mtime < before);
            if stale && tokio::fs::remove_file(entry.path()).await.is_ok() {
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Total bytes held across both tiers.
    pub async fn size(&self) -> Result<u64, FetchError> {
        let mut total = 0;
        for tier in ["keep", "ttl"] {
            let mut entries = tokio::fs::read_dir(self.root.join(tier)).await?;
            while let Some(entry) = entries.next_entry().await? {
                if let Ok(meta) = entry.metadata().await {
                    total += meta.len();
                }
            }
        }
        Ok(total)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::TimeZone;

    #[tokio::test]
    async fn round_trip_and_tiers() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::open(dir.path()).await.unwrap();

        let key = "https://data.gdeltproject.org/gdeltv2/20240115001500.export.CSV.zip";
        cache
            .put(key, b"artifact", CachePolicy::Indefinite)
            .await
            .unwrap();
        assert_eq!(cache.get(key).await.unwrap().as_ref(), b"artifact");

        let recent = "https://data.gdeltproject.org/gdeltv2/recent.CSV.zip";
        cache
            .put(recent, b"fresh", CachePolicy::Ttl(RECENT_TTL))
            .await
            .unwrap();
        assert_eq!(cache.get(recent).await.unwrap().as_ref(), b"fresh");

        assert!(cache.size().await.unwrap() >= 13);
    }

    #[tokio::test]
    async fn prune_only_touches_ttl_tier() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::open(dir.path()).await.unwrap();
        cache.put("a", b"keep", CachePolicy::Indefinite).await.unwrap();
        cache
            .put("b", b"ttl", CachePolicy::Ttl(RECENT_TTL))
            .await
            .unwrap();

        let removed = cache
            .prune(SystemTime::now() + Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(removed, 1);
        assert!(cache.get("a").await.is_some());
        assert!(cache.get("b").await.is_none());
    }

    #[test]
    fn artifact_policy_follows_slot_age() {
        let now = Utc.with_ymd_and_hms(2024, 2, 20, 0, 0, 0).unwrap();
        let old = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let recent = Utc.with_ymd_and_hms(2024, 2, 19, 0, 0, 0).unwrap();
        assert_eq!(
            CachePolicy::for_artifact(old, now),
            CachePolicy::Indefinite
        );
        assert_eq!(
            CachePolicy::for_artifact(recent, now),
            CachePolicy::Ttl(RECENT_TTL)
        );
    }
}
