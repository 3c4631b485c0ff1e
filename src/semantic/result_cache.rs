//! Short-lived cache of complete search responses.
//!
//! Providers are re-queried often with the same query and mostly the same
//! articles; an identical request over an identical pool is answered from
//! here until its entry expires.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::types::{ArticleId, SearchResponse, ValidSearch};

/// Default lifetime of a cached response.
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

/// Default minimum gap between sweeps of expired entries.
pub const DEFAULT_CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

/// Counts reported by [`ResultCache::stats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResultCacheStats {
    pub total: usize,
    pub valid: usize,
    pub expired: usize,
    pub ttl: Duration,
}

#[derive(Debug)]
struct Entry {
    response: SearchResponse,
    stored_at: Instant,
}

#[derive(Debug)]
struct Inner {
    entries: HashMap<String, Entry>,
    last_cleanup: Instant,
}

#[derive(Debug)]
pub struct ResultCache {
    ttl: Duration,
    cleanup_interval: Duration,
    inner: Mutex<Inner>,
}

impl Default for ResultCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL, DEFAULT_CLEANUP_INTERVAL)
    }
}

impl ResultCache {
    pub fn new(ttl: Duration, cleanup_interval: Duration) -> Self {
        Self {
            ttl,
            cleanup_interval,
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                last_cleanup: Instant::now(),
            }),
        }
    }

    /// Cache key over every request parameter and the deduplicated pool.
    pub fn key(search: &ValidSearch, ids: &[ArticleId]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(search.query.as_bytes());
        hasher.update([0u8]);
        hasher.update((search.num as u64).to_le_bytes());
        hasher.update(search.min_similarity.to_bits().to_le_bytes());
        hasher.update((search.chunk_size as u64).to_le_bytes());
        match search.early_stop_threshold {
            Some(threshold) => {
                hasher.update([1u8]);
                hasher.update((threshold as u64).to_le_bytes());
            }
            None => hasher.update([0u8]),
        }
        for id in ids {
            hasher.update(id.as_str().as_bytes());
            hasher.update([0u8]);
        }
        format!("{:x}", hasher.finalize())
    }

    /// Fresh response for `key`, dropping it if expired.
    pub fn get(&self, key: &str) -> Option<SearchResponse> {
        let mut inner = self.inner.lock();
        self.maybe_cleanup(&mut inner);

        let expired = match inner.entries.get(key) {
            Some(entry) if entry.stored_at.elapsed() < self.ttl => {
                debug!("Result cache hit");
                return Some(entry.response.clone());
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            inner.entries.remove(key);
        }
        None
    }

    pub fn insert(&self, key: String, response: SearchResponse) {
        let mut inner = self.inner.lock();
        self.maybe_cleanup(&mut inner);
        inner.entries.insert(
            key,
            Entry {
                response,
                stored_at: Instant::now(),
            },
        );
    }

    pub fn clear(&self) {
        self.inner.lock().entries.clear();
    }

    pub fn stats(&self) -> ResultCacheStats {
        let inner = self.inner.lock();
        let valid = inner
            .entries
            .values()
            .filter(|e| e.stored_at.elapsed() < self.ttl)
            .count();
        ResultCacheStats {
            total: inner.entries.len(),
            valid,
            expired: inner.entries.len() - valid,
            ttl: self.ttl,
        }
    }

    fn maybe_cleanup(&self, inner: &mut Inner) {
        if inner.last_cleanup.elapsed() < self.cleanup_interval {
            return;
        }
        let before = inner.entries.len();
        let ttl = self.ttl;
        inner.entries.retain(|_, e| e.stored_at.elapsed() < ttl);
        inner.last_cleanup = Instant::now();

        let removed = before - inner.entries.len();
        if removed > 0 {
            debug!("Swept {removed} expired search responses");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SearchRequest;

    fn response(query: &str) -> SearchResponse {
        SearchResponse::new(query, Vec::new())
    }

    fn search(q: &str) -> ValidSearch {
        SearchRequest::new(q).validated().unwrap()
    }

    #[test]
    fn test_insert_and_get() {
        let cache = ResultCache::default();
        let key = ResultCache::key(&search("ai"), &[ArticleId::new("a")]);

        assert!(cache.get(&key).is_none());
        cache.insert(key.clone(), response("ai"));
        assert_eq!(cache.get(&key).unwrap().query, "ai");

        cache.clear();
        assert!(cache.get(&key).is_none());
    }

    #[test]
    fn test_key_covers_parameters_and_pool() {
        let ids = [ArticleId::new("a"), ArticleId::new("b")];
        let base = ResultCache::key(&search("ai"), &ids);

        assert_eq!(base, ResultCache::key(&search("  ai "), &ids));
        assert_ne!(base, ResultCache::key(&search("ml"), &ids));
        assert_ne!(
            base,
            ResultCache::key(&SearchRequest::new("ai").with_num(5).validated().unwrap(), &ids)
        );
        assert_ne!(
            base,
            ResultCache::key(
                &SearchRequest::new("ai").with_early_stop(3).validated().unwrap(),
                &ids
            )
        );
        assert_ne!(base, ResultCache::key(&search("ai"), &ids[..1]));
        assert_ne!(
            base,
            ResultCache::key(&search("ai"), &[ids[1].clone(), ids[0].clone()])
        );
    }

    #[test]
    fn test_expired_entries() {
        let cache = ResultCache::new(Duration::from_millis(20), Duration::ZERO);
        cache.insert("k".to_string(), response("q"));

        std::thread::sleep(Duration::from_millis(40));
        let stats = cache.stats();
        assert_eq!(stats.total, 1);
        assert_eq!(stats.valid, 0);
        assert_eq!(stats.expired, 1);

        assert!(cache.get("k").is_none());
        assert_eq!(cache.stats().total, 0);
    }

    #[test]
    fn test_stats_report_ttl() {
        let cache = ResultCache::default();
        cache.insert("k".to_string(), response("q"));
        let stats = cache.stats();
        assert_eq!(stats.total, 1);
        assert_eq!(stats.valid, 1);
        assert_eq!(stats.ttl, Duration::from_secs(300));
    }
}
