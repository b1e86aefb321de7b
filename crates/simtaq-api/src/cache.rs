//! In-memory TTL cache for dashboard aggregates.
//!
//! Entries expire on read; nothing evicts in the background. Mutating handlers
//! call [`TtlCache::invalidate_prefix`] for the keys they affect.

use dashmap::DashMap;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Key prefix for admin dashboard statistics.
pub const ADMIN_STATS: &str = "admin:stats";
/// Key prefix for per-teacher dashboards, suffixed with the guru id.
pub const GURU_STATS: &str = "guru:stats:";

#[derive(Clone, Debug)]
struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}

/// Thread-safe cache keyed by string.
#[derive(Clone)]
pub struct TtlCache<V> {
    store: Arc<DashMap<String, CacheEntry<V>>>,
    ttl: Duration,
    hits: Arc<AtomicU64>,
    misses: Arc<AtomicU64>,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            store: Arc::new(DashMap::new()),
            ttl,
            hits: Arc::new(AtomicU64::new(0)),
            misses: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        let value = self
            .store
            .get(key)
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| entry.value.clone());
        if value.is_none() {
            self.store.remove_if(key, |_, entry| entry.is_expired(now));
        }

        match value {
            Some(v) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(key, "cache hit");
                Some(v)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(key, "cache miss");
                None
            }
        }
    }

    pub fn set(&self, key: impl Into<String>, value: V) {
        self.set_with_ttl(key, value, self.ttl);
    }

    pub fn set_with_ttl(&self, key: impl Into<String>, value: V, ttl: Duration) {
        self.store.insert(
            key.into(),
            CacheEntry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    pub fn invalidate(&self, key: &str) {
        self.store.remove(key);
    }

    /// Drop every key starting with `prefix`.
    pub fn invalidate_prefix(&self, prefix: &str) {
        self.store.retain(|key, _| !key.starts_with(prefix));
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.store.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hit_and_miss_are_counted() {
        let cache = TtlCache::new(Duration::from_secs(60));
        assert_eq!(cache.get("admin:stats"), None::<i32>);
        cache.set("admin:stats", 42);
        assert_eq!(cache.get("admin:stats"), Some(42));

        let stats = cache.stats();
        assert_eq!((stats.entries, stats.hits, stats.misses), (1, 1, 1));
    }

    #[test]
    fn expired_entry_is_removed_on_read() {
        let cache = TtlCache::new(Duration::from_secs(60));
        cache.set_with_ttl("k", "v", Duration::ZERO);
        assert_eq!(cache.get("k"), None);
        assert_eq!(cache.stats().entries, 0);
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn expired_read_does_not_block_other_threads() {
        let cache = TtlCache::new(Duration::from_secs(60));
        cache.set_with_ttl("k", 1, Duration::ZERO);

        let (tx, rx) = std::sync::mpsc::channel();
        let reader = cache.clone();
        std::thread::spawn(move || {
            let first = reader.get("k");
            reader.set("k", 2);
            tx.send((first, reader.get("k"))).unwrap();
        });

        let (first, second) = rx
            .recv_timeout(Duration::from_secs(5))
            .expect("get on an expired key returned");
        assert_eq!(first, None);
        assert_eq!(second, Some(2));
    }

    #[test]
    fn prefix_invalidation() {
        let cache = TtlCache::new(Duration::from_secs(60));
        cache.set(format!("{GURU_STATS}a"), 1);
        cache.set(format!("{GURU_STATS}b"), 2);
        cache.set(ADMIN_STATS, 3);

        cache.invalidate_prefix(GURU_STATS);
        assert_eq!(cache.stats().entries, 1);
        assert_eq!(cache.get(ADMIN_STATS), Some(3));

        cache.invalidate(ADMIN_STATS);
        assert_eq!(cache.stats().entries, 0);
    }
}
