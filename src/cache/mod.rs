//! Content-addressed result cache with single-flight computation.
//!
//! Entries are keyed by (fingerprint, operation, canonical parameters). At
//! most one computation runs per key: concurrent callers for that key wait on
//! its in-flight cell, other keys proceed in parallel, and no lock is held
//! while a computation runs.

pub mod disk;

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

use dashmap::DashMap;
use lru::LruCache;
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::CacheComputationError;
use crate::source::Fingerprint;

pub use disk::DiskCache;

/// Default number of entries kept in memory.
pub const DEFAULT_MAX_ENTRIES: usize = 512;

/// Identity of a cached computation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    fingerprint: Fingerprint,
    operation: String,
    params: String,
}

impl CacheKey {
    /// Build a key. Parameters are rendered as JSON, so types with a fixed
    /// field order give one canonical key per value.
    pub fn new<P: Serialize + ?Sized>(
        fingerprint: Fingerprint,
        operation: &str,
        params: &P,
    ) -> Result<Self, CacheComputationError> {
        let params = serde_json::to_string(params).map_err(|e| CacheComputationError {
            operation: operation.to_string(),
            message: format!("cannot serialize cache key parameters: {}", e),
        })?;
        Ok(Self {
            fingerprint,
            operation: operation.to_string(),
            params,
        })
    }

    pub fn fingerprint(&self) -> Fingerprint {
        self.fingerprint
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Canonical parameter text.
    pub fn params(&self) -> &str {
        &self.params
    }
}

/// Bookkeeping kept alongside a cached value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryMeta {
    pub created_at: SystemTime,
    pub hits: u64,
}

struct CacheEntry<V> {
    value: V,
    meta: EntryMeta,
}

/// Counter snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub computations: u64,
    pub evictions: u64,
    pub invalidations: u64,
    pub entries: usize,
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    computations: AtomicU64,
    evictions: AtomicU64,
    invalidations: AtomicU64,
}

type Inflight<V> = DashMap<CacheKey, Arc<OnceCell<V>>>;

/// Removes a key's in-flight cell once its owner is done with it, including
/// on unwind.
struct InflightGuard<'a, V> {
    inflight: &'a Inflight<V>,
    key: &'a CacheKey,
    cell: Arc<OnceCell<V>>,
}

impl<V> Drop for InflightGuard<'_, V> {
    fn drop(&mut self) {
        self.inflight
            .remove_if(self.key, |_, cell| Arc::ptr_eq(cell, &self.cell));
    }
}

/// Bounded LRU cache with per-key single-flight.
pub struct CacheService<V> {
    entries: Mutex<LruCache<CacheKey, CacheEntry<V>>>,
    inflight: Inflight<V>,
    /// Last fingerprint seen per path, bounded like `entries`.
    paths: Mutex<LruCache<String, Fingerprint>>,
    counters: Counters,
}

impl<V: Clone> CacheService<V> {
    /// A cache holding at most `max_entries` values (at least one).
    pub fn new(max_entries: usize) -> Self {
        let capacity = NonZeroUsize::new(max_entries).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            inflight: DashMap::new(),
            paths: Mutex::new(LruCache::new(capacity)),
            counters: Counters::default(),
        }
    }

    /// Cached value for `key`, counting a hit.
    pub fn get(&self, key: &CacheKey) -> Option<V> {
        let mut entries = self.entries.lock();
        let entry = entries.get_mut(key)?;
        entry.meta.hits += 1;
        self.counters.hits.fetch_add(1, Ordering::Relaxed);
        Some(entry.value.clone())
    }

    /// Metadata for a cached key, without touching recency.
    pub fn meta(&self, key: &CacheKey) -> Option<EntryMeta> {
        self.entries.lock().peek(key).map(|e| e.meta)
    }

    /// Insert or replace a value.
    pub fn insert(&self, key: CacheKey, value: V) {
        let entry = CacheEntry {
            value,
            meta: EntryMeta {
                created_at: SystemTime::now(),
                hits: 0,
            },
        };
        let mut entries = self.entries.lock();
        let replaced = entries.contains(&key);
        if let Some((evicted, _)) = entries.push(key, entry) {
            if !replaced {
                tracing::debug!(operation = evicted.operation(), "cache entry evicted");
                self.counters.evictions.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Return the cached value for `key`, or run `compute` to produce it.
    ///
    /// Concurrent callers with the same key share one computation. A failed
    /// computation is not cached; the next waiting caller runs its own.
    pub fn get_or_compute<E, F>(&self, key: &CacheKey, compute: F) -> Result<V, E>
    where
        F: FnOnce() -> Result<V, E>,
    {
        if let Some(value) = self.get(key) {
            tracing::debug!(operation = key.operation(), fingerprint = ?key.fingerprint(), "cache hit");
            return Ok(value);
        }
        self.counters.misses.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(operation = key.operation(), fingerprint = ?key.fingerprint(), "cache miss");

        let cell = Arc::clone(
            self.inflight
                .entry(key.clone())
                .or_insert_with(|| Arc::new(OnceCell::new()))
                .value(),
        );
        let _guard = InflightGuard {
            inflight: &self.inflight,
            key,
            cell: Arc::clone(&cell),
        };

        let mut computed = false;
        let value = cell.get_or_try_init(|| {
            // Another caller may have finished between our miss and now
            if let Some(value) = self.get(key) {
                return Ok(value);
            }
            computed = true;
            self.counters.computations.fetch_add(1, Ordering::Relaxed);
            compute()
        })?;

        let value = value.clone();
        if computed {
            self.insert(key.clone(), value.clone());
        }
        Ok(value)
    }

    /// Record the current fingerprint of `path`. When it differs from the
    /// last one seen, every entry keyed by the old fingerprint is dropped.
    ///
    /// Returns the previous fingerprint when the content changed.
    pub fn observe(&self, path: &str, fingerprint: Fingerprint) -> Option<Fingerprint> {
        let previous = self.paths.lock().put(path.to_string(), fingerprint);
        match previous {
            Some(old) if old != fingerprint => {
                let dropped = self.invalidate(old);
                tracing::debug!(path, dropped, "content changed, cache entries invalidated");
                Some(old)
            }
            _ => None,
        }
    }

    /// Drop every entry for a fingerprint. Returns how many were removed.
    pub fn invalidate(&self, fingerprint: Fingerprint) -> usize {
        let mut entries = self.entries.lock();
        let stale: Vec<CacheKey> = entries
            .iter()
            .filter(|(k, _)| k.fingerprint == fingerprint)
            .map(|(k, _)| k.clone())
            .collect();
        for key in &stale {
            entries.pop(key);
        }
        self.counters
            .invalidations
            .fetch_add(stale.len() as u64, Ordering::Relaxed);
        stale.len()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
        self.paths.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            computations: self.counters.computations.load(Ordering::Relaxed),
            evictions: self.counters.evictions.load(Ordering::Relaxed),
            invalidations: self.counters.invalidations.load(Ordering::Relaxed),
            entries: self.len(),
        }
    }
}

impl<V: Clone> Default for CacheService<V> {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ENTRIES)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Barrier;
    use std::thread;
    use std::time::Duration;

    use super::*;

    fn key(content: &str, op: &str) -> CacheKey {
        CacheKey::new(Fingerprint::of(content.as_bytes()), op, &("python", 1)).unwrap()
    }

    #[test]
    fn test_key_is_canonical() {
        let a = CacheKey::new(Fingerprint::of(b"x"), "extract", &vec!["function", "class"]).unwrap();
        let b = CacheKey::new(Fingerprint::of(b"x"), "extract", &vec!["function", "class"]).unwrap();
        let c = CacheKey::new(Fingerprint::of(b"x"), "extract", &vec!["class", "function"]).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.params(), r#"["function","class"]"#);
    }

    #[test]
    fn test_unserializable_key_is_error() {
        let mut params = HashMap::new();
        params.insert((1, 2), "tuple keys are not JSON");
        let err = CacheKey::new(Fingerprint::of(b"x"), "query", &params).unwrap_err();
        assert_eq!(err.operation, "query");
    }

    #[test]
    fn test_hit_after_compute() {
        let cache: CacheService<String> = CacheService::new(8);
        let k = key("a", "parse");
        let v: Result<String, ()> = cache.get_or_compute(&k, || Ok("tree".to_string()));
        assert_eq!(v.unwrap(), "tree");
        let v: Result<String, ()> = cache.get_or_compute(&k, || panic!("should be cached"));
        assert_eq!(v.unwrap(), "tree");

        let stats = cache.stats();
        assert_eq!(stats.computations, 1);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(cache.meta(&k).unwrap().hits, 1);
    }

    #[test]
    fn test_failure_is_not_cached() {
        let cache: CacheService<u32> = CacheService::new(8);
        let k = key("a", "parse");
        let first: Result<u32, &str> = cache.get_or_compute(&k, || Err("boom"));
        assert_eq!(first, Err("boom"));
        let second: Result<u32, &str> = cache.get_or_compute(&k, || Ok(7));
        assert_eq!(second, Ok(7));
        assert_eq!(cache.stats().computations, 2);
    }

    #[test]
    fn test_single_flight() {
        let cache: Arc<CacheService<u32>> = Arc::new(CacheService::new(8));
        let runs = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(Barrier::new(8));
        let k = key("shared", "extract");

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let runs = Arc::clone(&runs);
                let barrier = Arc::clone(&barrier);
                let k = k.clone();
                thread::spawn(move || {
                    barrier.wait();
                    cache
                        .get_or_compute(&k, || -> Result<u32, ()> {
                            runs.fetch_add(1, Ordering::SeqCst);
                            thread::sleep(Duration::from_millis(50));
                            Ok(42)
                        })
                        .unwrap()
                })
            })
            .collect();

        for h in handles {
            assert_eq!(h.join().unwrap(), 42);
        }
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(cache.stats().computations, 1);
    }

    #[test]
    fn test_lru_eviction() {
        let cache: CacheService<u32> = CacheService::new(2);
        cache.insert(key("a", "op"), 1);
        cache.insert(key("b", "op"), 2);
        cache.insert(key("c", "op"), 3);
        assert_eq!(cache.len(), 2);
        assert!(cache.get(&key("a", "op")).is_none());
        assert_eq!(cache.stats().evictions, 1);

        // Replacing a key is not an eviction
        cache.insert(key("c", "op"), 4);
        assert_eq!(cache.stats().evictions, 1);
        assert_eq!(cache.get(&key("c", "op")), Some(4));
    }

    #[test]
    fn test_observe_invalidates_old_fingerprint() {
        let cache: CacheService<u32> = CacheService::new(8);
        let old = Fingerprint::of(b"v1");
        let new = Fingerprint::of(b"v2");
        assert_eq!(cache.observe("a.py", old), None);
        cache.insert(CacheKey::new(old, "parse", &()).unwrap(), 1);
        cache.insert(CacheKey::new(old, "extract", &()).unwrap(), 2);

        assert_eq!(cache.observe("a.py", old), None);
        assert_eq!(cache.len(), 2);

        assert_eq!(cache.observe("a.py", new), Some(old));
        assert!(cache.is_empty());
        assert_eq!(cache.stats().invalidations, 2);
    }

    #[test]
    fn test_tracked_paths_are_bounded() {
        let cache: CacheService<u32> = CacheService::new(2);
        for i in 0..10 {
            let path = format!("f{}.py", i);
            cache.observe(&path, Fingerprint::of(path.as_bytes()));
        }
        assert_eq!(cache.paths.lock().len(), 2);

        // The oldest path was forgotten, so a change to it goes unnoticed
        assert_eq!(cache.observe("f0.py", Fingerprint::of(b"changed")), None);
        assert_eq!(
            cache.observe("f9.py", Fingerprint::of(b"changed")),
            Some(Fingerprint::of(b"f9.py"))
        );
    }
}
