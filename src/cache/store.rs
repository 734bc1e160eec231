//! Cache Store Module
//!
//! Thread-safe wrapper around the expiring LRU with an index of TTL-carrying keys.

use std::collections::HashSet;

use bytes::Bytes;
use parking_lot::Mutex;
use rand::seq::SliceRandom;
use tracing::debug;

use crate::cache::entry::expiry_from_ttl;
use crate::cache::{CacheEntry, CacheStats, ExpiringLruCache};

// == Inner State ==
#[derive(Debug)]
struct Inner {
    lru: ExpiringLruCache,
    /// Keys whose entry currently carries a TTL
    ttl_keys: HashSet<String>,
    stats: CacheStats,
}

impl Inner {
    fn forget_evicted(&mut self, evicted: &[String]) {
        for key in evicted {
            self.ttl_keys.remove(key);
        }
        self.stats.record_evictions(evicted.len());
    }
}

// == Cache Store ==
/// Synchronized cache used by a group for its primary and hot tiers.
///
/// A single mutex guards every read and write. The side index of TTL keys
/// lets the active sweep sample expiring keys without walking the whole cache.
#[derive(Debug)]
pub struct CacheStore {
    inner: Mutex<Inner>,
}

impl CacheStore {
    // == Constructor ==
    /// Creates a store bounded to `capacity` bytes (0 = unbounded).
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                lru: ExpiringLruCache::new(capacity),
                ttl_keys: HashSet::new(),
                stats: CacheStats::new(),
            }),
        }
    }

    // == Add ==
    /// Stores a copy of `value` under `key`; `ttl_seconds == 0` means no expiry.
    pub fn add(&self, key: &str, value: &[u8], ttl_seconds: u64) {
        let value = Bytes::copy_from_slice(value);
        let expires_at = expiry_from_ttl(ttl_seconds);

        let mut inner = self.inner.lock();
        let evicted = inner.lru.add(key, value, expires_at);
        inner.forget_evicted(&evicted);

        if expires_at.is_some() && inner.lru.contains(key) {
            inner.ttl_keys.insert(key.to_string());
        } else {
            inner.ttl_keys.remove(key);
        }
    }

    // == Get ==
    /// Returns the payload and remaining TTL seconds of a live entry.
    pub fn get(&self, key: &str) -> Option<(Bytes, u64)> {
        self.get_entry(key)
            .map(|entry| (entry.value.clone(), entry.ttl_remaining()))
    }

    /// Same lookup as [`CacheStore::get`], returning the whole entry so the
    /// caller can read its expiry.
    pub fn get_entry(&self, key: &str) -> Option<CacheEntry> {
        let mut inner = self.inner.lock();

        if inner.lru.is_expired(key) {
            inner.lru.remove_key(key);
            inner.ttl_keys.remove(key);
            inner.stats.record_expirations(1);
            inner.stats.record_miss();
            return None;
        }

        match inner.lru.get_entry(key).cloned() {
            Some(hit) => {
                inner.stats.record_hit();
                Some(hit)
            }
            None => {
                inner.stats.record_miss();
                None
            }
        }
    }

    // == Delete ==
    /// Removes an entry, returning whether it was present.
    pub fn delete(&self, key: &str) -> bool {
        let mut inner = self.inner.lock();
        inner.ttl_keys.remove(key);
        inner.lru.remove_key(key).is_some()
    }

    // == Contains ==
    /// True if a live entry exists. Does not count as a hit or touch recency.
    pub fn contains(&self, key: &str) -> bool {
        self.inner.lock().lru.contains(key)
    }

    // == Sweep Expired ==
    /// Active expiration pass over a random sample of the TTL keys.
    ///
    /// Samples `ceil(n / 5)` keys and removes the expired ones. Expired keys
    /// outside the sample stay until a later pass or a read reclaims them.
    /// Returns the number of entries removed.
    pub fn sweep_expired(&self) -> usize {
        let mut inner = self.inner.lock();

        let total = inner.ttl_keys.len();
        if total == 0 {
            return 0;
        }

        let mut keys: Vec<String> = inner.ttl_keys.iter().cloned().collect();
        keys.shuffle(&mut rand::thread_rng());
        keys.truncate(total.div_ceil(5));

        let mut removed = 0;
        for key in keys {
            if inner.lru.is_expired(&key) {
                inner.lru.remove_key(&key);
                inner.ttl_keys.remove(&key);
                removed += 1;
            }
        }

        inner.stats.record_expirations(removed);
        debug!(sampled = total.div_ceil(5), removed, "expiry sweep pass");
        removed
    }

    // == Stats ==
    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock();
        let mut stats = inner.stats.clone();
        stats.total_entries = inner.lru.len();
        stats.size_bytes = inner.lru.size_bytes();
        stats.capacity_bytes = inner.lru.capacity();
        stats
    }

    pub fn len(&self) -> usize {
        self.inner.lock().lru.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().lru.is_empty()
    }

    pub fn size_bytes(&self) -> usize {
        self.inner.lock().lru.size_bytes()
    }

    /// Number of keys currently tracked as carrying a TTL.
    pub fn ttl_key_count(&self) -> usize {
        self.inner.lock().ttl_keys.len()
    }
}

#[cfg(test)]
impl CacheStore {
    /// Inserts an entry with an explicit absolute expiry, bypassing the TTL conversion.
    pub(crate) fn add_with_expiry(&self, key: &str, value: &[u8], expires_at: Option<u64>) {
        let mut inner = self.inner.lock();
        let evicted = inner
            .lru
            .add(key, Bytes::copy_from_slice(value), expires_at);
        inner.forget_evicted(&evicted);
        if expires_at.is_some() {
            inner.ttl_keys.insert(key.to_string());
        } else {
            inner.ttl_keys.remove(key);
        }
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::entry::current_timestamp_ms;
    use crate::cache::ENTRY_OVERHEAD;

    fn past() -> Option<u64> {
        Some(current_timestamp_ms() - 1000)
    }

    #[test]
    fn test_store_add_and_get() {
        let store = CacheStore::new(0);

        store.add("a", b"abc", 0);
        let (value, ttl) = store.get("a").unwrap();

        assert_eq!(&value[..], b"abc");
        assert_eq!(ttl, 0);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_store_copies_caller_buffer() {
        let store = CacheStore::new(0);
        let mut buf = b"abc".to_vec();

        store.add("a", &buf, 0);
        buf[0] = b'z';

        assert_eq!(&store.get("a").unwrap().0[..], b"abc");
    }

    #[test]
    fn test_ttl_index_follows_entries() {
        let store = CacheStore::new(0);

        store.add("t", b"v", 60);
        store.add("p", b"v", 0);
        assert_eq!(store.ttl_key_count(), 1);

        store.add("t", b"v", 0);
        assert_eq!(store.ttl_key_count(), 0);

        store.add("t", b"v", 60);
        assert!(store.delete("t"));
        assert_eq!(store.ttl_key_count(), 0);
        assert!(!store.delete("t"));
    }

    #[test]
    fn test_evicted_ttl_key_leaves_index() {
        let per_entry = 1 + 1 + ENTRY_OVERHEAD;
        let store = CacheStore::new(per_entry);

        store.add("a", b"1", 60);
        store.add("b", b"2", 0);

        assert_eq!(store.ttl_key_count(), 0);
        assert_eq!(store.stats().evictions, 1);
    }

    #[test]
    fn test_expired_get_misses_and_cleans_index() {
        let store = CacheStore::new(0);

        store.add_with_expiry("k", b"v", past());
        assert!(store.get("k").is_none());

        assert!(store.is_empty());
        assert_eq!(store.size_bytes(), 0);
        assert_eq!(store.ttl_key_count(), 0);

        let stats = store.stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.expirations, 1);
    }

    #[test]
    fn test_sweep_noop_without_ttl_keys() {
        let store = CacheStore::new(0);
        store.add("a", b"v", 0);

        assert_eq!(store.sweep_expired(), 0);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_sweep_single_expired_key_is_always_sampled() {
        let store = CacheStore::new(0);
        store.add_with_expiry("k", b"v", past());

        assert_eq!(store.sweep_expired(), 1);
        assert!(store.is_empty());
    }

    #[test]
    fn test_repeated_sweeps_reclaim_all_expired() {
        let store = CacheStore::new(0);
        for i in 0..20 {
            store.add_with_expiry(&format!("old{}", i), b"v", past());
        }
        store.add("live", b"v", 3600);

        let mut removed = 0;
        for _ in 0..200 {
            removed += store.sweep_expired();
            if store.ttl_key_count() == 1 {
                break;
            }
        }

        assert_eq!(removed, 20);
        assert!(store.contains("live"));
        assert_eq!(store.ttl_key_count(), 1);
    }

    #[test]
    fn test_sweep_leaves_live_keys() {
        let store = CacheStore::new(0);
        store.add("a", b"v", 3600);
        store.add("b", b"v", 3600);

        assert_eq!(store.sweep_expired(), 0);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_store_stats_counts_hits_and_misses() {
        let store = CacheStore::new(0);

        store.add("key1", b"value1", 0);
        store.get("key1");
        store.get("nonexistent");

        let stats = store.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.total_entries, 1);
        assert_eq!(stats.size_bytes, 4 + 6 + ENTRY_OVERHEAD);
    }
}
