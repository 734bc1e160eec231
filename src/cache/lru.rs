//! Expiring LRU Module
//!
//! Byte-bounded LRU cache with per-entry expiry.
//!
//! Recency is kept in a doubly linked list whose nodes live in a slot arena,
//! so promotion and removal are O(1) without unsafe pointer juggling. The
//! cache does no locking of its own; see [`CacheStore`](super::CacheStore)
//! for the synchronized wrapper.

use std::collections::HashMap;

use bytes::Bytes;
use tracing::debug;

use crate::cache::entry::{entry_charge, CacheEntry};

// == List Node ==
#[derive(Debug)]
struct Node {
    key: String,
    entry: CacheEntry,
    prev: Option<usize>,
    next: Option<usize>,
}

// == Expiring LRU Cache ==
/// Capacity-bounded store evicting least recently used entries.
///
/// Every indexed key owns exactly one slot in the recency list and every
/// occupied slot is indexed. `size` is the sum of the charges of all entries.
#[derive(Debug)]
pub struct ExpiringLruCache {
    /// Maximum size in bytes, 0 = unbounded
    capacity: usize,
    /// Current size in bytes
    size: usize,
    /// Key to slot index
    index: HashMap<String, usize>,
    /// Node arena
    slots: Vec<Option<Node>>,
    /// Reusable slot indices
    free: Vec<usize>,
    /// Most recently used
    head: Option<usize>,
    /// Least recently used
    tail: Option<usize>,
}

impl ExpiringLruCache {
    // == Constructor ==
    /// Creates an empty cache bounded to `capacity` bytes (0 = unbounded).
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            size: 0,
            index: HashMap::new(),
            slots: Vec::new(),
            free: Vec::new(),
            head: None,
            tail: None,
        }
    }

    // == Add ==
    /// Inserts or updates an entry and returns the keys evicted to make room.
    ///
    /// An update promotes the key, applies the size delta and overwrites the
    /// expiry (`None` clears it). An entry larger than the whole capacity is
    /// not stored, and any previous value under its key is dropped.
    pub fn add(&mut self, key: &str, value: Bytes, expires_at: Option<u64>) -> Vec<String> {
        let charge = entry_charge(key, value.len());
        let mut evicted = Vec::new();

        if self.capacity != 0 && charge > self.capacity {
            debug!(key, charge, capacity = self.capacity, "entry larger than cache, not stored");
            self.remove_key(key);
            return evicted;
        }

        if let Some(&idx) = self.index.get(key) {
            self.detach(idx);
            self.push_front(idx);
            if let Some(node) = self.slots[idx].as_mut() {
                let old_charge = node.entry.charge(key);
                node.entry = CacheEntry { value, expires_at };
                self.size = self.size - old_charge + charge;
            }
            // The updated node sits at the head, so the tail loop never reaches it
            // unless it is the only entry, which fits by the check above.
            while self.capacity != 0 && self.size > self.capacity && self.tail != Some(idx) {
                match self.remove_oldest() {
                    Some((k, _)) => evicted.push(k),
                    None => break,
                }
            }
            return evicted;
        }

        while self.capacity != 0 && self.size + charge > self.capacity {
            match self.remove_oldest() {
                Some((k, _)) => evicted.push(k),
                None => break,
            }
        }

        let node = Node {
            key: key.to_string(),
            entry: CacheEntry { value, expires_at },
            prev: None,
            next: None,
        };
        let idx = self.alloc(node);
        self.push_front(idx);
        self.index.insert(key.to_string(), idx);
        self.size += charge;

        evicted
    }

    // == Get ==
    /// Looks a key up, returning its payload and remaining TTL in seconds.
    ///
    /// Expired entries are removed and reported as absent. A hit promotes
    /// the entry to most recently used.
    pub fn get(&mut self, key: &str) -> Option<(Bytes, u64)> {
        self.get_entry(key)
            .map(|entry| (entry.value.clone(), entry.ttl_remaining()))
    }

    /// Same lookup as [`ExpiringLruCache::get`], returning the whole entry.
    pub fn get_entry(&mut self, key: &str) -> Option<&CacheEntry> {
        let idx = *self.index.get(key)?;

        if self.slots[idx].as_ref().is_some_and(|n| n.entry.is_expired()) {
            debug!(key, "entry expired on read");
            self.remove_key(key);
            return None;
        }

        self.detach(idx);
        self.push_front(idx);
        self.slots[idx].as_ref().map(|n| &n.entry)
    }

    // == Remove Oldest ==
    /// Evicts the least recently used entry unconditionally.
    pub fn remove_oldest(&mut self) -> Option<(String, CacheEntry)> {
        let idx = self.tail?;
        let node = self.release(idx)?;
        self.index.remove(&node.key);
        self.size -= node.entry.charge(&node.key);
        Some((node.key, node.entry))
    }

    // == Remove Key ==
    /// Removes a specific entry wherever it sits in the recency order.
    pub fn remove_key(&mut self, key: &str) -> Option<CacheEntry> {
        let idx = self.index.remove(key)?;
        let node = self.release(idx)?;
        self.size -= node.entry.charge(&node.key);
        Some(node.entry)
    }

    // == Is Expired ==
    /// True iff the key exists, carries an expiry and that expiry has passed.
    ///
    /// Never mutates the cache.
    pub fn is_expired(&self, key: &str) -> bool {
        self.index
            .get(key)
            .and_then(|&idx| self.slots[idx].as_ref())
            .is_some_and(|n| n.entry.is_expired())
    }

    // == Contains ==
    /// True if the key is present and not expired. Does not touch recency.
    pub fn contains(&self, key: &str) -> bool {
        self.index.contains_key(key) && !self.is_expired(key)
    }

    /// Number of stored entries, expired ones included until reclaimed.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Bytes currently charged against the capacity.
    pub fn size_bytes(&self) -> usize {
        self.size
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    // == Arena Helpers ==
    fn alloc(&mut self, node: Node) -> usize {
        match self.free.pop() {
            Some(idx) => {
                self.slots[idx] = Some(node);
                idx
            }
            None => {
                self.slots.push(Some(node));
                self.slots.len() - 1
            }
        }
    }

    fn release(&mut self, idx: usize) -> Option<Node> {
        self.detach(idx);
        let node = self.slots[idx].take()?;
        self.free.push(idx);
        Some(node)
    }

    fn detach(&mut self, idx: usize) {
        let (prev, next) = match self.slots[idx].as_ref() {
            Some(n) => (n.prev, n.next),
            None => return,
        };

        match prev {
            Some(p) => {
                if let Some(n) = self.slots[p].as_mut() {
                    n.next = next;
                }
            }
            None => self.head = next,
        }
        match next {
            Some(nx) => {
                if let Some(n) = self.slots[nx].as_mut() {
                    n.prev = prev;
                }
            }
            None => self.tail = prev,
        }

        if let Some(n) = self.slots[idx].as_mut() {
            n.prev = None;
            n.next = None;
        }
    }

    fn push_front(&mut self, idx: usize) {
        let old_head = self.head;
        if let Some(n) = self.slots[idx].as_mut() {
            n.prev = None;
            n.next = old_head;
        }
        if let Some(h) = old_head {
            if let Some(n) = self.slots[h].as_mut() {
                n.prev = Some(idx);
            }
        }
        self.head = Some(idx);
        if self.tail.is_none() {
            self.tail = Some(idx);
        }
    }
}

#[cfg(test)]
impl ExpiringLruCache {
    /// Keys from most to least recently used.
    pub(crate) fn keys_by_recency(&self) -> Vec<String> {
        let mut keys = Vec::with_capacity(self.len());
        let mut cursor = self.head;
        while let Some(idx) = cursor {
            let node = self.slots[idx].as_ref().expect("linked slot is occupied");
            keys.push(node.key.clone());
            cursor = node.next;
        }
        keys
    }
}
