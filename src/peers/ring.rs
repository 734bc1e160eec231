//! Consistent Hash Ring
//!
//! Maps keys onto peer identities through virtual nodes so that a membership
//! change only relocates the keys adjacent to the affected positions.

use std::collections::BTreeMap;

use xxhash_rust::xxh3::xxh3_64;

/// Virtual nodes placed on the ring for every peer
pub const DEFAULT_REPLICAS: usize = 50;

// == Hash Ring ==
/// Sorted ring of virtual-node hashes, each pointing back at its peer.
#[derive(Debug, Clone)]
pub struct HashRing {
    replicas: usize,
    ring: BTreeMap<u64, String>,
    peers: Vec<String>,
}

impl HashRing {
    pub fn new(replicas: usize) -> Self {
        Self {
            replicas: replicas.max(1),
            ring: BTreeMap::new(),
            peers: Vec::new(),
        }
    }

    // == Register ==
    /// Replaces the ring contents with `peers`.
    ///
    /// Each peer is hashed as `"{replica}{peer}"` for every replica index.
    pub fn register<I, S>(&mut self, peers: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ring.clear();
        self.peers.clear();

        for peer in peers {
            let peer = peer.into();
            for replica in 0..self.replicas {
                let hash = xxh3_64(format!("{}{}", replica, peer).as_bytes());
                self.ring.insert(hash, peer.clone());
            }
            self.peers.push(peer);
        }
    }

    // == Get Peer ==
    /// Owner of `key`: the first ring position at or after the key hash,
    /// wrapping around to the smallest position. `None` on an empty ring.
    pub fn get_peer(&self, key: &str) -> Option<&str> {
        let hash = xxh3_64(key.as_bytes());
        self.ring
            .range(hash..)
            .next()
            .or_else(|| self.ring.iter().next())
            .map(|(_, peer)| peer.as_str())
    }

    /// Registered peers in registration order.
    pub fn peers(&self) -> &[String] {
        &self.peers
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }
}

impl Default for HashRing {
    fn default() -> Self {
        Self::new(DEFAULT_REPLICAS)
    }
}
