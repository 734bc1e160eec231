//! Peers Module
//!
//! How a node locates the peer owning a key and calls it.
//!
//! - [`Peer`]: one remote node, reachable for fetch/store/delete
//! - [`Picker`]: resolves the owner of a key to a [`PeerPick`]
//! - [`HashRing`]: the consistent-hash ring behind the server's picker

mod client;
mod ring;

use std::net::{IpAddr, Ipv6Addr};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::{CacheError, Result};

pub use client::{HttpPeer, DEFAULT_PEER_TIMEOUT};
pub use ring::{HashRing, DEFAULT_REPLICAS};

// == Peer ==
/// A remote node able to serve cache calls for a group.
///
/// Every call is a single round trip bounded by the client's timeout.
#[async_trait]
pub trait Peer: Send + Sync {
    /// Fetches a value and its remaining TTL (0 = none) from the owning peer.
    async fn fetch(&self, group: &str, key: &str) -> Result<(Bytes, u64)>;

    /// Asks the owning peer to store a value.
    async fn store(
        &self,
        group: &str,
        key: &str,
        value: Bytes,
        ttl: u64,
        if_not_exists: bool,
    ) -> Result<()>;

    /// Asks the owning peer to delete a key.
    async fn delete(&self, group: &str, key: &str) -> Result<()>;

    /// Identity of the peer, its `host:port` address.
    fn addr(&self) -> &str;
}

// == Peer Pick ==
/// Where a key must be served.
#[derive(Clone)]
pub enum PeerPick {
    /// This node owns the key, or no peer is known
    Local,
    /// Another node owns the key
    Remote(Arc<dyn Peer>),
}

impl std::fmt::Debug for PeerPick {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PeerPick::Local => write!(f, "Local"),
            PeerPick::Remote(peer) => write!(f, "Remote({})", peer.addr()),
        }
    }
}

// == Picker ==
/// Resolves the node responsible for a key.
pub trait Picker: Send + Sync {
    fn pick(&self, key: &str) -> PeerPick;
}

/// Picker for a node without peers: every key is served locally.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalOnly;

impl Picker for LocalOnly {
    fn pick(&self, _key: &str) -> PeerPick {
        PeerPick::Local
    }
}

// == Address Validation ==
/// Checks that `addr` has the `host:port` shape.
///
/// The host may be `localhost`, an IP literal or a DNS name; the port must be
/// a non-zero u16.
pub fn validate_peer_addr(addr: &str) -> Result<()> {
    let invalid = || CacheError::InvalidAddress(addr.to_string());

    let (host, port) = addr.rsplit_once(':').ok_or_else(invalid)?;
    let port: u16 = port.parse().map_err(|_| invalid())?;
    if port == 0 || host.is_empty() {
        return Err(invalid());
    }

    // IPv6 literals must be bracketed.
    if let Some(inner) = host.strip_prefix('[') {
        return match inner.strip_suffix(']').map(str::parse::<Ipv6Addr>) {
            Some(Ok(_)) => Ok(()),
            _ => Err(invalid()),
        };
    }
    if host.contains(':') {
        return Err(invalid());
    }

    if host == "localhost" || host.parse::<IpAddr>().is_ok() {
        return Ok(());
    }

    let is_hostname = host.split('.').all(|label| {
        !label.is_empty()
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
    });
    if is_hostname {
        Ok(())
    } else {
        Err(invalid())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_addresses() {
        for addr in [
            "127.0.0.1:8001",
            "localhost:6324",
            "cache-1.internal:7000",
            "[::1]:9000",
        ] {
            assert!(validate_peer_addr(addr).is_ok(), "{} should be valid", addr);
        }
    }

    #[test]
    fn test_invalid_addresses() {
        for addr in [
            "",
            "127.0.0.1",
            ":8001",
            "127.0.0.1:",
            "127.0.0.1:0",
            "127.0.0.1:99999",
            "host name:80",
            "http://127.0.0.1:80",
            "bad_host:80",
            "::1:9000",
            "fe80::1:80",
            "[::1:9000",
            "[127.0.0.1]:80",
        ] {
            assert!(
                matches!(validate_peer_addr(addr), Err(CacheError::InvalidAddress(_))),
                "{} should be rejected",
                addr
            );
        }
    }

    #[test]
    fn test_local_only_picker() {
        assert!(matches!(LocalOnly.pick("k"), PeerPick::Local));
    }
}
