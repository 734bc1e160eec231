//! Configuration Module
//!
//! Handles loading and validating node configuration from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::error::Result;
use crate::peers::validate_peer_addr;

/// Node configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Address this node listens on and advertises
    pub node_addr: String,
    /// Cluster members, this node included or not
    pub peers: Vec<String>,
    /// Name of the group served by the binary
    pub group_name: String,
    /// Primary cache bound in bytes (0 = unbounded)
    pub cache_bytes: usize,
    /// Expiry sweep interval in seconds
    pub sweep_interval: u64,
    /// Per-call peer timeout in seconds
    pub peer_timeout: u64,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `NODE_ADDR` - Listen/advertise address (default: 127.0.0.1:8001)
    /// - `PEERS` - Comma-separated `host:port` list (default: empty)
    /// - `GROUP_NAME` - Group served by this node (default: scores)
    /// - `CACHE_BYTES` - Primary cache capacity in bytes (default: 64 MiB)
    /// - `SWEEP_INTERVAL` - Expiry sweep interval in seconds (default: 5)
    /// - `PEER_TIMEOUT` - Peer call timeout in seconds (default: 10)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            node_addr: env::var("NODE_ADDR").unwrap_or(defaults.node_addr),
            peers: env::var("PEERS")
                .map(|v| parse_peers(&v))
                .unwrap_or(defaults.peers),
            group_name: env::var("GROUP_NAME").unwrap_or(defaults.group_name),
            cache_bytes: parse_var("CACHE_BYTES").unwrap_or(defaults.cache_bytes),
            sweep_interval: parse_var("SWEEP_INTERVAL").unwrap_or(defaults.sweep_interval),
            peer_timeout: parse_var("PEER_TIMEOUT").unwrap_or(defaults.peer_timeout),
        }
    }

    /// Rejects malformed addresses before anything is started.
    pub fn validate(&self) -> Result<()> {
        validate_peer_addr(&self.node_addr)?;
        for peer in &self.peers {
            validate_peer_addr(peer)?;
        }
        Ok(())
    }

    /// Initial cluster membership: the configured peers plus this node.
    pub fn members(&self) -> Vec<String> {
        let mut members = self.peers.clone();
        if !members.contains(&self.node_addr) {
            members.push(self.node_addr.clone());
        }
        members
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval.max(1))
    }

    pub fn peer_timeout(&self) -> Duration {
        Duration::from_secs(self.peer_timeout.max(1))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            node_addr: "127.0.0.1:8001".to_string(),
            peers: Vec::new(),
            group_name: "scores".to_string(),
            cache_bytes: 64 << 20,
            sweep_interval: 5,
            peer_timeout: 10,
        }
    }
}

fn parse_var<T: FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

fn parse_peers(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|peer| !peer.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CacheError;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.node_addr, "127.0.0.1:8001");
        assert!(config.peers.is_empty());
        assert_eq!(config.group_name, "scores");
        assert_eq!(config.sweep_interval(), Duration::from_secs(5));
        assert_eq!(config.peer_timeout(), Duration::from_secs(10));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_peers_trims_and_skips_blanks() {
        assert_eq!(
            parse_peers(" 127.0.0.1:8001, ,127.0.0.1:8002,"),
            vec!["127.0.0.1:8001".to_string(), "127.0.0.1:8002".to_string()]
        );
        assert!(parse_peers("").is_empty());
    }

    #[test]
    fn test_members_include_self_once() {
        let config = Config {
            node_addr: "127.0.0.1:8001".to_string(),
            peers: vec!["127.0.0.1:8001".to_string(), "127.0.0.1:8002".to_string()],
            ..Config::default()
        };
        assert_eq!(config.members().len(), 2);

        let config = Config {
            peers: vec!["127.0.0.1:8002".to_string()],
            ..Config::default()
        };
        assert_eq!(
            config.members(),
            vec!["127.0.0.1:8002".to_string(), "127.0.0.1:8001".to_string()]
        );
    }

    #[test]
    fn test_validate_rejects_bad_peer() {
        let config = Config {
            peers: vec!["127.0.0.1:8002".to_string(), "nope".to_string()],
            ..Config::default()
        };
        assert_eq!(
            config.validate(),
            Err(CacheError::InvalidAddress("nope".to_string()))
        );
    }
}
