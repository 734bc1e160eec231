//! Server Module
//!
//! One node of the cluster: serves the peer API for the groups of this
//! process and picks the owner of a key from the current membership.
//!
//! # Lifecycle
//! - stopped -> running: bind the listener, serve, advertise, watch membership
//! - running -> stopped: withdraw, stop serving, release the listener
//!
//! Every membership change rebuilds the hash ring and the client handles
//! wholesale.

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::net::TcpListener;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::api::{create_router, ApiState};
use crate::error::{CacheError, Result};
use crate::group::GroupRegistry;
use crate::peers::{validate_peer_addr, HashRing, HttpPeer, PeerPick, Picker};
use crate::registry::{Members, Registry, SERVICE_NAME};

/// Time allowed for in-flight requests to drain on stop
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

// == Peer Set ==
/// Ring and client handles, always replaced together.
#[derive(Default)]
struct PeerSet {
    ring: HashRing,
    clients: HashMap<String, Arc<HttpPeer>>,
}

// == Running State ==
struct Running {
    shutdown: oneshot::Sender<()>,
    serve: JoinHandle<()>,
    watcher: JoinHandle<()>,
}

// == Server ==
pub struct Server {
    /// This node's identity, `host:port`
    addr: String,
    registry: Arc<dyn Registry>,
    http_client: reqwest::Client,
    peer_timeout: Duration,
    peers: Mutex<PeerSet>,
    running: tokio::sync::Mutex<Option<Running>>,
}

impl Server {
    // == Constructor ==
    /// Creates a stopped server for `addr`, rejecting malformed addresses.
    pub fn new(
        addr: impl Into<String>,
        registry: Arc<dyn Registry>,
        peer_timeout: Duration,
    ) -> Result<Arc<Self>> {
        let addr = addr.into();
        validate_peer_addr(&addr)?;

        Ok(Arc::new(Self {
            addr,
            registry,
            http_client: reqwest::Client::new(),
            peer_timeout,
            peers: Mutex::new(PeerSet::default()),
            running: tokio::sync::Mutex::new(None),
        }))
    }

    // == Start ==
    /// Starts serving `groups` and joins the cluster.
    ///
    /// Fails with `AlreadyRunning` when started twice and with `Bind` when the
    /// listener cannot be opened.
    pub async fn start(self: &Arc<Self>, groups: GroupRegistry) -> Result<()> {
        let mut running = self.running.lock().await;
        if running.is_some() {
            return Err(CacheError::AlreadyRunning(self.addr.clone()));
        }

        let listener = TcpListener::bind(&self.addr)
            .await
            .map_err(|e| CacheError::Bind(format!("{}: {}", self.addr, e)))?;
        let app = create_router(ApiState::new(groups, self.clone()));

        let (shutdown, stop_signal) = oneshot::channel::<()>();
        let addr = self.addr.clone();
        let serve = tokio::spawn(async move {
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = stop_signal.await;
                })
                .await;
            if let Err(e) = result {
                error!(addr = %addr, "peer api stopped with error: {}", e);
            }
        });

        let members = match self.join_cluster().await {
            Ok(members) => members,
            Err(e) => {
                let _ = shutdown.send(());
                let _ = serve.await;
                return Err(e);
            }
        };
        let watcher = self.spawn_membership_watch(members);

        *running = Some(Running {
            shutdown,
            serve,
            watcher,
        });
        info!(addr = %self.addr, "cache server running");
        Ok(())
    }

    async fn join_cluster(&self) -> Result<watch::Receiver<Members>> {
        self.registry.advertise(SERVICE_NAME, &self.addr).await?;
        match self.registry.watch(SERVICE_NAME).await {
            Ok(members) => Ok(members),
            Err(e) => {
                let _ = self.registry.withdraw(SERVICE_NAME, &self.addr).await;
                Err(e)
            }
        }
    }

    /// Applies the current member set, then every change, until the
    /// registry goes away or the server is dropped.
    fn spawn_membership_watch(
        self: &Arc<Self>,
        mut members: watch::Receiver<Members>,
    ) -> JoinHandle<()> {
        let server: Weak<Self> = Arc::downgrade(self);

        tokio::spawn(async move {
            loop {
                let current: Vec<String> = members.borrow_and_update().iter().cloned().collect();
                match server.upgrade() {
                    Some(server) => server.set_peers(current),
                    None => break,
                }
                if members.changed().await.is_err() {
                    debug!("membership watch closed");
                    break;
                }
            }
        })
    }

    // == Set Peers ==
    /// Replaces the ring and the client handles with `peers`.
    ///
    /// Addresses that are not `host:port` are skipped.
    pub fn set_peers(&self, peers: Vec<String>) {
        let mut valid = Vec::with_capacity(peers.len());
        for peer in peers {
            match validate_peer_addr(&peer) {
                Ok(()) => valid.push(peer),
                Err(e) => warn!(addr = %self.addr, "skipping peer: {}", e),
            }
        }

        let mut ring = HashRing::default();
        ring.register(valid.iter().cloned());
        let clients = valid
            .iter()
            .filter(|peer| **peer != self.addr)
            .map(|peer| {
                let client =
                    HttpPeer::new(peer.clone(), self.http_client.clone(), self.peer_timeout);
                (peer.clone(), Arc::new(client))
            })
            .collect();

        info!(addr = %self.addr, peers = ?valid, "peer set updated");
        *self.peers.lock() = PeerSet { ring, clients };
    }

    // == Stop ==
    /// Leaves the cluster and stops serving. A no-op when stopped.
    pub async fn stop(&self) {
        let Some(running) = self.running.lock().await.take() else {
            return;
        };

        if let Err(e) = self.registry.withdraw(SERVICE_NAME, &self.addr).await {
            warn!(addr = %self.addr, "withdraw failed: {}", e);
        }
        running.watcher.abort();
        let _ = running.watcher.await;
        let _ = running.shutdown.send(());

        let serve = running.serve.abort_handle();
        if tokio::time::timeout(SHUTDOWN_GRACE, running.serve).await.is_err() {
            warn!(addr = %self.addr, "peer api did not drain in time, aborting");
            serve.abort();
        }

        *self.peers.lock() = PeerSet::default();
        info!(addr = %self.addr, "cache server stopped, listener released");
    }

    pub async fn is_running(&self) -> bool {
        self.running.lock().await.is_some()
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Current ring members, this node included when advertised.
    pub fn peers(&self) -> Vec<String> {
        self.peers.lock().ring.peers().to_vec()
    }
}

impl Picker for Server {
    fn pick(&self, key: &str) -> PeerPick {
        let peers = self.peers.lock();

        match peers.ring.get_peer(key) {
            None => PeerPick::Local,
            Some(owner) if owner == self.addr => {
                debug!(addr = %self.addr, key, "pick myself");
                PeerPick::Local
            }
            Some(owner) => match peers.clients.get(owner) {
                Some(client) => {
                    debug!(addr = %self.addr, key, peer = owner, "pick remote peer");
                    PeerPick::Remote(client.clone())
                }
                None => PeerPick::Local,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{MemoryRegistry, StaticRegistry};

    fn server(addr: &str, registry: Arc<dyn Registry>) -> Arc<Server> {
        Server::new(addr, registry, Duration::from_secs(1)).unwrap()
    }

    #[test]
    fn test_invalid_address_rejected() {
        let registry = Arc::new(StaticRegistry::new(Vec::<String>::new()));
        let result = Server::new("not-an-address", registry, Duration::from_secs(1));
        assert!(matches!(result, Err(CacheError::InvalidAddress(_))));
    }

    #[test]
    fn test_pick_with_no_peers_is_local() {
        let s = server("127.0.0.1:47001", Arc::new(StaticRegistry::new(Vec::<String>::new())));
        assert!(matches!(s.pick("any"), PeerPick::Local));
    }

    #[test]
    fn test_pick_self_is_local_and_others_remote() {
        let s = server("127.0.0.1:47001", Arc::new(StaticRegistry::new(Vec::<String>::new())));
        s.set_peers(vec!["127.0.0.1:47001".to_string(), "127.0.0.1:47002".to_string()]);

        let mut ring = HashRing::default();
        ring.register(["127.0.0.1:47001", "127.0.0.1:47002"]);

        for i in 0..100 {
            let key = format!("key{}", i);
            match (ring.get_peer(&key), s.pick(&key)) {
                (Some("127.0.0.1:47001"), PeerPick::Local) => {}
                (Some("127.0.0.1:47002"), PeerPick::Remote(peer)) => {
                    assert_eq!(peer.addr(), "127.0.0.1:47002");
                }
                (owner, pick) => panic!("owner {:?} picked as {:?}", owner, pick),
            }
        }
    }

    #[test]
    fn test_set_peers_skips_invalid_addresses() {
        let s = server("127.0.0.1:47001", Arc::new(StaticRegistry::new(Vec::<String>::new())));
        s.set_peers(vec!["127.0.0.1:47001".to_string(), "garbage".to_string()]);

        assert_eq!(s.peers(), vec!["127.0.0.1:47001".to_string()]);
    }

    #[tokio::test]
    async fn test_start_stop_lifecycle() {
        let registry = MemoryRegistry::new();
        let s = server("127.0.0.1:47011", Arc::new(registry.clone()));

        s.start(GroupRegistry::new()).await.unwrap();
        assert!(s.is_running().await);
        assert!(registry.members(SERVICE_NAME).contains("127.0.0.1:47011"));

        let again = s.start(GroupRegistry::new()).await;
        assert!(matches!(again, Err(CacheError::AlreadyRunning(_))));

        s.stop().await;
        assert!(!s.is_running().await);
        assert!(!registry.members(SERVICE_NAME).contains("127.0.0.1:47011"));
        assert!(s.peers().is_empty());

        // Stopping twice is a no-op and the port is free again.
        s.stop().await;
        s.start(GroupRegistry::new()).await.unwrap();
        s.stop().await;
    }

    #[tokio::test]
    async fn test_bind_failure_is_fatal_for_that_server() {
        let registry: Arc<dyn Registry> = Arc::new(MemoryRegistry::new());
        let first = server("127.0.0.1:47021", registry.clone());
        let second = server("127.0.0.1:47021", registry);

        first.start(GroupRegistry::new()).await.unwrap();
        let result = second.start(GroupRegistry::new()).await;
        assert!(matches!(result, Err(CacheError::Bind(_))));
        assert!(first.is_running().await);

        first.stop().await;
    }

    #[tokio::test]
    async fn test_membership_changes_rebuild_ring() {
        let registry = MemoryRegistry::new();
        let s = server("127.0.0.1:47031", Arc::new(registry.clone()));
        s.start(GroupRegistry::new()).await.unwrap();

        registry.advertise(SERVICE_NAME, "127.0.0.1:47032").await.unwrap();
        for _ in 0..50 {
            if s.peers().len() == 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(s.peers().len(), 2);

        registry.withdraw(SERVICE_NAME, "127.0.0.1:47032").await.unwrap();
        for _ in 0..50 {
            if s.peers().len() == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(s.peers(), vec!["127.0.0.1:47031".to_string()]);

        s.stop().await;
    }
}
