//! HTTP Peer Client
//!
//! Outbound side of the peer protocol: one HTTP request per fetch, store or delete.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{StatusCode, Url};
use tracing::debug;

use crate::api::{BASE_PATH, TTL_HEADER};
use crate::error::{CacheError, Result};
use crate::models::ErrorResponse;
use crate::peers::Peer;

/// Fixed per-call timeout for peer requests
pub const DEFAULT_PEER_TIMEOUT: Duration = Duration::from_secs(10);

// == HTTP Peer ==
/// Client handle for one remote node.
#[derive(Debug, Clone)]
pub struct HttpPeer {
    addr: String,
    http_client: reqwest::Client,
    timeout: Duration,
}

impl HttpPeer {
    /// Creates a handle for the node at `addr` (`host:port`).
    ///
    /// The reqwest client is shared between handles so connections are pooled.
    pub fn new(addr: impl Into<String>, http_client: reqwest::Client, timeout: Duration) -> Self {
        Self {
            addr: addr.into(),
            http_client,
            timeout,
        }
    }

    /// `http://{addr}/_mesh/{group}/{key}` with both segments percent-encoded.
    fn url(&self, group: &str, key: &str) -> Result<Url> {
        let mut url = Url::parse(&format!("http://{}{}", self.addr, BASE_PATH))
            .map_err(|e| CacheError::InvalidAddress(format!("{}: {}", self.addr, e)))?;
        url.path_segments_mut()
            .map_err(|_| CacheError::InvalidAddress(self.addr.clone()))?
            .push(group)
            .push(key);
        Ok(url)
    }

    fn transport_error(&self, err: reqwest::Error) -> CacheError {
        if err.is_timeout() {
            CacheError::Transport(format!("peer {} timed out after {:?}", self.addr, self.timeout))
        } else {
            CacheError::Transport(format!("peer {}: {}", self.addr, err))
        }
    }

    /// Turns a non-success response into a typed error.
    async fn remote_error(&self, key: &str, response: reqwest::Response) -> CacheError {
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return CacheError::NotFound(key.to_string());
        }
        let message = match response.json::<ErrorResponse>().await {
            Ok(body) => body.error,
            Err(_) => status.to_string(),
        };
        CacheError::Remote(format!("peer {} answered {}: {}", self.addr, status, message))
    }
}

#[async_trait]
impl Peer for HttpPeer {
    async fn fetch(&self, group: &str, key: &str) -> Result<(Bytes, u64)> {
        let url = self.url(group, key)?;
        debug!(peer = %self.addr, group, key, "fetch from peer");

        let response = self
            .http_client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        if !response.status().is_success() {
            return Err(self.remote_error(key, response).await);
        }

        let ttl = response
            .headers()
            .get(TTL_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .ok_or_else(|| {
                CacheError::Remote(format!("peer {} sent invalid {} header", self.addr, TTL_HEADER))
            })?;
        let value = response.bytes().await.map_err(|e| self.transport_error(e))?;

        Ok((value, ttl))
    }

    async fn store(
        &self,
        group: &str,
        key: &str,
        value: Bytes,
        ttl: u64,
        if_not_exists: bool,
    ) -> Result<()> {
        let url = self.url(group, key)?;
        debug!(peer = %self.addr, group, key, ttl, if_not_exists, "store on peer");

        let response = self
            .http_client
            .put(url)
            .query(&[("ttl", ttl.to_string()), ("nx", if_not_exists.to_string())])
            .body(value)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        if !response.status().is_success() {
            return Err(self.remote_error(key, response).await);
        }
        Ok(())
    }

    async fn delete(&self, group: &str, key: &str) -> Result<()> {
        let url = self.url(group, key)?;
        debug!(peer = %self.addr, group, key, "delete on peer");

        let response = self
            .http_client
            .delete(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        if !response.status().is_success() {
            return Err(self.remote_error(key, response).await);
        }
        Ok(())
    }

    fn addr(&self) -> &str {
        &self.addr
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer(addr: &str) -> HttpPeer {
        HttpPeer::new(addr, reqwest::Client::new(), Duration::from_secs(1))
    }

    #[test]
    fn test_url_encodes_segments() {
        let url = peer("127.0.0.1:8001").url("scores", "a b/c").unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:8001/_mesh/scores/a%20b%2Fc");
    }

    #[tokio::test]
    async fn test_unreachable_peer_is_transport_error() {
        // Port 9 (discard) is not expected to be listening on loopback.
        let result = peer("127.0.0.1:9").fetch("scores", "k").await;
        assert!(matches!(result, Err(CacheError::Transport(_))));
    }

    /// Serves every fetch with `headers` and body `v`, returning the bound address.
    async fn spawn_owner(headers: &'static [(&'static str, &'static str)]) -> String {
        use axum::{http::HeaderMap, routing::get, Router};

        let app = Router::new().route(
            "/_mesh/:group/:key",
            get(move || async move {
                let mut map = HeaderMap::new();
                for (name, value) in headers {
                    map.insert(*name, value.parse().unwrap());
                }
                (map, "v")
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    #[tokio::test]
    async fn test_fetch_reads_ttl_header() {
        let addr = spawn_owner(&[("x-cache-ttl", "7")]).await;
        let result = peer(&addr).fetch("scores", "k").await;
        assert_eq!(result, Ok((Bytes::from_static(b"v"), 7)));
    }

    #[tokio::test]
    async fn test_malformed_ttl_header_is_remote_error() {
        let cases: [&'static [(&'static str, &'static str)]; 3] =
            [&[("x-cache-ttl", "soon")], &[("x-cache-ttl", "-1")], &[]];
        for headers in cases {
            let addr = spawn_owner(headers).await;
            let result = peer(&addr).fetch("scores", "k").await;
            assert!(
                matches!(result, Err(CacheError::Remote(_))),
                "{:?} accepted as {:?}",
                headers,
                result
            );
        }
    }
}
