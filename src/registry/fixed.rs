//! Registry over a fixed, configured member list.

use async_trait::async_trait;
use tokio::sync::watch;
use tracing::debug;

use super::{Members, Registry};
use crate::error::Result;

/// Membership taken from configuration; it never changes at runtime.
///
/// Advertising and withdrawing are accepted and ignored.
#[derive(Debug)]
pub struct StaticRegistry {
    tx: watch::Sender<Members>,
}

impl StaticRegistry {
    pub fn new<I, S>(members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let members: Members = members.into_iter().map(Into::into).collect();
        Self {
            tx: watch::channel(members).0,
        }
    }
}

#[async_trait]
impl Registry for StaticRegistry {
    async fn advertise(&self, service: &str, addr: &str) -> Result<()> {
        debug!(service, addr, "static registry ignores advertise");
        Ok(())
    }

    async fn withdraw(&self, service: &str, addr: &str) -> Result<()> {
        debug!(service, addr, "static registry ignores withdraw");
        Ok(())
    }

    async fn watch(&self, _service: &str) -> Result<watch::Receiver<Members>> {
        Ok(self.tx.subscribe())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_members() {
        let registry = StaticRegistry::new(["127.0.0.1:1", "127.0.0.1:2", "127.0.0.1:1"]);

        registry.advertise("svc", "127.0.0.1:3").await.unwrap();
        let rx = registry.watch("svc").await.unwrap();

        assert_eq!(rx.borrow().len(), 2);
        assert!(!rx.borrow().contains("127.0.0.1:3"));
    }
}
