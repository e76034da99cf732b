use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::RwLock;
use uuid::Uuid;

/// One paired endpoint: what the platform's bonded-device table would hand
/// back for a device advertising a service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairedEndpoint {
    pub name: String,
    pub service_uuid: Uuid,
    pub addr: SocketAddr,
}

/// The set of already-paired endpoints visible to a client.
///
/// Discovery in scope is a filter over this set only; there is no active
/// scanning. Hosts register themselves on start and deregister on stop.
#[derive(Clone, Default)]
pub struct PairedRegistry {
    inner: Arc<RwLock<Vec<PairedEndpoint>>>,
}

impl PairedRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the endpoint bound to `endpoint.addr`.
    pub async fn register(&self, endpoint: PairedEndpoint) {
        let mut endpoints = self.inner.write().await;
        endpoints.retain(|e| e.addr != endpoint.addr);
        endpoints.push(endpoint);
    }

    pub async fn deregister(&self, addr: SocketAddr) {
        self.inner.write().await.retain(|e| e.addr != addr);
    }

    /// Find the first endpoint whose advertised name contains
    /// `name_filter` and whose service UUID matches. This mirrors the
    /// client's name-matching discovery heuristic.
    pub async fn find_service(&self, name_filter: &str, service_uuid: Uuid) -> Option<PairedEndpoint> {
        self.inner
            .read()
            .await
            .iter()
            .find(|e| e.service_uuid == service_uuid && e.name.contains(name_filter))
            .cloned()
    }

    pub async fn endpoints(&self) -> Vec<PairedEndpoint> {
        self.inner.read().await.clone()
    }
}
