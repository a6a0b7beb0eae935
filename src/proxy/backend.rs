// src/proxy/backend.rs
use super::forward::{Forward, HttpForwarder, TransportError};
use super::request::ProxyRequest;
use chrono::{DateTime, Utc};
use hyper::client::HttpConnector;
use hyper::{Body, Client, Response};
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;
use url::Url;

pub struct Backend {
    pub id: String,
    pub url: Url,

    // Runtime state
    alive: RwLock<bool>,
    last_checked: RwLock<Option<DateTime<Utc>>>,
    forwarder: Arc<dyn Forward>,
}

impl Backend {
    /// Backends start alive; the first health check or failover corrects that.
    pub fn new(url: Url, forwarder: Arc<dyn Forward>) -> Self {
        let id = format!(
            "{}:{}",
            url.host_str().unwrap_or("unknown"),
            url.port_or_known_default().unwrap_or(80)
        );

        Self {
            id,
            url,
            alive: RwLock::new(true),
            last_checked: RwLock::new(None),
            forwarder,
        }
    }

    /// Backend reverse-proxied over the given hyper client.
    pub fn http(url: Url, client: Client<HttpConnector, Body>) -> Self {
        let forwarder = Arc::new(HttpForwarder::new(client, url.clone()));
        Self::new(url, forwarder)
    }

    pub async fn is_alive(&self) -> bool {
        *self.alive.read().await
    }

    pub async fn set_alive(&self, alive: bool) {
        *self.alive.write().await = alive;
    }

    pub async fn last_checked(&self) -> Option<DateTime<Utc>> {
        *self.last_checked.read().await
    }

    pub(crate) async fn record_check(&self, alive: bool) {
        self.set_alive(alive).await;
        *self.last_checked.write().await = Some(Utc::now());
    }

    pub async fn forward(&self, req: &ProxyRequest) -> Result<Response<Body>, TransportError> {
        self.forwarder.forward(req).await
    }
}

impl fmt::Debug for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Backend")
            .field("id", &self.id)
            .field("url", &self.url.as_str())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend(url: &str) -> Backend {
        Backend::http(Url::parse(url).unwrap(), Client::new())
    }

    #[test]
    fn test_id_uses_known_default_port() {
        assert_eq!(backend("http://example.com").id, "example.com:80");
        assert_eq!(backend("http://10.0.0.1:8001").id, "10.0.0.1:8001");
    }

    #[tokio::test]
    async fn test_liveness_toggle() {
        let backend = backend("http://127.0.0.1:8001");
        assert!(backend.is_alive().await);

        backend.set_alive(false).await;
        assert!(!backend.is_alive().await);

        backend.set_alive(true).await;
        assert!(backend.is_alive().await);
        assert!(backend.last_checked().await.is_none());
    }

    #[tokio::test]
    async fn test_record_check_stamps_time() {
        let backend = backend("http://127.0.0.1:8001");
        backend.record_check(false).await;

        assert!(!backend.is_alive().await);
        assert!(backend.last_checked().await.is_some());
    }
}
