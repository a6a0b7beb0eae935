// src/proxy/forward.rs
use super::request::{strip_hop_by_hop, ProxyRequest};
use async_trait::async_trait;
use hyper::client::HttpConnector;
use hyper::{Body, Client, Response};
use url::Url;

/// Failure to get any HTTP response out of a backend.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP transport error: {0}")]
    Http(#[from] hyper::Error),

    #[error("Invalid upstream request: {0}")]
    InvalidRequest(#[from] hyper::http::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Sends one request to one upstream. Implementations never retry.
#[async_trait]
pub trait Forward: Send + Sync {
    async fn forward(&self, req: &ProxyRequest) -> Result<Response<Body>, TransportError>;
}

/// Reverse proxy to a single host over a shared hyper client.
#[derive(Debug, Clone)]
pub struct HttpForwarder {
    client: Client<HttpConnector, Body>,
    target: Url,
}

impl HttpForwarder {
    pub fn new(client: Client<HttpConnector, Body>, target: Url) -> Self {
        Self { client, target }
    }
}

#[async_trait]
impl Forward for HttpForwarder {
    async fn forward(&self, req: &ProxyRequest) -> Result<Response<Body>, TransportError> {
        let upstream = req.to_upstream(&self.target)?;
        let mut response = self.client.request(upstream).await?;
        strip_hop_by_hop(response.headers_mut());
        Ok(response)
    }
}
