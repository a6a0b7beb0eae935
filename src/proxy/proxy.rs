// ────────────────────────────────
// src/proxy/proxy.rs
// Dispatcher: picks a peer, forwards through the retry policy, fails over
// ────────────────────────────────

use super::pool::BackendPool;
use super::request::{AttemptContext, ProxyRequest};
use crate::config::{Config, MAX_ATTEMPTS};
use crate::retry::RetryPolicy;
use hyper::{Body, Request, Response, StatusCode};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};

pub struct Proxy {
    pool: Arc<BackendPool>,
    policy: RetryPolicy,
    max_attempts: u32,
}

impl Proxy {
    pub fn new(pool: Arc<BackendPool>, policy: RetryPolicy, max_attempts: u32) -> Self {
        Self {
            pool,
            policy,
            max_attempts,
        }
    }

    pub fn from_config(config: &Config, pool: Arc<BackendPool>) -> Self {
        Self::new(pool, RetryPolicy::from(&config.retry), config.retry.max_attempts)
    }

    pub fn pool(&self) -> &Arc<BackendPool> {
        &self.pool
    }

    /// Entry point for every inbound request. Failures are rendered as responses.
    pub async fn handle(&self, req: Request<Body>, client_addr: Option<SocketAddr>) -> Response<Body> {
        let request = match ProxyRequest::from_hyper(req, client_addr).await {
            Ok(request) => request,
            Err(e) => return ProxyError::BodyRead(e).into(),
        };

        match self.dispatch(&request, AttemptContext::default()).await {
            Ok(response) => response,
            Err(e) => {
                warn!(
                    request_id = %request.id,
                    client = ?request.client_addr,
                    path = request.path(),
                    "{}",
                    e
                );
                e.into()
            }
        }
    }

    /// Select, forward and fail over until a backend answers or the pool is exhausted.
    pub async fn dispatch(
        &self,
        request: &ProxyRequest,
        mut ctx: AttemptContext,
    ) -> Result<Response<Body>, ProxyError> {
        loop {
            if ctx.attempts > self.max_attempts {
                return Err(ProxyError::MaxAttemptsExceeded(ctx.attempts));
            }

            let peer = self
                .pool
                .get_next_peer()
                .await?
                .ok_or(ProxyError::NoAliveBackends)?;

            ctx.retries = 0;
            match self.policy.forward(&peer, request, &mut ctx).await {
                Some(response) => return Ok(response),
                None => info!(
                    request_id = %request.id,
                    path = request.path(),
                    attempts = ctx.attempts,
                    "Backend {} exhausted, attempting another backend",
                    peer.id
                ),
            }
        }
    }
}

impl Default for Proxy {
    fn default() -> Self {
        Self::new(Arc::new(BackendPool::new()), RetryPolicy::default(), MAX_ATTEMPTS)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("No alive backends available")]
    NoAliveBackends,

    #[error("No backends configured")]
    EmptyPool,

    #[error("Max attempts reached ({0}), terminating")]
    MaxAttemptsExceeded(u32),

    #[error("Failed to read request body: {0}")]
    BodyRead(#[source] hyper::Error),
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::NoAliveBackends
            | ProxyError::EmptyPool
            | ProxyError::MaxAttemptsExceeded(_) => StatusCode::SERVICE_UNAVAILABLE,
            ProxyError::BodyRead(_) => StatusCode::BAD_REQUEST,
        }
    }
}

// Convert ProxyError to Hyper Response for error handling
impl From<ProxyError> for Response<Body> {
    fn from(err: ProxyError) -> Self {
        let status = err.status();
        let message = match status {
            StatusCode::SERVICE_UNAVAILABLE => "Service not available",
            _ => "Bad request",
        };

        let mut response = Response::new(Body::from(message));
        *response.status_mut() = status;
        response
    }
}
