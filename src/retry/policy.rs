// src/retry/policy.rs

use crate::config::RetryConfig;
use crate::proxy::{AttemptContext, Backend, ProxyRequest};
use hyper::{Body, Response};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Per-backend retry bound with failover escalation.
///
/// A transport error is retried on the same backend after a fixed backoff until
/// `max_retries` re-forwards have been spent. The next failure marks the backend
/// down and escalates the request's attempt count so the dispatcher can pick a
/// different peer.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_retries: u32,
    backoff: Duration,
}

/// Result of one forward through the policy.
#[derive(Debug)]
pub enum Transition {
    Success(Response<Body>),
    /// Backoff already elapsed; forward to the same backend again.
    RetryLocal,
    /// Backend marked down; select another peer.
    Failover,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, backoff: Duration) -> Self {
        Self {
            max_retries,
            backoff,
        }
    }

    /// Forward once and decide what happens next.
    pub async fn step(
        &self,
        backend: &Backend,
        req: &ProxyRequest,
        ctx: &mut AttemptContext,
    ) -> Transition {
        let error = match backend.forward(req).await {
            Ok(response) => return Transition::Success(response),
            Err(error) => error,
        };

        if ctx.retries < self.max_retries {
            debug!(
                backend = %backend.id,
                request_id = %req.id,
                retries = ctx.retries,
                "{}. Retrying in {:?}",
                error,
                self.backoff
            );
            sleep(self.backoff).await;
            ctx.retries += 1;
            return Transition::RetryLocal;
        }

        warn!(
            backend = %backend.id,
            request_id = %req.id,
            "{}. Giving up after {} retries, marking backend down",
            error,
            ctx.retries
        );
        backend.set_alive(false).await;
        ctx.attempts += 1;
        Transition::Failover
    }

    /// Drive [`RetryPolicy::step`] until the backend answers or is given up on.
    /// `None` means failover.
    pub async fn forward(
        &self,
        backend: &Backend,
        req: &ProxyRequest,
        ctx: &mut AttemptContext,
    ) -> Option<Response<Body>> {
        loop {
            match self.step(backend, req, ctx).await {
                Transition::Success(response) => return Some(response),
                Transition::RetryLocal => continue,
                Transition::Failover => return None,
            }
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self::new(config.max_retries, config.backoff())
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}
