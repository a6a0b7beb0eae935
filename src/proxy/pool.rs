// src/proxy/pool.rs
use super::backend::Backend;
use super::proxy::ProxyError;
use crate::config::BackendConfig;
use crate::health::{probe, HealthCheckResult};
use crate::load_balancer::RoundRobinCursor;
use hyper::client::HttpConnector;
use hyper::{Body, Client};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Fixed, ordered set of backends with a shared rotation cursor.
#[derive(Debug, Default)]
pub struct BackendPool {
    backends: Vec<Arc<Backend>>,
    cursor: RoundRobinCursor,
}

impl BackendPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(configs: &[BackendConfig], client: Client<HttpConnector, Body>) -> Self {
        let mut pool = Self::new();
        for config in configs {
            pool.add(Backend::http(config.url.clone(), client.clone()));
            tracing::info!("Configured backend: {}", config.url);
        }
        pool
    }

    /// Startup only: the pool is shared immutably once serving begins.
    pub fn add(&mut self, backend: Backend) {
        self.backends.push(Arc::new(backend));
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    pub fn all_backends(&self) -> &[Arc<Backend>] {
        &self.backends
    }

    /// Next alive backend in rotation, scanning at most one full turn.
    pub async fn get_next_peer(&self) -> Result<Option<Arc<Backend>>, ProxyError> {
        if self.is_empty() {
            return Err(ProxyError::EmptyPool);
        }
        let len = self.backends.len();
        let start = self.cursor.next_index(len).ok_or(ProxyError::EmptyPool)?;

        for offset in 0..len {
            let idx = (start + offset) % len;
            let backend = &self.backends[idx];
            if backend.is_alive().await {
                if idx != start {
                    self.cursor.hint(idx);
                }
                return Ok(Some(backend.clone()));
            }
        }

        Ok(None)
    }

    /// Returns false when no backend has this address.
    pub async fn mark_backend_status(&self, url: &Url, alive: bool) -> bool {
        match self.backends.iter().find(|b| &b.url == url) {
            Some(backend) => {
                backend.set_alive(alive).await;
                true
            }
            None => false,
        }
    }

    /// Probe every backend concurrently and record the outcome on each.
    pub async fn health_check(&self, timeout: Duration) -> Vec<HealthCheckResult> {
        let checks = self.backends.iter().map(|backend| async move {
            let result = probe(&backend.url, timeout).await;
            let was_alive = backend.is_alive().await;
            let previous_check = backend.last_checked().await;
            let alive = result.is_ok();
            backend.record_check(alive).await;

            match &result {
                Ok(_) => tracing::info!("{} [up]", backend.url),
                Err(e) => tracing::info!("{} [down] site unreachable: {}", backend.url, e),
            }
            if was_alive && !alive {
                tracing::warn!(backend = %backend.id, last_checked = ?previous_check, "Backend is now down");
            } else if !was_alive && alive {
                tracing::info!(backend = %backend.id, last_checked = ?previous_check, "Backend is back up");
            }

            HealthCheckResult {
                backend_id: backend.id.clone(),
                alive,
                response_time_ms: result
                    .as_ref()
                    .map(|elapsed| elapsed.as_millis() as u64)
                    .unwrap_or_else(|_| timeout.as_millis() as u64),
                error: result.err().map(|e| e.to_string()),
            }
        });

        futures::future::join_all(checks).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use tokio::net::TcpListener;

    fn pool_of(urls: &[&str]) -> BackendPool {
        let client = Client::new();
        let mut pool = BackendPool::new();
        for url in urls {
            pool.add(Backend::http(Url::parse(url).unwrap(), client.clone()));
        }
        pool
    }

    async fn next_id(pool: &BackendPool) -> String {
        pool.get_next_peer().await.unwrap().unwrap().id.clone()
    }

    #[tokio::test]
    async fn test_strict_rotation_from_zero() {
        let pool = pool_of(&["http://a:1", "http://b:2"]);

        assert_eq!(next_id(&pool).await, "b:2");
        assert_eq!(next_id(&pool).await, "a:1");
        assert_eq!(next_id(&pool).await, "b:2");
    }

    #[tokio::test]
    async fn test_skips_dead_backend() {
        let pool = pool_of(&["http://a:1", "http://b:2"]);
        pool.all_backends()[0].set_alive(false).await;

        for _ in 0..5 {
            assert_eq!(next_id(&pool).await, "b:2");
        }
    }

    #[tokio::test]
    async fn test_hint_moves_cursor_to_found_backend() {
        let pool = pool_of(&["http://a:1", "http://b:2", "http://c:3"]);
        pool.all_backends()[1].set_alive(false).await;

        // start = 1 (dead), found 2
        assert_eq!(next_id(&pool).await, "c:3");
        assert_eq!(pool.cursor.position(), 2);
        assert_eq!(next_id(&pool).await, "a:1");
    }

    #[tokio::test]
    async fn test_all_dead_returns_none() {
        let pool = pool_of(&["http://a:1", "http://b:2"]);
        for backend in pool.all_backends() {
            backend.set_alive(false).await;
        }

        assert!(pool.get_next_peer().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_empty_pool() {
        let pool = BackendPool::new();
        assert!(pool.is_empty());
        assert!(matches!(pool.get_next_peer().await, Err(ProxyError::EmptyPool)));
        assert_eq!(pool.cursor.position(), 0);
    }

    #[tokio::test]
    async fn test_mark_backend_status() {
        let pool = pool_of(&["http://a:1", "http://b:2"]);
        let b = Url::parse("http://b:2").unwrap();

        assert!(pool.mark_backend_status(&b, false).await);
        assert!(!pool.all_backends()[1].is_alive().await);
        assert!(pool.all_backends()[0].is_alive().await);

        assert!(pool.mark_backend_status(&b, true).await);
        assert!(pool.all_backends()[1].is_alive().await);

        let unknown = Url::parse("http://z:9").unwrap();
        assert!(!pool.mark_backend_status(&unknown, false).await);
    }

    #[tokio::test]
    async fn test_health_check_transitions() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let pool = pool_of(&[&format!("http://{}", addr)]);
        let backend = pool.all_backends()[0].clone();
        assert!(backend.is_alive().await);

        let results = pool.health_check(Duration::from_millis(500)).await;
        assert_eq!(results.len(), 1);
        assert!(!results[0].alive);
        assert!(results[0].error.is_some());
        assert!(!backend.is_alive().await);

        let _listener = TcpListener::bind(addr).await.unwrap();
        let results = pool.health_check(Duration::from_millis(500)).await;
        assert!(results[0].alive);
        assert!(backend.is_alive().await);
        assert!(backend.last_checked().await.is_some());
    }

    #[tokio::test]
    async fn test_concurrent_selection_only_returns_alive() {
        let pool = Arc::new(pool_of(&["http://a:1", "http://b:2", "http://c:3", "http://d:4"]));
        pool.all_backends()[2].set_alive(false).await;

        let tasks: Vec<_> = (0..32)
            .map(|_| {
                let pool = pool.clone();
                tokio::spawn(async move { next_id(&pool).await })
            })
            .collect();

        for result in futures::future::join_all(tasks).await {
            assert_ne!(result.unwrap(), "c:3");
        }
    }

    proptest! {
        #[test]
        fn prop_round_robin_visits_alive_in_order(
            alive in proptest::collection::vec(any::<bool>(), 1..8),
            calls in 1usize..24,
        ) {
            let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
            runtime.block_on(async {
                let urls: Vec<String> = (0..alive.len())
                    .map(|i| format!("http://host{}:{}", i, 8000 + i))
                    .collect();
                let refs: Vec<&str> = urls.iter().map(String::as_str).collect();
                let pool = pool_of(&refs);
                for (backend, &up) in pool.all_backends().iter().zip(&alive) {
                    backend.set_alive(up).await;
                }

                let alive_idx: Vec<usize> = (0..alive.len()).filter(|&i| alive[i]).collect();
                let mut previous: Option<usize> = None;
                for _ in 0..calls {
                    let peer = pool.get_next_peer().await.unwrap();
                    if alive_idx.is_empty() {
                        prop_assert!(peer.is_none());
                        continue;
                    }
                    let peer = peer.unwrap();
                    let idx = pool.all_backends().iter().position(|b| Arc::ptr_eq(b, &peer)).unwrap();
                    prop_assert!(alive[idx]);

                    // Each pick is the alive backend that follows the previous one.
                    let expected = match previous {
                        None => alive_idx.iter().copied().find(|&i| i >= 1 % alive.len()).unwrap_or(alive_idx[0]),
                        Some(p) => alive_idx.iter().copied().find(|&i| i > p).unwrap_or(alive_idx[0]),
                    };
                    prop_assert_eq!(idx, expected);
                    previous = Some(idx);
                }
                Ok(())
            })?;
        }
    }
}
