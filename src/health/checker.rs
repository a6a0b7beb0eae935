// src/health/checker.rs
use super::probe::HealthCheckResult;
use crate::config::{HealthCheckConfig, MAX_HEALTH_CHECK_INTERVAL_SECS};
use crate::proxy::BackendPool;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval_at, Instant};
use tracing::{debug, info, warn};

/// Background task that runs [`BackendPool::health_check`] on a fixed interval.
pub struct HealthChecker {
    config: HealthCheckConfig,
    pool: Arc<BackendPool>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl HealthChecker {
    pub fn new(config: HealthCheckConfig, pool: Arc<BackendPool>) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Self {
            config,
            pool,
            shutdown_tx,
            shutdown_rx,
        }
    }

    /// The first cycle runs one full interval after startup.
    pub async fn start(self: Arc<Self>) {
        let period = self.period();
        let now = Instant::now();
        let first = now.checked_add(period).unwrap_or(now);
        let mut ticker = interval_at(first, period);
        let mut shutdown_rx = self.shutdown_rx.clone();

        info!("Starting health checker with interval: {:?}", period);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.run_once().await;
                }
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        info!("Health checker shutting down");
                        break;
                    }
                }
            }
        }
    }

    fn period(&self) -> Duration {
        let ceiling = Duration::from_secs(MAX_HEALTH_CHECK_INTERVAL_SECS);
        let period = self.config.interval();
        if period > ceiling {
            warn!(
                "Health check interval {:?} exceeds {:?}, clamping",
                period, ceiling
            );
            return ceiling;
        }
        period
    }

    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    pub async fn run_once(&self) -> Vec<HealthCheckResult> {
        info!("Starting health check...");
        let results = self.pool.health_check(self.config.timeout()).await;

        for result in &results {
            debug!(
                backend = %result.backend_id,
                alive = result.alive,
                response_time_ms = result.response_time_ms,
                "Probe finished"
            );
        }

        let alive = results.iter().filter(|r| r.alive).count();
        info!(
            "Health check completed: {} up, {} down",
            alive,
            results.len() - alive
        );
        results
    }
}
