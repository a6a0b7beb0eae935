// src/main.rs
use anyhow::{anyhow, Result};
use failover_load_balancer::{
    config,
    health::HealthChecker,
    proxy::{BackendPool, Proxy},
    server::{RequestHandler, ServerBuilder},
};
use hyper::Client;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("failover_load_balancer=debug".parse()?)
                .add_directive("hyper=info".parse()?),
        )
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.yaml".to_string());

    info!("Loading configuration from: {}", config_path);
    let config = config::load_config(&config_path).await?;

    // Create backend pool
    let pool = Arc::new(BackendPool::from_config(&config.backends, Client::new()));
    info!("Load balancing across {} backends", pool.len());

    // Create dispatcher
    let proxy = Arc::new(Proxy::from_config(&config, pool.clone()));

    // Start health checker
    let health_checker = Arc::new(HealthChecker::new(config.health_check.clone(), pool));
    let mut health_task = tokio::spawn(health_checker.clone().start());

    // Start main server
    let server = ServerBuilder::new(config.server.listen_addr())
        .with_handler(RequestHandler::new(proxy))
        .serve_with_shutdown(shutdown_signal());
    tokio::pin!(server);

    // A health checker that stops on its own leaves liveness frozen: exit instead.
    tokio::select! {
        result = &mut server => {
            health_checker.shutdown();
            if let Err(e) = health_task.await {
                error!("Health checker task failed: {}", e);
            }
            result
        }
        joined = &mut health_task => {
            let reason = match joined {
                Ok(()) => "exited".to_string(),
                Err(e) => e.to_string(),
            };
            error!("Health checker stopped unexpectedly: {}", reason);
            Err(anyhow!("health checker stopped: {}", reason))
        }
    }
}

// Graceful shutdown handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
