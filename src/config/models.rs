// src/config/models.rs
use anyhow::{bail, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;
use url::Url;

/// Re-forwards to the same backend before it is declared down.
pub const MAX_RETRIES: u32 = 3;
/// Failover hops allowed for one client request.
pub const MAX_ATTEMPTS: u32 = 3;
pub const RETRY_BACKOFF_MS: u64 = 10;
pub const HEALTH_CHECK_INTERVAL_SECS: u64 = 120;
pub const HEALTH_CHECK_TIMEOUT_SECS: u64 = 2;
/// Upper bounds keep timer deadlines representable.
pub const MAX_HEALTH_CHECK_INTERVAL_SECS: u64 = 24 * 60 * 60;
pub const MAX_HEALTH_CHECK_TIMEOUT_SECS: u64 = 5 * 60;
pub const DEFAULT_PORT: u16 = 3030;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    pub backends: Vec<BackendConfig>,
    #[serde(default)]
    pub health_check: HealthCheckConfig,
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.backends.is_empty() {
            bail!("Please provide one or more backends to load balance");
        }

        let mut seen = HashSet::new();
        for backend in &self.backends {
            let url = &backend.url;
            if url.scheme() != "http" {
                bail!("Backend {} must use the http scheme", url);
            }
            if url.host_str().is_none() {
                bail!("Backend {} has no host", url);
            }
            if !seen.insert(url.as_str()) {
                bail!("Backend {} is configured more than once", url);
            }
        }

        let interval = self.health_check.interval_secs;
        if interval == 0 || interval > MAX_HEALTH_CHECK_INTERVAL_SECS {
            bail!(
                "health_check.interval_secs must be between 1 and {}, got {}",
                MAX_HEALTH_CHECK_INTERVAL_SECS,
                interval
            );
        }
        let timeout = self.health_check.timeout_secs;
        if timeout == 0 || timeout > MAX_HEALTH_CHECK_TIMEOUT_SECS {
            bail!(
                "health_check.timeout_secs must be between 1 and {}, got {}",
                MAX_HEALTH_CHECK_TIMEOUT_SECS,
                timeout
            );
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl ServerConfig {
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    pub url: Url,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HealthCheckConfig {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl HealthCheckConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

impl RetryConfig {
    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            backoff_ms: default_backoff_ms(),
            max_attempts: default_max_attempts(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_interval_secs() -> u64 {
    HEALTH_CHECK_INTERVAL_SECS
}

fn default_timeout_secs() -> u64 {
    HEALTH_CHECK_TIMEOUT_SECS
}

fn default_max_retries() -> u32 {
    MAX_RETRIES
}

fn default_backoff_ms() -> u64 {
    RETRY_BACKOFF_MS
}

fn default_max_attempts() -> u32 {
    MAX_ATTEMPTS
}
