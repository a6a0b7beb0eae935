// src/health/probe.rs
use std::future::Future;
use std::io;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio::time::timeout;
use url::Url;

#[derive(Debug, Clone)]
pub struct HealthCheckResult {
    pub backend_id: String,
    pub alive: bool,
    pub response_time_ms: u64,
    pub error: Option<String>,
}

/// Reachability is a TCP connect to the backend's host and port, bounded by `limit`.
pub async fn probe(url: &Url, limit: Duration) -> Result<Duration, io::Error> {
    let host = url
        .host_str()
        .map(|h| h.trim_start_matches('[').trim_end_matches(']'))
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "backend URL has no host"))?;
    let port = url
        .port_or_known_default()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "backend URL has no port"))?;

    connect_within(limit, TcpStream::connect((host, port))).await
}

/// Time `connect`, mapping an expired `limit` to [`io::ErrorKind::TimedOut`].
async fn connect_within<F, T>(limit: Duration, connect: F) -> Result<Duration, io::Error>
where
    F: Future<Output = io::Result<T>>,
{
    let start = Instant::now();
    let stream = timeout(limit, connect)
        .await
        .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "connect timed out"))??;
    drop(stream);

    Ok(start.elapsed())
}
