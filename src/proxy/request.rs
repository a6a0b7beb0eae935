// src/proxy/request.rs
use hyper::body::Bytes;
use hyper::header::{HeaderMap, HeaderName, HeaderValue};
use hyper::{Body, Method, Request, Uri};
use std::net::SocketAddr;
use url::Url;
use uuid::Uuid;

const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Headers that only apply to a single connection and are never forwarded.
const HOP_BY_HOP: [&str; 9] = [
    "connection",
    "proxy-connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Failover bookkeeping for one client request.
///
/// `attempts` counts hops to a different backend, `retries` counts re-forwards
/// to the backend currently serving the request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AttemptContext {
    pub attempts: u32,
    pub retries: u32,
}

impl AttemptContext {
    pub fn new(attempts: u32, retries: u32) -> Self {
        Self { attempts, retries }
    }
}

/// A fully buffered inbound request that can be re-sent to any backend.
#[derive(Debug, Clone)]
pub struct ProxyRequest {
    pub id: Uuid,
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub client_addr: Option<SocketAddr>,
}

impl ProxyRequest {
    pub async fn from_hyper(
        req: Request<Body>,
        client_addr: Option<SocketAddr>,
    ) -> Result<Self, hyper::Error> {
        let (parts, body) = req.into_parts();
        let body = hyper::body::to_bytes(body).await?;

        Ok(Self {
            id: Uuid::new_v4(),
            method: parts.method,
            uri: parts.uri,
            headers: parts.headers,
            body,
            client_addr,
        })
    }

    pub fn path(&self) -> &str {
        self.uri.path()
    }

    /// Build the request sent to `target`, rewriting scheme, authority and path.
    ///
    /// The inbound `Host` header is passed through untouched; hyper only fills
    /// in the backend's authority when the client sent none.
    pub fn to_upstream(&self, target: &Url) -> Result<Request<Body>, hyper::http::Error> {
        let mut uri = format!(
            "{}://{}{}",
            target.scheme(),
            authority(target),
            join_paths(target.path(), self.uri.path())
        );
        if let Some(query) = self.uri.query() {
            uri.push('?');
            uri.push_str(query);
        }

        let mut upstream = Request::builder()
            .method(self.method.clone())
            .uri(uri)
            .body(Body::from(self.body.clone()))?;

        let headers = upstream.headers_mut();
        *headers = self.headers.clone();
        strip_hop_by_hop(headers);
        if let Some(addr) = self.client_addr {
            append_forwarded_for(headers, addr);
        }

        Ok(upstream)
    }
}

pub(crate) fn strip_hop_by_hop(headers: &mut HeaderMap) {
    // Connection may list further per-connection headers by name.
    let listed: Vec<HeaderName> = headers
        .get_all(hyper::header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in listed {
        headers.remove(name);
    }
    for name in HOP_BY_HOP {
        headers.remove(name);
    }
}

fn append_forwarded_for(headers: &mut HeaderMap, addr: SocketAddr) {
    let ip = addr.ip().to_string();
    let value = match headers.get(X_FORWARDED_FOR).and_then(|v| v.to_str().ok()) {
        Some(prior) => format!("{}, {}", prior, ip),
        None => ip,
    };
    if let Ok(value) = HeaderValue::from_str(&value) {
        headers.insert(X_FORWARDED_FOR, value);
    }
}

fn authority(target: &Url) -> String {
    let host = target.host_str().unwrap_or_default();
    match target.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    }
}

fn join_paths(base: &str, path: &str) -> String {
    match (base.ends_with('/'), path.starts_with('/')) {
        (true, true) => format!("{}{}", base, &path[1..]),
        (false, false) => format!("{}/{}", base, path),
        _ => format!("{}{}", base, path),
    }
}
