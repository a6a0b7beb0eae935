// src/proxy/mod.rs
mod backend;
mod forward;
mod pool;
mod proxy;
mod request;

pub use backend::Backend;
pub use forward::{Forward, HttpForwarder, TransportError};
pub use pool::BackendPool;
pub use proxy::{Proxy, ProxyError};
pub use request::{AttemptContext, ProxyRequest};
