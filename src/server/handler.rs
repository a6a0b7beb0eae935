// src/server/handler.rs
use hyper::{Body, Request, Response};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tower::Service;

use crate::proxy::Proxy;

/// Tower service that hands every request on a connection to the dispatcher.
#[derive(Clone)]
pub struct RequestHandler {
    proxy: Arc<Proxy>,
    peer: Option<SocketAddr>,
}

impl RequestHandler {
    pub fn new(proxy: Arc<Proxy>) -> Self {
        Self { proxy, peer: None }
    }

    /// Handler bound to one client connection.
    pub fn for_peer(&self, peer: SocketAddr) -> Self {
        Self {
            proxy: self.proxy.clone(),
            peer: Some(peer),
        }
    }
}

impl Service<Request<Body>> for RequestHandler {
    type Response = Response<Body>;
    type Error = Infallible;
    type Future = futures::future::BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(
        &mut self,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        std::task::Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let proxy = self.proxy.clone();
        let peer = self.peer;
        Box::pin(async move { Ok(proxy.handle(req, peer).await) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::StatusCode;
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_empty_pool_yields_503() {
        let handler = RequestHandler::new(Arc::new(Proxy::default()))
            .for_peer("127.0.0.1:40000".parse().unwrap());

        let response = handler.oneshot(Request::new(Body::empty())).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
