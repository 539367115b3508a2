//! Before/after hooks around request handling.

use crate::observability::{HTTP_LATENCY, HTTP_REQUESTS};
use hyper::{Body, Request, Response};
use std::future::Future;
use std::pin::Pin;
use std::time::Instant;

/// `Err` carries the response to send instead of calling the handler.
pub type MiddlewareResult<T> = Result<T, Response<Body>>;

pub trait Middleware: Send + Sync {
    /// Runs before the handler. Returning `Err` short-circuits the chain.
    fn before(
        &self,
        req: Request<Body>,
    ) -> Pin<Box<dyn Future<Output = MiddlewareResult<Request<Body>>> + Send + '_>> {
        Box::pin(async move { Ok(req) })
    }

    fn after(
        &self,
        resp: Response<Body>,
    ) -> Pin<Box<dyn Future<Output = Response<Body>> + Send + '_>> {
        Box::pin(async move { resp })
    }
}

/// Global hooks applied by the server around every route.
#[derive(Default)]
pub struct MiddlewareStack {
    layers: Vec<Box<dyn Middleware>>,
}

impl MiddlewareStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, layer: Box<dyn Middleware>) {
        self.layers.push(layer);
    }

    /// Stops at the first layer that rejects.
    pub async fn before(&self, mut req: Request<Body>) -> MiddlewareResult<Request<Body>> {
        for layer in &self.layers {
            req = layer.before(req).await?;
        }
        Ok(req)
    }

    /// Innermost layer first.
    pub async fn after(&self, mut resp: Response<Body>) -> Response<Body> {
        for layer in self.layers.iter().rev() {
            resp = layer.after(resp).await;
        }
        resp
    }
}

/// Request start marker set by `LoggingMiddleware`. The server copies it onto
/// the response.
#[derive(Debug, Clone)]
pub struct RequestInfo {
    method: String,
    path: String,
    started: Instant,
}

/// Logs one line per request and records request metrics.
///
/// Responses do not carry the request, so the marker set in `before` reaches
/// `after` through a response extension.
pub struct LoggingMiddleware;

impl LoggingMiddleware {
    /// Record a finished request.
    pub fn finish(method: &str, path: &str, started: Instant, resp: &Response<Body>) {
        let elapsed = started.elapsed();
        let status = resp.status();
        HTTP_REQUESTS
            .with_label_values(&[method, status.as_str()])
            .inc();
        HTTP_LATENCY
            .with_label_values(&[method])
            .observe(elapsed.as_secs_f64());
        tracing::info!(
            method,
            path,
            status = status.as_u16(),
            latency_ms = elapsed.as_millis() as u64,
            "request handled"
        );
    }

    fn log_response(resp: &Response<Body>) {
        if let Some(info) = resp.extensions().get::<RequestInfo>() {
            Self::finish(&info.method, &info.path, info.started, resp);
        }
    }
}

impl Middleware for LoggingMiddleware {
    fn before(
        &self,
        mut req: Request<Body>,
    ) -> Pin<Box<dyn Future<Output = MiddlewareResult<Request<Body>>> + Send + '_>> {
        Box::pin(async move {
            let info = RequestInfo {
                method: req.method().to_string(),
                path: req.uri().path().to_string(),
                started: Instant::now(),
            };
            tracing::debug!(method = %info.method, path = %info.path, "request received");
            req.extensions_mut().insert(info);
            Ok(req)
        })
    }

    fn after(
        &self,
        resp: Response<Body>,
    ) -> Pin<Box<dyn Future<Output = Response<Body>> + Send + '_>> {
        Box::pin(async move {
            Self::log_response(&resp);
            resp
        })
    }
}
