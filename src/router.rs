//! Router module - Handles routing logic.
//!
//! Routes match on method and a path pattern whose `{name}` segments capture
//! path parameters. Each route carries its own middleware, applied in order
//! before the handler and in reverse after it.

use crate::context::AppContext;
use crate::errors::ClinicResult;
use crate::middleware::Middleware;
use crate::request::PathParams;
use crate::response::ClinicResponse;
use hyper::{Body, Method, Request, Response, StatusCode};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

type BoxedHandler = Arc<
    dyn Fn(Request<Body>, Arc<AppContext>) -> Pin<Box<dyn Future<Output = ClinicResult<ClinicResponse>> + Send>>
        + Send
        + Sync,
>;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
}

fn parse_pattern(path: &str) -> Vec<Segment> {
    path.trim_matches('/')
        .split('/')
        .filter(|s| !s.is_empty())
        .map(|s| match s.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
            Some(name) => Segment::Param(name.to_string()),
            None => Segment::Literal(s.to_string()),
        })
        .collect()
}

/// Represents a route with method, path, handler, and middleware.
pub struct Route {
    method: Method,
    path: String,
    segments: Vec<Segment>,
    handler: BoxedHandler,
    middleware: Vec<Box<dyn Middleware>>,
}

impl Route {
    /// Create a new route.
    pub fn new<F, Fut>(method: Method, path: &str, handler: F) -> Self
    where
        F: Fn(Request<Body>, Arc<AppContext>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ClinicResult<ClinicResponse>> + Send + 'static,
    {
        Self {
            method,
            path: path.to_string(),
            segments: parse_pattern(path),
            handler: Arc::new(move |req, ctx| Box::pin(handler(req, ctx))),
            middleware: Vec::new(),
        }
    }

    /// Add middleware to this route.
    pub fn with_middleware(mut self, middleware: Box<dyn Middleware>) -> Self {
        self.middleware.push(middleware);
        self
    }

    /// Match a request path, returning the captured parameters.
    fn matches(&self, req_path: &str) -> Option<HashMap<String, String>> {
        let parts: Vec<&str> = req_path
            .trim_matches('/')
            .split('/')
            .filter(|s| !s.is_empty())
            .collect();
        if parts.len() != self.segments.len() {
            return None;
        }

        let mut params = HashMap::new();
        for (segment, part) in self.segments.iter().zip(parts) {
            match segment {
                Segment::Literal(lit) if lit == part => {}
                Segment::Literal(_) => return None,
                Segment::Param(name) => {
                    params.insert(name.clone(), part.to_string());
                }
            }
        }
        Some(params)
    }
}

/// Router that holds all routes.
#[derive(Default)]
pub struct Router {
    routes: Vec<Route>,
}

impl Router {
    /// Create a new router.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a route to the router.
    pub fn add_route(&mut self, route: Route) {
        self.routes.push(route);
    }

    pub fn route(mut self, route: Route) -> Self {
        self.add_route(route);
        self
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Handle an incoming request.
    pub async fn handle(&self, mut req: Request<Body>, ctx: Arc<AppContext>) -> Response<Body> {
        let mut path_matched = false;

        for route in &self.routes {
            let params = match route.matches(req.uri().path()) {
                Some(params) => params,
                None => continue,
            };
            path_matched = true;
            if route.method != req.method() {
                continue;
            }

            req.extensions_mut().insert(PathParams(params));

            // route middleware, short-circuit on Err
            for middleware in &route.middleware {
                match middleware.before(req).await {
                    Ok(r) => req = r,
                    Err(resp) => return resp,
                }
            }

            let mut resp = match (route.handler)(req, ctx).await {
                Ok(resp) => resp.into(),
                Err(err) => err.into_response(),
            };

            for middleware in route.middleware.iter().rev() {
                resp = middleware.after(resp).await;
            }

            return resp;
        }

        if path_matched {
            ClinicResponse::new(StatusCode::METHOD_NOT_ALLOWED)
                .json(&serde_json::json!({ "detail": "Method Not Allowed" }))
                .into()
        } else {
            ClinicResponse::new(StatusCode::NOT_FOUND)
                .json(&serde_json::json!({ "detail": "Not Found" }))
                .into()
        }
    }
}
