//! Server module - hyper serve loop.
//!
//! Ties together the router, the global middleware stack and the shared
//! application context.

use crate::context::AppContext;
use crate::middleware::{Middleware, MiddlewareStack, RequestInfo};
use crate::router::Router;
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Request, Server};
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

/// Main server struct.
pub struct ClinicServer {
    router: Router,
    middleware: MiddlewareStack,
    ctx: Arc<AppContext>,
}

impl ClinicServer {
    pub fn new(router: Router, ctx: Arc<AppContext>) -> Self {
        Self {
            router,
            middleware: MiddlewareStack::new(),
            ctx,
        }
    }

    /// Add global middleware.
    pub fn with_middleware(mut self, middleware: Box<dyn Middleware>) -> Self {
        self.middleware.add(middleware);
        self
    }

    /// Run until `shutdown` resolves.
    pub async fn run<F>(self, addr: SocketAddr, shutdown: F) -> Result<(), hyper::Error>
    where
        F: Future<Output = ()>,
    {
        let router = Arc::new(self.router);
        let middleware = Arc::new(self.middleware);
        let ctx = self.ctx;

        let make_svc = make_service_fn(move |_| {
            let router = router.clone();
            let middleware = middleware.clone();
            let ctx = ctx.clone();

            async move {
                Ok::<_, Infallible>(service_fn(move |req: Request<Body>| {
                    let router = router.clone();
                    let middleware = middleware.clone();
                    let ctx = ctx.clone();
                    async move {
                        let req = match middleware.before(req).await {
                            Ok(req) => req,
                            Err(resp) => return Ok::<_, Infallible>(resp),
                        };
                        let marker = req.extensions().get::<RequestInfo>().cloned();

                        let mut resp = router.handle(req, ctx).await;
                        if let Some(marker) = marker {
                            resp.extensions_mut().insert(marker);
                        }

                        Ok::<_, Infallible>(middleware.after(resp).await)
                    }
                }))
            }
        });

        let server = Server::try_bind(&addr)?.serve(make_svc);
        tracing::info!(%addr, "clinic server listening");
        server.with_graceful_shutdown(shutdown).await
    }
}
