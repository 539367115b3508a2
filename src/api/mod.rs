//! Route table.

pub mod appointments;
pub mod medicines;
pub mod patients;
pub mod reports;

use crate::auth::{handlers, policy, AuthMiddleware, AuthService, Role, RoleMiddleware};
use crate::context::AppContext;
use crate::errors::ClinicResult;
use crate::observability::gather_metrics;
use crate::response::ClinicResponse;
use crate::router::{Route, Router};
use hyper::{Body, Method, Request, StatusCode};
use std::sync::Arc;

/// GET /health
pub async fn health(_req: Request<Body>, _ctx: Arc<AppContext>) -> ClinicResult<ClinicResponse> {
    Ok(ClinicResponse::ok(&serde_json::json!({ "status": "ok" })))
}

/// GET /metrics
pub async fn metrics(_req: Request<Body>, _ctx: Arc<AppContext>) -> ClinicResult<ClinicResponse> {
    Ok(ClinicResponse::new(StatusCode::OK)
        .header("Content-Type", "text/plain; version=0.0.4")
        .body(Body::from(gather_metrics())))
}

/// Authenticate, then require one of `allowed`.
fn guarded(route: Route, auth: &Arc<AuthService>, allowed: &'static [Role]) -> Route {
    route
        .with_middleware(Box::new(AuthMiddleware::new(auth.clone())))
        .with_middleware(Box::new(RoleMiddleware::new(allowed)))
}

/// Every endpoint of the service.
pub fn routes(ctx: &AppContext) -> Router {
    let auth = &ctx.auth;
    let mut router = Router::new();

    router.add_route(Route::new(Method::GET, "/health", health));
    router.add_route(Route::new(Method::GET, "/metrics", metrics));

    router.add_route(Route::new(Method::POST, "/users/create", handlers::register));
    router.add_route(Route::new(Method::POST, "/users/token", handlers::login));
    router.add_route(guarded(
        Route::new(Method::GET, "/users/me", handlers::me),
        auth,
        policy::ANY_STAFF,
    ));

    router.add_route(guarded(
        Route::new(Method::POST, "/patients", patients::create),
        auth,
        policy::CREATE_PATIENT,
    ));
    router.add_route(guarded(
        Route::new(Method::GET, "/patients", patients::list),
        auth,
        policy::READ_PATIENT,
    ));
    router.add_route(guarded(
        Route::new(Method::GET, "/patients/{id}", patients::get),
        auth,
        policy::READ_PATIENT,
    ));

    router.add_route(guarded(
        Route::new(Method::POST, "/appointments", appointments::create),
        auth,
        policy::CREATE_APPOINTMENT,
    ));
    router.add_route(guarded(
        Route::new(Method::GET, "/appointments", appointments::list),
        auth,
        policy::READ_APPOINTMENT,
    ));
    router.add_route(guarded(
        Route::new(Method::PATCH, "/appointments/{id}/reschedule", appointments::reschedule),
        auth,
        policy::RESCHEDULE_APPOINTMENT,
    ));
    router.add_route(guarded(
        Route::new(Method::PATCH, "/appointments/{id}/cancel", appointments::cancel),
        auth,
        policy::CANCEL_APPOINTMENT,
    ));

    router.add_route(guarded(
        Route::new(Method::POST, "/medicines", medicines::create),
        auth,
        policy::MANAGE_MEDICINE,
    ));
    router.add_route(guarded(
        Route::new(Method::GET, "/medicines", medicines::search),
        auth,
        policy::READ_MEDICINE,
    ));
    router.add_route(guarded(
        Route::new(Method::GET, "/medicines/{id}", medicines::get),
        auth,
        policy::READ_MEDICINE,
    ));
    router.add_route(guarded(
        Route::new(Method::PATCH, "/medicines/{id}/adjust", medicines::adjust),
        auth,
        policy::MANAGE_MEDICINE,
    ));

    router.add_route(guarded(
        Route::new(Method::GET, "/reports/overview", reports::overview),
        auth,
        policy::VIEW_REPORTS,
    ));

    router
}
