//! Reporting endpoints.

use crate::context::AppContext;
use crate::errors::ClinicResult;
use crate::response::ClinicResponse;
use hyper::{Body, Request};
use std::sync::Arc;

/// GET /reports/overview
pub async fn overview(_req: Request<Body>, ctx: Arc<AppContext>) -> ClinicResult<ClinicResponse> {
    let overview = ctx.reports().overview(ctx.now()).await?;
    Ok(ClinicResponse::ok(&overview))
}
