//! Medicine inventory endpoints.
//!
//! Search results are cached under a generation key; any write bumps the
//! generation so stale pages are never served.

use crate::context::AppContext;
use crate::database::{Medicine, NewMedicine};
use crate::errors::{ClinicError, ClinicResult};
use crate::request::{json_body, page_param, path_param, query_param, query_params};
use crate::response::ClinicResponse;
use hyper::{Body, Request};
use std::sync::Arc;

const GENERATION_KEY: &str = "medicines:gen";

async fn search_generation(ctx: &AppContext) -> String {
    ctx.cache
        .get::<String>(GENERATION_KEY)
        .await
        .unwrap_or_else(|| "0".to_string())
}

async fn invalidate_search(ctx: &AppContext) {
    let generation = uuid::Uuid::new_v4().to_string();
    ctx.cache.set(GENERATION_KEY, &generation, None).await;
}

/// POST /medicines
pub async fn create(req: Request<Body>, ctx: Arc<AppContext>) -> ClinicResult<ClinicResponse> {
    let new: NewMedicine = json_body(req).await?;
    let medicine = ctx.medicines().create(new).await?;
    invalidate_search(&ctx).await;
    Ok(ClinicResponse::created(&medicine))
}

/// GET /medicines/{id}
pub async fn get(req: Request<Body>, ctx: Arc<AppContext>) -> ClinicResult<ClinicResponse> {
    let id: i64 = path_param(&req, "id")?;
    let medicine = ctx
        .medicines()
        .get(id)
        .await?
        .ok_or_else(|| ClinicError::NotFound("Medicine".to_string()))?;
    Ok(ClinicResponse::ok(&medicine))
}

/// GET /medicines?q=&page=
pub async fn search(req: Request<Body>, ctx: Arc<AppContext>) -> ClinicResult<ClinicResponse> {
    let params = query_params(&req);
    let page = page_param(&params)?;
    let query = params.get("q").cloned().unwrap_or_default();

    let key = format!(
        "medicines:search:{}:{}:{}",
        search_generation(&ctx).await,
        query,
        page
    );
    if let Some(cached) = ctx.cache.get::<Vec<Medicine>>(&key).await {
        return Ok(ClinicResponse::ok(&cached));
    }

    let filter = if query.is_empty() { None } else { Some(query) };
    let medicines = ctx.medicines().search(filter, page).await?;
    ctx.cache.set(&key, &medicines, Some(ctx.cache_ttl())).await;
    Ok(ClinicResponse::ok(&medicines))
}

/// PATCH /medicines/{id}/adjust?delta= (missing delta means 0)
pub async fn adjust(req: Request<Body>, ctx: Arc<AppContext>) -> ClinicResult<ClinicResponse> {
    let id: i64 = path_param(&req, "id")?;
    let params = query_params(&req);
    let delta: i64 = query_param(&params, "delta")?.unwrap_or(0);

    let medicine = ctx
        .medicines()
        .adjust_stock(id, delta)
        .await?
        .ok_or_else(|| ClinicError::NotFound("Medicine".to_string()))?;
    invalidate_search(&ctx).await;
    Ok(ClinicResponse::ok(&medicine))
}
