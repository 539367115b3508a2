//! Patient endpoints.

use crate::context::AppContext;
use crate::database::{NewPatient, Patient};
use crate::errors::{ClinicError, ClinicResult};
use crate::request::{json_body, page_param, path_param, query_params};
use crate::response::ClinicResponse;
use hyper::{Body, Request};
use std::sync::Arc;

fn cache_key(id: i64) -> String {
    format!("patient:{}", id)
}

/// POST /patients
pub async fn create(req: Request<Body>, ctx: Arc<AppContext>) -> ClinicResult<ClinicResponse> {
    let new: NewPatient = json_body(req).await?;
    if new.first_name.trim().is_empty() {
        return Err(ClinicError::BadRequest("first_name is required".to_string()));
    }
    let patient = ctx.patients().create(new).await?;
    Ok(ClinicResponse::created(&patient))
}

/// GET /patients/{id}, read through the cache.
pub async fn get(req: Request<Body>, ctx: Arc<AppContext>) -> ClinicResult<ClinicResponse> {
    let id: i64 = path_param(&req, "id")?;
    let key = cache_key(id);

    if let Some(patient) = ctx.cache.get::<Patient>(&key).await {
        tracing::debug!(id, "patient served from cache");
        return Ok(ClinicResponse::ok(&patient));
    }

    let patient = ctx
        .patients()
        .get(id)
        .await?
        .ok_or_else(|| ClinicError::NotFound("Patient".to_string()))?;
    ctx.cache.set(&key, &patient, Some(ctx.cache_ttl())).await;
    Ok(ClinicResponse::ok(&patient))
}

/// GET /patients?page=&q=
pub async fn list(req: Request<Body>, ctx: Arc<AppContext>) -> ClinicResult<ClinicResponse> {
    let params = query_params(&req);
    let page = page_param(&params)?;
    let query = params.get("q").filter(|q| !q.is_empty()).cloned();
    let patients = ctx.patients().list(page, query).await?;
    Ok(ClinicResponse::ok(&patients))
}
