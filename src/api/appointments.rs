//! Appointment endpoints.

use crate::context::AppContext;
use crate::database::{parse_timestamp, Appointment, AppointmentStatus, NewAppointment};
use crate::errors::{ClinicError, ClinicResult};
use crate::request::{json_body, page_param, path_param, query_param, query_params};
use crate::response::ClinicResponse;
use chrono::{DateTime, Utc};
use hyper::{Body, Request};
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
struct CreateAppointment {
    patient_id: i64,
    scheduled_at: String,
    #[serde(default)]
    reason: Option<String>,
}

fn parse_time(raw: &str, field: &str) -> ClinicResult<DateTime<Utc>> {
    parse_timestamp(raw)
        .ok_or_else(|| ClinicError::BadRequest(format!("'{}' is not a valid date-time", field)))
}

/// Fire-and-forget reminder. Stands in for an SMS/email provider.
fn spawn_reminder(appointment: &Appointment) {
    let id = appointment.id;
    let patient_id = appointment.patient_id;
    let scheduled_at = appointment.scheduled_at;
    tokio::spawn(async move {
        tracing::info!(
            appointment_id = id,
            patient_id,
            scheduled_at = %scheduled_at,
            "appointment reminder queued"
        );
    });
}

/// POST /appointments
pub async fn create(req: Request<Body>, ctx: Arc<AppContext>) -> ClinicResult<ClinicResponse> {
    let body: CreateAppointment = json_body(req).await?;
    let scheduled_at = parse_time(&body.scheduled_at, "scheduled_at")?;

    if !ctx.patients().exists(body.patient_id).await? {
        tracing::warn!(patient_id = body.patient_id, "appointment for unknown patient");
        return Err(ClinicError::NotFound("Patient".to_string()));
    }

    let appointment = ctx
        .appointments()
        .create(NewAppointment {
            patient_id: body.patient_id,
            scheduled_at,
            reason: body.reason,
        })
        .await?;
    spawn_reminder(&appointment);
    Ok(ClinicResponse::created(&appointment))
}

/// PATCH /appointments/{id}/reschedule?new_time=
pub async fn reschedule(req: Request<Body>, ctx: Arc<AppContext>) -> ClinicResult<ClinicResponse> {
    let id: i64 = path_param(&req, "id")?;
    let params = query_params(&req);
    let raw: String = query_param(&params, "new_time")?
        .ok_or_else(|| ClinicError::BadRequest("new_time is required".to_string()))?;
    let new_time = parse_time(&raw, "new_time")?;

    let appointment = ctx
        .appointments()
        .reschedule(id, new_time)
        .await?
        .ok_or_else(|| ClinicError::NotFound("Appointment".to_string()))?;
    Ok(ClinicResponse::ok(&appointment))
}

/// PATCH /appointments/{id}/cancel
pub async fn cancel(req: Request<Body>, ctx: Arc<AppContext>) -> ClinicResult<ClinicResponse> {
    let id: i64 = path_param(&req, "id")?;
    let appointment = ctx
        .appointments()
        .set_status(id, AppointmentStatus::Canceled)
        .await?
        .ok_or_else(|| ClinicError::NotFound("Appointment".to_string()))?;
    Ok(ClinicResponse::ok(&appointment))
}

/// GET /appointments?page=&status=
pub async fn list(req: Request<Body>, ctx: Arc<AppContext>) -> ClinicResult<ClinicResponse> {
    let params = query_params(&req);
    let page = page_param(&params)?;
    let status = match params.get("status").filter(|s| !s.is_empty()) {
        Some(raw) => Some(raw.parse::<AppointmentStatus>()?),
        None => None,
    };
    let appointments = ctx.appointments().list(page, status).await?;
    Ok(ClinicResponse::ok(&appointments))
}
