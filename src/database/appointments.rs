//! Appointment records.

use super::{format_timestamp, page_offset, stored_precision, timestamp_column, Database, PAGE_SIZE};
use crate::errors::{ClinicError, ClinicResult};
use chrono::{DateTime, Utc};
use rusqlite::{params, types::Type, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppointmentStatus {
    Scheduled,
    Completed,
    Canceled,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Scheduled => "scheduled",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Canceled => "canceled",
        }
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AppointmentStatus {
    type Err = ClinicError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scheduled" => Ok(AppointmentStatus::Scheduled),
            "completed" => Ok(AppointmentStatus::Completed),
            "canceled" => Ok(AppointmentStatus::Canceled),
            other => Err(ClinicError::BadRequest(format!("Unknown status '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: i64,
    pub patient_id: i64,
    pub scheduled_at: DateTime<Utc>,
    pub reason: Option<String>,
    pub status: AppointmentStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewAppointment {
    pub patient_id: i64,
    pub scheduled_at: DateTime<Utc>,
    pub reason: Option<String>,
}

const COLUMNS: &str = "id, patient_id, scheduled_at, reason, status, created_at";

fn row_to_appointment(row: &rusqlite::Row<'_>) -> rusqlite::Result<Appointment> {
    let status: String = row.get(4)?;
    let status = status.parse::<AppointmentStatus>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(4, Type::Text, e.to_string().into())
    })?;
    Ok(Appointment {
        id: row.get(0)?,
        patient_id: row.get(1)?,
        scheduled_at: timestamp_column(row, 2)?,
        reason: row.get(3)?,
        status,
        created_at: timestamp_column(row, 5)?,
    })
}

fn select_by_id(conn: &rusqlite::Connection, id: i64) -> rusqlite::Result<Option<Appointment>> {
    conn.query_row(
        &format!("SELECT {} FROM appointments WHERE id = ?1", COLUMNS),
        [id],
        row_to_appointment,
    )
    .optional()
}

#[derive(Clone)]
pub struct AppointmentRepository {
    db: Database,
}

impl AppointmentRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Insert with status `scheduled`. The caller checks the patient exists.
    pub async fn create(&self, new: NewAppointment) -> ClinicResult<Appointment> {
        let created_at = stored_precision(Utc::now());
        let scheduled_at = stored_precision(new.scheduled_at);
        let appointment = self
            .db
            .conn()
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO appointments (patient_id, scheduled_at, reason, status, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![
                        new.patient_id,
                        format_timestamp(&scheduled_at),
                        new.reason,
                        AppointmentStatus::Scheduled.as_str(),
                        format_timestamp(&created_at)
                    ],
                )?;
                Ok(Appointment {
                    id: conn.last_insert_rowid(),
                    patient_id: new.patient_id,
                    scheduled_at,
                    reason: new.reason,
                    status: AppointmentStatus::Scheduled,
                    created_at,
                })
            })
            .await?;
        tracing::info!(
            id = appointment.id,
            patient_id = appointment.patient_id,
            scheduled_at = %appointment.scheduled_at,
            "appointment created"
        );
        Ok(appointment)
    }

    pub async fn get(&self, id: i64) -> ClinicResult<Option<Appointment>> {
        let appointment = self
            .db
            .conn()
            .call(move |conn| Ok(select_by_id(conn, id)?))
            .await?;
        Ok(appointment)
    }

    pub async fn reschedule(&self, id: i64, new_time: DateTime<Utc>) -> ClinicResult<Option<Appointment>> {
        let appointment = self
            .db
            .conn()
            .call(move |conn| {
                let changed = conn.execute(
                    "UPDATE appointments SET scheduled_at = ?1 WHERE id = ?2",
                    params![format_timestamp(&new_time), id],
                )?;
                if changed == 0 {
                    return Ok(None);
                }
                Ok(select_by_id(conn, id)?)
            })
            .await?;
        match &appointment {
            Some(_) => tracing::info!(id, to = %new_time, "appointment rescheduled"),
            None => tracing::warn!(id, "reschedule failed: appointment not found"),
        }
        Ok(appointment)
    }

    pub async fn set_status(&self, id: i64, status: AppointmentStatus) -> ClinicResult<Option<Appointment>> {
        let appointment = self
            .db
            .conn()
            .call(move |conn| {
                let changed = conn.execute(
                    "UPDATE appointments SET status = ?1 WHERE id = ?2",
                    params![status.as_str(), id],
                )?;
                if changed == 0 {
                    return Ok(None);
                }
                Ok(select_by_id(conn, id)?)
            })
            .await?;
        match &appointment {
            Some(_) => tracing::info!(id, status = %status, "appointment status updated"),
            None => tracing::warn!(id, "status update failed: appointment not found"),
        }
        Ok(appointment)
    }

    /// One page ordered by scheduled time, optionally filtered by status.
    pub async fn list(&self, page: u32, status: Option<AppointmentStatus>) -> ClinicResult<Vec<Appointment>> {
        let offset = page_offset(page);
        let appointments = self
            .db
            .conn()
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM appointments
                     WHERE ?1 IS NULL OR status = ?1
                     ORDER BY scheduled_at, id LIMIT ?2 OFFSET ?3",
                    COLUMNS
                ))?;
                let rows = stmt
                    .query_map(
                        params![status.map(|s| s.as_str()), PAGE_SIZE, offset],
                        row_to_appointment,
                    )?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(rows)
            })
            .await?;
        Ok(appointments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{NewPatient, PatientRepository};
    use chrono::{Duration, TimeZone};

    async fn setup() -> (AppointmentRepository, i64) {
        let db = Database::in_memory().await.unwrap();
        let patient = PatientRepository::new(db.clone())
            .create(NewPatient {
                first_name: "Jane".into(),
                last_name: None,
                dob: None,
                gender: None,
                phone: None,
                email: None,
                address: None,
                medical_history: None,
            })
            .await
            .unwrap();
        (AppointmentRepository::new(db), patient.id)
    }

    #[tokio::test]
    async fn test_create_cancel_reschedule() {
        let (repo, patient_id) = setup().await;
        let at = Utc.with_ymd_and_hms(2030, 5, 1, 10, 0, 0).unwrap();

        let appt = repo
            .create(NewAppointment {
                patient_id,
                scheduled_at: at,
                reason: Some("Checkup".into()),
            })
            .await
            .unwrap();
        assert_eq!(appt.status, AppointmentStatus::Scheduled);
        assert_eq!(repo.get(appt.id).await.unwrap().unwrap(), appt);

        let canceled = repo
            .set_status(appt.id, AppointmentStatus::Canceled)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(canceled.status, AppointmentStatus::Canceled);

        let later = at + Duration::days(1);
        let moved = repo.reschedule(appt.id, later).await.unwrap().unwrap();
        assert_eq!(moved.scheduled_at, later);

        assert!(repo.reschedule(999, later).await.unwrap().is_none());
        assert!(repo.set_status(999, AppointmentStatus::Canceled).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_orders_by_time_and_filters() {
        let (repo, patient_id) = setup().await;
        let base = Utc.with_ymd_and_hms(2030, 5, 1, 10, 0, 0).unwrap();
        for offset in [3, 1, 2] {
            repo.create(NewAppointment {
                patient_id,
                scheduled_at: base + Duration::hours(offset),
                reason: None,
            })
            .await
            .unwrap();
        }

        let all = repo.list(1, None).await.unwrap();
        let times: Vec<_> = all.iter().map(|a| a.scheduled_at).collect();
        let mut sorted = times.clone();
        sorted.sort();
        assert_eq!(times, sorted);

        repo.set_status(all[0].id, AppointmentStatus::Canceled).await.unwrap();
        assert_eq!(repo.list(1, Some(AppointmentStatus::Canceled)).await.unwrap().len(), 1);
        assert_eq!(repo.list(1, Some(AppointmentStatus::Scheduled)).await.unwrap().len(), 2);
    }

    #[test]
    fn test_status_parsing() {
        assert_eq!("canceled".parse::<AppointmentStatus>().unwrap(), AppointmentStatus::Canceled);
        assert!("cancelled".parse::<AppointmentStatus>().is_err());
    }

    #[tokio::test]
    async fn test_created_record_matches_stored_row() {
        let (repo, patient_id) = setup().await;
        let at = Utc.with_ymd_and_hms(2030, 5, 1, 10, 0, 0).unwrap()
            + Duration::milliseconds(750);

        let appt = repo
            .create(NewAppointment {
                patient_id,
                scheduled_at: at,
                reason: None,
            })
            .await
            .unwrap();
        assert_eq!(appt.scheduled_at, Utc.with_ymd_and_hms(2030, 5, 1, 10, 0, 0).unwrap());
        assert_eq!(appt.created_at.timestamp_subsec_nanos(), 0);
        assert_eq!(repo.get(appt.id).await.unwrap().unwrap(), appt);
    }
}
