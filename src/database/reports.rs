//! Aggregate figures for the overview report.

use super::{format_timestamp, Database};
use crate::errors::ClinicResult;
use chrono::{DateTime, Utc};
use rusqlite::params;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Overview {
    pub total_patients: i64,
    pub upcoming_appointments: i64,
    pub low_stock_medicines: i64,
}

#[derive(Clone)]
pub struct ReportRepository {
    db: Database,
}

impl ReportRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Counts as of `now`: upcoming means still scheduled and not in the past.
    pub async fn overview(&self, now: DateTime<Utc>) -> ClinicResult<Overview> {
        let now = format_timestamp(&now);
        let overview = self
            .db
            .conn()
            .call(move |conn| {
                let total_patients =
                    conn.query_row("SELECT COUNT(*) FROM patients", [], |row| row.get(0))?;
                let upcoming_appointments = conn.query_row(
                    "SELECT COUNT(*) FROM appointments
                     WHERE status = 'scheduled' AND scheduled_at >= ?1",
                    params![now],
                    |row| row.get(0),
                )?;
                let low_stock_medicines = conn.query_row(
                    "SELECT COUNT(*) FROM medicines WHERE quantity <= reorder_threshold",
                    [],
                    |row| row.get(0),
                )?;
                Ok(Overview {
                    total_patients,
                    upcoming_appointments,
                    low_stock_medicines,
                })
            })
            .await?;
        Ok(overview)
    }
}
