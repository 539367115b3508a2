//! Database module - SQLite persistence through `tokio_rusqlite`.
//!
//! One connection runs on a dedicated thread; calls are serialized through it.
//! Each entity gets a small repository over the shared [`Database`] handle.

pub mod appointments;
pub mod medicines;
pub mod patients;
pub mod reports;
pub mod users;

pub use appointments::{Appointment, AppointmentRepository, AppointmentStatus, NewAppointment};
pub use medicines::{Medicine, MedicineRepository, NewMedicine};
pub use patients::{NewPatient, Patient, PatientRepository};
pub use reports::{Overview, ReportRepository};
pub use users::UserRepository;

use chrono::{DateTime, NaiveDateTime, SecondsFormat, SubsecRound, Utc};
use rusqlite::types::Type;
use std::sync::Arc;
use tokio_rusqlite::Connection;

/// Rows per page for every list endpoint.
pub const PAGE_SIZE: u32 = 10;

/// Shared database handle.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Connection>,
}

impl Database {
    /// Open `url` (a file path, or `:memory:`) and create the schema.
    pub async fn open(url: &str) -> Result<Self, tokio_rusqlite::Error> {
        let conn = if url == ":memory:" {
            Connection::open_in_memory().await?
        } else {
            Connection::open(url).await?
        };
        let db = Self {
            conn: Arc::new(conn),
        };
        db.init_tables().await?;
        tracing::info!(url, "database ready");
        Ok(db)
    }

    pub async fn in_memory() -> Result<Self, tokio_rusqlite::Error> {
        Self::open(":memory:").await
    }

    pub(crate) fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Initialize database tables.
    async fn init_tables(&self) -> Result<(), tokio_rusqlite::Error> {
        self.conn
            .call(|conn| {
                conn.execute_batch(
                    "PRAGMA foreign_keys = ON;

                    CREATE TABLE IF NOT EXISTS users (
                        id INTEGER PRIMARY KEY AUTOINCREMENT,
                        username TEXT UNIQUE NOT NULL,
                        full_name TEXT,
                        role TEXT NOT NULL DEFAULT 'staff',
                        password_hash TEXT NOT NULL,
                        created_at TEXT NOT NULL
                    );

                    CREATE TABLE IF NOT EXISTS patients (
                        id INTEGER PRIMARY KEY AUTOINCREMENT,
                        first_name TEXT NOT NULL,
                        last_name TEXT,
                        dob TEXT,
                        gender TEXT,
                        phone TEXT,
                        email TEXT,
                        address TEXT,
                        medical_history TEXT
                    );

                    CREATE TABLE IF NOT EXISTS appointments (
                        id INTEGER PRIMARY KEY AUTOINCREMENT,
                        patient_id INTEGER NOT NULL REFERENCES patients(id),
                        scheduled_at TEXT NOT NULL,
                        reason TEXT,
                        status TEXT NOT NULL DEFAULT 'scheduled',
                        created_at TEXT NOT NULL
                    );
                    CREATE INDEX IF NOT EXISTS idx_appointments_scheduled_at
                        ON appointments(scheduled_at);

                    CREATE TABLE IF NOT EXISTS medicines (
                        id INTEGER PRIMARY KEY AUTOINCREMENT,
                        name TEXT NOT NULL,
                        manufacturer TEXT,
                        quantity INTEGER NOT NULL DEFAULT 0,
                        description TEXT,
                        reorder_threshold INTEGER NOT NULL DEFAULT 5
                    );
                    CREATE INDEX IF NOT EXISTS idx_medicines_name ON medicines(name);",
                )?;
                Ok(())
            })
            .await
    }

    /// Cheap liveness probe.
    pub async fn ping(&self) -> bool {
        self.conn
            .call(|conn| Ok(conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?))
            .await
            .map(|one| one == 1)
            .unwrap_or(false)
    }
}

/// Canonical timestamp text. Fixed width and always UTC, so string order is
/// time order.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Drop sub-second precision, matching what `format_timestamp` stores.
pub fn stored_precision(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts.trunc_subsecs(0)
}

/// Parse RFC 3339, or a naive ISO-8601 date-time read as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc))
}

/// Read a stored timestamp column.
pub(crate) fn timestamp_column(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    parse_timestamp(&raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Text,
            format!("invalid timestamp '{}'", raw).into(),
        )
    })
}

pub(crate) fn page_offset(page: u32) -> i64 {
    i64::from(page.saturating_sub(1)) * i64::from(PAGE_SIZE)
}
