//! Patient records.

use super::{page_offset, Database, PAGE_SIZE};
use crate::errors::ClinicResult;
use rusqlite::{params, OptionalExtension};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Patient {
    pub id: i64,
    pub first_name: String,
    pub last_name: Option<String>,
    pub dob: Option<String>,
    pub gender: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub medical_history: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewPatient {
    pub first_name: String,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub dob: Option<String>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub medical_history: Option<String>,
}

const COLUMNS: &str =
    "id, first_name, last_name, dob, gender, phone, email, address, medical_history";

fn row_to_patient(row: &rusqlite::Row<'_>) -> rusqlite::Result<Patient> {
    Ok(Patient {
        id: row.get(0)?,
        first_name: row.get(1)?,
        last_name: row.get(2)?,
        dob: row.get(3)?,
        gender: row.get(4)?,
        phone: row.get(5)?,
        email: row.get(6)?,
        address: row.get(7)?,
        medical_history: row.get(8)?,
    })
}

#[derive(Clone)]
pub struct PatientRepository {
    db: Database,
}

impl PatientRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn create(&self, new: NewPatient) -> ClinicResult<Patient> {
        let patient = self
            .db
            .conn()
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO patients
                     (first_name, last_name, dob, gender, phone, email, address, medical_history)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                    params![
                        new.first_name,
                        new.last_name,
                        new.dob,
                        new.gender,
                        new.phone,
                        new.email,
                        new.address,
                        new.medical_history
                    ],
                )?;
                Ok(Patient {
                    id: conn.last_insert_rowid(),
                    first_name: new.first_name,
                    last_name: new.last_name,
                    dob: new.dob,
                    gender: new.gender,
                    phone: new.phone,
                    email: new.email,
                    address: new.address,
                    medical_history: new.medical_history,
                })
            })
            .await?;
        tracing::info!(id = patient.id, "patient created");
        Ok(patient)
    }

    pub async fn get(&self, id: i64) -> ClinicResult<Option<Patient>> {
        let patient = self
            .db
            .conn()
            .call(move |conn| {
                Ok(conn
                    .query_row(
                        &format!("SELECT {} FROM patients WHERE id = ?1", COLUMNS),
                        [id],
                        row_to_patient,
                    )
                    .optional()?)
            })
            .await?;
        Ok(patient)
    }

    pub async fn exists(&self, id: i64) -> ClinicResult<bool> {
        Ok(self.get(id).await?.is_some())
    }

    /// One page ordered by id; `query` is a substring match on first name,
    /// last name or phone.
    pub async fn list(&self, page: u32, query: Option<String>) -> ClinicResult<Vec<Patient>> {
        let offset = page_offset(page);
        let patients = self
            .db
            .conn()
            .call(move |conn| {
                let pattern = query.map(|q| format!("%{}%", q));
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM patients
                     WHERE ?1 IS NULL
                        OR first_name LIKE ?1 OR last_name LIKE ?1 OR phone LIKE ?1
                     ORDER BY id LIMIT ?2 OFFSET ?3",
                    COLUMNS
                ))?;
                let rows = stmt
                    .query_map(params![pattern, PAGE_SIZE, offset], row_to_patient)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(rows)
            })
            .await?;
        tracing::debug!(page, returned = patients.len(), "patients listed");
        Ok(patients)
    }
}
