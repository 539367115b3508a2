//! Medicine inventory.

use super::{page_offset, Database, PAGE_SIZE};
use crate::errors::{ClinicError, ClinicResult};
use rusqlite::{params, OptionalExtension};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Medicine {
    pub id: i64,
    pub name: String,
    pub manufacturer: Option<String>,
    pub quantity: i64,
    pub description: Option<String>,
    pub reorder_threshold: i64,
}

fn default_reorder_threshold() -> i64 {
    5
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewMedicine {
    pub name: String,
    #[serde(default)]
    pub manufacturer: Option<String>,
    #[serde(default)]
    pub quantity: i64,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_reorder_threshold")]
    pub reorder_threshold: i64,
}

const COLUMNS: &str = "id, name, manufacturer, quantity, description, reorder_threshold";

fn row_to_medicine(row: &rusqlite::Row<'_>) -> rusqlite::Result<Medicine> {
    Ok(Medicine {
        id: row.get(0)?,
        name: row.get(1)?,
        manufacturer: row.get(2)?,
        quantity: row.get(3)?,
        description: row.get(4)?,
        reorder_threshold: row.get(5)?,
    })
}

#[derive(Clone)]
pub struct MedicineRepository {
    db: Database,
}

impl MedicineRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn create(&self, new: NewMedicine) -> ClinicResult<Medicine> {
        if new.name.trim().is_empty() {
            return Err(ClinicError::BadRequest("name is required".to_string()));
        }
        if new.quantity < 0 || new.reorder_threshold < 0 {
            return Err(ClinicError::BadRequest(
                "quantity and reorder_threshold cannot be negative".to_string(),
            ));
        }

        let medicine = self
            .db
            .conn()
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO medicines (name, manufacturer, quantity, description, reorder_threshold)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![
                        new.name,
                        new.manufacturer,
                        new.quantity,
                        new.description,
                        new.reorder_threshold
                    ],
                )?;
                Ok(Medicine {
                    id: conn.last_insert_rowid(),
                    name: new.name,
                    manufacturer: new.manufacturer,
                    quantity: new.quantity,
                    description: new.description,
                    reorder_threshold: new.reorder_threshold,
                })
            })
            .await?;
        tracing::info!(id = medicine.id, name = %medicine.name, quantity = medicine.quantity, "medicine created");
        Ok(medicine)
    }

    pub async fn get(&self, id: i64) -> ClinicResult<Option<Medicine>> {
        let medicine = self
            .db
            .conn()
            .call(move |conn| {
                Ok(conn
                    .query_row(
                        &format!("SELECT {} FROM medicines WHERE id = ?1", COLUMNS),
                        [id],
                        row_to_medicine,
                    )
                    .optional()?)
            })
            .await?;
        Ok(medicine)
    }

    /// Name substring search, ordered by name.
    pub async fn search(&self, query: Option<String>, page: u32) -> ClinicResult<Vec<Medicine>> {
        let offset = page_offset(page);
        let medicines = self
            .db
            .conn()
            .call(move |conn| {
                let pattern = query.map(|q| format!("%{}%", q));
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM medicines
                     WHERE ?1 IS NULL OR name LIKE ?1
                     ORDER BY name, id LIMIT ?2 OFFSET ?3",
                    COLUMNS
                ))?;
                let rows = stmt
                    .query_map(params![pattern, PAGE_SIZE, offset], row_to_medicine)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(rows)
            })
            .await?;
        Ok(medicines)
    }

    /// Add `delta` to the stock; the result never drops below zero.
    /// Add `delta` to the stock level, clamping at zero. A total past
    /// `i64::MAX` is rejected.
    pub async fn adjust_stock(&self, id: i64, delta: i64) -> ClinicResult<Option<Medicine>> {
        let outcome = self
            .db
            .conn()
            .call(move |conn| {
                let tx = conn.transaction()?;
                let current: Option<i64> = tx
                    .query_row("SELECT quantity FROM medicines WHERE id = ?1", [id], |row| {
                        row.get(0)
                    })
                    .optional()?;
                let Some(current) = current else {
                    return Ok(Adjusted::Missing);
                };
                let Some(quantity) = current.checked_add(delta) else {
                    return Ok(Adjusted::OutOfRange);
                };
                tx.execute(
                    "UPDATE medicines SET quantity = ?1 WHERE id = ?2",
                    params![quantity.max(0), id],
                )?;
                let medicine = tx.query_row(
                    &format!("SELECT {} FROM medicines WHERE id = ?1", COLUMNS),
                    [id],
                    row_to_medicine,
                )?;
                tx.commit()?;
                Ok(Adjusted::Done(medicine))
            })
            .await?;

        match outcome {
            Adjusted::Done(m) => {
                tracing::info!(id, delta, quantity = m.quantity, "stock adjusted");
                Ok(Some(m))
            }
            Adjusted::Missing => {
                tracing::warn!(id, "stock adjust failed: medicine not found");
                Ok(None)
            }
            Adjusted::OutOfRange => {
                tracing::warn!(id, delta, "stock adjust rejected: quantity out of range");
                Err(ClinicError::BadRequest("delta out of range".to_string()))
            }
        }
    }
}

enum Adjusted {
    Done(Medicine),
    Missing,
    OutOfRange,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_medicine(name: &str, quantity: i64) -> NewMedicine {
        NewMedicine {
            name: name.to_string(),
            manufacturer: Some("Acme".to_string()),
            quantity,
            description: None,
            reorder_threshold: 5,
        }
    }

    #[tokio::test]
    async fn test_adjust_stock_clamps_at_zero() {
        let repo = MedicineRepository::new(Database::in_memory().await.unwrap());
        let med = repo.create(new_medicine("Ibuprofen", 2)).await.unwrap();

        let med = repo.adjust_stock(med.id, 5).await.unwrap().unwrap();
        assert_eq!(med.quantity, 7);

        let med = repo.adjust_stock(med.id, -100).await.unwrap().unwrap();
        assert_eq!(med.quantity, 0);

        assert!(repo.adjust_stock(999, 1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_adjust_stock_rejects_overflow() {
        let repo = MedicineRepository::new(Database::in_memory().await.unwrap());
        let med = repo.create(new_medicine("Insulin", 3)).await.unwrap();

        let err = repo.adjust_stock(med.id, i64::MAX).await.unwrap_err();
        assert!(matches!(err, ClinicError::BadRequest(_)));
        assert_eq!(repo.get(med.id).await.unwrap().unwrap().quantity, 3);

        let med = repo.adjust_stock(med.id, i64::MIN).await.unwrap().unwrap();
        assert_eq!(med.quantity, 0);
    }

    #[tokio::test]
    async fn test_search_by_name() {
        let repo = MedicineRepository::new(Database::in_memory().await.unwrap());
        repo.create(new_medicine("Paracetamol", 10)).await.unwrap();
        repo.create(new_medicine("Amoxicillin", 3)).await.unwrap();
        repo.create(new_medicine("Paracetamol Forte", 1)).await.unwrap();

        let found = repo.search(Some("para".into()), 1).await.unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].name, "Paracetamol");

        let all = repo.search(None, 1).await.unwrap();
        assert_eq!(all[0].name, "Amoxicillin");
    }

    #[tokio::test]
    async fn test_create_validation() {
        let repo = MedicineRepository::new(Database::in_memory().await.unwrap());
        assert!(repo.create(new_medicine("", 1)).await.is_err());
        assert!(repo.create(new_medicine("X", -1)).await.is_err());
        let json: NewMedicine = serde_json::from_str(r#"{"name":"Aspirin"}"#).unwrap();
        assert_eq!(json.quantity, 0);
        assert_eq!(json.reorder_threshold, 5);
    }
}
