//! User records; the credential store behind authentication.

use super::{format_timestamp, stored_precision, timestamp_column, Database};
use crate::auth::models::{Identity, NewIdentity, Role};
use crate::auth::CredentialStore;
use crate::errors::{ClinicError, ClinicResult};
use async_trait::async_trait;
use rusqlite::types::Type;
use rusqlite::{params, ErrorCode, OptionalExtension};

#[derive(Clone)]
pub struct UserRepository {
    db: Database,
}

impl UserRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

fn row_to_identity(row: &rusqlite::Row<'_>) -> rusqlite::Result<Identity> {
    let role: String = row.get(3)?;
    let role = role.parse::<Role>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(3, Type::Text, e.to_string().into())
    })?;
    Ok(Identity {
        id: row.get(0)?,
        username: row.get(1)?,
        full_name: row.get(2)?,
        role,
        password_hash: row.get(4)?,
        created_at: timestamp_column(row, 5)?,
    })
}

#[async_trait]
impl CredentialStore for UserRepository {
    async fn find_by_username(&self, username: &str) -> ClinicResult<Option<Identity>> {
        let username = username.to_string();
        let identity = self
            .db
            .conn()
            .call(move |conn| {
                Ok(conn
                    .query_row(
                        "SELECT id, username, full_name, role, password_hash, created_at
                         FROM users WHERE username = ?1",
                        [&username],
                        row_to_identity,
                    )
                    .optional()?)
            })
            .await?;
        Ok(identity)
    }

    async fn create(&self, identity: NewIdentity) -> ClinicResult<Identity> {
        let created_at = stored_precision(chrono::Utc::now());
        let stamp = format_timestamp(&created_at);
        let record = identity.clone();

        let inserted = self
            .db
            .conn()
            .call(move |conn| {
                let result = conn.execute(
                    "INSERT INTO users (username, full_name, role, password_hash, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![
                        record.username,
                        record.full_name,
                        record.role.as_str(),
                        record.password_hash,
                        stamp
                    ],
                );
                match result {
                    Ok(_) => Ok(Some(conn.last_insert_rowid())),
                    Err(rusqlite::Error::SqliteFailure(err, _))
                        if err.code == ErrorCode::ConstraintViolation =>
                    {
                        Ok(None)
                    }
                    Err(err) => Err(err.into()),
                }
            })
            .await?;

        match inserted {
            Some(id) => Ok(Identity {
                id,
                username: identity.username,
                full_name: identity.full_name,
                role: identity.role,
                password_hash: identity.password_hash,
                created_at,
            }),
            None => Err(ClinicError::DuplicateUsername),
        }
    }
}
