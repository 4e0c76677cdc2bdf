//! SQLite implementation of the option repository.

use async_trait::async_trait;
use chrono::Utc;
use gatehouse_core::{
    Error, error::StorageError, error::utilities::StorageResultExt,
    repositories::OptionRepository,
};
use serde_json::Value;
use sqlx::SqlitePool;

/// Options stored as JSON text in the `gatehouse_options` table.
pub struct SqliteOptionRepository {
    pool: SqlitePool,
}

impl SqliteOptionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OptionRepository for SqliteOptionRepository {
    async fn get(&self, name: &str) -> Result<Option<Value>, Error> {
        let raw: Option<String> =
            sqlx::query_scalar("SELECT value FROM gatehouse_options WHERE name = ?")
                .bind(name)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| {
                    tracing::error!(error = %e, name, "Failed to read option");
                    Error::Storage(StorageError::Database("Failed to read option".to_string()))
                })?;

        raw.map(|text| {
            serde_json::from_str(&text).map_err(|e| {
                Error::Storage(StorageError::Corrupt {
                    name: name.to_string(),
                    reason: e.to_string(),
                })
            })
        })
        .transpose()
    }

    async fn set(&self, name: &str, value: &Value) -> Result<(), Error> {
        let text = serde_json::to_string(value).map_storage_err_with_context("encode option")?;

        sqlx::query(
            r#"
            INSERT INTO gatehouse_options (name, value, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(name) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(name)
        .bind(text)
        .bind(Utc::now().timestamp())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, name, "Failed to write option");
            Error::Storage(StorageError::Database("Failed to write option".to_string()))
        })?;

        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<bool, Error> {
        let result = sqlx::query("DELETE FROM gatehouse_options WHERE name = ?")
            .bind(name)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, name, "Failed to delete option");
                Error::Storage(StorageError::Database("Failed to delete option".to_string()))
            })?;

        Ok(result.rows_affected() > 0)
    }

    async fn names_with_prefix(&self, prefix: &str) -> Result<Vec<String>, Error> {
        // LIKE treats `_` as a wildcard, and every option name contains one.
        sqlx::query_scalar(
            "SELECT name FROM gatehouse_options WHERE substr(name, 1, length(?1)) = ?1 ORDER BY name",
        )
        .bind(prefix)
        .fetch_all(&self.pool)
        .await
        .map_storage_err_with_context("list options")
    }
}
