//! Repository implementations for SQLite storage

pub mod option;

pub use option::SqliteOptionRepository;

use std::sync::Arc;

use async_trait::async_trait;
use gatehouse_core::{Error, error::StorageError, repositories::RepositoryProvider};
use sqlx::SqlitePool;

use crate::migrations::{self, SqliteMigrationManager};

/// Repository provider implementation for SQLite
#[derive(Clone)]
pub struct SqliteRepositoryProvider {
    pool: SqlitePool,
    options: Arc<SqliteOptionRepository>,
}

impl SqliteRepositoryProvider {
    pub fn new(pool: SqlitePool) -> Self {
        let options = Arc::new(SqliteOptionRepository::new(pool.clone()));
        Self { pool, options }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl RepositoryProvider for SqliteRepositoryProvider {
    type OptionRepo = SqliteOptionRepository;

    fn options(&self) -> Arc<Self::OptionRepo> {
        self.options.clone()
    }

    async fn migrate(&self) -> Result<(), Error> {
        let manager = SqliteMigrationManager::new(self.pool.clone());
        manager.initialize().await.map_err(|e| {
            tracing::error!(error = %e, "Failed to initialize migrations");
            Error::Storage(StorageError::Migration(
                "Failed to initialize migrations".to_string(),
            ))
        })?;

        manager.up(&migrations::all()).await.map_err(|e| {
            tracing::error!(error = %e, "Failed to run migrations");
            Error::Storage(StorageError::Migration(
                "Failed to run migrations".to_string(),
            ))
        })?;

        Ok(())
    }

    async fn health_check(&self) -> Result<(), Error> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| Error::Storage(StorageError::Database(e.to_string())))?;
        Ok(())
    }
}
