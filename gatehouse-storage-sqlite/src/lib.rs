//! SQLite storage backend for gatehouse.
//!
//! Every option and record collection lives as one JSON text row in the
//! `gatehouse_options` table.
//!
//! ```rust,ignore
//! use gatehouse_storage_sqlite::SqliteStorage;
//!
//! let storage = SqliteStorage::connect("sqlite://gatehouse.db?mode=rwc").await?;
//! let provider = storage.into_provider();
//! provider.migrate().await?;
//! ```

pub mod migrations;
pub mod repositories;

pub use repositories::{SqliteOptionRepository, SqliteRepositoryProvider};

use std::str::FromStr;

use gatehouse_core::{Error, error::StorageError};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open a pool for `url`, creating the database file if missing.
    ///
    /// In-memory databases are private to a connection, so they get a
    /// single-connection pool.
    pub async fn connect(url: &str) -> Result<Self, Error> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| Error::Storage(StorageError::Connection(e.to_string())))?
            .create_if_missing(true);

        let mut pool_options = SqlitePoolOptions::new();
        if url.contains(":memory:") {
            pool_options = pool_options.max_connections(1);
        }

        let pool = pool_options.connect_with(options).await.map_err(|e| {
            tracing::error!(error = %e, "Failed to connect to SQLite");
            Error::Storage(StorageError::Connection(e.to_string()))
        })?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn into_provider(self) -> SqliteRepositoryProvider {
        SqliteRepositoryProvider::new(self.pool)
    }
}
