//! Tests for the Gatehouse builder pattern

use chrono::Duration;
use gatehouse::{GatehouseBuilder, GatehouseBuilderError, LockoutConfig};
use serde_json::json;

#[cfg(feature = "sqlite")]
#[tokio::test]
async fn test_builder_with_sqlite() {
    let gatehouse = GatehouseBuilder::new()
        .with_sqlite("sqlite::memory:")
        .await
        .expect("Failed to connect to SQLite")
        .apply_migrations(true)
        .build()
        .await
        .expect("Failed to build Gatehouse");

    gatehouse.health_check().await.expect("Health check failed");
    assert_eq!(gatehouse.config(), &LockoutConfig::default());
}

#[cfg(feature = "sqlite")]
#[tokio::test]
async fn test_builder_with_sqlite_pool() {
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to connect to SQLite");

    let gatehouse = GatehouseBuilder::new()
        .with_sqlite_pool(pool)
        .apply_migrations(true)
        .build()
        .await
        .expect("Failed to build Gatehouse");

    gatehouse.health_check().await.expect("Health check failed");
}

#[cfg(feature = "sqlite")]
#[tokio::test]
async fn test_stored_settings_need_migrations() {
    let result = GatehouseBuilder::new()
        .with_sqlite("sqlite::memory:")
        .await
        .expect("Failed to connect to SQLite")
        .build()
        .await;

    assert!(matches!(
        result,
        Err(GatehouseBuilderError::StorageConnection(_))
    ));
}

#[cfg(feature = "sqlite")]
#[tokio::test]
async fn test_manual_migration_with_explicit_config() {
    let gatehouse = GatehouseBuilder::new()
        .with_sqlite("sqlite::memory:")
        .await
        .expect("Failed to connect to SQLite")
        .with_config(LockoutConfig::default())
        .build()
        .await
        .expect("Failed to build Gatehouse");

    gatehouse.migrate().await.expect("Migration failed");
    gatehouse.health_check().await.expect("Health check failed");
}

#[tokio::test]
async fn test_builder_with_memory_store_installs_defaults() {
    let gatehouse = GatehouseBuilder::new()
        .with_memory_store()
        .build()
        .await
        .expect("Failed to build Gatehouse");

    assert_eq!(gatehouse.config(), &LockoutConfig::default());
    gatehouse
        .set_option("allowed_retries", &json!("9"))
        .await
        .unwrap();
    // The running handle keeps the settings it was built with
    assert_eq!(gatehouse.config().allowed_retries, 4);
}

#[tokio::test]
async fn test_builder_rejects_invalid_config() {
    let result = GatehouseBuilder::new()
        .with_memory_store()
        .with_config(LockoutConfig {
            allowed_retries: 0,
            ..Default::default()
        })
        .build()
        .await;

    assert!(matches!(
        result,
        Err(GatehouseBuilderError::InvalidConfiguration(_))
    ));
}

#[tokio::test]
async fn test_builder_with_explicit_config() {
    let gatehouse = GatehouseBuilder::new()
        .with_memory_store()
        .with_config(LockoutConfig {
            allowed_retries: 2,
            normal_lockout_time: Duration::minutes(5),
            ..Default::default()
        })
        .build()
        .await
        .unwrap();

    assert_eq!(gatehouse.config().allowed_retries, 2);
    assert_eq!(gatehouse.config().normal_lockout_time, Duration::minutes(5));
}
