use std::sync::Arc;

use chrono::{DateTime, Duration};
use gatehouse_core::{
    ClientIdentity, FailureOutcome, LockoutConfig, LockoutEngine, LockoutLog,
    LoginAttemptCoordinator, ManualClock, OptionRepository, OptionStore, RepositoryProvider,
    RetryTracker, SharedClock, options,
};
use gatehouse_storage_sqlite::{SqliteRepositoryProvider, SqliteStorage};

async fn provider() -> SqliteRepositoryProvider {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let provider = SqliteStorage::connect("sqlite::memory:")
        .await
        .unwrap()
        .into_provider();
    provider.migrate().await.unwrap();
    provider
}

#[tokio::test]
async fn migrate_twice_and_health_check() {
    let provider = provider().await;
    provider.migrate().await.unwrap();
    provider.health_check().await.unwrap();
}

#[tokio::test]
async fn config_round_trips_through_sqlite() {
    let provider = provider().await;
    let store = OptionStore::new(provider.options());

    assert_eq!(LockoutConfig::install_defaults(&store).await.unwrap(), 10);
    assert_eq!(LockoutConfig::install_defaults(&store).await.unwrap(), 0);

    options::set_option(provider.options().as_ref(), "allowed_retries", &"7".into())
        .await
        .unwrap();
    let config = LockoutConfig::load(&store).await.unwrap();
    assert_eq!(config.allowed_retries, 7);
    assert_eq!(config.normal_lockout_time, Duration::minutes(20));
}

#[tokio::test]
async fn lockout_persists_in_sqlite() {
    let provider = provider().await;
    let store = OptionStore::new(provider.options());
    let clock = ManualClock::new(DateTime::from_timestamp(1_700_000_000, 0).unwrap());
    let shared: SharedClock = Arc::new(clock.clone());
    let config = Arc::new(LockoutConfig {
        allowed_retries: 2,
        ..Default::default()
    });

    let retries = Arc::new(RetryTracker::new(
        store.clone(),
        shared.clone(),
        config.retries_reset_window,
    ));
    let lockouts = Arc::new(LockoutEngine::new(
        store.clone(),
        retries.clone(),
        Arc::new(LockoutLog::new(store.clone())),
        config.clone(),
        shared.clone(),
    ));
    let coordinator = LoginAttemptCoordinator::new(retries, lockouts.clone(), config, shared);
    let identity = ClientIdentity::new("192.0.2.10");

    coordinator.on_login_failure(&identity, "admin").await.unwrap();
    let outcome = coordinator.on_login_failure(&identity, "admin").await.unwrap();
    assert!(outcome.is_locked_out());
    assert!(matches!(outcome, FailureOutcome::LockedOut { remaining_seconds: 1200, .. }));

    let active = lockouts.active_lockouts().await.unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].0, identity);

    // The lockout record, the total counter and the lockout log; retries were cleared.
    assert_eq!(options::purge_all(provider.options().as_ref()).await.unwrap(), 3);
    assert!(lockouts.active_lockouts().await.unwrap().is_empty());
}

#[tokio::test]
async fn lockouts_are_stored_one_row_per_identity() {
    let provider = provider().await;
    let store = OptionStore::new(provider.options());
    let shared: SharedClock = Arc::new(ManualClock::default());
    let config = Arc::new(LockoutConfig {
        allowed_retries: 1,
        ..Default::default()
    });
    let retries = Arc::new(RetryTracker::new(
        store.clone(),
        shared.clone(),
        config.retries_reset_window,
    ));
    let lockouts = LockoutEngine::new(
        store.clone(),
        retries,
        Arc::new(LockoutLog::new(store.clone())),
        config,
        shared,
    );

    for id in ["192.0.2.10", "2001:db8::10"] {
        lockouts
            .maybe_lockout(&ClientIdentity::new(id), 1, Some("admin"))
            .await
            .unwrap();
    }

    assert_eq!(
        provider
            .options()
            .names_with_prefix("gatehouse_lockouts_")
            .await
            .unwrap(),
        vec!["gatehouse_lockouts_192.0.2.10", "gatehouse_lockouts_2001:db8::10"]
    );
    assert_eq!(lockouts.purge_stale().await.unwrap(), 0);
    assert_eq!(lockouts.restore_lockouts().await.unwrap(), 2);
    assert!(
        !lockouts
            .check(&ClientIdentity::new("2001:db8::10"))
            .await
            .unwrap()
            .is_locked()
    );
}
