//! Operator-facing lockout statistics.

use std::sync::Arc;

use crate::{
    Error,
    identity::ClientIdentity,
    options::OptionName,
    repositories::{OptionRepository, OptionStore},
    services::lockouts::LockoutEngine,
    storage::LockoutRecord,
};

/// Bump the monotonic total-lockouts counter.
pub(crate) async fn increment_total_lockouts<R: OptionRepository>(
    store: &OptionStore<R>,
) -> Result<u64, Error> {
    let total: u64 = store.load_or_default(OptionName::TotalLockouts).await?;
    let total = total.saturating_add(1);
    store.save(OptionName::TotalLockouts, &total).await?;
    Ok(total)
}

pub struct LockoutStatistics<R: OptionRepository> {
    store: OptionStore<R>,
    lockouts: Arc<LockoutEngine<R>>,
}

impl<R: OptionRepository> LockoutStatistics<R> {
    pub fn new(store: OptionStore<R>, lockouts: Arc<LockoutEngine<R>>) -> Self {
        Self { store, lockouts }
    }

    /// Lockouts issued since the counter was last reset.
    pub async fn total_lockouts(&self) -> Result<u64, Error> {
        self.store.load_or_default(OptionName::TotalLockouts).await
    }

    pub async fn reset_total_lockouts(&self) -> Result<(), Error> {
        self.store.save(OptionName::TotalLockouts, &0u64).await?;
        tracing::info!("Reset total lockouts");
        Ok(())
    }

    /// Currently active lockouts, soonest expiry first.
    pub async fn active_lockouts(&self) -> Result<Vec<(ClientIdentity, LockoutRecord)>, Error> {
        self.lockouts.active_lockouts().await
    }

    pub async fn active_lockout_count(&self) -> Result<usize, Error> {
        Ok(self.active_lockouts().await?.len())
    }

    /// Lift every lockout. Returns how many were active.
    pub async fn restore_lockouts(&self) -> Result<usize, Error> {
        self.lockouts.restore_lockouts().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        clock::{ManualClock, SharedClock},
        config::LockoutConfig,
        repositories::MemoryOptionRepository,
        services::{lockout_log::LockoutLog, retries::RetryTracker},
    };
    use chrono::Duration;

    type Engine = LockoutEngine<MemoryOptionRepository>;

    fn setup() -> (
        LockoutStatistics<MemoryOptionRepository>,
        Arc<Engine>,
        ManualClock,
    ) {
        let store = OptionStore::new(Arc::new(MemoryOptionRepository::new()));
        let clock = ManualClock::default();
        let shared: SharedClock = Arc::new(clock.clone());
        let config = LockoutConfig {
            allowed_retries: 1,
            ..Default::default()
        };
        let retries = Arc::new(RetryTracker::new(
            store.clone(),
            shared.clone(),
            config.retries_reset_window,
        ));
        let engine = Arc::new(LockoutEngine::new(
            store.clone(),
            retries,
            Arc::new(LockoutLog::new(store.clone())),
            Arc::new(config),
            shared,
        ));
        (LockoutStatistics::new(store, engine.clone()), engine, clock)
    }

    #[tokio::test]
    async fn test_total_lockouts_counts_and_resets() {
        let (stats, engine, _) = setup();
        assert_eq!(stats.total_lockouts().await.unwrap(), 0);

        for ip in ["192.0.2.1", "192.0.2.2", "192.0.2.1"] {
            engine
                .maybe_lockout(&ClientIdentity::new(ip), 1, None)
                .await
                .unwrap();
        }
        assert_eq!(stats.total_lockouts().await.unwrap(), 3);

        stats.reset_total_lockouts().await.unwrap();
        assert_eq!(stats.total_lockouts().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_active_lockouts_are_derived() {
        let (stats, engine, clock) = setup();
        engine
            .maybe_lockout(&ClientIdentity::new("192.0.2.1"), 1, None)
            .await
            .unwrap();
        assert_eq!(stats.active_lockout_count().await.unwrap(), 1);

        clock.advance(Duration::hours(1));
        assert_eq!(stats.active_lockout_count().await.unwrap(), 0);
        assert_eq!(stats.total_lockouts().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_restore_lockouts() {
        let (stats, engine, _) = setup();
        engine
            .maybe_lockout(&ClientIdentity::new("192.0.2.1"), 1, None)
            .await
            .unwrap();

        assert_eq!(stats.restore_lockouts().await.unwrap(), 1);
        assert!(stats.active_lockouts().await.unwrap().is_empty());
    }
}
