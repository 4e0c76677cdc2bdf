//! Per-identity failed attempt counting.
//!
//! Each identity's [`RetryRecord`] is stored under its own key, so writes for
//! one identity never touch another's. Reads evaluate expiry lazily and never
//! write; expired records are dropped when overwritten or by
//! [`RetryTracker::purge_expired`].

use chrono::Duration;

use crate::{
    Error,
    clock::SharedClock,
    identity::ClientIdentity,
    options::OptionName,
    repositories::{OptionRepository, OptionStore},
    storage::RetryRecord,
};

pub struct RetryTracker<R: OptionRepository> {
    store: OptionStore<R>,
    clock: SharedClock,
    reset_window: Duration,
}

impl<R: OptionRepository> RetryTracker<R> {
    /// # Arguments
    ///
    /// * `store` - Typed option store holding the retry records
    /// * `clock` - Time source
    /// * `reset_window` - How long a count survives without a new failure
    pub fn new(store: OptionStore<R>, clock: SharedClock, reset_window: Duration) -> Self {
        Self {
            store,
            clock,
            reset_window,
        }
    }

    /// Count one failed attempt and return the resulting count.
    ///
    /// An absent or expired record starts over at 1. Every failure refreshes
    /// the validity window.
    pub async fn record_failure(&self, identity: &ClientIdentity) -> Result<u32, Error> {
        let now = self.clock.now();
        let count = self
            .load(identity)
            .await?
            .map_or(0, |record| record.live_count(now))
            .saturating_add(1);

        let record = RetryRecord {
            count,
            valid_until: now + self.reset_window,
        };
        self.store
            .save_record(OptionName::Retries, identity, &record)
            .await?;

        tracing::debug!(identity = %identity, retries = count, "Counted failed login attempt");
        Ok(count)
    }

    /// The live retry count, `0` when absent or expired. Never writes.
    pub async fn get_count(&self, identity: &ClientIdentity) -> Result<u32, Error> {
        let now = self.clock.now();
        Ok(self
            .load(identity)
            .await?
            .map_or(0, |record| record.live_count(now)))
    }

    /// The live record for `identity`, if any. Never writes.
    pub async fn get(&self, identity: &ClientIdentity) -> Result<Option<RetryRecord>, Error> {
        let now = self.clock.now();
        Ok(self
            .load(identity)
            .await?
            .filter(|record| !record.is_expired(now)))
    }

    /// Delete the record for `identity`.
    ///
    /// # Returns
    ///
    /// `true` if a live record was removed.
    pub async fn clear(&self, identity: &ClientIdentity) -> Result<bool, Error> {
        let live = self.get(identity).await?.is_some();
        let removed = self
            .store
            .remove_record(OptionName::Retries, identity)
            .await?;

        if removed && live {
            tracing::debug!(identity = %identity, "Cleared retry count");
        }
        Ok(removed && live)
    }

    /// Drop every expired record.
    ///
    /// # Returns
    ///
    /// The number of records removed.
    pub async fn purge_expired(&self) -> Result<usize, Error> {
        let now = self.clock.now();
        let mut purged = 0;
        for (identity, record) in self
            .store
            .load_records::<RetryRecord>(OptionName::Retries)
            .await?
        {
            if record.is_expired(now)
                && self
                    .store
                    .remove_record(OptionName::Retries, &identity)
                    .await?
            {
                purged += 1;
            }
        }
        Ok(purged)
    }

    async fn load(&self, identity: &ClientIdentity) -> Result<Option<RetryRecord>, Error> {
        self.store.load_record(OptionName::Retries, identity).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{clock::ManualClock, repositories::MemoryOptionRepository};
    use chrono::DateTime;
    use std::sync::Arc;

    fn setup() -> (
        RetryTracker<MemoryOptionRepository>,
        Arc<MemoryOptionRepository>,
        ManualClock,
    ) {
        let repo = Arc::new(MemoryOptionRepository::new());
        let clock = ManualClock::new(DateTime::from_timestamp(1_700_000_000, 0).unwrap());
        let tracker = RetryTracker::new(
            OptionStore::new(repo.clone()),
            Arc::new(clock.clone()),
            Duration::hours(12),
        );
        (tracker, repo, clock)
    }

    #[tokio::test]
    async fn test_record_failure_increments() {
        let (tracker, _, _) = setup();
        let identity = ClientIdentity::new("192.0.2.1");

        assert_eq!(tracker.record_failure(&identity).await.unwrap(), 1);
        assert_eq!(tracker.record_failure(&identity).await.unwrap(), 2);
        assert_eq!(tracker.get_count(&identity).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_identities_are_independent() {
        let (tracker, _, _) = setup();
        let a = ClientIdentity::new("192.0.2.1");
        let b = ClientIdentity::new("192.0.2.2");

        tracker.record_failure(&a).await.unwrap();
        tracker.record_failure(&a).await.unwrap();
        assert_eq!(tracker.record_failure(&b).await.unwrap(), 1);
        assert_eq!(tracker.get_count(&a).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_expired_record_restarts_at_one() {
        let (tracker, _, clock) = setup();
        let identity = ClientIdentity::new("192.0.2.1");

        tracker.record_failure(&identity).await.unwrap();
        tracker.record_failure(&identity).await.unwrap();

        clock.advance(Duration::hours(12) + Duration::seconds(1));
        assert_eq!(tracker.get_count(&identity).await.unwrap(), 0);
        assert_eq!(tracker.record_failure(&identity).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_failure_refreshes_window() {
        let (tracker, _, clock) = setup();
        let identity = ClientIdentity::new("192.0.2.1");

        tracker.record_failure(&identity).await.unwrap();
        clock.advance(Duration::hours(11));
        tracker.record_failure(&identity).await.unwrap();
        clock.advance(Duration::hours(11));

        assert_eq!(tracker.get_count(&identity).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_get_count_does_not_write() {
        let (tracker, repo, clock) = setup();
        let identity = ClientIdentity::new("192.0.2.1");
        tracker.record_failure(&identity).await.unwrap();
        let stored = repo.get("gatehouse_retries_192.0.2.1").await.unwrap();
        assert!(stored.is_some());

        clock.advance(Duration::days(1));
        assert_eq!(tracker.get_count(&identity).await.unwrap(), 0);
        assert!(tracker.get(&identity).await.unwrap().is_none());
        assert_eq!(repo.get("gatehouse_retries_192.0.2.1").await.unwrap(), stored);
    }

    #[tokio::test]
    async fn test_clear_removes_record() {
        let (tracker, _, _) = setup();
        let identity = ClientIdentity::new("192.0.2.1");

        tracker.record_failure(&identity).await.unwrap();
        assert!(tracker.clear(&identity).await.unwrap());
        assert!(!tracker.clear(&identity).await.unwrap());
        assert_eq!(tracker.get_count(&identity).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_clear_leaves_other_identities() {
        let (tracker, repo, _) = setup();
        let a = ClientIdentity::new("192.0.2.1");
        let b = ClientIdentity::new("192.0.2.2");
        tracker.record_failure(&a).await.unwrap();
        tracker.record_failure(&b).await.unwrap();

        tracker.clear(&a).await.unwrap();

        assert_eq!(tracker.get_count(&b).await.unwrap(), 1);
        assert_eq!(
            repo.names_with_prefix("gatehouse_retries_").await.unwrap(),
            vec!["gatehouse_retries_192.0.2.2"]
        );
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let (tracker, _, clock) = setup();
        tracker
            .record_failure(&ClientIdentity::new("192.0.2.1"))
            .await
            .unwrap();
        assert_eq!(tracker.purge_expired().await.unwrap(), 0);

        clock.advance(Duration::days(1));
        tracker
            .record_failure(&ClientIdentity::new("192.0.2.2"))
            .await
            .unwrap();
        assert_eq!(tracker.purge_expired().await.unwrap(), 1);
        assert_eq!(
            tracker
                .get_count(&ClientIdentity::new("192.0.2.2"))
                .await
                .unwrap(),
            1
        );
    }
}
