//! Permanent audit trail of lockouts.
//!
//! Persisted as `{ identity: { attempted_username: occurrences } }`. Both
//! levels keep insertion order, which is the order [`LockoutLog::all_entries`]
//! reports. Nothing here feeds a security decision.

use serde_json::{Map, Value};

use crate::{
    Error,
    error::StorageError,
    identity::ClientIdentity,
    options::OptionName,
    repositories::{OptionRepository, OptionStore},
    storage::LockoutLogEntry,
};

pub struct LockoutLog<R: OptionRepository> {
    store: OptionStore<R>,
}

impl<R: OptionRepository> LockoutLog<R> {
    pub fn new(store: OptionStore<R>) -> Self {
        Self { store }
    }

    /// Increment the occurrence count for `(identity, attempted_username)`.
    ///
    /// # Returns
    ///
    /// The pair's occurrence count after this call.
    pub async fn record(
        &self,
        identity: &ClientIdentity,
        attempted_username: &str,
    ) -> Result<u64, Error> {
        let mut log = self.load().await?;

        let usernames = log
            .entry(identity.as_str())
            .or_insert_with(|| Value::Object(Map::new()))
            .as_object_mut()
            .ok_or_else(|| corrupt_entry(identity, "expected a map of usernames"))?;

        let previous = match usernames.get(attempted_username) {
            Some(value) => value
                .as_u64()
                .ok_or_else(|| corrupt_entry(identity, "expected an occurrence count"))?,
            None => 0,
        };
        let count = previous.saturating_add(1);
        usernames.insert(attempted_username.to_string(), Value::from(count));

        self.store.save(OptionName::LockoutLogs, &log).await?;
        Ok(count)
    }

    /// Flatten the log into rows, identities then usernames in insertion order.
    pub async fn all_entries(&self) -> Result<Vec<LockoutLogEntry>, Error> {
        let log = self.load().await?;
        let mut entries = Vec::new();

        for (identity, usernames) in &log {
            let identity = ClientIdentity::new(identity);
            let usernames = usernames
                .as_object()
                .ok_or_else(|| corrupt_entry(&identity, "expected a map of usernames"))?;
            for (username, count) in usernames {
                entries.push(LockoutLogEntry {
                    identity: identity.clone(),
                    attempted_username: username.clone(),
                    occurrence_count: count
                        .as_u64()
                        .ok_or_else(|| corrupt_entry(&identity, "expected an occurrence count"))?,
                });
            }
        }

        Ok(entries)
    }

    /// Remove the whole log.
    pub async fn clear(&self) -> Result<(), Error> {
        self.store.remove(OptionName::LockoutLogs).await?;
        tracing::info!("Cleared lockout log");
        Ok(())
    }

    async fn load(&self) -> Result<Map<String, Value>, Error> {
        self.store.load_or_default(OptionName::LockoutLogs).await
    }
}

fn corrupt_entry(identity: &ClientIdentity, reason: &str) -> Error {
    StorageError::Corrupt {
        name: OptionName::LockoutLogs.key(),
        reason: format!("{reason} for {identity}"),
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::MemoryOptionRepository;
    use serde_json::json;
    use std::sync::Arc;

    fn setup() -> (LockoutLog<MemoryOptionRepository>, Arc<MemoryOptionRepository>) {
        let repo = Arc::new(MemoryOptionRepository::new());
        (LockoutLog::new(OptionStore::new(repo.clone())), repo)
    }

    #[tokio::test]
    async fn test_record_counts_occurrences() {
        let (log, _) = setup();
        let identity = ClientIdentity::new("192.0.2.1");

        for expected in 1..=5 {
            assert_eq!(log.record(&identity, "admin").await.unwrap(), expected);
        }

        let entries = log.all_entries().await.unwrap();
        assert_eq!(
            entries,
            vec![LockoutLogEntry {
                identity,
                attempted_username: "admin".to_string(),
                occurrence_count: 5,
            }]
        );
    }

    #[tokio::test]
    async fn test_entries_keep_insertion_order() {
        let (log, _) = setup();
        let zed = ClientIdentity::new("203.0.113.9");
        let abe = ClientIdentity::new("192.0.2.1");

        log.record(&zed, "root").await.unwrap();
        log.record(&abe, "editor").await.unwrap();
        log.record(&zed, "admin").await.unwrap();
        log.record(&zed, "root").await.unwrap();

        let rows: Vec<(String, String, u64)> = log
            .all_entries()
            .await
            .unwrap()
            .into_iter()
            .map(|e| (e.identity.into_inner(), e.attempted_username, e.occurrence_count))
            .collect();

        assert_eq!(
            rows,
            vec![
                ("203.0.113.9".to_string(), "root".to_string(), 2),
                ("203.0.113.9".to_string(), "admin".to_string(), 1),
                ("192.0.2.1".to_string(), "editor".to_string(), 1),
            ]
        );
    }

    #[tokio::test]
    async fn test_persisted_shape() {
        let (log, repo) = setup();
        log.record(&ClientIdentity::new("192.0.2.1"), "admin")
            .await
            .unwrap();

        assert_eq!(
            repo.get("gatehouse_lockout_logs").await.unwrap(),
            Some(json!({ "192.0.2.1": { "admin": 1 } }))
        );
    }

    #[tokio::test]
    async fn test_clear() {
        let (log, _) = setup();
        log.record(&ClientIdentity::new("192.0.2.1"), "admin")
            .await
            .unwrap();
        log.clear().await.unwrap();
        assert!(log.all_entries().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_log_is_reported() {
        let (log, repo) = setup();
        repo.set("gatehouse_lockout_logs", &json!({ "192.0.2.1": 4 }))
            .await
            .unwrap();

        assert!(log.all_entries().await.unwrap_err().is_storage_error());
        assert!(
            log.record(&ClientIdentity::new("192.0.2.1"), "admin")
                .await
                .unwrap_err()
                .is_storage_error()
        );
    }
}
