use std::sync::Arc;

use serde::{Serialize, de::DeserializeOwned};

use crate::{
    Error, error::utilities::corrupt, identity::ClientIdentity, options::OptionName,
    repositories::OptionRepository,
};

/// Typed view over an [`OptionRepository`].
///
/// Resolves [`OptionName`]s to their prefixed keys and (de)serializes values,
/// reporting a stored value of the wrong shape as `StorageError::Corrupt`.
pub struct OptionStore<R: OptionRepository> {
    repository: Arc<R>,
}

impl<R: OptionRepository> Clone for OptionStore<R> {
    fn clone(&self) -> Self {
        Self {
            repository: Arc::clone(&self.repository),
        }
    }
}

impl<R: OptionRepository> OptionStore<R> {
    pub fn new(repository: Arc<R>) -> Self {
        Self { repository }
    }

    pub fn repository(&self) -> &Arc<R> {
        &self.repository
    }

    pub async fn load<T: DeserializeOwned>(&self, name: OptionName) -> Result<Option<T>, Error> {
        self.load_key(&name.key()).await
    }

    /// Like [`load`](Self::load), falling back to `T::default()` when absent.
    pub async fn load_or_default<T: DeserializeOwned + Default>(
        &self,
        name: OptionName,
    ) -> Result<T, Error> {
        Ok(self.load(name).await?.unwrap_or_default())
    }

    pub async fn save<T: Serialize>(&self, name: OptionName, value: &T) -> Result<(), Error> {
        self.save_key(&name.key(), value).await
    }

    pub async fn remove(&self, name: OptionName) -> Result<bool, Error> {
        self.repository.delete(&name.key()).await
    }

    /// The record `identity` holds in `collection`, if any.
    pub async fn load_record<T: DeserializeOwned>(
        &self,
        collection: OptionName,
        identity: &ClientIdentity,
    ) -> Result<Option<T>, Error> {
        self.load_key(&collection.record_key(identity)).await
    }

    /// Write one identity's record without touching any other identity's.
    pub async fn save_record<T: Serialize>(
        &self,
        collection: OptionName,
        identity: &ClientIdentity,
        value: &T,
    ) -> Result<(), Error> {
        self.save_key(&collection.record_key(identity), value).await
    }

    pub async fn remove_record(
        &self,
        collection: OptionName,
        identity: &ClientIdentity,
    ) -> Result<bool, Error> {
        self.repository
            .delete(&collection.record_key(identity))
            .await
    }

    /// Every record in `collection`, ordered by key.
    ///
    /// Records deleted between listing and reading are skipped.
    pub async fn load_records<T: DeserializeOwned>(
        &self,
        collection: OptionName,
    ) -> Result<Vec<(ClientIdentity, T)>, Error> {
        let prefix = collection.record_prefix();
        let mut records = Vec::new();
        for key in self.repository.names_with_prefix(&prefix).await? {
            let Some(id) = key.strip_prefix(&prefix) else {
                continue;
            };
            if let Some(record) = self.load_key(&key).await? {
                records.push((ClientIdentity::new(id), record));
            }
        }
        Ok(records)
    }

    async fn load_key<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, Error> {
        match self.repository.get(key).await? {
            Some(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(|e| corrupt(key, e)),
            None => Ok(None),
        }
    }

    async fn save_key<T: Serialize>(&self, key: &str, value: &T) -> Result<(), Error> {
        let value = serde_json::to_value(value).map_err(|e| corrupt(key, e))?;
        self.repository.set(key, &value).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::StorageError, repositories::MemoryOptionRepository};
    use serde_json::json;

    #[tokio::test]
    async fn test_load_missing_is_none() {
        let store = OptionStore::new(Arc::new(MemoryOptionRepository::new()));
        let total: Option<u64> = store.load(OptionName::TotalLockouts).await.unwrap();
        assert!(total.is_none());
        assert_eq!(
            store
                .load_or_default::<u64>(OptionName::TotalLockouts)
                .await
                .unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn test_save_uses_prefixed_key() {
        let repo = Arc::new(MemoryOptionRepository::new());
        let store = OptionStore::new(repo.clone());

        store.save(OptionName::TotalLockouts, &7u64).await.unwrap();
        assert_eq!(
            repo.get("gatehouse_total_lockouts").await.unwrap(),
            Some(json!(7))
        );
        assert!(store.remove(OptionName::TotalLockouts).await.unwrap());
    }

    #[tokio::test]
    async fn test_records_live_under_their_own_keys() {
        let repo = Arc::new(MemoryOptionRepository::new());
        let store = OptionStore::new(repo.clone());
        let a = ClientIdentity::new("192.0.2.1");
        let b = ClientIdentity::new("2001:db8::7");

        store.save_record(OptionName::Retries, &a, &1u32).await.unwrap();
        store.save_record(OptionName::Retries, &b, &2u32).await.unwrap();
        store.save(OptionName::TotalLockouts, &9u64).await.unwrap();

        assert_eq!(
            repo.get("gatehouse_retries_2001:db8::7").await.unwrap(),
            Some(json!(2))
        );
        assert_eq!(
            store.load_records::<u32>(OptionName::Retries).await.unwrap(),
            vec![(a.clone(), 1), (b.clone(), 2)]
        );

        assert!(store.remove_record(OptionName::Retries, &a).await.unwrap());
        assert_eq!(
            store
                .load_record::<u32>(OptionName::Retries, &a)
                .await
                .unwrap(),
            None
        );
        assert_eq!(
            store
                .load_record::<u32>(OptionName::Retries, &b)
                .await
                .unwrap(),
            Some(2)
        );
    }

    #[tokio::test]
    async fn test_wrong_shape_is_corrupt() {
        let repo = Arc::new(MemoryOptionRepository::new());
        repo.set("gatehouse_total_lockouts", &json!("many"))
            .await
            .unwrap();
        let store = OptionStore::new(repo);

        let err = store
            .load::<u64>(OptionName::TotalLockouts)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Storage(StorageError::Corrupt { ref name, .. }) if name == "gatehouse_total_lockouts"
        ));
    }
}
