//! In-process option repository backed by [`DashMap`].
//!
//! Useful for tests and for single-process deployments that can afford to
//! lose throttling state on restart.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;

use crate::{
    Error,
    repositories::{OptionRepository, RepositoryProvider},
};

#[derive(Debug, Default)]
pub struct MemoryOptionRepository {
    values: DashMap<String, Value>,
}

impl MemoryOptionRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OptionRepository for MemoryOptionRepository {
    async fn get(&self, name: &str) -> Result<Option<Value>, Error> {
        Ok(self.values.get(name).map(|entry| entry.value().clone()))
    }

    async fn set(&self, name: &str, value: &Value) -> Result<(), Error> {
        self.values.insert(name.to_string(), value.clone());
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<bool, Error> {
        Ok(self.values.remove(name).is_some())
    }

    async fn names_with_prefix(&self, prefix: &str) -> Result<Vec<String>, Error> {
        let mut names: Vec<String> = self
            .values
            .iter()
            .filter(|entry| entry.key().starts_with(prefix))
            .map(|entry| entry.key().clone())
            .collect();
        names.sort();
        Ok(names)
    }
}

/// Repository provider for the in-memory backend. Migrations are a no-op.
#[derive(Debug, Default, Clone)]
pub struct MemoryRepositoryProvider {
    options: Arc<MemoryOptionRepository>,
}

impl MemoryRepositoryProvider {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RepositoryProvider for MemoryRepositoryProvider {
    type OptionRepo = MemoryOptionRepository;

    fn options(&self) -> Arc<Self::OptionRepo> {
        Arc::clone(&self.options)
    }

    async fn migrate(&self) -> Result<(), Error> {
        Ok(())
    }

    async fn health_check(&self) -> Result<(), Error> {
        Ok(())
    }
}
