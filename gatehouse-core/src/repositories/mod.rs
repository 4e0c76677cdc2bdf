//! Repository traits for the data access layer
//!
//! All throttling state lives in a flat key-value store: one named value per
//! option or per record collection. Storage backends implement
//! [`OptionRepository`] and expose it through a [`RepositoryProvider`], which
//! adds lifecycle methods for migrations and health checks.
//!
//! The store promises nothing beyond last-writer-wins for a single key.
//! Services do read-modify-write on whole values, so two concurrent requests
//! for the same identity may each overwrite the other's update. That race is
//! accepted: at worst an attacker gains an extra attempt or two.

pub mod adapter;
pub mod memory;

pub use adapter::OptionStore;
pub use memory::{MemoryOptionRepository, MemoryRepositoryProvider};

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::Error;

/// Durable mapping from option name to JSON value.
#[async_trait]
pub trait OptionRepository: Send + Sync + 'static {
    /// Read a value, `None` when the name was never written or was deleted.
    async fn get(&self, name: &str) -> Result<Option<Value>, Error>;

    /// Create or overwrite a value.
    async fn set(&self, name: &str, value: &Value) -> Result<(), Error>;

    /// Delete a value.
    ///
    /// # Returns
    ///
    /// `true` if a value was present.
    async fn delete(&self, name: &str) -> Result<bool, Error>;

    /// List every stored name starting with `prefix`.
    async fn names_with_prefix(&self, prefix: &str) -> Result<Vec<String>, Error>;
}

/// Provider trait that storage implementations implement to expose their repository.
///
/// # Example
///
/// ```rust,ignore
/// use gatehouse_core::repositories::*;
///
/// struct MyStorage { options: Arc<MyOptionRepository> }
///
/// #[async_trait]
/// impl RepositoryProvider for MyStorage {
///     type OptionRepo = MyOptionRepository;
///     fn options(&self) -> Arc<Self::OptionRepo> { self.options.clone() }
///     async fn migrate(&self) -> Result<(), Error> { /* ... */ }
///     async fn health_check(&self) -> Result<(), Error> { /* ... */ }
/// }
/// ```
#[async_trait]
pub trait RepositoryProvider: Send + Sync + 'static {
    /// The option repository implementation type
    type OptionRepo: OptionRepository;

    /// Get a handle to the option repository
    fn options(&self) -> Arc<Self::OptionRepo>;

    /// Run schema migrations, if the backend has a schema
    async fn migrate(&self) -> Result<(), Error>;

    /// Check that the backend is reachable
    async fn health_check(&self) -> Result<(), Error>;
}
