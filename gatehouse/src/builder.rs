//! Builder pattern for constructing Gatehouse instances
//!
//! Storage must be chosen before anything else; the type state makes
//! `build()` unavailable until it is.
//!
//! # Example
//!
//! ```rust,no_run
//! use gatehouse::{GatehouseBuilder, LockoutConfig};
//! use chrono::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Settings read from the store, defaults installed on first run
//!     let gatehouse = GatehouseBuilder::new()
//!         .with_sqlite("sqlite://gatehouse.db")
//!         .await?
//!         .apply_migrations(true)
//!         .build()
//!         .await?;
//!
//!     // Or settings supplied by the application
//!     let gatehouse = GatehouseBuilder::new()
//!         .with_memory_store()
//!         .with_config(LockoutConfig {
//!             allowed_retries: 3,
//!             normal_lockout_time: Duration::minutes(30),
//!             ..Default::default()
//!         })
//!         .build()
//!         .await?;
//!
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

use gatehouse_core::{
    EventBus, LockoutConfig, LockoutNotifier, MemoryRepositoryProvider, OptionStore,
    RepositoryProvider, SharedClock, SystemClock,
};

use crate::Gatehouse;

#[cfg(feature = "mailer")]
use crate::MailerConfig;

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur when building a Gatehouse instance.
#[derive(Debug, thiserror::Error)]
pub enum GatehouseBuilderError {
    /// Failed to connect to storage backend
    #[error("Storage connection failed: {0}")]
    StorageConnection(String),

    /// Failed to run database migrations
    #[error("Migration failed: {0}")]
    Migration(String),

    /// Settings missing from the store, or invalid
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[cfg(feature = "mailer")]
    #[error("Mailer configuration failed: {0}")]
    MailerConfiguration(String),
}

// ============================================================================
// Type-State Markers
// ============================================================================

/// Marker type indicating no storage has been configured yet.
pub struct NoStorage;

/// Marker type indicating storage has been configured.
pub struct WithStorage<R: RepositoryProvider> {
    repositories: Arc<R>,
}

/// Where the settings come from at build time.
enum ConfigSource {
    /// Install defaults for absent options, then read the store
    Stored,
    Explicit(LockoutConfig),
}

// ============================================================================
// Builder Implementation
// ============================================================================

/// A type-safe builder for constructing [`Gatehouse`] instances.
///
/// # Type States
///
/// - [`NoStorage`]: Initial state, storage must be configured
/// - [`WithStorage<R>`]: Storage configured, ready to build or add more configuration
pub struct GatehouseBuilder<Storage> {
    storage: Storage,
    config: ConfigSource,
    clock: SharedClock,
    events: Option<EventBus>,
    notifier: Option<Arc<dyn LockoutNotifier>>,
    apply_migrations: bool,
    #[cfg(feature = "mailer")]
    mailer_config: Option<MailerConfig>,
}

impl Default for GatehouseBuilder<NoStorage> {
    fn default() -> Self {
        Self::new()
    }
}

impl GatehouseBuilder<NoStorage> {
    /// Create a new builder.
    ///
    /// # Defaults
    ///
    /// - Settings: read from the store
    /// - Clock: system clock
    /// - Event bus and notifier: none
    /// - Apply migrations: false
    pub fn new() -> Self {
        Self {
            storage: NoStorage,
            config: ConfigSource::Stored,
            clock: Arc::new(SystemClock),
            events: None,
            notifier: None,
            apply_migrations: false,
            #[cfg(feature = "mailer")]
            mailer_config: None,
        }
    }

    fn with_repositories<R: RepositoryProvider>(
        self,
        repositories: Arc<R>,
    ) -> GatehouseBuilder<WithStorage<R>> {
        GatehouseBuilder {
            storage: WithStorage { repositories },
            config: self.config,
            clock: self.clock,
            events: self.events,
            notifier: self.notifier,
            apply_migrations: self.apply_migrations,
            #[cfg(feature = "mailer")]
            mailer_config: self.mailer_config,
        }
    }

    /// Use any storage backend.
    pub fn with_provider<R: RepositoryProvider>(
        self,
        repositories: Arc<R>,
    ) -> GatehouseBuilder<WithStorage<R>> {
        self.with_repositories(repositories)
    }

    /// Keep all state in process memory. Nothing survives a restart.
    pub fn with_memory_store(self) -> GatehouseBuilder<WithStorage<MemoryRepositoryProvider>> {
        self.with_repositories(Arc::new(MemoryRepositoryProvider::new()))
    }
}

// ============================================================================
// Storage Configuration Methods (NoStorage -> WithStorage)
// ============================================================================

#[cfg(feature = "sqlite")]
impl GatehouseBuilder<NoStorage> {
    /// Configure SQLite storage by connecting to the given URL.
    ///
    /// # Arguments
    ///
    /// * `url` - SQLite connection URL (e.g., "sqlite::memory:" or "sqlite://path/to/db.sqlite")
    pub async fn with_sqlite(
        self,
        url: &str,
    ) -> Result<GatehouseBuilder<WithStorage<crate::SqliteRepositoryProvider>>, GatehouseBuilderError>
    {
        let storage = crate::SqliteStorage::connect(url)
            .await
            .map_err(|e| GatehouseBuilderError::StorageConnection(e.to_string()))?;

        Ok(self.with_repositories(Arc::new(storage.into_provider())))
    }

    /// Configure SQLite storage with an existing connection pool.
    pub fn with_sqlite_pool(
        self,
        pool: sqlx::SqlitePool,
    ) -> GatehouseBuilder<WithStorage<crate::SqliteRepositoryProvider>> {
        self.with_repositories(Arc::new(crate::SqliteRepositoryProvider::new(pool)))
    }
}

// ============================================================================
// Configuration Methods (available after storage is configured)
// ============================================================================

impl<R: RepositoryProvider> GatehouseBuilder<WithStorage<R>> {
    /// Use `config` instead of the settings held in the store.
    ///
    /// The store is left untouched; `build()` validates the config.
    pub fn with_config(mut self, config: LockoutConfig) -> Self {
        self.config = ConfigSource::Explicit(config);
        self
    }

    /// Read settings from `GATEHOUSE_*` environment variables over the defaults.
    pub fn with_config_from_env(self) -> Result<Self, GatehouseBuilderError> {
        let config = LockoutConfig::from_env()
            .map_err(|e| GatehouseBuilderError::InvalidConfiguration(e.to_string()))?;
        Ok(self.with_config(config))
    }

    /// Replace the system clock, typically with a [`ManualClock`](crate::ManualClock) in tests.
    pub fn with_clock(mut self, clock: SharedClock) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_event_bus(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    /// Deliver lockout notifications through `notifier`.
    ///
    /// Only used when `notify_on_lockout_email_to_admin` is enabled.
    pub fn with_notifier(mut self, notifier: Arc<dyn LockoutNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Set whether to automatically apply database migrations during build.
    ///
    /// Default: false
    pub fn apply_migrations(mut self, apply: bool) -> Self {
        self.apply_migrations = apply;
        self
    }

    /// Email lockout notifications to `config.admin_address`.
    ///
    /// Ignored when a notifier was set with [`with_notifier`](Self::with_notifier).
    #[cfg(feature = "mailer")]
    pub fn with_mailer(mut self, config: MailerConfig) -> Self {
        self.mailer_config = Some(config);
        self
    }

    /// Configure the mailer from `MAILER_*` environment variables.
    #[cfg(feature = "mailer")]
    pub fn with_mailer_from_env(mut self) -> Result<Self, GatehouseBuilderError> {
        let config = MailerConfig::from_env()
            .map_err(|e| GatehouseBuilderError::MailerConfiguration(e.to_string()))?;
        self.mailer_config = Some(config);
        Ok(self)
    }

    /// Build the Gatehouse instance.
    ///
    /// Runs migrations first if `apply_migrations(true)` was called, then
    /// resolves the settings.
    pub async fn build(self) -> Result<Gatehouse<R>, GatehouseBuilderError> {
        let repositories = self.storage.repositories;

        if self.apply_migrations {
            repositories
                .migrate()
                .await
                .map_err(|e| GatehouseBuilderError::Migration(e.to_string()))?;
        }

        let config = match self.config {
            ConfigSource::Explicit(config) => {
                config
                    .validate()
                    .map_err(|e| GatehouseBuilderError::InvalidConfiguration(e.to_string()))?;
                config
            }
            ConfigSource::Stored => {
                let store = OptionStore::new(repositories.options());
                let installed = LockoutConfig::install_defaults(&store)
                    .await
                    .map_err(|e| GatehouseBuilderError::StorageConnection(e.to_string()))?;
                if installed > 0 {
                    tracing::info!(count = installed, "Installed default settings");
                }
                LockoutConfig::load(&store)
                    .await
                    .map_err(|e| GatehouseBuilderError::InvalidConfiguration(e.to_string()))?
            }
        };

        #[cfg(feature = "mailer")]
        let notifier = match (self.notifier, self.mailer_config) {
            (Some(notifier), _) => Some(notifier),
            (None, Some(mailer_config)) => {
                let notifier = crate::MailerNotifier::new(mailer_config)
                    .map_err(|e| GatehouseBuilderError::MailerConfiguration(e.to_string()))?;
                Some(Arc::new(notifier) as Arc<dyn LockoutNotifier>)
            }
            (None, None) => None,
        };
        #[cfg(not(feature = "mailer"))]
        let notifier = self.notifier;

        if config.notify_on_lockout_email_to_admin && notifier.is_none() {
            tracing::warn!("Lockout emails are enabled but no notifier is configured");
        }

        Ok(Gatehouse::from_parts(
            repositories,
            config,
            self.clock,
            self.events,
            notifier,
        ))
    }
}
