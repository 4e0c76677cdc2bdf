//! # Gatehouse
//!
//! Gatehouse throttles login attempts. It counts failed attempts per client,
//! locks a client out once the count reaches the configured limit, and
//! lengthens the lockout for clients that keep coming back. The same
//! throttling can be applied to cookie re-authentication.
//!
//! Your authentication layer asks [`Gatehouse::before_authenticate`] whether
//! to run a credential check at all, then reports the result through
//! [`Gatehouse::on_login_failure`] or [`Gatehouse::on_login_success`].
//!
//! ## Storage Support
//!
//! - SQLite (feature `sqlite`, default)
//! - In-memory, for tests and single-process tools
//!
//! ## Example
//!
//! ```rust,no_run
//! use gatehouse::{AuthDecision, GatehouseBuilder};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let gatehouse = GatehouseBuilder::new()
//!         .with_sqlite("sqlite://gatehouse.db")
//!         .await?
//!         .apply_migrations(true)
//!         .build()
//!         .await?;
//!
//!     let client = gatehouse.resolve_identity("203.0.113.9".parse()?, None);
//!     if let AuthDecision::Deny { .. } = gatehouse.before_authenticate(&client).await {
//!         return Ok(());
//!     }
//!
//!     let outcome = gatehouse.on_login_failure(&client, "admin").await?;
//!     if let Some(message) = outcome.message() {
//!         println!("{message}");
//!     }
//!     Ok(())
//! }
//! ```
use std::net::IpAddr;
use std::sync::Arc;

use gatehouse_core::{
    OptionStore, RepositoryProvider, options,
    services::{
        LockoutEngine, LockoutLog, LockoutStatistics, LoginAttemptCoordinator, RetryTracker,
    },
};
use serde_json::Value;

mod builder;

pub use builder::{GatehouseBuilder, GatehouseBuilderError, NoStorage, WithStorage};

/// Re-export core types from gatehouse_core
pub use gatehouse_core::{
    AuthDecision, ClientIdentity, Event, EventBus, EventHandler, FailureOutcome, LockoutConfig,
    LockoutLogEntry, LockoutNotice, LockoutNotifier, LockoutRecord, LockoutState, ManualClock,
    MemoryRepositoryProvider, OptionName, SharedClock, SiteConnection, SystemClock,
};

#[cfg(feature = "sqlite")]
pub use gatehouse_storage_sqlite::{SqliteRepositoryProvider, SqliteStorage};

#[cfg(feature = "mailer")]
pub use gatehouse_core::services::MailerNotifier;

#[cfg(feature = "mailer")]
pub use gatehouse_mailer::MailerConfig;

/// Errors returned by [`Gatehouse`] operations.
#[derive(Debug, thiserror::Error)]
pub enum GatehouseError {
    /// Error when interacting with storage
    #[error("Storage error: {0}")]
    Storage(String),
    /// A setting was rejected
    #[error("Invalid option: {0}")]
    InvalidOption(String),
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl From<gatehouse_core::Error> for GatehouseError {
    fn from(error: gatehouse_core::Error) -> Self {
        use gatehouse_core::Error;

        match error {
            Error::Validation(e) => GatehouseError::InvalidOption(e.to_string()),
            Error::Config(e) => GatehouseError::Configuration(e.to_string()),
            Error::Notification(e) => GatehouseError::Configuration(e.to_string()),
            Error::Storage(e) => GatehouseError::Storage(e.to_string()),
            Error::Event(e) => GatehouseError::Storage(e.to_string()),
        }
    }
}

type Repo<R> = <R as RepositoryProvider>::OptionRepo;

/// Login throttling handle.
///
/// Cheap to share behind an `Arc`. The configuration is fixed when the handle
/// is built; settings written with [`set_option`](Self::set_option) apply to
/// handles built afterwards.
pub struct Gatehouse<R: RepositoryProvider> {
    repositories: Arc<R>,
    config: Arc<LockoutConfig>,
    coordinator: Arc<LoginAttemptCoordinator<Repo<R>>>,
    lockouts: Arc<LockoutEngine<Repo<R>>>,
    retries: Arc<RetryTracker<Repo<R>>>,
    log: Arc<LockoutLog<Repo<R>>>,
    statistics: LockoutStatistics<Repo<R>>,
}

impl<R: RepositoryProvider> Gatehouse<R> {
    /// Create a handle over `repositories` with the system clock, no event
    /// bus and no notifier. Use [`GatehouseBuilder`] for anything else.
    pub fn new(repositories: Arc<R>, config: LockoutConfig) -> Self {
        let clock: SharedClock = Arc::new(SystemClock);
        Self::from_parts(repositories, config, clock, None, None)
    }

    pub(crate) fn from_parts(
        repositories: Arc<R>,
        config: LockoutConfig,
        clock: SharedClock,
        events: Option<EventBus>,
        notifier: Option<Arc<dyn LockoutNotifier>>,
    ) -> Self {
        let store = OptionStore::new(repositories.options());
        let config = Arc::new(config);

        let retries = Arc::new(RetryTracker::new(
            store.clone(),
            clock.clone(),
            config.retries_reset_window,
        ));
        let log = Arc::new(LockoutLog::new(store.clone()));

        let mut engine = LockoutEngine::new(
            store.clone(),
            retries.clone(),
            log.clone(),
            config.clone(),
            clock.clone(),
        );
        if let Some(events) = events.clone() {
            engine = engine.with_event_bus(events);
        }
        if let Some(notifier) = notifier {
            engine = engine.with_notifier(notifier);
        }
        let lockouts = Arc::new(engine);

        let mut coordinator =
            LoginAttemptCoordinator::new(retries.clone(), lockouts.clone(), config.clone(), clock);
        if let Some(events) = events {
            coordinator = coordinator.with_event_bus(events);
        }

        Self {
            statistics: LockoutStatistics::new(store, lockouts.clone()),
            repositories,
            config,
            coordinator: Arc::new(coordinator),
            lockouts,
            retries,
            log,
        }
    }

    /// Run migrations for the storage backend
    pub async fn migrate(&self) -> Result<(), GatehouseError> {
        self.repositories
            .migrate()
            .await
            .map_err(|e| GatehouseError::Storage(e.to_string()))
    }

    pub async fn health_check(&self) -> Result<(), GatehouseError> {
        self.repositories
            .health_check()
            .await
            .map_err(|e| GatehouseError::Storage(e.to_string()))
    }

    pub fn config(&self) -> &LockoutConfig {
        &self.config
    }

    pub fn coordinator(&self) -> &Arc<LoginAttemptCoordinator<Repo<R>>> {
        &self.coordinator
    }

    pub fn lockouts(&self) -> &Arc<LockoutEngine<Repo<R>>> {
        &self.lockouts
    }

    pub fn retries(&self) -> &Arc<RetryTracker<Repo<R>>> {
        &self.retries
    }

    pub fn lockout_log(&self) -> &Arc<LockoutLog<Repo<R>>> {
        &self.log
    }

    pub fn statistics(&self) -> &LockoutStatistics<Repo<R>> {
        &self.statistics
    }

    /// Identity of the client behind a request.
    ///
    /// # Arguments
    ///
    /// * `peer` - Address of the TCP peer
    /// * `forwarded_for` - Raw `X-Forwarded-For` header, if present
    pub fn resolve_identity(&self, peer: IpAddr, forwarded_for: Option<&str>) -> ClientIdentity {
        self.coordinator.resolve_identity(peer, forwarded_for)
    }

    /// Whether `identity` may attempt to authenticate. Fails open.
    pub async fn before_authenticate(&self, identity: &ClientIdentity) -> AuthDecision {
        self.coordinator.before_authenticate(identity).await
    }

    pub async fn on_login_failure(
        &self,
        identity: &ClientIdentity,
        attempted_username: &str,
    ) -> Result<FailureOutcome, GatehouseError> {
        Ok(self
            .coordinator
            .on_login_failure(identity, attempted_username)
            .await?)
    }

    pub async fn on_login_success(&self, identity: &ClientIdentity) -> Result<(), GatehouseError> {
        Ok(self.coordinator.on_login_success(identity).await?)
    }

    pub async fn before_cookie_authenticate(&self, identity: &ClientIdentity) -> AuthDecision {
        self.coordinator.before_cookie_authenticate(identity).await
    }

    pub async fn on_cookie_failure(
        &self,
        identity: &ClientIdentity,
        cookie_username: &str,
    ) -> Result<FailureOutcome, GatehouseError> {
        Ok(self
            .coordinator
            .on_cookie_failure(identity, cookie_username)
            .await?)
    }

    /// Current lockout state of `identity`, without side effects.
    pub async fn lockout_state(
        &self,
        identity: &ClientIdentity,
    ) -> Result<LockoutState, GatehouseError> {
        Ok(self.lockouts.check(identity).await?)
    }

    pub async fn remaining_retries(&self, identity: &ClientIdentity) -> Result<u32, GatehouseError> {
        Ok(self.coordinator.remaining_retries(identity).await?)
    }

    pub async fn total_lockouts(&self) -> Result<u64, GatehouseError> {
        Ok(self.statistics.total_lockouts().await?)
    }

    pub async fn reset_total_lockouts(&self) -> Result<(), GatehouseError> {
        Ok(self.statistics.reset_total_lockouts().await?)
    }

    pub async fn active_lockouts(
        &self,
    ) -> Result<Vec<(ClientIdentity, LockoutRecord)>, GatehouseError> {
        Ok(self.statistics.active_lockouts().await?)
    }

    /// Lift every lockout. Returns how many were active.
    pub async fn restore_lockouts(&self) -> Result<usize, GatehouseError> {
        Ok(self.statistics.restore_lockouts().await?)
    }

    /// Forget the escalation history of `identity`.
    pub async fn reset_escalation(&self, identity: &ClientIdentity) -> Result<bool, GatehouseError> {
        Ok(self.lockouts.reset_escalation(identity).await?)
    }

    pub async fn lockout_log_entries(&self) -> Result<Vec<LockoutLogEntry>, GatehouseError> {
        Ok(self.log.all_entries().await?)
    }

    pub async fn clear_lockout_log(&self) -> Result<(), GatehouseError> {
        Ok(self.log.clear().await?)
    }

    /// Validate and store one setting.
    ///
    /// # Arguments
    ///
    /// * `name` - Option name, with or without the `gatehouse_` prefix
    /// * `value` - New value; numeric strings and `yes`/`no` are accepted
    pub async fn set_option(&self, name: &str, value: &Value) -> Result<(), GatehouseError> {
        Ok(options::set_option(self.repositories.options().as_ref(), name, value).await?)
    }

    /// Remove every stored setting and record. Returns how many keys went.
    pub async fn purge_all(&self) -> Result<usize, GatehouseError> {
        Ok(options::purge_all(self.repositories.options().as_ref()).await?)
    }

    /// Start the background cleanup task.
    ///
    /// # Arguments
    ///
    /// * `shutdown` - A watch receiver that signals when to stop the task
    pub fn start_cleanup_task(
        &self,
        shutdown: tokio::sync::watch::Receiver<bool>,
    ) -> tokio::task::JoinHandle<()> {
        self.coordinator.start_cleanup_task(shutdown)
    }
}

impl<R: RepositoryProvider> std::fmt::Debug for Gatehouse<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gatehouse")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
