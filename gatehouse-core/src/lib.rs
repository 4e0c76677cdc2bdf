//! Core functionality for the gatehouse login throttling library
//!
//! This crate holds the throttling state machine: per-client retry counting,
//! lockouts with escalating durations, the lockout audit log, and the
//! coordinator an authentication layer calls on every attempt.
//!
//! All state lives in a key-value store behind [`OptionRepository`]. Storage
//! backends implement that trait; see `gatehouse-storage-sqlite`, or
//! [`MemoryOptionRepository`] for tests. Application code normally goes
//! through the `gatehouse` facade crate instead of wiring services by hand.
//!
//! See [`LockoutConfig`] for the settings and [`LoginAttemptCoordinator`]
//! for the entry point.
pub mod clock;
pub mod config;
pub mod error;
pub mod events;
pub mod identity;
pub mod options;
pub mod repositories;
pub mod services;
pub mod storage;

pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use config::LockoutConfig;
pub use error::Error;
pub use events::{Event, EventBus, EventHandler};
pub use identity::{ClientIdentity, IdentityResolver, SiteConnection};
pub use options::OptionName;
pub use repositories::{
    MemoryOptionRepository, MemoryRepositoryProvider, OptionRepository, OptionStore,
    RepositoryProvider,
};
pub use services::{
    AuthDecision, FailureOutcome, LockoutEngine, LockoutLog, LockoutNotice, LockoutNotifier,
    LockoutStatistics, LoginAttemptCoordinator, RetryTracker,
};
pub use storage::{LockoutLogEntry, LockoutRecord, LockoutState, RetryRecord};
