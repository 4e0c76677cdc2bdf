//! Service layer for the throttling logic
//!
//! Each service owns one kind of persisted state and reaches the others only
//! through their public methods. [`LoginAttemptCoordinator`] ties them
//! together for an authentication layer.

pub mod lockout_log;
pub mod lockouts;
pub mod login_attempts;
pub mod notification;
pub mod retries;
pub mod statistics;

pub use lockout_log::LockoutLog;
pub use lockouts::LockoutEngine;
pub use login_attempts::{AuthDecision, FailureOutcome, LoginAttemptCoordinator, lockout_message};
pub use notification::{LockoutNotice, LockoutNotifier};
pub use retries::RetryTracker;
pub use statistics::LockoutStatistics;

#[cfg(feature = "mailer")]
pub use notification::MailerNotifier;
