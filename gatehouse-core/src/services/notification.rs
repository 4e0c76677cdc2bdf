//! Lockout notification seam.
//!
//! The lockout engine hands a [`LockoutNotice`] to a [`LockoutNotifier`] on a
//! detached task, so delivery never delays the authentication decision.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use crate::{error::NotificationError, identity::ClientIdentity};

/// Details of an issued lockout, as handed to notifiers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockoutNotice {
    pub identity: ClientIdentity,
    pub attempted_username: Option<String>,
    pub locked_until: DateTime<Utc>,
    pub lockout_duration: Duration,
    pub escalation_count: u32,
    pub long_lockout: bool,
    /// Active lockouts across all identities, this one included
    pub active_lockouts: usize,
}

#[async_trait]
pub trait LockoutNotifier: Send + Sync + 'static {
    async fn notify(&self, notice: &LockoutNotice) -> Result<(), NotificationError>;
}

/// Deliver on a detached task, logging failure.
pub(crate) fn dispatch(notifier: Arc<dyn LockoutNotifier>, notice: LockoutNotice) {
    tokio::spawn(async move {
        if let Err(e) = notifier.notify(&notice).await {
            tracing::warn!(
                identity = %notice.identity,
                error = %e,
                "Failed to send lockout notification"
            );
        }
    });
}

#[cfg(feature = "mailer")]
pub use self::mailer_impl::MailerNotifier;

#[cfg(feature = "mailer")]
mod mailer_impl {
    use super::*;
    use gatehouse_mailer::prelude::*;

    /// Emails the configured admin address when a lockout is issued.
    pub struct MailerNotifier {
        transport: Box<dyn Mailer>,
        config: MailerConfig,
    }

    impl MailerNotifier {
        pub fn new(config: MailerConfig) -> Result<Self, NotificationError> {
            let transport = config
                .build_transport()
                .map_err(|e| NotificationError::Configuration(e.to_string()))?;
            Self::with_transport(transport, config)
        }

        pub fn from_env() -> Result<Self, NotificationError> {
            let config = MailerConfig::from_env()
                .map_err(|e| NotificationError::Configuration(e.to_string()))?;
            Self::new(config)
        }

        /// Use a caller-supplied transport instead of building one from `config`.
        pub fn with_transport(
            transport: Box<dyn Mailer>,
            config: MailerConfig,
        ) -> Result<Self, NotificationError> {
            if config.admin_address.trim().is_empty() {
                return Err(NotificationError::Configuration(
                    "admin address is required for lockout emails".to_string(),
                ));
            }
            Ok(Self { transport, config })
        }
    }

    #[async_trait]
    impl LockoutNotifier for MailerNotifier {
        async fn notify(&self, notice: &LockoutNotice) -> Result<(), NotificationError> {
            let details = LockoutDetails {
                identity: notice.identity.to_string(),
                attempted_username: notice.attempted_username.clone(),
                lockout_minutes: notice.lockout_duration.num_minutes(),
                locked_until: notice.locked_until.to_rfc2822(),
                escalation_count: notice.escalation_count,
                long_lockout: notice.long_lockout,
                active_lockouts: notice.active_lockouts,
            };

            let email = LockoutNotificationEmail::build(&self.config, &details)
                .map_err(|e| NotificationError::Delivery(e.to_string()))?;

            self.transport
                .send_email(email)
                .await
                .map_err(|e| NotificationError::Delivery(e.to_string()))?;

            tracing::info!(identity = %notice.identity, "Sent lockout notification");
            Ok(())
        }
    }

}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    struct SignallingNotifier {
        calls: AtomicUsize,
        done: Notify,
        fail: bool,
    }

    #[async_trait]
    impl LockoutNotifier for SignallingNotifier {
        async fn notify(&self, _notice: &LockoutNotice) -> Result<(), NotificationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.done.notify_one();
            if self.fail {
                Err(NotificationError::Delivery("smtp down".to_string()))
            } else {
                Ok(())
            }
        }
    }

    fn notice() -> LockoutNotice {
        LockoutNotice {
            identity: ClientIdentity::new("192.0.2.1"),
            attempted_username: None,
            locked_until: Utc::now(),
            lockout_duration: Duration::minutes(20),
            escalation_count: 1,
            long_lockout: false,
            active_lockouts: 1,
        }
    }

    #[tokio::test]
    async fn test_dispatch_runs_detached() {
        for fail in [false, true] {
            let notifier = Arc::new(SignallingNotifier {
                calls: AtomicUsize::new(0),
                done: Notify::new(),
                fail,
            });

            dispatch(notifier.clone(), notice());
            notifier.done.notified().await;
            assert_eq!(notifier.calls.load(Ordering::SeqCst), 1);
        }
    }
}
