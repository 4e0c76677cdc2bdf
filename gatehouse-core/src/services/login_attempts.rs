//! Login attempt coordination.
//!
//! [`LoginAttemptCoordinator`] is what an authentication layer talks to. It
//! consults the lockout engine before credentials are checked, counts
//! failures, escalates them into lockouts, and clears retries on success.
//! Cookie re-authentication goes through the same path when
//! `handle_cookie_login` is enabled.
//!
//! # Example
//!
//! ```rust,ignore
//! let identity = coordinator.resolve_identity(peer_addr, forwarded_for);
//! if let AuthDecision::Deny { .. } = coordinator.before_authenticate(&identity).await {
//!     return Err(TooManyAttempts);
//! }
//! if verify(&username, &password) {
//!     coordinator.on_login_success(&identity).await?;
//! } else {
//!     let outcome = coordinator.on_login_failure(&identity, &username).await?;
//!     show_error(outcome.message());
//! }
//! ```

use std::net::IpAddr;
use std::sync::Arc;

use crate::{
    Error,
    clock::SharedClock,
    config::LockoutConfig,
    events::{Event, EventBus, emit_logged},
    identity::{ClientIdentity, IdentityResolver},
    repositories::OptionRepository,
    services::{lockouts::LockoutEngine, retries::RetryTracker},
    storage::{LockoutRecord, LockoutState},
};

/// How often expired throttling state is purged.
const CLEANUP_INTERVAL: std::time::Duration = std::time::Duration::from_secs(3600);

/// Answer to "may this identity attempt to authenticate?"
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthDecision {
    Allow,
    Deny { remaining_seconds: u64 },
}

impl AuthDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, AuthDecision::Allow)
    }

    /// Message to show a denied client.
    pub fn message(&self) -> Option<String> {
        match self {
            AuthDecision::Allow => None,
            AuthDecision::Deny { remaining_seconds } => Some(lockout_message(*remaining_seconds)),
        }
    }
}

/// What a reported failure led to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureOutcome {
    /// The identity was already locked out; nothing was counted.
    Denied { remaining_seconds: u64 },
    /// The failure was counted and the threshold not yet reached.
    Counted { retries: u32, remaining_retries: u32 },
    /// This failure issued a lockout.
    LockedOut {
        record: LockoutRecord,
        remaining_seconds: u64,
    },
    /// Cookie failure while cookie handling is disabled.
    Ignored,
}

impl FailureOutcome {
    pub fn is_locked_out(&self) -> bool {
        matches!(
            self,
            FailureOutcome::Denied { .. } | FailureOutcome::LockedOut { .. }
        )
    }

    /// Message to append to the login error, if any.
    pub fn message(&self) -> Option<String> {
        match self {
            FailureOutcome::Denied { remaining_seconds }
            | FailureOutcome::LockedOut {
                remaining_seconds, ..
            } => Some(lockout_message(*remaining_seconds)),
            FailureOutcome::Counted {
                remaining_retries, ..
            } => Some(match remaining_retries {
                1 => "1 attempt remaining.".to_string(),
                n => format!("{n} attempts remaining."),
            }),
            FailureOutcome::Ignored => None,
        }
    }
}

/// "Too many failed login attempts" with the wait, in hours past two hours
/// and in minutes below that. Both round up.
pub fn lockout_message(remaining_seconds: u64) -> String {
    let wait = if remaining_seconds > 2 * 3600 {
        format!("{} hours", remaining_seconds.div_ceil(3600))
    } else {
        match remaining_seconds.div_ceil(60).max(1) {
            1 => "1 minute".to_string(),
            n => format!("{n} minutes"),
        }
    };
    format!("Too many failed login attempts. Please try again in {wait}.")
}

pub struct LoginAttemptCoordinator<R: OptionRepository> {
    retries: Arc<RetryTracker<R>>,
    lockouts: Arc<LockoutEngine<R>>,
    config: Arc<LockoutConfig>,
    resolver: IdentityResolver,
    clock: SharedClock,
    events: Option<EventBus>,
}

impl<R: OptionRepository> LoginAttemptCoordinator<R> {
    pub fn new(
        retries: Arc<RetryTracker<R>>,
        lockouts: Arc<LockoutEngine<R>>,
        config: Arc<LockoutConfig>,
        clock: SharedClock,
    ) -> Self {
        Self {
            retries,
            lockouts,
            resolver: IdentityResolver::new(config.site_connection),
            config,
            clock,
            events: None,
        }
    }

    pub fn with_event_bus(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    pub fn config(&self) -> &LockoutConfig {
        &self.config
    }

    /// Identity for a request, honoring the configured site connection.
    pub fn resolve_identity(&self, peer: IpAddr, forwarded_for: Option<&str>) -> ClientIdentity {
        self.resolver.resolve(peer, forwarded_for)
    }

    /// Decide whether `identity` may attempt to authenticate.
    ///
    /// Never fails: unreadable lockout state is treated as clear.
    pub async fn before_authenticate(&self, identity: &ClientIdentity) -> AuthDecision {
        match self.lockout_state(identity).await {
            LockoutState::Clear => AuthDecision::Allow,
            state => {
                let remaining_seconds = state.remaining_seconds();
                self.denied(identity, remaining_seconds).await;
                AuthDecision::Deny { remaining_seconds }
            }
        }
    }

    /// Report a failed login.
    ///
    /// A locked-out identity is denied without counting. Otherwise the
    /// failure is counted and may issue a lockout.
    ///
    /// # Errors
    ///
    /// Fails if the retry count or the lockout cannot be persisted.
    pub async fn on_login_failure(
        &self,
        identity: &ClientIdentity,
        attempted_username: &str,
    ) -> Result<FailureOutcome, Error> {
        let state = self.lockout_state(identity).await;
        if state.is_locked() {
            let remaining_seconds = state.remaining_seconds();
            self.denied(identity, remaining_seconds).await;
            return Ok(FailureOutcome::Denied { remaining_seconds });
        }

        let retries = self.retries.record_failure(identity).await?;
        emit_logged(
            self.events.as_ref(),
            Event::LoginFailed {
                identity: identity.clone(),
                attempted_username: Some(attempted_username.to_string()),
                retries,
                timestamp: self.clock.now(),
            },
        )
        .await;

        match self
            .lockouts
            .maybe_lockout(identity, retries, Some(attempted_username))
            .await?
        {
            Some(record) => Ok(FailureOutcome::LockedOut {
                remaining_seconds: record.state(self.clock.now()).remaining_seconds(),
                record,
            }),
            None => Ok(FailureOutcome::Counted {
                retries,
                remaining_retries: self.config.allowed_retries.saturating_sub(retries),
            }),
        }
    }

    /// Report a successful login. Clears retries; an active lockout stays.
    pub async fn on_login_success(&self, identity: &ClientIdentity) -> Result<(), Error> {
        if self.retries.clear(identity).await? {
            emit_logged(
                self.events.as_ref(),
                Event::RetriesCleared {
                    identity: identity.clone(),
                    timestamp: self.clock.now(),
                },
            )
            .await;
        }
        Ok(())
    }

    /// [`before_authenticate`](Self::before_authenticate) for a valid auth
    /// cookie. Always allows when cookie handling is disabled.
    pub async fn before_cookie_authenticate(&self, identity: &ClientIdentity) -> AuthDecision {
        if !self.config.handle_cookie_login {
            return AuthDecision::Allow;
        }
        self.before_authenticate(identity).await
    }

    /// [`on_login_failure`](Self::on_login_failure) for a bad auth cookie.
    ///
    /// # Arguments
    ///
    /// * `cookie_username` - Username carried by the cookie
    pub async fn on_cookie_failure(
        &self,
        identity: &ClientIdentity,
        cookie_username: &str,
    ) -> Result<FailureOutcome, Error> {
        if !self.config.handle_cookie_login {
            return Ok(FailureOutcome::Ignored);
        }
        self.on_login_failure(identity, cookie_username).await
    }

    /// Retries left before `identity` is locked out.
    pub async fn remaining_retries(&self, identity: &ClientIdentity) -> Result<u32, Error> {
        let count = self.retries.get_count(identity).await?;
        Ok(self.config.allowed_retries.saturating_sub(count))
    }

    /// Start the background cleanup task.
    ///
    /// Hourly, drops expired retry records and lockout records with nothing
    /// left to enforce.
    ///
    /// # Arguments
    ///
    /// * `shutdown` - A watch receiver that signals when to stop the task
    pub fn start_cleanup_task(
        &self,
        mut shutdown: tokio::sync::watch::Receiver<bool>,
    ) -> tokio::task::JoinHandle<()> {
        let retries = Arc::clone(&self.retries);
        let lockouts = Arc::clone(&self.lockouts);

        tokio::spawn(async move {
            let mut interval_timer = tokio::time::interval(CLEANUP_INTERVAL);

            loop {
                tokio::select! {
                    _ = interval_timer.tick() => {
                        match retries.purge_expired().await {
                            Ok(count) if count > 0 => {
                                tracing::info!(count = count, "Purged expired retry records");
                            }
                            Err(e) => {
                                tracing::warn!(error = %e, "Failed to purge retry records");
                            }
                            _ => {}
                        }
                        match lockouts.purge_stale().await {
                            Ok(count) if count > 0 => {
                                tracing::info!(count = count, "Purged stale lockout records");
                            }
                            Err(e) => {
                                tracing::warn!(error = %e, "Failed to purge lockout records");
                            }
                            _ => {}
                        }
                    }
                    _ = shutdown.changed() => {
                        tracing::info!("Shutting down lockout cleanup task");
                        break;
                    }
                }
            }
        })
    }

    async fn lockout_state(&self, identity: &ClientIdentity) -> LockoutState {
        match self.lockouts.check(identity).await {
            Ok(state) => state,
            Err(e) => {
                tracing::warn!(
                    identity = %identity,
                    error = %e,
                    "Failed to read lockout state, treating as clear"
                );
                LockoutState::Clear
            }
        }
    }

    async fn denied(&self, identity: &ClientIdentity, remaining_seconds: u64) {
        tracing::warn!(
            identity = %identity,
            remaining_seconds = remaining_seconds,
            "Denied login attempt from locked out client"
        );
        emit_logged(
            self.events.as_ref(),
            Event::LoginDenied {
                identity: identity.clone(),
                remaining_seconds,
                timestamp: self.clock.now(),
            },
        )
        .await;
    }
}
