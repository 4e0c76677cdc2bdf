//! Lockout issuance, checks, and escalation.
//!
//! Each identity has at most one [`LockoutRecord`], stored under its own
//! `lockouts` key so issuing a lockout never rewrites another identity's
//! record. The record survives the block itself so the escalation count
//! carries over to the next lockout; the count resets only once
//! `retries_reset_window` passes without a new lockout.
//!
//! # Example
//!
//! ```rust,ignore
//! let count = retries.record_failure(&identity).await?;
//! if let Some(record) = engine.maybe_lockout(&identity, count, Some("admin")).await? {
//!     // deny until record.locked_until
//! }
//! ```

use std::sync::Arc;

use crate::{
    Error,
    clock::SharedClock,
    config::LockoutConfig,
    events::{Event, EventBus, emit_logged},
    identity::ClientIdentity,
    options::OptionName,
    repositories::{OptionRepository, OptionStore},
    services::{
        lockout_log::LockoutLog,
        notification::{LockoutNotice, LockoutNotifier, dispatch},
        retries::RetryTracker,
        statistics::increment_total_lockouts,
    },
    storage::{LockoutRecord, LockoutState},
};

pub struct LockoutEngine<R: OptionRepository> {
    store: OptionStore<R>,
    retries: Arc<RetryTracker<R>>,
    log: Arc<LockoutLog<R>>,
    config: Arc<LockoutConfig>,
    clock: SharedClock,
    events: Option<EventBus>,
    notifier: Option<Arc<dyn LockoutNotifier>>,
}

impl<R: OptionRepository> LockoutEngine<R> {
    pub fn new(
        store: OptionStore<R>,
        retries: Arc<RetryTracker<R>>,
        log: Arc<LockoutLog<R>>,
        config: Arc<LockoutConfig>,
        clock: SharedClock,
    ) -> Self {
        Self {
            store,
            retries,
            log,
            config,
            clock,
            events: None,
            notifier: None,
        }
    }

    pub fn with_event_bus(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    /// Notifier for the admin email. Only used when
    /// `notify_on_lockout_email_to_admin` is enabled.
    pub fn with_notifier(mut self, notifier: Arc<dyn LockoutNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn config(&self) -> &LockoutConfig {
        &self.config
    }

    /// Current lockout state for `identity`. Never writes.
    pub async fn check(&self, identity: &ClientIdentity) -> Result<LockoutState, Error> {
        let now = self.clock.now();
        Ok(self
            .record(identity)
            .await?
            .map_or(LockoutState::Clear, |record| record.state(now)))
    }

    /// The stored record for `identity`, active or not.
    pub async fn record(&self, identity: &ClientIdentity) -> Result<Option<LockoutRecord>, Error> {
        self.store.load_record(OptionName::Lockouts, identity).await
    }

    /// Issue a lockout if `count` has reached `allowed_retries`.
    ///
    /// # Arguments
    ///
    /// * `identity` - The offending client
    /// * `count` - Retry count just reported by the retry tracker
    /// * `attempted_username` - Username of the attempt, for the lockout log
    ///
    /// # Returns
    ///
    /// The new record when a lockout was issued, `None` below the threshold.
    ///
    /// # Errors
    ///
    /// Fails only if the lockout itself cannot be written, in which case the
    /// retry count is left untouched. Follow-up bookkeeping (clearing
    /// retries, the total counter, the lockout log) is best effort.
    pub async fn maybe_lockout(
        &self,
        identity: &ClientIdentity,
        count: u32,
        attempted_username: Option<&str>,
    ) -> Result<Option<LockoutRecord>, Error> {
        if count < self.config.allowed_retries {
            return Ok(None);
        }

        let now = self.clock.now();
        let previous = self.record(identity).await?;
        let was_active = previous.is_some_and(|record| record.is_active(now));

        let escalation_count = previous
            .map_or(0, |record| record.live_escalation_count(now))
            .saturating_add(1);
        let long_lockout = escalation_count > self.config.max_lockouts;
        let duration = if long_lockout {
            self.config.long_lockout_time
        } else {
            self.config.normal_lockout_time
        };

        let record = LockoutRecord {
            locked_until: now + duration,
            escalation_count,
            escalation_valid_until: now + self.config.retries_reset_window,
        };
        self.store
            .save_record(OptionName::Lockouts, identity, &record)
            .await?;

        tracing::warn!(
            identity = %identity,
            escalation_count = escalation_count,
            long_lockout = long_lockout,
            locked_until = %record.locked_until,
            "Issued lockout"
        );

        if let Err(e) = self.retries.clear(identity).await {
            tracing::warn!(identity = %identity, error = %e, "Failed to clear retries after lockout");
        }
        if let Err(e) = increment_total_lockouts(&self.store).await {
            tracing::warn!(error = %e, "Failed to increment total lockouts");
        }
        if self.config.notify_on_lockout_log_ip {
            let username = attempted_username.unwrap_or_default();
            if let Err(e) = self.log.record(identity, username).await {
                tracing::warn!(identity = %identity, error = %e, "Failed to write lockout log");
            }
        }

        emit_logged(
            self.events.as_ref(),
            Event::LockoutIssued {
                identity: identity.clone(),
                attempted_username: attempted_username.map(str::to_string),
                locked_until: record.locked_until,
                escalation_count,
                long_lockout,
                timestamp: now,
            },
        )
        .await;

        if self.config.notify_on_lockout_email_to_admin {
            if let Some(notifier) = &self.notifier {
                self.notify_if_threshold_crossed(
                    Arc::clone(notifier),
                    LockoutNotice {
                        identity: identity.clone(),
                        attempted_username: attempted_username.map(str::to_string),
                        locked_until: record.locked_until,
                        lockout_duration: duration,
                        escalation_count,
                        long_lockout,
                        active_lockouts: 0,
                    },
                    was_active,
                )
                .await;
            }
        }

        Ok(Some(record))
    }

    /// Active lockouts, soonest expiry first.
    pub async fn active_lockouts(&self) -> Result<Vec<(ClientIdentity, LockoutRecord)>, Error> {
        let now = self.clock.now();
        let mut active: Vec<_> = self
            .load_all()
            .await?
            .into_iter()
            .filter(|(_, record)| record.is_active(now))
            .collect();
        active.sort_by_key(|(_, record)| record.locked_until);
        Ok(active)
    }

    /// Lift every lockout and forget all escalation history.
    ///
    /// # Returns
    ///
    /// The number of lockouts that were active.
    pub async fn restore_lockouts(&self) -> Result<usize, Error> {
        let now = self.clock.now();
        let mut lifted = 0;
        for (identity, record) in self.load_all().await? {
            self.store
                .remove_record(OptionName::Lockouts, &identity)
                .await?;
            if record.is_active(now) {
                lifted += 1;
            }
        }
        tracing::info!(count = lifted, "Restored all lockouts");
        Ok(lifted)
    }

    /// Forget the escalation history of one identity.
    ///
    /// An active block stays in place; only the count that drives the long
    /// duration is reset.
    pub async fn reset_escalation(&self, identity: &ClientIdentity) -> Result<bool, Error> {
        let now = self.clock.now();
        let reset = match self.record(identity).await? {
            Some(mut record) if record.is_active(now) => {
                record.escalation_count = 0;
                self.store
                    .save_record(OptionName::Lockouts, identity, &record)
                    .await?;
                true
            }
            Some(_) => {
                self.store
                    .remove_record(OptionName::Lockouts, identity)
                    .await?
            }
            None => false,
        };

        if reset {
            tracing::info!(identity = %identity, "Reset lockout escalation");
        }
        Ok(reset)
    }

    /// Drop records that are inactive and whose escalation window lapsed.
    pub async fn purge_stale(&self) -> Result<usize, Error> {
        let now = self.clock.now();
        let mut purged = 0;
        for (identity, record) in self.load_all().await? {
            if record.is_stale(now)
                && self
                    .store
                    .remove_record(OptionName::Lockouts, &identity)
                    .await?
            {
                purged += 1;
            }
        }
        Ok(purged)
    }

    /// Dispatch `notice` if this lockout took the active count across
    /// `notify_after_lockouts`.
    async fn notify_if_threshold_crossed(
        &self,
        notifier: Arc<dyn LockoutNotifier>,
        mut notice: LockoutNotice,
        was_active: bool,
    ) {
        let active_after = match self.active_lockouts().await {
            Ok(active) => active.len(),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to count active lockouts for notification");
                return;
            }
        };
        let active_before = active_after.saturating_sub(usize::from(!was_active));
        let threshold = self.config.notify_after_lockouts as usize;

        if active_before < threshold && active_after >= threshold {
            notice.active_lockouts = active_after;
            dispatch(notifier, notice);
        }
    }

    async fn load_all(&self) -> Result<Vec<(ClientIdentity, LockoutRecord)>, Error> {
        self.store.load_records(OptionName::Lockouts).await
    }
}
