//! Persisted record types.
//!
//! Each identity's retry and lockout record is stored under its own key
//! (see [`OptionName::record_key`](crate::options::OptionName::record_key)),
//! so the identity is part of the key rather than a field. Timestamps are
//! unix seconds.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::identity::ClientIdentity;

/// Failed attempts not yet escalated into a lockout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryRecord {
    pub count: u32,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub valid_until: DateTime<Utc>,
}

impl RetryRecord {
    /// A record past its validity window is logically absent.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.valid_until
    }

    /// The live count, `0` once expired.
    pub fn live_count(&self, now: DateTime<Utc>) -> u32 {
        if self.is_expired(now) { 0 } else { self.count }
    }
}

/// Lockout state for one identity.
///
/// The record outlives the block itself: after `locked_until` passes it is
/// inactive but still carries the escalation count until
/// `escalation_valid_until`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockoutRecord {
    #[serde(with = "chrono::serde::ts_seconds")]
    pub locked_until: DateTime<Utc>,
    pub escalation_count: u32,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub escalation_valid_until: DateTime<Utc>,
}

impl LockoutRecord {
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.locked_until > now
    }

    pub fn state(&self, now: DateTime<Utc>) -> LockoutState {
        if self.is_active(now) {
            LockoutState::Locked {
                locked_until: self.locked_until,
                remaining: self.locked_until - now,
            }
        } else {
            LockoutState::Clear
        }
    }

    /// Whether the escalation window lapsed without a new lockout.
    pub fn escalation_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.escalation_valid_until
    }

    /// Escalation count still in effect at `now`.
    pub fn live_escalation_count(&self, now: DateTime<Utc>) -> u32 {
        if self.escalation_expired(now) {
            0
        } else {
            self.escalation_count
        }
    }

    /// Nothing left worth keeping: inactive and escalation lapsed.
    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        !self.is_active(now) && self.escalation_expired(now)
    }
}

/// One row of the lockout audit log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockoutLogEntry {
    pub identity: ClientIdentity,
    pub attempted_username: String,
    pub occurrence_count: u64,
}

/// Result of a lockout check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockoutState {
    Clear,
    Locked {
        locked_until: DateTime<Utc>,
        remaining: Duration,
    },
}

impl LockoutState {
    pub fn is_locked(&self) -> bool {
        matches!(self, LockoutState::Locked { .. })
    }

    /// Seconds until the block lifts, rounded up; `0` when clear.
    pub fn remaining_seconds(&self) -> u64 {
        match self {
            LockoutState::Clear => 0,
            LockoutState::Locked { remaining, .. } => {
                let millis = remaining.num_milliseconds().max(0) as u64;
                millis.div_ceil(1000)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    #[test]
    fn test_retry_record_expiry_is_exclusive() {
        let record = RetryRecord {
            count: 3,
            valid_until: at(100),
        };
        assert_eq!(record.live_count(at(100)), 3);
        assert_eq!(record.live_count(at(101)), 0);
    }

    #[test]
    fn test_lockout_record_activity() {
        let record = LockoutRecord {
            locked_until: at(200),
            escalation_count: 2,
            escalation_valid_until: at(500),
        };
        assert!(record.is_active(at(199)));
        assert!(!record.is_active(at(200)));
        assert_eq!(record.state(at(150)).remaining_seconds(), 50);
        assert_eq!(record.state(at(250)), LockoutState::Clear);
        assert!(!record.is_stale(at(300)));
        assert!(record.is_stale(at(501)));
        assert_eq!(record.live_escalation_count(at(501)), 0);
    }

    #[test]
    fn test_record_serializes_unix_seconds() {
        let record = LockoutRecord {
            locked_until: at(1_700_000_000),
            escalation_count: 1,
            escalation_valid_until: at(1_700_043_200),
        };
        assert_eq!(
            serde_json::to_value(record).unwrap(),
            json!({
                "locked_until": 1_700_000_000,
                "escalation_count": 1,
                "escalation_valid_until": 1_700_043_200,
            })
        );
    }

    #[test]
    fn test_remaining_seconds_rounds_up() {
        let state = LockoutState::Locked {
            locked_until: at(10),
            remaining: Duration::milliseconds(1500),
        };
        assert_eq!(state.remaining_seconds(), 2);
        assert_eq!(LockoutState::Clear.remaining_seconds(), 0);
    }
}
