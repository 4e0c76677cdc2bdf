//! Option names, value validation, and store-key helpers.
//!
//! Every value gatehouse persists lives under a `gatehouse_`-prefixed key.
//! The first group of [`OptionName`]s are operator settings edited through
//! [`set_option`]; the rest hold throttling state owned by the services.
//! [`OptionName::Retries`] and [`OptionName::Lockouts`] are collections: each
//! identity's record sits under its own [`OptionName::record_key`].

use std::fmt;
use std::str::FromStr;

use serde_json::Value;

use crate::{
    Error,
    error::ValidationError,
    identity::{ClientIdentity, SiteConnection},
    repositories::OptionRepository,
};

/// Prefix shared by every persisted key.
pub const OPTION_PREFIX: &str = "gatehouse_";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OptionName {
    AllowedRetries,
    NormalLockoutTime,
    MaxLockouts,
    LongLockoutTime,
    HoursUntilRetriesReset,
    SiteConnection,
    HandleCookieLogin,
    NotifyOnLockoutLogIp,
    NotifyOnLockoutEmailToAdmin,
    NotifyAfterLockouts,
    TotalLockouts,
    LockoutLogs,
    Retries,
    Lockouts,
}

impl OptionName {
    /// Operator-editable settings, in display order.
    pub const SETTINGS: [OptionName; 10] = [
        OptionName::AllowedRetries,
        OptionName::NormalLockoutTime,
        OptionName::MaxLockouts,
        OptionName::LongLockoutTime,
        OptionName::HoursUntilRetriesReset,
        OptionName::SiteConnection,
        OptionName::HandleCookieLogin,
        OptionName::NotifyOnLockoutLogIp,
        OptionName::NotifyOnLockoutEmailToAdmin,
        OptionName::NotifyAfterLockouts,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OptionName::AllowedRetries => "allowed_retries",
            OptionName::NormalLockoutTime => "normal_lockout_time",
            OptionName::MaxLockouts => "max_lockouts",
            OptionName::LongLockoutTime => "long_lockout_time",
            OptionName::HoursUntilRetriesReset => "hours_until_retries_reset",
            OptionName::SiteConnection => "site_connection",
            OptionName::HandleCookieLogin => "handle_cookie_login",
            OptionName::NotifyOnLockoutLogIp => "notify_on_lockout_log_ip",
            OptionName::NotifyOnLockoutEmailToAdmin => "notify_on_lockout_email_to_admin",
            OptionName::NotifyAfterLockouts => "notify_after_lockouts",
            OptionName::TotalLockouts => "total_lockouts",
            OptionName::LockoutLogs => "lockout_logs",
            OptionName::Retries => "retries",
            OptionName::Lockouts => "lockouts",
        }
    }

    /// The prefixed key this option is stored under.
    pub fn key(&self) -> String {
        format!("{OPTION_PREFIX}{}", self.as_str())
    }

    /// Prefix shared by the per-identity keys of a record collection,
    /// e.g. `gatehouse_lockouts_`.
    pub fn record_prefix(&self) -> String {
        format!("{}_", self.key())
    }

    /// Key of the record `identity` holds in this collection.
    pub fn record_key(&self, identity: &ClientIdentity) -> String {
        format!("{}{}", self.record_prefix(), identity.as_str())
    }

    /// Whether operators may edit this option through [`set_option`].
    pub fn is_setting(&self) -> bool {
        Self::SETTINGS.contains(self)
    }

    /// Name of the environment variable overriding this setting.
    pub fn env_var(&self) -> String {
        format!("GATEHOUSE_{}", self.as_str().to_uppercase())
    }
}

impl FromStr for OptionName {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.strip_prefix(OPTION_PREFIX).unwrap_or(s);
        match name {
            "allowed_retries" => Ok(OptionName::AllowedRetries),
            "normal_lockout_time" => Ok(OptionName::NormalLockoutTime),
            "max_lockouts" => Ok(OptionName::MaxLockouts),
            "long_lockout_time" => Ok(OptionName::LongLockoutTime),
            "hours_until_retries_reset" => Ok(OptionName::HoursUntilRetriesReset),
            "site_connection" => Ok(OptionName::SiteConnection),
            "handle_cookie_login" => Ok(OptionName::HandleCookieLogin),
            "notify_on_lockout_log_ip" => Ok(OptionName::NotifyOnLockoutLogIp),
            "notify_on_lockout_email_to_admin" => Ok(OptionName::NotifyOnLockoutEmailToAdmin),
            "notify_after_lockouts" => Ok(OptionName::NotifyAfterLockouts),
            "total_lockouts" => Ok(OptionName::TotalLockouts),
            "lockout_logs" => Ok(OptionName::LockoutLogs),
            "retries" => Ok(OptionName::Retries),
            "lockouts" => Ok(OptionName::Lockouts),
            other => Err(ValidationError::UnknownOption(other.to_string())),
        }
    }
}

impl fmt::Display for OptionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read a strictly positive integer, accepting numbers and numeric strings.
pub(crate) fn positive_integer(
    name: OptionName,
    value: &Value,
    max: u64,
) -> Result<u64, ValidationError> {
    let parsed = match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    };
    match parsed {
        Some(0) => Err(ValidationError::invalid_option(
            name.as_str(),
            "must be greater than zero",
        )),
        Some(n) if n > max => Err(ValidationError::invalid_option(
            name.as_str(),
            format!("must be at most {max}"),
        )),
        Some(n) => Ok(n),
        None => Err(ValidationError::invalid_option(
            name.as_str(),
            format!("expected a positive integer, got {value}"),
        )),
    }
}

/// Read a `yes`/`no` flag. Booleans are accepted too.
pub(crate) fn yes_no(name: OptionName, value: &Value) -> Result<bool, ValidationError> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::String(s) if s.eq_ignore_ascii_case("yes") => Ok(true),
        Value::String(s) if s.eq_ignore_ascii_case("no") => Ok(false),
        _ => Err(ValidationError::invalid_option(
            name.as_str(),
            format!("expected 'yes' or 'no', got {value}"),
        )),
    }
}

pub(crate) fn boolean(name: OptionName, value: &Value) -> Result<bool, ValidationError> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::Number(n) if n.as_u64() == Some(1) => Ok(true),
        Value::Number(n) if n.as_u64() == Some(0) => Ok(false),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => Ok(true),
            "false" | "0" | "" => Ok(false),
            _ => Err(ValidationError::invalid_option(
                name.as_str(),
                format!("expected a boolean, got {value}"),
            )),
        },
        _ => Err(ValidationError::invalid_option(
            name.as_str(),
            format!("expected a boolean, got {value}"),
        )),
    }
}

pub(crate) fn site_connection(
    name: OptionName,
    value: &Value,
) -> Result<SiteConnection, ValidationError> {
    match value {
        Value::String(s) => s.parse(),
        _ => Err(ValidationError::invalid_option(
            name.as_str(),
            format!("expected 'direct' or 'reverse_proxy', got {value}"),
        )),
    }
}

/// Largest duration accepted for any time-valued setting (ten years).
pub(crate) const MAX_SECONDS: u64 = 10 * 365 * 24 * 60 * 60;

/// Validate a setting and return the canonical form it is stored in.
///
/// Durations and counts become JSON integers, `handle_cookie_login` becomes
/// `"yes"`/`"no"`, notification flags become booleans.
pub fn normalize(name: OptionName, value: &Value) -> Result<Value, ValidationError> {
    match name {
        OptionName::AllowedRetries
        | OptionName::MaxLockouts
        | OptionName::NotifyAfterLockouts => {
            positive_integer(name, value, u64::from(u32::MAX)).map(Value::from)
        }
        OptionName::NormalLockoutTime
        | OptionName::LongLockoutTime
        | OptionName::HoursUntilRetriesReset => {
            positive_integer(name, value, MAX_SECONDS).map(Value::from)
        }
        OptionName::SiteConnection => {
            site_connection(name, value).map(|c| Value::from(c.as_str()))
        }
        OptionName::HandleCookieLogin => {
            yes_no(name, value).map(|b| Value::from(if b { "yes" } else { "no" }))
        }
        OptionName::NotifyOnLockoutLogIp | OptionName::NotifyOnLockoutEmailToAdmin => {
            boolean(name, value).map(Value::Bool)
        }
        OptionName::TotalLockouts
        | OptionName::LockoutLogs
        | OptionName::Retries
        | OptionName::Lockouts => Err(ValidationError::UnknownOption(name.to_string())),
    }
}

/// Validate and persist a single operator setting.
///
/// Unknown names, state keys, and invalid values are rejected before anything
/// is written; nothing is coerced silently.
pub async fn set_option<R: OptionRepository + ?Sized>(
    repository: &R,
    name: &str,
    value: &Value,
) -> Result<(), Error> {
    let option: OptionName = name.parse()?;
    if !option.is_setting() {
        return Err(ValidationError::UnknownOption(name.to_string()).into());
    }
    let canonical = normalize(option, value)?;
    repository.set(&option.key(), &canonical).await?;
    tracing::info!(option = %option, value = %canonical, "Updated lockout option");
    Ok(())
}

/// Remove every `gatehouse_` key from the store.
///
/// # Returns
///
/// The number of keys deleted.
pub async fn purge_all<R: OptionRepository + ?Sized>(repository: &R) -> Result<usize, Error> {
    let names = repository.names_with_prefix(OPTION_PREFIX).await?;
    let mut deleted = 0;
    for name in &names {
        if repository.delete(name).await? {
            deleted += 1;
        }
    }
    tracing::info!(count = deleted, "Purged gatehouse options");
    Ok(deleted)
}

pub fn minutes_to_seconds(minutes: u64) -> u64 {
    minutes.saturating_mul(60)
}

pub fn hours_to_seconds(hours: u64) -> u64 {
    hours.saturating_mul(3600)
}

/// Whole minutes, rounded down.
pub fn seconds_to_minutes(seconds: u64) -> u64 {
    seconds / 60
}

/// Whole hours, rounded down.
pub fn seconds_to_hours(seconds: u64) -> u64 {
    seconds / 3600
}
