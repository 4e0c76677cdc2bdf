//! Lockout configuration.
//!
//! [`LockoutConfig`] enumerates every operator setting with its type and
//! default. It is validated eagerly: a config that loads is a config the
//! services can use without further checks.

use chrono::Duration;
use serde_json::Value;

use crate::{
    Error,
    error::{ConfigError, ValidationError},
    identity::SiteConnection,
    options::{self, MAX_SECONDS, OptionName},
    repositories::{OptionRepository, OptionStore},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockoutConfig {
    /// Failures tolerated before a lockout is issued.
    pub allowed_retries: u32,
    pub normal_lockout_time: Duration,
    /// Lockouts within one escalation window before the long duration applies.
    pub max_lockouts: u32,
    pub long_lockout_time: Duration,
    /// How long retry counts and escalation counts survive without new activity.
    /// Stored as `hours_until_retries_reset`, in seconds.
    pub retries_reset_window: Duration,
    pub site_connection: SiteConnection,
    /// Apply throttling to cookie re-authentication as well.
    pub handle_cookie_login: bool,
    /// Write each lockout to the persistent lockout log.
    pub notify_on_lockout_log_ip: bool,
    pub notify_on_lockout_email_to_admin: bool,
    /// Active-lockout count at which the admin is emailed.
    pub notify_after_lockouts: u32,
}

impl Default for LockoutConfig {
    fn default() -> Self {
        Self {
            allowed_retries: 4,
            normal_lockout_time: Duration::minutes(20),
            max_lockouts: 4,
            long_lockout_time: Duration::hours(24),
            retries_reset_window: Duration::hours(12),
            site_connection: SiteConnection::Direct,
            handle_cookie_login: true,
            notify_on_lockout_log_ip: true,
            notify_on_lockout_email_to_admin: false,
            notify_after_lockouts: 4,
        }
    }
}

impl LockoutConfig {
    /// Check every constraint. Returns the first violation found.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let counts = [
            (OptionName::AllowedRetries, self.allowed_retries),
            (OptionName::MaxLockouts, self.max_lockouts),
            (OptionName::NotifyAfterLockouts, self.notify_after_lockouts),
        ];
        for (name, value) in counts {
            if value == 0 {
                return Err(ValidationError::invalid_option(
                    name.as_str(),
                    "must be greater than zero",
                ));
            }
        }

        let durations = [
            (OptionName::NormalLockoutTime, self.normal_lockout_time),
            (OptionName::LongLockoutTime, self.long_lockout_time),
            (OptionName::HoursUntilRetriesReset, self.retries_reset_window),
        ];
        for (name, value) in durations {
            if value <= Duration::zero() {
                return Err(ValidationError::invalid_option(
                    name.as_str(),
                    "must be a positive duration",
                ));
            }
            if value.num_seconds() as u64 > MAX_SECONDS {
                return Err(ValidationError::invalid_option(
                    name.as_str(),
                    format!("must be at most {MAX_SECONDS} seconds"),
                ));
            }
        }

        Ok(())
    }

    /// Load every setting from the store.
    ///
    /// An absent setting is `ConfigError::Missing`; a malformed one is a
    /// validation error. Run [`install_defaults`](Self::install_defaults)
    /// first on a fresh store.
    pub async fn load<R: OptionRepository>(store: &OptionStore<R>) -> Result<Self, Error> {
        let mut config = Self::default();
        for name in OptionName::SETTINGS {
            let value: Value = store
                .load(name)
                .await?
                .ok_or_else(|| ConfigError::Missing(name.to_string()))?;
            config.apply(name, &value)?;
        }
        config.validate()?;
        Ok(config)
    }

    /// Write defaults for every setting not yet present. Existing values are kept.
    ///
    /// # Returns
    ///
    /// The number of settings written.
    pub async fn install_defaults<R: OptionRepository>(
        store: &OptionStore<R>,
    ) -> Result<usize, Error> {
        let defaults = Self::default();
        let mut written = 0;
        for (name, value) in defaults.to_values() {
            if store.load::<Value>(name).await?.is_none() {
                store.save(name, &value).await?;
                written += 1;
            }
        }
        if written > 0 {
            tracing::info!(count = written, "Installed default lockout options");
        }
        Ok(written)
    }

    /// Validate and write every setting.
    pub async fn save<R: OptionRepository>(&self, store: &OptionStore<R>) -> Result<(), Error> {
        self.validate()?;
        for (name, value) in self.to_values() {
            store.save(name, &value).await?;
        }
        Ok(())
    }

    /// Build a config from defaults overlaid with `GATEHOUSE_*` environment variables.
    ///
    /// Each setting reads the variable named by [`OptionName::env_var`], for
    /// example `GATEHOUSE_ALLOWED_RETRIES=5`. Durations are in seconds.
    pub fn from_env() -> Result<Self, Error> {
        let mut config = Self::default();
        for name in OptionName::SETTINGS {
            if let Ok(raw) = std::env::var(name.env_var()) {
                config.apply(name, &Value::String(raw))?;
            }
        }
        config.validate()?;
        Ok(config)
    }

    /// Settings in their canonical stored form.
    pub fn to_values(&self) -> Vec<(OptionName, Value)> {
        vec![
            (OptionName::AllowedRetries, Value::from(self.allowed_retries)),
            (
                OptionName::NormalLockoutTime,
                Value::from(self.normal_lockout_time.num_seconds()),
            ),
            (OptionName::MaxLockouts, Value::from(self.max_lockouts)),
            (
                OptionName::LongLockoutTime,
                Value::from(self.long_lockout_time.num_seconds()),
            ),
            (
                OptionName::HoursUntilRetriesReset,
                Value::from(self.retries_reset_window.num_seconds()),
            ),
            (
                OptionName::SiteConnection,
                Value::from(self.site_connection.as_str()),
            ),
            (
                OptionName::HandleCookieLogin,
                Value::from(if self.handle_cookie_login { "yes" } else { "no" }),
            ),
            (
                OptionName::NotifyOnLockoutLogIp,
                Value::Bool(self.notify_on_lockout_log_ip),
            ),
            (
                OptionName::NotifyOnLockoutEmailToAdmin,
                Value::Bool(self.notify_on_lockout_email_to_admin),
            ),
            (
                OptionName::NotifyAfterLockouts,
                Value::from(self.notify_after_lockouts),
            ),
        ]
    }

    fn apply(&mut self, name: OptionName, value: &Value) -> Result<(), ValidationError> {
        let count = |v: &Value| -> Result<u32, ValidationError> {
            options::positive_integer(name, v, u64::from(u32::MAX)).map(|n| n as u32)
        };
        let seconds = |v: &Value| -> Result<Duration, ValidationError> {
            options::positive_integer(name, v, MAX_SECONDS).map(|n| Duration::seconds(n as i64))
        };

        match name {
            OptionName::AllowedRetries => self.allowed_retries = count(value)?,
            OptionName::NormalLockoutTime => self.normal_lockout_time = seconds(value)?,
            OptionName::MaxLockouts => self.max_lockouts = count(value)?,
            OptionName::LongLockoutTime => self.long_lockout_time = seconds(value)?,
            OptionName::HoursUntilRetriesReset => self.retries_reset_window = seconds(value)?,
            OptionName::SiteConnection => {
                self.site_connection = options::site_connection(name, value)?
            }
            OptionName::HandleCookieLogin => self.handle_cookie_login = options::yes_no(name, value)?,
            OptionName::NotifyOnLockoutLogIp => {
                self.notify_on_lockout_log_ip = options::boolean(name, value)?
            }
            OptionName::NotifyOnLockoutEmailToAdmin => {
                self.notify_on_lockout_email_to_admin = options::boolean(name, value)?
            }
            OptionName::NotifyAfterLockouts => self.notify_after_lockouts = count(value)?,
            OptionName::TotalLockouts
            | OptionName::LockoutLogs
            | OptionName::Retries
            | OptionName::Lockouts => {
                return Err(ValidationError::UnknownOption(name.to_string()));
            }
        }
        Ok(())
    }
}
