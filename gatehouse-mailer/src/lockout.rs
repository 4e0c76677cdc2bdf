//! Administrator notification for issued lockouts.

use askama::Template;

use crate::templates::LockoutNotificationTemplate;
use crate::{Email, MailerConfig, MailerError};

/// What the notification says about a lockout. All values are preformatted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockoutDetails {
    pub identity: String,
    pub attempted_username: Option<String>,
    pub lockout_minutes: i64,
    pub locked_until: String,
    pub escalation_count: u32,
    pub long_lockout: bool,
    pub active_lockouts: usize,
}

pub struct LockoutNotificationEmail;

impl LockoutNotificationEmail {
    /// Render the notice addressed to `config.admin_address`.
    pub fn build(config: &MailerConfig, details: &LockoutDetails) -> Result<Email, MailerError> {
        if config.admin_address.trim().is_empty() {
            return Err(MailerError::Config("admin address is not set".to_string()));
        }

        let body = LockoutNotificationTemplate {
            site_name: &config.site_name,
            site_url: &config.site_url,
            identity: &details.identity,
            attempted_username: details.attempted_username.as_deref(),
            lockout_minutes: details.lockout_minutes,
            locked_until: &details.locked_until,
            escalation_count: details.escalation_count,
            long_lockout: details.long_lockout,
            active_lockouts: details.active_lockouts,
        }
        .render()?;

        Email::builder()
            .from(config.get_from_address())
            .to(config.admin_address.as_str())
            .subject(format!("[{}] Too many failed login attempts", config.site_name))
            .text_body(body)
            .build()
    }
}
