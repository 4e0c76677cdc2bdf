//! Compiled askama templates.

use askama::Template;

/// Plain-text body of the administrator lockout notice.
#[derive(Template)]
#[template(
    source = r#"{{ site_name }} locked out {{ identity }} after too many failed login attempts.
{% if let Some(username) = attempted_username %}
Last username tried: {{ username }}
{%- endif %}
Lockout length: {{ lockout_minutes }} minutes{% if long_lockout %} (long lockout){% endif %}
Locked until: {{ locked_until }}
Lockouts for this client in the current window: {{ escalation_count }}
Active lockouts across the site: {{ active_lockouts }}

{{ site_url }}
"#,
    ext = "txt"
)]
pub struct LockoutNotificationTemplate<'a> {
    pub site_name: &'a str,
    pub site_url: &'a str,
    pub identity: &'a str,
    pub attempted_username: Option<&'a str>,
    pub lockout_minutes: i64,
    pub locked_until: &'a str,
    pub escalation_count: u32,
    pub long_lockout: bool,
    pub active_lockouts: usize,
}
