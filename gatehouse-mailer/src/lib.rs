//! Email delivery for gatehouse.
//!
//! A [`Mailer`] sends an [`Email`] through SMTP or, for development, by
//! writing `.eml` files to a directory. [`LockoutNotificationEmail`] renders
//! the message sent to the site administrator when a client is locked out.

pub mod config;
pub mod email;
pub mod error;
pub mod lockout;
pub mod mailer;
mod message;
pub mod templates;
pub mod transports;

pub use config::{MailerConfig, TlsType, TransportConfig};
pub use email::{Email, EmailBuilder};
pub use error::MailerError;
pub use lockout::{LockoutDetails, LockoutNotificationEmail};
pub use mailer::Mailer;
pub use transports::{FileTransport, SmtpTransport};

pub mod prelude {
    pub use crate::{
        Email, EmailBuilder, FileTransport, LockoutDetails, LockoutNotificationEmail, Mailer,
        MailerConfig, MailerError, SmtpTransport, TransportConfig,
    };
}
