use crate::{Email, MailerError};
use async_trait::async_trait;

/// Anything that can deliver an [`Email`].
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_email(&self, email: Email) -> Result<(), MailerError>;
}
