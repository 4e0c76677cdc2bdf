use crate::MailerError;
use serde::{Deserialize, Serialize};

/// A transport-independent plain-text email message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Email {
    pub to: Vec<String>,
    pub from: String,
    pub subject: String,
    pub text_body: String,
}

impl Email {
    pub fn builder() -> EmailBuilder {
        EmailBuilder::default()
    }

    pub fn validate(&self) -> Result<(), MailerError> {
        if self.to.is_empty() {
            return Err(MailerError::Builder(
                "At least one recipient is required".to_string(),
            ));
        }

        if self.from.is_empty() {
            return Err(MailerError::Builder("From address is required".to_string()));
        }

        if self.subject.is_empty() {
            return Err(MailerError::Builder("Subject is required".to_string()));
        }

        if self.text_body.is_empty() {
            return Err(MailerError::Builder("Body is required".to_string()));
        }

        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct EmailBuilder {
    to: Vec<String>,
    from: Option<String>,
    subject: Option<String>,
    text_body: Option<String>,
}

impl EmailBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn to<S: Into<String>>(mut self, email: S) -> Self {
        self.to.push(email.into());
        self
    }

    pub fn from<S: Into<String>>(mut self, email: S) -> Self {
        self.from = Some(email.into());
        self
    }

    pub fn subject<S: Into<String>>(mut self, subject: S) -> Self {
        self.subject = Some(subject.into());
        self
    }

    pub fn text_body<S: Into<String>>(mut self, text: S) -> Self {
        self.text_body = Some(text.into());
        self
    }

    pub fn build(self) -> Result<Email, MailerError> {
        let email = Email {
            to: self.to,
            from: self
                .from
                .ok_or_else(|| MailerError::Builder("From address is required".to_string()))?,
            subject: self
                .subject
                .ok_or_else(|| MailerError::Builder("Subject is required".to_string()))?,
            text_body: self
                .text_body
                .ok_or_else(|| MailerError::Builder("Body is required".to_string()))?,
        };

        email.validate()?;
        Ok(email)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_builder() {
        let email = Email::builder()
            .from("gatehouse@example.com")
            .to("admin@example.com")
            .subject("Too many failed login attempts")
            .text_body("192.0.2.1 was locked out")
            .build()
            .unwrap();

        assert_eq!(email.from, "gatehouse@example.com");
        assert_eq!(email.to, vec!["admin@example.com"]);
        assert_eq!(email.text_body, "192.0.2.1 was locked out");
    }

    #[test]
    fn test_recipient_required() {
        let result = Email::builder()
            .from("gatehouse@example.com")
            .subject("Test")
            .text_body("body")
            .build();

        assert!(matches!(result, Err(MailerError::Builder(_))));
    }

    #[test]
    fn test_body_required() {
        let result = Email::builder()
            .from("gatehouse@example.com")
            .to("admin@example.com")
            .subject("Test")
            .build();
        assert!(matches!(result, Err(MailerError::Builder(_))));

        let result = Email::builder()
            .from("gatehouse@example.com")
            .to("admin@example.com")
            .subject("Test")
            .text_body("")
            .build();
        assert!(matches!(result, Err(MailerError::Builder(_))));
    }
}
