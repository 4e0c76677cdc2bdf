//! Conversion from [`Email`] to a lettre [`Message`].

use lettre::Message;
use lettre::message::header::ContentType;

use crate::{Email, MailerError};

pub(crate) fn build_message(email: Email) -> Result<Message, MailerError> {
    let mut builder = Message::builder()
        .from(email.from.parse()?)
        .subject(email.subject)
        .header(ContentType::TEXT_PLAIN);

    for to in email.to {
        builder = builder.to(to.parse()?);
    }

    Ok(builder.body(email.text_body)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn email() -> Email {
        Email {
            to: vec!["admin@example.com".to_string()],
            from: "Gatehouse <gatehouse@example.com>".to_string(),
            subject: "Lockout".to_string(),
            text_body: "locked".to_string(),
        }
    }

    #[test]
    fn test_build_text_message() {
        let message = build_message(email()).unwrap();
        let formatted = String::from_utf8(message.formatted()).unwrap();
        assert!(formatted.contains("Subject: Lockout"));
        assert!(formatted.contains("To: admin@example.com"));
        assert!(formatted.contains("Content-Type: text/plain; charset=utf-8"));
    }

    #[test]
    fn test_invalid_address_rejected() {
        let mut email = email();
        email.to = vec!["not an address".to_string()];
        assert!(matches!(
            build_message(email),
            Err(MailerError::Address(_))
        ));
    }
}
