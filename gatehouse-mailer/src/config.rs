use crate::transports::TlsConfig;
use crate::{FileTransport, Mailer, MailerError, SmtpTransport};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailerConfig {
    pub transport: TransportConfig,
    pub from_address: String,
    pub from_name: Option<String>,
    /// Recipient of lockout notifications
    pub admin_address: String,
    pub site_name: String,
    pub site_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransportConfig {
    Smtp {
        host: String,
        port: Option<u16>,
        username: Option<String>,
        password: Option<String>,
        tls: Option<TlsType>,
    },
    File {
        output_dir: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TlsType {
    None,
    StartTls,
    Tls,
}

impl From<TlsType> for TlsConfig {
    fn from(tls_type: TlsType) -> Self {
        match tls_type {
            TlsType::None => TlsConfig::None,
            TlsType::StartTls => TlsConfig::StartTls,
            TlsType::Tls => TlsConfig::Tls,
        }
    }
}

impl std::str::FromStr for TlsType {
    type Err = MailerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" => Ok(TlsType::None),
            "starttls" => Ok(TlsType::StartTls),
            "tls" => Ok(TlsType::Tls),
            other => Err(MailerError::Config(format!("unknown TLS mode: {other}"))),
        }
    }
}

impl MailerConfig {
    /// Read `MAILER_*` environment variables.
    ///
    /// `MAILER_SMTP_HOST` selects SMTP; otherwise messages are written under
    /// `MAILER_FILE_OUTPUT_DIR` (default `./emails`).
    pub fn from_env() -> Result<Self, MailerError> {
        let transport = if let Ok(host) = std::env::var("MAILER_SMTP_HOST") {
            let port = match std::env::var("MAILER_SMTP_PORT") {
                Ok(port) => Some(port.parse().map_err(|_| {
                    MailerError::Config(format!("invalid MAILER_SMTP_PORT: {port}"))
                })?),
                Err(_) => None,
            };
            let tls = match std::env::var("MAILER_SMTP_TLS") {
                Ok(tls) => Some(tls.parse()?),
                Err(_) => None,
            };
            TransportConfig::Smtp {
                host,
                port,
                username: std::env::var("MAILER_SMTP_USERNAME").ok(),
                password: std::env::var("MAILER_SMTP_PASSWORD").ok(),
                tls,
            }
        } else {
            TransportConfig::File {
                output_dir: std::env::var("MAILER_FILE_OUTPUT_DIR")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| PathBuf::from("./emails")),
            }
        };

        let defaults = Self::default();
        Ok(Self {
            transport,
            from_address: std::env::var("MAILER_FROM_ADDRESS").unwrap_or(defaults.from_address),
            from_name: std::env::var("MAILER_FROM_NAME").ok(),
            admin_address: std::env::var("MAILER_ADMIN_ADDRESS").unwrap_or_default(),
            site_name: std::env::var("MAILER_SITE_NAME").unwrap_or(defaults.site_name),
            site_url: std::env::var("MAILER_SITE_URL").unwrap_or(defaults.site_url),
        })
    }

    pub fn build_transport(&self) -> Result<Box<dyn Mailer>, MailerError> {
        match &self.transport {
            TransportConfig::Smtp {
                host,
                port,
                username,
                password,
                tls,
            } => {
                let mut builder = SmtpTransport::builder(host);

                if let Some(port) = port {
                    builder = builder.port(*port);
                }

                if let (Some(username), Some(password)) = (username, password) {
                    builder = builder.credentials(username, password);
                }

                if let Some(tls) = tls {
                    builder = builder.tls((*tls).into());
                }

                Ok(Box::new(builder.build()?))
            }
            TransportConfig::File { output_dir } => Ok(Box::new(FileTransport::new(output_dir)?)),
        }
    }

    pub fn get_from_address(&self) -> String {
        match &self.from_name {
            Some(name) => format!("{} <{}>", name, self.from_address),
            None => self.from_address.clone(),
        }
    }
}

impl Default for MailerConfig {
    fn default() -> Self {
        Self {
            transport: TransportConfig::File {
                output_dir: PathBuf::from("./emails"),
            },
            from_address: "noreply@example.com".to_string(),
            from_name: None,
            admin_address: String::new(),
            site_name: "Your Site".to_string(),
            site_url: "https://example.com".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = MailerConfig::default();
        assert_eq!(config.from_address, "noreply@example.com");
        assert!(config.admin_address.is_empty());
        assert_eq!(
            config.transport,
            TransportConfig::File {
                output_dir: PathBuf::from("./emails")
            }
        );
    }

    #[test]
    fn test_get_from_address() {
        let mut config = MailerConfig::default();
        assert_eq!(config.get_from_address(), "noreply@example.com");

        config.from_name = Some("Gatehouse".to_string());
        assert_eq!(config.get_from_address(), "Gatehouse <noreply@example.com>");
    }

    #[test]
    fn test_tls_type_parse() {
        assert_eq!("STARTTLS".parse::<TlsType>().unwrap(), TlsType::StartTls);
        assert!(matches!(
            "ssl3".parse::<TlsType>(),
            Err(MailerError::Config(_))
        ));
    }

    #[test]
    fn test_transport_config_serde_tag() {
        let config: TransportConfig = serde_json::from_str(
            r#"{"type": "smtp", "host": "mail.example.com", "port": 465, "tls": "tls"}"#,
        )
        .unwrap();
        assert_eq!(
            config,
            TransportConfig::Smtp {
                host: "mail.example.com".to_string(),
                port: Some(465),
                username: None,
                password: None,
                tls: Some(TlsType::Tls),
            }
        );
    }

    #[test]
    fn test_build_file_transport() {
        let dir = tempfile::tempdir().unwrap();
        let config = MailerConfig {
            transport: TransportConfig::File {
                output_dir: dir.path().to_path_buf(),
            },
            ..Default::default()
        };
        assert!(config.build_transport().is_ok());
    }
}
