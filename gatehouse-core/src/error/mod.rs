pub mod utilities;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Event error: {0}")]
    Event(#[from] EventError),

    #[error("Notification error: {0}")]
    Notification(#[from] NotificationError),
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Connection error: {0}")]
    Connection(String),

    /// A stored value exists but does not have the expected shape.
    #[error("Corrupt value for {name}: {reason}")]
    Corrupt { name: String, reason: String },
}

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Invalid value for option {name}: {reason}")]
    InvalidOptionValue { name: String, reason: String },

    #[error("Unknown option: {0}")]
    UnknownOption(String),

    #[error("Invalid client identity: {0}")]
    InvalidIdentity(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required option: {0}")]
    Missing(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Error)]
pub enum EventError {
    #[error("Event bus error: {0}")]
    BusError(String),

    #[error("Event handler error: {0}")]
    HandlerError(String),
}

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("Notification delivery failed: {0}")]
    Delivery(String),

    #[error("Notifier misconfigured: {0}")]
    Configuration(String),
}

impl ValidationError {
    pub(crate) fn invalid_option(name: &str, reason: impl Into<String>) -> Self {
        ValidationError::InvalidOptionValue {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}

impl Error {
    pub fn is_storage_error(&self) -> bool {
        matches!(self, Error::Storage(_))
    }

    pub fn is_validation_error(&self) -> bool {
        matches!(self, Error::Validation(_))
    }

    pub fn is_config_error(&self) -> bool {
        matches!(self, Error::Config(_))
    }

    /// True when a required option was absent while loading configuration.
    pub fn is_missing_configuration(&self) -> bool {
        matches!(self, Error::Config(ConfigError::Missing(_)))
    }
}
