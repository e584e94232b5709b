//! Configuration error types.

use std::path::PathBuf;
use thiserror::Error;

/// Why an `MrrConfig` could not be produced.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// An explicitly requested file does not exist.
    #[error("mrr config file does not exist: {0}")]
    FileNotFound(PathBuf),

    /// The file extension has no enabled format.
    #[error("Unsupported or disabled configuration file format: .{0}")]
    UnsupportedFormat(String),

    /// The merged sources could not be extracted into the schema.
    #[error("Failed to extract configuration: {0}")]
    Extract(String),

    /// A value is present but unusable.
    #[error("invalid mrr configuration: {message}")]
    Validation { message: String },

    /// A required value is empty.
    #[error("mrr configuration field `{field}` must not be empty")]
    MissingField { field: String },

    /// Invalid broker URL.
    #[error("invalid broker url `{url}`: {reason}")]
    InvalidUrl { url: String, reason: String },
}

impl ConfigError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }

    pub fn invalid_url(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidUrl {
            url: url.into(),
            reason: reason.into(),
        }
    }
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Extract(err.to_string())
    }
}

/// Result alias for config loading and validation.
pub type ConfigResult<T> = Result<T, ConfigError>;
