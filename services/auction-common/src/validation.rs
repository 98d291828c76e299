//! Configuration validation.
//!
//! Configuration is checked before any external call is made, so a bad
//! threshold or an empty alias list fails the run up front.

use thiserror::Error;

use crate::config::{Config, ObservabilityConfig, TushareConfig};

/// Configuration validation error.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Configuration conflict: {reason}")]
    Conflict { reason: String },

    #[error("Multiple validation errors: {0:?}")]
    Multiple(Vec<ValidationError>),
}

impl ValidationError {
    /// Shorthand for [`ValidationError::InvalidValue`].
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Fold a list of errors into a single result.
    pub fn from_errors(mut errors: Vec<ValidationError>) -> ValidationResult<()> {
        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(Self::Multiple(errors)),
        }
    }

    /// Number of individual violations carried by this error.
    pub fn count(&self) -> usize {
        match self {
            Self::Multiple(inner) => inner.iter().map(Self::count).sum(),
            _ => 1,
        }
    }
}

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Trait for validatable configuration sections.
pub trait Validate {
    /// Validate this configuration section.
    fn validate(&self) -> ValidationResult<()>;
}

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];
const LOG_FORMATS: &[&str] = &["pretty", "json"];

impl Validate for ObservabilityConfig {
    fn validate(&self) -> ValidationResult<()> {
        let mut errors = Vec::new();

        if !LOG_LEVELS.contains(&self.log_level.to_lowercase().as_str()) {
            errors.push(ValidationError::invalid(
                "observability.log_level",
                format!("must be one of {:?}", LOG_LEVELS),
            ));
        }

        if !LOG_FORMATS.contains(&self.log_format.as_str()) {
            errors.push(ValidationError::invalid(
                "observability.log_format",
                format!("must be one of {:?}", LOG_FORMATS),
            ));
        }

        ValidationError::from_errors(errors)
    }
}

impl Validate for TushareConfig {
    fn validate(&self) -> ValidationResult<()> {
        let mut errors = Vec::new();

        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            errors.push(ValidationError::invalid(
                "tushare.base_url",
                "must be an http(s) URL",
            ));
        }

        if self.timeout_secs == 0 {
            errors.push(ValidationError::invalid(
                "tushare.timeout_secs",
                "must be greater than 0",
            ));
        }

        if self.requests_per_minute == 0 {
            errors.push(ValidationError::invalid(
                "tushare.requests_per_minute",
                "must be greater than 0",
            ));
        }

        ValidationError::from_errors(errors)
    }
}

impl Validate for Config {
    fn validate(&self) -> ValidationResult<()> {
        let mut errors = Vec::new();

        if let Err(e) = self.observability.validate() {
            errors.push(e);
        }

        if let Err(e) = self.tushare.validate() {
            errors.push(e);
        }

        ValidationError::from_errors(errors)
    }
}

impl Config {
    /// Ensure a vendor token is present; required before any screening run.
    pub fn require_tushare_token(&self) -> ValidationResult<&str> {
        self.tushare_token()
            .ok_or_else(|| ValidationError::MissingField {
                field: "secrets.tushare_token (or TUSHARE_TOKEN)".into(),
            })
    }
}
