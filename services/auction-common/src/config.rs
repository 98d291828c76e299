//! Configuration management for the auction screener.
//!
//! Configuration lives in `~/.auction-screener/` (see [`crate::config_loader`]).
//!
//! # Configuration Priority
//!
//! 1. Command-line flags (applied by the binary)
//! 2. Environment variables
//! 3. Config file values
//! 4. Default values
//!
//! # Environment Variable Mapping
//!
//! - `TUSHARE_TOKEN` → secrets.tushare_token
//! - `TUSHARE_BASE_URL` → tushare.base_url
//! - `AUCTION_LOG_LEVEL` → observability.log_level
//! - `AUCTION_LOG_FORMAT` → observability.log_format
//! - `AUCTION_OUTPUT_DIR` → screener.output.dir

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::config_loader::{load_modular_config, merge_json};
use crate::error::{Error, Result};

/// Get the configuration directory path.
pub fn config_dir() -> PathBuf {
    directories::UserDirs::new().map_or_else(
        || PathBuf::from(".auction-screener"),
        |dirs| dirs.home_dir().join(".auction-screener"),
    )
}

/// Expand `~` and environment variables in a configured path.
pub fn expand_path(raw: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(raw).into_owned())
}

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Logging configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Credentials
    #[serde(default)]
    pub secrets: SecretsConfig,

    /// Tushare Pro endpoint settings
    #[serde(default)]
    pub tushare: TushareConfig,

    /// Raw screener section, parsed by the screener service itself.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screener: Option<serde_json::Value>,
}

impl Config {
    /// Load configuration from `dir` (default: [`config_dir`]), with env overrides.
    pub fn load_from_dir(dir: Option<PathBuf>) -> Result<Self> {
        let value = load_modular_config(dir)?;
        let mut config = Self::from_value(value)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Build configuration from an already merged JSON value.
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        serde_json::from_value(value)
            .map_err(|e| Error::Config(format!("Failed to parse configuration: {e}")))
    }

    /// Apply environment variable overrides to the configuration.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(token) = std::env::var("TUSHARE_TOKEN") {
            if !token.trim().is_empty() {
                self.secrets.tushare_token = Some(token);
            }
        }

        if let Ok(url) = std::env::var("TUSHARE_BASE_URL") {
            self.tushare.base_url = url;
        }

        if let Ok(level) = std::env::var("AUCTION_LOG_LEVEL") {
            self.observability.log_level = level;
        }

        if let Ok(format) = std::env::var("AUCTION_LOG_FORMAT") {
            self.observability.log_format = format;
        }

        if let Ok(dir) = std::env::var("AUCTION_OUTPUT_DIR") {
            let patch = serde_json::json!({ "output": { "dir": dir } });
            match self.screener.as_mut() {
                Some(section) => merge_json(section, patch),
                None => self.screener = Some(patch),
            }
        }
    }

    /// Get the Tushare token, if configured.
    pub fn tushare_token(&self) -> Option<&str> {
        self.secrets
            .tushare_token
            .as_deref()
            .filter(|t| !t.trim().is_empty())
    }

    /// Copy of the configuration with secrets masked, for display.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if copy.secrets.tushare_token.is_some() {
            copy.secrets.tushare_token = Some("***REDACTED***".to_string());
        }
        copy
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level", alias = "level")]
    pub log_level: String,

    /// Log format (json, pretty)
    #[serde(default = "default_log_format", alias = "format")]
    pub log_format: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

/// Credentials for external data vendors.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SecretsConfig {
    /// Tushare Pro API token
    #[serde(default, alias = "tushare")]
    pub tushare_token: Option<String>,
}

/// Tushare Pro endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TushareConfig {
    /// API base URL
    #[serde(default = "default_tushare_url")]
    pub base_url: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_tushare_timeout")]
    pub timeout_secs: u64,

    /// Client-side request budget (requests per minute)
    #[serde(default = "default_tushare_rpm")]
    pub requests_per_minute: u32,
}

impl Default for TushareConfig {
    fn default() -> Self {
        Self {
            base_url: default_tushare_url(),
            timeout_secs: default_tushare_timeout(),
            requests_per_minute: default_tushare_rpm(),
        }
    }
}

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "pretty".into()
}

fn default_tushare_url() -> String {
    "http://api.tushare.pro".into()
}

fn default_tushare_timeout() -> u64 {
    30
}

fn default_tushare_rpm() -> u32 {
    // Tushare Pro with 2000+ points allows 500 req/min on `daily`
    500
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.observability.log_level, "info");
        assert_eq!(config.observability.log_format, "pretty");
        assert_eq!(config.tushare.base_url, "http://api.tushare.pro");
        assert_eq!(config.tushare.requests_per_minute, 500);
        assert!(config.tushare_token().is_none());
        assert!(config.screener.is_none());
    }

    #[test]
    fn test_from_value_with_aliases() {
        let config = Config::from_value(json!({
            "observability": { "level": "debug", "format": "json" },
            "secrets": { "tushare": "tok" },
            "tushare": { "requests_per_minute": 200 },
            "screener": { "workers": 6 }
        }))
        .unwrap();

        assert_eq!(config.observability.log_level, "debug");
        assert_eq!(config.observability.log_format, "json");
        assert_eq!(config.tushare_token(), Some("tok"));
        assert_eq!(config.tushare.requests_per_minute, 200);
        assert_eq!(config.tushare.timeout_secs, 30);
        assert_eq!(config.screener.unwrap()["workers"], 6);
    }

    #[test]
    fn test_blank_token_is_none() {
        let mut config = Config::default();
        config.secrets.tushare_token = Some("   ".into());
        assert!(config.tushare_token().is_none());
    }

    #[test]
    fn test_redacted_masks_token() {
        let mut config = Config::default();
        config.secrets.tushare_token = Some("secret-token".into());
        let shown = serde_json::to_string(&config.redacted()).unwrap();
        assert!(!shown.contains("secret-token"));
        assert!(shown.contains("REDACTED"));
    }

    #[test]
    fn test_from_value_rejects_wrong_types() {
        let err = Config::from_value(json!({ "tushare": { "timeout_secs": "soon" } }))
            .unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_expand_path_tilde() {
        let path = expand_path("~/reports");
        assert!(!path.to_string_lossy().starts_with('~'));
        assert_eq!(expand_path("/tmp/out"), PathBuf::from("/tmp/out"));
    }
}
