//! Screener configuration module.
//!
//! Thresholds, worker-pool sizing, baseline estimation parameters, vendor
//! field aliases and output settings for the opening-auction screener.

use serde::{Deserialize, Serialize};

use auction_common::validation::{Validate, ValidationError, ValidationResult};

use super::report::ReportFormat;

// ============================================================================
// Main Screener Configuration
// ============================================================================

/// Configuration for the opening-auction screener.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreenerConfig {
    /// Minimum gap above previous close (0.07 = 7%)
    #[serde(default = "default_gap_threshold")]
    pub gap_threshold: f64,

    /// Minimum auction volume as a multiple of the average minute volume
    #[serde(default = "default_volume_multiplier_threshold", alias = "vol_multiplier_threshold")]
    pub volume_multiplier_threshold: f64,

    /// Maximum allowed retracement below the match price (0.05 = 5%)
    #[serde(default = "default_max_pullback")]
    pub max_pullback: f64,

    /// Number of concurrent baseline fetches
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Pause after each completed fetch, per worker (milliseconds)
    #[serde(default = "default_pause_ms")]
    pub pause_ms: u64,

    /// Optional wall-clock budget for the baseline phase (seconds).
    /// Fetches still pending at expiry are treated as "no baseline".
    #[serde(default)]
    pub deadline_secs: Option<u64>,

    /// Retries for recoverable vendor errors (network, rate limit)
    #[serde(default)]
    pub max_retries: u32,

    /// Backoff step between retries (milliseconds, multiplied by attempt)
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Only fetch baselines for rows whose gap already passes
    #[serde(default)]
    pub prefilter_by_gap: bool,

    /// What to do when a security has no usable baseline
    #[serde(default)]
    pub missing_baseline: MissingBaselinePolicy,

    /// What to do when the snapshot carries no low price
    #[serde(default)]
    pub missing_low_price: MissingLowPricePolicy,

    /// Minute bars used to approximate the auction in the minute-bar scan
    #[serde(default = "default_first_minutes")]
    pub first_minutes: usize,

    /// Baseline estimation parameters
    #[serde(default)]
    pub baseline: BaselineConfig,

    /// Vendor field aliases
    #[serde(default)]
    pub aliases: FieldAliases,

    /// Output configuration
    #[serde(default)]
    pub output: OutputConfig,
}

impl Default for ScreenerConfig {
    fn default() -> Self {
        Self {
            gap_threshold: default_gap_threshold(),
            volume_multiplier_threshold: default_volume_multiplier_threshold(),
            max_pullback: default_max_pullback(),
            workers: default_workers(),
            pause_ms: default_pause_ms(),
            deadline_secs: None,
            max_retries: 0,
            retry_backoff_ms: default_retry_backoff_ms(),
            prefilter_by_gap: false,
            missing_baseline: MissingBaselinePolicy::default(),
            missing_low_price: MissingLowPricePolicy::default(),
            first_minutes: default_first_minutes(),
            baseline: BaselineConfig::default(),
            aliases: FieldAliases::default(),
            output: OutputConfig::default(),
        }
    }
}

impl ScreenerConfig {
    /// Parse the raw `screener` section of the service configuration.
    pub fn from_section(section: Option<&serde_json::Value>) -> ValidationResult<Self> {
        match section {
            None | Some(serde_json::Value::Null) => Ok(Self::default()),
            Some(value) => serde_json::from_value(value.clone())
                .map_err(|e| ValidationError::invalid("screener", e.to_string())),
        }
    }

    /// One-line description of the active thresholds.
    pub fn summary(&self) -> String {
        format!(
            "gap>={:.2}%, vol_mult>={}, pullback>=-{:.2}%",
            self.gap_threshold * 100.0,
            self.volume_multiplier_threshold,
            self.max_pullback * 100.0
        )
    }
}

fn default_gap_threshold() -> f64 {
    0.07
}

fn default_volume_multiplier_threshold() -> f64 {
    3.0
}

fn default_max_pullback() -> f64 {
    0.05
}

fn default_workers() -> usize {
    8
}

fn default_pause_ms() -> u64 {
    100
}

fn default_retry_backoff_ms() -> u64 {
    500
}

fn default_first_minutes() -> usize {
    10
}

// ============================================================================
// Policies
// ============================================================================

/// Handling of securities without a usable volume baseline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingBaselinePolicy {
    /// No history → average minute volume 1.0; zero history → ε denominator
    #[default]
    Fallback,
    /// Skip securities whose baseline is undefined or zero
    Exclude,
}

/// Handling of snapshot rows without a low price.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingLowPricePolicy {
    /// Treat as no pullback (0.0)
    #[default]
    Neutral,
    /// Do not emit a hit without an observed low
    Reject,
}

// ============================================================================
// Baseline Configuration
// ============================================================================

/// Parameters for the trailing-volume baseline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaselineConfig {
    /// Calendar days of daily bars to request
    #[serde(default = "default_lookback_days")]
    pub lookback_days: i64,

    /// Trailing trading days averaged
    #[serde(default = "default_window")]
    pub window: usize,

    /// Continuous-session minutes per trading day
    #[serde(default = "default_trading_minutes")]
    pub trading_minutes_per_day: f64,
}

impl Default for BaselineConfig {
    fn default() -> Self {
        Self {
            lookback_days: default_lookback_days(),
            window: default_window(),
            trading_minutes_per_day: default_trading_minutes(),
        }
    }
}

fn default_lookback_days() -> i64 {
    60 // enough calendar days for 20 trading days
}

fn default_window() -> usize {
    20
}

fn default_trading_minutes() -> f64 {
    240.0 // 9:30-11:30 + 13:00-15:00
}

// ============================================================================
// Field Aliases
// ============================================================================

/// Ordered vendor field names per logical snapshot field (first match wins).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldAliases {
    #[serde(default = "default_identifier_aliases")]
    pub identifier: Vec<String>,
    #[serde(default = "default_pre_close_aliases")]
    pub pre_close: Vec<String>,
    #[serde(default = "default_match_price_aliases")]
    pub match_price: Vec<String>,
    #[serde(default = "default_match_volume_aliases")]
    pub match_volume: Vec<String>,
    #[serde(default = "default_low_price_aliases")]
    pub low_price: Vec<String>,
}

impl Default for FieldAliases {
    fn default() -> Self {
        Self {
            identifier: default_identifier_aliases(),
            pre_close: default_pre_close_aliases(),
            match_price: default_match_price_aliases(),
            match_volume: default_match_volume_aliases(),
            low_price: default_low_price_aliases(),
        }
    }
}

impl FieldAliases {
    fn entries(&self) -> [(&'static str, &Vec<String>); 5] {
        [
            ("identifier", &self.identifier),
            ("pre_close", &self.pre_close),
            ("match_price", &self.match_price),
            ("match_volume", &self.match_volume),
            ("low_price", &self.low_price),
        ]
    }
}

fn strings(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

fn default_identifier_aliases() -> Vec<String> {
    strings(&["ts_code", "code"])
}

fn default_pre_close_aliases() -> Vec<String> {
    strings(&["pre_close", "pre_close_price", "pre_close_px", "last_close"])
}

fn default_match_price_aliases() -> Vec<String> {
    strings(&["match_price", "match_px", "price", "match_prc"])
}

fn default_match_volume_aliases() -> Vec<String> {
    // `vol` is what `stk_auction` actually returns
    strings(&["match_vol", "match_volume", "match_volumn", "match_qty", "vol"])
}

fn default_low_price_aliases() -> Vec<String> {
    strings(&["low_price", "min_price"])
}

// ============================================================================
// Output Configuration
// ============================================================================

/// Output configuration for screening results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Whether to write result files
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Directory for result files (`~` is expanded)
    #[serde(default = "default_output_dir")]
    pub dir: String,

    /// Formats to write
    #[serde(default = "default_formats")]
    pub formats: Vec<ReportFormat>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: default_output_dir(),
            formats: default_formats(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_output_dir() -> String {
    ".".to_string()
}

fn default_formats() -> Vec<ReportFormat> {
    vec![ReportFormat::Csv]
}

// ============================================================================
// Validation
// ============================================================================

impl Validate for ScreenerConfig {
    fn validate(&self) -> ValidationResult<()> {
        let mut errors = Vec::new();

        if !self.gap_threshold.is_finite() || self.gap_threshold <= -1.0 {
            errors.push(ValidationError::invalid(
                "screener.gap_threshold",
                "must be a finite ratio greater than -1.0",
            ));
        }

        if !self.volume_multiplier_threshold.is_finite() || self.volume_multiplier_threshold < 0.0 {
            errors.push(ValidationError::invalid(
                "screener.volume_multiplier_threshold",
                "must be a finite, non-negative multiple",
            ));
        }

        if !self.max_pullback.is_finite() || !(0.0..=1.0).contains(&self.max_pullback) {
            errors.push(ValidationError::invalid(
                "screener.max_pullback",
                "must be between 0.0 and 1.0",
            ));
        }

        if self.workers == 0 || self.workers > 64 {
            errors.push(ValidationError::invalid(
                "screener.workers",
                "must be between 1 and 64",
            ));
        }

        if self.deadline_secs == Some(0) {
            errors.push(ValidationError::invalid(
                "screener.deadline_secs",
                "must be greater than 0 when set",
            ));
        }

        if self.first_minutes == 0 {
            errors.push(ValidationError::invalid(
                "screener.first_minutes",
                "must be at least 1",
            ));
        }

        if self.baseline.window == 0 {
            errors.push(ValidationError::invalid(
                "screener.baseline.window",
                "must be at least 1",
            ));
        }

        if self.baseline.lookback_days < self.baseline.window as i64 {
            errors.push(ValidationError::Conflict {
                reason: format!(
                    "screener.baseline.lookback_days ({}) is shorter than the window ({})",
                    self.baseline.lookback_days, self.baseline.window
                ),
            });
        }

        if !self.baseline.trading_minutes_per_day.is_finite()
            || self.baseline.trading_minutes_per_day <= 0.0
        {
            errors.push(ValidationError::invalid(
                "screener.baseline.trading_minutes_per_day",
                "must be positive",
            ));
        }

        for (field, names) in self.aliases.entries() {
            if names.is_empty() || names.iter().any(|n| n.trim().is_empty()) {
                errors.push(ValidationError::invalid(
                    format!("screener.aliases.{field}"),
                    "must list at least one non-empty field name",
                ));
            }
        }

        if self.output.enabled && self.output.formats.is_empty() {
            errors.push(ValidationError::invalid(
                "screener.output.formats",
                "must name at least one format when output is enabled",
            ));
        }

        ValidationError::from_errors(errors)
    }
}

// ============================================================================
// Tests
// ============================================================================
