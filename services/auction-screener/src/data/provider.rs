//! Data provider abstraction.
//!
//! Defines the `MarketDataProvider` trait the screener consumes. The vendor
//! is a black box behind three queries: the whole-market auction snapshot,
//! daily bars and (optionally) minute bars.

use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;

use super::{DailyBar, MinuteBar, RawRecord};

// ============================================================================
// Provider Error
// ============================================================================

/// Errors specific to data providers.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    /// Network error (connection failed, timeout)
    #[error("Network error: {0}")]
    Network(String),

    /// Authentication error (invalid token, insufficient points)
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Rate limit exceeded
    #[error("Rate limited{}", .retry_after_secs.map(|s| format!(", retry after {} seconds", s)).unwrap_or_default())]
    RateLimited { retry_after_secs: Option<u64> },

    /// Data not available for the requested symbol/date
    #[error("Data not available: {0}")]
    DataNotAvailable(String),

    /// Provider is temporarily unavailable
    #[error("Provider unavailable: {0}")]
    Unavailable(String),

    /// Response could not be decoded
    #[error("Parse error: {0}")]
    Parse(String),

    /// Internal provider error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ProviderError {
    /// Check if the error is recoverable (worth retrying)
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Network(_) | Self::RateLimited { .. } | Self::Unavailable(_)
        )
    }
}

// ============================================================================
// Data Provider Trait
// ============================================================================

/// Trait for market data providers.
///
/// Implementations own their session state (token, HTTP client, limiter) and
/// are shared across screening workers behind an `Arc`.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Get the provider name (e.g., "tushare")
    fn name(&self) -> &'static str;

    /// Fetch the whole-market opening-auction snapshot for a trading date.
    ///
    /// An empty vector means no auction took place (e.g. a holiday).
    async fn get_auction_snapshot(&self, date: NaiveDate) -> Result<Vec<RawRecord>, ProviderError>;

    /// Fetch daily bars for `[start, end]`, ascending by date.
    ///
    /// May return fewer days than the range spans, or none at all.
    async fn get_daily_bars(
        &self,
        ts_code: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DailyBar>, ProviderError>;

    /// Fetch one-minute bars for a single trading day, ascending by time.
    async fn get_minute_bars(
        &self,
        ts_code: &str,
        _date: NaiveDate,
    ) -> Result<Vec<MinuteBar>, ProviderError> {
        Err(ProviderError::DataNotAvailable(format!(
            "{} does not serve minute bars ({})",
            self.name(),
            ts_code
        )))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_error_recoverable() {
        assert!(ProviderError::Network("timeout".into()).is_recoverable());
        assert!(ProviderError::RateLimited { retry_after_secs: Some(60) }.is_recoverable());
        assert!(ProviderError::Unavailable("maintenance".into()).is_recoverable());
        assert!(!ProviderError::Auth("invalid token".into()).is_recoverable());
        assert!(!ProviderError::DataNotAvailable("no data".into()).is_recoverable());
        assert!(!ProviderError::Parse("bad json".into()).is_recoverable());
    }

    #[test]
    fn test_provider_error_display() {
        let err = ProviderError::RateLimited {
            retry_after_secs: Some(30),
        };
        assert!(err.to_string().contains("30 seconds"));

        let err = ProviderError::RateLimited {
            retry_after_secs: None,
        };
        assert_eq!(err.to_string(), "Rate limited");

        let err = ProviderError::Network("connection refused".into());
        assert!(err.to_string().contains("connection refused"));
    }

    struct SnapshotOnly;

    #[async_trait]
    impl MarketDataProvider for SnapshotOnly {
        fn name(&self) -> &'static str {
            "snapshot-only"
        }

        async fn get_auction_snapshot(
            &self,
            _date: NaiveDate,
        ) -> Result<Vec<RawRecord>, ProviderError> {
            Ok(Vec::new())
        }

        async fn get_daily_bars(
            &self,
            _ts_code: &str,
            _start: NaiveDate,
            _end: NaiveDate,
        ) -> Result<Vec<DailyBar>, ProviderError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_minute_bars_default_not_available() {
        let date = NaiveDate::from_ymd_opt(2025, 1, 2).unwrap();
        let err = SnapshotOnly.get_minute_bars("000001.SZ", date).await.unwrap_err();
        assert!(matches!(err, ProviderError::DataNotAvailable(_)));
        assert!(err.to_string().contains("snapshot-only"));
    }
}
