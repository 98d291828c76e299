//! Market data module for A-shares.
//!
//! Provides the vendor-facing side of the screener: the provider contract,
//! the Tushare Pro adapter, client-side rate limiting and ticker
//! normalization.
//!
//! # Data Sources
//! - **Tushare Pro**: `stk_auction_o` / `stk_auction` for the opening auction,
//!   `daily` for volume baselines, `stk_mins` for minute bars

mod provider;
mod rate_limiter;
pub mod symbol;
mod tushare;

pub use provider::{MarketDataProvider, ProviderError};
pub use rate_limiter::{shared_limiter, RateLimiter, SharedRateLimiter};
pub use symbol::{Exchange, SecurityId};
pub use tushare::TushareAdapter;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

// ============================================================================
// Core Data Types
// ============================================================================

/// One raw row from a vendor table, keyed by vendor field name.
///
/// Schemas differ across endpoints and API versions, so rows are kept
/// untyped until the snapshot normalizer resolves them.
pub type RawRecord = serde_json::Map<String, serde_json::Value>;

/// A daily bar, reduced to what the screener needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyBar {
    /// Trading date
    pub trade_date: NaiveDate,
    /// Close price
    pub close: f64,
    /// Volume
    pub volume: f64,
}

/// A one-minute bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinuteBar {
    /// Bar time (exchange local time)
    pub trade_time: NaiveDateTime,
    /// Open price
    pub open: f64,
    /// Close price
    pub close: f64,
    /// Volume
    pub volume: f64,
}

/// Coerce a vendor cell to `f64`.
///
/// Cells arrive as JSON numbers or numeric strings depending on the
/// endpoint; null, empty, non-numeric and non-finite values yield `None`.
pub fn coerce_f64(value: &serde_json::Value) -> Option<f64> {
    let n = match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    n.is_finite().then_some(n)
}

/// Compact `YYYYMMDD` date format used by Tushare and the exported files.
pub mod compact_date {
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer};

    pub const FORMAT: &str = "%Y%m%d";

    pub fn serialize<S: Serializer>(date: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&date.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDate, D::Error> {
        let s = String::deserialize(deserializer)?;
        parse(&s).ok_or_else(|| serde::de::Error::custom(format!("invalid date: {s}")))
    }

    /// Parse `YYYYMMDD`, also accepting `YYYY-MM-DD`.
    pub fn parse(s: &str) -> Option<NaiveDate> {
        let s = s.trim();
        NaiveDate::parse_from_str(s, FORMAT)
            .or_else(|_| NaiveDate::parse_from_str(s, "%Y-%m-%d"))
            .ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coerce_f64() {
        use serde_json::json;
        assert_eq!(coerce_f64(&json!(10.8)), Some(10.8));
        assert_eq!(coerce_f64(&json!(12)), Some(12.0));
        assert_eq!(coerce_f64(&json!(" 3.5 ")), Some(3.5));
        assert_eq!(coerce_f64(&json!("NaN")), None);
        assert_eq!(coerce_f64(&json!("abc")), None);
        assert_eq!(coerce_f64(&json!(null)), None);
        assert_eq!(coerce_f64(&json!(true)), None);
    }

    #[test]
    fn test_compact_date_parse() {
        let d = NaiveDate::from_ymd_opt(2025, 3, 7).unwrap();
        assert_eq!(compact_date::parse("20250307"), Some(d));
        assert_eq!(compact_date::parse("2025-03-07"), Some(d));
        assert_eq!(compact_date::parse(" 20250307 "), Some(d));
        assert_eq!(compact_date::parse("2025/03/07"), None);
    }
}
