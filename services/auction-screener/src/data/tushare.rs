//! Tushare Pro API adapter for A-share market data.
//!
//! # API Documentation
//! https://tushare.pro/document/2
//!
//! # Wire Format
//! Every call is a `POST` of `{api_name, token, params, fields}`; responses
//! carry a column list and row arrays:
//!
//! ```text
//! {"code": 0, "msg": "", "data": {"fields": ["ts_code", "vol"], "items": [["000001.SZ", 1200.0]]}}
//! ```
//!
//! # Endpoints Used
//! - Opening auction: `stk_auction_o`, falling back to `stk_auction`
//! - Daily K-line: `daily`
//! - Minute K-line: `stk_mins` (1min)

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

use auction_common::config::{Config, TushareConfig};

use super::provider::{MarketDataProvider, ProviderError};
use super::rate_limiter::{shared_limiter, SharedRateLimiter};
use super::{coerce_f64, compact_date, DailyBar, MinuteBar, RawRecord};

/// Tushare return code for "too many requests per minute".
const CODE_RATE_LIMITED: i64 = 40203;
/// Tushare return codes for invalid token / insufficient permission.
const CODES_AUTH: &[i64] = &[-2001, 40001, 40101];

/// Tushare API adapter
pub struct TushareAdapter {
    /// API token
    token: String,
    /// HTTP client
    client: reqwest::Client,
    /// API base URL
    base_url: String,
    /// Client-side request budget shared by all workers
    limiter: SharedRateLimiter,
}

impl TushareAdapter {
    /// Create a new Tushare adapter
    pub fn new(token: impl Into<String>, settings: &TushareConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            token: token.into(),
            client,
            base_url: settings.base_url.clone(),
            limiter: shared_limiter("tushare", settings.requests_per_minute),
        }
    }

    /// Create from config; `None` when no token is configured.
    pub fn from_config(config: &Config) -> Option<Self> {
        config
            .tushare_token()
            .map(|token| Self::new(token, &config.tushare))
    }

    /// Call the Tushare API and return rows keyed by field name.
    async fn call_api(
        &self,
        api_name: &str,
        params: HashMap<&str, String>,
        fields: Option<&[&str]>,
    ) -> Result<Vec<RawRecord>, ProviderError> {
        let request = TushareRequest {
            api_name,
            token: &self.token,
            params,
            fields: fields.map(|f| f.join(",")),
        };

        self.limiter.acquire().await;

        let response = self
            .client
            .post(&self.base_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| ProviderError::Network(format!("{api_name}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after_secs = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok());
            let body = response.text().await.unwrap_or_default();
            return Err(match status.as_u16() {
                401 | 403 => ProviderError::Auth(format!("{api_name}: HTTP {status}")),
                429 => ProviderError::RateLimited { retry_after_secs },
                500..=599 => ProviderError::Unavailable(format!("{api_name}: HTTP {status}")),
                _ => ProviderError::Internal(format!("{api_name}: HTTP {status} - {body}")),
            });
        }

        let envelope: TushareResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Parse(format!("{api_name}: {e}")))?;

        if envelope.code != 0 {
            return Err(classify_error(
                envelope.code,
                envelope.msg.as_deref().unwrap_or_default(),
            ));
        }

        let rows = envelope.data.map(TushareTable::into_rows).unwrap_or_default();
        debug!(api = api_name, rows = rows.len(), "Tushare call complete");
        Ok(rows)
    }
}

#[async_trait]
impl MarketDataProvider for TushareAdapter {
    fn name(&self) -> &'static str {
        "tushare"
    }

    async fn get_auction_snapshot(&self, date: NaiveDate) -> Result<Vec<RawRecord>, ProviderError> {
        let mut params = HashMap::new();
        params.insert("trade_date", date.format(compact_date::FORMAT).to_string());

        match self.call_api("stk_auction_o", params.clone(), None).await {
            Ok(rows) if !rows.is_empty() => return Ok(rows),
            Ok(_) => debug!(%date, "stk_auction_o returned no rows, trying stk_auction"),
            Err(e) => warn!(%date, error = %e, "stk_auction_o failed, trying stk_auction"),
        }

        self.call_api("stk_auction", params, None).await
    }

    async fn get_daily_bars(
        &self,
        ts_code: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DailyBar>, ProviderError> {
        let mut params = HashMap::new();
        params.insert("ts_code", ts_code.to_string());
        params.insert("start_date", start.format(compact_date::FORMAT).to_string());
        params.insert("end_date", end.format(compact_date::FORMAT).to_string());

        let rows = self
            .call_api("daily", params, Some(&["trade_date", "close", "vol"]))
            .await?;

        Ok(parse_daily_bars(&rows))
    }

    async fn get_minute_bars(
        &self,
        ts_code: &str,
        date: NaiveDate,
    ) -> Result<Vec<MinuteBar>, ProviderError> {
        let day = date.format("%Y-%m-%d");
        let mut params = HashMap::new();
        params.insert("ts_code", ts_code.to_string());
        params.insert("freq", "1min".to_string());
        params.insert("start_date", format!("{day} 09:00:00"));
        params.insert("end_date", format!("{day} 15:00:00"));

        let rows = self
            .call_api(
                "stk_mins",
                params,
                Some(&["trade_time", "open", "close", "vol"]),
            )
            .await?;

        Ok(parse_minute_bars(&rows))
    }
}

// ============================================================================
// Parsing Helpers
// ============================================================================

fn classify_error(code: i64, msg: &str) -> ProviderError {
    if code == CODE_RATE_LIMITED || msg.contains("每分钟") {
        ProviderError::RateLimited {
            retry_after_secs: Some(60),
        }
    } else if CODES_AUTH.contains(&code) || msg.contains("token") || msg.contains("权限") {
        ProviderError::Auth(format!("{code} - {msg}"))
    } else {
        ProviderError::Internal(format!("Tushare API returned error: {code} - {msg}"))
    }
}

/// Rows that fail to parse (bad date, missing volume) are skipped.
fn parse_daily_bars(rows: &[RawRecord]) -> Vec<DailyBar> {
    let mut bars: Vec<DailyBar> = rows
        .iter()
        .filter_map(|row| {
            let trade_date = row
                .get("trade_date")
                .and_then(Value::as_str)
                .and_then(compact_date::parse)?;
            Some(DailyBar {
                trade_date,
                close: row.get("close").and_then(coerce_f64).unwrap_or(0.0),
                volume: row.get("vol").and_then(coerce_f64)?,
            })
        })
        .collect();

    // Tushare returns newest first
    bars.sort_by_key(|b| b.trade_date);
    bars
}

fn parse_minute_bars(rows: &[RawRecord]) -> Vec<MinuteBar> {
    let mut bars: Vec<MinuteBar> = rows
        .iter()
        .filter_map(|row| {
            let trade_time = row
                .get("trade_time")
                .and_then(Value::as_str)
                .and_then(|s| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").ok())?;
            Some(MinuteBar {
                trade_time,
                open: row.get("open").and_then(coerce_f64)?,
                close: row.get("close").and_then(coerce_f64)?,
                volume: row.get("vol").and_then(coerce_f64).unwrap_or(0.0),
            })
        })
        .collect();

    bars.sort_by_key(|b| b.trade_time);
    bars
}

// ============================================================================
// API Types
// ============================================================================

#[derive(Debug, Serialize)]
struct TushareRequest<'a> {
    api_name: &'a str,
    token: &'a str,
    params: HashMap<&'a str, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    fields: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TushareResponse {
    code: i64,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    data: Option<TushareTable>,
}

#[derive(Debug, Deserialize)]
struct TushareTable {
    #[serde(default)]
    fields: Vec<String>,
    #[serde(default)]
    items: Vec<Vec<Value>>,
}

impl TushareTable {
    /// Zip column names with each row; short rows leave trailing fields absent.
    fn into_rows(self) -> Vec<RawRecord> {
        let fields = self.fields;
        self.items
            .into_iter()
            .map(|item| {
                fields
                    .iter()
                    .cloned()
                    .zip(item)
                    .collect::<RawRecord>()
            })
            .collect()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tushare_adapter_creation() {
        let adapter = TushareAdapter::new("test_token", &TushareConfig::default());
        assert_eq!(adapter.token, "test_token");
        assert_eq!(adapter.base_url, "http://api.tushare.pro");
        assert_eq!(adapter.name(), "tushare");
    }

    #[test]
    fn test_from_config_requires_token() {
        let mut config = Config::default();
        assert!(TushareAdapter::from_config(&config).is_none());
        config.secrets.tushare_token = Some("tok".into());
        assert!(TushareAdapter::from_config(&config).is_some());
    }

    #[test]
    fn test_request_serialization() {
        let mut params = HashMap::new();
        params.insert("trade_date", "20250102".to_string());
        let request = TushareRequest {
            api_name: "daily",
            token: "t",
            params,
            fields: Some(["trade_date", "vol"].join(",")),
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["api_name"], "daily");
        assert_eq!(value["params"]["trade_date"], "20250102");
        assert_eq!(value["fields"], "trade_date,vol");
    }

    #[test]
    fn test_table_into_rows() {
        let envelope: TushareResponse = serde_json::from_value(json!({
            "code": 0,
            "msg": "",
            "data": {
                "fields": ["ts_code", "pre_close", "price", "vol"],
                "items": [
                    ["000001.SZ", 10.0, 10.8, 120000.0],
                    ["600000.SH", "8.00", null]
                ]
            }
        }))
        .unwrap();

        let rows = envelope.data.unwrap().into_rows();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["ts_code"], "000001.SZ");
        assert_eq!(rows[0]["price"], 10.8);
        assert_eq!(rows[1]["pre_close"], "8.00");
        assert!(rows[1]["price"].is_null());
        assert!(!rows[1].contains_key("vol"));
    }

    #[test]
    fn test_missing_data_is_empty() {
        let envelope: TushareResponse =
            serde_json::from_value(json!({ "code": 0, "msg": null })).unwrap();
        assert!(envelope.data.is_none());
    }

    #[test]
    fn test_classify_error() {
        assert!(matches!(
            classify_error(40203, "抱歉，您每分钟最多访问该接口200次"),
            ProviderError::RateLimited { .. }
        ));
        assert!(matches!(classify_error(-2001, "invalid"), ProviderError::Auth(_)));
        assert!(matches!(
            classify_error(40300, "没有接口访问权限"),
            ProviderError::Auth(_)
        ));
        assert!(matches!(classify_error(50000, "boom"), ProviderError::Internal(_)));
    }

    fn row(value: Value) -> RawRecord {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_parse_daily_bars_sorted_ascending() {
        let rows = vec![
            row(json!({"trade_date": "20250103", "close": 10.5, "vol": 300.0})),
            row(json!({"trade_date": "20250102", "close": 10.0, "vol": 200.0})),
            row(json!({"trade_date": "bad", "close": 10.0, "vol": 100.0})),
            row(json!({"trade_date": "20250106", "close": 10.0, "vol": null})),
        ];

        let bars = parse_daily_bars(&rows);
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].trade_date, NaiveDate::from_ymd_opt(2025, 1, 2).unwrap());
        assert_eq!(bars[1].volume, 300.0);
    }

    #[test]
    fn test_parse_minute_bars() {
        let rows = vec![
            row(json!({
                "trade_time": "2025-01-02 09:31:00", "open": 10.9, "close": 10.7, "vol": 50.0
            })),
            row(json!({
                "trade_time": "2025-01-02 09:30:00", "open": 10.8, "close": 10.9, "vol": 80.0
            })),
        ];

        let bars = parse_minute_bars(&rows);
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].open, 10.8);
        assert_eq!(bars[1].close, 10.7);
    }
}
