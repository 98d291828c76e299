//! Trailing volume baseline.
//!
//! The auction volume is compared against what an average minute of the
//! continuous session trades, estimated from recent daily volumes.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::data::{DailyBar, MarketDataProvider, ProviderError};

use super::config::BaselineConfig;

/// Average volume derived from recent daily bars.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VolumeBaseline {
    /// Mean daily volume over the trailing window (may be zero)
    pub average_daily_volume: f64,
    /// Number of daily bars that fed the mean
    pub observations: usize,
    /// `average_daily_volume / trading_minutes_per_day`
    pub average_minute_volume: f64,
}

/// Computes [`VolumeBaseline`]s.
#[derive(Debug, Clone)]
pub struct BaselineEstimator {
    config: BaselineConfig,
}

impl Default for BaselineEstimator {
    fn default() -> Self {
        Self::new(BaselineConfig::default())
    }
}

impl BaselineEstimator {
    pub fn new(config: BaselineConfig) -> Self {
        Self { config }
    }

    /// Calendar range of daily bars to request for `date`.
    pub fn history_range(&self, date: NaiveDate) -> (NaiveDate, NaiveDate) {
        (date - Duration::days(self.config.lookback_days), date)
    }

    /// Estimate from ascending daily bars.
    ///
    /// Uses the last `window` volumes when at least that many exist,
    /// otherwise the mean of everything available. No bars → `None`.
    pub fn estimate(&self, bars: &[DailyBar]) -> Option<VolumeBaseline> {
        if bars.is_empty() {
            return None;
        }

        let take = self.config.window.min(bars.len());
        let recent = &bars[bars.len() - take..];
        let average_daily_volume = recent.iter().map(|b| b.volume).sum::<f64>() / take as f64;

        Some(VolumeBaseline {
            average_daily_volume,
            observations: take,
            average_minute_volume: average_daily_volume / self.config.trading_minutes_per_day,
        })
    }

    /// Fetch daily bars for `ts_code` and estimate its baseline.
    pub async fn fetch<P>(
        &self,
        provider: &P,
        ts_code: &str,
        date: NaiveDate,
    ) -> Result<Option<VolumeBaseline>, ProviderError>
    where
        P: MarketDataProvider + ?Sized,
    {
        let (start, end) = self.history_range(date);
        let bars = provider.get_daily_bars(ts_code, start, end).await?;
        Ok(self.estimate(&bars))
    }
}
