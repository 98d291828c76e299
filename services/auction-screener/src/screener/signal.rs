//! Opening-auction signal.
//!
//! A security is a hit when its auction gaps up, trades a multiple of an
//! average minute's volume, and does not retrace far below the match price.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::data::compact_date;

use super::baseline::VolumeBaseline;
use super::config::{MissingBaselinePolicy, MissingLowPricePolicy, ScreenerConfig};
use super::snapshot::AuctionSnapshot;

/// Added to the minute-volume denominator so a zero baseline stays finite.
pub const EPSILON: f64 = 1e-9;

/// Average minute volume substituted when no history is available.
pub const FALLBACK_MINUTE_VOLUME: f64 = 1.0;

/// A security that passed every threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreeningHit {
    /// Vendor ticker (e.g. `000001.SZ`)
    pub ts_code: String,
    /// Exchange-qualified identifier (e.g. `SZSE.000001`)
    pub symbol: String,
    #[serde(with = "compact_date")]
    pub trade_date: NaiveDate,
    pub pre_close: f64,
    pub match_price: f64,
    pub match_volume: f64,
    pub gap: f64,
    pub vol_mult: f64,
    pub pullback: f64,
}

/// Derived signal values for one security.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignalMetrics {
    pub gap: f64,
    pub vol_mult: f64,
    pub pullback: f64,
}

impl SignalMetrics {
    /// Compute metrics; `None` when `pre_close` is not positive.
    pub fn compute(snapshot: &AuctionSnapshot, average_minute_volume: f64) -> Option<Self> {
        let gap = snapshot.gap()?;
        let vol_mult = snapshot.match_volume / (average_minute_volume + EPSILON);
        let pullback = match snapshot.low_price {
            Some(low) if low != 0.0 && snapshot.match_price > 0.0 => {
                low / snapshot.match_price - 1.0
            }
            _ => 0.0,
        };

        Some(Self {
            gap,
            vol_mult,
            pullback,
        })
    }
}

/// How a security's baseline feeds the evaluation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BaselineResolution {
    /// Baseline observed from history
    Observed(f64),
    /// No history; the fallback minute volume applies
    Fallback(f64),
    /// Skipped under the `exclude` policy
    Excluded,
}

/// Applies thresholds and policies to normalized snapshots.
#[derive(Debug, Clone)]
pub struct SignalEvaluator {
    gap_threshold: f64,
    volume_multiplier_threshold: f64,
    max_pullback: f64,
    missing_baseline: MissingBaselinePolicy,
    missing_low_price: MissingLowPricePolicy,
}

impl SignalEvaluator {
    pub fn new(config: &ScreenerConfig) -> Self {
        Self {
            gap_threshold: config.gap_threshold,
            volume_multiplier_threshold: config.volume_multiplier_threshold,
            max_pullback: config.max_pullback,
            missing_baseline: config.missing_baseline,
            missing_low_price: config.missing_low_price,
        }
    }

    /// Decide which average minute volume to use for a security.
    pub fn resolve_baseline(&self, baseline: Option<&VolumeBaseline>) -> BaselineResolution {
        match (self.missing_baseline, baseline) {
            (MissingBaselinePolicy::Fallback, None) => {
                BaselineResolution::Fallback(FALLBACK_MINUTE_VOLUME)
            }
            (MissingBaselinePolicy::Fallback, Some(b)) => {
                BaselineResolution::Observed(b.average_minute_volume)
            }
            (MissingBaselinePolicy::Exclude, Some(b)) if b.average_minute_volume > 0.0 => {
                BaselineResolution::Observed(b.average_minute_volume)
            }
            (MissingBaselinePolicy::Exclude, _) => BaselineResolution::Excluded,
        }
    }

    /// Whether the metrics clear all three thresholds.
    pub fn passes(&self, metrics: &SignalMetrics) -> bool {
        metrics.gap >= self.gap_threshold
            && metrics.vol_mult >= self.volume_multiplier_threshold
            && metrics.pullback >= -self.max_pullback
    }

    /// Evaluate one snapshot against a resolved average minute volume.
    pub fn evaluate(
        &self,
        snapshot: &AuctionSnapshot,
        average_minute_volume: f64,
        trade_date: NaiveDate,
    ) -> Option<ScreeningHit> {
        if snapshot.low_price.is_none() && self.missing_low_price == MissingLowPricePolicy::Reject {
            return None;
        }

        let metrics = SignalMetrics::compute(snapshot, average_minute_volume)?;
        if !self.passes(&metrics) {
            return None;
        }

        Some(ScreeningHit {
            ts_code: snapshot.ts_code().to_string(),
            symbol: snapshot.id.qualified(),
            trade_date,
            pre_close: snapshot.pre_close,
            match_price: snapshot.match_price,
            match_volume: snapshot.match_volume,
            gap: metrics.gap,
            vol_mult: metrics.vol_mult,
            pullback: metrics.pullback,
        })
    }
}
