//! Screener engine module.
//!
//! Orchestrates one screening run: a single whole-market auction query,
//! bounded concurrent baseline fetches, then signal evaluation.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use auction_common::logging::generate_run_id;
use auction_common::Validate;

use crate::data::{compact_date, MarketDataProvider};

use super::baseline::BaselineEstimator;
use super::config::ScreenerConfig;
use super::error::{ScreenerError, ScreenerResult};
use super::pool::{FetchPool, PoolConfig};
use super::signal::{BaselineResolution, ScreeningHit, SignalEvaluator};
use super::snapshot::{AuctionSnapshot, SnapshotNormalizer};

// ============================================================================
// Screening Run
// ============================================================================

/// Bookkeeping for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunCounts {
    /// Rows returned by the auction query
    pub total_rows: usize,
    /// Rows that normalized into a snapshot
    pub normalized_rows: usize,
    /// Rows dropped for missing identifier or prices
    pub dropped_rows: usize,
    /// Baseline fetches dispatched
    pub baselines_requested: usize,
    /// Securities with a baseline from history
    pub baselines_resolved: usize,
    /// Securities without one (no data, error, deadline or panic)
    pub baselines_missing: usize,
    /// Pending fetches cut off by the deadline
    pub baselines_aborted: usize,
    /// Evaluations that used the fallback minute volume
    pub fallback_baselines: usize,
    /// Securities skipped under the `exclude` policy
    pub excluded_missing_baseline: usize,
}

/// Result of a screening run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreeningRun {
    /// Run ID (UUID v4)
    pub run_id: String,
    #[serde(with = "compact_date")]
    pub trade_date: NaiveDate,
    /// Hits in evaluation order
    pub hits: Vec<ScreeningHit>,
    pub counts: RunCounts,
    /// Thresholds used
    pub config_summary: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_secs: f64,
}

impl ScreeningRun {
    pub(crate) fn new(trade_date: NaiveDate, config_summary: String) -> Self {
        let now = Utc::now();
        Self {
            run_id: generate_run_id(),
            trade_date,
            hits: Vec::new(),
            counts: RunCounts::default(),
            config_summary,
            started_at: now,
            completed_at: now,
            duration_secs: 0.0,
        }
    }

    pub(crate) fn finish(mut self) -> Self {
        self.completed_at = Utc::now();
        self.duration_secs =
            (self.completed_at - self.started_at).num_milliseconds() as f64 / 1000.0;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    /// Summary string for logging.
    pub fn summary(&self) -> String {
        format!(
            "{}: {} hits from {} securities in {:.1}s ({} baselines missing, {} rows dropped)",
            self.trade_date.format(compact_date::FORMAT),
            self.hits.len(),
            self.counts.normalized_rows,
            self.duration_secs,
            self.counts.baselines_missing,
            self.counts.dropped_rows
        )
    }
}

// ============================================================================
// Auction Screener
// ============================================================================

/// The opening-auction screener.
///
/// 1. Fetch the whole-market auction snapshot once
/// 2. Fetch a volume baseline per security on the bounded pool
/// 3. Evaluate gap, volume multiplier and pullback per security
pub struct AuctionScreener<P: MarketDataProvider + 'static> {
    config: ScreenerConfig,
    provider: Arc<P>,
    normalizer: SnapshotNormalizer,
    estimator: BaselineEstimator,
    evaluator: SignalEvaluator,
    pool: FetchPool,
}

impl<P: MarketDataProvider + 'static> AuctionScreener<P> {
    /// Create a screener, rejecting invalid configuration up front.
    pub fn new(config: ScreenerConfig, provider: Arc<P>) -> ScreenerResult<Self> {
        config.validate()?;

        Ok(Self {
            normalizer: SnapshotNormalizer::new(config.aliases.clone()),
            estimator: BaselineEstimator::new(config.baseline.clone()),
            evaluator: SignalEvaluator::new(&config),
            pool: FetchPool::new(PoolConfig::from_screener(&config)),
            config,
            provider,
        })
    }

    pub fn config(&self) -> &ScreenerConfig {
        &self.config
    }

    /// Run the screen for one trading date.
    ///
    /// Only a failed auction query is terminal; an empty snapshot yields an
    /// empty run.
    pub async fn run(&self, date: NaiveDate) -> ScreenerResult<ScreeningRun> {
        let mut run = ScreeningRun::new(date, self.config.summary());

        info!(
            run_id = %run.run_id,
            trade_date = %date,
            provider = self.provider.name(),
            thresholds = %run.config_summary,
            "Starting auction screen"
        );

        let rows = self
            .provider
            .get_auction_snapshot(date)
            .await
            .map_err(|source| ScreenerError::MarketSnapshot {
                date: date.format(compact_date::FORMAT).to_string(),
                source,
            })?;

        run.counts.total_rows = rows.len();
        if rows.is_empty() {
            warn!(run_id = %run.run_id, trade_date = %date, "Auction snapshot is empty");
            return Ok(run.finish());
        }

        let (snapshots, dropped) = self.normalizer.normalize_all(&rows);
        run.counts.normalized_rows = snapshots.len();
        run.counts.dropped_rows = dropped;
        if dropped > 0 {
            debug!(run_id = %run.run_id, dropped, "Dropped unparseable auction rows");
        }

        let universe = self.universe(&snapshots);
        run.counts.baselines_requested = universe.len();
        info!(
            run_id = %run.run_id,
            rows = run.counts.total_rows,
            securities = universe.len(),
            workers = self.config.workers,
            "Fetching volume baselines"
        );

        let provider = Arc::clone(&self.provider);
        let estimator = self.estimator.clone();
        let baselines = self
            .pool
            .run(universe, move |ts_code: String| {
                let provider = Arc::clone(&provider);
                let estimator = estimator.clone();
                async move { estimator.fetch(provider.as_ref(), &ts_code, date).await }
            })
            .await;

        run.counts.baselines_resolved = baselines.values.len();
        run.counts.baselines_missing = baselines.missing();
        run.counts.baselines_aborted = baselines.aborted;

        for snapshot in &snapshots {
            if self.config.prefilter_by_gap && !self.gap_passes(snapshot) {
                continue;
            }

            let minute_volume = match self
                .evaluator
                .resolve_baseline(baselines.get(snapshot.ts_code()))
            {
                BaselineResolution::Observed(v) => v,
                BaselineResolution::Fallback(v) => {
                    run.counts.fallback_baselines += 1;
                    v
                }
                BaselineResolution::Excluded => {
                    run.counts.excluded_missing_baseline += 1;
                    continue;
                }
            };

            if let Some(hit) = self.evaluator.evaluate(snapshot, minute_volume, date) {
                debug!(
                    symbol = %hit.symbol,
                    gap = hit.gap,
                    vol_mult = hit.vol_mult,
                    pullback = hit.pullback,
                    "Auction hit"
                );
                run.hits.push(hit);
            }
        }

        let run = run.finish();
        info!(
            run_id = %run.run_id,
            hits = run.hits.len(),
            baselines_resolved = run.counts.baselines_resolved,
            baselines_missing = run.counts.baselines_missing,
            fallback = run.counts.fallback_baselines,
            excluded = run.counts.excluded_missing_baseline,
            duration = format!("{:.1}s", run.duration_secs),
            "Auction screen complete"
        );

        Ok(run)
    }

    /// Deduplicated identifiers needing a baseline, in snapshot order.
    fn universe(&self, snapshots: &[AuctionSnapshot]) -> Vec<String> {
        let mut seen = HashSet::new();
        snapshots
            .iter()
            .filter(|s| !self.config.prefilter_by_gap || self.gap_passes(s))
            .map(|s| s.ts_code().to_string())
            .filter(|code| seen.insert(code.clone()))
            .collect()
    }

    fn gap_passes(&self, snapshot: &AuctionSnapshot) -> bool {
        snapshot
            .gap()
            .is_some_and(|gap| gap >= self.config.gap_threshold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_summary() {
        let date = NaiveDate::from_ymd_opt(2025, 1, 6).unwrap();
        let mut run = ScreeningRun::new(date, "gap>=7.00%".into());
        run.counts.normalized_rows = 5000;
        run.counts.baselines_missing = 12;
        let run = run.finish();

        let summary = run.summary();
        assert!(summary.starts_with("20250106: 0 hits from 5000 securities"));
        assert!(summary.contains("12 baselines missing"));
        assert!(run.is_empty());
        assert_eq!(run.run_id.len(), 36);
    }

    #[test]
    fn test_run_serializes_compact_date() {
        let date = NaiveDate::from_ymd_opt(2025, 1, 6).unwrap();
        let run = ScreeningRun::new(date, String::new()).finish();
        let json = serde_json::to_value(&run).unwrap();
        assert_eq!(json["trade_date"], "20250106");
        assert_eq!(json["counts"]["total_rows"], 0);
    }
}
