//! Minute-bar scan.
//!
//! When the auction endpoint is unavailable (insufficient vendor points,
//! historical dates) the auction is approximated from the first minutes of
//! the session for an explicit symbol list. The first bar's open stands in
//! for the match price, the summed volume for the match volume, and the
//! lowest close for the auction low.

use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{debug, info};

use auction_common::Validate;

use crate::data::{DailyBar, MarketDataProvider, MinuteBar, ProviderError, SecurityId};

use super::baseline::BaselineEstimator;
use super::config::ScreenerConfig;
use super::engine::ScreeningRun;
use super::error::ScreenerResult;
use super::pool::{FetchPool, PoolConfig};
use super::signal::{SignalEvaluator, FALLBACK_MINUTE_VOLUME};
use super::snapshot::AuctionSnapshot;

/// Approximated auction plus the minute volume it is measured against.
#[derive(Debug, Clone, PartialEq)]
pub struct MinuteCandidate {
    pub snapshot: AuctionSnapshot,
    pub average_minute_volume: f64,
    /// Whether the baseline was degenerate and replaced by the fallback
    pub fallback: bool,
}

/// Build a candidate from daily history and the day's minute bars.
///
/// Returns `None` without a prior close or without minute bars on `date`.
pub fn approximate_auction(
    id: SecurityId,
    date: NaiveDate,
    daily: &[DailyBar],
    minutes: &[MinuteBar],
    first_minutes: usize,
    estimator: &BaselineEstimator,
) -> Option<MinuteCandidate> {
    let history: Vec<DailyBar> = daily
        .iter()
        .filter(|b| b.trade_date < date)
        .cloned()
        .collect();
    let pre_close = history.last()?.close;

    let opening: Vec<&MinuteBar> = minutes
        .iter()
        .filter(|b| b.trade_time.date() == date)
        .take(first_minutes)
        .collect();
    let first = opening.first()?;

    let match_volume = opening.iter().map(|b| b.volume).sum();
    let low_price = opening
        .iter()
        .map(|b| b.close)
        .fold(f64::INFINITY, f64::min);

    let (average_minute_volume, fallback) = match estimator.estimate(&history) {
        Some(b) if b.average_minute_volume > 0.0 => (b.average_minute_volume, false),
        _ => (FALLBACK_MINUTE_VOLUME, true),
    };

    Some(MinuteCandidate {
        snapshot: AuctionSnapshot {
            id,
            pre_close,
            match_price: first.open,
            match_volume,
            low_price: (low_price.is_finite() && low_price != 0.0).then_some(low_price),
        },
        average_minute_volume,
        fallback,
    })
}

/// Screens an explicit symbol list from minute bars.
pub struct MinuteScreener<P: MarketDataProvider + 'static> {
    config: ScreenerConfig,
    provider: Arc<P>,
    estimator: BaselineEstimator,
    evaluator: SignalEvaluator,
    pool: FetchPool,
}

impl<P: MarketDataProvider + 'static> MinuteScreener<P> {
    pub fn new(config: ScreenerConfig, provider: Arc<P>) -> ScreenerResult<Self> {
        config.validate()?;

        Ok(Self {
            estimator: BaselineEstimator::new(config.baseline.clone()),
            evaluator: SignalEvaluator::new(&config),
            pool: FetchPool::new(PoolConfig::from_screener(&config)),
            config,
            provider,
        })
    }

    /// Screen `symbols` (vendor tickers) for `date`. A symbol whose data
    /// cannot be fetched is skipped.
    pub async fn run(&self, symbols: &[String], date: NaiveDate) -> ScreenerResult<ScreeningRun> {
        let mut run = ScreeningRun::new(date, self.config.summary());
        let ids: Vec<SecurityId> = {
            let mut ids: Vec<SecurityId> =
                symbols.iter().map(|s| SecurityId::from_vendor(s)).collect();
            let mut seen = std::collections::HashSet::new();
            ids.retain(|id| seen.insert(id.vendor().to_string()));
            ids
        };

        info!(
            run_id = %run.run_id,
            trade_date = %date,
            symbols = ids.len(),
            first_minutes = self.config.first_minutes,
            "Starting minute-bar screen"
        );

        run.counts.total_rows = ids.len();
        run.counts.baselines_requested = ids.len();

        let provider = Arc::clone(&self.provider);
        let estimator = self.estimator.clone();
        let first_minutes = self.config.first_minutes;
        let candidates = self
            .pool
            .run(
                ids.iter().map(|id| id.vendor().to_string()).collect(),
                move |ts_code: String| {
                    let provider = Arc::clone(&provider);
                    let estimator = estimator.clone();
                    async move {
                        fetch_candidate(
                            provider.as_ref(),
                            &ts_code,
                            date,
                            first_minutes,
                            &estimator,
                        )
                        .await
                    }
                },
            )
            .await;

        run.counts.normalized_rows = candidates.values.len();
        run.counts.dropped_rows = candidates.missing();
        run.counts.baselines_missing = candidates.missing();
        run.counts.baselines_aborted = candidates.aborted;

        for id in &ids {
            let Some(candidate) = candidates.get(id.vendor()) else {
                continue;
            };

            if candidate.fallback {
                run.counts.fallback_baselines += 1;
            } else {
                run.counts.baselines_resolved += 1;
            }

            if let Some(hit) =
                self.evaluator
                    .evaluate(&candidate.snapshot, candidate.average_minute_volume, date)
            {
                debug!(
                    symbol = %hit.symbol,
                    gap = hit.gap,
                    vol_mult = hit.vol_mult,
                    "Minute-bar hit"
                );
                run.hits.push(hit);
            }
        }

        let run = run.finish();
        info!(run_id = %run.run_id, hits = run.hits.len(), "Minute-bar screen complete");
        Ok(run)
    }
}

async fn fetch_candidate<P>(
    provider: &P,
    ts_code: &str,
    date: NaiveDate,
    first_minutes: usize,
    estimator: &BaselineEstimator,
) -> Result<Option<MinuteCandidate>, ProviderError>
where
    P: MarketDataProvider + ?Sized,
{
    let (start, _) = estimator.history_range(date);
    let daily = provider.get_daily_bars(ts_code, start, date).await?;
    let minutes = provider.get_minute_bars(ts_code, date).await?;

    Ok(approximate_auction(
        SecurityId::from_vendor(ts_code),
        date,
        &daily,
        &minutes,
        first_minutes,
        estimator,
    ))
}
