//! Opening-Auction Screener Module.
//!
//! Flags A-shares whose 09:25 call auction gaps up on heavy volume without
//! retracing, using one whole-market auction query and per-security daily
//! volume baselines fetched on a bounded worker pool.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   rows    ┌────────────┐  snapshots  ┌─────────────┐
//! │ auction query│──────────▶│ Normalizer │────────────▶│  Evaluator  │──▶ hits
//! └──────────────┘           └────────────┘             └──────▲──────┘
//!                                  │ ts_codes                  │ baselines
//!                            ┌─────▼──────┐  daily bars  ┌─────┴──────┐
//!                            │ FetchPool  │─────────────▶│ Estimator  │
//!                            └────────────┘              └────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use auction_screener::screener::{AuctionScreener, ScreenerConfig};
//!
//! let screener = AuctionScreener::new(ScreenerConfig::default(), Arc::new(adapter))?;
//! let run = screener.run(date).await?;
//! println!("{}", run.summary());
//! ```

pub mod baseline;
pub mod config;
pub mod engine;
pub mod error;
pub mod minute;
pub mod pool;
pub mod report;
pub mod signal;
pub mod snapshot;

pub use baseline::{BaselineEstimator, VolumeBaseline};
pub use config::{
    BaselineConfig, FieldAliases, MissingBaselinePolicy, MissingLowPricePolicy, OutputConfig,
    ScreenerConfig,
};
pub use engine::{AuctionScreener, RunCounts, ScreeningRun};
pub use error::{ScreenerError, ScreenerResult};
pub use minute::{MinuteCandidate, MinuteScreener};
pub use pool::{FetchPool, PoolConfig, PoolOutcome};
pub use report::{ReportFormat, ReportWriter};
pub use signal::{BaselineResolution, ScreeningHit, SignalEvaluator, SignalMetrics};
pub use snapshot::{AuctionSnapshot, SnapshotNormalizer};
