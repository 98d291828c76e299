//! Opening-auction screener for China A-shares.
//!
//! - [`data`]: the market-data contract and the Tushare Pro adapter
//! - [`screener`]: snapshot normalization, baselines, signal evaluation,
//!   the bounded fetch pool, run orchestration and report export

pub mod data;
pub mod screener;

pub use data::{MarketDataProvider, ProviderError, SecurityId, TushareAdapter};
pub use screener::{AuctionScreener, MinuteScreener, ScreenerConfig, ScreenerError, ScreeningRun};
