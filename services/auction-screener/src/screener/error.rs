//! Screener errors.

use thiserror::Error;

use auction_common::ValidationError;

use crate::data::ProviderError;

/// Terminal errors of a screening run.
///
/// Per-security failures never surface here; they degrade to "no baseline"
/// or a dropped row and are counted in the run.
#[derive(Debug, Error)]
pub enum ScreenerError {
    /// Configuration rejected before any vendor call
    #[error("Invalid screener configuration: {0}")]
    InvalidConfig(#[from] ValidationError),

    /// The whole-market auction query failed
    #[error("Failed to fetch auction snapshot for {date}: {source}")]
    MarketSnapshot {
        date: String,
        #[source]
        source: ProviderError,
    },
}

pub type ScreenerResult<T> = std::result::Result<T, ScreenerError>;
