//! Error types for the analytics layer.

use optionscope_market_data::MarketDataError;
use thiserror::Error;

/// Type alias for Result using our Error type.
pub type Result<T> = std::result::Result<T, AnalyticsError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalyticsError {
    #[error("Market data unavailable: {0}")]
    MarketData(#[from] MarketDataError),
}
