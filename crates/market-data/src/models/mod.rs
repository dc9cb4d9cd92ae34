//! Market data models
//!
//! This module contains the core data types for market data operations:
//! - `types` - Type aliases for common identifiers (ProviderId, Symbol)
//! - `quote` - Live quote and market session (Quote, MarketSession)
//! - `bar` - OHLCV bars and timeframes (Bar, Timeframe)
//! - `options` - Option contracts and chains (OptionContract, OptionChain)
//! - `fundamentals` - Fundamentals and news sentiment
//! - `resource` - Resource requests, payloads and source tags for the waterfall

mod bar;
mod fundamentals;
mod options;
mod quote;
mod resource;
mod types;

pub use bar::{resample, Bar, Timeframe};
pub use fundamentals::{Fundamentals, Sentiment};
pub use options::{Greeks, OptionChain, OptionContract, OptionType, StrikeRow};
pub use quote::{MarketSession, Quote};
pub use resource::{DataSource, Freshness, Payload, ResourceKind, ResourceRequest, Sourced};
pub use types::{normalize_symbol, ProviderId, Symbol};
