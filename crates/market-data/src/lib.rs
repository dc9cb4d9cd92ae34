//! Optionscope Market Data Crate
//!
//! Multi-source market data with resilience against slow, failing and
//! rate-limited providers.
//!
//! # Overview
//!
//! The market data crate supports:
//! - Quotes, OHLCV bars, option chains, fundamentals and news sentiment
//! - Multiple providers: Tradier, Schwab, Alpaca, Yahoo Finance, Finnhub
//! - Sliding-window rate limiting with provider-reported cooldowns
//! - Token lifecycle for OAuth and cookie/crumb authenticated providers
//! - TTL caching with request coalescing and stale fallback
//! - Reconciliation of stale historical series with a live price
//!
//! # Architecture
//!
//! ```text
//! +-------------------+
//! | MarketDataService |  (orchestrator-facing fetch contracts)
//! +-------------------+
//!           |
//!           v
//! +-------------------+
//! |   ResourceCache   |  (fresh -> Cached, coalesced miss, stale fallback)
//! +-------------------+
//!           |
//!           v
//! +-------------------+
//! | WaterfallResolver |  (ordered tiers, per-tier deadline, validation)
//! +-------------------+
//!           |
//!           v
//! +-------------------+
//! |  ProviderClient   |  (cooldown, window, auth, outcome classification)
//! +-------------------+
//!           |
//!           v
//! +-------------------+
//! |     Provider      |  (Tradier, Schwab, Alpaca, Yahoo, Finnhub)
//! +-------------------+
//! ```
//!
//! # Core Types
//!
//! - [`ResourceRequest`] - One unit of work for the waterfall
//! - [`Sourced`] - A value tagged with its provider and freshness
//! - [`Quote`], [`Bar`], [`OptionChain`], [`Fundamentals`], [`Sentiment`]
//! - [`MarketDataError`] - Error taxonomy with [`RetryClass`] classification

pub mod cache;
pub mod errors;
pub mod models;
pub mod provider;
pub mod registry;
pub mod service;
pub mod settings;
pub mod stitch;

pub use cache::{CacheLookup, ResourceCache};
pub use errors::{MarketDataError, RetryClass};

// Re-export all public types from models
pub use models::{
    normalize_symbol, resample, Bar, DataSource, Freshness, Fundamentals, Greeks, MarketSession,
    OptionChain, OptionContract, OptionType, Payload, ProviderId, Quote, ResourceKind,
    ResourceRequest, Sentiment, Sourced, StrikeRow, Symbol, Timeframe,
};

// Re-export provider types
pub use provider::alpaca::AlpacaProvider;
pub use provider::finnhub::FinnhubProvider;
pub use provider::schwab::SchwabProvider;
pub use provider::tradier::TradierProvider;
pub use provider::yahoo::YahooProvider;
pub use provider::{MarketDataProvider, ProviderCapabilities, ProviderClient};

// Re-export registry types
pub use registry::{
    FetchDiagnostics, ProviderAttempt, RateLimitConfig, RateLimiter, SkipReason,
    ValidationSeverity, WaterfallResolver,
};

pub use service::{CacheTtls, MarketDataService, MarketDataSource};
pub use settings::ProviderSettings;
pub use stitch::{reconcile, StitchConfig, StitchOutcome};
