//! Optionscope Analytics - indicators, options signals and multi-timeframe
//! analysis on top of the market data crate.
//!
//! - [`indicators`] - incremental technical indicators and the snapshot engine
//! - [`trend`] - the shared BULLISH / BEARISH / NEUTRAL rule
//! - [`options`] - recommendation, put/call ratio and gamma squeeze scoring
//! - [`engine`] - gathers option data for a symbol and runs the scorers
//! - [`orchestrator`] - per-timeframe analysis with soft failures

pub mod engine;
pub mod errors;
pub mod indicators;
pub mod options;
pub mod orchestrator;
pub mod trend;

pub use engine::{OptionsSignalEngine, OptionsSignals, SignalRequest};
pub use errors::{AnalyticsError, Result};
pub use indicators::{compute, IndicatorConfig, IndicatorSnapshot, VwapAnchor, MIN_BARS};
pub use options::{
    gamma_squeeze_score, put_call_ratio, recommend, round_to_strike, Direction,
    GammaSqueezeScore, PutCallRatio, Recommendation,
};
pub use orchestrator::{
    MultiTimeframeOrchestrator, OrchestratorConfig, SymbolAnalysis, TimeframeAnalysis,
    TimeframeStatus, TrendAlignment,
};
pub use trend::{classify_trend, Trend};
