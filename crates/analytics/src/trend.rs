//! The one trend rule every scorer shares.

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Trend {
    Bullish,
    Bearish,
    #[default]
    Neutral,
}

/// Period of the medium EMA the rule compares against.
pub const TREND_EMA_PERIOD: usize = 50;

/// BULLISH above the medium EMA, BEARISH below it, NEUTRAL when equal or
/// when the EMA is not warm yet.
pub fn classify_trend(close: f64, medium_ema: Option<f64>) -> Trend {
    match medium_ema {
        Some(ema) if close > ema => Trend::Bullish,
        Some(ema) if close < ema => Trend::Bearish,
        _ => Trend::Neutral,
    }
}
