//! Indicator engine.
//!
//! Every indicator is an incremental state machine fed one bar at a time, so
//! a value computed for bar `i` depends only on bars `0..=i`. Running
//! [`compute`] on a longer series therefore never changes the snapshots it
//! already produced for the shorter prefix.

mod adx;
mod atr;
mod bollinger;
mod ema;
mod macd;
mod rsi;
mod volatility;
mod vwap;

pub use adx::{Adx, AdxValue};
pub use atr::{true_range, Atr};
pub use bollinger::{BollingerBands, BollingerValue};
pub use ema::Ema;
pub use macd::{Macd, MacdValue};
pub use rsi::Rsi;
pub use volatility::{realized_volatility, TRADING_DAYS};
pub use vwap::{AnchoredVwap, VwapAnchor};

use optionscope_market_data::Bar;
use serde::{Deserialize, Serialize};

use crate::trend::{classify_trend, Trend, TREND_EMA_PERIOD};

/// Shortest series worth analyzing: the slow MACD leg has to be warm.
pub const MIN_BARS: usize = 26;

pub const RSI_PERIOD: usize = 14;
pub const ATR_PERIOD: usize = 14;
pub const ADX_PERIOD: usize = 14;

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndicatorConfig {
    pub vwap_anchor: VwapAnchor,
}

/// Indicator values as of one bar. `None` until the lookback is satisfied.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndicatorSnapshot {
    pub bar: Bar,
    pub ema9: Option<f64>,
    pub ema21: Option<f64>,
    pub ema50: Option<f64>,
    pub ema200: Option<f64>,
    pub rsi: Option<f64>,
    pub macd: Option<MacdValue>,
    pub bollinger: Option<BollingerValue>,
    pub vwap: Option<f64>,
    pub atr: Option<f64>,
    pub adx: Option<AdxValue>,
    pub trend: Trend,
}

impl IndicatorSnapshot {
    /// Short, medium and medium-long EMAs strictly ascending (+1),
    /// strictly descending (-1), or anything else (0).
    pub fn ema_stack(&self) -> i8 {
        match (self.ema9, self.ema21, self.ema50) {
            (Some(a), Some(b), Some(c)) if a > b && b > c => 1,
            (Some(a), Some(b), Some(c)) if a < b && b < c => -1,
            _ => 0,
        }
    }
}

struct IndicatorState {
    ema9: Ema,
    ema21: Ema,
    ema50: Ema,
    ema200: Ema,
    rsi: Rsi,
    macd: Macd,
    bollinger: BollingerBands,
    vwap: AnchoredVwap,
    atr: Atr,
    adx: Adx,
}

impl IndicatorState {
    fn new(config: &IndicatorConfig) -> Self {
        Self {
            ema9: Ema::new(9),
            ema21: Ema::new(21),
            ema50: Ema::new(TREND_EMA_PERIOD),
            ema200: Ema::new(200),
            rsi: Rsi::new(RSI_PERIOD),
            macd: Macd::default(),
            bollinger: BollingerBands::default(),
            vwap: AnchoredVwap::new(config.vwap_anchor),
            atr: Atr::new(ATR_PERIOD),
            adx: Adx::new(ADX_PERIOD),
        }
    }

    fn step(&mut self, bar: &Bar) -> IndicatorSnapshot {
        let close = bar.close;
        let ema50 = self.ema50.update(close);
        IndicatorSnapshot {
            bar: bar.clone(),
            ema9: self.ema9.update(close),
            ema21: self.ema21.update(close),
            ema50,
            ema200: self.ema200.update(close),
            rsi: self.rsi.update(close),
            macd: self.macd.update(close),
            bollinger: self.bollinger.update(close),
            vwap: self.vwap.update(bar),
            atr: self.atr.update(bar.high, bar.low, close),
            adx: self.adx.update(bar.high, bar.low, close),
            trend: classify_trend(close, ema50),
        }
    }
}

/// One snapshot per input bar, in input order.
pub fn compute(bars: &[Bar], config: &IndicatorConfig) -> Vec<IndicatorSnapshot> {
    let mut state = IndicatorState::new(config);
    bars.iter().map(|bar| state.step(bar)).collect()
}
