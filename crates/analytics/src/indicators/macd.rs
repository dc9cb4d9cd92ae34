use serde::{Deserialize, Serialize};

use super::ema::Ema;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MacdValue {
    pub macd: f64,
    /// EMA of the MACD line; `None` until it has warmed up
    pub signal: Option<f64>,
    pub histogram: Option<f64>,
}

impl MacdValue {
    /// +1 when the line is above its signal, -1 below, 0 otherwise.
    pub fn crossover_side(&self) -> i8 {
        match self.signal {
            Some(signal) if self.macd > signal => 1,
            Some(signal) if self.macd < signal => -1,
            _ => 0,
        }
    }
}

/// Trend line (fast EMA - slow EMA) with its signal line.
#[derive(Debug, Clone)]
pub struct Macd {
    fast: Ema,
    slow: Ema,
    signal: Ema,
}

impl Macd {
    pub fn new(fast: usize, slow: usize, signal: usize) -> Self {
        Self {
            fast: Ema::new(fast),
            slow: Ema::new(slow),
            signal: Ema::new(signal),
        }
    }

    pub fn update(&mut self, close: f64) -> Option<MacdValue> {
        let fast = self.fast.update(close);
        let slow = self.slow.update(close);
        let macd = fast? - slow?;
        if !close.is_finite() {
            return Some(self.current(macd));
        }
        let signal = self.signal.update(macd);
        Some(MacdValue {
            macd,
            signal,
            histogram: signal.map(|s| macd - s),
        })
    }

    fn current(&self, macd: f64) -> MacdValue {
        let signal = self.signal.value();
        MacdValue {
            macd,
            signal,
            histogram: signal.map(|s| macd - s),
        }
    }
}

impl Default for Macd {
    fn default() -> Self {
        Self::new(12, 26, 9)
    }
}
