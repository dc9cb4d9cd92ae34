//! Reconcile a historical series with a live price.
//!
//! Two repairs are applied when the series ends more than
//! [`StitchConfig::staleness_threshold`] before `now` and a live price is known:
//!
//! - every bar is shifted forward by the gap, preserving order and spacing
//! - if the live price differs from the last close by more than
//!   [`StitchConfig::regime_threshold`], every bar's OHLC is scaled by
//!   `live / last_close`
//!
//! The staleness correction exists for environments running on a simulated
//! clock, where historical data can end years before "now". It is
//! environment-specific and can be switched off with
//! [`StitchConfig::correct_staleness`].
//!
//! Independently of staleness, the last bar's close is overwritten by the
//! live price; open/high/low are left alone.

use chrono::{DateTime, Duration, Utc};
use log::debug;

use crate::models::Bar;

#[derive(Clone, Debug, PartialEq)]
pub struct StitchConfig {
    pub correct_staleness: bool,
    /// Gap after which a series is considered stale. Five days tolerates long
    /// weekends and holidays.
    pub staleness_threshold: Duration,
    /// Relative price difference treated as a price-regime mismatch.
    pub regime_threshold: f64,
}

impl Default for StitchConfig {
    fn default() -> Self {
        Self {
            correct_staleness: true,
            staleness_threshold: Duration::days(5),
            regime_threshold: 0.05,
        }
    }
}

/// Result of [`reconcile`].
#[derive(Clone, Debug, PartialEq)]
pub struct StitchOutcome {
    pub bars: Vec<Bar>,
    /// Applied to every timestamp, when the series was stale
    pub time_shift: Option<Duration>,
    /// Applied to every OHLC value, when a regime mismatch was detected
    pub scale_factor: Option<f64>,
    /// Whether the last close was replaced by the live price
    pub spliced: bool,
}

impl StitchOutcome {
    fn untouched(bars: Vec<Bar>) -> Self {
        Self {
            bars,
            time_shift: None,
            scale_factor: None,
            spliced: false,
        }
    }

    pub fn was_repaired(&self) -> bool {
        self.time_shift.is_some() || self.scale_factor.is_some()
    }
}

/// Pure and idempotent for a fixed `(series, live_price, now)`.
pub fn reconcile(
    series: &[Bar],
    live_price: Option<f64>,
    now: DateTime<Utc>,
    config: &StitchConfig,
) -> StitchOutcome {
    let mut bars = series.to_vec();
    let live = live_price.filter(|p| p.is_finite() && *p > 0.0);

    let (Some(live), Some(last)) = (live, bars.last().cloned()) else {
        return StitchOutcome::untouched(bars);
    };

    let mut outcome = StitchOutcome::untouched(Vec::new());
    let gap = now - last.timestamp;

    if config.correct_staleness && gap > config.staleness_threshold {
        for bar in bars.iter_mut() {
            bar.timestamp += gap;
        }
        outcome.time_shift = Some(gap);

        if last.close > 0.0 {
            let ratio = (live - last.close).abs() / last.close;
            if ratio > config.regime_threshold {
                let factor = live / last.close;
                for bar in bars.iter_mut() {
                    bar.open *= factor;
                    bar.high *= factor;
                    bar.low *= factor;
                    bar.close *= factor;
                }
                outcome.scale_factor = Some(factor);
            }
        }

        debug!(
            "Stitched stale series: shifted {} days, scale {:?}",
            gap.num_days(),
            outcome.scale_factor
        );
    }

    if let Some(last) = bars.last_mut() {
        last.close = live;
        outcome.spliced = true;
    }

    outcome.bars = bars;
    outcome
}
