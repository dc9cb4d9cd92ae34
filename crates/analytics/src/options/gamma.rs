//! Gamma squeeze heuristic.
//!
//! Additive points from four independent observations, clamped to 100:
//!
//! | Component | Points |
//! |---|---|
//! | Volume put/call ratio < 0.5 / < 0.7 / < 0.9 | 40 / 25 / 10 |
//! | Near-the-money call volume > OI / > half of OI | 30 / 15 |
//! | Implied over realized volatility >= 1.5 / >= 1.2 | 20 / 10 |
//! | Price within 1% of its 52-week high | 10 |
//!
//! Without realized volatility the IV component uses absolute levels
//! (>= 60% / >= 40%). Every component that fires adds a line to `details`.

use optionscope_market_data::{OptionChain, OptionType};
use serde::{Deserialize, Serialize};

use super::pcr::put_call_ratio;

pub const MAX_SCORE: u32 = 100;
/// Strikes within this fraction of price count as near the money.
pub const NEAR_MONEY_BAND: f64 = 0.05;
const HIGH_PROXIMITY: f64 = 0.99;

#[derive(Clone, Debug)]
pub struct GammaSqueezeInput<'a> {
    pub symbol: &'a str,
    pub price: f64,
    pub atr: Option<f64>,
    pub week52_high: Option<f64>,
    pub week52_low: Option<f64>,
    /// Annualized realized volatility, decimal
    pub realized_vol: Option<f64>,
    pub chain: Option<&'a OptionChain>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GammaComponents {
    pub put_call: u32,
    pub call_flow: u32,
    pub implied_vol: u32,
    pub high_proximity: u32,
}

impl GammaComponents {
    fn total(&self) -> u32 {
        self.put_call + self.call_flow + self.implied_vol + self.high_proximity
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GammaSqueezeScore {
    pub score: u32,
    pub components: GammaComponents,
    pub details: Vec<String>,
}

impl GammaSqueezeScore {
    fn unavailable(detail: String) -> Self {
        Self {
            score: 0,
            components: GammaComponents::default(),
            details: vec![detail],
        }
    }
}

fn put_call_points(ratio: f64) -> u32 {
    if ratio < 0.5 {
        40
    } else if ratio < 0.7 {
        25
    } else if ratio < 0.9 {
        10
    } else {
        0
    }
}

fn iv_points(iv: f64, realized_vol: Option<f64>) -> (u32, String) {
    match realized_vol.filter(|rv| rv.is_finite() && *rv > 0.0) {
        Some(rv) => {
            let ratio = iv / rv;
            let points = if ratio >= 1.5 {
                20
            } else if ratio >= 1.2 {
                10
            } else {
                0
            };
            let detail = format!(
                "Near-the-money IV {:.0}% is {:.2}x realized volatility {:.0}%",
                iv * 100.0,
                ratio,
                rv * 100.0
            );
            (points, detail)
        }
        None => {
            let points = if iv >= 0.60 {
                20
            } else if iv >= 0.40 {
                10
            } else {
                0
            };
            (points, format!("Near-the-money IV {:.0}%", iv * 100.0))
        }
    }
}

pub fn gamma_squeeze_score(input: &GammaSqueezeInput<'_>) -> GammaSqueezeScore {
    let Some(chain) = input.chain.filter(|c| !c.is_empty()) else {
        return GammaSqueezeScore::unavailable(format!(
            "No option chain available for {}",
            input.symbol
        ));
    };
    let pcr = put_call_ratio(chain);
    if pcr.total_calls == 0 {
        return GammaSqueezeScore::unavailable(format!(
            "No call volume in the {} chain; put/call ratio unavailable",
            input.symbol
        ));
    }

    let mut components = GammaComponents::default();
    let mut details = Vec::new();

    components.put_call = put_call_points(pcr.volume_ratio);
    if components.put_call > 0 {
        details.push(format!(
            "Call-heavy put/call ratio {:.2} (+{})",
            pcr.volume_ratio, components.put_call
        ));
    }

    let price = input.price;
    let near_calls: Vec<_> = if price.is_finite() && price > 0.0 {
        chain
            .contracts()
            .filter(|c| c.option_type == OptionType::Call)
            .filter(|c| (c.strike - price).abs() <= price * NEAR_MONEY_BAND)
            .collect()
    } else {
        Vec::new()
    };

    if near_calls.is_empty() {
        details.push("No call strikes within 5% of price".to_string());
    } else {
        let volume: u64 = near_calls.iter().map(|c| c.volume).sum();
        let open_interest: u64 = near_calls.iter().map(|c| c.open_interest).sum();
        components.call_flow = if volume > 0 && volume > open_interest {
            30
        } else if volume > 0 && volume as f64 > open_interest as f64 * 0.5 {
            15
        } else {
            0
        };
        if components.call_flow > 0 {
            details.push(format!(
                "Near-the-money call volume {} against open interest {} (+{})",
                volume, open_interest, components.call_flow
            ));
        }

        let ivs: Vec<f64> = near_calls
            .iter()
            .filter_map(|c| c.implied_volatility())
            .collect();
        if !ivs.is_empty() {
            let average = ivs.iter().sum::<f64>() / ivs.len() as f64;
            let (points, detail) = iv_points(average, input.realized_vol);
            components.implied_vol = points;
            if points > 0 {
                details.push(format!("{} (+{})", detail, points));
            }
        }
    }

    if let Some(high) = input.week52_high.filter(|h| h.is_finite() && *h > 0.0) {
        if price >= high * HIGH_PROXIMITY {
            components.high_proximity = 10;
            let range = match input.week52_low {
                Some(low) => format!("{:.2}-{:.2}", low, high),
                None => format!("high {:.2}", high),
            };
            details.push(format!(
                "Price {:.2} within 1% of the 52-week range top ({}) (+10)",
                price, range
            ));
        }
    }

    let score = components.total().min(MAX_SCORE);
    if score > 0 {
        if let Some(atr) = input.atr.filter(|a| a.is_finite() && *a > 0.0 && price > 0.0) {
            details.push(format!(
                "Daily ATR {:.2} ({:.1}% of price)",
                atr,
                atr / price * 100.0
            ));
        }
    }

    GammaSqueezeScore {
        score,
        components,
        details,
    }
}
