use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Utc};
use chrono_tz::America::New_York;
use optionscope_market_data::Bar;
use serde::{Deserialize, Serialize};

/// Period boundary at which the volume-weighted average restarts,
/// evaluated in exchange local time.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VwapAnchor {
    #[default]
    Day,
    Week,
    Month,
    Year,
}

impl VwapAnchor {
    fn period_key(&self, timestamp: DateTime<Utc>) -> (i32, u32) {
        let local = timestamp.with_timezone(&New_York);
        match self {
            Self::Day => (local.year(), local.ordinal()),
            Self::Week => {
                let week = local.iso_week();
                (week.year(), week.week())
            }
            Self::Month => (local.year(), local.month()),
            Self::Year => (local.year(), 0),
        }
    }
}

impl fmt::Display for VwapAnchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Day => "day",
            Self::Week => "week",
            Self::Month => "month",
            Self::Year => "year",
        })
    }
}

impl FromStr for VwapAnchor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "day" | "d" | "session" => Ok(Self::Day),
            "week" | "w" => Ok(Self::Week),
            "month" | "m" => Ok(Self::Month),
            "year" | "y" => Ok(Self::Year),
            other => Err(format!("Unknown VWAP anchor: {}", other)),
        }
    }
}

/// Volume-weighted average of the typical price since the last anchor boundary.
#[derive(Debug, Clone)]
pub struct AnchoredVwap {
    anchor: VwapAnchor,
    period: Option<(i32, u32)>,
    price_volume: f64,
    volume: f64,
}

impl AnchoredVwap {
    pub fn new(anchor: VwapAnchor) -> Self {
        Self {
            anchor,
            period: None,
            price_volume: 0.0,
            volume: 0.0,
        }
    }

    /// `None` while the current period has seen no volume.
    pub fn update(&mut self, bar: &Bar) -> Option<f64> {
        let key = self.anchor.period_key(bar.timestamp);
        if self.period != Some(key) {
            self.period = Some(key);
            self.price_volume = 0.0;
            self.volume = 0.0;
        }

        let typical = bar.typical_price();
        if typical.is_finite() && bar.volume.is_finite() && bar.volume > 0.0 {
            self.price_volume += typical * bar.volume;
            self.volume += bar.volume;
        }

        (self.volume > 0.0).then(|| self.price_volume / self.volume)
    }
}
