use chrono::{DateTime, Datelike, Timelike, Utc, Weekday};
use chrono_tz::America::New_York;
use serde::{Deserialize, Serialize};

/// US equity market session.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MarketSession {
    Pre,
    Regular,
    Post,
    Closed,
}

const PRE_OPEN_MINUTE: u32 = 4 * 60;
const REGULAR_OPEN_MINUTE: u32 = 9 * 60 + 30;
const REGULAR_CLOSE_MINUTE: u32 = 16 * 60;
const POST_CLOSE_MINUTE: u32 = 20 * 60;

impl MarketSession {
    /// Session in effect at `instant`, evaluated in exchange local time.
    ///
    /// Exchange holidays are not modeled; a holiday weekday reports the
    /// session its clock time would have on a trading day.
    pub fn at(instant: DateTime<Utc>) -> Self {
        let local = instant.with_timezone(&New_York);
        if matches!(local.weekday(), Weekday::Sat | Weekday::Sun) {
            return Self::Closed;
        }

        let minute = local.hour() * 60 + local.minute();
        match minute {
            m if m < PRE_OPEN_MINUTE => Self::Closed,
            m if m < REGULAR_OPEN_MINUTE => Self::Pre,
            m if m < REGULAR_CLOSE_MINUTE => Self::Regular,
            m if m < POST_CLOSE_MINUTE => Self::Post,
            _ => Self::Closed,
        }
    }

    /// Whether regular-hours liquidity rules apply.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Regular)
    }
}

/// Live quote for a single symbol.
///
/// Ephemeral: produced per request and cached for a few seconds at most.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub symbol: String,
    pub price: f64,
    /// Absolute change versus the previous close
    pub change: f64,
    pub volume: u64,
    pub timestamp: DateTime<Utc>,
    pub session: MarketSession,
}

impl Quote {
    /// Create a quote, deriving the session from the timestamp.
    pub fn new(
        symbol: impl Into<String>,
        price: f64,
        change: f64,
        volume: u64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            price,
            change,
            volume,
            timestamp,
            session: MarketSession::at(timestamp),
        }
    }

    /// Percent change versus the previous close.
    pub fn change_percent(&self) -> Option<f64> {
        let previous = self.price - self.change;
        if previous > 0.0 {
            Some(self.change / previous * 100.0)
        } else {
            None
        }
    }
}
