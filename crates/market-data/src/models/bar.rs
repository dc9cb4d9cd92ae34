use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// OHLCV bar. Immutable once fetched.
///
/// Series are ordered ascending by time. Spacing is not guaranteed to be
/// uniform (weekends, halts, provider gaps).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    pub fn new(
        timestamp: DateTime<Utc>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// Typical price used by volume-weighted averages.
    pub fn typical_price(&self) -> f64 {
        (self.high + self.low + self.close) / 3.0
    }
}

/// Bar interval requested from providers.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Timeframe {
    #[serde(rename = "1m")]
    OneMinute,
    #[serde(rename = "5m")]
    FiveMinutes,
    #[serde(rename = "15m")]
    FifteenMinutes,
    #[serde(rename = "1h")]
    OneHour,
    #[serde(rename = "1d")]
    OneDay,
    #[serde(rename = "1w")]
    OneWeek,
}

impl Timeframe {
    pub const ALL: [Timeframe; 6] = [
        Timeframe::OneMinute,
        Timeframe::FiveMinutes,
        Timeframe::FifteenMinutes,
        Timeframe::OneHour,
        Timeframe::OneDay,
        Timeframe::OneWeek,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OneMinute => "1m",
            Self::FiveMinutes => "5m",
            Self::FifteenMinutes => "15m",
            Self::OneHour => "1h",
            Self::OneDay => "1d",
            Self::OneWeek => "1w",
        }
    }

    pub fn is_intraday(&self) -> bool {
        !matches!(self, Self::OneDay | Self::OneWeek)
    }

    /// Nominal bar length.
    pub fn bar_duration(&self) -> chrono::Duration {
        match self {
            Self::OneMinute => chrono::Duration::minutes(1),
            Self::FiveMinutes => chrono::Duration::minutes(5),
            Self::FifteenMinutes => chrono::Duration::minutes(15),
            Self::OneHour => chrono::Duration::hours(1),
            Self::OneDay => chrono::Duration::days(1),
            Self::OneWeek => chrono::Duration::weeks(1),
        }
    }

    /// How far back to request history so the longest lookback (200) can warm up
    /// on daily bars.
    pub fn lookback(&self) -> chrono::Duration {
        match self {
            Self::OneMinute => chrono::Duration::days(2),
            Self::FiveMinutes => chrono::Duration::days(5),
            Self::FifteenMinutes => chrono::Duration::days(20),
            Self::OneHour => chrono::Duration::days(60),
            Self::OneDay => chrono::Duration::days(450),
            Self::OneWeek => chrono::Duration::days(5 * 365),
        }
    }

    /// How long a fetched series is considered fresh.
    pub fn cache_ttl(&self) -> Duration {
        if self.is_intraday() {
            Duration::from_secs(60)
        } else {
            Duration::from_secs(15 * 60)
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Timeframe {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "1m" | "1min" => Ok(Self::OneMinute),
            "5m" | "5min" => Ok(Self::FiveMinutes),
            "15m" | "15min" => Ok(Self::FifteenMinutes),
            "1h" | "60m" => Ok(Self::OneHour),
            "1d" | "d" | "daily" => Ok(Self::OneDay),
            "1w" | "w" | "weekly" => Ok(Self::OneWeek),
            other => Err(format!("Unknown timeframe: {}", other)),
        }
    }
}

/// Aggregate finer bars into `timeframe` buckets aligned to UTC multiples of
/// the bar length. Input must be ascending; buckets keep the first open, last
/// close, extreme high/low and summed volume.
pub fn resample(bars: &[Bar], timeframe: Timeframe) -> Vec<Bar> {
    let bucket_secs = timeframe.bar_duration().num_seconds().max(1);
    let mut out: Vec<Bar> = Vec::new();
    let mut current_bucket: Option<i64> = None;

    for bar in bars {
        let bucket = bar.timestamp.timestamp().div_euclid(bucket_secs);
        match (current_bucket, out.last_mut()) {
            (Some(b), Some(last)) if b == bucket => {
                last.high = last.high.max(bar.high);
                last.low = last.low.min(bar.low);
                last.close = bar.close;
                last.volume += bar.volume;
            }
            _ => {
                let start = DateTime::<Utc>::from_timestamp(bucket * bucket_secs, 0)
                    .unwrap_or(bar.timestamp);
                out.push(Bar {
                    timestamp: start,
                    ..bar.clone()
                });
                current_bucket = Some(bucket);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_resample_to_hourly() {
        let at = |h, m| Utc.with_ymd_and_hms(2024, 3, 12, h, m, 0).unwrap();
        let bars = vec![
            Bar::new(at(14, 30), 10.0, 11.0, 9.5, 10.5, 100.0),
            Bar::new(at(14, 45), 10.5, 12.0, 10.0, 11.5, 50.0),
            Bar::new(at(15, 0), 11.5, 11.8, 11.0, 11.2, 70.0),
        ];

        let hourly = resample(&bars, Timeframe::OneHour);
        assert_eq!(hourly.len(), 2);
        assert_eq!(hourly[0].timestamp, at(14, 0));
        assert_eq!(hourly[0].open, 10.0);
        assert_eq!(hourly[0].high, 12.0);
        assert_eq!(hourly[0].low, 9.5);
        assert_eq!(hourly[0].close, 11.5);
        assert_eq!(hourly[0].volume, 150.0);
        assert_eq!(hourly[1].close, 11.2);
    }

    #[test]
    fn test_timeframe_parse_round_trip() {
        for tf in Timeframe::ALL {
            assert_eq!(tf.as_str().parse::<Timeframe>().unwrap(), tf);
        }
        assert_eq!("daily".parse::<Timeframe>().unwrap(), Timeframe::OneDay);
        assert!("3d".parse::<Timeframe>().is_err());
    }

    #[test]
    fn test_intraday_ttl_is_shorter() {
        assert!(Timeframe::FiveMinutes.cache_ttl() < Timeframe::OneDay.cache_ttl());
        assert!(Timeframe::OneHour.is_intraday());
        assert!(!Timeframe::OneWeek.is_intraday());
    }

    #[test]
    fn test_serde_uses_short_names() {
        let json = serde_json::to_string(&Timeframe::FifteenMinutes).unwrap();
        assert_eq!(json, "\"15m\"");
    }
}
