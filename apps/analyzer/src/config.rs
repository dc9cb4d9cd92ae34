use std::time::Duration;

use optionscope_analytics::VwapAnchor;
use optionscope_market_data::Timeframe;

const DEFAULT_PROVIDER_TIMEOUT_SECS: u64 = 8;
const DEFAULT_TIMEFRAMES: [Timeframe; 3] = [
    Timeframe::OneDay,
    Timeframe::OneHour,
    Timeframe::FifteenMinutes,
];

#[derive(Debug, Clone, PartialEq)]
pub struct AnalyzerConfig {
    pub json_logs: bool,
    /// Deadline for each waterfall tier
    pub provider_timeout: Duration,
    pub timeframes: Vec<Timeframe>,
    pub vwap_anchor: VwapAnchor,
    /// Values that could not be parsed, reported once logging is up
    pub ignored: Vec<String>,
}

impl AnalyzerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Unparseable values fall back to the default and are listed in `ignored`.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut ignored = Vec::new();
        let json_logs = lookup("ANALYZER_LOG_FORMAT")
            .map(|v| v.trim().eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        let provider_timeout = lookup("ANALYZER_PROVIDER_TIMEOUT_SECS")
            .and_then(|v| match v.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => Some(secs),
                _ => {
                    ignored.push(format!("ANALYZER_PROVIDER_TIMEOUT_SECS={}", v));
                    None
                }
            })
            .unwrap_or(DEFAULT_PROVIDER_TIMEOUT_SECS);

        let mut timeframes: Vec<Timeframe> = Vec::new();
        if let Some(list) = lookup("ANALYZER_TIMEFRAMES") {
            for item in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
                match item.parse::<Timeframe>() {
                    Ok(tf) if !timeframes.contains(&tf) => timeframes.push(tf),
                    Ok(_) => {}
                    Err(e) => ignored.push(e),
                }
            }
        }
        if timeframes.is_empty() {
            timeframes = DEFAULT_TIMEFRAMES.to_vec();
        }

        let vwap_anchor = lookup("ANALYZER_VWAP_ANCHOR")
            .and_then(|v| match v.parse::<VwapAnchor>() {
                Ok(anchor) => Some(anchor),
                Err(e) => {
                    ignored.push(e);
                    None
                }
            })
            .unwrap_or_default();

        Self {
            json_logs,
            provider_timeout: Duration::from_secs(provider_timeout),
            timeframes,
            vwap_anchor,
            ignored,
        }
    }
}
