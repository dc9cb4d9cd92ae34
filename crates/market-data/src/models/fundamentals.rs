use serde::{Deserialize, Serialize};

/// Slow-moving company metrics. Every field is optional because no single
/// vendor reports all of them for every symbol.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fundamentals {
    pub symbol: String,
    pub week52_high: Option<f64>,
    pub week52_low: Option<f64>,
    /// Market capitalization in USD
    pub market_cap: Option<f64>,
    pub pe_ratio: Option<f64>,
    pub beta: Option<f64>,
    /// Decimal (0.005 = 0.5%)
    pub dividend_yield: Option<f64>,
}

impl Fundamentals {
    /// Whether the payload carries anything worth caching.
    pub fn is_empty(&self) -> bool {
        self.week52_high.is_none()
            && self.week52_low.is_none()
            && self.market_cap.is_none()
            && self.pe_ratio.is_none()
            && self.beta.is_none()
            && self.dividend_yield.is_none()
    }
}

/// News sentiment aggregated over the last week.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sentiment {
    pub symbol: String,
    /// 0.0..=1.0
    pub bullish_percent: f64,
    /// 0.0..=1.0
    pub bearish_percent: f64,
    pub article_count: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_fundamentals() {
        let mut f = Fundamentals {
            symbol: "AAPL".to_string(),
            ..Default::default()
        };
        assert!(f.is_empty());
        f.beta = Some(1.2);
        assert!(!f.is_empty());
    }
}
