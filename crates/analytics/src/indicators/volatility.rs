use optionscope_market_data::Bar;

/// Trading days per year used to annualize daily volatility.
pub const TRADING_DAYS: f64 = 252.0;

/// Annualized sample standard deviation of the last `window` daily log
/// returns. `None` when fewer than `window + 1` usable closes exist.
pub fn realized_volatility(bars: &[Bar], window: usize) -> Option<f64> {
    if window < 2 {
        return None;
    }
    let closes: Vec<f64> = bars
        .iter()
        .map(|b| b.close)
        .filter(|c| c.is_finite() && *c > 0.0)
        .collect();
    if closes.len() < window + 1 {
        return None;
    }

    let returns: Vec<f64> = closes[closes.len() - window - 1..]
        .windows(2)
        .map(|w| (w[1] / w[0]).ln())
        .collect();
    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n - 1.0);

    Some(variance.sqrt() * TRADING_DAYS.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn series(closes: &[f64]) -> Vec<Bar> {
        let start = Utc.with_ymd_and_hms(2024, 1, 2, 21, 0, 0).unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(i, c)| Bar::new(start + Duration::days(i as i64), *c, *c, *c, *c, 1.0))
            .collect()
    }

    #[test]
    fn test_constant_growth_has_zero_volatility() {
        let closes: Vec<f64> = (0..30).map(|i| 100.0 * 1.01f64.powi(i)).collect();
        let vol = realized_volatility(&series(&closes), 20).unwrap();
        assert!(vol.abs() < 1e-9);
    }

    #[test]
    fn test_alternating_moves() {
        let closes: Vec<f64> = (0..21)
            .map(|i| if i % 2 == 0 { 100.0 } else { 102.0 })
            .collect();
        let vol = realized_volatility(&series(&closes), 20).unwrap();
        // |ln(1.02)| each day with alternating sign, annualized
        let r = 1.02f64.ln();
        let expected = (r * r * 20.0 / 19.0).sqrt() * TRADING_DAYS.sqrt();
        assert!((vol - expected).abs() < 1e-9);
    }

    #[test]
    fn test_short_series() {
        assert!(realized_volatility(&series(&[100.0; 10]), 20).is_none());
    }
}
