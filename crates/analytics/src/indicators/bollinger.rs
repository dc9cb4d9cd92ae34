use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BollingerValue {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
    /// Position of the close inside the band: 0 at the lower band, 1 at the
    /// upper band, outside 0..=1 when the close breaks out. 0.5 for a
    /// zero-width band.
    pub percent_b: f64,
}

/// Rolling mean ± `num_std` population standard deviations.
#[derive(Debug, Clone)]
pub struct BollingerBands {
    window: VecDeque<f64>,
    period: usize,
    num_std: f64,
}

impl BollingerBands {
    pub fn new(period: usize, num_std: f64) -> Self {
        let period = period.max(1);
        Self {
            window: VecDeque::with_capacity(period),
            period,
            num_std,
        }
    }

    pub fn update(&mut self, close: f64) -> Option<BollingerValue> {
        if close.is_finite() {
            if self.window.len() == self.period {
                self.window.pop_front();
            }
            self.window.push_back(close);
        }
        if self.window.len() < self.period {
            return None;
        }

        let n = self.period as f64;
        let middle = self.window.iter().sum::<f64>() / n;
        let variance = self.window.iter().map(|v| (v - middle).powi(2)).sum::<f64>() / n;
        let width = self.num_std * variance.sqrt();
        let upper = middle + width;
        let lower = middle - width;
        let last = self.window.back().copied().unwrap_or(middle);

        Some(BollingerValue {
            upper,
            middle,
            lower,
            percent_b: if upper > lower {
                (last - lower) / (upper - lower)
            } else {
                0.5
            },
        })
    }
}

impl Default for BollingerBands {
    fn default() -> Self {
        Self::new(20, 2.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bands_and_percent_b() {
        let mut bb = BollingerBands::new(4, 2.0);
        assert!(bb.update(2.0).is_none());
        bb.update(4.0);
        bb.update(4.0);
        let value = bb.update(6.0).unwrap();
        // mean 4, population stdev 1.4142
        assert_eq!(value.middle, 4.0);
        assert!((value.upper - (4.0 + 2.0 * 2f64.sqrt())).abs() < 1e-9);
        assert!(value.percent_b > 0.5 && value.percent_b < 1.0);
    }

    #[test]
    fn test_flat_series_is_centered() {
        let mut bb = BollingerBands::new(3, 2.0);
        let mut last = None;
        for _ in 0..5 {
            last = bb.update(10.0);
        }
        assert_eq!(last.unwrap().percent_b, 0.5);
    }
}
