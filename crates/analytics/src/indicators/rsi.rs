/// Relative strength index with Wilder smoothing, bounded to 0..=100.
#[derive(Debug, Clone)]
pub struct Rsi {
    period: usize,
    prev_close: Option<f64>,
    gain_sum: f64,
    loss_sum: f64,
    count: usize,
    averages: Option<(f64, f64)>,
}

impl Rsi {
    pub fn new(period: usize) -> Self {
        Self {
            period: period.max(1),
            prev_close: None,
            gain_sum: 0.0,
            loss_sum: 0.0,
            count: 0,
            averages: None,
        }
    }

    pub fn update(&mut self, close: f64) -> Option<f64> {
        if !close.is_finite() {
            return self.value();
        }
        let Some(prev) = self.prev_close.replace(close) else {
            return None;
        };

        let change = close - prev;
        let gain = change.max(0.0);
        let loss = (-change).max(0.0);
        let n = self.period as f64;

        match self.averages {
            Some((avg_gain, avg_loss)) => {
                self.averages = Some((
                    (avg_gain * (n - 1.0) + gain) / n,
                    (avg_loss * (n - 1.0) + loss) / n,
                ));
            }
            None => {
                self.gain_sum += gain;
                self.loss_sum += loss;
                self.count += 1;
                if self.count == self.period {
                    self.averages = Some((self.gain_sum / n, self.loss_sum / n));
                }
            }
        }
        self.value()
    }

    fn value(&self) -> Option<f64> {
        self.averages.map(|(avg_gain, avg_loss)| {
            if avg_loss == 0.0 {
                if avg_gain == 0.0 {
                    50.0
                } else {
                    100.0
                }
            } else {
                100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rsi_needs_period_changes() {
        let mut rsi = Rsi::new(3);
        assert_eq!(rsi.update(10.0), None);
        assert_eq!(rsi.update(11.0), None);
        assert_eq!(rsi.update(12.0), None);
        // gains 1, 1, 0 / losses 0, 0, 1 -> avg 2/3 vs 1/3 -> RS 2
        let value = rsi.update(11.0).unwrap();
        assert!((value - (100.0 - 100.0 / 3.0)).abs() < 1e-9);
    }

    #[test]
    fn test_rsi_saturates_and_stays_bounded() {
        let mut rsi = Rsi::new(14);
        let mut last = None;
        for i in 0..40 {
            last = rsi.update(100.0 + i as f64);
        }
        assert_eq!(last, Some(100.0));

        let mut flat = Rsi::new(5);
        for _ in 0..10 {
            last = flat.update(50.0);
        }
        assert_eq!(last, Some(50.0));
    }
}
