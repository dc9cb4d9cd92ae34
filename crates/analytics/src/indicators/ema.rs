/// Exponential moving average, seeded with the simple average of the first
/// `period` values and recursive afterwards.
///
/// `None` until `period` values have been seen. Each output depends only on
/// the values before it, so appending bars never changes earlier outputs.
#[derive(Debug, Clone)]
pub struct Ema {
    period: usize,
    alpha: f64,
    seed_sum: f64,
    count: usize,
    value: Option<f64>,
}

impl Ema {
    pub fn new(period: usize) -> Self {
        let period = period.max(1);
        Self {
            period,
            alpha: 2.0 / (period as f64 + 1.0),
            seed_sum: 0.0,
            count: 0,
            value: None,
        }
    }

    pub fn update(&mut self, price: f64) -> Option<f64> {
        if !price.is_finite() {
            return self.value;
        }
        match self.value {
            Some(prev) => self.value = Some(self.alpha * price + (1.0 - self.alpha) * prev),
            None => {
                self.seed_sum += price;
                self.count += 1;
                if self.count == self.period {
                    self.value = Some(self.seed_sum / self.period as f64);
                }
            }
        }
        self.value
    }

    pub fn value(&self) -> Option<f64> {
        self.value
    }
}
