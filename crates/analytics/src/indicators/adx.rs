use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdxValue {
    pub adx: f64,
    pub plus_di: f64,
    pub minus_di: f64,
}

/// Average directional index with Wilder smoothing.
///
/// 1. +DM/-DM and true range from consecutive bars
/// 2. Wilder-smooth all three over `period` (seeded with their sums)
/// 3. +DI/-DI = smoothed DM / smoothed TR * 100
/// 4. DX = |+DI - -DI| / (+DI + -DI) * 100
/// 5. ADX = average of the first `period` DX values, Wilder-smoothed after
#[derive(Debug, Clone)]
pub struct Adx {
    period: usize,
    prev: Option<(f64, f64, f64)>,
    tr: f64,
    plus_dm: f64,
    minus_dm: f64,
    seed_count: usize,
    dx_sum: f64,
    dx_count: usize,
    adx: Option<f64>,
    last: Option<AdxValue>,
}

impl Adx {
    pub fn new(period: usize) -> Self {
        Self {
            period: period.max(1),
            prev: None,
            tr: 0.0,
            plus_dm: 0.0,
            minus_dm: 0.0,
            seed_count: 0,
            dx_sum: 0.0,
            dx_count: 0,
            adx: None,
            last: None,
        }
    }

    pub fn update(&mut self, high: f64, low: f64, close: f64) -> Option<AdxValue> {
        if !(high.is_finite() && low.is_finite() && close.is_finite()) {
            return self.last;
        }
        let Some((prev_high, prev_low, prev_close)) = self.prev.replace((high, low, close)) else {
            return None;
        };

        let up = high - prev_high;
        let down = prev_low - low;
        let plus_dm = if up > down && up > 0.0 { up } else { 0.0 };
        let minus_dm = if down > up && down > 0.0 { down } else { 0.0 };
        let tr = super::atr::true_range(high, low, Some(prev_close));
        let n = self.period as f64;

        if self.seed_count < self.period {
            self.tr += tr;
            self.plus_dm += plus_dm;
            self.minus_dm += minus_dm;
            self.seed_count += 1;
            if self.seed_count < self.period {
                return None;
            }
        } else {
            self.tr = self.tr - self.tr / n + tr;
            self.plus_dm = self.plus_dm - self.plus_dm / n + plus_dm;
            self.minus_dm = self.minus_dm - self.minus_dm / n + minus_dm;
        }

        let (plus_di, minus_di) = if self.tr > 0.0 {
            (100.0 * self.plus_dm / self.tr, 100.0 * self.minus_dm / self.tr)
        } else {
            (0.0, 0.0)
        };
        let di_sum = plus_di + minus_di;
        let dx = if di_sum > 0.0 {
            100.0 * (plus_di - minus_di).abs() / di_sum
        } else {
            0.0
        };

        match self.adx {
            Some(prev) => self.adx = Some((prev * (n - 1.0) + dx) / n),
            None => {
                self.dx_sum += dx;
                self.dx_count += 1;
                if self.dx_count == self.period {
                    self.adx = Some(self.dx_sum / n);
                }
            }
        }

        self.last = self.adx.map(|adx| AdxValue {
            adx,
            plus_di,
            minus_di,
        });
        self.last
    }
}
