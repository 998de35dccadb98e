/// RSI (Relative Strength Index) over Wilder's smoothed averages — the
/// same recursion as TradingView / TA-Lib, not a rolling mean.
///
/// The first `period` positions are NaN: the seed averages the first
/// `period` price changes, so RSI[period] is the earliest defined value.
#[derive(Debug, Clone)]
pub struct RsiIndicator {
    pub period: usize,
}

impl RsiIndicator {
    pub fn new(period: usize) -> Self {
        assert!(period >= 2, "RSI period must be >= 2");
        Self { period }
    }

    pub fn compute(&self, closes: &[f64]) -> Vec<f64> {
        let n = closes.len();
        let mut result = vec![f64::NAN; n];
        if n < self.period + 1 {
            return result;
        }

        let p = self.period as f64;

        // Seed: plain averages over the first `period` changes.
        let mut avg_gain = 0.0;
        let mut avg_loss = 0.0;
        for w in closes[..=self.period].windows(2) {
            let change = w[1] - w[0];
            if change > 0.0 {
                avg_gain += change;
            } else {
                avg_loss += -change;
            }
        }
        avg_gain /= p;
        avg_loss /= p;
        result[self.period] = Self::rsi_value(avg_gain, avg_loss);

        // Wilder recursion over the remaining changes.
        for i in self.period + 1..n {
            let change = closes[i] - closes[i - 1];
            let gain = change.max(0.0);
            let loss = (-change).max(0.0);
            avg_gain = (avg_gain * (p - 1.0) + gain) / p;
            avg_loss = (avg_loss * (p - 1.0) + loss) / p;
            result[i] = Self::rsi_value(avg_gain, avg_loss);
        }
        result
    }

    fn rsi_value(avg_gain: f64, avg_loss: f64) -> f64 {
        if avg_loss == 0.0 {
            return 100.0;
        }
        let rs = avg_gain / avg_loss;
        100.0 - 100.0 / (1.0 + rs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::assert_approx;

    #[test]
    fn rsi_warmup_is_nan() {
        let rsi = RsiIndicator::new(14);
        let prices = vec![100.0; 14];
        assert!(rsi.compute(&prices).iter().all(|v| v.is_nan()));
    }

    #[test]
    fn rsi_first_value_at_period_index() {
        let rsi = RsiIndicator::new(14);
        let prices: Vec<f64> = (0..15).map(|i| 100.0 + i as f64).collect();
        let result = rsi.compute(&prices);
        assert!(result[13].is_nan());
        assert!(!result[14].is_nan());
    }

    #[test]
    fn rsi_all_gains_is_100() {
        let rsi = RsiIndicator::new(3);
        let result = rsi.compute(&[10.0, 11.0, 12.0, 13.0, 14.0]);
        assert_approx(result[4], 100.0);
    }

    #[test]
    fn rsi_all_losses_is_0() {
        let rsi = RsiIndicator::new(3);
        let result = rsi.compute(&[14.0, 13.0, 12.0, 11.0, 10.0]);
        assert_approx(result[4], 0.0);
    }

    #[test]
    fn rsi_known_seed_value() {
        // period 2, closes 10, 11, 10: gain avg = 0.5, loss avg = 0.5
        // rs = 1 → rsi = 50
        let rsi = RsiIndicator::new(2);
        let result = rsi.compute(&[10.0, 11.0, 10.0]);
        assert_approx(result[2], 50.0);
    }

    #[test]
    fn rsi_wilder_recursion_value() {
        // period 2, closes 10, 11, 10, 12:
        // seed: avg_gain 0.5, avg_loss 0.5
        // next change +2: avg_gain = (0.5 + 2)/2 = 1.25, avg_loss = 0.25
        // rs = 5 → rsi = 100 - 100/6
        let rsi = RsiIndicator::new(2);
        let result = rsi.compute(&[10.0, 11.0, 10.0, 12.0]);
        assert_approx(result[3], 100.0 - 100.0 / 6.0);
    }

    #[test]
    fn rsi_stays_in_bounds() {
        let rsi = RsiIndicator::new(14);
        let prices: Vec<f64> = (0..120)
            .map(|i| 100.0 + (i as f64 * 0.7).sin() * 15.0)
            .collect();
        for v in rsi.compute(&prices) {
            if !v.is_nan() {
                assert!((0.0..=100.0).contains(&v), "RSI out of range: {v}");
            }
        }
    }
}
