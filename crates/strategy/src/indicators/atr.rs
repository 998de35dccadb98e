use common::Bar;

use crate::indicators::wilder_smooth;

/// Average True Range: Wilder-smoothed true range.
///
/// TR = max(high − low, |high − prev_close|, |low − prev_close|).
/// TR[0] has no previous close and is excluded from the seed, so the first
/// defined ATR lands at index `period`.
#[derive(Debug, Clone)]
pub struct AtrIndicator {
    pub period: usize,
}

/// True range series. TR[0] is NaN (no previous close).
pub fn true_range(bars: &[Bar]) -> Vec<f64> {
    let n = bars.len();
    let mut tr = vec![f64::NAN; n];
    for i in 1..n {
        let h = bars[i].high;
        let l = bars[i].low;
        let pc = bars[i - 1].close;
        tr[i] = (h - l).max((h - pc).abs()).max((l - pc).abs());
    }
    tr
}

impl AtrIndicator {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "ATR period must be >= 1");
        Self { period }
    }

    pub fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        wilder_smooth(&true_range(bars), self.period)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::indicators::assert_approx;
    use chrono::{Duration, TimeZone, Utc};

    pub(crate) fn make_bars(data: &[(f64, f64, f64, f64)]) -> Vec<Bar> {
        let start = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        data.iter()
            .enumerate()
            .map(|(i, &(open, high, low, close))| Bar {
                timestamp: start + Duration::hours(i as i64),
                open,
                high,
                low,
                close,
                volume: 1000.0,
            })
            .collect()
    }

    #[test]
    fn true_range_basic() {
        let bars = make_bars(&[
            (100.0, 105.0, 95.0, 102.0),
            (102.0, 108.0, 100.0, 106.0), // max(8, 6, 2) = 8
            (106.0, 107.0, 98.0, 99.0),   // max(9, 1, 8) = 9
        ]);
        let tr = true_range(&bars);
        assert!(tr[0].is_nan());
        assert_approx(tr[1], 8.0);
        assert_approx(tr[2], 9.0);
    }

    #[test]
    fn true_range_gap_up() {
        // Prev close 100, bar 110-115-108: range from prev close dominates.
        let bars = make_bars(&[(98.0, 102.0, 97.0, 100.0), (110.0, 115.0, 108.0, 112.0)]);
        let tr = true_range(&bars);
        assert_approx(tr[1], 15.0);
    }

    #[test]
    fn atr_seed_and_recursion() {
        let bars = make_bars(&[
            (100.0, 105.0, 95.0, 102.0),  // TR NaN
            (102.0, 108.0, 100.0, 106.0), // TR 8
            (106.0, 107.0, 98.0, 99.0),   // TR 9
            (99.0, 103.0, 97.0, 101.0),   // TR 6
            (101.0, 106.0, 100.0, 105.0), // TR 6
        ]);
        let atr = AtrIndicator::new(3);
        let result = atr.compute(&bars);
        assert!(result[2].is_nan());
        // Seed at index 3 = mean(8, 9, 6) = 23/3
        assert_approx(result[3], 23.0 / 3.0);
        // index 4: (23/3 * 2 + 6) / 3 = 64/9
        assert_approx(result[4], 64.0 / 9.0);
    }

    #[test]
    fn atr_too_few_bars_is_all_nan() {
        let bars = make_bars(&[(100.0, 105.0, 95.0, 102.0)]);
        let atr = AtrIndicator::new(3);
        assert!(atr.compute(&bars).iter().all(|v| v.is_nan()));
    }
}
