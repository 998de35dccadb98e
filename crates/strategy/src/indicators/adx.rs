use common::Bar;

use crate::indicators::atr::true_range;
use crate::indicators::wilder_smooth;

/// ADX — Average Directional Index, with its +DI / −DI components.
///
/// Wilder's construction end to end:
/// +DM/−DM from consecutive bars → Wilder-smoothed DM and TR →
/// DI = 100 × smoothed(DM) / smoothed(TR) →
/// DX = 100 × |+DI − −DI| / (+DI + −DI) → ADX = Wilder-smoothed DX.
///
/// DI values appear after `period` bars, ADX after roughly `2 × period`.
#[derive(Debug, Clone)]
pub struct AdxIndicator {
    pub period: usize,
}

/// ADX output, index-aligned with the input bars.
#[derive(Debug, Clone)]
pub struct AdxSeries {
    pub adx: Vec<f64>,
    pub plus_di: Vec<f64>,
    pub minus_di: Vec<f64>,
}

impl AdxIndicator {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "ADX period must be >= 1");
        Self { period }
    }

    pub fn compute(&self, bars: &[Bar]) -> AdxSeries {
        let n = bars.len();
        let mut plus_dm = vec![f64::NAN; n];
        let mut minus_dm = vec![f64::NAN; n];

        for i in 1..n {
            let up_move = bars[i].high - bars[i - 1].high;
            let down_move = bars[i - 1].low - bars[i].low;
            plus_dm[i] = if up_move > down_move && up_move > 0.0 {
                up_move
            } else {
                0.0
            };
            minus_dm[i] = if down_move > up_move && down_move > 0.0 {
                down_move
            } else {
                0.0
            };
        }

        let smooth_tr = wilder_smooth(&true_range(bars), self.period);
        let smooth_plus = wilder_smooth(&plus_dm, self.period);
        let smooth_minus = wilder_smooth(&minus_dm, self.period);

        let mut plus_di = vec![f64::NAN; n];
        let mut minus_di = vec![f64::NAN; n];
        let mut dx = vec![f64::NAN; n];

        for i in 0..n {
            if smooth_tr[i].is_nan()
                || smooth_plus[i].is_nan()
                || smooth_minus[i].is_nan()
                || smooth_tr[i] == 0.0
            {
                continue;
            }
            let pdi = 100.0 * smooth_plus[i] / smooth_tr[i];
            let mdi = 100.0 * smooth_minus[i] / smooth_tr[i];
            plus_di[i] = pdi;
            minus_di[i] = mdi;

            let di_sum = pdi + mdi;
            dx[i] = if di_sum == 0.0 {
                0.0
            } else {
                100.0 * (pdi - mdi).abs() / di_sum
            };
        }

        AdxSeries {
            adx: wilder_smooth(&dx, self.period),
            plus_di,
            minus_di,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::atr::tests::make_bars;

    #[test]
    fn adx_stays_in_bounds() {
        let bars = make_bars(&[
            (100.0, 105.0, 95.0, 102.0),
            (102.0, 108.0, 100.0, 106.0),
            (106.0, 107.0, 98.0, 99.0),
            (99.0, 103.0, 97.0, 101.0),
            (101.0, 106.0, 100.0, 105.0),
            (105.0, 110.0, 103.0, 108.0),
            (108.0, 112.0, 106.0, 110.0),
            (110.0, 111.0, 104.0, 105.0),
            (105.0, 109.0, 103.0, 107.0),
            (107.0, 113.0, 105.0, 112.0),
        ]);
        let series = AdxIndicator::new(3).compute(&bars);
        for (i, &v) in series.adx.iter().enumerate() {
            if !v.is_nan() {
                assert!((0.0..=100.0).contains(&v), "ADX out of bounds at {i}: {v}");
            }
        }
    }

    #[test]
    fn strong_uptrend_has_plus_di_dominant() {
        let data: Vec<(f64, f64, f64, f64)> = (0..20)
            .map(|i| {
                let base = 100.0 + i as f64 * 5.0;
                (base - 1.0, base + 3.0, base - 3.0, base + 2.0)
            })
            .collect();
        let bars = make_bars(&data);
        let series = AdxIndicator::new(5).compute(&bars);
        let last = series
            .adx
            .iter()
            .rposition(|v| !v.is_nan())
            .expect("ADX should be defined");
        assert!(series.plus_di[last] > series.minus_di[last]);
        assert!(series.adx[last] > 20.0, "trend should read as strong");
    }

    #[test]
    fn adx_defined_after_twice_period() {
        let data: Vec<(f64, f64, f64, f64)> = (0..30)
            .map(|i| {
                let base = 100.0 + (i as f64 * 0.6).sin() * 8.0;
                (base, base + 2.0, base - 2.0, base + 1.0)
            })
            .collect();
        let bars = make_bars(&data);
        let period = 5;
        let series = AdxIndicator::new(period).compute(&bars);
        // DM/TR seed consumes bars 1..=period, DX seed another period.
        assert!(series.adx[2 * period - 2].is_nan());
        assert!(!series.adx[2 * period - 1].is_nan());
    }

    #[test]
    fn too_few_bars_is_all_nan() {
        let bars = make_bars(&[(100.0, 105.0, 95.0, 102.0)]);
        let series = AdxIndicator::new(3).compute(&bars);
        assert!(series.adx.iter().all(|v| v.is_nan()));
        assert!(series.plus_di.iter().all(|v| v.is_nan()));
    }
}
