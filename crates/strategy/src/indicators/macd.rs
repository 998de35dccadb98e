use crate::indicators::EmaIndicator;

/// MACD: `EMA(fast) − EMA(slow)`, a signal line `EMA(macd, signal_period)`
/// over the defined part of the MACD series, and their difference as the
/// histogram.
#[derive(Debug, Clone)]
pub struct MacdIndicator {
    pub fast: usize,
    pub slow: usize,
    pub signal: usize,
}

/// Full MACD output, index-aligned with the input closes.
#[derive(Debug, Clone)]
pub struct MacdSeries {
    pub macd: Vec<f64>,
    pub signal: Vec<f64>,
    pub histogram: Vec<f64>,
}

impl MacdIndicator {
    pub fn new(fast: usize, slow: usize, signal: usize) -> Self {
        assert!(fast < slow, "MACD fast period must be less than slow period");
        assert!(signal >= 1, "MACD signal period must be >= 1");
        Self { fast, slow, signal }
    }

    pub fn compute(&self, closes: &[f64]) -> MacdSeries {
        let n = closes.len();
        let ema_fast = EmaIndicator::new(self.fast).compute(closes);
        let ema_slow = EmaIndicator::new(self.slow).compute(closes);

        let mut macd = vec![f64::NAN; n];
        for i in 0..n {
            if !ema_fast[i].is_nan() && !ema_slow[i].is_nan() {
                macd[i] = ema_fast[i] - ema_slow[i];
            }
        }

        // Signal line: EMA over the defined MACD values, re-aligned to the
        // original index space.
        let mut signal = vec![f64::NAN; n];
        if let Some(first) = macd.iter().position(|v| !v.is_nan()) {
            let defined: Vec<f64> = macd[first..].to_vec();
            let sig = EmaIndicator::new(self.signal).compute(&defined);
            for (offset, value) in sig.into_iter().enumerate() {
                signal[first + offset] = value;
            }
        }

        let mut histogram = vec![f64::NAN; n];
        for i in 0..n {
            if !macd[i].is_nan() && !signal[i].is_nan() {
                histogram[i] = macd[i] - signal[i];
            }
        }

        MacdSeries {
            macd,
            signal,
            histogram,
        }
    }
}
