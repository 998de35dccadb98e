use crate::indicators::sma;

/// Bollinger Bands: SMA(period) ± width × population stddev(period).
#[derive(Debug, Clone)]
pub struct BollingerBands {
    pub period: usize,
    pub width: f64,
}

/// Band output, index-aligned with the input closes.
#[derive(Debug, Clone)]
pub struct BollingerSeries {
    pub upper: Vec<f64>,
    pub mid: Vec<f64>,
    pub lower: Vec<f64>,
}

impl BollingerBands {
    pub fn new(period: usize, width: f64) -> Self {
        assert!(period >= 2, "Bollinger period must be >= 2");
        assert!(width > 0.0, "Bollinger width must be positive");
        Self { period, width }
    }

    pub fn compute(&self, closes: &[f64]) -> BollingerSeries {
        let n = closes.len();
        let mid = sma(closes, self.period);
        let mut upper = vec![f64::NAN; n];
        let mut lower = vec![f64::NAN; n];

        for i in (self.period - 1)..n {
            let window = &closes[i + 1 - self.period..=i];
            let mean = mid[i];
            let variance =
                window.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / self.period as f64;
            let dev = self.width * variance.sqrt();
            upper[i] = mean + dev;
            lower[i] = mean - dev;
        }

        BollingerSeries { upper, mid, lower }
    }
}
