use common::{Bar, TradingConfig};

use crate::indicators::{
    sma, AdxIndicator, AtrIndicator, BollingerBands, EmaIndicator, MacdIndicator, RsiIndicator,
};

/// One bar enriched with every derived value the signal path consumes.
///
/// `None` marks insufficient data — a field stays `None` until its
/// indicator's full lookback has elapsed, and downstream logic must not
/// trade on such rows. Rows are immutable once computed: appending later
/// bars never changes earlier rows.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorRow {
    pub bar: Bar,
    pub rsi: Option<f64>,
    pub macd: Option<f64>,
    pub macd_signal: Option<f64>,
    pub macd_hist: Option<f64>,
    pub atr: Option<f64>,
    pub ema_20: Option<f64>,
    pub ema_50: Option<f64>,
    pub ema_200: Option<f64>,
    pub bb_upper: Option<f64>,
    pub bb_mid: Option<f64>,
    pub bb_lower: Option<f64>,
    pub adx: Option<f64>,
    pub plus_di: Option<f64>,
    pub minus_di: Option<f64>,
    /// Rolling mean absolute candle body, for reversal/strong-candle checks.
    pub avg_body: Option<f64>,
    /// Rolling mean volume, for volume confirmation.
    pub vol_sma: Option<f64>,
}

impl IndicatorRow {
    /// True once every field the signal generator reads is populated.
    /// Volume may legitimately be absent, so `vol_sma` is not required.
    pub fn is_ready(&self) -> bool {
        self.rsi.is_some()
            && self.macd.is_some()
            && self.macd_signal.is_some()
            && self.macd_hist.is_some()
            && self.atr.is_some()
            && self.ema_20.is_some()
            && self.ema_50.is_some()
            && self.ema_200.is_some()
            && self.adx.is_some()
            && self.avg_body.is_some()
    }
}

/// Bulk indicator computation: raw bars in, enriched rows out, one row per
/// bar. Every series is a causal left-to-right fold — row i depends only on
/// bars 0..=i.
#[derive(Debug, Clone)]
pub struct IndicatorEngine {
    cfg: TradingConfig,
}

impl IndicatorEngine {
    pub fn new(cfg: TradingConfig) -> Self {
        Self { cfg }
    }

    pub fn compute(&self, bars: &[Bar]) -> Vec<IndicatorRow> {
        let cfg = &self.cfg;
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        let bodies: Vec<f64> = bars.iter().map(|b| b.body()).collect();
        let volumes: Vec<f64> = bars.iter().map(|b| b.volume).collect();

        let rsi = RsiIndicator::new(cfg.rsi_period).compute(&closes);
        let macd = MacdIndicator::new(cfg.macd_fast, cfg.macd_slow, cfg.macd_signal)
            .compute(&closes);
        let atr = AtrIndicator::new(cfg.atr_period).compute(bars);
        let adx = AdxIndicator::new(cfg.adx_period).compute(bars);
        let ema_20 = EmaIndicator::new(cfg.ema_20_period).compute(&closes);
        let ema_50 = EmaIndicator::new(cfg.ema_50_period).compute(&closes);
        let ema_200 = EmaIndicator::new(cfg.ema_200_period).compute(&closes);
        let bb = BollingerBands::new(cfg.bollinger_period, cfg.bollinger_width).compute(&closes);
        let avg_body = sma(&bodies, cfg.body_avg_period);
        let vol_sma = sma(&volumes, cfg.body_avg_period);

        bars.iter()
            .enumerate()
            .map(|(i, bar)| IndicatorRow {
                bar: bar.clone(),
                rsi: finite(rsi[i]),
                macd: finite(macd.macd[i]),
                macd_signal: finite(macd.signal[i]),
                macd_hist: finite(macd.histogram[i]),
                atr: finite(atr[i]),
                ema_20: finite(ema_20[i]),
                ema_50: finite(ema_50[i]),
                ema_200: finite(ema_200[i]),
                bb_upper: finite(bb.upper[i]),
                bb_mid: finite(bb.mid[i]),
                bb_lower: finite(bb.lower[i]),
                adx: finite(adx.adx[i]),
                plus_di: finite(adx.plus_di[i]),
                minus_di: finite(adx.minus_di[i]),
                avg_body: finite(avg_body[i]),
                vol_sma: finite(vol_sma[i]),
            })
            .collect()
    }
}

fn finite(v: f64) -> Option<f64> {
    v.is_finite().then_some(v)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn synthetic_bars(n: usize) -> Vec<Bar> {
        let start = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        (0..n)
            .map(|i| {
                let t = i as f64;
                let close = 100.0 + t * 0.3 + (t * 0.45).sin() * 6.0;
                let open = close - (t * 0.3).cos() * 1.5;
                Bar {
                    timestamp: start + Duration::hours(i as i64),
                    open,
                    high: open.max(close) + 1.2,
                    low: open.min(close) - 1.2,
                    close,
                    volume: 500.0 + (t * 0.2).cos() * 120.0,
                }
            })
            .collect()
    }

    fn small_config() -> TradingConfig {
        TradingConfig {
            rsi_period: 3,
            macd_fast: 3,
            macd_slow: 6,
            macd_signal: 3,
            atr_period: 3,
            adx_period: 3,
            ema_20_period: 4,
            ema_50_period: 6,
            ema_200_period: 8,
            bollinger_period: 5,
            body_avg_period: 5,
            live_window: 100,
            ..TradingConfig::default()
        }
    }

    #[test]
    fn one_row_per_bar() {
        let bars = synthetic_bars(40);
        let rows = IndicatorEngine::new(small_config()).compute(&bars);
        assert_eq!(rows.len(), bars.len());
    }

    #[test]
    fn warmup_rows_are_not_ready() {
        let bars = synthetic_bars(40);
        let cfg = small_config();
        let lookback = cfg.largest_lookback();
        let rows = IndicatorEngine::new(cfg.clone()).compute(&bars);

        // EMA200 is the slowest field here: nothing before its seed is ready.
        for row in &rows[..cfg.ema_200_period - 1] {
            assert!(!row.is_ready());
        }
        // Readiness is monotone and reached no later than the lookback bound.
        let first_ready = rows
            .iter()
            .position(|r| r.is_ready())
            .expect("rows should become ready");
        assert!(first_ready <= lookback);
        assert!(rows[first_ready..].iter().all(|r| r.is_ready()));
    }

    #[test]
    fn short_series_produces_no_ready_rows() {
        let bars = synthetic_bars(4);
        let rows = IndicatorEngine::new(small_config()).compute(&bars);
        assert!(rows.iter().all(|r| !r.is_ready()));
    }

    #[test]
    fn rows_are_invariant_under_append() {
        // Causality: computing on a prefix must equal the prefix of the
        // full computation — later bars never repaint earlier rows.
        let bars = synthetic_bars(60);
        let engine = IndicatorEngine::new(small_config());
        let full = engine.compute(&bars);
        let prefix = engine.compute(&bars[..45]);
        for (a, b) in prefix.iter().zip(full.iter()) {
            assert_eq!(a, b);
        }
    }

    #[test]
    fn insufficient_data_is_none_not_zero() {
        let bars = synthetic_bars(10);
        let rows = IndicatorEngine::new(small_config()).compute(&bars);
        assert_eq!(rows[0].rsi, None);
        assert_eq!(rows[0].atr, None);
        assert_eq!(rows[0].adx, None);
    }
}
