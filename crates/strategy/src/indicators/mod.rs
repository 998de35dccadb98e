//! Indicator primitives shared across the engine.
//!
//! All series functions are causal: output[i] depends only on input[0..=i].
//! Warm-up positions are `f64::NAN`; `IndicatorEngine` converts them to
//! `None` so downstream logic can never consume a half-formed value.

pub mod adx;
pub mod atr;
pub mod bollinger;
pub mod ema;
pub mod macd;
pub mod rsi;

pub use adx::{AdxIndicator, AdxSeries};
pub use atr::AtrIndicator;
pub use bollinger::{BollingerBands, BollingerSeries};
pub use ema::EmaIndicator;
pub use macd::{MacdIndicator, MacdSeries};
pub use rsi::RsiIndicator;

/// Simple moving average. NaN until `period` values are available.
pub fn sma(values: &[f64], period: usize) -> Vec<f64> {
    let n = values.len();
    let mut result = vec![f64::NAN; n];
    if period == 0 || n < period {
        return result;
    }
    let mut window_sum: f64 = values[..period].iter().sum();
    result[period - 1] = window_sum / period as f64;
    for i in period..n {
        window_sum += values[i] - values[i - period];
        result[i] = window_sum / period as f64;
    }
    result
}

/// Wilder smoothing: seed with the mean of the first `period` consecutive
/// non-NaN values, then `smoothed = (prev * (period - 1) + value) / period`.
///
/// This recursion is the defining property of RSI/ATR/ADX — a plain EMA or
/// rolling mean shifts signal timing and is not an acceptable substitute.
pub fn wilder_smooth(values: &[f64], period: usize) -> Vec<f64> {
    let n = values.len();
    let mut result = vec![f64::NAN; n];
    if period == 0 || n < period {
        return result;
    }

    // First window of `period` consecutive non-NaN values seeds the average.
    let seed_start = match (0..n).find(|&i| {
        i + period <= n && values[i..i + period].iter().all(|v| !v.is_nan())
    }) {
        Some(s) => s,
        None => return result,
    };
    let seed_end = seed_start + period;

    let seed: f64 = values[seed_start..seed_end].iter().sum::<f64>() / period as f64;
    result[seed_end - 1] = seed;

    let mut prev = seed;
    for i in seed_end..n {
        if values[i].is_nan() {
            return result;
        }
        prev = (prev * (period - 1) as f64 + values[i]) / period as f64;
        result[i] = prev;
    }
    result
}

#[cfg(test)]
pub(crate) fn assert_approx(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-9,
        "expected {expected}, got {actual}"
    );
}
