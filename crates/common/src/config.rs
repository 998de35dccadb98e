use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// All strategy and risk parameters, resolved once per run and never
/// mutated mid-replay. Loaded from a TOML file; every field has a default
/// so a partial file (or none at all) is usable.
///
/// Example `config/trading.toml`:
/// ```toml
/// pair = "BTCUSDT"
/// interval = "1h"
/// rsi_oversold = 30.0
/// stop_loss_multiplier = 3.0
/// enable_regime_filter = true
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TradingConfig {
    /// Trading pair, e.g. "BTCUSDT".
    pub pair: String,
    /// Kline interval for the live stream, e.g. "1m", "1h", "1d".
    pub interval: String,
    /// Order quantity in base asset units.
    pub quantity: f64,

    // Indicator periods
    pub rsi_period: usize,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub atr_period: usize,
    pub adx_period: usize,
    pub ema_20_period: usize,
    pub ema_50_period: usize,
    pub ema_200_period: usize,
    pub bollinger_period: usize,
    pub bollinger_width: f64,
    pub body_avg_period: usize,

    // Signal thresholds
    pub rsi_oversold: f64,
    pub rsi_overbought: f64,
    /// Setups also arm within this many RSI points above oversold (below
    /// overbought for sells).
    pub rsi_setup_buffer: f64,
    /// Reversal candles need a body this many times the rolling average.
    pub reversal_body_factor: f64,
    pub volume_buy_factor: f64,
    pub volume_sell_factor: f64,

    // Regime thresholds (ADX bands)
    pub adx_choppy_threshold: f64,
    pub adx_trending_threshold: f64,
    pub adx_extreme_threshold: f64,

    // Trading rules
    pub min_bars_gap: usize,
    pub enable_regime_filter: bool,
    pub enable_trend_filter: bool,
    pub require_confirmation_candle: bool,

    // Risk management
    pub stop_loss_multiplier: f64,
    pub take_profit_1_multiplier: f64,
    pub take_profit_2_multiplier: f64,
    pub partial_exit_fraction: f64,
    /// Unrealized profit fraction that arms the trailing stop (0.05 = 5%).
    pub trailing_activation: f64,
    /// Trail distance as a fraction of the initial stop distance.
    pub trailing_tightness: f64,

    /// Bars of history the live driver keeps for indicator recomputation.
    pub live_window: usize,
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            pair: "BTCUSDT".into(),
            interval: "1h".into(),
            quantity: 0.001,

            rsi_period: 14,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
            atr_period: 14,
            adx_period: 14,
            ema_20_period: 20,
            ema_50_period: 50,
            ema_200_period: 200,
            bollinger_period: 20,
            bollinger_width: 2.0,
            body_avg_period: 20,

            rsi_oversold: 30.0,
            rsi_overbought: 70.0,
            rsi_setup_buffer: 5.0,
            reversal_body_factor: 1.3,
            volume_buy_factor: 1.2,
            volume_sell_factor: 0.8,

            adx_choppy_threshold: 20.0,
            adx_trending_threshold: 25.0,
            adx_extreme_threshold: 30.0,

            min_bars_gap: 6,
            enable_regime_filter: true,
            enable_trend_filter: true,
            require_confirmation_candle: true,

            stop_loss_multiplier: 3.0,
            take_profit_1_multiplier: 4.0,
            take_profit_2_multiplier: 8.0,
            partial_exit_fraction: 0.5,
            trailing_activation: 0.05,
            trailing_tightness: 0.8,

            live_window: 1000,
        }
    }
}

impl TradingConfig {
    /// Load from a TOML file and validate.
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read '{path}': {e}")))?;
        let cfg: TradingConfig = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("cannot parse '{path}': {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject contradictory settings before any bar is processed.
    pub fn validate(&self) -> Result<()> {
        fn fail(msg: impl Into<String>) -> Result<()> {
            Err(Error::Config(msg.into()))
        }

        if self.quantity <= 0.0 {
            return fail("quantity must be positive");
        }
        if self.rsi_period < 2 {
            return fail("rsi_period must be >= 2");
        }
        if self.macd_fast >= self.macd_slow {
            return fail(format!(
                "macd_fast ({}) must be less than macd_slow ({})",
                self.macd_fast, self.macd_slow
            ));
        }
        if self.macd_signal < 1 || self.atr_period < 1 || self.adx_period < 1 {
            return fail("indicator periods must be >= 1");
        }
        if self.rsi_oversold >= self.rsi_overbought {
            return fail(format!(
                "rsi_oversold ({}) must be less than rsi_overbought ({})",
                self.rsi_oversold, self.rsi_overbought
            ));
        }
        if self.adx_choppy_threshold >= self.adx_trending_threshold
            || self.adx_trending_threshold >= self.adx_extreme_threshold
        {
            return fail(format!(
                "ADX thresholds must be increasing: choppy {} < trending {} < extreme {}",
                self.adx_choppy_threshold, self.adx_trending_threshold, self.adx_extreme_threshold
            ));
        }
        if self.min_bars_gap < 1 {
            return fail("min_bars_gap must be at least 1");
        }
        if self.stop_loss_multiplier <= 0.0
            || self.take_profit_1_multiplier <= 0.0
            || self.take_profit_2_multiplier <= 0.0
        {
            return fail("stop/target ATR multipliers must be positive");
        }
        if self.take_profit_1_multiplier >= self.take_profit_2_multiplier {
            return fail(format!(
                "take_profit_1_multiplier ({}) must be less than take_profit_2_multiplier ({})",
                self.take_profit_1_multiplier, self.take_profit_2_multiplier
            ));
        }
        if !(self.partial_exit_fraction > 0.0 && self.partial_exit_fraction < 1.0) {
            return fail("partial_exit_fraction must be in (0, 1)");
        }
        if self.trailing_activation <= 0.0 {
            return fail("trailing_activation must be positive");
        }
        if !(self.trailing_tightness > 0.0 && self.trailing_tightness <= 1.0) {
            return fail("trailing_tightness must be in (0, 1]");
        }
        if self.live_window < 2 * self.largest_lookback() {
            return fail(format!(
                "live_window ({}) must cover at least twice the largest lookback ({})",
                self.live_window,
                self.largest_lookback()
            ));
        }
        Ok(())
    }

    /// The longest warm-up any indicator needs. Rows before this index can
    /// never be fully populated.
    pub fn largest_lookback(&self) -> usize {
        [
            self.rsi_period,
            self.macd_slow + self.macd_signal,
            self.atr_period,
            2 * self.adx_period,
            self.ema_20_period,
            self.ema_50_period,
            self.ema_200_period,
            self.bollinger_period,
            self.body_avg_period,
        ]
        .into_iter()
        .max()
        .unwrap_or(0)
    }
}

/// Process-level settings loaded from the environment at startup.
/// Only the live path needs any of this; backtests run without an
/// environment.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub binance_api_key: Option<String>,
    pub binance_secret: Option<String>,
    pub database_url: String,
    pub paper_slippage_bps: f64,
}

impl RuntimeConfig {
    /// Load from environment variables, reading `.env` if present.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv(); // ignore error if .env not present

        Self {
            binance_api_key: std::env::var("BINANCE_API_KEY").ok(),
            binance_secret: std::env::var("BINANCE_SECRET").ok(),
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://trendbot.db?mode=rwc".to_string()),
            paper_slippage_bps: std::env::var("PAPER_SLIPPAGE_BPS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(10.0),
        }
    }

    /// Exchange credentials, required for live order submission.
    pub fn credentials(&self) -> Result<(&str, &str)> {
        match (&self.binance_api_key, &self.binance_secret) {
            (Some(key), Some(secret)) => Ok((key, secret)),
            _ => Err(Error::Config(
                "BINANCE_API_KEY and BINANCE_SECRET must be set for live trading".into(),
            )),
        }
    }
}
