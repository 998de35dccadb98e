use tracing::debug;

use common::{Direction, SignalEvent, SignalKind, TradingConfig};

use crate::engine::IndicatorRow;
use crate::regime::Regime;

/// Turns enriched rows into entry signals, bar by bar.
///
/// The pipeline per bar i, strictly causal (nothing beyond row i is read):
/// setup armed at i−1 → trigger candle + MACD + volume confirmation at i →
/// optional higher-low / lower-high confirmation → regime gate → minimum
/// gap since the last accepted signal.
///
/// The generator keeps evaluating while a position is open: its output is
/// then consumed only as an opposite-signal exit trigger, and
/// same-direction output is dropped, so a second position can never open.
#[derive(Debug, Clone)]
pub struct SignalGenerator {
    cfg: TradingConfig,
    last_signal_bar: Option<usize>,
}

impl SignalGenerator {
    pub fn new(cfg: TradingConfig) -> Self {
        Self {
            cfg,
            last_signal_bar: None,
        }
    }

    /// Forget gap-filter state (fresh replay).
    pub fn reset(&mut self) {
        self.last_signal_bar = None;
    }

    pub fn last_signal_bar(&self) -> Option<usize> {
        self.last_signal_bar
    }

    /// Re-anchor after the live driver drops `n` bars from the front of its
    /// window. A gap anchor that slid off the window is long satisfied.
    pub fn shift_back(&mut self, n: usize) {
        self.last_signal_bar = self.last_signal_bar.and_then(|bar| bar.checked_sub(n));
    }

    /// Evaluate bar `i`. `open_direction` mirrors the position manager's
    /// live position, if any. Emits at most one event per bar.
    pub fn on_bar(
        &mut self,
        rows: &[IndicatorRow],
        i: usize,
        open_direction: Option<Direction>,
    ) -> Option<SignalEvent> {
        let kind = self.candidate(rows, i)?;

        // Minimum spacing between accepted signals, either direction.
        if let Some(last) = self.last_signal_bar {
            if i - last < self.cfg.min_bars_gap {
                debug!(bar = i, last, "signal suppressed by gap filter");
                return None;
            }
        }
        self.last_signal_bar = Some(i);

        // Single-position rule: while open, only an opposite signal is
        // surfaced (as an exit trigger); never a same-direction add-on.
        if let Some(direction) = open_direction {
            if !kind.is_opposite(direction) {
                return None;
            }
        }

        let row = &rows[i];
        debug!(bar = i, %kind, price = row.bar.close, "signal emitted");
        Some(SignalEvent {
            timestamp: row.bar.timestamp,
            kind,
            reference_price: row.bar.close,
        })
    }

    /// Condition pipeline without the stateful gates.
    fn candidate(&self, rows: &[IndicatorRow], i: usize) -> Option<SignalKind> {
        // Structural checks reach back two bars.
        if i < 2 {
            return None;
        }
        let row = &rows[i];
        let prev = &rows[i - 1];
        if !row.is_ready() || !prev.is_ready() {
            return None;
        }

        if self.cfg.enable_regime_filter
            && !Regime::classify(row.adx?, &self.cfg).is_tradeable()
        {
            return None;
        }

        if self.buy_setup(prev) && self.buy_trigger(row, prev) && self.buy_confirmation(rows, i) {
            return Some(SignalKind::Buy);
        }
        if self.sell_setup(prev) && self.sell_trigger(row, prev) && self.sell_confirmation(rows, i)
        {
            return Some(SignalKind::Sell);
        }
        None
    }

    /// Setup, evaluated on the bar before the trigger: RSI in (or near) the
    /// oversold zone, optionally on the right side of EMA200.
    fn buy_setup(&self, prev: &IndicatorRow) -> bool {
        let Some(rsi) = prev.rsi else { return false };
        let Some(ema_200) = prev.ema_200 else {
            return false;
        };
        rsi < self.cfg.rsi_oversold + self.cfg.rsi_setup_buffer
            && (!self.cfg.enable_trend_filter || prev.bar.close > ema_200)
    }

    fn sell_setup(&self, prev: &IndicatorRow) -> bool {
        let Some(rsi) = prev.rsi else { return false };
        let Some(ema_200) = prev.ema_200 else {
            return false;
        };
        rsi > self.cfg.rsi_overbought - self.cfg.rsi_setup_buffer
            && (!self.cfg.enable_trend_filter || prev.bar.close < ema_200)
    }

    /// Trigger: a directional candle with MACD and volume agreement.
    fn buy_trigger(&self, row: &IndicatorRow, prev: &IndicatorRow) -> bool {
        self.bullish_candle(row, prev)
            && self.macd_bullish(row, prev)
            && self.volume_confirms(row, self.cfg.volume_buy_factor)
    }

    fn sell_trigger(&self, row: &IndicatorRow, prev: &IndicatorRow) -> bool {
        self.bearish_candle(row, prev)
            && self.macd_bearish(row, prev)
            && self.volume_confirms(row, self.cfg.volume_sell_factor)
    }

    /// A reversal candle (oversized body closing beyond the prior extreme)
    /// or a plain strong candle in the trigger direction.
    fn bullish_candle(&self, row: &IndicatorRow, prev: &IndicatorRow) -> bool {
        let Some(avg_body) = row.avg_body else {
            return false;
        };
        let bar = &row.bar;
        if !bar.is_bullish() {
            return false;
        }
        let reversal =
            bar.body() > avg_body * self.cfg.reversal_body_factor && bar.close > prev.bar.high;
        let strong = bar.body() > avg_body;
        reversal || strong
    }

    fn bearish_candle(&self, row: &IndicatorRow, prev: &IndicatorRow) -> bool {
        let Some(avg_body) = row.avg_body else {
            return false;
        };
        let bar = &row.bar;
        if !bar.is_bearish() {
            return false;
        }
        let reversal =
            bar.body() > avg_body * self.cfg.reversal_body_factor && bar.close < prev.bar.low;
        let strong = bar.body() > avg_body;
        reversal || strong
    }

    /// Bullish cross of the signal line, or a rising histogram.
    fn macd_bullish(&self, row: &IndicatorRow, prev: &IndicatorRow) -> bool {
        let (Some(macd), Some(signal), Some(hist)) = (row.macd, row.macd_signal, row.macd_hist)
        else {
            return false;
        };
        let (Some(p_macd), Some(p_signal), Some(p_hist)) =
            (prev.macd, prev.macd_signal, prev.macd_hist)
        else {
            return false;
        };
        let cross = macd > signal && p_macd <= p_signal;
        let rising = hist > p_hist;
        cross || rising
    }

    fn macd_bearish(&self, row: &IndicatorRow, prev: &IndicatorRow) -> bool {
        let (Some(macd), Some(signal), Some(hist)) = (row.macd, row.macd_signal, row.macd_hist)
        else {
            return false;
        };
        let (Some(p_macd), Some(p_signal), Some(p_hist)) =
            (prev.macd, prev.macd_signal, prev.macd_hist)
        else {
            return false;
        };
        let cross = macd < signal && p_macd >= p_signal;
        let falling = hist < p_hist;
        cross || falling
    }

    /// Volume must beat `factor ×` its rolling mean. Bars without volume
    /// data skip the check entirely, as do rows where the mean has not
    /// formed yet.
    fn volume_confirms(&self, row: &IndicatorRow, factor: f64) -> bool {
        if row.bar.volume <= 0.0 {
            return true;
        }
        match row.vol_sma {
            Some(mean) if mean > 0.0 => row.bar.volume >= factor * mean,
            _ => true,
        }
    }

    /// Structural confirmation: the trigger bar holds a higher low (buy) or
    /// lower high (sell) against the prior two bars.
    fn buy_confirmation(&self, rows: &[IndicatorRow], i: usize) -> bool {
        if !self.cfg.require_confirmation_candle {
            return true;
        }
        let low = rows[i].bar.low;
        low > rows[i - 1].bar.low && low > rows[i - 2].bar.low
    }

    fn sell_confirmation(&self, rows: &[IndicatorRow], i: usize) -> bool {
        if !self.cfg.require_confirmation_candle {
            return true;
        }
        let high = rows[i].bar.high;
        high < rows[i - 1].bar.high && high < rows[i - 2].bar.high
    }
}
