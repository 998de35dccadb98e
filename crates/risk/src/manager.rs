use chrono::{DateTime, Utc};
use tracing::{debug, info};

use common::{Bar, Direction, ExitReason, Position, SignalKind, Trade, TradingConfig};

/// Lifecycle of the single position: none → open → closed, then ready for
/// the next entry. Owns the only mutable `Position`; everything else reads
/// it through `current()`.
///
/// Exit conditions are evaluated in a fixed priority per bar — opposite
/// signal, stop loss, take-profit 2, take-profit 1 (partial), trailing
/// stop — and the first hit wins, so a bar that straddles both a stop and
/// a target always resolves to the stop. OHLC bars cannot tell which level
/// traded first; favoring the worse outcome is a deliberate conservative
/// bias of the model, not a bug to fix.
///
/// Breach detection uses the intrabar high/low, not the close — a
/// close-only check undercounts whipsaws that pierce a level and come back.
#[derive(Debug, Clone)]
pub struct PositionManager {
    cfg: TradingConfig,
    current: Option<Position>,
}

impl PositionManager {
    pub fn new(cfg: TradingConfig) -> Self {
        Self { cfg, current: None }
    }

    /// Drop any open position without recording a trade (fresh replay).
    pub fn reset(&mut self) {
        self.current = None;
    }

    pub fn current(&self) -> Option<&Position> {
        self.current.as_ref()
    }

    pub fn is_open(&self) -> bool {
        self.current.is_some()
    }

    pub fn open_direction(&self) -> Option<Direction> {
        self.current.as_ref().map(|p| p.direction)
    }

    /// Re-anchor after the live driver drops `n` bars from the front of its
    /// window. An entry bar older than the window clamps to zero, so
    /// `duration_bars` saturates at the window length for very old entries.
    pub fn shift_back(&mut self, n: usize) {
        if let Some(position) = self.current.as_mut() {
            position.entry_bar = position.entry_bar.saturating_sub(n);
        }
    }

    /// Open a position from an entry signal at the bar's close. Stop and
    /// both targets are fixed here, from ATR at entry time, and never move.
    /// Refuses (returns `None`) while a position is already open.
    pub fn open_position(
        &mut self,
        kind: SignalKind,
        bar: &Bar,
        atr: f64,
        bar_index: usize,
    ) -> Option<&Position> {
        if self.current.is_some() {
            debug!(bar = bar_index, "entry refused: position already open");
            return None;
        }

        let direction = kind.direction();
        let entry = bar.close;
        let stop_distance = atr * self.cfg.stop_loss_multiplier;
        let tp1_distance = atr * self.cfg.take_profit_1_multiplier;
        let tp2_distance = atr * self.cfg.take_profit_2_multiplier;

        let (stop_price, take_profit_1, take_profit_2) = match direction {
            Direction::Long => (
                entry - stop_distance,
                entry + tp1_distance,
                entry + tp2_distance,
            ),
            Direction::Short => (
                entry + stop_distance,
                entry - tp1_distance,
                entry - tp2_distance,
            ),
        };

        let position = Position {
            id: uuid::Uuid::new_v4().to_string(),
            pair: self.cfg.pair.clone(),
            direction,
            entry_price: entry,
            entry_time: bar.timestamp,
            entry_bar: bar_index,
            quantity: self.cfg.quantity,
            stop_price,
            take_profit_1,
            take_profit_2,
            trailing_stop: None,
            partial_exit_done: false,
        };

        info!(
            pair = %position.pair,
            %direction,
            entry,
            stop = stop_price,
            tp1 = take_profit_1,
            tp2 = take_profit_2,
            "position opened"
        );
        self.current = Some(position);
        self.current.as_ref()
    }

    /// Evaluate one bar against the open position. Returns the trades
    /// recorded this bar: empty, one partial close, or one full close.
    ///
    /// `opposite_signal` is true when the signal generator fired against
    /// the position's direction this bar. `atr` is the current row's ATR,
    /// used only to re-tighten the trailing stop.
    pub fn on_bar(
        &mut self,
        bar: &Bar,
        atr: Option<f64>,
        opposite_signal: bool,
        bar_index: usize,
    ) -> Vec<Trade> {
        let Some(mut position) = self.current.take() else {
            return Vec::new();
        };

        // 1. Opposite signal closes at the decision price (the bar close).
        if opposite_signal {
            return vec![self.close_full(
                position,
                bar.close,
                bar.timestamp,
                ExitReason::OppositeSignal,
                bar_index,
            )];
        }

        // 2. Stop loss, intrabar.
        let stop_hit = match position.direction {
            Direction::Long => bar.low <= position.stop_price,
            Direction::Short => bar.high >= position.stop_price,
        };
        if stop_hit {
            let price = position.stop_price;
            return vec![self.close_full(
                position,
                price,
                bar.timestamp,
                ExitReason::StopLoss,
                bar_index,
            )];
        }

        // 3. Final target, intrabar.
        let tp2_hit = match position.direction {
            Direction::Long => bar.high >= position.take_profit_2,
            Direction::Short => bar.low <= position.take_profit_2,
        };
        if tp2_hit {
            let price = position.take_profit_2;
            return vec![self.close_full(
                position,
                price,
                bar.timestamp,
                ExitReason::TakeProfit2,
                bar_index,
            )];
        }

        // 4. First target: scale out once, keep the rest running.
        let tp1_hit = match position.direction {
            Direction::Long => bar.high >= position.take_profit_1,
            Direction::Short => bar.low <= position.take_profit_1,
        };
        if tp1_hit && !position.partial_exit_done {
            let closed_quantity = position.quantity * self.cfg.partial_exit_fraction;
            let trade = make_trade(
                &position,
                position.take_profit_1,
                bar.timestamp,
                ExitReason::TakeProfit1Partial,
                closed_quantity,
                bar_index,
            );
            position.quantity -= closed_quantity;
            position.partial_exit_done = true;
            info!(
                pair = %position.pair,
                price = position.take_profit_1,
                remaining = position.quantity,
                "partial exit at first target"
            );
            self.current = Some(position);
            return vec![trade];
        }

        // 5. Trailing stop: breach of the previously set trail exits;
        //    otherwise the trail may tighten from this bar's close.
        if let Some(trail) = position.trailing_stop {
            let trail_hit = match position.direction {
                Direction::Long => bar.low <= trail,
                Direction::Short => bar.high >= trail,
            };
            if trail_hit {
                return vec![self.close_full(
                    position,
                    trail,
                    bar.timestamp,
                    ExitReason::TrailingStop,
                    bar_index,
                )];
            }
        }
        if let Some(atr) = atr {
            self.update_trailing_stop(&mut position, bar.close, atr);
        }

        self.current = Some(position);
        Vec::new()
    }

    /// Force-close at the bar close (end of the data stream), keeping the
    /// ledger balanced.
    pub fn force_close(&mut self, bar: &Bar, bar_index: usize) -> Option<Trade> {
        let position = self.current.take()?;
        Some(self.close_full(
            position,
            bar.close,
            bar.timestamp,
            ExitReason::EndOfData,
            bar_index,
        ))
    }

    /// Once unrealized profit clears the activation threshold, trail at a
    /// tightened fraction of the stop distance. The trail only ever moves
    /// in the position's favor.
    fn update_trailing_stop(&self, position: &mut Position, close: f64, atr: f64) {
        if position.unrealized_pnl(close) <= self.cfg.trailing_activation {
            return;
        }
        let distance = atr * self.cfg.stop_loss_multiplier * self.cfg.trailing_tightness;
        let candidate = match position.direction {
            Direction::Long => close - distance,
            Direction::Short => close + distance,
        };
        let tightened = match (position.direction, position.trailing_stop) {
            (Direction::Long, Some(trail)) => trail.max(candidate),
            (Direction::Short, Some(trail)) => trail.min(candidate),
            (_, None) => candidate,
        };
        if position.trailing_stop != Some(tightened) {
            debug!(trail = tightened, "trailing stop updated");
        }
        position.trailing_stop = Some(tightened);
    }

    fn close_full(
        &self,
        position: Position,
        exit_price: f64,
        exit_time: DateTime<Utc>,
        reason: ExitReason,
        bar_index: usize,
    ) -> Trade {
        let trade = make_trade(
            &position,
            exit_price,
            exit_time,
            reason,
            position.quantity,
            bar_index,
        );
        info!(
            pair = %trade.pair,
            direction = %trade.direction,
            exit = exit_price,
            pnl_pct = trade.pnl_pct,
            reason = %reason,
            "position closed"
        );
        trade
    }
}

fn make_trade(
    position: &Position,
    exit_price: f64,
    exit_time: DateTime<Utc>,
    reason: ExitReason,
    quantity: f64,
    bar_index: usize,
) -> Trade {
    let pnl_fraction = match position.direction {
        Direction::Long => (exit_price - position.entry_price) / position.entry_price,
        Direction::Short => (position.entry_price - exit_price) / position.entry_price,
    };
    Trade {
        id: uuid::Uuid::new_v4().to_string(),
        pair: position.pair.clone(),
        direction: position.direction,
        entry_price: position.entry_price,
        entry_time: position.entry_time,
        exit_price,
        exit_time,
        exit_reason: reason,
        quantity,
        pnl_pct: pnl_fraction * 100.0,
        pnl_abs: pnl_fraction * position.entry_price * quantity,
        duration_bars: bar_index.saturating_sub(position.entry_bar),
    }
}
