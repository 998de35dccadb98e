use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One finalized OHLCV candle.
///
/// The market data source guarantees strictly increasing timestamps and a
/// fixed interval; `ReplayEngine` re-checks before computing indicators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    /// Absolute candle body size.
    pub fn body(&self) -> f64 {
        (self.close - self.open).abs()
    }

    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    pub fn is_bearish(&self) -> bool {
        self.close < self.open
    }
}

/// Live market data event from the exchange stream.
/// Emitted on every kline update; indicators only ever see events where
/// `is_candle_closed == true` — partial candles repaint and must not be fed
/// to the signal path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketEvent {
    pub pair: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub is_candle_closed: bool,
    pub timestamp: DateTime<Utc>,
}

impl MarketEvent {
    /// Convert a finalized kline event into a `Bar`. Returns `None` while
    /// the candle is still forming.
    pub fn to_closed_bar(&self) -> Option<Bar> {
        if !self.is_candle_closed {
            return None;
        }
        Some(Bar {
            timestamp: self.timestamp,
            open: self.open,
            high: self.high,
            low: self.low,
            close: self.close,
            volume: self.volume,
        })
    }
}

/// Direction of a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    /// Order side that opens a position in this direction.
    pub fn entry_side(&self) -> OrderSide {
        match self {
            Direction::Long => OrderSide::Buy,
            Direction::Short => OrderSide::Sell,
        }
    }

    /// Order side that closes a position in this direction.
    pub fn exit_side(&self) -> OrderSide {
        match self {
            Direction::Long => OrderSide::Sell,
            Direction::Short => OrderSide::Buy,
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Long => write!(f, "LONG"),
            Direction::Short => write!(f, "SHORT"),
        }
    }
}

/// Kind of an emitted entry signal. "No signal" is `Option::None` at the
/// generator's output, not a variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SignalKind {
    Buy,
    Sell,
}

impl SignalKind {
    pub fn direction(&self) -> Direction {
        match self {
            SignalKind::Buy => Direction::Long,
            SignalKind::Sell => Direction::Short,
        }
    }

    /// True when this signal points against an open position's direction.
    pub fn is_opposite(&self, direction: Direction) -> bool {
        self.direction() != direction
    }
}

impl std::fmt::Display for SignalKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SignalKind::Buy => write!(f, "BUY"),
            SignalKind::Sell => write!(f, "SELL"),
        }
    }
}

/// A confirmed entry signal, at most one per bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalEvent {
    pub timestamp: DateTime<Utc>,
    pub kind: SignalKind,
    /// Close of the bar the signal fired on; the fallback price when no
    /// fill confirmation is available.
    pub reference_price: f64,
}

/// Why a position (or part of one) was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExitReason {
    StopLoss,
    TakeProfit1Partial,
    TakeProfit2,
    TrailingStop,
    OppositeSignal,
    EndOfData,
}

impl std::fmt::Display for ExitReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExitReason::StopLoss => write!(f, "Stop Loss"),
            ExitReason::TakeProfit1Partial => write!(f, "Take Profit 1 (partial)"),
            ExitReason::TakeProfit2 => write!(f, "Take Profit 2"),
            ExitReason::TrailingStop => write!(f, "Trailing Stop"),
            ExitReason::OppositeSignal => write!(f, "Opposite Signal"),
            ExitReason::EndOfData => write!(f, "End of Data"),
        }
    }
}

/// The single live position. Stop and both targets are fixed at entry from
/// ATR; only `trailing_stop`, `partial_exit_done` and `quantity` change
/// afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub id: String,
    pub pair: String,
    pub direction: Direction,
    pub entry_price: f64,
    pub entry_time: DateTime<Utc>,
    pub entry_bar: usize,
    pub quantity: f64,
    pub stop_price: f64,
    pub take_profit_1: f64,
    pub take_profit_2: f64,
    pub trailing_stop: Option<f64>,
    pub partial_exit_done: bool,
}

impl Position {
    /// Unrealized P&L as a fraction of entry (0.05 = +5%).
    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        match self.direction {
            Direction::Long => (price - self.entry_price) / self.entry_price,
            Direction::Short => (self.entry_price - price) / self.entry_price,
        }
    }
}

/// Immutable record of a closed position (or a partial close).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub id: String,
    pub pair: String,
    pub direction: Direction,
    pub entry_price: f64,
    pub entry_time: DateTime<Utc>,
    pub exit_price: f64,
    pub exit_time: DateTime<Utc>,
    pub exit_reason: ExitReason,
    pub quantity: f64,
    /// Realized P&L in percent of entry price.
    pub pnl_pct: f64,
    /// Realized P&L in quote currency for `quantity`.
    pub pnl_abs: f64,
    pub duration_bars: usize,
}

/// Side of an order at the execution boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl std::fmt::Display for OrderSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "BUY"),
            OrderSide::Sell => write!(f, "SELL"),
        }
    }
}

/// An order handed to the execution adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub pair: String,
    pub side: OrderSide,
    pub quantity: f64,
    /// `None` = market order; `Some(price)` = limit order.
    pub price: Option<f64>,
}

impl Order {
    pub fn market(pair: impl Into<String>, side: OrderSide, quantity: f64) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            pair: pair.into(),
            side,
            quantity,
            price: None,
        }
    }
}

/// Confirmation of a filled order returned by the execution adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fill {
    pub order_id: String,
    pub pair: String,
    pub side: OrderSide,
    pub fill_price: f64,
    pub quantity: f64,
    pub timestamp: DateTime<Utc>,
}

/// Finalized per-bar decision handed from the live driver to the executor.
/// Decisions are append-only: executor latency or failure never reruns the
/// bar that produced them.
#[derive(Debug, Clone)]
pub enum Decision {
    /// A new position was opened this bar.
    Entry { position: Position },
    /// A position (or part of one) was closed this bar.
    Exit { trade: Trade },
    /// A signal fired; forwarded to the notification sink only.
    Signal { pair: String, event: SignalEvent },
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn bar(open: f64, high: f64, low: f64, close: f64) -> Bar {
        Bar {
            timestamp: Utc::now(),
            open,
            high,
            low,
            close,
            volume: 100.0,
        }
    }

    #[test]
    fn bar_body_and_direction() {
        let b = bar(100.0, 106.0, 99.0, 104.0);
        assert_eq!(b.body(), 4.0);
        assert!(b.is_bullish());
        assert!(!b.is_bearish());
    }

    #[test]
    fn market_event_conversion_requires_closed_candle() {
        let mut event = MarketEvent {
            pair: "BTCUSDT".into(),
            open: 100.0,
            high: 101.0,
            low: 99.0,
            close: 100.5,
            volume: 12.0,
            is_candle_closed: false,
            timestamp: Utc::now(),
        };
        assert!(event.to_closed_bar().is_none());
        event.is_candle_closed = true;
        let b = event.to_closed_bar().unwrap();
        assert_eq!(b.close, 100.5);
    }

    #[test]
    fn signal_kind_opposition() {
        assert!(SignalKind::Sell.is_opposite(Direction::Long));
        assert!(SignalKind::Buy.is_opposite(Direction::Short));
        assert!(!SignalKind::Buy.is_opposite(Direction::Long));
    }

    #[test]
    fn unrealized_pnl_sign_follows_direction() {
        let pos = Position {
            id: "p".into(),
            pair: "BTCUSDT".into(),
            direction: Direction::Short,
            entry_price: 100.0,
            entry_time: Utc::now(),
            entry_bar: 0,
            quantity: 1.0,
            stop_price: 103.0,
            take_profit_1: 96.0,
            take_profit_2: 92.0,
            trailing_stop: None,
            partial_exit_done: false,
        };
        assert!(pos.unrealized_pnl(95.0) > 0.0);
        assert!(pos.unrealized_pnl(105.0) < 0.0);
    }
}
