use async_trait::async_trait;

use crate::{Fill, Order, Position, Result, SignalEvent, Trade};

/// Abstraction over order execution.
///
/// `BinanceExecution` implements this for live trading, `PaperBroker` for
/// simulation. Only the `TradeExecutor` in `crates/engine` holds a
/// reference to a `dyn ExecutionAdapter`; decisions reach it only after the
/// bar that produced them is fully evaluated.
#[async_trait]
pub trait ExecutionAdapter: Send + Sync {
    /// Submit an order and return the fill confirmation. The fill price,
    /// when available, is authoritative for logged entry/exit prices.
    async fn submit_order(&self, order: &Order) -> Result<Fill>;

    /// Latest price for a trading pair.
    async fn current_price(&self, pair: &str) -> Result<f64>;
}

/// Append-only sink for position and trade snapshots, keyed by id.
/// The core never reads this store to make decisions — it exists for
/// audit and reporting only.
#[async_trait]
pub trait TradeStore: Send + Sync {
    async fn save_position(&self, position: &Position) -> Result<()>;
    async fn save_trade(&self, trade: &Trade) -> Result<()>;
}

/// Fire-and-forget consumer of signal and trade events. Failures are
/// logged by the caller and never touch core state.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify_signal(&self, pair: &str, event: &SignalEvent) -> Result<()>;
    async fn notify_trade(&self, trade: &Trade) -> Result<()>;
}
