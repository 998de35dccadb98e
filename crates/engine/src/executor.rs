use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{error, info, warn};

use common::{
    Decision, Direction, ExecutionAdapter, NotificationSink, Order, Trade, TradeStore,
};

/// Consumes finalized decisions from the live driver: routes the order,
/// logs at the fill price, appends to the trade store, pings the
/// notification sink.
///
/// This is the only component that calls `ExecutionAdapter::submit_order`.
/// Decisions are never rolled back — an order or storage failure is
/// logged and the stream moves on.
pub struct TradeExecutor {
    decision_rx: mpsc::Receiver<Decision>,
    adapter: Arc<dyn ExecutionAdapter>,
    store: Arc<dyn TradeStore>,
    notifier: Arc<dyn NotificationSink>,
}

impl TradeExecutor {
    pub fn new(
        decision_rx: mpsc::Receiver<Decision>,
        adapter: Arc<dyn ExecutionAdapter>,
        store: Arc<dyn TradeStore>,
        notifier: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            decision_rx,
            adapter,
            store,
            notifier,
        }
    }

    /// Run the executor loop. Call from `tokio::spawn`.
    pub async fn run(mut self) {
        info!("TradeExecutor running");
        while let Some(decision) = self.decision_rx.recv().await {
            match decision {
                Decision::Entry { position } => self.handle_entry(position).await,
                Decision::Exit { trade } => self.handle_exit(trade).await,
                Decision::Signal { pair, event } => {
                    // Fire and forget: a dead sink must not affect anything.
                    if let Err(e) = self.notifier.notify_signal(&pair, &event).await {
                        warn!(error = %e, "signal notification failed");
                    }
                }
            }
        }
        warn!("TradeExecutor: decision channel closed");
    }

    async fn handle_entry(&self, mut position: common::Position) {
        let order = Order::market(
            &position.pair,
            position.direction.entry_side(),
            position.quantity,
        );
        match self.adapter.submit_order(&order).await {
            Ok(fill) => {
                // The fill is authoritative for the logged entry price.
                position.entry_price = fill.fill_price;
                info!(
                    pair = %position.pair,
                    direction = %position.direction,
                    fill = fill.fill_price,
                    "entry order filled"
                );
            }
            Err(e) => {
                error!(
                    pair = %position.pair,
                    error = %e,
                    "entry order failed — logging at the decision reference price"
                );
            }
        }
        if let Err(e) = self.store.save_position(&position).await {
            error!(error = %e, "failed to persist position");
        }
    }

    async fn handle_exit(&self, mut trade: Trade) {
        let order = Order::market(&trade.pair, trade.direction.exit_side(), trade.quantity);
        match self.adapter.submit_order(&order).await {
            Ok(fill) => {
                // Re-mark the ledger entry at the actual fill; the exit
                // decision itself already happened and stands.
                trade.exit_price = fill.fill_price;
                let pnl_fraction = match trade.direction {
                    Direction::Long => (fill.fill_price - trade.entry_price) / trade.entry_price,
                    Direction::Short => (trade.entry_price - fill.fill_price) / trade.entry_price,
                };
                trade.pnl_pct = pnl_fraction * 100.0;
                trade.pnl_abs = pnl_fraction * trade.entry_price * trade.quantity;
                info!(
                    pair = %trade.pair,
                    fill = fill.fill_price,
                    pnl_pct = trade.pnl_pct,
                    reason = %trade.exit_reason,
                    "exit order filled"
                );
            }
            Err(e) => {
                error!(
                    pair = %trade.pair,
                    error = %e,
                    "exit order failed — logging at the decision reference price"
                );
            }
        }
        if let Err(e) = self.store.save_trade(&trade).await {
            error!(error = %e, "failed to persist trade");
        }
        if let Err(e) = self.notifier.notify_trade(&trade).await {
            warn!(error = %e, "trade notification failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use common::{Error, ExitReason, Position, Result, SignalEvent, SignalKind};
    use paper::PaperBroker;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MemStore {
        positions: Mutex<Vec<Position>>,
        trades: Mutex<Vec<Trade>>,
    }

    #[async_trait]
    impl TradeStore for MemStore {
        async fn save_position(&self, position: &Position) -> Result<()> {
            self.positions.lock().unwrap().push(position.clone());
            Ok(())
        }
        async fn save_trade(&self, trade: &Trade) -> Result<()> {
            self.trades.lock().unwrap().push(trade.clone());
            Ok(())
        }
    }

    #[derive(Default)]
    struct FlakySink {
        delivered: Mutex<usize>,
    }

    #[async_trait]
    impl NotificationSink for FlakySink {
        async fn notify_signal(&self, _pair: &str, _event: &SignalEvent) -> Result<()> {
            *self.delivered.lock().unwrap() += 1;
            Err(Error::Other("sink offline".into()))
        }
        async fn notify_trade(&self, _trade: &Trade) -> Result<()> {
            *self.delivered.lock().unwrap() += 1;
            Err(Error::Other("sink offline".into()))
        }
    }

    fn position() -> Position {
        Position {
            id: "p1".into(),
            pair: "BTCUSDT".into(),
            direction: Direction::Long,
            entry_price: 1000.0,
            entry_time: Utc::now(),
            entry_bar: 10,
            quantity: 0.5,
            stop_price: 994.0,
            take_profit_1: 1008.0,
            take_profit_2: 1016.0,
            trailing_stop: None,
            partial_exit_done: false,
        }
    }

    fn trade() -> Trade {
        Trade {
            id: "t1".into(),
            pair: "BTCUSDT".into(),
            direction: Direction::Long,
            entry_price: 1000.0,
            entry_time: Utc::now(),
            exit_price: 1016.0,
            exit_time: Utc::now(),
            exit_reason: ExitReason::TakeProfit2,
            quantity: 0.5,
            pnl_pct: 1.6,
            pnl_abs: 8.0,
            duration_bars: 4,
        }
    }

    async fn run_executor(decisions: Vec<Decision>) -> (Arc<MemStore>, Arc<FlakySink>) {
        let (tx, rx) = mpsc::channel(16);
        let broker = Arc::new(PaperBroker::new(10_000.0, 10.0)); // 10 bps slippage
        broker.update_price("BTCUSDT", 1000.0).await;
        let store = Arc::new(MemStore::default());
        let sink = Arc::new(FlakySink::default());

        let executor = TradeExecutor::new(rx, broker, store.clone(), sink.clone());
        let handle = tokio::spawn(executor.run());
        for decision in decisions {
            tx.send(decision).await.unwrap();
        }
        drop(tx);
        handle.await.unwrap();
        (store, sink)
    }

    #[tokio::test]
    async fn entry_is_logged_at_fill_price() {
        let (store, _) = run_executor(vec![Decision::Entry {
            position: position(),
        }])
        .await;
        let saved = store.positions.lock().unwrap();
        assert_eq!(saved.len(), 1);
        // Paper buy slips up 10 bps from 1000.
        assert!((saved[0].entry_price - 1001.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn exit_repriced_and_persisted() {
        let (store, _) = run_executor(vec![Decision::Exit { trade: trade() }]).await;
        let saved = store.trades.lock().unwrap();
        assert_eq!(saved.len(), 1);
        // Paper sell slips down 10 bps from 1000.
        assert!((saved[0].exit_price - 999.0).abs() < 1e-9);
        assert!((saved[0].pnl_pct - (-0.1)).abs() < 1e-9);
    }

    #[tokio::test]
    async fn sink_failure_does_not_block_persistence() {
        let event = SignalEvent {
            timestamp: Utc::now(),
            kind: SignalKind::Buy,
            reference_price: 1000.0,
        };
        let (store, sink) = run_executor(vec![
            Decision::Signal {
                pair: "BTCUSDT".into(),
                event,
            },
            Decision::Exit { trade: trade() },
        ])
        .await;
        assert_eq!(*sink.delivered.lock().unwrap(), 2);
        assert_eq!(store.trades.lock().unwrap().len(), 1);
    }
}
