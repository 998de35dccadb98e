use async_trait::async_trait;
use tracing::info;

use common::{NotificationSink, Result, SignalEvent, Trade};

/// Notification sink that writes to the log stream. Stands in for any
/// push-message surface; swapping in a real one is a matter of
/// implementing `NotificationSink`.
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl NotificationSink for LogNotifier {
    async fn notify_signal(&self, pair: &str, event: &SignalEvent) -> Result<()> {
        info!(
            pair,
            kind = %event.kind,
            price = event.reference_price,
            "signal"
        );
        Ok(())
    }

    async fn notify_trade(&self, trade: &Trade) -> Result<()> {
        info!(
            pair = %trade.pair,
            direction = %trade.direction,
            entry = trade.entry_price,
            exit = trade.exit_price,
            pnl_pct = trade.pnl_pct,
            reason = %trade.exit_reason,
            "trade closed"
        );
        Ok(())
    }
}
