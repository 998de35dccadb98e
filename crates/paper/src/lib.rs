use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use common::{Error, ExecutionAdapter, Fill, Order, OrderSide, Result};

/// Simulated execution adapter for paper trading.
///
/// Fills at the latest known price with configurable slippage; no order
/// ever leaves the process. Prices are pushed in from the market stream
/// via `update_price`.
pub struct PaperBroker {
    /// Simulated quote-currency balance.
    balance_usd: Arc<RwLock<f64>>,
    /// Latest known price per pair.
    prices: Arc<RwLock<HashMap<String, f64>>>,
    /// Slippage in basis points applied to every fill.
    slippage_bps: f64,
}

impl PaperBroker {
    pub fn new(initial_balance_usd: f64, slippage_bps: f64) -> Self {
        info!(
            balance = initial_balance_usd,
            slippage_bps, "PaperBroker initialized"
        );
        Self {
            balance_usd: Arc::new(RwLock::new(initial_balance_usd)),
            prices: Arc::new(RwLock::new(HashMap::new())),
            slippage_bps,
        }
    }

    /// Update the latest price for a pair (fed by the market event loop).
    pub async fn update_price(&self, pair: &str, price: f64) {
        self.prices.write().await.insert(pair.to_string(), price);
    }

    pub async fn balance(&self) -> f64 {
        *self.balance_usd.read().await
    }
}

#[async_trait]
impl ExecutionAdapter for PaperBroker {
    async fn submit_order(&self, order: &Order) -> Result<Fill> {
        let mid_price = self
            .prices
            .read()
            .await
            .get(&order.pair)
            .copied()
            .ok_or_else(|| {
                Error::Exchange(format!(
                    "PaperBroker has no price for '{}'. Ensure market events are flowing.",
                    order.pair
                ))
            })?;

        // Slippage hurts both ways: buys pay more, sells receive less.
        let fill_price = match order.side {
            OrderSide::Buy => mid_price * (1.0 + self.slippage_bps / 10_000.0),
            OrderSide::Sell => mid_price * (1.0 - self.slippage_bps / 10_000.0),
        };

        let notional = fill_price * order.quantity;
        {
            let mut balance = self.balance_usd.write().await;
            match order.side {
                OrderSide::Buy => *balance -= notional,
                OrderSide::Sell => *balance += notional,
            }
        }

        debug!(
            pair = %order.pair,
            side = %order.side,
            mid = mid_price,
            fill = fill_price,
            qty = order.quantity,
            "paper fill simulated"
        );

        Ok(Fill {
            order_id: order.id.clone(),
            pair: order.pair.clone(),
            side: order.side,
            fill_price,
            quantity: order.quantity,
            timestamp: Utc::now(),
        })
    }

    async fn current_price(&self, pair: &str) -> Result<f64> {
        self.prices
            .read()
            .await
            .get(pair)
            .copied()
            .ok_or_else(|| Error::Exchange(format!("no price available for {pair}")))
    }
}
