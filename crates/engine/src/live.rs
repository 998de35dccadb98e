use tokio::sync::{broadcast, mpsc, watch};
use tracing::{info, warn};

use common::{Bar, Decision, MarketEvent, TradingConfig};
use risk::PositionManager;
use strategy::{IndicatorEngine, SignalGenerator};

use crate::replay;

/// Drives the same per-bar decision logic as the backtest from a live
/// kline stream.
///
/// Only closed candles enter the core — a forming candle repaints and
/// would leak the future into the signal path. Each closed bar is one
/// atomic unit of work: indicators, signal, position transition, then the
/// resulting decisions go out on the channel. Shutdown is only observed
/// between bars, so position invariants hold at every stopping point.
pub struct LiveDriver {
    cfg: TradingConfig,
    bars: Vec<Bar>,
    engine: IndicatorEngine,
    generator: SignalGenerator,
    positions: PositionManager,
    decision_tx: mpsc::Sender<Decision>,
}

impl LiveDriver {
    /// `history` seeds the indicator window so signals are armed from the
    /// first live bar; it must already be validated and time-ordered.
    pub fn new(cfg: TradingConfig, history: Vec<Bar>, decision_tx: mpsc::Sender<Decision>) -> Self {
        let mut driver = Self {
            engine: IndicatorEngine::new(cfg.clone()),
            generator: SignalGenerator::new(cfg.clone()),
            positions: PositionManager::new(cfg.clone()),
            cfg,
            bars: history,
            decision_tx,
        };
        driver.trim_window();
        driver
    }

    pub fn history_len(&self) -> usize {
        self.bars.len()
    }

    /// Consume the market stream until shutdown or stream loss.
    pub async fn run(
        mut self,
        mut market_rx: broadcast::Receiver<MarketEvent>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        info!(pair = %self.cfg.pair, history = self.bars.len(), "LiveDriver running");
        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("LiveDriver stopping between bars");
                        return;
                    }
                }
                event = market_rx.recv() => match event {
                    Ok(event) => {
                        if event.pair != self.cfg.pair {
                            continue;
                        }
                        let Some(bar) = event.to_closed_bar() else {
                            continue; // forming candle: never fed to the core
                        };
                        self.on_closed_bar(bar).await;
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(dropped = n, "LiveDriver lagged behind the market stream");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        warn!("market stream closed — LiveDriver exiting");
                        return;
                    }
                },
            }
        }
    }

    /// One atomic bar evaluation. Decisions are dispatched only after the
    /// bar is fully decided; a slow or failing consumer never reruns it.
    async fn on_closed_bar(&mut self, bar: Bar) {
        if let Some(last) = self.bars.last() {
            if bar.timestamp <= last.timestamp {
                warn!(timestamp = %bar.timestamp, "dropping out-of-order closed candle");
                return;
            }
        }
        if replay::validate_bars(std::slice::from_ref(&bar)).is_err() {
            warn!(timestamp = %bar.timestamp, "dropping malformed closed candle");
            return;
        }

        self.bars.push(bar);
        self.trim_window();

        let rows = self.engine.compute(&self.bars);
        let i = rows.len() - 1;
        let outcome = replay::step(&rows, i, &mut self.generator, &mut self.positions);

        if let Some(event) = outcome.signal {
            self.dispatch(Decision::Signal {
                pair: self.cfg.pair.clone(),
                event,
            })
            .await;
        }
        for trade in outcome.closed {
            self.dispatch(Decision::Exit { trade }).await;
        }
        if let Some(position) = outcome.opened {
            self.dispatch(Decision::Entry { position }).await;
        }
    }

    async fn dispatch(&self, decision: Decision) {
        if self.decision_tx.send(decision).await.is_err() {
            warn!("decision channel closed — executor is gone");
        }
    }

    /// Keep a bounded window; the generator and manager re-anchor their
    /// bar indices when the front is dropped.
    fn trim_window(&mut self) {
        let excess = self.bars.len().saturating_sub(self.cfg.live_window);
        if excess > 0 {
            self.bars.drain(..excess);
            self.generator.shift_back(excess);
            self.positions.shift_back(excess);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn cfg() -> TradingConfig {
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
            live_window: 30,
            ..TradingConfig::default()
        }
    }

    fn event(i: usize, close: f64, closed: bool) -> MarketEvent {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        MarketEvent {
            pair: "BTCUSDT".into(),
            open: close - 0.5,
            high: close + 1.0,
            low: close - 1.5,
            close,
            volume: 100.0,
            is_candle_closed: closed,
            timestamp: start + Duration::minutes(i as i64),
        }
    }

    fn driver() -> (LiveDriver, mpsc::Receiver<Decision>) {
        let (tx, rx) = mpsc::channel(64);
        (LiveDriver::new(cfg(), Vec::new(), tx), rx)
    }

    #[tokio::test]
    async fn forming_candles_never_enter_the_window() {
        let (mut driver, _rx) = driver();
        let ev = event(0, 100.0, false);
        if let Some(bar) = ev.to_closed_bar() {
            driver.on_closed_bar(bar).await;
        }
        assert_eq!(driver.history_len(), 0);
    }

    #[tokio::test]
    async fn closed_candles_accumulate_in_order() {
        let (mut driver, _rx) = driver();
        for i in 0..5 {
            let bar = event(i, 100.0 + i as f64, true).to_closed_bar().unwrap();
            driver.on_closed_bar(bar).await;
        }
        assert_eq!(driver.history_len(), 5);
    }

    #[tokio::test]
    async fn duplicate_and_stale_candles_are_dropped() {
        let (mut driver, _rx) = driver();
        driver
            .on_closed_bar(event(3, 100.0, true).to_closed_bar().unwrap())
            .await;
        // Same timestamp again, then an older one.
        driver
            .on_closed_bar(event(3, 101.0, true).to_closed_bar().unwrap())
            .await;
        driver
            .on_closed_bar(event(1, 99.0, true).to_closed_bar().unwrap())
            .await;
        assert_eq!(driver.history_len(), 1);
    }

    #[tokio::test]
    async fn malformed_candles_are_dropped() {
        let (mut driver, _rx) = driver();
        let mut bad = event(0, 100.0, true).to_closed_bar().unwrap();
        bad.low = bad.high + 5.0;
        driver.on_closed_bar(bad).await;
        assert_eq!(driver.history_len(), 0);
    }

    #[tokio::test]
    async fn window_stays_bounded() {
        let (mut driver, _rx) = driver();
        for i in 0..100 {
            let close = 100.0 + (i as f64 * 0.3).sin() * 4.0;
            driver
                .on_closed_bar(event(i, close, true).to_closed_bar().unwrap())
                .await;
        }
        assert_eq!(driver.history_len(), 30);
    }

    #[tokio::test]
    async fn oversized_history_is_trimmed_at_construction() {
        let (tx, _rx) = mpsc::channel(8);
        let history: Vec<Bar> = (0..80)
            .map(|i| event(i, 100.0, true).to_closed_bar().unwrap())
            .collect();
        let driver = LiveDriver::new(cfg(), history, tx);
        assert_eq!(driver.history_len(), 30);
    }
}
