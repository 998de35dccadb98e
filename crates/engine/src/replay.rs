use tracing::info;

use common::{Bar, Error, Position, Result, SignalEvent, Trade, TradingConfig};
use risk::PositionManager;
use strategy::{IndicatorEngine, IndicatorRow, SignalGenerator};

use crate::stats::{summarize, PerformanceSummary};

/// Everything a finished replay produces: the append-only trade ledger,
/// the signals that fired, and the aggregate summary.
#[derive(Debug, Clone)]
pub struct BacktestReport {
    pub trades: Vec<Trade>,
    pub signals: Vec<SignalEvent>,
    pub summary: PerformanceSummary,
}

/// What one bar's evaluation produced. Shared between the replay loop and
/// the live driver so both paths run identical decision logic.
#[derive(Debug, Default)]
pub(crate) struct StepOutcome {
    pub signal: Option<SignalEvent>,
    pub opened: Option<Position>,
    pub closed: Vec<Trade>,
}

/// Deterministic single pass over historical bars: validate, enrich,
/// drive the signal/position pair bar by bar, force-close at the end.
pub fn run(bars: &[Bar], cfg: &TradingConfig) -> Result<BacktestReport> {
    cfg.validate()?;
    validate_bars(bars)?;

    let rows = IndicatorEngine::new(cfg.clone()).compute(bars);
    let mut generator = SignalGenerator::new(cfg.clone());
    let mut positions = PositionManager::new(cfg.clone());

    let mut trades = Vec::new();
    let mut signals = Vec::new();

    for i in 0..rows.len() {
        let outcome = step(&rows, i, &mut generator, &mut positions);
        if let Some(event) = outcome.signal {
            signals.push(event);
        }
        trades.extend(outcome.closed);
    }

    // Keep the ledger balanced: whatever is still open leaves at the final
    // close, marked distinctly.
    if let Some(last) = rows.last() {
        if let Some(trade) = positions.force_close(&last.bar, rows.len() - 1) {
            trades.push(trade);
        }
    }

    let summary = summarize(&trades);
    info!(
        bars = bars.len(),
        trades = trades.len(),
        total_pnl_pct = summary.total_pnl_pct,
        "replay finished"
    );
    Ok(BacktestReport {
        trades,
        signals,
        summary,
    })
}

/// Evaluate one bar. Exactly this function runs in live mode too, so
/// backtest and live replay the same decision logic per closed bar.
///
/// An open position consumes the bar first (exit checks); an entry is only
/// taken on a bar with no position, so a close and an open never share a
/// bar.
pub(crate) fn step(
    rows: &[IndicatorRow],
    i: usize,
    generator: &mut SignalGenerator,
    positions: &mut PositionManager,
) -> StepOutcome {
    let row = &rows[i];
    let mut outcome = StepOutcome::default();

    let signal = generator.on_bar(rows, i, positions.open_direction());
    outcome.signal = signal.clone();

    if let Some(direction) = positions.open_direction() {
        let opposite = signal
            .as_ref()
            .map(|event| event.kind.is_opposite(direction))
            .unwrap_or(false);
        outcome.closed = positions.on_bar(&row.bar, row.atr, opposite, i);
    } else if let Some(event) = signal {
        if let Some(atr) = row.atr {
            outcome.opened = positions.open_position(event.kind, &row.bar, atr, i).cloned();
        }
    }
    outcome
}

/// Enforce the data contract before anything is computed: strictly
/// increasing timestamps, positive prices, a high/low range that bounds
/// open and close. One bad bar aborts the run — skipping it silently would
/// corrupt every lookback window behind it.
pub fn validate_bars(bars: &[Bar]) -> Result<()> {
    for (i, bar) in bars.iter().enumerate() {
        let malformed = |reason: &str| Error::MalformedBar {
            index: i,
            timestamp: bar.timestamp,
            reason: reason.to_string(),
        };

        if !(bar.open > 0.0 && bar.high > 0.0 && bar.low > 0.0 && bar.close > 0.0) {
            return Err(malformed("non-positive price"));
        }
        if bar.volume < 0.0 {
            return Err(malformed("negative volume"));
        }
        if bar.high < bar.low {
            return Err(malformed("high below low"));
        }
        if bar.high < bar.open.max(bar.close) || bar.low > bar.open.min(bar.close) {
            return Err(malformed("high/low do not bound open/close"));
        }
        if i > 0 && bar.timestamp <= bars[i - 1].timestamp {
            return Err(malformed("non-increasing timestamp"));
        }
    }
    Ok(())
}
