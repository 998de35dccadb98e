use serde::Serialize;

use common::Trade;

/// Aggregate performance of a trade ledger.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformanceSummary {
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    /// Percent of trades with positive P&L.
    pub win_rate: f64,
    /// Mean P&L of winning trades, in percent.
    pub avg_win: f64,
    /// Mean P&L of losing trades, in percent (negative).
    pub avg_loss: f64,
    /// Sum of per-trade P&L percentages.
    pub total_pnl_pct: f64,
    /// Sum of per-trade P&L in quote currency.
    pub total_pnl_abs: f64,
    /// Largest peak-to-trough drop of the cumulative P&L curve, in percent
    /// points.
    pub max_drawdown: f64,
    /// Gross wins over gross losses; infinite when nothing was lost.
    pub profit_factor: f64,
}

pub fn summarize(trades: &[Trade]) -> PerformanceSummary {
    if trades.is_empty() {
        return PerformanceSummary {
            total_trades: 0,
            winning_trades: 0,
            losing_trades: 0,
            win_rate: 0.0,
            avg_win: 0.0,
            avg_loss: 0.0,
            total_pnl_pct: 0.0,
            total_pnl_abs: 0.0,
            max_drawdown: 0.0,
            profit_factor: 0.0,
        };
    }

    let pnls: Vec<f64> = trades.iter().map(|t| t.pnl_pct).collect();
    let wins: Vec<f64> = pnls.iter().copied().filter(|&p| p > 0.0).collect();
    let losses: Vec<f64> = pnls.iter().copied().filter(|&p| p < 0.0).collect();

    let total = trades.len();
    let win_rate = wins.len() as f64 / total as f64 * 100.0;
    let avg_win = if wins.is_empty() {
        0.0
    } else {
        wins.iter().sum::<f64>() / wins.len() as f64
    };
    let avg_loss = if losses.is_empty() {
        0.0
    } else {
        losses.iter().sum::<f64>() / losses.len() as f64
    };

    // Peak-to-trough on the cumulative P&L curve.
    let mut cumulative = 0.0;
    let mut peak = 0.0f64;
    let mut max_drawdown = 0.0f64;
    for pnl in &pnls {
        cumulative += pnl;
        peak = peak.max(cumulative);
        max_drawdown = max_drawdown.max(peak - cumulative);
    }

    let gross_profit: f64 = wins.iter().sum();
    let gross_loss: f64 = losses.iter().sum::<f64>().abs();
    let profit_factor = if gross_loss > 0.0 {
        gross_profit / gross_loss
    } else {
        f64::INFINITY
    };

    PerformanceSummary {
        total_trades: total,
        winning_trades: wins.len(),
        losing_trades: losses.len(),
        win_rate,
        avg_win,
        avg_loss,
        total_pnl_pct: pnls.iter().sum(),
        total_pnl_abs: trades.iter().map(|t| t.pnl_abs).sum(),
        max_drawdown,
        profit_factor,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use common::{Direction, ExitReason};

    fn trade(pnl_pct: f64) -> Trade {
        let now = Utc::now();
        Trade {
            id: "t".into(),
            pair: "BTCUSDT".into(),
            direction: Direction::Long,
            entry_price: 100.0,
            entry_time: now,
            exit_price: 100.0 * (1.0 + pnl_pct / 100.0),
            exit_time: now,
            exit_reason: ExitReason::TakeProfit2,
            quantity: 1.0,
            pnl_pct,
            pnl_abs: pnl_pct,
            duration_bars: 3,
        }
    }

    #[test]
    fn empty_ledger_is_all_zero() {
        let summary = summarize(&[]);
        assert_eq!(summary.total_trades, 0);
        assert_eq!(summary.win_rate, 0.0);
        assert_eq!(summary.profit_factor, 0.0);
        assert_eq!(summary.max_drawdown, 0.0);
    }

    #[test]
    fn mixed_ledger_statistics() {
        let trades = vec![trade(10.0), trade(-5.0), trade(5.0), trade(-10.0)];
        let summary = summarize(&trades);
        assert_eq!(summary.total_trades, 4);
        assert_eq!(summary.winning_trades, 2);
        assert_eq!(summary.losing_trades, 2);
        assert!((summary.win_rate - 50.0).abs() < 1e-9);
        assert!((summary.avg_win - 7.5).abs() < 1e-9);
        assert!((summary.avg_loss + 7.5).abs() < 1e-9);
        assert!(summary.total_pnl_pct.abs() < 1e-9);
        // Cumulative curve 10, 5, 10, 0 against peak 10 → worst drop 10.
        assert!((summary.max_drawdown - 10.0).abs() < 1e-9);
        assert!((summary.profit_factor - 1.0).abs() < 1e-9);
    }

    #[test]
    fn all_wins_has_infinite_profit_factor() {
        let summary = summarize(&[trade(3.0), trade(7.0)]);
        assert!(summary.profit_factor.is_infinite());
        assert_eq!(summary.losing_trades, 0);
        assert_eq!(summary.max_drawdown, 0.0);
    }

    #[test]
    fn drawdown_from_initial_peak() {
        // Straight losses draw down from the starting level.
        let summary = summarize(&[trade(-4.0), trade(-6.0)]);
        assert!((summary.max_drawdown - 10.0).abs() < 1e-9);
    }
}
