//! Performance metrics: pure functions over the ledger and equity curve.
//!
//! No dependency on the data pipeline or the live session: a finished
//! `SimulationResult` (or its parts) in, scalars out.

use serde::{Deserialize, Serialize};
use sq9_core::engine::EquityPoint;
use sq9_core::ClosedTrade;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub trade_count: usize,
    /// Percent of trades with positive net P&L.
    pub win_rate: f64,
    /// Winning over losing net P&L. `None` when undefined.
    pub profit_factor: Option<f64>,
    /// Largest peak-to-trough decline of the equity curve, as a negative percent.
    pub max_drawdown_pct: f64,
    pub max_consecutive_wins: usize,
    pub max_consecutive_losses: usize,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub expectancy: f64,
}

impl PerformanceMetrics {
    pub fn compute(trades: &[ClosedTrade], equity_curve: &[EquityPoint]) -> Self {
        let equity: Vec<f64> = equity_curve.iter().map(|p| p.equity).collect();
        Self {
            trade_count: trades.len(),
            win_rate: win_rate(trades),
            profit_factor: profit_factor(trades),
            max_drawdown_pct: max_drawdown(&equity) * 100.0,
            max_consecutive_wins: max_consecutive_wins(trades),
            max_consecutive_losses: max_consecutive_losses(trades),
            avg_win: avg_win(trades),
            avg_loss: avg_loss(trades),
            expectancy: expectancy(trades),
        }
    }
}

// ─── Individual metric functions ────────────────────────────────────

/// Percent of trades with net P&L > 0.
pub fn win_rate(trades: &[ClosedTrade]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    let wins = trades.iter().filter(|t| t.is_winner()).count();
    wins as f64 / trades.len() as f64 * 100.0
}

/// Sum of winning net P&L over the absolute sum of losing net P&L.
///
/// `None` when there are no trades, or wins but no losses.
pub fn profit_factor(trades: &[ClosedTrade]) -> Option<f64> {
    let gross_win: f64 = trades.iter().filter(|t| t.net_pnl > 0.0).map(|t| t.net_pnl).sum();
    let gross_loss: f64 = trades
        .iter()
        .filter(|t| t.net_pnl < 0.0)
        .map(|t| t.net_pnl.abs())
        .sum();
    if gross_loss > 0.0 {
        Some(gross_win / gross_loss)
    } else if gross_win > 0.0 || trades.is_empty() {
        None
    } else {
        Some(0.0)
    }
}

/// Max drawdown as a negative fraction (e.g. -0.05 = 5% decline). 0.0 if monotone.
pub fn max_drawdown(equity: &[f64]) -> f64 {
    let mut peak = f64::NEG_INFINITY;
    let mut worst = 0.0_f64;
    for &e in equity {
        peak = peak.max(e);
        if peak > 0.0 {
            worst = worst.min((e - peak) / peak);
        }
    }
    worst
}

pub fn max_consecutive_wins(trades: &[ClosedTrade]) -> usize {
    longest_run(trades, |t| t.net_pnl > 0.0)
}

pub fn max_consecutive_losses(trades: &[ClosedTrade]) -> usize {
    longest_run(trades, |t| t.net_pnl < 0.0)
}

fn longest_run(trades: &[ClosedTrade], pred: impl Fn(&ClosedTrade) -> bool) -> usize {
    let mut best = 0;
    let mut current = 0;
    for t in trades {
        if pred(t) {
            current += 1;
            best = best.max(current);
        } else {
            current = 0;
        }
    }
    best
}

pub fn avg_win(trades: &[ClosedTrade]) -> f64 {
    mean(trades.iter().map(|t| t.net_pnl).filter(|&p| p > 0.0))
}

pub fn avg_loss(trades: &[ClosedTrade]) -> f64 {
    mean(trades.iter().map(|t| t.net_pnl).filter(|&p| p < 0.0))
}

/// Mean net P&L per trade.
pub fn expectancy(trades: &[ClosedTrade]) -> f64 {
    mean(trades.iter().map(|t| t.net_pnl))
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 {
        0.0
    } else {
        sum / n as f64
    }
}
