//! Aggregate statistics over a finished ledger.

use crate::domain::PortfolioState;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    /// Percent of trades with positive net P&L.
    pub win_rate: f64,
    pub initial_capital: f64,
    pub final_capital: f64,
    pub total_return_pct: f64,
    pub cumulative_pnl: f64,
    pub total_costs: f64,
    pub total_brokerage: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub largest_win: f64,
    pub largest_loss: f64,
}

impl Summary {
    pub fn from_state(state: &PortfolioState) -> Self {
        let wins: Vec<f64> = state
            .ledger
            .iter()
            .map(|t| t.net_pnl)
            .filter(|&p| p > 0.0)
            .collect();
        let losses: Vec<f64> = state
            .ledger
            .iter()
            .map(|t| t.net_pnl)
            .filter(|&p| p < 0.0)
            .collect();

        let total_trades = state.ledger.len();
        let win_rate = if total_trades > 0 {
            wins.len() as f64 / total_trades as f64 * 100.0
        } else {
            0.0
        };
        let total_return_pct = if state.initial_capital > 0.0 {
            (state.capital - state.initial_capital) / state.initial_capital * 100.0
        } else {
            0.0
        };

        Self {
            total_trades,
            winning_trades: wins.len(),
            losing_trades: losses.len(),
            win_rate,
            initial_capital: state.initial_capital,
            final_capital: state.capital,
            total_return_pct,
            cumulative_pnl: state.cumulative_pnl,
            total_costs: state.total_costs,
            total_brokerage: state.total_brokerage,
            avg_win: mean(&wins),
            avg_loss: mean(&losses),
            largest_win: wins.iter().copied().fold(0.0, f64::max),
            largest_loss: losses.iter().copied().fold(0.0, f64::min),
        }
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ClosedTrade, Direction, ExitReason};
    use chrono::NaiveDate;

    fn trade(n: usize, net: f64) -> ClosedTrade {
        let t = NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap();
        ClosedTrade {
            trade_number: n,
            direction: Direction::Long,
            entry_price: 100.0,
            entry_time: t,
            exit_price: 100.0,
            exit_time: t,
            quantity: 10,
            gross_pnl: net,
            costs: 0.0,
            net_pnl: net,
            reason: ExitReason::EndOfWindow,
            result: ExitReason::EndOfWindow.to_string(),
            capital_after: 0.0,
            partial_exits: Vec::new(),
        }
    }

    #[test]
    fn empty_ledger() {
        let summary = Summary::from_state(&PortfolioState::new(10_000.0));
        assert_eq!(summary.total_trades, 0);
        assert_eq!(summary.win_rate, 0.0);
        assert_eq!(summary.total_return_pct, 0.0);
    }

    #[test]
    fn mixed_ledger() {
        let mut state = PortfolioState::new(10_000.0);
        for (i, net) in [200.0, -50.0, 100.0, -150.0].into_iter().enumerate() {
            state.realize(net, 0.0, 0.0);
            state.ledger.push(trade(i + 1, net));
        }
        let s = Summary::from_state(&state);
        assert_eq!(s.total_trades, 4);
        assert_eq!(s.winning_trades, 2);
        assert_eq!(s.losing_trades, 2);
        assert_eq!(s.win_rate, 50.0);
        assert_eq!(s.avg_win, 150.0);
        assert_eq!(s.avg_loss, -100.0);
        assert_eq!(s.largest_win, 200.0);
        assert_eq!(s.largest_loss, -150.0);
        assert!((s.total_return_pct - 1.0).abs() < 1e-12);
    }

    #[test]
    fn breakeven_trade_is_neither_win_nor_loss() {
        let mut state = PortfolioState::new(10_000.0);
        state.ledger.push(trade(1, 0.0));
        let s = Summary::from_state(&state);
        assert_eq!(s.winning_trades, 0);
        assert_eq!(s.losing_trades, 0);
    }
}
