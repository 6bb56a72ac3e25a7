//! PortfolioState: capital, the open position and the trade ledger for one symbol.

use super::position::Position;
use super::trade::ClosedTrade;
use serde::{Deserialize, Serialize};

/// Mutable aggregate owned by a single simulation context.
///
/// `capital` changes only when a partial exit or a full close is realized.
/// Replaying the ledger from `initial_capital` must reproduce `capital`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioState {
    pub capital: f64,
    pub initial_capital: f64,
    pub open_position: Option<Position>,
    pub ledger: Vec<ClosedTrade>,
    pub cumulative_pnl: f64,
    pub total_costs: f64,
    pub total_brokerage: f64,
}

impl PortfolioState {
    pub fn new(initial_capital: f64) -> Self {
        Self {
            capital: initial_capital,
            initial_capital,
            open_position: None,
            ledger: Vec::new(),
            cumulative_pnl: 0.0,
            total_costs: 0.0,
            total_brokerage: 0.0,
        }
    }

    pub fn is_flat(&self) -> bool {
        self.open_position.is_none()
    }

    /// Realize one leg: apply net P&L to capital and accumulate costs.
    pub fn realize(&mut self, net_pnl: f64, costs: f64, brokerage: f64) {
        self.capital += net_pnl;
        self.cumulative_pnl += net_pnl;
        self.total_costs += costs;
        self.total_brokerage += brokerage;
    }

    /// Capital level at or below which trading stops.
    pub fn loss_floor(&self, max_total_loss_pct: f64) -> f64 {
        self.initial_capital * (1.0 - max_total_loss_pct / 100.0)
    }

    pub fn breaker_tripped(&self, max_total_loss_pct: f64) -> bool {
        self.capital <= self.loss_floor(max_total_loss_pct)
    }

    /// Capital obtained by replaying the ledger from the initial capital.
    ///
    /// Partial legs of a still-open position are realized into `capital`
    /// but not yet in the ledger; they are added separately.
    pub fn replayed_capital(&self) -> f64 {
        let closed: f64 = self.ledger.iter().map(|t| t.net_pnl).sum();
        let open_partials = self
            .open_position
            .as_ref()
            .map(|p| p.realized_net())
            .unwrap_or(0.0);
        self.initial_capital + closed + open_partials
    }

    /// Capital plus the unrealized P&L of any open remainder marked at `mark`.
    pub fn equity(&self, mark: f64) -> f64 {
        self.capital
            + self
                .open_position
                .as_ref()
                .map(|p| p.unrealized_pnl(mark))
                .unwrap_or(0.0)
    }
}
