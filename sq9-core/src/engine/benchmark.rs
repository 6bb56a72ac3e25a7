//! Passive buy-and-hold over the same bars, for relative evaluation.

use crate::costs::CostModel;
use crate::domain::Bar;
use serde::{Deserialize, Serialize};

use super::summary::Summary;

/// One buy at the first open, one sell at the last close, costed once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuyAndHold {
    pub entry_price: f64,
    pub exit_price: f64,
    pub shares: u64,
    pub investment: f64,
    pub gross_pnl: f64,
    pub costs: f64,
    pub net_pnl: f64,
    pub final_value: f64,
    /// Net P&L as a percent of the invested amount (shares x entry price).
    pub return_pct: f64,
}

impl BuyAndHold {
    /// `None` for an empty series or when capital cannot buy a single share.
    pub fn compute(bars: &[Bar], initial_capital: f64, costs: &CostModel) -> Option<Self> {
        let entry_price = bars.first()?.open;
        let exit_price = bars.last()?.close;
        if entry_price <= 0.0 {
            return None;
        }
        let shares = (initial_capital / entry_price).floor() as u64;
        if shares == 0 {
            return None;
        }

        let investment = shares as f64 * entry_price;
        let gross_pnl = shares as f64 * exit_price - investment;
        let cost = costs.compute(entry_price, exit_price, shares).total;
        let net_pnl = gross_pnl - cost;

        Some(Self {
            entry_price,
            exit_price,
            shares,
            investment,
            gross_pnl,
            costs: cost,
            net_pnl,
            final_value: investment + net_pnl,
            return_pct: net_pnl / investment * 100.0,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkComparison {
    /// Strategy return % minus buy-and-hold return %.
    pub return_difference: f64,
    pub outperformed: bool,
    /// Strategy costs minus buy-and-hold costs.
    pub cost_difference: f64,
    /// Strategy net P&L minus buy-and-hold net P&L.
    pub pnl_difference: f64,
}

impl BenchmarkComparison {
    pub fn new(strategy: &Summary, benchmark: &BuyAndHold) -> Self {
        Self {
            return_difference: strategy.total_return_pct - benchmark.return_pct,
            outperformed: strategy.total_return_pct > benchmark.return_pct,
            cost_difference: strategy.total_costs - benchmark.costs,
            pnl_difference: strategy.cumulative_pnl - benchmark.net_pnl,
        }
    }
}
