//! Records produced alongside the ledger, and the finished run result.

use crate::config::SessionConfig;
use crate::domain::{ClosedTrade, PortfolioState, Position};
use crate::levels::TradePlan;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::summary::Summary;

/// A level set adoption: when, from which reference price, and the resulting plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelSnapshot {
    pub time: NaiveDateTime,
    pub reference_price: f64,
    pub plan: TradePlan,
}

/// Capital and mark-to-market equity after a bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub time: NaiveDateTime,
    pub capital: f64,
    pub equity: f64,
}

/// Why and where the loss circuit breaker stopped the run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BreakerTrip {
    pub time: NaiveDateTime,
    pub capital: f64,
    pub floor: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationResult {
    pub config: SessionConfig,
    pub summary: Summary,
    pub ledger: Vec<ClosedTrade>,
    /// Left open only when the circuit breaker halted the run under the `Halt` policy.
    pub open_position: Option<Position>,
    pub level_history: Vec<LevelSnapshot>,
    pub equity_curve: Vec<EquityPoint>,
    pub halted: Option<BreakerTrip>,
    pub bars_processed: usize,
    pub final_state: PortfolioState,
}

impl SimulationResult {
    pub fn final_capital(&self) -> f64 {
        self.final_state.capital
    }

    pub fn was_halted(&self) -> bool {
        self.halted.is_some()
    }
}
