//! Closed trades and partial exit legs.

use super::position::Direction;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One partial (or final) exit leg at a profit target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartialExit {
    pub time: NaiveDateTime,
    /// 1-based target number.
    pub target: usize,
    pub price: f64,
    pub quantity: u64,
    pub gross_pnl: f64,
    pub costs: f64,
    pub net_pnl: f64,
}

/// Why a position was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    StopLoss,
    /// All targets consumed; carries the 1-based number of the final target.
    AllTargets(usize),
    EndOfDay,
    EndOfWindow,
    ManualClose,
    CircuitBreaker,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitReason::StopLoss => write!(f, "Stop Loss Hit"),
            ExitReason::AllTargets(n) => write!(f, "All Targets Hit (Final: T{n})"),
            ExitReason::EndOfDay => write!(f, "EOD Exit"),
            ExitReason::EndOfWindow => write!(f, "Position Open (Exited at Close)"),
            ExitReason::ManualClose => write!(f, "Manual Close"),
            ExitReason::CircuitBreaker => write!(f, "Circuit Breaker Close"),
        }
    }
}

/// A fully closed trade in the ledger.
///
/// `gross_pnl`, `costs` and `net_pnl` aggregate every leg, partial exits
/// included, so summing `net_pnl` over the ledger reproduces the capital change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosedTrade {
    pub trade_number: usize,
    pub direction: Direction,
    pub entry_price: f64,
    pub entry_time: NaiveDateTime,
    /// Price of the final leg.
    pub exit_price: f64,
    pub exit_time: NaiveDateTime,
    pub quantity: u64,
    pub gross_pnl: f64,
    pub costs: f64,
    pub net_pnl: f64,
    pub reason: ExitReason,
    /// Display string of `reason`.
    pub result: String,
    pub capital_after: f64,
    pub partial_exits: Vec<PartialExit>,
}

impl ClosedTrade {
    pub fn is_winner(&self) -> bool {
        self.net_pnl > 0.0
    }

    /// Net return as a fraction of the entry notional.
    pub fn return_pct(&self) -> f64 {
        if self.entry_price == 0.0 || self.quantity == 0 {
            return 0.0;
        }
        self.net_pnl / (self.entry_price * self.quantity as f64)
    }
}
