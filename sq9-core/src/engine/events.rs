//! Events emitted by a simulation step.
//!
//! The live driver logs and forwards these instead of diffing portfolio state.

use crate::domain::{ClosedTrade, Direction, PartialExit};
use crate::levels::TradePlan;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TradeEvent {
    LevelsRecalculated {
        time: NaiveDateTime,
        reference_price: f64,
        plan: TradePlan,
    },
    Entered {
        time: NaiveDateTime,
        direction: Direction,
        price: f64,
        quantity: u64,
        stop_loss: f64,
        targets: [f64; 3],
    },
    EntrySkipped {
        time: NaiveDateTime,
        reason: String,
    },
    PartialExit(PartialExit),
    Closed(ClosedTrade),
    CircuitBreakerTripped {
        time: NaiveDateTime,
        capital: f64,
        floor: f64,
    },
}
