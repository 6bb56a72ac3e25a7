//! Position: an open trade, owned by the trade state machine from entry fill to full close.

use super::trade::PartialExit;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Trade direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    /// +1 for long, -1 for short. Multiplies a price move into P&L per share.
    pub fn sign(self) -> f64 {
        match self {
            Direction::Long => 1.0,
            Direction::Short => -1.0,
        }
    }

    /// P&L of `quantity` shares moving from `entry` to `exit`.
    pub fn pnl(self, entry: f64, exit: f64, quantity: u64) -> f64 {
        (exit - entry) * self.sign() * quantity as f64
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Long => write!(f, "Long"),
            Direction::Short => write!(f, "Short"),
        }
    }
}

/// An open position.
///
/// `remaining_quantity` only ever decreases; `partial_exits` is append-only.
/// `next_target` is the index of the first target not yet consumed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub direction: Direction,
    pub entry_price: f64,
    pub entry_time: NaiveDateTime,
    pub quantity: u64,
    pub stop_loss: f64,
    pub targets: [f64; 3],
    pub remaining_quantity: u64,
    pub partial_exits: Vec<PartialExit>,
    pub next_target: usize,
}

impl Position {
    pub fn open(
        direction: Direction,
        entry_price: f64,
        entry_time: NaiveDateTime,
        quantity: u64,
        stop_loss: f64,
        targets: [f64; 3],
    ) -> Self {
        Self {
            direction,
            entry_price,
            entry_time,
            quantity,
            stop_loss,
            targets,
            remaining_quantity: quantity,
            partial_exits: Vec::new(),
            next_target: 0,
        }
    }

    /// Unrealized P&L of the open remainder, before costs.
    pub fn unrealized_pnl(&self, mark: f64) -> f64 {
        self.direction
            .pnl(self.entry_price, mark, self.remaining_quantity)
    }

    /// Whether the stop has been breached within `[low, high]`.
    pub fn stop_hit(&self, low: f64, high: f64) -> bool {
        match self.direction {
            Direction::Long => low <= self.stop_loss,
            Direction::Short => high >= self.stop_loss,
        }
    }

    /// Whether target `index` has been reached within `[low, high]`.
    pub fn target_hit(&self, index: usize, low: f64, high: f64) -> bool {
        let target = self.targets[index];
        match self.direction {
            Direction::Long => high >= target,
            Direction::Short => low <= target,
        }
    }

    /// Realized net P&L so far across partial exits.
    pub fn realized_net(&self) -> f64 {
        self.partial_exits.iter().map(|p| p.net_pnl).sum()
    }

    pub fn has_partials(&self) -> bool {
        !self.partial_exits.is_empty()
    }
}
