//! Square-of-9 level calculator.
//!
//! All levels derive from one reference price `p` via `s = sqrt(p)`:
//! entry levels sit 1/12 of a root-step either side of `s`, targets step in
//! ninths, and breakout/support/resistance levels step in halves around
//! `ceil(s)`. Every level is rounded with [`round2`].

use crate::config::TradeMode;
use crate::domain::Direction;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum LevelError {
    #[error("reference price must be a positive finite number, got {0}")]
    InvalidPrice(f64),
}

/// Round to 2 decimal places, ties away from zero.
///
/// The single rounding rule for every level, plan and ratio in the crate.
pub fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// Every level derived from one reference price. Never mutated once computed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelSet {
    pub reference_price: f64,
    pub buy: f64,
    pub sell: f64,
    pub bull_targets: [f64; 9],
    pub bear_targets: [f64; 9],
    pub breakout: f64,
    pub resistances: [f64; 3],
    pub supports: [f64; 3],
}

/// Entry, stop and three targets for one mode/direction combination.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TradePlan {
    pub direction: Direction,
    pub entry: f64,
    pub stop_loss: f64,
    pub targets: [f64; 3],
}

impl LevelSet {
    pub fn compute(price: f64) -> Result<Self, LevelError> {
        if !price.is_finite() || price <= 0.0 {
            return Err(LevelError::InvalidPrice(price));
        }

        let s = price.sqrt();
        let sq = |x: f64| round2(x * x);

        let bull_targets = std::array::from_fn(|i| sq(s + (i + 1) as f64 / 9.0));
        // Clamp the root so deep bear targets on tiny prices stay at zero
        // instead of wrapping back up.
        let bear_targets = std::array::from_fn(|i| sq((s - (i + 1) as f64 / 9.0).max(0.0)));

        let b = s.ceil();
        let steps = [0.5, 1.0, 1.5];

        Ok(Self {
            reference_price: price,
            buy: sq(s + 1.0 / 12.0),
            sell: sq(s - 1.0 / 12.0),
            bull_targets,
            bear_targets,
            breakout: sq(b),
            resistances: steps.map(|x| sq(b + x)),
            supports: steps.map(|x| sq(b - x)),
        })
    }

    /// The three intraday targets for `direction` (T1..T3).
    pub fn near_targets(&self, direction: Direction) -> [f64; 3] {
        let src = match direction {
            Direction::Long => &self.bull_targets,
            Direction::Short => &self.bear_targets,
        };
        [src[0], src[1], src[2]]
    }

    pub fn plan(&self, mode: TradeMode, direction: Direction) -> TradePlan {
        let (entry, stop_loss, targets) = match (mode, direction) {
            (TradeMode::Intraday, Direction::Long) => {
                (self.buy, self.sell, self.near_targets(Direction::Long))
            }
            (TradeMode::Intraday, Direction::Short) => {
                (self.sell, self.buy, self.near_targets(Direction::Short))
            }
            (TradeMode::Swing, Direction::Long) => (self.buy, self.supports[0], self.resistances),
            (TradeMode::Swing, Direction::Short) => (self.sell, self.resistances[0], self.supports),
        };
        TradePlan {
            direction,
            entry,
            stop_loss,
            targets,
        }
    }
}

impl TradePlan {
    pub fn risk_reward(&self) -> [f64; 3] {
        risk_reward(self.direction, self.entry, self.stop_loss, &self.targets)
    }
}

/// Reward-to-risk ratio for each target, rounded to 2 places.
///
/// Risk is floored at 1e-9 and reward at 0, so a stop on the wrong side or a
/// target behind the entry yields 0 rather than a negative ratio.
pub fn risk_reward(direction: Direction, entry: f64, stop: f64, targets: &[f64; 3]) -> [f64; 3] {
    let risk = ((entry - stop) * direction.sign()).max(1e-9);
    targets.map(|t| round2(((t - entry) * direction.sign()).max(0.0) / risk))
}
