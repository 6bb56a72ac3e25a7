//! Risk-budget position sizing.
//!
//! # Formula
//! ```text
//! risk_per_share = |entry - stop|
//! quantity       = floor(capital * risk_pct / 100 / risk_per_share)
//! quantity       = clamp(quantity, 1, floor(capital / entry))
//! ```
//!
//! # Example
//! - Capital: 100,000
//! - Risk per trade: 2% (2,000)
//! - Entry 101.67, stop 98.34 (3.33 per share)
//! - Quantity: floor(2,000 / 3.33) = 600 shares, affordable cap 983

use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum SizingError {
    #[error("capital {capital:.2} cannot afford one share at {price:.2}")]
    InsufficientCapital { capital: f64, price: f64 },

    #[error("entry price must be positive, got {0}")]
    InvalidEntry(f64),
}

/// Fixed-fraction risk sizer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskSizer {
    /// Percent of available capital risked per trade (2.0 = 2 %).
    risk_pct: f64,
}

impl RiskSizer {
    pub fn new(risk_pct: f64) -> Self {
        Self { risk_pct }
    }

    pub fn risk_pct(&self) -> f64 {
        self.risk_pct
    }

    pub fn size(&self, capital: f64, entry: f64, stop: f64) -> Result<u64, SizingError> {
        size_position(capital, self.risk_pct, entry, stop)
    }
}

/// Share quantity for a trade entered at `entry` with stop at `stop`.
///
/// A zero-risk level (entry == stop) falls back to the affordable maximum.
pub fn size_position(capital: f64, risk_pct: f64, entry: f64, stop: f64) -> Result<u64, SizingError> {
    if !entry.is_finite() || entry <= 0.0 {
        return Err(SizingError::InvalidEntry(entry));
    }
    if capital.is_nan() || capital < entry {
        return Err(SizingError::InsufficientCapital {
            capital,
            price: entry,
        });
    }

    let affordable = (capital / entry).floor() as u64;
    let risk_per_share = (entry - stop).abs();

    if risk_per_share > 0.0 {
        let by_risk = (capital * risk_pct / 100.0 / risk_per_share).floor() as u64;
        Ok(by_risk.clamp(1, affordable))
    } else {
        Ok(affordable)
    }
}
