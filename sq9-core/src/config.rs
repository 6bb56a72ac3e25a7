//! Session configuration: validated once at session start.

use crate::costs::CostModel;
use crate::domain::Direction;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub const RISK_PCT_RANGE: (f64, f64) = (0.5, 10.0);
pub const MAX_LOSS_PCT_RANGE: (f64, f64) = (5.0, 50.0);

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("symbol must not be empty")]
    EmptySymbol,

    #[error("initial capital must be positive, got {0}")]
    NonPositiveCapital(f64),

    #[error("{field} = {value} is outside [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("cost parameter {0} must be finite and >= 0")]
    InvalidCost(&'static str),

    #[error("failed to parse session config: {0}")]
    Parse(String),
}

/// Holding style: intraday positions close at end of day; swing positions carry over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeMode {
    #[default]
    Intraday,
    Swing,
}

impl fmt::Display for TradeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeMode::Intraday => write!(f, "Intraday"),
            TradeMode::Swing => write!(f, "Swing"),
        }
    }
}

/// How a flat machine decides to enter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryMode {
    /// Fill at the entry level once a bar's range touches it.
    #[default]
    WaitForLevel,
    /// Fill at the bar open when the open is already on the right side of the entry level.
    Immediate,
}

/// What the circuit breaker does with an open position when it trips.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakerPolicy {
    /// Stop processing; leave any open position for manual closure.
    #[default]
    Halt,
    /// Stop processing and close any open position at the last known price.
    ForceClose,
}

/// Full per-session configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub symbol: String,
    pub direction: Direction,
    pub trade_mode: TradeMode,
    pub entry_mode: EntryMode,
    pub initial_capital: f64,
    pub risk_pct: f64,
    pub max_total_loss_pct: f64,
    pub costs: CostModel,
    /// Swing only: re-derive levels from the previous close on each new day.
    pub daily_recalc: bool,
    /// When false, no new entry is taken after the first trade closes.
    pub multiple_trades: bool,
    pub breaker_policy: BreakerPolicy,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            symbol: String::new(),
            direction: Direction::Long,
            trade_mode: TradeMode::Intraday,
            entry_mode: EntryMode::WaitForLevel,
            initial_capital: 100_000.0,
            risk_pct: 2.0,
            max_total_loss_pct: 10.0,
            costs: CostModel::default(),
            daily_recalc: false,
            multiple_trades: true,
            breaker_policy: BreakerPolicy::Halt,
        }
    }
}

impl SessionConfig {
    pub fn new(symbol: impl Into<String>, direction: Direction, trade_mode: TradeMode) -> Self {
        Self {
            symbol: symbol.into(),
            direction,
            trade_mode,
            ..Self::default()
        }
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.symbol.trim().is_empty() {
            return Err(ConfigError::EmptySymbol);
        }
        if !self.initial_capital.is_finite() || self.initial_capital <= 0.0 {
            return Err(ConfigError::NonPositiveCapital(self.initial_capital));
        }
        check_range("risk_pct", self.risk_pct, RISK_PCT_RANGE)?;
        check_range(
            "max_total_loss_pct",
            self.max_total_loss_pct,
            MAX_LOSS_PCT_RANGE,
        )?;
        if let Some(field) = self.costs.invalid_field() {
            return Err(ConfigError::InvalidCost(field));
        }
        Ok(())
    }

    /// Validate and apply mode-dependent overrides.
    ///
    /// Intraday always allows multiple trades; daily recalculation is a swing-only flag.
    pub fn normalized(mut self) -> Result<Self, ConfigError> {
        self.validate()?;
        self.symbol = self.symbol.trim().to_uppercase();
        if self.trade_mode == TradeMode::Intraday {
            self.multiple_trades = true;
            self.daily_recalc = false;
        }
        Ok(self)
    }
}

fn check_range(field: &'static str, value: f64, (min, max): (f64, f64)) -> Result<(), ConfigError> {
    if !(min..=max).contains(&value) {
        return Err(ConfigError::OutOfRange {
            field,
            value,
            min,
            max,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_with_symbol_is_valid() {
        let cfg = SessionConfig::new("RELIANCE.NS", Direction::Long, TradeMode::Intraday);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn rejects_empty_symbol() {
        let cfg = SessionConfig::default();
        assert_eq!(cfg.validate(), Err(ConfigError::EmptySymbol));
    }

    #[test]
    fn rejects_non_positive_capital() {
        let mut cfg = SessionConfig::new("X", Direction::Long, TradeMode::Swing);
        cfg.initial_capital = 0.0;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::NonPositiveCapital(_))
        ));
    }

    #[test]
    fn rejects_risk_outside_range() {
        let mut cfg = SessionConfig::new("X", Direction::Long, TradeMode::Swing);
        cfg.risk_pct = 12.0;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::OutOfRange { field: "risk_pct", .. })
        ));
        cfg.risk_pct = 0.5;
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn rejects_max_loss_outside_range() {
        let mut cfg = SessionConfig::new("X", Direction::Short, TradeMode::Swing);
        cfg.max_total_loss_pct = 4.9;
        assert!(cfg.validate().is_err());
        cfg.max_total_loss_pct = 50.0;
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn rejects_negative_cost() {
        let mut cfg = SessionConfig::new("X", Direction::Long, TradeMode::Swing);
        cfg.costs.gst_pct = -1.0;
        assert_eq!(cfg.validate(), Err(ConfigError::InvalidCost("gst_pct")));
    }

    #[test]
    fn intraday_forces_multiple_trades() {
        let mut cfg = SessionConfig::new(" tcs.ns ", Direction::Long, TradeMode::Intraday);
        cfg.multiple_trades = false;
        cfg.daily_recalc = true;
        let cfg = cfg.normalized().unwrap();
        assert!(cfg.multiple_trades);
        assert!(!cfg.daily_recalc);
        assert_eq!(cfg.symbol, "TCS.NS");
    }

    #[test]
    fn swing_keeps_flags() {
        let mut cfg = SessionConfig::new("X", Direction::Long, TradeMode::Swing);
        cfg.multiple_trades = false;
        cfg.daily_recalc = true;
        let cfg = cfg.normalized().unwrap();
        assert!(!cfg.multiple_trades);
        assert!(cfg.daily_recalc);
    }

    #[test]
    fn parses_from_toml() {
        let toml = r#"
            symbol = "INFY.NS"
            direction = "short"
            trade_mode = "swing"
            entry_mode = "immediate"
            initial_capital = 50000.0
            risk_pct = 1.5
            breaker_policy = "force_close"

            [costs]
            broker_per_order = 15.0
            stt_pct = 0.1
            txn_pct = 0.00325
            gst_pct = 18.0
        "#;
        let cfg = SessionConfig::from_toml(toml).unwrap();
        assert_eq!(cfg.direction, Direction::Short);
        assert_eq!(cfg.trade_mode, TradeMode::Swing);
        assert_eq!(cfg.entry_mode, EntryMode::Immediate);
        assert_eq!(cfg.breaker_policy, BreakerPolicy::ForceClose);
        assert_eq!(cfg.costs.broker_per_order, 15.0);
        assert_eq!(cfg.max_total_loss_pct, 10.0);
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        assert!(matches!(
            SessionConfig::from_toml("symbol = ["),
            Err(ConfigError::Parse(_))
        ));
    }
}
