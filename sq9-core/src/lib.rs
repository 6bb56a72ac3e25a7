//! sq9 core: Square-of-9 level trading engine.
//!
//! This crate contains:
//! - Domain types (bars, positions, closed trades, portfolio state)
//! - Level calculator and trade plans
//! - Cost model and risk-based position sizer
//! - Trade state machine and bar-by-bar simulation driver
//! - Buy-and-hold benchmark
//! - Market-data providers (Yahoo Finance, CSV, synthetic)

pub mod config;
pub mod costs;
pub mod data;
pub mod domain;
pub mod engine;
pub mod levels;
pub mod sizing;

pub use config::{BreakerPolicy, ConfigError, EntryMode, SessionConfig, TradeMode};
pub use costs::{CostBreakdown, CostModel};
pub use domain::{Bar, ClosedTrade, Direction, ExitReason, PartialExit, PortfolioState, Position};
pub use engine::{
    run_simulation, BarContext, BenchmarkComparison, BuyAndHold, Simulation, SimulationError,
    SimulationResult, Summary, TradeEvent,
};
pub use levels::{risk_reward, round2, LevelError, LevelSet, TradePlan};
pub use sizing::{size_position, RiskSizer, SizingError};
