//! Simulation engine: trade state machine, bar driver, summary and benchmark.
//!
//! The driver consumes ordered bars one at a time and runs five phases per bar:
//!
//! 1. Circuit breaker check against the loss floor
//! 2. Level recalculation (flat, new trading day)
//! 3. Trade state machine: exits or entry detection
//! 4. Intraday end-of-day forced close
//! 5. Bookkeeping: previous close, equity curve

pub mod benchmark;
pub mod driver;
pub mod events;
pub mod machine;
pub mod state;
pub mod summary;

pub use benchmark::{BenchmarkComparison, BuyAndHold};
pub use driver::{run_simulation, BarContext, Simulation, SimulationError};
pub use events::TradeEvent;
pub use machine::TradeMachine;
pub use state::{BreakerTrip, EquityPoint, LevelSnapshot, SimulationResult};
pub use summary::Summary;
