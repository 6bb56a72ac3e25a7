//! Domain types shared by the engine, the runner and the report layer.

pub mod bar;
pub mod portfolio;
pub mod position;
pub mod trade;

pub use bar::Bar;
pub use portfolio::PortfolioState;
pub use position::{Direction, Position};
pub use trade::{ClosedTrade, ExitReason, PartialExit};
