//! Simulation driver: owns the portfolio and the current level set and
//! feeds bars through the trade state machine.
//!
//! Phases per bar:
//! 1. Circuit breaker: stop once capital is at or below the loss floor
//! 2. Levels: close an intraday position left over from an earlier day,
//!    then adopt a new level set when flat on a new trading day
//! 3. State machine: exits for an open position, otherwise entry detection
//! 4. End of day: intraday positions close at the last bar's close
//! 5. Bookkeeping: previous close, equity curve
//!
//! The driver has no clock. Backtests call [`run_simulation`]; the live
//! session calls [`Simulation::step`] once per newly observed bar.

use crate::config::{BreakerPolicy, ConfigError, SessionConfig, TradeMode};
use crate::domain::{Bar, ExitReason, PortfolioState};
use crate::levels::{LevelError, LevelSet, TradePlan};
use chrono::{NaiveDate, NaiveDateTime};
use thiserror::Error;
use tracing::{debug, info};

use super::events::TradeEvent;
use super::machine::TradeMachine;
use super::state::{BreakerTrip, EquityPoint, LevelSnapshot, SimulationResult};
use super::summary::Summary;

#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("level computation failed: {0}")]
    Level(#[from] LevelError),

    #[error("no bars to simulate")]
    NoData,

    #[error("bar at {current} is not after the previous bar at {previous}")]
    OutOfOrder {
        previous: NaiveDateTime,
        current: NaiveDateTime,
    },

    #[error("malformed bar at {0}")]
    InvalidBar(NaiveDateTime),
}

/// Caller-supplied facts about a bar that the driver cannot know on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BarContext {
    /// Last bar of its trading day. Triggers the intraday EOD close.
    pub is_last_of_day: bool,
    /// False outside the trading window; exits still run.
    pub entries_allowed: bool,
}

impl BarContext {
    pub fn new(is_last_of_day: bool) -> Self {
        Self {
            is_last_of_day,
            entries_allowed: true,
        }
    }
}

/// One symbol's simulation context.
#[derive(Debug, Clone)]
pub struct Simulation {
    config: SessionConfig,
    machine: TradeMachine,
    state: PortfolioState,
    levels: Option<LevelSet>,
    plan: Option<TradePlan>,
    levels_day: Option<NaiveDate>,
    prev_close: Option<f64>,
    last_time: Option<NaiveDateTime>,
    entries_stopped: bool,
    halted: Option<BreakerTrip>,
    level_history: Vec<LevelSnapshot>,
    equity_curve: Vec<EquityPoint>,
    bars_processed: usize,
}

impl Simulation {
    pub fn new(config: SessionConfig) -> Result<Self, SimulationError> {
        let config = config.normalized()?;
        Ok(Self {
            machine: TradeMachine::from_config(&config),
            state: PortfolioState::new(config.initial_capital),
            config,
            levels: None,
            plan: None,
            levels_day: None,
            prev_close: None,
            last_time: None,
            entries_stopped: false,
            halted: None,
            level_history: Vec::new(),
            equity_curve: Vec::new(),
            bars_processed: 0,
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn state(&self) -> &PortfolioState {
        &self.state
    }

    pub fn levels(&self) -> Option<&LevelSet> {
        self.levels.as_ref()
    }

    pub fn plan(&self) -> Option<&TradePlan> {
        self.plan.as_ref()
    }

    pub fn is_halted(&self) -> bool {
        self.halted.is_some()
    }

    /// Close of the most recently processed bar.
    pub fn last_price(&self) -> Option<f64> {
        self.prev_close
    }

    pub fn last_time(&self) -> Option<NaiveDateTime> {
        self.last_time
    }

    pub fn bars_processed(&self) -> usize {
        self.bars_processed
    }

    /// Block all further entries. Exits keep running.
    pub fn stop_entries(&mut self) {
        self.entries_stopped = true;
    }

    pub fn entries_stopped(&self) -> bool {
        self.entries_stopped
    }

    /// Process one bar.
    ///
    /// Errors leave the context exactly as it was. After the breaker has
    /// tripped every call is a no-op that returns no events.
    pub fn step(&mut self, bar: &Bar, ctx: BarContext) -> Result<Vec<TradeEvent>, SimulationError> {
        let mut events = Vec::new();
        if self.halted.is_some() {
            return Ok(events);
        }
        if !bar.is_sane() {
            return Err(SimulationError::InvalidBar(bar.timestamp));
        }
        if let Some(previous) = self.last_time {
            if bar.timestamp <= previous {
                return Err(SimulationError::OutOfOrder {
                    previous,
                    current: bar.timestamp,
                });
            }
        }

        // ─── Phase 1: Circuit breaker ───
        if self.check_breaker(bar.timestamp, &mut events) {
            return Ok(events);
        }

        // ─── Phase 2: Levels ───
        if self.config.trade_mode == TradeMode::Intraday
            && self.last_time.map_or(false, |t| t.date() != bar.trading_day())
        {
            // The previous day's last bar was never marked; close at its last close.
            if let (Some(price), Some(time)) = (self.prev_close, self.last_time) {
                self.close_for_day(price, time, &mut events);
            }
        }
        self.refresh_levels(bar, &mut events)?;

        // ─── Phase 3: State machine ───
        if !self.state.is_flat() {
            self.machine.evaluate_exits(&mut self.state, bar, &mut events);
        } else if self.entries_permitted(ctx) {
            if let Some(plan) = self.plan {
                let entered = self.machine.try_enter(&mut self.state, &plan, bar, &mut events);
                if entered && self.config.trade_mode == TradeMode::Intraday {
                    self.machine.evaluate_exits(&mut self.state, bar, &mut events);
                }
            }
        }

        // ─── Phase 4: End of day ───
        if self.config.trade_mode == TradeMode::Intraday && ctx.is_last_of_day {
            self.close_for_day(bar.close, bar.timestamp, &mut events);
        }

        // ─── Phase 5: Bookkeeping ───
        self.prev_close = Some(bar.close);
        self.last_time = Some(bar.timestamp);
        self.bars_processed += 1;
        self.equity_curve.push(EquityPoint {
            time: bar.timestamp,
            capital: self.state.capital,
            equity: self.state.equity(bar.close),
        });

        Ok(events)
    }

    /// Close any open position at the last known price.
    pub fn close_at_last(&mut self, reason: ExitReason) -> Vec<TradeEvent> {
        let mut events = Vec::new();
        if let (Some(price), Some(time)) = (self.prev_close, self.last_time) {
            self.machine
                .force_close(&mut self.state, price, time, reason, &mut events);
        }
        events
    }

    /// End of window: apply a final breaker check, close any open position
    /// at the last close (unless halted under `Halt`), and build the result.
    pub fn finish(mut self) -> SimulationResult {
        if self.halted.is_none() {
            if let Some(time) = self.last_time {
                let mut events = Vec::new();
                self.check_breaker(time, &mut events);
            }
        }
        if self.halted.is_none() {
            self.close_at_last(ExitReason::EndOfWindow);
        }
        self.into_result()
    }

    /// Build the result as-is, leaving any open position open.
    pub fn into_result(self) -> SimulationResult {
        SimulationResult {
            summary: Summary::from_state(&self.state),
            ledger: self.state.ledger.clone(),
            open_position: self.state.open_position.clone(),
            level_history: self.level_history,
            equity_curve: self.equity_curve,
            halted: self.halted,
            bars_processed: self.bars_processed,
            final_state: self.state,
            config: self.config,
        }
    }

    /// Intraday end-of-day close of whatever is still open.
    fn close_for_day(&mut self, price: f64, time: NaiveDateTime, events: &mut Vec<TradeEvent>) {
        let Some(pos) = &self.state.open_position else {
            return;
        };
        let reason = if pos.has_partials() {
            ExitReason::EndOfDay
        } else {
            ExitReason::EndOfWindow
        };
        self.machine
            .force_close(&mut self.state, price, time, reason, events);
    }

    fn entries_permitted(&self, ctx: BarContext) -> bool {
        ctx.entries_allowed
            && !self.entries_stopped
            && (self.config.multiple_trades || self.state.ledger.is_empty())
    }

    /// Returns true if the breaker is (now) tripped.
    fn check_breaker(&mut self, time: NaiveDateTime, events: &mut Vec<TradeEvent>) -> bool {
        if !self.state.breaker_tripped(self.config.max_total_loss_pct) {
            return false;
        }
        let trip = BreakerTrip {
            time,
            capital: self.state.capital,
            floor: self.state.loss_floor(self.config.max_total_loss_pct),
        };
        info!(
            time = %time,
            capital = trip.capital,
            floor = trip.floor,
            policy = ?self.config.breaker_policy,
            "circuit breaker tripped, halting"
        );
        events.push(TradeEvent::CircuitBreakerTripped {
            time,
            capital: trip.capital,
            floor: trip.floor,
        });
        self.halted = Some(trip);

        if self.config.breaker_policy == BreakerPolicy::ForceClose {
            events.extend(self.close_at_last(ExitReason::CircuitBreaker));
        }
        true
    }

    fn refresh_levels(&mut self, bar: &Bar, events: &mut Vec<TradeEvent>) -> Result<(), SimulationError> {
        let day = bar.trading_day();
        let reference = match (&self.levels, self.config.trade_mode) {
            (None, _) => Some(bar.open),
            _ if !self.state.is_flat() || self.levels_day == Some(day) => None,
            (Some(_), TradeMode::Intraday) => Some(bar.open),
            (Some(_), TradeMode::Swing) if self.config.daily_recalc => {
                Some(self.prev_close.unwrap_or(bar.open))
            }
            (Some(_), TradeMode::Swing) => None,
        };
        let Some(reference) = reference else {
            return Ok(());
        };

        let levels = LevelSet::compute(reference)?;
        let plan = levels.plan(self.config.trade_mode, self.config.direction);
        debug!(
            time = %bar.timestamp,
            reference,
            entry = plan.entry,
            stop = plan.stop_loss,
            "levels recalculated"
        );
        self.level_history.push(LevelSnapshot {
            time: bar.timestamp,
            reference_price: reference,
            plan,
        });
        events.push(TradeEvent::LevelsRecalculated {
            time: bar.timestamp,
            reference_price: reference,
            plan,
        });
        self.levels = Some(levels);
        self.plan = Some(plan);
        self.levels_day = Some(day);
        Ok(())
    }
}

/// Run a full backtest over an ordered bar series.
///
/// A bar is the last of its day when the next bar falls on a different
/// trading day, or when it is the final bar.
pub fn run_simulation(config: SessionConfig, bars: &[Bar]) -> Result<SimulationResult, SimulationError> {
    let mut sim = Simulation::new(config)?;
    if bars.is_empty() {
        return Err(SimulationError::NoData);
    }
    info!(
        symbol = %sim.config().symbol,
        bars = bars.len(),
        mode = %sim.config().trade_mode,
        direction = %sim.config().direction,
        "simulation started"
    );

    for (i, bar) in bars.iter().enumerate() {
        let is_last_of_day = bars
            .get(i + 1)
            .map_or(true, |next| next.trading_day() != bar.trading_day());
        sim.step(bar, BarContext::new(is_last_of_day))?;
        if sim.is_halted() {
            break;
        }
    }

    let result = sim.finish();
    info!(
        trades = result.summary.total_trades,
        final_capital = result.summary.final_capital,
        return_pct = result.summary.total_return_pct,
        halted = result.was_halted(),
        "simulation finished"
    );
    Ok(result)
}
