//! Trade state machine: Flat / Open transitions for one symbol.
//!
//! Per bar, once levels are fixed:
//! 1. Flat: detect the entry trigger, size the position, open it.
//! 2. Open: stop-loss first, then targets in order. T1 and T2 close a third
//!    of the remainder (at least one share), T3 closes the rest.
//! 3. Forced close at a caller-supplied price (end of day, end of window,
//!    manual, circuit breaker).
//!
//! Every realized leg is costed on its own and applied to capital immediately.

use crate::config::{EntryMode, SessionConfig};
use crate::costs::CostModel;
use crate::domain::{Bar, ClosedTrade, Direction, ExitReason, PartialExit, PortfolioState, Position};
use crate::levels::TradePlan;
use crate::sizing::{RiskSizer, SizingError};
use chrono::NaiveDateTime;
use tracing::{debug, info, warn};

use super::events::TradeEvent;

/// Realized result of one exit leg.
#[derive(Debug, Clone, Copy)]
struct Leg {
    gross: f64,
    costs: f64,
    net: f64,
}

#[derive(Debug, Clone)]
pub struct TradeMachine {
    direction: Direction,
    entry_mode: EntryMode,
    sizer: RiskSizer,
    costs: CostModel,
}

impl TradeMachine {
    pub fn new(direction: Direction, entry_mode: EntryMode, sizer: RiskSizer, costs: CostModel) -> Self {
        Self {
            direction,
            entry_mode,
            sizer,
            costs,
        }
    }

    pub fn from_config(config: &SessionConfig) -> Self {
        Self::new(
            config.direction,
            config.entry_mode,
            RiskSizer::new(config.risk_pct),
            config.costs,
        )
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Fill price if `bar` triggers an entry at `entry_level`.
    pub fn entry_fill(&self, entry_level: f64, bar: &Bar) -> Option<f64> {
        match self.entry_mode {
            EntryMode::WaitForLevel => bar.touches(entry_level).then_some(entry_level),
            EntryMode::Immediate => {
                let favourable = match self.direction {
                    Direction::Long => bar.open <= entry_level,
                    Direction::Short => bar.open >= entry_level,
                };
                favourable.then_some(bar.open)
            }
        }
    }

    /// Open a position if flat and the bar triggers the plan's entry.
    ///
    /// Returns true if a position was opened. A sizing failure leaves the
    /// state untouched and emits `EntrySkipped`.
    pub fn try_enter(
        &self,
        state: &mut PortfolioState,
        plan: &TradePlan,
        bar: &Bar,
        events: &mut Vec<TradeEvent>,
    ) -> bool {
        if !state.is_flat() {
            return false;
        }
        let Some(fill) = self.entry_fill(plan.entry, bar) else {
            return false;
        };

        let quantity = match self.sizer.size(state.capital, fill, plan.stop_loss) {
            Ok(q) if q > 0 => q,
            Ok(_) => {
                debug!(time = %bar.timestamp, fill, "entry sized to zero shares");
                events.push(TradeEvent::EntrySkipped {
                    time: bar.timestamp,
                    reason: "sized to zero shares".into(),
                });
                return false;
            }
            Err(e) => {
                if matches!(e, SizingError::InsufficientCapital { .. }) {
                    warn!(time = %bar.timestamp, capital = state.capital, fill, "entry skipped: {e}");
                }
                events.push(TradeEvent::EntrySkipped {
                    time: bar.timestamp,
                    reason: e.to_string(),
                });
                return false;
            }
        };

        let position = Position::open(
            self.direction,
            fill,
            bar.timestamp,
            quantity,
            plan.stop_loss,
            plan.targets,
        );
        info!(
            time = %bar.timestamp,
            direction = %self.direction,
            price = fill,
            quantity,
            stop = plan.stop_loss,
            "entered position"
        );
        events.push(TradeEvent::Entered {
            time: bar.timestamp,
            direction: self.direction,
            price: fill,
            quantity,
            stop_loss: plan.stop_loss,
            targets: plan.targets,
        });
        state.open_position = Some(position);
        true
    }

    /// Run stop-loss then target checks for the open position against `bar`.
    pub fn evaluate_exits(&self, state: &mut PortfolioState, bar: &Bar, events: &mut Vec<TradeEvent>) {
        let Some(mut pos) = state.open_position.take() else {
            return;
        };

        // Stop wins any same-bar tie with a target.
        if pos.stop_hit(bar.low, bar.high) {
            let stop = pos.stop_loss;
            self.close(state, pos, stop, bar.timestamp, ExitReason::StopLoss, events);
            return;
        }

        while pos.next_target < pos.targets.len() && pos.target_hit(pos.next_target, bar.low, bar.high) {
            let index = pos.next_target;
            let price = pos.targets[index];
            let quantity = if index + 1 < pos.targets.len() {
                (pos.remaining_quantity / 3).max(1)
            } else {
                pos.remaining_quantity
            };

            let leg = self.realize_leg(state, &pos, price, quantity);
            pos.remaining_quantity -= quantity;
            pos.next_target += 1;

            let exit = PartialExit {
                time: bar.timestamp,
                target: index + 1,
                price,
                quantity,
                gross_pnl: leg.gross,
                costs: leg.costs,
                net_pnl: leg.net,
            };
            debug!(time = %bar.timestamp, target = index + 1, price, quantity, net = leg.net, "target hit");
            events.push(TradeEvent::PartialExit(exit.clone()));
            pos.partial_exits.push(exit);

            if pos.remaining_quantity == 0 {
                self.close(state, pos, price, bar.timestamp, ExitReason::AllTargets(index + 1), events);
                return;
            }
        }

        state.open_position = Some(pos);
    }

    /// Close any open remainder at `price`. Returns the closed trade, if any.
    pub fn force_close<'a>(
        &self,
        state: &'a mut PortfolioState,
        price: f64,
        time: NaiveDateTime,
        reason: ExitReason,
        events: &mut Vec<TradeEvent>,
    ) -> Option<&'a ClosedTrade> {
        let pos = state.open_position.take()?;
        self.close(state, pos, price, time, reason, events);
        state.ledger.last()
    }

    fn realize_leg(&self, state: &mut PortfolioState, pos: &Position, price: f64, quantity: u64) -> Leg {
        let gross = pos.direction.pnl(pos.entry_price, price, quantity);
        let costs = self.costs.compute(pos.entry_price, price, quantity);
        let net = gross - costs.total;
        state.realize(net, costs.total, costs.brokerage);
        Leg {
            gross,
            costs: costs.total,
            net,
        }
    }

    /// Realize the remainder (if any) and append the aggregated trade to the ledger.
    fn close(
        &self,
        state: &mut PortfolioState,
        pos: Position,
        price: f64,
        time: NaiveDateTime,
        reason: ExitReason,
        events: &mut Vec<TradeEvent>,
    ) {
        let final_leg = (pos.remaining_quantity > 0)
            .then(|| self.realize_leg(state, &pos, price, pos.remaining_quantity));

        let (mut gross, mut costs, mut net) = pos
            .partial_exits
            .iter()
            .fold((0.0, 0.0, 0.0), |(g, c, n), p| (g + p.gross_pnl, c + p.costs, n + p.net_pnl));
        if let Some(leg) = final_leg {
            gross += leg.gross;
            costs += leg.costs;
            net += leg.net;
        }

        let trade = ClosedTrade {
            trade_number: state.ledger.len() + 1,
            direction: pos.direction,
            entry_price: pos.entry_price,
            entry_time: pos.entry_time,
            exit_price: price,
            exit_time: time,
            quantity: pos.quantity,
            gross_pnl: gross,
            costs,
            net_pnl: net,
            reason,
            result: reason.to_string(),
            capital_after: state.capital,
            partial_exits: pos.partial_exits,
        };
        info!(
            trade = trade.trade_number,
            time = %time,
            price,
            net = trade.net_pnl,
            capital = state.capital,
            "closed: {}",
            trade.result
        );
        events.push(TradeEvent::Closed(trade.clone()));
        state.ledger.push(trade);
    }
}
