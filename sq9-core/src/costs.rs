//! Cost model: brokerage, transaction tax, exchange charges and GST.
//!
//! Every round trip (or partial leg of one) pays one flat brokerage charge
//! per order, a securities transaction tax on the sell-side notional,
//! exchange transaction charges on total turnover, and GST on brokerage
//! plus transaction charges.

use serde::{Deserialize, Serialize};

/// Per-order and percentage cost parameters. All percentages are in percent (0.025 = 0.025 %).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostModel {
    /// Flat brokerage charged on each order (entry and exit are two orders).
    pub broker_per_order: f64,
    /// Securities transaction tax, applied to the exit leg's notional.
    pub stt_pct: f64,
    /// Exchange transaction charges, applied to total turnover.
    pub txn_pct: f64,
    /// GST, applied to brokerage + transaction charges.
    pub gst_pct: f64,
}

/// Itemised costs for one round trip.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CostBreakdown {
    pub brokerage: f64,
    pub stt: f64,
    pub txn_charges: f64,
    pub gst: f64,
    pub total: f64,
}

impl Default for CostModel {
    fn default() -> Self {
        Self {
            broker_per_order: 20.0,
            stt_pct: 0.025,
            txn_pct: 0.00325,
            gst_pct: 18.0,
        }
    }
}

impl CostModel {
    pub fn new(broker_per_order: f64, stt_pct: f64, txn_pct: f64, gst_pct: f64) -> Self {
        Self {
            broker_per_order,
            stt_pct,
            txn_pct,
            gst_pct,
        }
    }

    pub fn frictionless() -> Self {
        Self::new(0.0, 0.0, 0.0, 0.0)
    }

    /// Cost a round trip of `quantity` shares from `entry_price` to `exit_price`.
    ///
    /// The tax leg is the exit notional regardless of direction; a short's
    /// "exit" is its buy-to-cover, which keeps the formula symmetric with
    /// how the ledger records legs.
    pub fn compute(&self, entry_price: f64, exit_price: f64, quantity: u64) -> CostBreakdown {
        let qty = quantity as f64;
        let turnover = (entry_price + exit_price) * qty;

        let brokerage = 2.0 * self.broker_per_order;
        let stt = exit_price * qty * self.stt_pct / 100.0;
        let txn_charges = turnover * self.txn_pct / 100.0;
        let gst = (brokerage + txn_charges) * self.gst_pct / 100.0;

        CostBreakdown {
            brokerage,
            stt,
            txn_charges,
            gst,
            total: brokerage + stt + txn_charges + gst,
        }
    }

    /// Returns the offending field name if any parameter is negative or non-finite.
    pub fn invalid_field(&self) -> Option<&'static str> {
        [
            ("broker_per_order", self.broker_per_order),
            ("stt_pct", self.stt_pct),
            ("txn_pct", self.txn_pct),
            ("gst_pct", self.gst_pct),
        ]
        .into_iter()
        .find(|(_, v)| !v.is_finite() || *v < 0.0)
        .map(|(name, _)| name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frictionless_costs_nothing() {
        let costs = CostModel::frictionless().compute(100.0, 110.0, 10);
        assert_eq!(costs, CostBreakdown::default());
    }

    #[test]
    fn worked_example_matches_schedule() {
        // entry 100, exit 110, qty 10, brokerage 20/order, STT 0.025 %, txn 0.00325 %, GST 18 %
        let costs = CostModel::default().compute(100.0, 110.0, 10);
        assert!((costs.brokerage - 40.0).abs() < 1e-12);
        assert!((costs.stt - 0.275).abs() < 1e-12);
        assert!((costs.txn_charges - 0.06825).abs() < 1e-12);
        assert!((costs.gst - 7.212285).abs() < 1e-9);
        assert!((costs.total - 47.555535).abs() < 1e-9);

        let net = (110.0 - 100.0) * 10.0 - costs.total;
        assert!((net - 52.44).abs() < 0.01);
    }

    #[test]
    fn tax_applies_to_exit_leg_only() {
        let model = CostModel::new(0.0, 0.1, 0.0, 0.0);
        let up = model.compute(100.0, 200.0, 1);
        let down = model.compute(200.0, 100.0, 1);
        assert!((up.stt - 0.2).abs() < 1e-12);
        assert!((down.stt - 0.1).abs() < 1e-12);
    }

    #[test]
    fn brokerage_is_charged_even_for_zero_quantity() {
        let costs = CostModel::default().compute(100.0, 100.0, 0);
        assert_eq!(costs.brokerage, 40.0);
        assert_eq!(costs.stt, 0.0);
    }

    #[test]
    fn rejects_negative_parameters() {
        let model = CostModel::new(20.0, -0.1, 0.0, 18.0);
        assert_eq!(model.invalid_field(), Some("stt_pct"));
        assert_eq!(CostModel::default().invalid_field(), None);
    }
}
