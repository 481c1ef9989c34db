//! Cost model — slippage and transaction cost calculation.
//!
//! Slippage is directional: buyers pay more, sellers receive less. The cost
//! breakdown mirrors a retail brokerage schedule — a proportional fee on
//! both sides, a sell-only regulatory levy, a buy-only duty, and a tax that
//! compounds on the fee-like components. Pure functions, no state.

use crate::domain::Side;
use serde::{Deserialize, Serialize};

/// Transaction cost and slippage parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostModel {
    /// Proportional brokerage fee, charged on both sides.
    pub fee_rate: f64,
    /// Regulatory levy, charged on sells only.
    pub sell_levy_rate: f64,
    /// Transfer duty, charged on buys only.
    pub buy_duty_rate: f64,
    /// Tax rate applied to the fee-like components (fee + levy), not the
    /// duty or the notional.
    pub fee_tax_rate: f64,
    /// Fixed adverse price adjustment applied before costs are computed.
    pub slippage_rate: f64,
}

/// Itemized cost of one fill.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostBreakdown {
    pub fee: f64,
    pub levy: f64,
    pub duty: f64,
    pub tax: f64,
    pub total: f64,
}

impl CostModel {
    pub fn new(
        fee_rate: f64,
        sell_levy_rate: f64,
        buy_duty_rate: f64,
        fee_tax_rate: f64,
        slippage_rate: f64,
    ) -> Self {
        Self {
            fee_rate,
            sell_levy_rate,
            buy_duty_rate,
            fee_tax_rate,
            slippage_rate,
        }
    }

    /// Zero-cost model for tests that need exact fill arithmetic.
    pub fn frictionless() -> Self {
        Self::new(0.0, 0.0, 0.0, 0.0, 0.0)
    }

    /// Fill price after slippage: buys fill higher, sells fill lower.
    pub fn fill_price(&self, requested: f64, side: Side) -> f64 {
        match side {
            Side::Buy => requested * (1.0 + self.slippage_rate),
            Side::Sell => requested * (1.0 - self.slippage_rate),
        }
    }

    /// Itemized cost for an order of `order_value` (filled notional).
    pub fn cost(&self, order_value: f64, side: Side) -> CostBreakdown {
        let fee = order_value * self.fee_rate;
        let levy = match side {
            Side::Sell => order_value * self.sell_levy_rate,
            Side::Buy => 0.0,
        };
        let duty = match side {
            Side::Buy => order_value * self.buy_duty_rate,
            Side::Sell => 0.0,
        };
        let tax = (fee + levy) * self.fee_tax_rate;
        CostBreakdown {
            fee,
            levy,
            duty,
            tax,
            total: fee + levy + duty + tax,
        }
    }
}

impl Default for CostModel {
    /// Retail-brokerage defaults: 3 bps fee, 2.5 bps sell levy, 1.5 bps buy
    /// duty, 18% tax on fees, 10 bps slippage.
    fn default() -> Self {
        Self::new(0.0003, 0.00025, 0.00015, 0.18, 0.001)
    }
}
