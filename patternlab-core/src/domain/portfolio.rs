//! Portfolio — aggregate state of cash, open positions, and history.

use super::position::Position;
use super::trade::Trade;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One point on the equity curve.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EquitySnapshot {
    pub date: NaiveDate,
    pub total_value: f64,
}

/// Aggregate portfolio state for one simulation run.
///
/// Owns the cash balance, all open positions (at most one per instrument),
/// closed positions, the fill log, and the daily equity snapshots. Created
/// once per run with a fixed initial capital.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Portfolio {
    pub cash: f64,
    pub initial_capital: f64,
    pub positions: HashMap<String, Position>,
    pub closed_positions: Vec<Position>,
    pub trade_log: Vec<Trade>,
    pub snapshots: Vec<EquitySnapshot>,
    /// Sum of all transaction costs charged so far.
    pub costs_paid: f64,
}

impl Portfolio {
    pub fn new(initial_capital: f64) -> Self {
        Self {
            cash: initial_capital,
            initial_capital,
            positions: HashMap::new(),
            closed_positions: Vec::new(),
            trade_log: Vec::new(),
            snapshots: Vec::new(),
            costs_paid: 0.0,
        }
    }

    /// Total equity = cash + mark-to-market value of all open positions.
    ///
    /// Positions without a quote in `prices` fall back to their last mark.
    pub fn equity(&self, prices: &HashMap<String, f64>) -> f64 {
        let position_value: f64 = self
            .positions
            .values()
            .map(|pos| {
                let price = prices.get(&pos.symbol).copied().unwrap_or(pos.last_mark);
                pos.market_value(price)
            })
            .sum();
        self.cash + position_value
    }

    /// Highest equity snapshot seen so far (initial capital before any snapshot).
    pub fn peak_equity(&self) -> f64 {
        self.snapshots
            .iter()
            .map(|s| s.total_value)
            .fold(self.initial_capital, f64::max)
    }

    pub fn has_position(&self, symbol: &str) -> bool {
        self.positions.contains_key(symbol)
    }

    pub fn open_position_count(&self) -> usize {
        self.positions.len()
    }

    /// Sum of gross realized P&L across closed positions.
    pub fn realized_pnl(&self) -> f64 {
        self.closed_positions.iter().map(|p| p.realized_pnl).sum()
    }
}
