//! Position — one instrument's open (or closed) holding.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A single long position with fixed quantity and bracket levels.
///
/// Created on an approved entry, closed exactly once. `realized_pnl` is the
/// gross price P&L (fill-to-fill); transaction costs accumulate separately in
/// `costs_paid` so the ledger's conservation identity stays exact. Net P&L
/// is `realized_pnl - costs_paid`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    pub quantity: u64,
    pub avg_entry_price: f64,
    pub entry_date: NaiveDate,
    pub stop_loss: f64,
    pub target_price: f64,
    /// Gross price P&L. Zero until closed.
    pub realized_pnl: f64,
    /// Entry + exit transaction costs attributed to this position.
    pub costs_paid: f64,
    /// Latest mark-to-market price (updated daily, no cash effect).
    pub last_mark: f64,
    pub open: bool,
}

impl Position {
    pub fn new(
        symbol: String,
        quantity: u64,
        entry_price: f64,
        entry_date: NaiveDate,
        stop_loss: f64,
        target_price: f64,
    ) -> Self {
        Self {
            symbol,
            quantity,
            avg_entry_price: entry_price,
            entry_date,
            stop_loss,
            target_price,
            realized_pnl: 0.0,
            costs_paid: 0.0,
            last_mark: entry_price,
            open: true,
        }
    }

    /// Cost basis: quantity × average entry price.
    pub fn cost_basis(&self) -> f64 {
        self.quantity as f64 * self.avg_entry_price
    }

    pub fn market_value(&self, price: f64) -> f64 {
        self.quantity as f64 * price
    }

    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        self.quantity as f64 * (price - self.avg_entry_price)
    }

    /// Realized P&L net of this position's transaction costs.
    pub fn net_pnl(&self) -> f64 {
        self.realized_pnl - self.costs_paid
    }

    /// A closed position counts as a win when its net P&L is positive.
    pub fn is_winner(&self) -> bool {
        !self.open && self.net_pnl() > 0.0
    }

    /// Net return as a fraction of cost basis.
    pub fn return_pct(&self) -> f64 {
        let basis = self.cost_basis();
        if basis <= 0.0 {
            return 0.0;
        }
        self.net_pnl() / basis
    }
}
