//! Position & portfolio ledger — the only component allowed to move cash.
//!
//! Every mutation either succeeds atomically or fails with a `LedgerError`;
//! a failed operation leaves the portfolio untouched. Ledger errors signal
//! logic bugs (double-open, close-without-open, negative cash) and must
//! abort the run — they are never recovered mid-simulation.

use crate::domain::{EquitySnapshot, FillReason, Portfolio, Position, Side, Trade};
use chrono::NaiveDate;
use std::collections::HashMap;
use thiserror::Error;

/// Fatal accounting violations.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("{0}: position already open")]
    AlreadyOpen(String),
    #[error("{0}: no open position to close")]
    NotOpen(String),
    #[error("{symbol}: insufficient cash {available:.2} for notional {required:.2}")]
    InsufficientCash {
        symbol: String,
        required: f64,
        available: f64,
    },
    #[error("{0}: order quantity must be positive")]
    ZeroQuantity(String),
}

/// One fill's prices and cost, as produced by the cost model.
#[derive(Debug, Clone)]
pub struct FillSpec {
    pub symbol: String,
    pub quantity: u64,
    pub requested_price: f64,
    pub filled_price: f64,
    pub cost: f64,
    pub date: NaiveDate,
}

/// Owns the portfolio and enforces its accounting invariants.
#[derive(Debug, Clone)]
pub struct Ledger {
    pub portfolio: Portfolio,
}

impl Ledger {
    pub fn new(initial_capital: f64) -> Self {
        Self {
            portfolio: Portfolio::new(initial_capital),
        }
    }

    /// Open a new position. Fails if the instrument already has one, or if
    /// cash cannot cover notional + cost.
    pub fn open(
        &mut self,
        fill: FillSpec,
        stop_loss: f64,
        target_price: f64,
    ) -> Result<(), LedgerError> {
        if fill.quantity == 0 {
            return Err(LedgerError::ZeroQuantity(fill.symbol));
        }
        if self.portfolio.has_position(&fill.symbol) {
            return Err(LedgerError::AlreadyOpen(fill.symbol));
        }
        let notional = fill.filled_price * fill.quantity as f64;
        let required = notional + fill.cost;
        if required > self.portfolio.cash {
            return Err(LedgerError::InsufficientCash {
                symbol: fill.symbol,
                required,
                available: self.portfolio.cash,
            });
        }

        self.portfolio.cash -= required;
        self.portfolio.costs_paid += fill.cost;

        let mut position = Position::new(
            fill.symbol.clone(),
            fill.quantity,
            fill.filled_price,
            fill.date,
            stop_loss,
            target_price,
        );
        position.costs_paid = fill.cost;

        tracing::info!(
            symbol = %fill.symbol,
            quantity = fill.quantity,
            price = fill.filled_price,
            "position opened"
        );

        self.portfolio
            .positions
            .insert(fill.symbol.clone(), position);
        self.portfolio.trade_log.push(Trade {
            symbol: fill.symbol,
            side: Side::Buy,
            quantity: fill.quantity,
            requested_price: fill.requested_price,
            filled_price: fill.filled_price,
            cost: fill.cost,
            date: fill.date,
            reason: FillReason::Entry,
        });
        self.verify_conservation();
        Ok(())
    }

    /// Close the open position for an instrument. The full quantity closes
    /// at once — there are no partial exits.
    pub fn close(&mut self, fill: FillSpec, reason: FillReason) -> Result<Trade, LedgerError> {
        let mut position = self
            .portfolio
            .positions
            .remove(&fill.symbol)
            .ok_or_else(|| LedgerError::NotOpen(fill.symbol.clone()))?;

        let quantity = position.quantity;
        let notional = fill.filled_price * quantity as f64;

        self.portfolio.cash += notional - fill.cost;
        self.portfolio.costs_paid += fill.cost;

        position.realized_pnl = (fill.filled_price - position.avg_entry_price) * quantity as f64;
        position.costs_paid += fill.cost;
        position.last_mark = fill.filled_price;
        position.open = false;

        tracing::info!(
            symbol = %fill.symbol,
            price = fill.filled_price,
            reason = ?reason,
            net_pnl = position.net_pnl(),
            "position closed"
        );

        let trade = Trade {
            symbol: fill.symbol,
            side: Side::Sell,
            quantity,
            requested_price: fill.requested_price,
            filled_price: fill.filled_price,
            cost: fill.cost,
            date: fill.date,
            reason,
        };
        self.portfolio.closed_positions.push(position);
        self.portfolio.trade_log.push(trade.clone());
        self.verify_conservation();
        Ok(trade)
    }

    /// Mark all open positions to the given prices. No cash effect.
    pub fn mark(&mut self, prices: &HashMap<String, f64>) {
        for position in self.portfolio.positions.values_mut() {
            if let Some(&price) = prices.get(&position.symbol) {
                position.last_mark = price;
            }
        }
    }

    /// Append an equity snapshot for the day.
    pub fn snapshot(&mut self, date: NaiveDate, prices: &HashMap<String, f64>) {
        let total_value = self.portfolio.equity(prices);
        self.portfolio
            .snapshots
            .push(EquitySnapshot { date, total_value });
    }

    pub fn equity(&self, prices: &HashMap<String, f64>) -> f64 {
        self.portfolio.equity(prices)
    }

    /// Conservation identity, checked after every mutation in debug builds:
    /// `cash + Σ open cost-basis == initial + Σ closed gross P&L − Σ costs`.
    ///
    /// Returns the residual so tests can assert on it directly.
    pub fn conservation_residual(&self) -> f64 {
        let open_basis: f64 = self
            .portfolio
            .positions
            .values()
            .map(Position::cost_basis)
            .sum();
        let lhs = self.portfolio.cash + open_basis;
        let rhs = self.portfolio.initial_capital + self.portfolio.realized_pnl()
            - self.portfolio.costs_paid;
        lhs - rhs
    }

    fn verify_conservation(&self) {
        #[cfg(debug_assertions)]
        {
            let residual = self.conservation_residual();
            debug_assert!(
                residual.abs() < 1e-6,
                "ledger conservation violated: residual {residual}"
            );
        }
    }
}
