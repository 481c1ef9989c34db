//! Trade — an immutable record emitted on every fill.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Order direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Buy,
    Sell,
}

/// Why a fill happened. Attached to every `Trade` for the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FillReason {
    /// Approved pattern entry.
    Entry,
    /// Day's high reached the position's target.
    Target,
    /// Day's low pierced the position's stop.
    StopLoss,
    /// External decision source signalled an exit.
    ExitSignal,
    /// Forced close on the last simulated day.
    EndOfPeriod,
}

/// One fill. Emitted on both position opens and closes, never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    pub symbol: String,
    pub side: Side,
    pub quantity: u64,
    /// Price the order asked for, before slippage.
    pub requested_price: f64,
    /// Price actually paid/received after slippage.
    pub filled_price: f64,
    /// Total transaction cost charged on this fill.
    pub cost: f64,
    pub date: NaiveDate,
    pub reason: FillReason,
}

impl Trade {
    /// Notional value of the fill at the filled price.
    pub fn notional(&self) -> f64 {
        self.filled_price * self.quantity as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_trade() -> Trade {
        Trade {
            symbol: "ACME".into(),
            side: Side::Buy,
            quantity: 50,
            requested_price: 100.0,
            filled_price: 100.1,
            cost: 6.2,
            date: NaiveDate::from_ymd_opt(2024, 1, 5).unwrap(),
            reason: FillReason::Entry,
        }
    }

    #[test]
    fn notional_uses_filled_price() {
        assert!((sample_trade().notional() - 5005.0).abs() < 1e-10);
    }

    #[test]
    fn trade_serialization_roundtrip() {
        let trade = sample_trade();
        let json = serde_json::to_string(&trade).unwrap();
        let deser: Trade = serde_json::from_str(&json).unwrap();
        assert_eq!(trade.symbol, deser.symbol);
        assert_eq!(trade.reason, deser.reason);
        assert_eq!(trade.filled_price, deser.filled_price);
    }
}
