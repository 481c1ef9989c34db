//! Property tests: cost model purity/monotonicity and ledger conservation
//! under arbitrary operation sequences.

use chrono::NaiveDate;
use patternlab_core::domain::{FillReason, Side};
use patternlab_core::engine::{CostModel, FillSpec, Ledger};
use proptest::prelude::*;

fn any_side() -> impl Strategy<Value = Side> {
    prop_oneof![Just(Side::Buy), Just(Side::Sell)]
}

proptest! {
    /// Identical inputs yield identical costs — the model is pure.
    #[test]
    fn cost_is_deterministic(value in 1.0..1_000_000.0f64, side in any_side()) {
        let model = CostModel::default();
        prop_assert_eq!(model.cost(value, side), model.cost(value, side));
    }

    /// Cost is non-negative and strictly increasing in order value.
    #[test]
    fn cost_monotonic_in_value(
        value in 1.0..1_000_000.0f64,
        bump in 1.0..10_000.0f64,
        side in any_side(),
    ) {
        let model = CostModel::default();
        let smaller = model.cost(value, side).total;
        let larger = model.cost(value + bump, side).total;
        prop_assert!(smaller >= 0.0);
        prop_assert!(larger > smaller);
    }

    /// Slippage always moves the fill against the trader.
    #[test]
    fn slippage_is_adverse(price in 0.01..10_000.0f64) {
        let model = CostModel::default();
        prop_assert!(model.fill_price(price, Side::Buy) > price);
        prop_assert!(model.fill_price(price, Side::Sell) < price);
    }

    /// The cost breakdown always sums to its total.
    #[test]
    fn breakdown_sums_to_total(value in 1.0..1_000_000.0f64, side in any_side()) {
        let model = CostModel::default();
        let cost = model.cost(value, side);
        prop_assert!((cost.fee + cost.levy + cost.duty + cost.tax - cost.total).abs() < 1e-9);
    }
}

/// One scripted ledger operation.
#[derive(Debug, Clone)]
enum Op {
    Open {
        symbol_index: usize,
        quantity: u64,
        price: f64,
        cost: f64,
    },
    Close {
        symbol_index: usize,
        price: f64,
        cost: f64,
    },
}

fn any_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0usize..4, 1u64..200, 1.0..500.0f64, 0.0..50.0f64).prop_map(
            |(symbol_index, quantity, price, cost)| Op::Open {
                symbol_index,
                quantity,
                price,
                cost,
            }
        ),
        (0usize..4, 1.0..500.0f64, 0.0..50.0f64).prop_map(|(symbol_index, price, cost)| {
            Op::Close {
                symbol_index,
                price,
                cost,
            }
        }),
    ]
}

const SYMBOLS: [&str; 4] = ["AAA", "BBB", "CCC", "DDD"];

proptest! {
    /// After any sequence of opens and closes — including rejected ones —
    /// `cash + Σ open cost-basis == initial + Σ closed gross P&L − Σ costs`.
    #[test]
    fn ledger_conservation_under_random_ops(ops in prop::collection::vec(any_op(), 1..40)) {
        let mut ledger = Ledger::new(1_000_000.0);
        let date = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();

        for op in ops {
            match op {
                Op::Open { symbol_index, quantity, price, cost } => {
                    let fill = FillSpec {
                        symbol: SYMBOLS[symbol_index].into(),
                        quantity,
                        requested_price: price,
                        filled_price: price,
                        cost,
                        date,
                    };
                    // Rejections (double-open, insufficient cash) must leave
                    // the books untouched.
                    let _ = ledger.open(fill, price * 0.95, price * 1.10);
                }
                Op::Close { symbol_index, price, cost } => {
                    let fill = FillSpec {
                        symbol: SYMBOLS[symbol_index].into(),
                        quantity: 0, // close uses the position's quantity
                        requested_price: price,
                        filled_price: price,
                        cost,
                        date,
                    };
                    let _ = ledger.close(fill, FillReason::ExitSignal);
                }
            }
            prop_assert!(
                ledger.conservation_residual().abs() < 1e-6,
                "conservation residual {} after op",
                ledger.conservation_residual()
            );
        }
    }
}
