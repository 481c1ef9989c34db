//! Seeded synthetic bar generation for demos and tests.
//!
//! A geometric random walk with occasional drift regimes — enough texture
//! for detectors to find formations, fully reproducible from the seed.

use crate::data::history::DataError;
use crate::data::provider::MarketDataProvider;
use crate::domain::Bar;
use chrono::{Datelike, Duration, NaiveDate, Weekday};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Deterministic synthetic provider.
///
/// Each instrument derives its own sub-seed from the base seed and the
/// symbol bytes, so adding a symbol never perturbs another symbol's series.
#[derive(Debug, Clone)]
pub struct SyntheticProvider {
    seed: u64,
    start_price: f64,
    daily_vol: f64,
}

impl SyntheticProvider {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            start_price: 100.0,
            daily_vol: 0.015,
        }
    }

    fn symbol_seed(&self, symbol: &str) -> u64 {
        let mut hash = self.seed;
        for byte in symbol.bytes() {
            hash = hash.wrapping_mul(31).wrapping_add(byte as u64);
        }
        hash
    }

    /// Generate `n` weekday bars ending on or before `end_date`.
    pub fn generate(&self, symbol: &str, end_date: NaiveDate, n: usize) -> Vec<Bar> {
        let mut rng = StdRng::seed_from_u64(self.symbol_seed(symbol));
        let mut dates = Vec::with_capacity(n);
        let mut day = end_date;
        while dates.len() < n {
            if !matches!(day.weekday(), Weekday::Sat | Weekday::Sun) {
                dates.push(day);
            }
            day = day - Duration::days(1);
        }
        dates.reverse();

        let mut price = self.start_price;
        let mut drift = 0.0002;
        let mut bars = Vec::with_capacity(n);
        for date in dates {
            // Occasionally flip into a new drift regime so the walk forms
            // bases and recoveries instead of pure noise.
            if rng.gen_bool(0.02) {
                drift = rng.gen_range(-0.004..0.004);
            }
            let ret = drift + rng.gen_range(-self.daily_vol..self.daily_vol);
            let open = price;
            let close = (price * (1.0 + ret)).max(1.0);
            let high = open.max(close) * (1.0 + rng.gen_range(0.0..0.01));
            let low = (open.min(close) * (1.0 - rng.gen_range(0.0..0.01))).max(0.5);
            bars.push(Bar {
                symbol: symbol.to_string(),
                date,
                open,
                high,
                low,
                close,
                volume: rng.gen_range(100_000..2_000_000),
            });
            price = close;
        }
        bars
    }
}

impl MarketDataProvider for SyntheticProvider {
    fn get_bars(
        &self,
        instrument: &str,
        end_date: NaiveDate,
        lookback_days: usize,
        min_bars: usize,
    ) -> Result<Vec<Bar>, DataError> {
        let bars = self.generate(instrument, end_date, lookback_days);
        if bars.len() < min_bars {
            return Err(DataError::InsufficientBars {
                symbol: instrument.to_string(),
                got: bars.len(),
                need: min_bars,
            });
        }
        Ok(bars)
    }
}
