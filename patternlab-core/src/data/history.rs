//! Price history store — append-only, date-ordered bars with strict as-of queries.
//!
//! Every query takes an explicit cutoff date so that no caller can
//! accidentally observe bars from the simulated future. `window_before`
//! excludes the cutoff date itself: the bar for the current simulation day
//! is still forming and must not feed a decision.

use crate::domain::Bar;
use chrono::NaiveDate;
use std::collections::{BTreeSet, HashMap};
use thiserror::Error;

/// Errors from the history store and data providers.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("{symbol}: {got} bars available, {need} required")]
    InsufficientBars {
        symbol: String,
        got: usize,
        need: usize,
    },
    #[error("{symbol}: bar dated {date} is not after the last stored bar ({last})")]
    OutOfOrder {
        symbol: String,
        date: NaiveDate,
        last: NaiveDate,
    },
    #[error("{symbol}: bar dated {date} failed OHLC sanity checks")]
    InsaneBar { symbol: String, date: NaiveDate },
    #[error("no history loaded for {0}")]
    UnknownSymbol(String),
    #[error("provider failure for {symbol}: {message}")]
    Provider { symbol: String, message: String },
}

/// Append-only daily bar series for one instrument.
///
/// Bars are kept sorted by date and unique per date; both are enforced at
/// append time so queries can binary-search.
#[derive(Debug, Clone, Default)]
pub struct PriceHistory {
    bars: Vec<Bar>,
}

impl PriceHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a bar. Fails if the bar is insane, or not strictly after the
    /// last stored date (out-of-order and duplicate dates are both rejected).
    pub fn append(&mut self, bar: Bar) -> Result<(), DataError> {
        if !bar.is_sane() {
            return Err(DataError::InsaneBar {
                symbol: bar.symbol.clone(),
                date: bar.date,
            });
        }
        if let Some(last) = self.bars.last() {
            if bar.date <= last.date {
                return Err(DataError::OutOfOrder {
                    symbol: bar.symbol.clone(),
                    date: bar.date,
                    last: last.date,
                });
            }
        }
        self.bars.push(bar);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    /// Index of the first bar dated after `date` (= number of bars with
    /// `bar.date <= date`).
    fn cutoff_index(&self, date: NaiveDate) -> usize {
        self.bars.partition_point(|b| b.date <= date)
    }

    /// All bars with `bar.date <= date`.
    pub fn bars_through(&self, date: NaiveDate) -> &[Bar] {
        &self.bars[..self.cutoff_index(date)]
    }

    /// All bars with `bar.date < date` — the full past as seen from a
    /// decision made on `date`.
    pub fn bars_before(&self, date: NaiveDate) -> &[Bar] {
        let end = self.bars.partition_point(|b| b.date < date);
        &self.bars[..end]
    }

    /// Exactly `len` bars strictly before `date`.
    ///
    /// This is the detection window for a decision made on `date`: the
    /// current day's bar is still forming and is excluded.
    pub fn window_before(&self, date: NaiveDate, len: usize) -> Result<&[Bar], DataError> {
        let end = self.bars.partition_point(|b| b.date < date);
        if end < len {
            return Err(DataError::InsufficientBars {
                symbol: self
                    .bars
                    .first()
                    .map(|b| b.symbol.clone())
                    .unwrap_or_default(),
                got: end,
                need: len,
            });
        }
        Ok(&self.bars[end - len..end])
    }

    /// The bar for exactly `date`, if the market was open that day.
    pub fn bar_on(&self, date: NaiveDate) -> Option<&Bar> {
        let idx = self.bars.partition_point(|b| b.date < date);
        self.bars.get(idx).filter(|b| b.date == date)
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.bars.first().map(|b| b.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.bars.last().map(|b| b.date)
    }
}

/// All loaded instrument histories for a run.
#[derive(Debug, Clone, Default)]
pub struct HistoryStore {
    series: HashMap<String, PriceHistory>,
}

impl HistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a full history for one instrument, replacing any previous one.
    pub fn insert(&mut self, symbol: impl Into<String>, history: PriceHistory) {
        self.series.insert(symbol.into(), history);
    }

    /// Build one instrument's history from bars, enforcing order and sanity.
    pub fn load(&mut self, symbol: impl Into<String>, bars: Vec<Bar>) -> Result<(), DataError> {
        let mut history = PriceHistory::new();
        for bar in bars {
            history.append(bar)?;
        }
        self.series.insert(symbol.into(), history);
        Ok(())
    }

    pub fn get(&self, symbol: &str) -> Result<&PriceHistory, DataError> {
        self.series
            .get(symbol)
            .ok_or_else(|| DataError::UnknownSymbol(symbol.to_string()))
    }

    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.series.keys().map(String::as_str)
    }

    /// Union calendar: every date in `[start, end]` on which at least one
    /// loaded instrument traded, in ascending order.
    pub fn trading_days(&self, start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
        let mut days = BTreeSet::new();
        for history in self.series.values() {
            for bar in history.bars() {
                if bar.date >= start && bar.date <= end {
                    days.insert(bar.date);
                }
            }
        }
        days.into_iter().collect()
    }
}
