//! Market data provider seam.
//!
//! Fetching bars from a real vendor lives outside this workspace; the core
//! only defines the contract. Providers must fail explicitly when they
//! cannot serve the requested depth — silent truncation upstream is how
//! look-ahead-safe windows end up shorter than the detector assumes.

use crate::data::history::DataError;
use crate::domain::Bar;
use chrono::NaiveDate;

/// Source of historical daily bars.
pub trait MarketDataProvider {
    /// Return up to `lookback_days` bars for `instrument`, all dated
    /// `<= end_date`, oldest first.
    ///
    /// Implementations MUST return `DataError::InsufficientBars` when fewer
    /// than `min_bars` are available rather than a short series.
    fn get_bars(
        &self,
        instrument: &str,
        end_date: NaiveDate,
        lookback_days: usize,
        min_bars: usize,
    ) -> Result<Vec<Bar>, DataError>;
}
