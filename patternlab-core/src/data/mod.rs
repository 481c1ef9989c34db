//! Price history store, provider seam, and synthetic data.

pub mod history;
pub mod provider;
pub mod synthetic;

pub use history::{DataError, HistoryStore, PriceHistory};
pub use provider::MarketDataProvider;
pub use synthetic::SyntheticProvider;
