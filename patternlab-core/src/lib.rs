//! PatternLab Core — pattern validation and walk-forward backtest engine.
//!
//! The crate is organized leaf-to-root:
//! - `domain` — bars, formations, positions, trades, portfolio
//! - `data` — append-only price history with strict as-of queries, the
//!   market-data provider seam, and seeded synthetic data
//! - `patterns` — tolerance-banded detectors, the historical validator,
//!   and the content-hash validation cache
//! - `engine` — cost model, ledger, risk manager, the decision-source
//!   seam, and the walk-forward simulator

pub mod data;
pub mod domain;
pub mod engine;
pub mod patterns;

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: everything the simulator fans out over worker
    /// threads must be Send + Sync.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<domain::Bar>();
        require_sync::<domain::Bar>();
        require_send::<domain::Formation>();
        require_sync::<domain::Formation>();
        require_send::<domain::Position>();
        require_sync::<domain::Position>();
        require_send::<domain::Portfolio>();
        require_sync::<domain::Portfolio>();
        require_send::<domain::Trade>();
        require_sync::<domain::Trade>();

        require_send::<data::HistoryStore>();
        require_sync::<data::HistoryStore>();

        require_send::<patterns::ValidationResult>();
        require_sync::<patterns::ValidationResult>();
        require_send::<patterns::MemoryValidationCache>();
        require_sync::<patterns::MemoryValidationCache>();
        require_send::<patterns::DetectorSet>();
        require_sync::<patterns::DetectorSet>();

        require_send::<engine::CostModel>();
        require_sync::<engine::CostModel>();
        require_send::<engine::Ledger>();
        require_sync::<engine::Ledger>();
        require_send::<engine::RiskManager>();
        require_sync::<engine::RiskManager>();
        require_send::<engine::SimulatorConfig>();
        require_sync::<engine::SimulatorConfig>();
    }
}
