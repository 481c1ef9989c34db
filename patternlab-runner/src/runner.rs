//! Simulation runner — wires data, patterns, engine, and reporting.
//!
//! One entry point: `run_simulation()`. The caller supplies the external
//! collaborators (market data provider, decision source, validation cache,
//! snapshot source); everything else is assembled from the configuration.

use crate::config::{ConfigError, SimulationConfig};
use crate::report::SimulationReport;
use patternlab_core::data::{DataError, HistoryStore, MarketDataProvider};
use patternlab_core::engine::{DecisionSource, SimulatorError, Simulator, SnapshotSource};
use patternlab_core::patterns::{DetectorSet, ValidationCache};
use thiserror::Error;

/// Errors from the runner.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("data error: {0}")]
    Data(#[from] DataError),
    #[error("simulation error: {0}")]
    Simulation(#[from] SimulatorError),
}

/// Load history for the watchlist, replay the period, and build the report.
pub fn run_simulation(
    config: &SimulationConfig,
    provider: &dyn MarketDataProvider,
    decision_source: &dyn DecisionSource,
    cache: &dyn ValidationCache,
    snapshots: &dyn SnapshotSource,
) -> Result<SimulationReport, RunError> {
    let start = config.start_date()?;
    let end = config.end_date()?;
    let run_id = config.run_id();

    tracing::info!(
        run_id = %&run_id[..12],
        %start,
        %end,
        watchlist = config.simulation.watchlist.len(),
        "starting simulation"
    );

    // The provider must cover the simulated period plus enough history for
    // the validator's rescan; short series fail here, explicitly.
    let min_bars = config.simulation.window_len + 1;
    let mut store = HistoryStore::new();
    for symbol in &config.simulation.watchlist {
        let bars = provider.get_bars(
            symbol,
            end,
            config.simulation.history_lookback,
            min_bars,
        )?;
        store.load(symbol.clone(), bars)?;
    }

    let simulator_config = config.to_simulator_config();
    let detectors = DetectorSet::standard(&simulator_config.detector);
    let simulator = Simulator::new(
        &simulator_config,
        &store,
        &detectors,
        cache,
        decision_source,
        snapshots,
    );

    let outcome = simulator.run(&config.simulation.watchlist, start, end)?;

    tracing::info!(
        run_id = %&run_id[..12],
        days = outcome.days_simulated,
        trades = outcome.portfolio.trade_log.len(),
        formations = outcome.audits.len(),
        "simulation complete"
    );

    Ok(SimulationReport::from_outcome(run_id, outcome))
}
