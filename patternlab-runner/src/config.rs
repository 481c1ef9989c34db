//! Serializable simulation configuration.
//!
//! TOML in, `SimulatorConfig` out, plus a content-hash run ID so identical
//! configurations map to identical cache keys and artifact names.

use chrono::NaiveDate;
use patternlab_core::engine::{CostModel, RiskLimits, SimulatorConfig};
use patternlab_core::patterns::{DetectorConfig, ValidatorConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Unique identifier for a run (content-addressable hash).
pub type RunId = String;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid date '{0}': expected YYYY-MM-DD")]
    BadDate(String),
    #[error("watchlist is empty")]
    EmptyWatchlist,
    #[error("start date {start} is not before end date {end}")]
    BadDateRange { start: NaiveDate, end: NaiveDate },
}

/// The `[simulation]` section: capital, period, watchlist, cadences.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SimulationSection {
    pub initial_capital: f64,
    /// Simulation start (YYYY-MM-DD).
    pub start: String,
    /// Simulation end (YYYY-MM-DD), inclusive.
    pub end: String,
    pub watchlist: Vec<String>,
    #[serde(default = "default_window_len")]
    pub window_len: usize,
    #[serde(default = "default_exit_check_interval")]
    pub exit_check_interval: usize,
    #[serde(default = "default_decision_retries")]
    pub decision_retries: usize,
    /// Bars of history to request before the start date, feeding the
    /// validator's rescan.
    #[serde(default = "default_history_lookback")]
    pub history_lookback: usize,
}

fn default_window_len() -> usize {
    250
}

fn default_exit_check_interval() -> usize {
    5
}

fn default_decision_retries() -> usize {
    2
}

fn default_history_lookback() -> usize {
    2_000
}

/// Full run configuration. Every section except `[simulation]` is optional
/// and falls back to documented defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub simulation: SimulationSection,
    #[serde(default)]
    pub detector: DetectorConfig,
    #[serde(default)]
    pub validator: ValidatorConfig,
    #[serde(default)]
    pub risk: RiskLimits,
    #[serde(default)]
    pub costs: CostModel,
}

impl SimulationConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_toml_str(&std::fs::read_to_string(path)?)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.simulation.watchlist.is_empty() {
            return Err(ConfigError::EmptyWatchlist);
        }
        let (start, end) = (self.start_date()?, self.end_date()?);
        if start >= end {
            return Err(ConfigError::BadDateRange { start, end });
        }
        Ok(())
    }

    pub fn start_date(&self) -> Result<NaiveDate, ConfigError> {
        parse_date(&self.simulation.start)
    }

    pub fn end_date(&self) -> Result<NaiveDate, ConfigError> {
        parse_date(&self.simulation.end)
    }

    /// Deterministic content-hash ID: identical configs share cache keys
    /// and artifact names.
    pub fn run_id(&self) -> RunId {
        let json = serde_json::to_string(self).expect("SimulationConfig serialization failed");
        blake3::hash(json.as_bytes()).to_hex().to_string()
    }

    /// Lower this config into the engine's tunables.
    pub fn to_simulator_config(&self) -> SimulatorConfig {
        SimulatorConfig {
            initial_capital: self.simulation.initial_capital,
            window_len: self.simulation.window_len,
            exit_check_interval: self.simulation.exit_check_interval,
            decision_retries: self.simulation.decision_retries,
            detector: self.detector.clone(),
            validator: self.validator.clone(),
            cost_model: self.costs.clone(),
            risk_limits: self.risk.clone(),
        }
    }
}

fn parse_date(text: &str) -> Result<NaiveDate, ConfigError> {
    NaiveDate::parse_from_str(text, "%Y-%m-%d").map_err(|_| ConfigError::BadDate(text.to_string()))
}
