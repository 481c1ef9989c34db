//! Decision source seam — the external orchestrator that says buy/sell/hold.
//!
//! The real implementation lives outside this workspace (an LLM pipeline in
//! the original system). The core treats it as an opaque, slow, fallible
//! black box: failures are retried a bounded number of times and then
//! degrade to "no signal" for that instrument on that day.

use crate::patterns::validator::ValidationResult;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// What the decision source wants done.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionAction {
    Buy,
    Sell,
    Hold,
}

/// A decision for one instrument on one day.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decision {
    pub action: DecisionAction,
    /// Source's own confidence in [0, 1]; informational.
    pub confidence: f64,
    /// Optional stop override; the validated formation's stop otherwise.
    pub stop_loss: Option<f64>,
    /// Optional target override; the approved tier's price otherwise.
    pub target: Option<f64>,
}

impl Decision {
    pub fn hold() -> Self {
        Self {
            action: DecisionAction::Hold,
            confidence: 0.0,
            stop_loss: None,
            target: None,
        }
    }
}

/// External collaborator failure. Always recoverable at the simulation
/// level: after retries the day's evaluation becomes "no action".
#[derive(Debug, Error)]
#[error("decision source unavailable for {instrument} on {as_of}: {message}")]
pub struct DecisionError {
    pub instrument: String,
    pub as_of: NaiveDate,
    pub message: String,
}

/// Everything the decision source gets to see. The fundamentals and
/// sentiment snapshots come from scraping collaborators outside this core
/// and stay opaque JSON here.
#[derive(Debug, Clone)]
pub struct DecisionRequest<'a> {
    pub instrument: &'a str,
    pub as_of: NaiveDate,
    /// Present only when a formation was detected and validated today.
    pub validation: Option<&'a ValidationResult>,
    pub fundamentals: Option<serde_json::Value>,
    pub sentiment: Option<serde_json::Value>,
}

/// The external orchestrator.
pub trait DecisionSource: Send + Sync {
    fn decide(&self, request: &DecisionRequest<'_>) -> Result<Decision, DecisionError>;
}

/// Supplies the opaque context snapshots for a decision request.
pub trait SnapshotSource: Send + Sync {
    fn fundamentals(&self, instrument: &str, as_of: NaiveDate) -> Option<serde_json::Value>;
    fn sentiment(&self, instrument: &str, as_of: NaiveDate) -> Option<serde_json::Value>;
}

/// No external context available.
#[derive(Debug, Default)]
pub struct NoSnapshots;

impl SnapshotSource for NoSnapshots {
    fn fundamentals(&self, _instrument: &str, _as_of: NaiveDate) -> Option<serde_json::Value> {
        None
    }

    fn sentiment(&self, _instrument: &str, _as_of: NaiveDate) -> Option<serde_json::Value> {
        None
    }
}

/// Deterministic built-in decision source: buy whatever the validator
/// approved, at the approved tier's historical hit rate as confidence,
/// and never volunteer exits. Lets the demo and tests run without the
/// external orchestrator.
#[derive(Debug, Default)]
pub struct RuleBasedDecision;

impl DecisionSource for RuleBasedDecision {
    fn decide(&self, request: &DecisionRequest<'_>) -> Result<Decision, DecisionError> {
        match request.validation {
            Some(validation) if validation.approved => Ok(Decision {
                action: DecisionAction::Buy,
                confidence: validation.approved_hit_rate().unwrap_or(0.0),
                stop_loss: None,
                target: None,
            }),
            _ => Ok(Decision::hold()),
        }
    }
}

/// Call the decision source, retrying transient failures.
///
/// After `retries` additional attempts the failure is logged and collapsed
/// into `None` — the caller treats it as "no signal" and the run continues.
pub fn decide_with_retry(
    source: &dyn DecisionSource,
    request: &DecisionRequest<'_>,
    retries: usize,
) -> Option<Decision> {
    let mut last_error = None;
    for attempt in 0..=retries {
        match source.decide(request) {
            Ok(decision) => return Some(decision),
            Err(err) => {
                tracing::warn!(
                    instrument = request.instrument,
                    as_of = %request.as_of,
                    attempt,
                    error = %err,
                    "decision source failed"
                );
                last_error = Some(err);
            }
        }
    }
    if let Some(err) = last_error {
        tracing::warn!(
            instrument = request.instrument,
            as_of = %request.as_of,
            error = %err,
            "decision source exhausted retries; treating as no signal"
        );
    }
    None
}
