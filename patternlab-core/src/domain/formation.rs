//! Formation — a detected candidate chart pattern with its geometric levels.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// The chart pattern families the detectors recognize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternKind {
    CupWithHandle,
    RoundedBottom,
    GoldenCross,
}

impl PatternKind {
    /// Stable identifier used in logs, reports, and cache keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            PatternKind::CupWithHandle => "cup_with_handle",
            PatternKind::RoundedBottom => "rounded_bottom",
            PatternKind::GoldenCross => "golden_cross",
        }
    }
}

impl std::fmt::Display for PatternKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Key price levels extracted from the detection window.
///
/// Not every kind populates every level: a golden cross has no handle, a
/// rounded bottom no neckline. Levels that don't apply are `None`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KeyLevels {
    /// Highest price of the left side of the pattern (resistance).
    pub left_peak: Option<f64>,
    /// Lowest price of the base (cup bottom / bowl trough).
    pub trough: Option<f64>,
    /// Low of the consolidation after the base recovered (cup handle).
    pub handle_low: Option<f64>,
}

/// A detected candidate pattern.
///
/// Derived from a window of bars ending at the as-of date; short-lived —
/// it is either validated and acted on in the same day-step or discarded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Formation {
    pub kind: PatternKind,
    pub symbol: String,
    /// First bar date of the detection window.
    pub window_start: NaiveDate,
    /// Last bar date of the detection window.
    pub window_end: NaiveDate,
    pub levels: KeyLevels,
    /// Last close in the window — the price a breakout entry would reference.
    pub entry_price: f64,
    /// Exit level that invalidates the pattern.
    pub stop_loss: f64,
    /// Resistance-breakout objective.
    pub conservative_target: f64,
    /// Measured-move objective beyond the conservative target.
    pub aggressive_target: f64,
}

impl Formation {
    /// Distance from entry to stop, in price units. Non-positive means the
    /// formation is untradeable and must not be approved.
    pub fn stop_distance(&self) -> f64 {
        self.entry_price - self.stop_loss
    }

    /// Risk/reward ratio for a given target: (target − entry) / (entry − stop).
    ///
    /// Returns `None` when the stop distance is non-positive.
    pub fn risk_reward(&self, target: f64) -> Option<f64> {
        let risk = self.stop_distance();
        if risk <= 0.0 {
            return None;
        }
        Some((target - self.entry_price) / risk)
    }
}
