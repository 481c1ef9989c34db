//! Named tolerance bands for detection and validation.
//!
//! Every geometric acceptance band lives here as a named, documented field
//! so threshold sensitivity can be tested without touching detection logic.

use serde::{Deserialize, Serialize};

/// Geometric acceptance bands shared by the formation detectors.
///
/// All bands are hard gates: a window that violates any bound produces no
/// formation at all. Nothing is scored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// Trough must sit after this fraction of the window. Earlier troughs
    /// mean the base formed before the left side was established.
    pub trough_position_min: f64,
    /// Trough must sit before this fraction of the window, leaving room for
    /// the right side to recover. Together with `trough_position_min` this
    /// enforces a rounded base rather than a V at either edge.
    pub trough_position_max: f64,
    /// Minimum base depth relative to the left peak. Shallower dips are
    /// noise, not a base.
    pub depth_min: f64,
    /// Maximum base depth relative to the left peak. Deeper declines are
    /// breakdowns, not constructive bases.
    pub depth_max: f64,
    /// Cup handle: the handle low must hold above this fraction of the cup
    /// range (measured up from the trough). A handle that retests the cup
    /// bottom invalidates the pattern.
    pub handle_floor: f64,
    /// Cup handle: maximum pullback relative to the handle high.
    pub handle_depth_max: f64,
    /// Rounded bottom: the mean low of the window's middle third must stay
    /// within this fraction of the depth above the trough, so the base hugs
    /// the bottom instead of spiking through it.
    pub roundness_max: f64,
    /// Rounded bottom: last close must have retraced at least this fraction
    /// of the depth off the trough.
    pub recovery_min: f64,
    /// Golden cross: fast moving-average period.
    pub fast_period: usize,
    /// Golden cross: slow moving-average period.
    pub slow_period: usize,
    /// Golden cross: the cross must have occurred within this many bars of
    /// the window's end to still be actionable.
    pub cross_recency: usize,
    /// Golden cross: fraction of the window amplitude added on top of the
    /// window high for the aggressive objective (the kind has no classic
    /// measured-move rule).
    pub cross_extension: f64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            trough_position_min: 0.30,
            trough_position_max: 0.70,
            depth_min: 0.08,
            depth_max: 0.40,
            handle_floor: 0.35,
            handle_depth_max: 0.25,
            roundness_max: 0.25,
            recovery_min: 0.60,
            fast_period: 50,
            slow_period: 200,
            cross_recency: 10,
            cross_extension: 0.5,
        }
    }
}

/// Thresholds for the historical validation rescan and the approval policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidatorConfig {
    /// Bar stride between candidate window end points during the rescan.
    ///
    /// A sampling heuristic: stride 1 counts near-duplicate windows of one
    /// physical pattern, larger strides skip genuinely distinct overlapping
    /// occurrences. Kept tunable so hit-rate sensitivity can be measured.
    pub stride: usize,
    /// Below this many historical occurrences the evidence is insufficient
    /// and nothing is approved, regardless of hit rate.
    pub min_occurrences: usize,
    /// Required historical hit rate for the aggressive (measured-move) tier.
    pub aggressive_hit_threshold: f64,
    /// Required historical hit rate for the conservative (resistance) tier.
    pub conservative_hit_threshold: f64,
    /// Minimum risk/reward on the chosen tier, computed from the current
    /// formation's levels.
    pub min_risk_reward: f64,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            stride: 5,
            min_occurrences: 10,
            aggressive_hit_threshold: 0.70,
            conservative_hit_threshold: 0.55,
            min_risk_reward: 2.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detector_defaults_are_ordered_bands() {
        let cfg = DetectorConfig::default();
        assert!(cfg.trough_position_min < cfg.trough_position_max);
        assert!(cfg.depth_min < cfg.depth_max);
        assert!(cfg.fast_period < cfg.slow_period);
        assert!(cfg.handle_floor > 0.0 && cfg.handle_floor < 1.0);
    }

    #[test]
    fn validator_defaults_match_policy() {
        let cfg = ValidatorConfig::default();
        assert_eq!(cfg.stride, 5);
        assert_eq!(cfg.min_occurrences, 10);
        assert!((cfg.aggressive_hit_threshold - 0.70).abs() < 1e-12);
        assert!((cfg.conservative_hit_threshold - 0.55).abs() < 1e-12);
        assert!((cfg.min_risk_reward - 2.0).abs() < 1e-12);
    }

    #[test]
    fn configs_roundtrip_through_serde() {
        let cfg = DetectorConfig::default();
        let json = serde_json::to_string(&cfg).unwrap();
        let back: DetectorConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.depth_min, cfg.depth_min);
        assert_eq!(back.slow_period, cfg.slow_period);

        let vcfg = ValidatorConfig::default();
        let json = serde_json::to_string(&vcfg).unwrap();
        let back: ValidatorConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.stride, vcfg.stride);
    }
}
