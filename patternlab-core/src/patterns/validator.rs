//! Historical validation of a detected formation.
//!
//! A formation is only worth trading if structurally similar formations in
//! the instrument's own past went on to reach their targets. The validator
//! re-runs the detector over stride-spaced historical sub-windows, measures
//! how often each target tier was eventually hit (no holding-period cutoff),
//! and applies a two-tier approval policy: aggressive targets are rarely
//! reliable, conservative ones usually are, so both rates stay visible
//! instead of collapsing into one score.

use crate::domain::{Bar, Formation, PatternKind};
use crate::patterns::config::ValidatorConfig;
use crate::patterns::detector::FormationDetector;
use serde::{Deserialize, Serialize};

/// Which target tier the approval policy settled on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetTier {
    Conservative,
    Aggressive,
}

/// Outcome of validating one formation against the instrument's history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    pub formation_kind: PatternKind,
    /// Prior occurrences of the same kind found in the rescan.
    pub occurrence_count: usize,
    pub conservative_hit_rate: f64,
    pub aggressive_hit_rate: f64,
    /// Mean gain (percent of entry) over occurrences that hit the tier.
    pub avg_conservative_gain_pct: f64,
    pub avg_aggressive_gain_pct: f64,
    /// Risk/reward of the current formation on the chosen tier (conservative
    /// when no tier qualified). Zero when the stop distance is non-positive.
    pub risk_reward_ratio: f64,
    pub approved: bool,
    pub approved_target: Option<TargetTier>,
}

impl ValidationResult {
    /// The target price the approval settled on, from the given formation.
    pub fn approved_price(&self, formation: &Formation) -> Option<f64> {
        match self.approved_target? {
            TargetTier::Conservative => Some(formation.conservative_target),
            TargetTier::Aggressive => Some(formation.aggressive_target),
        }
    }

    /// Hit rate of the approved tier (confidence proxy for callers).
    pub fn approved_hit_rate(&self) -> Option<f64> {
        match self.approved_target? {
            TargetTier::Conservative => Some(self.conservative_hit_rate),
            TargetTier::Aggressive => Some(self.aggressive_hit_rate),
        }
    }
}

/// One prior occurrence found during the rescan.
struct Occurrence {
    conservative_hit: bool,
    aggressive_hit: bool,
    conservative_gain_pct: f64,
    aggressive_gain_pct: f64,
}

/// Validate `formation` against `history` (all bars available up to the
/// as-of date, oldest first, detection window included).
///
/// Sub-windows ending at the as-of index itself are excluded: the formation
/// under validation must not count itself as an occurrence with zero
/// forward bars.
pub fn validate_formation(
    formation: &Formation,
    history: &[Bar],
    detector: &dyn FormationDetector,
    window_len: usize,
    config: &ValidatorConfig,
) -> ValidationResult {
    debug_assert_eq!(detector.kind(), formation.kind);

    let stride = config.stride.max(1);
    let mut occurrences: Vec<Occurrence> = Vec::new();

    if history.len() > window_len {
        let mut end = window_len;
        while end < history.len() {
            let window = &history[end - window_len..end];
            if let Some(prior) = detector.detect(window) {
                let forward = &history[end..];
                occurrences.push(score_occurrence(&prior, forward));
            }
            end += stride;
        }
    }

    let count = occurrences.len();
    let cons_hits = occurrences.iter().filter(|o| o.conservative_hit).count();
    let aggr_hits = occurrences.iter().filter(|o| o.aggressive_hit).count();

    let conservative_hit_rate = rate(cons_hits, count);
    let aggressive_hit_rate = rate(aggr_hits, count);
    let avg_conservative_gain_pct = mean_gain(&occurrences, |o| {
        o.conservative_hit.then_some(o.conservative_gain_pct)
    });
    let avg_aggressive_gain_pct = mean_gain(&occurrences, |o| {
        o.aggressive_hit.then_some(o.aggressive_gain_pct)
    });

    // Two-tier preference: aggressive first, conservative as the fallback.
    // Too small a sample approves nothing — insufficient evidence is not
    // proof of failure, but it is not proof of edge either.
    let enough = count >= config.min_occurrences;
    let tier = if enough && aggressive_hit_rate >= config.aggressive_hit_threshold {
        Some(TargetTier::Aggressive)
    } else if enough && conservative_hit_rate >= config.conservative_hit_threshold {
        Some(TargetTier::Conservative)
    } else {
        None
    };

    let chosen_price = match tier {
        Some(TargetTier::Aggressive) => formation.aggressive_target,
        _ => formation.conservative_target,
    };
    let risk_reward_ratio = formation.risk_reward(chosen_price).unwrap_or(0.0);
    let approved = tier.is_some() && risk_reward_ratio >= config.min_risk_reward;

    tracing::debug!(
        kind = %formation.kind,
        occurrences = count,
        cons_rate = conservative_hit_rate,
        aggr_rate = aggressive_hit_rate,
        approved,
        "formation validated"
    );

    ValidationResult {
        formation_kind: formation.kind,
        occurrence_count: count,
        conservative_hit_rate,
        aggressive_hit_rate,
        avg_conservative_gain_pct,
        avg_aggressive_gain_pct,
        risk_reward_ratio,
        approved,
        approved_target: if approved { tier } else { None },
    }
}

/// Scan every bar after a prior occurrence for target touches.
fn score_occurrence(prior: &Formation, forward: &[Bar]) -> Occurrence {
    let conservative_hit = forward.iter().any(|b| b.high >= prior.conservative_target);
    let aggressive_hit = forward.iter().any(|b| b.high >= prior.aggressive_target);
    Occurrence {
        conservative_hit,
        aggressive_hit,
        conservative_gain_pct: gain_pct(prior.entry_price, prior.conservative_target),
        aggressive_gain_pct: gain_pct(prior.entry_price, prior.aggressive_target),
    }
}

fn gain_pct(entry: f64, target: f64) -> f64 {
    if entry <= 0.0 {
        return 0.0;
    }
    (target - entry) / entry * 100.0
}

fn rate(hits: usize, count: usize) -> f64 {
    if count == 0 {
        return 0.0;
    }
    hits as f64 / count as f64
}

fn mean_gain(occurrences: &[Occurrence], pick: impl Fn(&Occurrence) -> Option<f64>) -> f64 {
    let gains: Vec<f64> = occurrences.iter().filter_map(pick).collect();
    if gains.is_empty() {
        return 0.0;
    }
    gains.iter().sum::<f64>() / gains.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::KeyLevels;
    use chrono::NaiveDate;

    const WINDOW_LEN: usize = 10;
    const MARKER_VOLUME: u64 = 7;

    /// Fires whenever the window's last bar carries the marker volume.
    /// Lets tests place occurrences at exact history indices.
    struct ScriptedDetector;

    impl FormationDetector for ScriptedDetector {
        fn kind(&self) -> PatternKind {
            PatternKind::CupWithHandle
        }

        fn min_bars(&self) -> usize {
            WINDOW_LEN
        }

        fn detect(&self, window: &[Bar]) -> Option<Formation> {
            let last = window.last()?;
            if last.volume != MARKER_VOLUME {
                return None;
            }
            Some(Formation {
                kind: PatternKind::CupWithHandle,
                symbol: last.symbol.clone(),
                window_start: window[0].date,
                window_end: last.date,
                levels: KeyLevels::default(),
                entry_price: 100.0,
                stop_loss: 95.0,
                conservative_target: 110.0,
                aggressive_target: 120.0,
            })
        }
    }

    fn flat_bar(i: usize) -> Bar {
        Bar {
            symbol: "ACME".into(),
            date: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap() + chrono::Duration::days(i as i64),
            open: 100.0,
            high: 101.0,
            low: 99.0,
            close: 100.0,
            volume: 1_000,
        }
    }

    /// History with `n_occurrences` marker windows at stride-5 end points,
    /// a 125-high spike after occurrence `aggr_hits` and a 115-high spike
    /// after occurrence `cons_hits` (counting from the earliest).
    fn scripted_history(n_occurrences: usize, cons_hits: usize, aggr_hits: usize) -> Vec<Bar> {
        let stride = 5;
        let len = WINDOW_LEN + n_occurrences * stride;
        let mut bars: Vec<Bar> = (0..len).map(flat_bar).collect();

        // Marker on the last bar of each enumerated window: ends at
        // WINDOW_LEN, WINDOW_LEN+5, ... so last-bar indices are end-1.
        for k in 0..n_occurrences {
            let end = WINDOW_LEN + k * stride;
            bars[end - 1].volume = MARKER_VOLUME;
        }

        // Forward scans see all subsequent bars, so a spike after the k-th
        // occurrence's end is visible to occurrences 1..=k only.
        if aggr_hits > 0 {
            let idx = WINDOW_LEN + (aggr_hits - 1) * stride + 1;
            bars[idx].high = 125.0;
        }
        if cons_hits > aggr_hits {
            let idx = WINDOW_LEN + (cons_hits - 1) * stride + 1;
            bars[idx].high = 115.0;
        }
        bars
    }

    fn current_formation() -> Formation {
        Formation {
            kind: PatternKind::CupWithHandle,
            symbol: "ACME".into(),
            window_start: NaiveDate::from_ymd_opt(2020, 6, 1).unwrap(),
            window_end: NaiveDate::from_ymd_opt(2020, 6, 20).unwrap(),
            levels: KeyLevels::default(),
            entry_price: 100.0,
            stop_loss: 95.0,
            conservative_target: 110.0,
            aggressive_target: 120.0,
        }
    }

    fn config() -> ValidatorConfig {
        ValidatorConfig {
            stride: 5,
            ..ValidatorConfig::default()
        }
    }

    #[test]
    fn two_tier_scenario_prefers_conservative() {
        // 20 occurrences, conservative hit 16/20 (80%), aggressive 8/20 (40%):
        // the aggressive tier misses its 70% bar, the conservative one clears
        // 55%, and risk/reward (110-100)/(100-95) = 2.0 passes the minimum.
        let history = scripted_history(20, 16, 8);
        let result = validate_formation(
            &current_formation(),
            &history,
            &ScriptedDetector,
            WINDOW_LEN,
            &config(),
        );

        assert_eq!(result.occurrence_count, 20);
        assert!((result.conservative_hit_rate - 0.80).abs() < 1e-10);
        assert!((result.aggressive_hit_rate - 0.40).abs() < 1e-10);
        assert!((result.risk_reward_ratio - 2.0).abs() < 1e-10);
        assert!(result.approved);
        assert_eq!(result.approved_target, Some(TargetTier::Conservative));
        // Gains are measured entry→target: 10% and 20%.
        assert!((result.avg_conservative_gain_pct - 10.0).abs() < 1e-10);
        assert!((result.avg_aggressive_gain_pct - 20.0).abs() < 1e-10);
    }

    #[test]
    fn aggressive_tier_preferred_when_reliable() {
        // 20 occurrences, aggressive hit 16/20 (80%): aggressive wins even
        // though conservative also qualifies.
        let history = scripted_history(20, 16, 16);
        let result = validate_formation(
            &current_formation(),
            &history,
            &ScriptedDetector,
            WINDOW_LEN,
            &config(),
        );
        assert!(result.approved);
        assert_eq!(result.approved_target, Some(TargetTier::Aggressive));
        // Risk/reward computed on the aggressive tier: (120-100)/5 = 4.0.
        assert!((result.risk_reward_ratio - 4.0).abs() < 1e-10);
    }

    #[test]
    fn sample_size_gate_blocks_approval() {
        // 5 occurrences, all of them hits — still below min_occurrences.
        let history = scripted_history(5, 5, 5);
        let result = validate_formation(
            &current_formation(),
            &history,
            &ScriptedDetector,
            WINDOW_LEN,
            &config(),
        );
        assert_eq!(result.occurrence_count, 5);
        assert!((result.conservative_hit_rate - 1.0).abs() < 1e-10);
        assert!(!result.approved);
        assert_eq!(result.approved_target, None);
    }

    #[test]
    fn risk_reward_gate_blocks_approval() {
        // Hit rates qualify, but the stop is so far away that r/r < 2.
        let mut formation = current_formation();
        formation.stop_loss = 80.0; // (110-100)/(100-80) = 0.5
        let history = scripted_history(20, 16, 8);
        let result = validate_formation(
            &formation,
            &history,
            &ScriptedDetector,
            WINDOW_LEN,
            &config(),
        );
        assert!(!result.approved);
        assert_eq!(result.approved_target, None);
        assert!((result.risk_reward_ratio - 0.5).abs() < 1e-10);
        // Rates stay visible for explainability.
        assert!((result.conservative_hit_rate - 0.80).abs() < 1e-10);
    }

    #[test]
    fn inverted_stop_never_approves() {
        let mut formation = current_formation();
        formation.stop_loss = 100.0;
        let history = scripted_history(20, 20, 20);
        let result = validate_formation(
            &formation,
            &history,
            &ScriptedDetector,
            WINDOW_LEN,
            &config(),
        );
        assert!(!result.approved);
        assert_eq!(result.risk_reward_ratio, 0.0);
    }

    #[test]
    fn no_history_means_no_occurrences() {
        let history: Vec<Bar> = (0..WINDOW_LEN).map(flat_bar).collect();
        let result = validate_formation(
            &current_formation(),
            &history,
            &ScriptedDetector,
            WINDOW_LEN,
            &config(),
        );
        assert_eq!(result.occurrence_count, 0);
        assert!(!result.approved);
    }

    #[test]
    fn stride_one_counts_more_windows() {
        // Same physical history, finer stride: the sampling heuristic is
        // visible in the occurrence count (markers sit 5 bars apart, so the
        // count is unchanged here, but every intermediate window is probed).
        let history = scripted_history(20, 16, 8);
        let fine = ValidatorConfig {
            stride: 1,
            ..ValidatorConfig::default()
        };
        let result = validate_formation(
            &current_formation(),
            &history,
            &ScriptedDetector,
            WINDOW_LEN,
            &fine,
        );
        assert_eq!(result.occurrence_count, 20);
    }

    #[test]
    fn approved_price_maps_tier_to_formation_levels() {
        let history = scripted_history(20, 16, 8);
        let formation = current_formation();
        let result = validate_formation(
            &formation,
            &history,
            &ScriptedDetector,
            WINDOW_LEN,
            &config(),
        );
        assert_eq!(result.approved_price(&formation), Some(110.0));
        assert_eq!(result.approved_hit_rate(), Some(0.80));
    }
}
