//! Formation detectors — tolerance-banded geometric pattern recognition.
//!
//! Each detector scans one trailing window of bars and returns at most one
//! `Formation`. All acceptance bands are hard gates from `DetectorConfig`;
//! a window that violates any bound yields `None`, never a partial score.

use crate::domain::{Bar, Formation, KeyLevels, PatternKind};
use crate::patterns::config::DetectorConfig;

/// A detector for one pattern kind.
///
/// Detectors only ever see the window the caller slices for them, so the
/// as-of cutoff is enforced upstream by `PriceHistory::window_before`.
pub trait FormationDetector: Send + Sync {
    fn kind(&self) -> PatternKind;

    /// Minimum window length below which detection is meaningless.
    fn min_bars(&self) -> usize;

    /// Return the formation this window ends in, if any.
    fn detect(&self, window: &[Bar]) -> Option<Formation>;
}

// ─── Shared geometry helpers ─────────────────────────────────────────

fn argmax_high(window: &[Bar]) -> (usize, f64) {
    let mut idx = 0;
    let mut best = f64::MIN;
    for (i, bar) in window.iter().enumerate() {
        if bar.high > best {
            best = bar.high;
            idx = i;
        }
    }
    (idx, best)
}

fn argmin_low(window: &[Bar]) -> (usize, f64) {
    let mut idx = 0;
    let mut best = f64::MAX;
    for (i, bar) in window.iter().enumerate() {
        if bar.low < best {
            best = bar.low;
            idx = i;
        }
    }
    (idx, best)
}

/// Simple moving average of closes; NaN until `period` bars have passed.
fn sma(window: &[Bar], period: usize) -> Vec<f64> {
    let n = window.len();
    let mut result = vec![f64::NAN; n];
    if n < period || period == 0 {
        return result;
    }
    let mut sum: f64 = window.iter().take(period).map(|b| b.close).sum();
    result[period - 1] = sum / period as f64;
    for i in period..n {
        sum += window[i].close - window[i - period].close;
        result[i] = sum / period as f64;
    }
    result
}

/// Left peak + banded trough, the base shared by cup and rounded bottom.
///
/// The window's minimum must fall in the middle position band — a trough
/// near either edge is a V-shaped move, not a rounded base. Returns
/// `(peak_idx, peak, trough_idx, trough)` or `None` when the trough sits
/// outside the band, precedes the peak, or the depth is out of bounds.
fn base_geometry(window: &[Bar], config: &DetectorConfig) -> Option<(usize, f64, usize, f64)> {
    let n = window.len();
    let (peak_idx, peak) = argmax_high(window);
    let (trough_idx, trough) = argmin_low(window);

    let position = trough_idx as f64 / n as f64;
    if position < config.trough_position_min || position > config.trough_position_max {
        return None;
    }

    // The peak must form the left side of the base.
    if peak_idx >= trough_idx {
        return None;
    }

    let depth = (peak - trough) / peak;
    if depth < config.depth_min || depth > config.depth_max {
        return None;
    }

    Some((peak_idx, peak, trough_idx, trough))
}

// ─── Cup with handle ─────────────────────────────────────────────────

/// Cup-with-handle: rounded base off a left peak, then a shallow handle
/// consolidation that holds the upper part of the cup range.
#[derive(Debug, Clone)]
pub struct CupWithHandleDetector {
    config: DetectorConfig,
}

impl CupWithHandleDetector {
    pub fn new(config: DetectorConfig) -> Self {
        Self { config }
    }
}

impl FormationDetector for CupWithHandleDetector {
    fn kind(&self) -> PatternKind {
        PatternKind::CupWithHandle
    }

    fn min_bars(&self) -> usize {
        30
    }

    fn detect(&self, window: &[Bar]) -> Option<Formation> {
        let n = window.len();
        if n < self.min_bars() {
            return None;
        }
        let cfg = &self.config;
        let (_, peak, trough_idx, trough) = base_geometry(window, cfg)?;

        // Handle: the recovery high after the trough, then the pullback low.
        let right = &window[trough_idx + 1..];
        if right.len() < 2 {
            return None;
        }
        let (rel_high_idx, handle_high) = argmax_high(right);
        let handle_high_idx = trough_idx + 1 + rel_high_idx;
        if handle_high_idx + 1 >= n {
            // Recovery high is the last bar: no handle has formed yet.
            return None;
        }
        let (_, handle_low) = argmin_low(&window[handle_high_idx..]);

        // Handle must hold the upper part of the cup range.
        let handle_pos = (handle_low - trough) / (peak - trough);
        if handle_pos < cfg.handle_floor {
            return None;
        }

        // And its own pullback must stay shallow.
        let handle_depth = (handle_high - handle_low) / handle_high;
        if handle_depth > cfg.handle_depth_max {
            return None;
        }

        let entry_price = window[n - 1].close;
        if entry_price <= handle_low {
            return None;
        }

        let conservative_target = peak;
        Some(Formation {
            kind: self.kind(),
            symbol: window[0].symbol.clone(),
            window_start: window[0].date,
            window_end: window[n - 1].date,
            levels: KeyLevels {
                left_peak: Some(peak),
                trough: Some(trough),
                handle_low: Some(handle_low),
            },
            entry_price,
            stop_loss: handle_low,
            conservative_target,
            aggressive_target: conservative_target + (peak - trough),
        })
    }
}

// ─── Rounded bottom ──────────────────────────────────────────────────

/// Rounded bottom: a saucer-shaped base whose middle third hugs the trough,
/// with the right side having recovered most of the decline.
#[derive(Debug, Clone)]
pub struct RoundedBottomDetector {
    config: DetectorConfig,
}

impl RoundedBottomDetector {
    pub fn new(config: DetectorConfig) -> Self {
        Self { config }
    }
}

impl FormationDetector for RoundedBottomDetector {
    fn kind(&self) -> PatternKind {
        PatternKind::RoundedBottom
    }

    fn min_bars(&self) -> usize {
        30
    }

    fn detect(&self, window: &[Bar]) -> Option<Formation> {
        let n = window.len();
        if n < self.min_bars() {
            return None;
        }
        let cfg = &self.config;
        let (_, peak, _, trough) = base_geometry(window, cfg)?;
        let depth_price = peak - trough;

        // Roundedness: the middle third must stay near the trough. A spike
        // low with the rest of the middle far above it is a V, not a bowl.
        let third = n / 3;
        let middle = &window[third..2 * third];
        let mid_mean_low = middle.iter().map(|b| b.low).sum::<f64>() / middle.len() as f64;
        if mid_mean_low > trough + cfg.roundness_max * depth_price {
            return None;
        }

        // Recovery: the right lip must have climbed most of the way back.
        let entry_price = window[n - 1].close;
        if entry_price < trough + cfg.recovery_min * depth_price {
            return None;
        }
        if entry_price <= trough {
            return None;
        }

        Some(Formation {
            kind: self.kind(),
            symbol: window[0].symbol.clone(),
            window_start: window[0].date,
            window_end: window[n - 1].date,
            levels: KeyLevels {
                left_peak: Some(peak),
                trough: Some(trough),
                handle_low: None,
            },
            entry_price,
            stop_loss: trough,
            conservative_target: peak,
            aggressive_target: peak + depth_price,
        })
    }
}

// ─── Golden cross ────────────────────────────────────────────────────

/// Golden cross: the fast moving average crosses above the slow one within
/// the last `cross_recency` bars of the window.
#[derive(Debug, Clone)]
pub struct GoldenCrossDetector {
    config: DetectorConfig,
}

impl GoldenCrossDetector {
    pub fn new(config: DetectorConfig) -> Self {
        Self { config }
    }
}

impl FormationDetector for GoldenCrossDetector {
    fn kind(&self) -> PatternKind {
        PatternKind::GoldenCross
    }

    fn min_bars(&self) -> usize {
        self.config.slow_period + 2
    }

    fn detect(&self, window: &[Bar]) -> Option<Formation> {
        let n = window.len();
        if n < self.min_bars() {
            return None;
        }
        let cfg = &self.config;
        let fast = sma(window, cfg.fast_period);
        let slow = sma(window, cfg.slow_period);

        let scan_from = n.saturating_sub(cfg.cross_recency).max(1);
        let mut cross: Option<(usize, f64)> = None;
        for i in scan_from..n {
            let (fc, sc, fp, sp) = (fast[i], slow[i], fast[i - 1], slow[i - 1]);
            if fc.is_nan() || sc.is_nan() || fp.is_nan() || sp.is_nan() {
                continue;
            }
            if fc > sc && fp <= sp {
                cross = Some((i, sc));
                break;
            }
        }
        let (_, slow_at_cross) = cross?;

        let (_, window_high) = argmax_high(window);
        let (_, window_low) = argmin_low(window);
        let entry_price = window[n - 1].close;

        // Degenerate when price already sits at the window high or under the
        // slow average.
        if entry_price >= window_high || entry_price <= slow_at_cross {
            return None;
        }

        let amplitude = window_high - window_low;
        Some(Formation {
            kind: self.kind(),
            symbol: window[0].symbol.clone(),
            window_start: window[0].date,
            window_end: window[n - 1].date,
            levels: KeyLevels {
                left_peak: Some(window_high),
                trough: Some(window_low),
                handle_low: None,
            },
            entry_price,
            stop_loss: slow_at_cross,
            conservative_target: window_high,
            aggressive_target: window_high + cfg.cross_extension * amplitude,
        })
    }
}

// ─── Detector set ────────────────────────────────────────────────────

/// Ordered collection of detectors; the first match wins, so one window
/// produces at most one formation.
pub struct DetectorSet {
    detectors: Vec<Box<dyn FormationDetector>>,
}

impl DetectorSet {
    /// The standard lineup: cup-with-handle, rounded bottom, golden cross.
    pub fn standard(config: &DetectorConfig) -> Self {
        Self {
            detectors: vec![
                Box::new(CupWithHandleDetector::new(config.clone())),
                Box::new(RoundedBottomDetector::new(config.clone())),
                Box::new(GoldenCrossDetector::new(config.clone())),
            ],
        }
    }

    pub fn from_detectors(detectors: Vec<Box<dyn FormationDetector>>) -> Self {
        Self { detectors }
    }

    pub fn detect(&self, window: &[Bar]) -> Option<Formation> {
        self.detectors.iter().find_map(|d| d.detect(window))
    }

    /// The detector for a specific kind (used by the validator's rescan).
    pub fn detector_for(&self, kind: PatternKind) -> Option<&dyn FormationDetector> {
        self.detectors
            .iter()
            .find(|d| d.kind() == kind)
            .map(|d| d.as_ref())
    }
}
