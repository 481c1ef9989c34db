//! Performance metrics — pure functions over the equity curve and closed
//! positions. No dependencies on the simulator or data layer.

use patternlab_core::domain::{EquitySnapshot, Position};
use serde::{Deserialize, Serialize};

/// Aggregate performance statistics for one simulation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    /// Total return as a fraction of initial equity.
    pub total_return: f64,
    /// Annualized Sharpe ratio from daily snapshot returns.
    pub sharpe: f64,
    /// Maximum drawdown as a negative fraction (e.g. -0.15).
    pub max_drawdown: f64,
    /// Fraction of closed positions with positive net P&L.
    pub win_rate: f64,
    /// Mean net return of winning positions, percent of cost basis.
    pub avg_win_pct: f64,
    /// Mean net return of losing positions, percent of cost basis
    /// (negative).
    pub avg_loss_pct: f64,
    pub trade_count: usize,
}

impl PerformanceMetrics {
    pub fn compute(snapshots: &[EquitySnapshot], closed: &[Position]) -> Self {
        let equity: Vec<f64> = snapshots.iter().map(|s| s.total_value).collect();
        Self {
            total_return: total_return(&equity),
            sharpe: sharpe_ratio(&equity, 0.0),
            max_drawdown: max_drawdown(&equity),
            win_rate: win_rate(closed),
            avg_win_pct: avg_win_pct(closed),
            avg_loss_pct: avg_loss_pct(closed),
            trade_count: closed.len(),
        }
    }
}

// ─── Individual metric functions ────────────────────────────────────

/// Total return as a fraction: (final - initial) / initial.
pub fn total_return(equity: &[f64]) -> f64 {
    if equity.len() < 2 {
        return 0.0;
    }
    let initial = equity[0];
    if initial <= 0.0 {
        return 0.0;
    }
    (equity[equity.len() - 1] - initial) / initial
}

/// Annualized Sharpe ratio from daily returns.
///
/// `mean(daily - rf) / std(daily) * sqrt(252)`; 0.0 for constant equity or
/// fewer than 3 snapshots.
pub fn sharpe_ratio(equity: &[f64], risk_free_rate: f64) -> f64 {
    let returns = daily_returns(equity);
    if returns.len() < 2 {
        return 0.0;
    }
    let daily_rf = risk_free_rate / 252.0;
    let excess: Vec<f64> = returns.iter().map(|r| r - daily_rf).collect();
    let mean = mean(&excess);
    let std = std_dev(&excess);
    if std < 1e-15 {
        return 0.0;
    }
    (mean / std) * (252.0_f64).sqrt()
}

/// Maximum drawdown as a negative fraction; 0.0 when equity never declines.
pub fn max_drawdown(equity: &[f64]) -> f64 {
    let mut peak = match equity.first() {
        Some(&v) => v,
        None => return 0.0,
    };
    let mut max_dd = 0.0_f64;
    for &value in equity {
        if value > peak {
            peak = value;
        }
        if peak > 0.0 {
            let dd = (value - peak) / peak;
            if dd < max_dd {
                max_dd = dd;
            }
        }
    }
    max_dd
}

/// Fraction of closed positions that won (net of costs).
pub fn win_rate(closed: &[Position]) -> f64 {
    if closed.is_empty() {
        return 0.0;
    }
    closed.iter().filter(|p| p.is_winner()).count() as f64 / closed.len() as f64
}

/// Mean net return of winners, in percent. 0.0 without winners.
pub fn avg_win_pct(closed: &[Position]) -> f64 {
    let wins: Vec<f64> = closed
        .iter()
        .filter(|p| p.is_winner())
        .map(|p| p.return_pct() * 100.0)
        .collect();
    mean(&wins)
}

/// Mean net return of losers, in percent (negative). 0.0 without losers.
pub fn avg_loss_pct(closed: &[Position]) -> f64 {
    let losses: Vec<f64> = closed
        .iter()
        .filter(|p| !p.is_winner())
        .map(|p| p.return_pct() * 100.0)
        .collect();
    mean(&losses)
}

// ─── Helpers ────────────────────────────────────────────────────────

fn daily_returns(equity: &[f64]) -> Vec<f64> {
    equity
        .windows(2)
        .map(|w| if w[0] > 0.0 { (w[1] - w[0]) / w[0] } else { 0.0 })
        .collect()
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = mean(values);
    let variance =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}
