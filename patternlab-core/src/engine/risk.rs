//! Risk manager — portfolio-level limit checks and position sizing.
//!
//! `can_open` evaluates every limit independently and reports all failing
//! checks at once: a veto is an expected, explainable outcome, not an
//! error, and the caller needs to know every reason. Sizing uses a
//! half-scaled Kelly fraction with a fixed fallback when no trade history
//! exists yet.

use crate::domain::Position;
use serde::{Deserialize, Serialize};

/// Portfolio-level limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskLimits {
    /// Maximum concurrent open positions.
    pub max_open_positions: usize,
    /// Maximum single-position notional as a fraction of equity.
    pub max_position_fraction: f64,
    /// Maximum (entry − stop) × quantity as a fraction of equity.
    pub max_risk_per_trade: f64,
    /// Maximum drawdown from peak equity before new entries stop.
    pub max_drawdown: f64,
    /// Equity fraction risked when no trade statistics exist yet.
    pub default_risk_fraction: f64,
}

impl Default for RiskLimits {
    fn default() -> Self {
        Self {
            max_open_positions: 5,
            max_position_fraction: 0.20,
            max_risk_per_trade: 0.02,
            max_drawdown: 0.25,
            default_risk_fraction: 0.02,
        }
    }
}

/// One failed limit check, with the numbers that failed it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "check", rename_all = "snake_case")]
pub enum RiskBreach {
    TooManyPositions { open: usize, max: usize },
    PositionTooLarge { fraction: f64, max: f64 },
    RiskPerTradeExceeded { fraction: f64, max: f64 },
    DrawdownExceeded { drawdown: f64, max: f64 },
}

/// Outcome of `can_open`: approved only when every check passed; all
/// failing checks are listed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskVerdict {
    pub approved: bool,
    pub breaches: Vec<RiskBreach>,
}

/// A candidate entry, as seen by the risk checks.
#[derive(Debug, Clone)]
pub struct ProposedEntry {
    pub quantity: u64,
    pub entry_price: f64,
    pub stop_loss: f64,
}

/// Portfolio numbers the checks need — decoupled from the ledger so the
/// checks stay pure and testable in isolation.
#[derive(Debug, Clone, Copy)]
pub struct PortfolioView {
    pub equity: f64,
    pub peak_equity: f64,
    pub open_positions: usize,
}

/// Win/loss statistics from closed positions, feeding the Kelly sizer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TradeStats {
    /// Fraction of closed positions with positive net P&L.
    pub win_rate: f64,
    /// Mean net return of winners, as a fraction of cost basis.
    pub avg_win: f64,
    /// Mean absolute net return of losers, as a fraction of cost basis.
    pub avg_loss: f64,
}

impl TradeStats {
    /// Compute from closed positions. `None` until at least one has closed.
    pub fn from_closed(closed: &[Position]) -> Option<Self> {
        if closed.is_empty() {
            return None;
        }
        let returns: Vec<f64> = closed.iter().map(Position::return_pct).collect();
        let wins: Vec<f64> = returns.iter().copied().filter(|r| *r > 0.0).collect();
        let losses: Vec<f64> = returns.iter().copied().filter(|r| *r <= 0.0).collect();

        let win_rate = wins.len() as f64 / returns.len() as f64;
        let avg_win = mean(&wins);
        let avg_loss = mean(&losses).abs();
        Some(Self {
            win_rate,
            avg_win,
            avg_loss,
        })
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Stateless gate + sizer over `RiskLimits`.
#[derive(Debug, Clone)]
pub struct RiskManager {
    pub limits: RiskLimits,
}

impl RiskManager {
    pub fn new(limits: RiskLimits) -> Self {
        Self { limits }
    }

    /// Evaluate all four limit checks. Never short-circuits: every failing
    /// check appears in the verdict.
    pub fn can_open(&self, view: &PortfolioView, proposed: &ProposedEntry) -> RiskVerdict {
        let mut breaches = Vec::new();
        let limits = &self.limits;

        if view.open_positions >= limits.max_open_positions {
            breaches.push(RiskBreach::TooManyPositions {
                open: view.open_positions,
                max: limits.max_open_positions,
            });
        }

        if view.equity > 0.0 {
            let notional = proposed.entry_price * proposed.quantity as f64;
            let fraction = notional / view.equity;
            if fraction > limits.max_position_fraction {
                breaches.push(RiskBreach::PositionTooLarge {
                    fraction,
                    max: limits.max_position_fraction,
                });
            }

            let risk = (proposed.entry_price - proposed.stop_loss) * proposed.quantity as f64;
            let risk_fraction = risk / view.equity;
            if risk_fraction > limits.max_risk_per_trade {
                breaches.push(RiskBreach::RiskPerTradeExceeded {
                    fraction: risk_fraction,
                    max: limits.max_risk_per_trade,
                });
            }
        }

        if view.peak_equity > 0.0 {
            let drawdown = (view.peak_equity - view.equity) / view.peak_equity;
            if drawdown > limits.max_drawdown {
                breaches.push(RiskBreach::DrawdownExceeded {
                    drawdown,
                    max: limits.max_drawdown,
                });
            }
        }

        RiskVerdict {
            approved: breaches.is_empty(),
            breaches,
        }
    }

    /// Bounded position size from a half-scaled Kelly fraction.
    ///
    /// `f = (p·W − (1−p)·L) / W`, clipped to [0, max_position_fraction],
    /// then halved. Falls back to `default_risk_fraction` when there are no
    /// statistics yet or the average loss is zero (Kelly undefined).
    pub fn safe_quantity(
        &self,
        equity: f64,
        entry_price: f64,
        stats: Option<&TradeStats>,
    ) -> u64 {
        if equity <= 0.0 || entry_price <= 0.0 {
            return 0;
        }
        let limits = &self.limits;
        let fraction = match stats {
            Some(s) if s.avg_loss > 0.0 && s.avg_win > 0.0 => {
                let kelly = (s.win_rate * s.avg_win - (1.0 - s.win_rate) * s.avg_loss) / s.avg_win;
                (kelly.clamp(0.0, limits.max_position_fraction)) * 0.5
            }
            _ => limits.default_risk_fraction,
        };
        (fraction * equity / entry_price).floor() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn healthy_view() -> PortfolioView {
        PortfolioView {
            equity: 100_000.0,
            peak_equity: 100_000.0,
            open_positions: 0,
        }
    }

    fn small_entry() -> ProposedEntry {
        ProposedEntry {
            quantity: 10,
            entry_price: 100.0,
            stop_loss: 95.0,
        }
    }

    #[test]
    fn approves_when_all_checks_pass() {
        let manager = RiskManager::new(RiskLimits::default());
        let verdict = manager.can_open(&healthy_view(), &small_entry());
        assert!(verdict.approved);
        assert!(verdict.breaches.is_empty());
    }

    #[test]
    fn position_count_check_in_isolation() {
        let manager = RiskManager::new(RiskLimits::default());
        let view = PortfolioView {
            open_positions: 5,
            ..healthy_view()
        };
        let verdict = manager.can_open(&view, &small_entry());
        assert!(!verdict.approved);
        assert_eq!(verdict.breaches.len(), 1);
        assert!(matches!(
            verdict.breaches[0],
            RiskBreach::TooManyPositions { open: 5, max: 5 }
        ));
    }

    #[test]
    fn position_size_check_in_isolation() {
        let manager = RiskManager::new(RiskLimits::default());
        // 25% of equity, stop tight enough to keep risk-per-trade legal:
        // (100 - 99.9) * 250 / 100_000 = 0.025% risk.
        let proposed = ProposedEntry {
            quantity: 250,
            entry_price: 100.0,
            stop_loss: 99.9,
        };
        let verdict = manager.can_open(&healthy_view(), &proposed);
        assert!(!verdict.approved);
        assert_eq!(verdict.breaches.len(), 1);
        assert!(matches!(
            verdict.breaches[0],
            RiskBreach::PositionTooLarge { .. }
        ));
    }

    #[test]
    fn risk_per_trade_check_in_isolation() {
        let manager = RiskManager::new(RiskLimits::default());
        // Notional 15% (legal), but stop 20% away: risk = 3% > 2% cap.
        let proposed = ProposedEntry {
            quantity: 150,
            entry_price: 100.0,
            stop_loss: 80.0,
        };
        let verdict = manager.can_open(&healthy_view(), &proposed);
        assert!(!verdict.approved);
        assert_eq!(verdict.breaches.len(), 1);
        assert!(matches!(
            verdict.breaches[0],
            RiskBreach::RiskPerTradeExceeded { .. }
        ));
    }

    #[test]
    fn drawdown_check_in_isolation() {
        let manager = RiskManager::new(RiskLimits::default());
        let view = PortfolioView {
            equity: 70_000.0,
            peak_equity: 100_000.0,
            open_positions: 0,
        };
        let verdict = manager.can_open(&view, &small_entry());
        assert!(!verdict.approved);
        assert_eq!(verdict.breaches.len(), 1);
        assert!(matches!(
            verdict.breaches[0],
            RiskBreach::DrawdownExceeded { .. }
        ));
    }

    #[test]
    fn all_failing_checks_are_reported() {
        let manager = RiskManager::new(RiskLimits::default());
        let view = PortfolioView {
            equity: 60_000.0,
            peak_equity: 100_000.0,
            open_positions: 5,
        };
        let proposed = ProposedEntry {
            quantity: 300,
            entry_price: 100.0,
            stop_loss: 80.0,
        };
        let verdict = manager.can_open(&view, &proposed);
        assert!(!verdict.approved);
        // Count, size, risk-per-trade, and drawdown all fail together.
        assert_eq!(verdict.breaches.len(), 4);
    }

    #[test]
    fn kelly_sizing_half_scaled() {
        let manager = RiskManager::new(RiskLimits::default());
        let stats = TradeStats {
            win_rate: 0.6,
            avg_win: 0.10,
            avg_loss: 0.05,
        };
        // Kelly = (0.6*0.10 - 0.4*0.05) / 0.10 = 0.4, clipped to 0.20,
        // halved to 0.10 → 10% of 100k at $100 = 100 shares.
        let quantity = manager.safe_quantity(100_000.0, 100.0, Some(&stats));
        assert_eq!(quantity, 100);
    }

    #[test]
    fn kelly_negative_edge_sizes_zero() {
        let manager = RiskManager::new(RiskLimits::default());
        let stats = TradeStats {
            win_rate: 0.2,
            avg_win: 0.05,
            avg_loss: 0.10,
        };
        // Kelly negative → clamp to 0 → no position.
        assert_eq!(manager.safe_quantity(100_000.0, 100.0, Some(&stats)), 0);
    }

    #[test]
    fn sizing_falls_back_without_stats() {
        let manager = RiskManager::new(RiskLimits::default());
        // 2% of 100k at $100 = 20 shares.
        assert_eq!(manager.safe_quantity(100_000.0, 100.0, None), 20);
    }

    #[test]
    fn sizing_falls_back_when_avg_loss_zero() {
        let manager = RiskManager::new(RiskLimits::default());
        let stats = TradeStats {
            win_rate: 1.0,
            avg_win: 0.10,
            avg_loss: 0.0,
        };
        assert_eq!(manager.safe_quantity(100_000.0, 100.0, Some(&stats)), 20);
    }

    #[test]
    fn trade_stats_from_closed_positions() {
        use chrono::NaiveDate;
        let date = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let mut winner = Position::new("A".into(), 100, 100.0, date, 95.0, 110.0);
        winner.realized_pnl = 1_000.0; // +10% gross
        winner.open = false;
        let mut loser = Position::new("B".into(), 100, 100.0, date, 95.0, 110.0);
        loser.realized_pnl = -500.0; // -5% gross
        loser.open = false;

        let stats = TradeStats::from_closed(&[winner, loser]).unwrap();
        assert!((stats.win_rate - 0.5).abs() < 1e-10);
        assert!((stats.avg_win - 0.10).abs() < 1e-10);
        assert!((stats.avg_loss - 0.05).abs() < 1e-10);
    }

    #[test]
    fn trade_stats_empty_is_none() {
        assert!(TradeStats::from_closed(&[]).is_none());
    }
}
