//! Report building and export.
//!
//! The report is the run's full explainability surface: headline metrics,
//! the complete fill log, the equity curve, and — per instrument — every
//! formation that was detected with its validation statistics and final
//! disposition. Exports: pretty JSON, a markdown summary, and a CSV trade
//! log.

use crate::config::RunId;
use crate::metrics::PerformanceMetrics;
use anyhow::{Context, Result};
use patternlab_core::domain::{EquitySnapshot, Trade};
use patternlab_core::engine::{AuditOutcome, FormationAudit, SimulationOutcome};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Structured result document for one simulation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationReport {
    pub run_id: RunId,
    pub initial_capital: f64,
    pub final_equity: f64,
    pub days_simulated: usize,
    pub metrics: PerformanceMetrics,
    pub trades: Vec<Trade>,
    pub equity_curve: Vec<EquitySnapshot>,
    /// Every detected formation, grouped per instrument in a stable order.
    pub formations: BTreeMap<String, Vec<FormationAudit>>,
}

impl SimulationReport {
    pub fn from_outcome(run_id: RunId, outcome: SimulationOutcome) -> Self {
        let portfolio = outcome.portfolio;
        let metrics =
            PerformanceMetrics::compute(&portfolio.snapshots, &portfolio.closed_positions);
        let final_equity = portfolio
            .snapshots
            .last()
            .map(|s| s.total_value)
            .unwrap_or(portfolio.initial_capital);

        let mut formations: BTreeMap<String, Vec<FormationAudit>> = BTreeMap::new();
        for audit in outcome.audits {
            formations
                .entry(audit.instrument.clone())
                .or_default()
                .push(audit);
        }

        Self {
            run_id,
            initial_capital: portfolio.initial_capital,
            final_equity,
            days_simulated: outcome.days_simulated,
            metrics,
            trades: portfolio.trade_log,
            equity_curve: portfolio.snapshots,
            formations,
        }
    }

    /// Human-readable summary.
    pub fn render_markdown(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("# Simulation Report `{}`\n\n", &self.run_id[..12]));
        out.push_str(&format!(
            "- Days simulated: {}\n- Initial capital: {:.2}\n- Final equity: {:.2}\n",
            self.days_simulated, self.initial_capital, self.final_equity
        ));
        out.push_str(&format!(
            "- Total return: {:.2}%\n- Sharpe: {:.2}\n- Max drawdown: {:.2}%\n",
            self.metrics.total_return * 100.0,
            self.metrics.sharpe,
            self.metrics.max_drawdown * 100.0
        ));
        out.push_str(&format!(
            "- Trades: {} (win rate {:.1}%, avg win {:+.2}%, avg loss {:+.2}%)\n\n",
            self.metrics.trade_count,
            self.metrics.win_rate * 100.0,
            self.metrics.avg_win_pct,
            self.metrics.avg_loss_pct
        ));

        out.push_str("## Formations\n\n");
        if self.formations.is_empty() {
            out.push_str("No formations detected.\n");
        }
        for (instrument, audits) in &self.formations {
            out.push_str(&format!("### {instrument}\n\n"));
            out.push_str(
                "| date | kind | occurrences | cons. hit | aggr. hit | r/r | disposition |\n",
            );
            out.push_str("|---|---|---|---|---|---|---|\n");
            for audit in audits {
                out.push_str(&format!(
                    "| {} | {} | {} | {:.0}% | {:.0}% | {:.2} | {} |\n",
                    audit.as_of,
                    audit.formation.kind,
                    audit.validation.occurrence_count,
                    audit.validation.conservative_hit_rate * 100.0,
                    audit.validation.aggressive_hit_rate * 100.0,
                    audit.validation.risk_reward_ratio,
                    disposition_label(&audit.outcome),
                ));
            }
            out.push('\n');
        }

        out.push_str("## Trades\n\n");
        if self.trades.is_empty() {
            out.push_str("No trades executed.\n");
        } else {
            out.push_str("| date | symbol | side | qty | requested | filled | cost | reason |\n");
            out.push_str("|---|---|---|---|---|---|---|---|\n");
            for trade in &self.trades {
                out.push_str(&format!(
                    "| {} | {} | {:?} | {} | {:.2} | {:.2} | {:.2} | {:?} |\n",
                    trade.date,
                    trade.symbol,
                    trade.side,
                    trade.quantity,
                    trade.requested_price,
                    trade.filled_price,
                    trade.cost,
                    trade.reason,
                ));
            }
        }
        out
    }

    /// Write the full report as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("failed to serialize report")?;
        std::fs::write(path.as_ref(), json)
            .with_context(|| format!("failed to write {}", path.as_ref().display()))?;
        Ok(())
    }

    /// Write the trade log as CSV.
    pub fn write_trades_csv(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut writer = csv::Writer::from_path(path.as_ref())
            .with_context(|| format!("failed to create {}", path.as_ref().display()))?;
        for trade in &self.trades {
            writer.serialize(trade).context("failed to write trade")?;
        }
        writer.flush().context("failed to flush trade log")?;
        Ok(())
    }
}

fn disposition_label(outcome: &AuditOutcome) -> String {
    match outcome {
        AuditOutcome::NotApproved => "not approved".into(),
        AuditOutcome::DecisionHold => "decision: hold".into(),
        AuditOutcome::DecisionFailed => "decision failed".into(),
        AuditOutcome::RiskVetoed { breaches } => format!("risk veto ({} checks)", breaches.len()),
        AuditOutcome::SizedToZero => "sized to zero".into(),
        AuditOutcome::InsufficientCash => "insufficient cash".into(),
        AuditOutcome::Entered { quantity } => format!("entered {quantity}"),
    }
}
