//! Walk-forward simulator — the chronological replay driver.
//!
//! Days run strictly in order and a decision on day D only ever sees bars
//! dated before D; D's own bar is used for execution (open) and exit
//! triggers (high/low/close) only. Per day: mark, exits, entries, snapshot.
//! Instrument evaluation inside a day is parallel, but all ledger mutations
//! happen in one serialized pass in deterministic order.

use crate::data::history::{DataError, HistoryStore};
use crate::domain::{Bar, FillReason, Formation, Portfolio};
use crate::engine::costs::CostModel;
use crate::engine::decision::{
    decide_with_retry, Decision, DecisionAction, DecisionRequest, DecisionSource, SnapshotSource,
};
use crate::engine::ledger::{FillSpec, Ledger, LedgerError};
use crate::engine::risk::{
    PortfolioView, ProposedEntry, RiskBreach, RiskLimits, RiskManager, TradeStats,
};
use crate::patterns::cache::{validation_cache_key, ValidationCache};
use crate::patterns::config::{DetectorConfig, ValidatorConfig};
use crate::patterns::detector::DetectorSet;
use crate::patterns::validator::{validate_formation, ValidationResult};
use chrono::NaiveDate;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Tunables for one simulation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulatorConfig {
    pub initial_capital: f64,
    /// Trailing detection window length in bars.
    pub window_len: usize,
    /// Poll the external exit signal at most every this many trading days.
    pub exit_check_interval: usize,
    /// Extra attempts after a failed decision call before giving up.
    pub decision_retries: usize,
    pub detector: DetectorConfig,
    pub validator: ValidatorConfig,
    pub cost_model: CostModel,
    pub risk_limits: RiskLimits,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            initial_capital: 100_000.0,
            window_len: 250,
            exit_check_interval: 5,
            decision_retries: 2,
            detector: DetectorConfig::default(),
            validator: ValidatorConfig::default(),
            cost_model: CostModel::default(),
            risk_limits: RiskLimits::default(),
        }
    }
}

/// Final disposition of a detected formation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "disposition", rename_all = "snake_case")]
pub enum AuditOutcome {
    /// Validator did not approve; the decision source was never consulted.
    NotApproved,
    /// Decision source declined to enter.
    DecisionHold,
    /// Decision source failed after retries; treated as no signal.
    DecisionFailed,
    /// Risk manager vetoed, with every failing check.
    RiskVetoed { breaches: Vec<RiskBreach> },
    /// Position sizing produced zero shares.
    SizedToZero,
    /// Cash could not cover the fill after costs.
    InsufficientCash,
    /// A position was opened.
    Entered { quantity: u64 },
}

/// One detected formation and what became of it — the explainability trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormationAudit {
    pub instrument: String,
    pub as_of: NaiveDate,
    pub formation: Formation,
    pub validation: ValidationResult,
    pub outcome: AuditOutcome,
}

/// Portfolio state frozen at the moment an invariant broke, so the failure
/// is reproducible from the error alone.
#[derive(Debug, Clone, Serialize)]
pub struct StateDump {
    pub day: NaiveDate,
    pub portfolio: Portfolio,
}

/// Fatal simulation failures.
#[derive(Debug, Error)]
pub enum SimulatorError {
    #[error("no trading days between {start} and {end}")]
    EmptyCalendar { start: NaiveDate, end: NaiveDate },
    #[error("accounting invariant violated on {day}: {source}")]
    Invariant {
        day: NaiveDate,
        #[source]
        source: LedgerError,
        dump: Box<StateDump>,
    },
    #[error(transparent)]
    Data(#[from] DataError),
}

/// Everything a finished run produced.
#[derive(Debug)]
pub struct SimulationOutcome {
    pub portfolio: Portfolio,
    pub audits: Vec<FormationAudit>,
    pub days_simulated: usize,
}

/// Result of one instrument's parallel evaluation, before the serialized
/// ledger pass.
struct EntryEvaluation {
    symbol: String,
    formation: Formation,
    validation: ValidationResult,
    /// `None` when the decision source failed after retries.
    decision: Option<Decision>,
}

/// The walk-forward driver. Borrows all collaborators; owns nothing but
/// the day loop.
pub struct Simulator<'a> {
    config: &'a SimulatorConfig,
    history: &'a HistoryStore,
    detectors: &'a DetectorSet,
    cache: &'a dyn ValidationCache,
    decision_source: &'a dyn DecisionSource,
    snapshots: &'a dyn SnapshotSource,
}

impl<'a> Simulator<'a> {
    pub fn new(
        config: &'a SimulatorConfig,
        history: &'a HistoryStore,
        detectors: &'a DetectorSet,
        cache: &'a dyn ValidationCache,
        decision_source: &'a dyn DecisionSource,
        snapshots: &'a dyn SnapshotSource,
    ) -> Self {
        Self {
            config,
            history,
            detectors,
            cache,
            decision_source,
            snapshots,
        }
    }

    /// Replay every trading day in `[start, end]` for the watchlist.
    pub fn run(
        &self,
        watchlist: &[String],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<SimulationOutcome, SimulatorError> {
        let days = self.history.trading_days(start, end);
        if days.is_empty() {
            return Err(SimulatorError::EmptyCalendar { start, end });
        }

        let mut watchlist: Vec<String> = watchlist.to_vec();
        watchlist.sort();
        watchlist.dedup();

        let mut ledger = Ledger::new(self.config.initial_capital);
        let risk = RiskManager::new(self.config.risk_limits.clone());
        let mut audits: Vec<FormationAudit> = Vec::new();
        let last_index = days.len() - 1;

        for (day_index, &day) in days.iter().enumerate() {
            let closes = self.closing_prices(&watchlist, day);

            // Phase 1: mark open positions to today's close.
            ledger.mark(&closes);

            // Phase 2: exits — stop before target (pessimistic tie-break),
            // then the rate-limited external exit signal.
            self.process_exits(&mut ledger, day, day_index)?;

            // Phase 3: entries. Skipped on the final day; anything opened
            // would be force-closed immediately.
            if day_index < last_index {
                let evaluations = self.evaluate_entries(&ledger, &watchlist, day);
                self.apply_entries(&mut ledger, &risk, evaluations, &closes, day, &mut audits)?;
            } else {
                self.force_close_all(&mut ledger, day)?;
            }

            // Phase 4: equity snapshot.
            ledger.snapshot(day, &closes);

            tracing::debug!(
                %day,
                equity = ledger.portfolio.snapshots.last().map(|s| s.total_value),
                open_positions = ledger.portfolio.open_position_count(),
                "day complete"
            );
        }

        Ok(SimulationOutcome {
            portfolio: ledger.portfolio,
            audits,
            days_simulated: days.len(),
        })
    }

    /// Today's close for every watchlist instrument that traded.
    fn closing_prices(&self, watchlist: &[String], day: NaiveDate) -> HashMap<String, f64> {
        let mut closes = HashMap::new();
        for symbol in watchlist {
            if let Ok(history) = self.history.get(symbol) {
                if let Some(bar) = history.bar_on(day) {
                    closes.insert(symbol.clone(), bar.close);
                }
            }
        }
        closes
    }

    fn process_exits(
        &self,
        ledger: &mut Ledger,
        day: NaiveDate,
        day_index: usize,
    ) -> Result<(), SimulatorError> {
        let mut held: Vec<String> = ledger.portfolio.positions.keys().cloned().collect();
        held.sort();

        for symbol in held {
            let Ok(history) = self.history.get(&symbol) else {
                continue;
            };
            let Some(bar) = history.bar_on(day) else {
                continue;
            };
            let bar = bar.clone();
            let position = &ledger.portfolio.positions[&symbol];
            let (stop, target) = (position.stop_loss, position.target_price);

            if bar.low <= stop {
                // When the same bar pierces both levels the fill order is
                // unknowable from daily data; assume the worse outcome.
                self.close_position(ledger, &symbol, stop, day, FillReason::StopLoss)?;
            } else if bar.high >= target {
                self.close_position(ledger, &symbol, target, day, FillReason::Target)?;
            } else if day_index % self.config.exit_check_interval.max(1) == 0 {
                if self.exit_signal_fires(&symbol, day) {
                    self.close_position(ledger, &symbol, bar.close, day, FillReason::ExitSignal)?;
                }
            }
        }
        Ok(())
    }

    /// Rate-limited poll of the external decision source for a held
    /// instrument. A failure after retries is "no signal".
    fn exit_signal_fires(&self, symbol: &str, day: NaiveDate) -> bool {
        let request = DecisionRequest {
            instrument: symbol,
            as_of: day,
            validation: None,
            fundamentals: self.snapshots.fundamentals(symbol, day),
            sentiment: self.snapshots.sentiment(symbol, day),
        };
        matches!(
            decide_with_retry(self.decision_source, &request, self.config.decision_retries),
            Some(Decision {
                action: DecisionAction::Sell,
                ..
            })
        )
    }

    /// Evaluate all unheld watchlist instruments for today, in parallel.
    /// No shared mutable state: the ledger is only read for held symbols.
    fn evaluate_entries(
        &self,
        ledger: &Ledger,
        watchlist: &[String],
        day: NaiveDate,
    ) -> Vec<EntryEvaluation> {
        let unheld: Vec<&String> = watchlist
            .iter()
            .filter(|s| !ledger.portfolio.has_position(s.as_str()))
            .collect();

        unheld
            .par_iter()
            .filter_map(|symbol| self.evaluate_instrument(symbol.as_str(), day))
            .collect()
    }

    fn evaluate_instrument(&self, symbol: &str, day: NaiveDate) -> Option<EntryEvaluation> {
        let history = self.history.get(symbol).ok()?;
        // No bar today means no way to execute an entry.
        history.bar_on(day)?;

        // The detection window ends yesterday: today's bar is still forming.
        let window = match history.window_before(day, self.config.window_len) {
            Ok(window) => window,
            Err(DataError::InsufficientBars { .. }) => return None,
            Err(_) => return None,
        };
        let formation = self.detectors.detect(window)?;

        let validation = self.validate_cached(symbol, day, &formation, history.bars_before(day));

        // The expensive external call happens only for approved formations.
        let decision = if validation.approved {
            let request = DecisionRequest {
                instrument: symbol,
                as_of: day,
                validation: Some(&validation),
                fundamentals: self.snapshots.fundamentals(symbol, day),
                sentiment: self.snapshots.sentiment(symbol, day),
            };
            decide_with_retry(self.decision_source, &request, self.config.decision_retries)
        } else {
            None
        };

        Some(EntryEvaluation {
            symbol: symbol.to_string(),
            formation,
            validation,
            decision,
        })
    }

    /// Validation is a pure function of (instrument, as-of, kind) for a
    /// fixed history, so the cache can never go stale.
    fn validate_cached(
        &self,
        symbol: &str,
        day: NaiveDate,
        formation: &Formation,
        past: &[Bar],
    ) -> ValidationResult {
        let key = validation_cache_key(symbol, day, formation.kind);
        if let Some(cached) = self.cache.get(&key) {
            return cached;
        }
        let detector = self
            .detectors
            .detector_for(formation.kind)
            .expect("formation kind produced by this detector set");
        let result = validate_formation(
            formation,
            past,
            detector,
            self.config.window_len,
            &self.config.validator,
        );
        self.cache.put(&key, result.clone());
        result
    }

    /// Serialized ledger pass: risk gate, cost model, open — in the
    /// deterministic order the evaluations were produced.
    fn apply_entries(
        &self,
        ledger: &mut Ledger,
        risk: &RiskManager,
        evaluations: Vec<EntryEvaluation>,
        closes: &HashMap<String, f64>,
        day: NaiveDate,
        audits: &mut Vec<FormationAudit>,
    ) -> Result<(), SimulatorError> {
        for eval in evaluations {
            let outcome = self.apply_one_entry(ledger, risk, &eval, closes, day)?;
            audits.push(FormationAudit {
                instrument: eval.symbol,
                as_of: day,
                formation: eval.formation,
                validation: eval.validation,
                outcome,
            });
        }
        Ok(())
    }

    fn apply_one_entry(
        &self,
        ledger: &mut Ledger,
        risk: &RiskManager,
        eval: &EntryEvaluation,
        closes: &HashMap<String, f64>,
        day: NaiveDate,
    ) -> Result<AuditOutcome, SimulatorError> {
        if !eval.validation.approved {
            return Ok(AuditOutcome::NotApproved);
        }
        let decision = match &eval.decision {
            None => return Ok(AuditOutcome::DecisionFailed),
            Some(d) if d.action != DecisionAction::Buy => return Ok(AuditOutcome::DecisionHold),
            Some(d) => d,
        };

        let bar = self
            .history
            .get(&eval.symbol)?
            .bar_on(day)
            .expect("evaluation required today's bar")
            .clone();
        let requested = bar.open;

        let stop_loss = decision.stop_loss.unwrap_or(eval.formation.stop_loss);
        let target = decision
            .target
            .or_else(|| eval.validation.approved_price(&eval.formation))
            .unwrap_or(eval.formation.conservative_target);

        let equity = ledger.equity(closes);
        let stats = TradeStats::from_closed(&ledger.portfolio.closed_positions);
        let quantity = risk.safe_quantity(equity, requested, stats.as_ref());
        if quantity == 0 {
            return Ok(AuditOutcome::SizedToZero);
        }

        let view = PortfolioView {
            equity,
            peak_equity: ledger.portfolio.peak_equity().max(equity),
            open_positions: ledger.portfolio.open_position_count(),
        };
        let proposed = ProposedEntry {
            quantity,
            entry_price: requested,
            stop_loss,
        };
        let verdict = risk.can_open(&view, &proposed);
        if !verdict.approved {
            return Ok(AuditOutcome::RiskVetoed {
                breaches: verdict.breaches,
            });
        }

        let cost_model = &self.config.cost_model;
        let filled = cost_model.fill_price(requested, crate::domain::Side::Buy);
        let notional = filled * quantity as f64;
        let cost = cost_model.cost(notional, crate::domain::Side::Buy);

        // Equity-based sizing can exceed free cash when capital is tied up
        // in open positions; that is a reported skip, not a logic bug.
        if notional + cost.total > ledger.portfolio.cash {
            return Ok(AuditOutcome::InsufficientCash);
        }

        let fill = FillSpec {
            symbol: eval.symbol.clone(),
            quantity,
            requested_price: requested,
            filled_price: filled,
            cost: cost.total,
            date: day,
        };
        match ledger.open(fill, stop_loss, target) {
            Ok(()) => Ok(AuditOutcome::Entered { quantity }),
            Err(source) => Err(self.invariant(day, source, ledger)),
        }
    }

    fn close_position(
        &self,
        ledger: &mut Ledger,
        symbol: &str,
        requested: f64,
        day: NaiveDate,
        reason: FillReason,
    ) -> Result<(), SimulatorError> {
        let cost_model = &self.config.cost_model;
        let filled = cost_model.fill_price(requested, crate::domain::Side::Sell);
        let quantity = ledger
            .portfolio
            .positions
            .get(symbol)
            .map(|p| p.quantity)
            .unwrap_or(0);
        let cost = cost_model.cost(filled * quantity as f64, crate::domain::Side::Sell);
        let fill = FillSpec {
            symbol: symbol.to_string(),
            quantity,
            requested_price: requested,
            filled_price: filled,
            cost: cost.total,
            date: day,
        };
        ledger
            .close(fill, reason)
            .map(|_| ())
            .map_err(|source| self.invariant(day, source, ledger))
    }

    /// Terminal state: everything still open closes at the final close.
    fn force_close_all(&self, ledger: &mut Ledger, day: NaiveDate) -> Result<(), SimulatorError> {
        let mut held: Vec<String> = ledger.portfolio.positions.keys().cloned().collect();
        held.sort();
        for symbol in held {
            let price = self
                .history
                .get(&symbol)?
                .bar_on(day)
                .map(|b| b.close)
                .unwrap_or_else(|| ledger.portfolio.positions[&symbol].last_mark);
            self.close_position(ledger, &symbol, price, day, FillReason::EndOfPeriod)?;
        }
        Ok(())
    }

    fn invariant(&self, day: NaiveDate, source: LedgerError, ledger: &Ledger) -> SimulatorError {
        tracing::error!(%day, error = %source, "accounting invariant violated; aborting run");
        SimulatorError::Invariant {
            day,
            source,
            dump: Box::new(StateDump {
                day,
                portfolio: ledger.portfolio.clone(),
            }),
        }
    }
}
