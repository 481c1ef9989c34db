//! Engine: cost model, ledger, risk manager, decision seam, simulator.

pub mod costs;
pub mod decision;
pub mod ledger;
pub mod risk;
pub mod simulator;

pub use costs::{CostBreakdown, CostModel};
pub use decision::{
    decide_with_retry, Decision, DecisionAction, DecisionError, DecisionRequest, DecisionSource,
    NoSnapshots, RuleBasedDecision, SnapshotSource,
};
pub use ledger::{FillSpec, Ledger, LedgerError};
pub use risk::{
    PortfolioView, ProposedEntry, RiskBreach, RiskLimits, RiskManager, RiskVerdict, TradeStats,
};
pub use simulator::{
    AuditOutcome, FormationAudit, SimulationOutcome, Simulator, SimulatorConfig, SimulatorError,
    StateDump,
};
