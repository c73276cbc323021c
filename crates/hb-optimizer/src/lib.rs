//! # hb-optimizer
//!
//! Hyperband resource allocation for hyperparameter search.
//!
//! Provides search space definitions with pluggable distributions, the
//! bracket planner, the successive-halving executor, best-result tracking, the
//! shared evaluation history, and the objective contract that resumable
//! evaluators implement.

mod halving;
mod history;
mod hyperband;
mod objective;
mod planner;
mod run;
mod search;
mod tracker;

#[cfg(test)]
mod testing;

pub use halving::{BracketReport, RungEntry, RungReport, SuccessiveHalving};
pub use history::{HistoryEntry, HistoryLog, Lineage};
pub use hyperband::Hyperband;
pub use objective::{Evaluation, Objective, ObjectiveContext, ObjectiveFactory};
pub use planner::{Bracket, BracketPlan};
pub use run::{HyperbandConfig, RunId, RunReport, RunStatus};
pub use search::{Distribution, ParameterDef, ParameterKind, SearchSpace};
pub use tracker::BestResult;
