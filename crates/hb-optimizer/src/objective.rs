//! The contract between the scheduler and whatever is being tuned.

use hb_types::{ConfigId, Configuration, HbResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::history::HistoryLog;

/// Outcome of one `evaluate` call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    /// Best (lowest) metric observed during the call.
    pub metric: f64,
    /// The objective stopped before the target after `patience` steps without
    /// improvement.
    pub overfit: bool,
}

impl Evaluation {
    pub fn new(metric: f64, overfit: bool) -> Self {
        Self { metric, overfit }
    }
}

/// Everything an objective is bound to when it is built for one evaluation.
#[derive(Debug)]
pub struct ObjectiveContext<'a> {
    pub configuration: &'a Configuration,
    /// Working directory owned by the objective (checkpoints, data).
    pub homedir: &'a Path,
    /// Shared log; objectives append one entry per resource unit advanced.
    pub history: &'a mut HistoryLog,
    /// Consecutive non-improving steps tolerated before stopping early.
    pub patience: usize,
}

impl ObjectiveContext<'_> {
    pub fn config_id(&self) -> ConfigId {
        self.configuration.id()
    }
}

/// A stateful, resumable evaluator bound to one configuration.
///
/// Resource is cumulative: `evaluate(target)` continues from whatever the
/// objective already consumed for this configuration, possibly in an earlier
/// instance, and never restarts from zero.
pub trait Objective {
    fn evaluate(&mut self, target_resource: u64) -> HbResult<Evaluation>;
}

/// Builds a fresh objective instance for each evaluation.
///
/// The scheduler owns the returned instance for exactly one `evaluate` call
/// and drops it before building the next. Building must succeed for a
/// configuration that has never been evaluated before.
pub trait ObjectiveFactory {
    fn build<'a>(&'a self, ctx: ObjectiveContext<'a>) -> HbResult<Box<dyn Objective + 'a>>;
}

impl<F: ObjectiveFactory + ?Sized> ObjectiveFactory for &F {
    fn build<'a>(&'a self, ctx: ObjectiveContext<'a>) -> HbResult<Box<dyn Objective + 'a>> {
        (**self).build(ctx)
    }
}

impl<F: ObjectiveFactory + ?Sized> ObjectiveFactory for Box<F> {
    fn build<'a>(&'a self, ctx: ObjectiveContext<'a>) -> HbResult<Box<dyn Objective + 'a>> {
        (**self).build(ctx)
    }
}
