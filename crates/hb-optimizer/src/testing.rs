//! Deterministic objectives shared by the scheduler tests.

use hb_types::{ConfigId, Configuration, HbResult, ObjectiveError};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;

use crate::halving::BracketReport;
use crate::history::HistoryLog;
use crate::objective::{Evaluation, Objective, ObjectiveContext, ObjectiveFactory};

/// One `evaluate` call as seen by the factory.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Call {
    pub id: ConfigId,
    pub target: u64,
    pub metric: f64,
    pub overfit: bool,
}

/// Metric is a pure function of the `x` parameter and resource consumed:
/// lower `x` is better, and more resource always helps.
pub(crate) fn curve(configuration: &Configuration, resource: u64) -> f64 {
    configuration.f64_or("x", 0.0) + 10.0 / (resource as f64 + 1.0)
}

/// Factory whose objectives follow [`curve`] and remember consumed resource
/// across instances, like a checkpointing trainer would.
#[derive(Debug, Default)]
pub(crate) struct CurveFactory {
    consumed: RefCell<HashMap<ConfigId, u64>>,
    pub calls: RefCell<Vec<Call>>,
    pub always_overfit: bool,
    pub fail_on_call: Option<usize>,
    live: Cell<usize>,
    pub max_live: Cell<usize>,
    pub patience_seen: Cell<usize>,
}

impl CurveFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn overfitting() -> Self {
        Self {
            always_overfit: true,
            ..Self::default()
        }
    }

    pub fn failing_on(call: usize) -> Self {
        Self {
            fail_on_call: Some(call),
            ..Self::default()
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.borrow().len()
    }
}

struct CurveObjective<'a> {
    factory: &'a CurveFactory,
    configuration: &'a Configuration,
    history: &'a mut HistoryLog,
}

impl Objective for CurveObjective<'_> {
    fn evaluate(&mut self, target_resource: u64) -> HbResult<Evaluation> {
        let id = self.configuration.id();
        if self.factory.fail_on_call == Some(self.factory.call_count()) {
            return Err(ObjectiveError::EvaluationFailed {
                config_id: id.to_string(),
                resource: target_resource,
                message: "scripted failure".to_string(),
            }
            .into());
        }

        let mut consumed = self.factory.consumed.borrow_mut();
        let start = consumed.get(&id).copied().unwrap_or(0);
        let mut best = f64::INFINITY;
        for step in start + 1..=target_resource {
            let metric = curve(self.configuration, step);
            self.history.record(self.configuration, metric);
            best = best.min(metric);
        }
        if target_resource <= start {
            best = curve(self.configuration, start);
        }
        consumed.insert(id, start.max(target_resource));

        let overfit = self.factory.always_overfit;
        self.factory.calls.borrow_mut().push(Call {
            id,
            target: target_resource,
            metric: best,
            overfit,
        });
        Ok(Evaluation::new(best, overfit))
    }
}

impl Drop for CurveObjective<'_> {
    fn drop(&mut self) {
        self.factory.live.set(self.factory.live.get() - 1);
    }
}

impl ObjectiveFactory for CurveFactory {
    fn build<'a>(&'a self, ctx: ObjectiveContext<'a>) -> HbResult<Box<dyn Objective + 'a>> {
        self.live.set(self.live.get() + 1);
        self.max_live.set(self.max_live.get().max(self.live.get()));
        self.patience_seen.set(ctx.patience);
        Ok(Box::new(CurveObjective {
            factory: self,
            configuration: ctx.configuration,
            history: ctx.history,
        }))
    }
}

/// Promotions of each rung as indices into the bracket's sampling order, so
/// runs with different identities can be compared.
pub(crate) fn promoted_positions(report: &BracketReport) -> Vec<Vec<usize>> {
    let sampled: Vec<ConfigId> = report
        .rungs
        .first()
        .map(|rung| rung.entries.iter().map(|e| e.config_id).collect())
        .unwrap_or_default();
    report
        .rungs
        .iter()
        .map(|rung| {
            rung.promoted
                .iter()
                .filter_map(|id| sampled.iter().position(|s| s == id))
                .collect()
        })
        .collect()
}
