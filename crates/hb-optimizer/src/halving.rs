//! Successive halving: the inner loop that runs one bracket to completion.

use hb_types::{ConfigId, Configuration, HbResult};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::path::Path;
use tracing::{debug, error, info};

use crate::history::HistoryLog;
use crate::objective::{Evaluation, ObjectiveContext, ObjectiveFactory};
use crate::planner::Bracket;
use crate::search::SearchSpace;
use crate::tracker::BestResult;

/// One configuration's state after being evaluated at a rung.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RungEntry {
    pub config_id: ConfigId,
    /// Cumulative resource the configuration was asked to reach.
    pub resource: u64,
    pub metric: f64,
    /// Reported by the objective; recorded only, never used for selection.
    pub overfit: bool,
}

/// Snapshot of one rung: who was evaluated, in order, and who advanced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RungReport {
    pub index: usize,
    /// Nominal `n_i`.
    pub nominal_size: f64,
    pub target_resource: u64,
    pub entries: Vec<RungEntry>,
    /// Best `floor(n_i / eta)` by metric, in rank order.
    pub promoted: Vec<ConfigId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BracketReport {
    pub bracket: Bracket,
    pub rungs: Vec<RungReport>,
}

impl BracketReport {
    /// Number of `evaluate` calls made for this bracket.
    pub fn evaluations(&self) -> usize {
        self.rungs.iter().map(|rung| rung.entries.len()).sum()
    }

    pub fn rung_sizes(&self) -> Vec<usize> {
        self.rungs.iter().map(|rung| rung.entries.len()).collect()
    }
}

/// Runs brackets against a search space and an objective factory.
pub struct SuccessiveHalving<'a, F: ?Sized> {
    space: &'a SearchSpace,
    factory: &'a F,
    homedir: &'a Path,
    patience: usize,
}

impl<'a, F: ObjectiveFactory + ?Sized> SuccessiveHalving<'a, F> {
    pub fn new(space: &'a SearchSpace, factory: &'a F, homedir: &'a Path, patience: usize) -> Self {
        Self {
            space,
            factory,
            homedir,
            patience,
        }
    }

    /// Sample `bracket.n` configurations and halve them rung by rung.
    ///
    /// Every returned metric is offered to `best`. Whatever survives the last
    /// rung is dropped; only the history and the best result remain.
    pub fn run(
        &self,
        bracket: &Bracket,
        rng: &mut dyn RngCore,
        history: &mut HistoryLog,
        best: &mut BestResult,
    ) -> HbResult<BracketReport> {
        let mut report = BracketReport {
            bracket: *bracket,
            rungs: Vec::with_capacity(bracket.rung_count()),
        };
        let mut survivors: Vec<Configuration> = Vec::new();

        for i in 0..bracket.rung_count() {
            let nominal_size = bracket.rung_size(i);
            let target_resource = bracket.target_resource(i);

            if i == 0 {
                survivors = self.space.sample_configurations(bracket.n, rng);
                for configuration in &survivors {
                    history.register(configuration.id());
                }
            }

            info!(
                "Bracket s={} rung {}: {} configurations (n_i={:.3}) to resource {} (r_i={:.3})",
                bracket.s,
                i,
                survivors.len(),
                nominal_size,
                target_resource,
                bracket.rung_resource(i)
            );

            let mut scored: Vec<(Configuration, Evaluation)> = Vec::with_capacity(survivors.len());
            for configuration in survivors.drain(..) {
                let evaluation = self.evaluate(&configuration, target_resource, history)?;
                debug!(
                    "Evaluated {} at resource {}: metric={} overfit={}",
                    configuration.id(),
                    target_resource,
                    evaluation.metric,
                    evaluation.overfit
                );
                if best.offer(&configuration, evaluation.metric) {
                    info!("New best metric {} from {}", evaluation.metric, configuration);
                }
                scored.push((configuration, evaluation));
            }

            let entries: Vec<RungEntry> = scored
                .iter()
                .map(|(configuration, evaluation)| RungEntry {
                    config_id: configuration.id(),
                    resource: target_resource,
                    metric: evaluation.metric,
                    overfit: evaluation.overfit,
                })
                .collect();

            // Stable sort: equal metrics keep evaluation order.
            scored.sort_by(|a, b| rank_metric(a.1.metric, b.1.metric));
            let keep = bracket.promotions(i).min(scored.len());
            survivors = scored.into_iter().take(keep).map(|(configuration, _)| configuration).collect();

            report.rungs.push(RungReport {
                index: i,
                nominal_size,
                target_resource,
                entries,
                promoted: survivors.iter().map(Configuration::id).collect(),
            });
        }

        Ok(report)
    }

    /// Build an objective, evaluate once, release it.
    fn evaluate(
        &self,
        configuration: &Configuration,
        target_resource: u64,
        history: &mut HistoryLog,
    ) -> HbResult<Evaluation> {
        let ctx = ObjectiveContext {
            configuration,
            homedir: self.homedir,
            history,
            patience: self.patience,
        };
        let mut objective = self.factory.build(ctx)?;
        let evaluation = objective.evaluate(target_resource);
        drop(objective);

        evaluation.inspect_err(|e| {
            error!(
                "Objective failed for {} at resource {}: {}",
                configuration.id(),
                target_resource,
                e
            );
        })
    }
}

/// Ascending by metric with NaN ranked last.
fn rank_metric(a: f64, b: f64) -> Ordering {
    a.partial_cmp(&b)
        .unwrap_or_else(|| a.is_nan().cmp(&b.is_nan()))
}
