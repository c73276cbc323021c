//! The Hyperband outer loop.

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{error, info};

use hb_types::HbResult;

use crate::halving::SuccessiveHalving;
use crate::history::HistoryLog;
use crate::objective::ObjectiveFactory;
use crate::planner::BracketPlan;
use crate::run::{HyperbandConfig, RunReport};
use crate::search::SearchSpace;
use crate::tracker::BestResult;

/// Hyperband scheduler: one successive-halving bracket per `s`, from the most
/// exploratory bracket down to plain full-budget evaluation.
///
/// Runs are sequential and synchronous. With a fixed seed and a deterministic
/// objective, two runs produce identical bracket trajectories.
pub struct Hyperband<F> {
    config: HyperbandConfig,
    plan: BracketPlan,
    space: SearchSpace,
    factory: F,
    rng: StdRng,
}

impl<F: ObjectiveFactory> Hyperband<F> {
    /// Validate the configuration and fix the bracket schedule.
    ///
    /// Invalid `eta`, `max_iter`, `patience` or search-space ranges fail here,
    /// before any objective is built.
    pub fn new(config: HyperbandConfig, space: SearchSpace, factory: F) -> HbResult<Self> {
        let plan = config.validate()?;
        space.validate()?;

        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        info!(
            "Hyperband planned: max_iter={}, eta={}, s_max={}, B={}, {} parameters",
            plan.max_iter(),
            plan.eta(),
            plan.s_max(),
            plan.budget(),
            space.len()
        );

        Ok(Self {
            config,
            plan,
            space,
            factory,
            rng,
        })
    }

    /// Run every bracket to completion.
    ///
    /// Objectives append to `history`; the scheduler itself only registers
    /// lineages there. The first objective error aborts the run.
    pub fn run(&mut self, history: &mut HistoryLog) -> HbResult<RunReport> {
        let mut report = RunReport::new(self.config.clone(), &self.plan);
        let mut best = BestResult::new();
        self.run_brackets(&mut report, &mut best, history)?;

        report.mark_completed(best);
        info!(
            "Hyperband finished: {} evaluations over {} configurations, best metric {}",
            report.evaluations(),
            report.configurations(),
            report.best.metric
        );
        Ok(report)
    }

    /// Like [`Hyperband::run`], but an objective failure is recorded in the
    /// returned report (status `Failed`) together with the brackets that
    /// completed before it.
    pub fn run_report(&mut self, history: &mut HistoryLog) -> RunReport {
        let mut report = RunReport::new(self.config.clone(), &self.plan);
        let mut best = BestResult::new();

        match self.run_brackets(&mut report, &mut best, history) {
            Ok(()) => report.mark_completed(best),
            Err(e) => {
                error!("Hyperband run {} failed: {}", report.id, e);
                report.mark_failed(best, e.to_string());
            }
        }
        report
    }

    fn run_brackets(
        &mut self,
        report: &mut RunReport,
        best: &mut BestResult,
        history: &mut HistoryLog,
    ) -> HbResult<()> {
        let executor = SuccessiveHalving::new(
            &self.space,
            &self.factory,
            &self.config.homedir,
            self.config.patience,
        );

        for bracket in self.plan.brackets() {
            info!(
                "Starting bracket s={}: n={}, r={:.3}, planned resource {:.1}",
                bracket.s,
                bracket.n,
                bracket.r,
                bracket.planned_resource()
            );
            let bracket_report = executor.run(&bracket, &mut self.rng, history, best)?;
            info!(
                "Finished bracket s={} after {} evaluations",
                bracket.s,
                bracket_report.evaluations()
            );
            report.push_bracket(bracket_report);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::run::RunStatus;
    use crate::testing::{promoted_positions, CurveFactory};
    use hb_types::{ConfigId, HbError};

    fn space() -> SearchSpace {
        SearchSpace::new()
            .add_float("x", 0.0, 100.0)
            .add_int("fc1_unit", 16, 256)
    }

    fn run(max_iter: u64, eta: f64, seed: u64, factory: &CurveFactory) -> (RunReport, HistoryLog) {
        let config = HyperbandConfig::new(max_iter, eta).with_seed(seed).with_patience(2);
        let mut hyperband = Hyperband::new(config, space(), factory).unwrap();
        let mut history = HistoryLog::new();
        let report = hyperband.run(&mut history).unwrap();
        (report, history)
    }

    #[test]
    fn scenario_81_by_3() {
        let factory = CurveFactory::new();
        let (report, history) = run(81, 3.0, 1, &factory);

        assert_eq!(report.s_max, 4);
        assert_eq!(report.budget, 405);
        let starts: Vec<(usize, usize)> = report.brackets.iter().map(|b| (b.bracket.s, b.bracket.n)).collect();
        assert_eq!(starts, vec![(4, 81), (3, 27), (2, 9), (1, 6), (0, 5)]);

        let first = &report.brackets[0];
        assert_eq!(first.rungs[0].entries.len(), 81);
        assert!(first.rungs[0].entries.iter().all(|e| e.resource == 1));
        assert_eq!(first.rungs[0].promoted.len(), 27);

        assert_eq!(history.len(), report.configurations());
        assert_eq!(report.configurations(), 81 + 27 + 9 + 6 + 5);
    }

    #[test]
    fn scenario_27_by_3_last_bracket() {
        let factory = CurveFactory::new();
        let (report, _) = run(27, 3.0, 2, &factory);

        assert_eq!(report.s_max, 3);
        assert_eq!(report.budget, 108);
        let last = report.brackets.last().unwrap();
        assert_eq!(last.bracket.s, 0);
        assert_eq!(last.bracket.n, 4);
        assert_eq!(last.bracket.r, 27.0);
        assert_eq!(last.rungs.len(), 1);
        assert_eq!(last.rungs[0].entries.len(), 4);
        assert!(last.rungs[0].entries.iter().all(|e| e.resource == 27));
    }

    #[test]
    fn evaluation_count_matches_rung_sizes() {
        let factory = CurveFactory::new();
        let (report, _) = run(81, 3.0, 3, &factory);

        let expected: Vec<usize> = vec![81 + 27 + 9 + 3 + 1, 27 + 9 + 3 + 1, 9 + 3 + 1, 6 + 2, 5];
        let actual: Vec<usize> = report.brackets.iter().map(|b| b.evaluations()).collect();
        assert_eq!(actual, expected);
        assert_eq!(factory.call_count(), report.evaluations());
    }

    #[test]
    fn rung_sizes_follow_floor_division() {
        let factory = CurveFactory::new();
        let (report, _) = run(100, 2.5, 4, &factory);

        for bracket in &report.brackets {
            let sizes = bracket.rung_sizes();
            assert_eq!(sizes[0], bracket.bracket.n);
            for i in 1..sizes.len() {
                assert!(sizes[i] <= sizes[i - 1]);
                let expected = bracket.bracket.promotions(i - 1).min(sizes[i - 1]);
                assert_eq!(sizes[i], expected);
            }
        }
    }

    #[test]
    fn best_equals_global_minimum_of_returned_metrics() {
        let factory = CurveFactory::new();
        let (report, _) = run(81, 3.0, 5, &factory);

        let calls = factory.calls.borrow();
        let minimum = calls.iter().map(|c| c.metric).fold(f64::INFINITY, f64::min);
        assert_eq!(report.best.metric, minimum);
        let best_id = report.best.configuration.as_ref().unwrap().id();
        assert!(calls.iter().any(|c| c.id == best_id && c.metric == minimum));
    }

    #[test]
    fn identical_seeds_give_identical_trajectories() {
        let (a, _) = run(81, 3.0, 42, &CurveFactory::new());
        let (b, _) = run(81, 3.0, 42, &CurveFactory::new());

        assert_eq!(a.best.metric, b.best.metric);
        let best_a = a.best.configuration.as_ref().unwrap();
        let best_b = b.best.configuration.as_ref().unwrap();
        assert_eq!(best_a.parameters(), best_b.parameters());
        assert_ne!(best_a.id(), best_b.id());

        for (x, y) in a.brackets.iter().zip(&b.brackets) {
            assert_eq!(promoted_positions(x), promoted_positions(y));
            for (rx, ry) in x.rungs.iter().zip(&y.rungs) {
                let metrics_x: Vec<f64> = rx.entries.iter().map(|e| e.metric).collect();
                let metrics_y: Vec<f64> = ry.entries.iter().map(|e| e.metric).collect();
                assert_eq!(metrics_x, metrics_y);
            }
        }
    }

    #[test]
    fn identical_seeds_never_share_identities() {
        let (a, _) = run(27, 3.0, 42, &CurveFactory::new());
        let (b, _) = run(27, 3.0, 42, &CurveFactory::new());

        let ids_a: std::collections::HashSet<ConfigId> = a
            .brackets
            .iter()
            .flat_map(|bracket| bracket.rungs[0].entries.iter().map(|e| e.config_id))
            .collect();
        assert!(b
            .brackets
            .iter()
            .flat_map(|bracket| &bracket.rungs[0].entries)
            .all(|e| !ids_a.contains(&e.config_id)));
    }

    #[test]
    fn identifiers_are_never_resurrected() {
        let factory = CurveFactory::new();
        let (report, _) = run(81, 3.0, 6, &factory);

        let mut seen = std::collections::HashSet::new();
        for bracket in &report.brackets {
            for id in bracket.rungs[0].entries.iter().map(|e| e.config_id) {
                assert!(seen.insert(id), "identifier sampled twice");
            }
            for pair in bracket.rungs.windows(2) {
                let evaluated: Vec<ConfigId> = pair[1].entries.iter().map(|e| e.config_id).collect();
                assert!(evaluated.iter().all(|id| pair[0].promoted.contains(id)));
            }
        }
    }

    #[test]
    fn always_overfitting_objective_is_ranked_by_metric() {
        let honest = CurveFactory::new();
        let overfitting = CurveFactory::overfitting();
        let (a, _) = run(27, 3.0, 8, &honest);
        let (b, _) = run(27, 3.0, 8, &overfitting);

        assert_eq!(a.evaluations(), b.evaluations());
        assert_eq!(a.best.metric, b.best.metric);
        for (x, y) in a.brackets.iter().zip(&b.brackets) {
            assert_eq!(promoted_positions(x), promoted_positions(y));
        }
    }

    #[test]
    fn invalid_config_fails_before_any_evaluation() {
        let factory = CurveFactory::new();
        let result = Hyperband::new(HyperbandConfig::new(81, 1.0), space(), &factory);
        assert!(matches!(result, Err(HbError::Config(_))));

        let bad_space = SearchSpace::new().add_float("x", 2.0, 1.0);
        let result = Hyperband::new(HyperbandConfig::new(81, 3.0), bad_space, &factory);
        assert!(matches!(result, Err(HbError::Config(_))));
        assert_eq!(factory.call_count(), 0);
    }

    #[test]
    fn objective_failure_aborts_the_run() {
        let factory = CurveFactory::failing_on(100);
        let config = HyperbandConfig::new(81, 3.0).with_seed(7);
        let mut hyperband = Hyperband::new(config, space(), &factory).unwrap();
        let mut history = HistoryLog::new();

        let result = hyperband.run(&mut history);
        assert!(matches!(result, Err(HbError::Objective(_))));
        assert_eq!(factory.call_count(), 100);
    }

    #[test]
    fn failed_run_report_keeps_completed_brackets() {
        let factory = CurveFactory::failing_on(130);
        let config = HyperbandConfig::new(81, 3.0).with_seed(7);
        let mut hyperband = Hyperband::new(config, space(), &factory).unwrap();
        let mut history = HistoryLog::new();

        let report = hyperband.run_report(&mut history);
        assert_eq!(report.status, RunStatus::Failed);
        assert!(report.error.is_some());
        assert_eq!(report.brackets.len(), 1);
        assert!(!report.best.is_empty());
    }

    #[test]
    fn successful_run_report_is_completed() {
        let factory = CurveFactory::new();
        let config = HyperbandConfig::new(9, 3.0).with_seed(3);
        let mut hyperband = Hyperband::new(config, space(), &factory).unwrap();
        let mut history = HistoryLog::new();

        let report = hyperband.run_report(&mut history);
        assert_eq!(report.status, RunStatus::Completed);
        assert!(report.error.is_none());
        assert!(report.finished_at.is_some());
    }

    #[test]
    fn patience_is_forwarded() {
        let factory = CurveFactory::new();
        run(9, 3.0, 0, &factory);
        assert_eq!(factory.patience_seen.get(), 2);
        assert_eq!(factory.max_live.get(), 1);
    }
}
