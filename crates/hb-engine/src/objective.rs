//! Resumable objective: a [`Trainer`] plus checkpointing and patience-based
//! early stopping.

use chrono::Utc;
use hb_optimizer::{Evaluation, HistoryLog, Objective, ObjectiveContext, ObjectiveFactory};
use hb_types::{Configuration, HbResult, ObjectiveError};
use tracing::{debug, warn};

use crate::checkpoint::{Checkpoint, CheckpointStore};
use crate::trainer::{Trainer, TrainerFactory};

/// Wraps a trainer bound to one configuration.
///
/// Construction restores the configuration's checkpoint when one exists and
/// starts fresh otherwise. Each resource unit trains one step, validates, and
/// appends the metric to the shared history.
pub struct CheckpointedObjective<'a, T: Trainer> {
    trainer: T,
    configuration: &'a Configuration,
    history: &'a mut HistoryLog,
    store: CheckpointStore,
    patience: usize,
    resource: u64,
    best_metric: Option<f64>,
}

impl<'a, T: Trainer> CheckpointedObjective<'a, T> {
    pub fn open(ctx: ObjectiveContext<'a>, mut trainer: T) -> HbResult<Self> {
        let store = CheckpointStore::new(ctx.homedir)?;
        let id = ctx.config_id();

        let (resource, best_metric) = match store.load::<Checkpoint>(&id)? {
            Some(checkpoint) => {
                trainer.restore(checkpoint.trainer_state)?;
                debug!("Resuming {} from resource {}", id, checkpoint.resource);
                (checkpoint.resource, checkpoint.best_metric)
            }
            None => {
                debug!("No checkpoint for {}, starting fresh", id);
                (0, None)
            }
        };

        Ok(Self {
            trainer,
            configuration: ctx.configuration,
            history: ctx.history,
            store,
            patience: ctx.patience,
            resource,
            best_metric,
        })
    }

    fn save(&self) -> HbResult<()> {
        let checkpoint = Checkpoint {
            resource: self.resource,
            best_metric: self.best_metric,
            trainer_state: self.trainer.snapshot()?,
            updated_at: Utc::now(),
        };
        self.store.save(&self.configuration.id(), &checkpoint)
    }
}

impl<T: Trainer> Objective for CheckpointedObjective<'_, T> {
    /// Train from the stored resource up to `target_resource`.
    ///
    /// Returns the lowest metric seen during this call, or the checkpointed
    /// lifetime best when no unit was left to train. Stops early, with
    /// `overfit = true`, after `patience` consecutive steps without improving
    /// on this call's best.
    fn evaluate(&mut self, target_resource: u64) -> HbResult<Evaluation> {
        let id = self.configuration.id();
        let mut call_best = f64::INFINITY;
        let mut stale = 0usize;
        let mut overfit = false;

        while self.resource < target_resource {
            self.trainer.train_step()?;
            self.resource += 1;
            let metric = self.trainer.validate()?;
            if !metric.is_finite() {
                return Err(ObjectiveError::NonFiniteMetric {
                    config_id: id.to_string(),
                    metric,
                }
                .into());
            }
            self.history.record(self.configuration, metric);

            if metric < call_best {
                call_best = metric;
                stale = 0;
            } else {
                stale += 1;
            }
            if stale >= self.patience {
                warn!(
                    "{} stopped improving for {} steps at resource {}, stopping early",
                    id, stale, self.resource
                );
                overfit = true;
                break;
            }
        }

        if call_best.is_finite() {
            self.best_metric = Some(self.best_metric.map_or(call_best, |b| b.min(call_best)));
        } else {
            call_best = self.best_metric.unwrap_or(f64::INFINITY);
        }

        self.save()?;
        Ok(Evaluation::new(call_best, overfit))
    }
}

/// [`ObjectiveFactory`] producing [`CheckpointedObjective`]s from a trainer
/// factory.
#[derive(Debug, Clone, Default)]
pub struct CheckpointedObjectiveFactory<F> {
    trainers: F,
}

impl<F: TrainerFactory> CheckpointedObjectiveFactory<F> {
    pub fn new(trainers: F) -> Self {
        Self { trainers }
    }
}

impl<F> ObjectiveFactory for CheckpointedObjectiveFactory<F>
where
    F: TrainerFactory,
    F::Trainer: 'static,
{
    fn build<'a>(&'a self, ctx: ObjectiveContext<'a>) -> HbResult<Box<dyn Objective + 'a>> {
        let trainer = self.trainers.create(ctx.configuration, ctx.homedir)?;
        Ok(Box::new(CheckpointedObjective::open(ctx, trainer)?))
    }
}
