//! The model-side contract wrapped by [`CheckpointedObjective`](crate::CheckpointedObjective).

use hb_types::{Configuration, HbResult};
use std::path::Path;

/// One trainable model instance.
///
/// A trainer advances one resource unit per [`Trainer::train_step`] and reports
/// a lower-is-better metric from [`Trainer::validate`]. Its state must survive
/// a `snapshot`/`restore` cycle so evaluation can resume in a later instance.
pub trait Trainer {
    fn train_step(&mut self) -> HbResult<()>;

    fn validate(&mut self) -> HbResult<f64>;

    fn snapshot(&self) -> HbResult<serde_json::Value>;

    fn restore(&mut self, state: serde_json::Value) -> HbResult<()>;
}

/// Creates a freshly initialised trainer for a configuration.
pub trait TrainerFactory {
    type Trainer: Trainer;

    fn create(&self, configuration: &Configuration, homedir: &Path) -> HbResult<Self::Trainer>;
}
