//! # hb-engine
//!
//! Runs Hyperband against concrete trainers.
//!
//! [`CheckpointedObjective`] adapts any [`Trainer`] to the scheduler's
//! objective contract, resuming each configuration from `<homedir>/ckpt` and
//! stopping early once validation stops improving. [`SyntheticTrainer`]
//! simulates learning curves for demos and tests. [`RunnerConfig`] and the
//! `export` functions back the `hb-run` binary.

pub mod checkpoint;
pub mod config;
pub mod export;
pub mod objective;
pub mod synthetic;
pub mod trainer;

pub use checkpoint::{Checkpoint, CheckpointStore};
pub use config::RunnerConfig;
pub use export::{write_history_csv, write_history_json, write_report_json};
pub use objective::{CheckpointedObjective, CheckpointedObjectiveFactory};
pub use synthetic::{SyntheticOptions, SyntheticTrainer, SyntheticTrainerFactory};
pub use trainer::{Trainer, TrainerFactory};
