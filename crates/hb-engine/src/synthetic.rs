//! A simulated learning curve standing in for a real training loop.
//!
//! Validation error (in percent) decays exponentially from 90% towards a
//! configuration-dependent floor and creeps back up once training runs past
//! the overfitting onset. The curve depends only on the configuration and the
//! epoch, so evaluations resume exactly from a checkpointed epoch.

use hb_types::{CheckpointError, Configuration, HbResult, ObjectiveError};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::trainer::{Trainer, TrainerFactory};

const INITIAL_ERROR: f64 = 90.0;

/// Shape of the simulated curves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyntheticOptions {
    /// Half-width of the uniform validation noise, in percentage points.
    pub noise: f64,
    /// Epoch after which validation error starts rising again.
    pub overfit_onset: u64,
    /// Error added per epoch past the onset.
    pub overfit_slope: f64,
}

impl Default for SyntheticOptions {
    fn default() -> Self {
        Self {
            noise: 0.5,
            overfit_onset: 30,
            overfit_slope: 0.15,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
struct SyntheticState {
    epoch: u64,
}

/// Learning-curve simulator driven by `lr`, `momentum`, `fc1_unit` and
/// `fc2_unit`. Missing parameters fall back to typical values.
#[derive(Debug, Clone)]
pub struct SyntheticTrainer {
    options: SyntheticOptions,
    noise_seed: u64,
    floor: f64,
    rate: f64,
    epoch: u64,
}

impl SyntheticTrainer {
    pub fn new(configuration: &Configuration, options: SyntheticOptions) -> HbResult<Self> {
        let lr = configuration.f64_or("lr", 0.01);
        let momentum = configuration.f64_or("momentum", 0.9);
        let fc1 = configuration.f64_or("fc1_unit", 128.0);
        let fc2 = configuration.f64_or("fc2_unit", 64.0);
        let width = fc1 + fc2;

        if !(lr > 0.0) {
            return Err(invalid("lr", format!("must be positive, got {lr}")));
        }
        if !(0.0..1.0).contains(&momentum) {
            return Err(invalid("momentum", format!("must be in [0, 1), got {momentum}")));
        }
        if !(width >= 1.0) {
            return Err(invalid("fc1_unit", format!("layer widths must be positive, got {width}")));
        }

        // Best learning rates sit around 0.05 on a log scale.
        let lr_penalty = 4.0 * (lr.log10() - 0.05f64.log10()).powi(2);
        let capacity_penalty = 40.0 / width.sqrt();
        let floor = (1.5 + lr_penalty + capacity_penalty).min(INITIAL_ERROR);
        let rate = (lr / (1.0 - momentum)).clamp(0.02, 1.5);

        // Keyed on values, not identity: equal assignments see equal noise.
        let noise_seed = lr.to_bits()
            ^ momentum.to_bits().rotate_left(16)
            ^ fc1.to_bits().rotate_left(32)
            ^ fc2.to_bits().rotate_left(48);

        Ok(Self {
            options,
            noise_seed,
            floor,
            rate,
            epoch: 0,
        })
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Noise-free error at `epoch`.
    pub fn expected_error(&self, epoch: u64) -> f64 {
        let decay = (INITIAL_ERROR - self.floor) * (-self.rate * epoch as f64).exp();
        let overfit = self.options.overfit_slope * epoch.saturating_sub(self.options.overfit_onset) as f64;
        self.floor + decay + overfit
    }

    fn noise(&self) -> f64 {
        if self.options.noise <= 0.0 {
            return 0.0;
        }
        let mut rng = StdRng::seed_from_u64(self.noise_seed ^ self.epoch.wrapping_mul(0x9E37_79B9_7F4A_7C15));
        rng.random_range(-self.options.noise..=self.options.noise)
    }
}

fn invalid(parameter: &str, message: String) -> hb_types::HbError {
    ObjectiveError::InvalidParameter {
        parameter: parameter.to_string(),
        message,
    }
    .into()
}

impl Trainer for SyntheticTrainer {
    fn train_step(&mut self) -> HbResult<()> {
        self.epoch += 1;
        Ok(())
    }

    fn validate(&mut self) -> HbResult<f64> {
        Ok((self.expected_error(self.epoch) + self.noise()).clamp(0.0, 100.0))
    }

    fn snapshot(&self) -> HbResult<serde_json::Value> {
        Ok(serde_json::to_value(SyntheticState { epoch: self.epoch })?)
    }

    fn restore(&mut self, state: serde_json::Value) -> HbResult<()> {
        let state: SyntheticState = serde_json::from_value(state).map_err(|e| CheckpointError::RestoreFailed {
            message: e.to_string(),
        })?;
        self.epoch = state.epoch;
        Ok(())
    }
}

/// Builds [`SyntheticTrainer`]s with shared options.
#[derive(Debug, Clone, Default)]
pub struct SyntheticTrainerFactory {
    pub options: SyntheticOptions,
}

impl SyntheticTrainerFactory {
    pub fn new(options: SyntheticOptions) -> Self {
        Self { options }
    }
}

impl TrainerFactory for SyntheticTrainerFactory {
    type Trainer = SyntheticTrainer;

    fn create(&self, configuration: &Configuration, _homedir: &Path) -> HbResult<SyntheticTrainer> {
        SyntheticTrainer::new(configuration, self.options.clone())
    }
}
