//! Search space definitions and configuration sampling.

use hb_types::{config_error, ConfigId, Configuration, HbResult, ParameterValue, Parameters};
use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Anything that can draw a value for one hyperparameter.
///
/// The random source is injected so that a seeded scheduler produces
/// reproducible configurations.
pub trait Distribution: fmt::Debug + Send + Sync {
    /// Draw one value.
    fn sample(&self, rng: &mut dyn RngCore) -> ParameterValue;

    /// Reject degenerate parameterisations before any sampling happens.
    fn validate(&self, _name: &str) -> HbResult<()> {
        Ok(())
    }
}

/// A single parameter dimension in a serialisable search space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterDef {
    /// Parameter name (e.g. "fc1_unit").
    pub name: String,
    /// The kind of search range.
    pub kind: ParameterKind,
}

/// The stock distribution families.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ParameterKind {
    /// Continuous uniform range [low, high].
    Uniform { low: f64, high: f64 },
    /// Integer range [low, high] inclusive.
    IntUniform { low: i64, high: i64 },
    /// Log-uniform range (sampled in log-space then exponentiated).
    LogUniform { low: f64, high: f64 },
    /// Categorical choices.
    Choice { values: Vec<serde_json::Value> },
}

impl Distribution for ParameterKind {
    fn sample(&self, rng: &mut dyn RngCore) -> ParameterValue {
        match self {
            Self::Uniform { low, high } => ParameterValue::Float(rng.random_range(*low..=*high)),
            Self::IntUniform { low, high } => ParameterValue::Int(rng.random_range(*low..=*high)),
            Self::LogUniform { low, high } => {
                let log_val: f64 = rng.random_range(low.ln()..=high.ln());
                ParameterValue::Float(log_val.exp().clamp(*low, *high))
            }
            Self::Choice { values } => {
                let idx = rng.random_range(0..values.len());
                ParameterValue::Json(values[idx].clone())
            }
        }
    }

    fn validate(&self, name: &str) -> HbResult<()> {
        match self {
            Self::Uniform { low, high } => {
                if !low.is_finite() || !high.is_finite() || low > high {
                    return Err(config_error!(
                        "parameter {name}: invalid uniform range [{low}, {high}]"
                    ));
                }
            }
            Self::IntUniform { low, high } => {
                if low > high {
                    return Err(config_error!(
                        "parameter {name}: invalid integer range [{low}, {high}]"
                    ));
                }
            }
            Self::LogUniform { low, high } => {
                if !(*low > 0.0) || !high.is_finite() || low > high {
                    return Err(config_error!(
                        "parameter {name}: log-uniform range [{low}, {high}] must be positive and ordered"
                    ));
                }
            }
            Self::Choice { values } => {
                if values.is_empty() {
                    return Err(config_error!("parameter {name}: no categorical choices"));
                }
            }
        }
        Ok(())
    }
}

/// The full search space: named distributions in insertion order.
///
/// Names are unique; adding an existing name replaces its distribution in
/// place so the iteration order stays stable.
#[derive(Debug, Default)]
pub struct SearchSpace {
    parameters: Vec<(String, Box<dyn Distribution>)>,
}

impl SearchSpace {
    pub fn new() -> Self {
        Self {
            parameters: Vec::new(),
        }
    }

    /// Build a space from serialised parameter definitions.
    pub fn from_defs(defs: impl IntoIterator<Item = ParameterDef>) -> Self {
        defs.into_iter()
            .fold(Self::new(), |space, def| space.add(def.name, def.kind))
    }

    /// Add (or replace) a parameter backed by any distribution.
    pub fn add(mut self, name: impl Into<String>, distribution: impl Distribution + 'static) -> Self {
        self.insert(name.into(), Box::new(distribution));
        self
    }

    pub fn add_float(self, name: impl Into<String>, low: f64, high: f64) -> Self {
        self.add(name, ParameterKind::Uniform { low, high })
    }

    pub fn add_int(self, name: impl Into<String>, low: i64, high: i64) -> Self {
        self.add(name, ParameterKind::IntUniform { low, high })
    }

    pub fn add_log_uniform(self, name: impl Into<String>, low: f64, high: f64) -> Self {
        self.add(name, ParameterKind::LogUniform { low, high })
    }

    pub fn add_choice(self, name: impl Into<String>, values: Vec<serde_json::Value>) -> Self {
        self.add(name, ParameterKind::Choice { values })
    }

    fn insert(&mut self, name: String, distribution: Box<dyn Distribution>) {
        match self.parameters.iter_mut().find(|(existing, _)| *existing == name) {
            Some(slot) => slot.1 = distribution,
            None => self.parameters.push((name, distribution)),
        }
    }

    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.parameters.iter().map(|(name, _)| name.as_str())
    }

    pub fn validate(&self) -> HbResult<()> {
        for (name, distribution) in &self.parameters {
            distribution.validate(name)?;
        }
        Ok(())
    }

    /// Draw one value per parameter, in insertion order.
    pub fn sample(&self, rng: &mut dyn RngCore) -> Parameters {
        self.parameters
            .iter()
            .map(|(name, distribution)| (name.clone(), distribution.sample(rng)))
            .collect()
    }

    /// Draw `count` independent configurations, each with a fresh identity.
    ///
    /// Values come from `rng`; identities are v4 UUIDs from the OS and never
    /// repeat across runs, even under the same seed. Duplicate parameter
    /// assignments are possible and kept.
    pub fn sample_configurations(&self, count: usize, rng: &mut dyn RngCore) -> Vec<Configuration> {
        (0..count)
            .map(|_| Configuration::new(ConfigId::new_v4(), self.sample(rng)))
            .collect()
    }
}
