//! Runner configuration: a JSON file plus `HB_*` environment overrides.

use hb_optimizer::{HyperbandConfig, ParameterDef, ParameterKind, SearchSpace};
use hb_types::{config_error, HbResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::info;

use crate::synthetic::SyntheticOptions;

/// Everything `hb-run` needs to start a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    pub scheduler: HyperbandConfig,
    pub search_space: Vec<ParameterDef>,
    pub trainer: SyntheticOptions,
    /// Wipe `<homedir>/ckpt` before the run so no lineage resumes a stale
    /// checkpoint from an earlier run.
    pub clean_checkpoints: bool,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            scheduler: HyperbandConfig::default(),
            search_space: default_search_space(),
            trainer: SyntheticOptions::default(),
            clean_checkpoints: true,
        }
    }
}

/// Two hidden layer widths plus SGD learning rate and momentum.
fn default_search_space() -> Vec<ParameterDef> {
    vec![
        ParameterDef {
            name: "fc1_unit".to_string(),
            kind: ParameterKind::IntUniform { low: 32, high: 512 },
        },
        ParameterDef {
            name: "fc2_unit".to_string(),
            kind: ParameterKind::IntUniform { low: 16, high: 256 },
        },
        ParameterDef {
            name: "lr".to_string(),
            kind: ParameterKind::LogUniform { low: 1e-4, high: 1.0 },
        },
        ParameterDef {
            name: "momentum".to_string(),
            kind: ParameterKind::Uniform { low: 0.0, high: 0.99 },
        },
    ]
}

impl RunnerConfig {
    /// Read a JSON config file. Missing sections take their defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> HbResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| config_error!("cannot read {}: {}", path.display(), e))?;
        let config: Self = serde_json::from_str(&raw)
            .map_err(|e| config_error!("invalid config {}: {}", path.display(), e))?;

        info!("Loaded runner config from {}", path.display());
        Ok(config)
    }

    /// Apply `HB_MAX_ITER`, `HB_ETA`, `HB_PATIENCE`, `HB_HOMEDIR` and `HB_SEED`
    /// from the process environment.
    pub fn apply_env(&mut self) -> HbResult<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary lookup; unset keys leave the value
    /// unchanged, unparsable ones are a config error.
    pub fn apply_overrides<L>(&mut self, lookup: L) -> HbResult<()>
    where
        L: Fn(&str) -> Option<String>,
    {
        let scheduler = &mut self.scheduler;
        if let Some(value) = parse_var(&lookup, "HB_MAX_ITER")? {
            scheduler.max_iter = value;
        }
        if let Some(value) = parse_var(&lookup, "HB_ETA")? {
            scheduler.eta = value;
        }
        if let Some(value) = parse_var(&lookup, "HB_PATIENCE")? {
            scheduler.patience = value;
        }
        if let Some(value) = lookup("HB_HOMEDIR") {
            scheduler.homedir = PathBuf::from(value);
        }
        if let Some(value) = parse_var(&lookup, "HB_SEED")? {
            scheduler.seed = Some(value);
        }
        Ok(())
    }

    pub fn search_space(&self) -> SearchSpace {
        SearchSpace::from_defs(self.search_space.iter().cloned())
    }
}

fn parse_var<T, L>(lookup: &L, key: &str) -> HbResult<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    L: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| config_error!("{}={:?} is invalid: {}", key, raw, e)),
        None => Ok(None),
    }
}
