//! Run configuration and the report a finished run produces.

use chrono::{DateTime, Utc};
use hb_types::{config_error, HbResult};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

use crate::halving::BracketReport;
use crate::planner::BracketPlan;
use crate::tracker::BestResult;

/// Unique run identifier.
pub type RunId = Uuid;

/// Construction parameters for a Hyperband run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HyperbandConfig {
    /// Maximum resource units any configuration may receive.
    pub max_iter: u64,

    /// Downsampling rate; must be greater than 1.
    pub eta: f64,

    /// Forwarded unchanged to every objective.
    pub patience: usize,

    /// Working directory handed to objectives; opaque to the scheduler.
    pub homedir: PathBuf,

    /// Seed for configuration sampling. `None` draws from the OS.
    #[serde(default)]
    pub seed: Option<u64>,
}

impl HyperbandConfig {
    pub fn new(max_iter: u64, eta: f64) -> Self {
        Self {
            max_iter,
            eta,
            ..Self::default()
        }
    }

    pub fn with_patience(mut self, patience: usize) -> Self {
        self.patience = patience;
        self
    }

    pub fn with_homedir(mut self, homedir: impl Into<PathBuf>) -> Self {
        self.homedir = homedir.into();
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Check everything that can be checked before the first bracket.
    pub fn validate(&self) -> HbResult<BracketPlan> {
        if self.patience < 1 {
            return Err(config_error!("patience must be at least 1, got {}", self.patience));
        }
        BracketPlan::new(self.max_iter, self.eta)
    }
}

impl Default for HyperbandConfig {
    fn default() -> Self {
        Self {
            max_iter: 81,
            eta: 3.0,
            patience: 5,
            homedir: PathBuf::from("."),
            seed: None,
        }
    }
}

/// Everything a finished run produced, apart from the shared history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub id: RunId,
    pub config: HyperbandConfig,
    pub s_max: usize,
    pub budget: u64,
    pub brackets: Vec<BracketReport>,
    pub best: BestResult,
    pub status: RunStatus,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// Lifecycle of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

impl RunReport {
    pub fn new(config: HyperbandConfig, plan: &BracketPlan) -> Self {
        Self {
            id: Uuid::new_v4(),
            config,
            s_max: plan.s_max(),
            budget: plan.budget(),
            brackets: Vec::with_capacity(plan.s_max() + 1),
            best: BestResult::new(),
            status: RunStatus::Running,
            error: None,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn push_bracket(&mut self, bracket: BracketReport) {
        self.brackets.push(bracket);
    }

    pub fn mark_completed(&mut self, best: BestResult) {
        self.best = best;
        self.status = RunStatus::Completed;
        self.finished_at = Some(Utc::now());
    }

    /// Brackets finished before the failure and the best so far are kept.
    pub fn mark_failed(&mut self, best: BestResult, error: String) {
        self.best = best;
        self.status = RunStatus::Failed;
        self.error = Some(error);
        self.finished_at = Some(Utc::now());
    }

    /// Total `evaluate` calls across all brackets.
    pub fn evaluations(&self) -> usize {
        self.brackets.iter().map(BracketReport::evaluations).sum()
    }

    /// Total configurations sampled across all brackets.
    pub fn configurations(&self) -> usize {
        self.brackets.iter().map(|b| b.bracket.n).sum()
    }

    pub fn duration_seconds(&self) -> Option<i64> {
        self.finished_at
            .map(|finished| (finished - self.started_at).num_seconds())
    }
}
