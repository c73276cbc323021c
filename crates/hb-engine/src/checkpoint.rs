//! On-disk checkpoints for resumable objectives.

use chrono::{DateTime, Utc};
use hb_types::{CheckpointError, ConfigId, HbResult};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Persisted progress of one configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Resource units consumed so far.
    pub resource: u64,
    /// Lowest metric observed over the configuration's whole lifetime.
    pub best_metric: Option<f64>,
    /// Opaque trainer state.
    pub trainer_state: serde_json::Value,
    pub updated_at: DateTime<Utc>,
}

/// Checkpoint files under `<homedir>/ckpt`, one JSON file per configuration.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    pub root: PathBuf,
}

impl CheckpointStore {
    pub fn new<P: AsRef<Path>>(homedir: P) -> HbResult<Self> {
        let root = homedir.as_ref().join("ckpt");
        std::fs::create_dir_all(&root)?;

        Ok(Self { root })
    }

    /// Storage path for a configuration.
    pub fn path(&self, id: &ConfigId) -> PathBuf {
        self.root.join(format!("{}.json", id.simple()))
    }

    /// Load a checkpoint; `None` when the configuration has never been saved.
    pub fn load<T: DeserializeOwned>(&self, id: &ConfigId) -> HbResult<Option<T>> {
        let path = self.path(id);
        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        serde_json::from_str(&raw).map(Some).map_err(|e| {
            CheckpointError::Corrupt {
                path: path.display().to_string(),
                message: e.to_string(),
            }
            .into()
        })
    }

    /// Write a checkpoint atomically (temp file, then rename).
    pub fn save<T: Serialize>(&self, id: &ConfigId, state: &T) -> HbResult<()> {
        let path = self.path(id);
        let tmp = path.with_extension("json.tmp");
        let body = serde_json::to_vec_pretty(state)?;

        std::fs::write(&tmp, body)
            .and_then(|_| std::fs::rename(&tmp, &path))
            .map_err(|e| CheckpointError::WriteFailed {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;

        debug!("Saved checkpoint {}", path.display());
        Ok(())
    }

    /// Remove every checkpoint, leaving an empty store.
    pub fn clear(&self) -> HbResult<()> {
        if self.root.exists() {
            std::fs::remove_dir_all(&self.root)?;
        }
        std::fs::create_dir_all(&self.root)?;
        Ok(())
    }
}
