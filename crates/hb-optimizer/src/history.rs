//! Append-only evaluation history, keyed by configuration identity.

use hb_types::{ConfigId, Configuration};
use serde::Serialize;
use std::collections::HashMap;

/// One completed evaluation step of a configuration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryEntry {
    pub configuration: Configuration,
    pub metric: f64,
}

/// Every step recorded for one configuration, in the order it was appended.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Lineage {
    pub id: ConfigId,
    pub entries: Vec<HistoryEntry>,
}

/// Shared log of per-step metrics.
///
/// The scheduler registers a lineage for every sampled configuration and
/// objectives append to it. Nothing is ever removed. Lineages iterate in
/// registration order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct HistoryLog {
    lineages: Vec<Lineage>,
    #[serde(skip)]
    index: HashMap<ConfigId, usize>,
}

impl HistoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open an empty lineage for `id`. Registering twice is a no-op.
    pub fn register(&mut self, id: ConfigId) {
        self.slot(id);
    }

    /// Append one step for `configuration`, opening its lineage if needed.
    pub fn record(&mut self, configuration: &Configuration, metric: f64) {
        let slot = self.slot(configuration.id());
        self.lineages[slot].entries.push(HistoryEntry {
            configuration: configuration.clone(),
            metric,
        });
    }

    fn slot(&mut self, id: ConfigId) -> usize {
        if let Some(&slot) = self.index.get(&id) {
            return slot;
        }
        self.lineages.push(Lineage {
            id,
            entries: Vec::new(),
        });
        let slot = self.lineages.len() - 1;
        self.index.insert(id, slot);
        slot
    }

    pub fn entries(&self, id: &ConfigId) -> Option<&[HistoryEntry]> {
        self.index
            .get(id)
            .map(|&slot| self.lineages[slot].entries.as_slice())
    }

    pub fn contains(&self, id: &ConfigId) -> bool {
        self.index.contains_key(id)
    }

    pub fn lineages(&self) -> impl Iterator<Item = &Lineage> {
        self.lineages.iter()
    }

    /// Number of registered configurations.
    pub fn len(&self) -> usize {
        self.lineages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lineages.is_empty()
    }

    /// Number of recorded steps across all lineages.
    pub fn total_entries(&self) -> usize {
        self.lineages.iter().map(|l| l.entries.len()).sum()
    }
}
