//! Best configuration observed across a whole run.

use hb_types::Configuration;
use serde::{Deserialize, Deserializer, Serialize};

/// The lowest metric seen so far and the configuration that produced it.
///
/// Starts empty at `+inf`; metrics are lower-is-better. A non-finite upper
/// bound serialises as `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BestResult {
    pub configuration: Option<Configuration>,
    #[serde(deserialize_with = "null_as_infinity")]
    pub metric: f64,
}

fn null_as_infinity<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::INFINITY))
}

impl BestResult {
    pub fn new() -> Self {
        Self {
            configuration: None,
            metric: f64::INFINITY,
        }
    }

    /// Replace the current best iff `metric` is strictly lower.
    ///
    /// Returns whether the best changed. NaN never wins.
    pub fn offer(&mut self, configuration: &Configuration, metric: f64) -> bool {
        if metric < self.metric {
            self.configuration = Some(configuration.clone());
            self.metric = metric;
            true
        } else {
            false
        }
    }

    pub fn is_empty(&self) -> bool {
        self.configuration.is_none()
    }
}

impl Default for BestResult {
    fn default() -> Self {
        Self::new()
    }
}
