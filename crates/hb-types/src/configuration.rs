//! Sampled hyperparameter assignments and their identities.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// A concrete parameter value produced by a distribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    Int(i64),
    Float(f64),
    Json(serde_json::Value),
}

impl ParameterValue {
    /// Numeric view of the value; integers widen to `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Int(v) => Some(*v as f64),
            Self::Json(v) => v.as_f64(),
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            Self::Json(v) => v.as_i64(),
            Self::Float(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Json(v) => v.as_str(),
            _ => None,
        }
    }
}

impl fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Float(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Json(v) => write!(f, "{v}"),
        }
    }
}

/// Parameter name to sampled value, ordered by name.
pub type Parameters = BTreeMap<String, ParameterValue>;

/// Globally unique identity of a sampled configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigId(Uuid);

impl ConfigId {
    pub fn new_v4() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// Hyphen-free form, used for checkpoint file names.
    pub fn simple(&self) -> String {
        self.0.simple().to_string()
    }
}

impl fmt::Display for ConfigId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

/// An immutable hyperparameter assignment paired with its identity.
///
/// Two configurations with equal parameters are still distinct lineages;
/// compare [`Configuration::id`] when tracking through rungs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    id: ConfigId,
    parameters: Parameters,
}

impl Configuration {
    pub fn new(id: ConfigId, parameters: Parameters) -> Self {
        Self { id, parameters }
    }

    pub fn id(&self) -> ConfigId {
        self.id
    }

    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    pub fn get(&self, name: &str) -> Option<&ParameterValue> {
        self.parameters.get(name)
    }

    /// Numeric parameter lookup with a fallback for absent keys.
    pub fn f64_or(&self, name: &str, default: f64) -> f64 {
        self.get(name).and_then(ParameterValue::as_f64).unwrap_or(default)
    }
}

impl fmt::Display for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {{", self.id)?;
        for (i, (name, value)) in self.parameters.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, " {name}={value}")?;
        }
        write!(f, " }}")
    }
}
