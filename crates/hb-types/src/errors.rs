use thiserror::Error;

/// Main error type for the Hyperband scheduler
#[derive(Error, Debug)]
pub enum HbError {
    #[error("Objective error: {0}")]
    Objective(#[from] ObjectiveError),

    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Export error: {0}")]
    Export(String),
}

/// Errors raised by an objective while evaluating a configuration
#[derive(Error, Debug)]
pub enum ObjectiveError {
    #[error("Evaluation failed for {config_id} at resource {resource}: {message}")]
    EvaluationFailed {
        config_id: String,
        resource: u64,
        message: String,
    },

    #[error("Invalid parameter {parameter}: {message}")]
    InvalidParameter { parameter: String, message: String },

    #[error("Non-finite metric {metric} reported for {config_id}")]
    NonFiniteMetric { config_id: String, metric: f64 },
}

/// Errors raised while persisting or restoring objective state
#[derive(Error, Debug)]
pub enum CheckpointError {
    #[error("Corrupt checkpoint at {path}: {message}")]
    Corrupt { path: String, message: String },

    #[error("Checkpoint write failed at {path}: {message}")]
    WriteFailed { path: String, message: String },

    #[error("Checkpoint state rejected by trainer: {message}")]
    RestoreFailed { message: String },
}

/// Result type alias for scheduler operations
pub type HbResult<T> = Result<T, HbError>;

/// Macro for creating configuration errors
#[macro_export]
macro_rules! config_error {
    ($($arg:tt)*) => {
        $crate::HbError::Config(format!($($arg)*))
    };
}
