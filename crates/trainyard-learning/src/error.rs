//! Error types for the trainyard-learning crate.
//!
//! This module defines [`LearningError`], the main error type used throughout
//! the crate, and [`PipelineError`], the plain-data failure value returned by
//! [`run_pipeline`](crate::run_pipeline).
//!
//! # Error Handling
//!
//! Errors are designed to be:
//! - **Coded**: every variant maps to a stable SCREAMING_SNAKE code
//! - **Classified**: every variant belongs to an [`ErrorKind`] that decides
//!   whether it aborts a run or only degrades the result
//! - **Inspectable**: offending values travel in a structured `details` payload
//!
//! # Example
//!
//! ```
//! use trainyard_learning::{Algorithm, LearningError, PipelineConfig};
//!
//! fn configure() -> Result<PipelineConfig, LearningError> {
//!     // Errors are automatically propagated with ?
//!     let config = PipelineConfig::builder()
//!         .target_column("price")
//!         .algorithm(Algorithm::RidgeRegression)
//!         .build()?;
//!     Ok(config)
//! }
//! # configure().unwrap();
//! ```

use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;
use trainyard_processing::ProcessingError;

pub use trainyard_processing::ErrorKind;

/// The main error type for trainyard-learning operations.
///
/// This enum covers all error conditions that can occur during:
/// - Pipeline configuration
/// - Validation and preparation (wrapped [`ProcessingError`])
/// - Hyperparameter search and model fitting
/// - Model persistence and inference
/// - Metric computation and chart rendering
///
/// This enum is marked `#[non_exhaustive]` to allow adding new variants
/// in future versions without breaking downstream code.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum LearningError {
    /// The dataset was rejected or could not be prepared.
    ///
    /// The wrapped error keeps its own code, e.g. `TOO_MANY_NULLS`.
    #[error(transparent)]
    Input(#[from] ProcessingError),

    /// A ridge alpha override parsed as a number but is not positive.
    #[error("Alpha must be a positive number, got {value}")]
    InvalidAlphaValue {
        /// The parsed value.
        value: f64,
    },

    /// A ridge alpha override is not a finite number.
    #[error("Invalid alpha format: '{raw}' is not a number")]
    InvalidAlphaFormat {
        /// The text as supplied by the caller.
        raw: String,
    },

    /// Invalid configuration provided to the pipeline.
    ///
    /// Check the error message for details on which configuration value is invalid
    /// and what values are accepted.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The algorithm name is not one of the supported families.
    #[error("Unknown algorithm '{name}'. Valid values are: {valid}")]
    UnknownAlgorithm {
        /// The name that was supplied.
        name: String,
        /// Comma-separated list of accepted names.
        valid: String,
    },

    /// The algorithm does not fit the task the target calls for.
    #[error("Algorithm '{algorithm}' cannot be used for {task}")]
    AlgorithmTaskMismatch {
        algorithm: String,
        task: String,
    },

    /// A single fit failed, or nothing could be fitted at all.
    ///
    /// Within a search this is caught per candidate; it only surfaces when
    /// no candidate fits.
    #[error("Model training failed: {0}")]
    TrainingFailed(String),

    /// The hyperparameter search produced no usable candidate.
    #[error("Hyperparameter tuning failed: {0}")]
    TuningFailed(String),

    /// The trained model could not be serialized or written.
    #[error("Failed to save model: {0}")]
    ModelSave(String),

    /// A stored model could not be read or decoded.
    #[error("Failed to load model: {0}")]
    ModelLoad(String),

    /// An input vector or record does not match the model's features.
    #[error("Invalid features: {0}")]
    InvalidFeatures(String),

    /// A chart could not be rendered. Never fatal to a run.
    #[error("Diagnostic rendering failed for {chart}: {message}")]
    Diagnostic {
        /// Which chart failed.
        chart: String,
        message: String,
    },

    /// A metric could not be computed. Never fatal to a run.
    #[error("Metric computation failed: {0}")]
    Metrics(String),

    /// A panic or other failure outside the typed paths.
    #[error("Unexpected error: {0}")]
    Unexpected(String),

    /// I/O error during file operations.
    ///
    /// This wraps standard I/O errors that occur during model save/load operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl LearningError {
    /// Stable machine-readable code for this failure.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Input(e) => e.error_code(),
            Self::InvalidAlphaValue { .. } => "INVALID_ALPHA_VALUE",
            Self::InvalidAlphaFormat { .. } => "INVALID_ALPHA_FORMAT",
            Self::InvalidConfig(_) | Self::AlgorithmTaskMismatch { .. } => "INVALID_CONFIG",
            Self::UnknownAlgorithm { .. } => "UNKNOWN_ALGORITHM",
            Self::TrainingFailed(_) => "MODEL_TRAINING_ERROR",
            Self::TuningFailed(_) => "HYPERPARAMETER_TUNING_ERROR",
            Self::ModelSave(_) => "MODEL_SAVE_ERROR",
            Self::ModelLoad(_) => "MODEL_LOAD_ERROR",
            Self::InvalidFeatures(_) => "INVALID_FEATURES",
            Self::Diagnostic { .. } => "DIAGNOSTIC_RENDER_ERROR",
            Self::Metrics(_) => "METRICS_ERROR",
            Self::Unexpected(_) => "UNEXPECTED_ERROR",
            Self::Io(_) => "IO_ERROR",
        }
    }

    /// Failure class, deciding whether a run aborts or degrades.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Input(e) => e.kind(),
            Self::InvalidAlphaValue { .. }
            | Self::InvalidAlphaFormat { .. }
            | Self::InvalidConfig(_)
            | Self::AlgorithmTaskMismatch { .. }
            | Self::UnknownAlgorithm { .. }
            | Self::InvalidFeatures(_) => ErrorKind::InputError,
            Self::TrainingFailed(_) | Self::TuningFailed(_) => ErrorKind::TrainingError,
            Self::ModelSave(_) | Self::ModelLoad(_) | Self::Io(_) => ErrorKind::PersistenceError,
            Self::Diagnostic { .. } | Self::Metrics(_) => ErrorKind::DiagnosticError,
            Self::Unexpected(_) => ErrorKind::UnexpectedError,
        }
    }

    /// Structured payload describing the failure, if any.
    pub fn details(&self) -> Option<Value> {
        match self {
            Self::Input(e) => e.details(),
            Self::InvalidAlphaValue { value } => Some(json!({ "alpha": value })),
            Self::InvalidAlphaFormat { raw } => Some(json!({ "alpha": raw })),
            Self::UnknownAlgorithm { name, valid } => Some(json!({
                "algorithm": name,
                "valid": valid.split(", ").collect::<Vec<_>>(),
            })),
            Self::AlgorithmTaskMismatch { algorithm, task } => Some(json!({
                "algorithm": algorithm,
                "task": task,
            })),
            Self::Diagnostic { chart, .. } => Some(json!({ "chart": chart })),
            _ => None,
        }
    }
}

impl Serialize for LearningError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("LearningError", 4)?;
        state.serialize_field("code", &self.error_code())?;
        state.serialize_field("kind", &self.kind())?;
        state.serialize_field("message", &self.to_string())?;
        state.serialize_field("details", &self.details())?;
        state.end()
    }
}

impl From<serde_json::Error> for LearningError {
    fn from(err: serde_json::Error) -> Self {
        LearningError::ModelLoad(err.to_string())
    }
}

/// Result type alias for learning operations.
pub type Result<T> = std::result::Result<T, LearningError>;

/// The single failure value a pipeline run hands back to its caller.
///
/// Plain data: it can cross threads, be logged, stored or sent over any
/// transport without dragging the error chain along.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineError {
    pub code: String,
    pub kind: ErrorKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl PipelineError {
    /// A failure that escaped every typed path.
    pub fn unexpected(message: impl Into<String>) -> Self {
        LearningError::Unexpected(message.into()).into()
    }
}

impl From<LearningError> for PipelineError {
    fn from(err: LearningError) -> Self {
        Self {
            code: err.error_code().to_string(),
            kind: err.kind(),
            message: err.to_string(),
            details: err.details(),
        }
    }
}

impl From<ProcessingError> for PipelineError {
    fn from(err: ProcessingError) -> Self {
        LearningError::from(err).into()
    }
}

impl std::fmt::Display for PipelineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for PipelineError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_and_kinds() {
        let err = LearningError::InvalidAlphaValue { value: -5.0 };
        assert_eq!(err.error_code(), "INVALID_ALPHA_VALUE");
        assert_eq!(err.kind(), ErrorKind::InputError);

        let err = LearningError::TuningFailed("no candidate".into());
        assert_eq!(err.error_code(), "HYPERPARAMETER_TUNING_ERROR");
        assert_eq!(err.kind(), ErrorKind::TrainingError);

        let err = LearningError::ModelSave("disk full".into());
        assert_eq!(err.kind(), ErrorKind::PersistenceError);
    }

    #[test]
    fn test_input_errors_keep_their_code() {
        let err: LearningError = ProcessingError::TooManyNulls {
            null_count: 60,
            max_null_cells: 50,
        }
        .into();
        assert_eq!(err.error_code(), "TOO_MANY_NULLS");
        assert_eq!(err.details().unwrap()["null_count"], 60);
    }

    #[test]
    fn test_pipeline_error_from_learning_error() {
        let err = PipelineError::from(LearningError::InvalidAlphaFormat { raw: "abc".into() });
        assert_eq!(err.code, "INVALID_ALPHA_FORMAT");
        assert_eq!(err.kind, ErrorKind::InputError);
        assert_eq!(err.details, Some(json!({"alpha": "abc"})));
        assert!(err.to_string().starts_with("[INVALID_ALPHA_FORMAT]"));
    }

    #[test]
    fn test_pipeline_error_round_trips_json() {
        let err = PipelineError::unexpected("boom");
        let text = serde_json::to_string(&err).unwrap();
        assert!(text.contains("\"kind\":\"UNEXPECTED_ERROR\""));
        let back: PipelineError = serde_json::from_str(&text).unwrap();
        assert_eq!(back, err);
    }
}
