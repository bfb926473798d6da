//! Error types for dataset validation and preparation.
//!
//! Every rejection the validator or preparer can produce is a variant of
//! [`ProcessingError`]. Each variant carries a stable machine-readable code
//! (see [`ProcessingError::error_code`]), belongs to an [`ErrorKind`], and can
//! expose a structured diagnostic payload through [`ProcessingError::details`].
//!
//! Errors serialize as `{code, kind, message, details}` so a transport layer
//! can hand them to clients unchanged.

use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;

/// Coarse failure taxonomy shared by the whole pipeline.
///
/// The kind decides how a failure propagates: input, training and persistence
/// errors abort a run, diagnostic errors only degrade the result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// Malformed, missing or underspecified input. Always user-correctable.
    InputError,
    /// A candidate or an entire hyperparameter search failed to fit.
    TrainingError,
    /// Serialization or storage of the trained model failed.
    PersistenceError,
    /// A single metric or chart failed. Never fatal.
    DiagnosticError,
    /// Anything that escaped the typed paths, including panics.
    UnexpectedError,
}

impl ErrorKind {
    /// Returns the wire representation of the kind.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InputError => "INPUT_ERROR",
            ErrorKind::TrainingError => "TRAINING_ERROR",
            ErrorKind::PersistenceError => "PERSISTENCE_ERROR",
            ErrorKind::DiagnosticError => "DIAGNOSTIC_ERROR",
            ErrorKind::UnexpectedError => "UNEXPECTED_ERROR",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The main error type for validation and preparation.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ProcessingError {
    /// The upload contained no bytes, or only whitespace.
    #[error("CSV file is empty")]
    EmptyCsvFile,

    /// The upload could not be read as text.
    #[error("Error reading CSV: {0}")]
    CsvRead(String),

    /// The CSV reader rejected the content.
    #[error("CSV parse error: {0}")]
    CsvParse(String),

    /// A header was parsed but there are no data rows or no columns.
    #[error("CSV contains no data")]
    EmptyDataset,

    /// The declared target column is not in the header.
    #[error("Target column '{column}' not found")]
    TargetColumnNotFound {
        column: String,
        available_columns: Vec<String>,
    },

    /// Too few rows before cleaning.
    #[error("Insufficient data: {rows} rows, at least {min_rows} required")]
    InsufficientData { rows: usize, min_rows: usize },

    /// More missing cells than the configured cap.
    #[error("Dataset has too many null values: {null_count} (maximum {max_null_cells})")]
    TooManyNulls {
        null_count: usize,
        max_null_cells: usize,
    },

    /// Too few rows left once incomplete rows were dropped.
    #[error("Insufficient data after cleaning: {rows} rows, at least {min_rows} required")]
    InsufficientDataAfterCleaning { rows: usize, min_rows: usize },

    /// The classification target has fewer distinct values than required.
    #[error("Target column '{column}' has {classes} distinct value(s), at least {min_classes} required")]
    InsufficientTargetClasses {
        column: String,
        classes: usize,
        min_classes: usize,
    },

    /// The classification target looks more like an identifier than a label.
    #[error("Target column '{column}' has {classes} distinct values, at most {max_classes} allowed for classification")]
    TooManyTargetClasses {
        column: String,
        classes: usize,
        max_classes: usize,
    },

    /// The regression target has values that are not numbers.
    #[error("Target column '{column}' must be numeric for regression ({invalid_count} non-numeric value(s))")]
    NonNumericTarget {
        column: String,
        invalid_count: usize,
        example: Option<String>,
    },

    /// Target values could not be turned into codes or numbers.
    #[error("Error encoding target: {0}")]
    TargetEncoding(String),

    /// Feature columns could not be encoded.
    #[error("Error creating features: {0}")]
    FeaturePreparation(String),

    /// Nothing is left to learn from once the target is removed.
    #[error("No features available after preprocessing")]
    NoFeaturesAvailable,

    /// The train/test partition could not be produced.
    #[error("Failed to split data: {0}")]
    DataSplit(String),

    /// A raw record or feature vector does not fit the stored feature layout.
    #[error("Invalid features: {0}")]
    InvalidFeatures(String),

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Polars error wrapper.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// Generic error with context.
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<ProcessingError>,
    },
}

impl ProcessingError {
    /// Add context to an error.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        ProcessingError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Stable machine-readable code for this failure.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::EmptyCsvFile => "EMPTY_CSV_FILE",
            Self::CsvRead(_) => "CSV_READ_ERROR",
            Self::CsvParse(_) => "CSV_PARSE_ERROR",
            Self::EmptyDataset => "EMPTY_DATASET",
            Self::TargetColumnNotFound { .. } => "TARGET_COLUMN_NOT_FOUND",
            Self::InsufficientData { .. } => "INSUFFICIENT_DATA",
            Self::TooManyNulls { .. } => "TOO_MANY_NULLS",
            Self::InsufficientDataAfterCleaning { .. } => "INSUFFICIENT_DATA_AFTER_CLEANING",
            Self::InsufficientTargetClasses { .. } => "INSUFFICIENT_TARGET_CLASSES",
            Self::TooManyTargetClasses { .. } => "TOO_MANY_TARGET_CLASSES",
            Self::NonNumericTarget { .. } => "NON_NUMERIC_TARGET",
            Self::TargetEncoding(_) => "TARGET_ENCODING_ERROR",
            Self::FeaturePreparation(_) => "FEATURE_PREPARATION_ERROR",
            Self::NoFeaturesAvailable => "NO_FEATURES_AVAILABLE",
            Self::DataSplit(_) => "DATA_SPLIT_ERROR",
            Self::InvalidFeatures(_) => "INVALID_FEATURES",
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::Polars(_) => "POLARS_ERROR",
            Self::WithContext { source, .. } => source.error_code(),
        }
    }

    /// Every processing failure is an input problem.
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::InputError
    }

    /// Structured payload describing the offending input, if any.
    pub fn details(&self) -> Option<Value> {
        match self {
            Self::TargetColumnNotFound {
                column,
                available_columns,
            } => Some(json!({
                "target_column": column,
                "available_columns": available_columns,
            })),
            Self::InsufficientData { rows, min_rows }
            | Self::InsufficientDataAfterCleaning { rows, min_rows } => Some(json!({
                "rows": rows,
                "min_rows": min_rows,
            })),
            Self::TooManyNulls {
                null_count,
                max_null_cells,
            } => Some(json!({
                "null_count": null_count,
                "max_null_cells": max_null_cells,
            })),
            Self::InsufficientTargetClasses {
                column,
                classes,
                min_classes,
            } => Some(json!({
                "target_column": column,
                "classes": classes,
                "min_classes": min_classes,
            })),
            Self::TooManyTargetClasses {
                column,
                classes,
                max_classes,
            } => Some(json!({
                "target_column": column,
                "classes": classes,
                "max_classes": max_classes,
            })),
            Self::NonNumericTarget {
                column,
                invalid_count,
                example,
            } => Some(json!({
                "target_column": column,
                "invalid_count": invalid_count,
                "example": example,
            })),
            Self::WithContext { source, .. } => source.details(),
            _ => None,
        }
    }
}

impl Serialize for ProcessingError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("ProcessingError", 4)?;
        state.serialize_field("code", &self.error_code())?;
        state.serialize_field("kind", &self.kind())?;
        state.serialize_field("message", &self.to_string())?;
        state.serialize_field("details", &self.details())?;
        state.end()
    }
}

/// Result type alias for processing operations.
pub type Result<T> = std::result::Result<T, ProcessingError>;

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, polars::error::PolarsError> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| ProcessingError::Polars(e).with_context(context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code() {
        assert_eq!(ProcessingError::EmptyCsvFile.error_code(), "EMPTY_CSV_FILE");
        assert_eq!(
            ProcessingError::TooManyNulls {
                null_count: 60,
                max_null_cells: 50
            }
            .error_code(),
            "TOO_MANY_NULLS"
        );
        assert_eq!(
            ProcessingError::NoFeaturesAvailable.error_code(),
            "NO_FEATURES_AVAILABLE"
        );
    }

    #[test]
    fn test_kind_is_input() {
        assert_eq!(ProcessingError::EmptyDataset.kind(), ErrorKind::InputError);
        assert_eq!(ErrorKind::InputError.as_str(), "INPUT_ERROR");
    }

    #[test]
    fn test_details_lists_available_columns() {
        let error = ProcessingError::TargetColumnNotFound {
            column: "label".to_string(),
            available_columns: vec!["a".to_string(), "b".to_string()],
        };
        let details = error.details().unwrap();
        assert_eq!(details["available_columns"], json!(["a", "b"]));
    }

    #[test]
    fn test_error_serialization() {
        let error = ProcessingError::TooManyNulls {
            null_count: 60,
            max_null_cells: 50,
        };
        let value = serde_json::to_value(&error).unwrap();
        assert_eq!(value["code"], "TOO_MANY_NULLS");
        assert_eq!(value["kind"], "INPUT_ERROR");
        assert_eq!(value["details"]["null_count"], 60);
        assert!(value["message"].as_str().unwrap().contains("60"));
    }

    #[test]
    fn test_with_context() {
        let error = ProcessingError::EmptyDataset.with_context("While validating upload");
        assert!(error.to_string().contains("While validating upload"));
        assert_eq!(error.error_code(), "EMPTY_DATASET"); // Preserves original code
    }
}
