//! trainyard-learning: hyperparameter search, evaluation and diagnostics
//! for tabular datasets.
//!
//! This crate turns an uploaded CSV plus a small set of choices (target
//! column, algorithm, optional ridge alpha) into a trained model, a metrics
//! report and a battery of diagnostic charts. Validation and preparation
//! live in [`trainyard_processing`]; everything after the train/test split
//! lives here.
//!
//! # Features
//!
//! - **Six algorithm families**: decision tree, k-nearest neighbours and
//!   random forest for classification; linear, polynomial and ridge
//!   regression for regression
//! - **Seeded searches**: fixed hyperparameter grids, scored on the test
//!   partition (ridge: k-fold on the train partition)
//! - **Task-aware metrics**: binary vs. macro averaging, ROC AUC, R²/MSE/RMSE/MAE
//! - **Diagnostics**: confusion matrix, ROC and precision-recall curves,
//!   feature importance, residual plots, error distribution and Q-Q plot
//!   rendered to SVG
//! - **Portable models**: JSON-serialized estimators that predict from
//!   encoded vectors or raw records
//! - **Progress Reporting**: stage-by-stage callbacks
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use trainyard_learning::{Algorithm, run_pipeline};
//!
//! let bytes = std::fs::read("houses.csv")?;
//! let result = run_pipeline(&bytes, "price", Algorithm::RidgeRegression, "houses", None)?;
//!
//! println!("metrics: {:?}", result.metrics);
//! for image in &result.images {
//!     std::fs::write(&image.file_name, &image.bytes)?;
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Architecture
//!
//! ```text
//! raw bytes ──► validate ──► prepare ──► train ──► evaluate ──► render ──► PipelineResult
//!               (trainyard_processing)   │                                   │
//!                                        └─ CandidateModel ─► TrainedModel ──┘
//! ```
//!
//! # Error Handling
//!
//! Library operations return [`Result<T, LearningError>`](LearningError).
//! [`Pipeline::run()`] and [`run_pipeline()`] flatten every failure into a
//! plain-data [`PipelineError`] with a stable code and an [`ErrorKind`]:
//!
//! - `INPUT_ERROR` - the upload or the options were rejected
//! - `TRAINING_ERROR` - no candidate could be fitted
//! - `PERSISTENCE_ERROR` - the model could not be serialized
//! - `UNEXPECTED_ERROR` - anything else, including panics
//!
//! Metric and chart failures never fail a run; they are collected in
//! [`PipelineResult::warnings`].
//!
//! # Modules
//!
//! - [`estimators`] - The fitted estimator implementations
//! - [`metrics`] - Classification and regression metrics, ROC/PR curves
//! - [`trainer`] - Hyperparameter search spaces and the [`Trainer`]

mod artifacts;
mod config;
mod error;
pub mod estimators;
mod linalg;
pub mod metrics;
mod model;
mod pipeline;
mod progress;
mod report;
pub mod trainer;
mod types;

// Re-export public API
//
// Configuration types
pub use config::{
    Algorithm, DEFAULT_CV_FOLDS, DEFAULT_MAX_POLYNOMIAL_FEATURES, HyperparameterOverrides,
    PipelineConfig, PipelineConfigBuilder, RenderConfig, Rgb, generate_run_id,
};
// Error types
pub use error::{ErrorKind, LearningError, PipelineError, Result as LearningResult};
// Core operations
pub use artifacts::{DiagnosticRenderer, ReferenceLine, RenderOutcome, render_diagnostics};
pub use metrics::{compute_metrics, evaluate};
pub use pipeline::{Pipeline, PipelineBuilder, run_pipeline};
pub use trainer::{TrainOptions, Trainer, train};
// Model types
pub use model::TrainedModel;
// Progress reporting types
pub use progress::{ParsePipelineStageError, PipelineStage, ProgressCallback, ProgressUpdate};
// Report types
pub use report::{ChartCaption, MetricLine, ModelReport};
// Result and metrics types
pub use types::{
    Averaging, CandidateModel, CandidateSummary, Capabilities, Capability, ClassificationMetrics,
    DiagnosticImage, DiagnosticKind, Hyperparameters, LinearCoefficients, MetricsReport,
    PipelineResult, Prediction, RegressionMetrics, TrainedModelArtifact,
};
// Validation and preparation, so callers need a single crate
pub use trainyard_processing::{
    ClassificationKind, CleanDataset, PreparedData, ProcessingConfig, ProcessingError, TaskKind,
    TrainingTask, ValidationReport, prepare, validate,
};

#[cfg(test)]
mod tests {
    use super::*;

    static_assertions::assert_impl_all!(LearningError: Send, Sync);
    static_assertions::assert_impl_all!(PipelineError: Send, Sync, Clone);
    static_assertions::assert_impl_all!(Pipeline: Send, Sync);
    static_assertions::assert_impl_all!(PipelineResult: Send, Sync, Clone);
    static_assertions::assert_impl_all!(TrainedModel: Send, Sync, Clone);
    static_assertions::assert_impl_all!(CandidateModel: Send, Sync);
    static_assertions::assert_impl_all!(PipelineConfig: Send, Sync, Clone);
    static_assertions::assert_impl_all!(ProgressUpdate: Send, Sync, Clone);
}
