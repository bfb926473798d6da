//! Common types used throughout the trainyard-learning crate.
//!
//! This module defines the values handed between pipeline stages and back
//! to the caller.
//!
//! # Overview
//!
//! - [`CandidateModel`]: the winner of a hyperparameter search, from [`train`](crate::train)
//! - [`MetricsReport`]: task-appropriate metrics, from [`evaluate`](crate::evaluate)
//! - [`DiagnosticImage`]: one rendered chart, from [`render_diagnostics`](crate::render_diagnostics)
//! - [`TrainedModelArtifact`]: the serialized model plus its metadata
//! - [`PipelineResult`]: everything a completed run returns
//! - [`Prediction`]: the result of [`TrainedModel::predict`](crate::TrainedModel::predict)

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use trainyard_processing::TrainingTask;

use crate::config::Algorithm;
use crate::estimators::FittedModel;

/// A capability of a fitted estimator.
///
/// Resolved from the [`Algorithm`] at training time, never by probing the
/// estimator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// `predict_proba` returns class probabilities.
    SupportsProbability,
    /// The model exposes an intercept and per-term coefficients.
    SupportsLinearCoefficients,
    /// The model exposes impurity-based feature importances.
    SupportsFeatureImportance,
}

/// The set of [`Capability`] values an estimator family has.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Capabilities(Vec<Capability>);

impl Capabilities {
    pub fn new(capabilities: &[Capability]) -> Self {
        let mut set = capabilities.to_vec();
        set.sort_unstable();
        set.dedup();
        Self(set)
    }

    #[must_use]
    pub fn supports(&self, capability: Capability) -> bool {
        self.0.contains(&capability)
    }

    pub fn iter(&self) -> impl Iterator<Item = Capability> + '_ {
        self.0.iter().copied()
    }
}

/// Hyperparameter name to value, ordered by name.
pub type Hyperparameters = BTreeMap<String, serde_json::Value>;

/// One entry of a hyperparameter search, in search order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateSummary {
    pub hyperparameters: Hyperparameters,

    /// Held-out score (accuracy or R²; mean fold R² for the ridge alpha search).
    pub score: Option<f64>,

    /// Why the candidate was skipped, if it was.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// The selected estimator of a search, with the values that produced it.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct CandidateModel {
    pub algorithm: Algorithm,
    pub model: FittedModel,
    pub hyperparameters: Hyperparameters,

    /// Test-partition score. `None` when it could not be computed, e.g. for
    /// the random forest default fallback with an empty test partition.
    pub score: Option<f64>,

    /// Every candidate tried, in search order.
    pub evaluated: Vec<CandidateSummary>,

    /// Non-fatal problems met during the search.
    pub warnings: Vec<String>,
}

impl CandidateModel {
    pub fn capabilities(&self) -> Capabilities {
        self.algorithm.capabilities()
    }
}

/// How precision, recall and F1 were averaged over classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Averaging {
    /// Scores of the positive class (the larger class code) only.
    Binary,
    /// Unweighted mean over classes; undefined ratios count as 0.
    Macro,
}

/// Metrics for a classification model on the test partition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationMetrics {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub averaging: Averaging,

    /// Class codes labelling the confusion matrix rows and columns, ascending.
    pub classes: Vec<f64>,

    /// `confusion_matrix[i][j]`: rows of true class `i` predicted as class `j`.
    pub confusion_matrix: Vec<Vec<usize>>,

    /// Area under the ROC curve, binary tasks with probabilities only.
    pub roc_auc: Option<f64>,
}

/// Metrics for a regression model on the test partition.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegressionMetrics {
    pub r2: f64,
    pub mse: f64,
    pub rmse: f64,
    pub mae: f64,
}

/// Task-appropriate metrics of the selected model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "task", rename_all = "snake_case")]
pub enum MetricsReport {
    Classification(ClassificationMetrics),
    Regression(RegressionMetrics),
}

impl MetricsReport {
    /// The selection score: accuracy or R².
    pub fn primary_score(&self) -> f64 {
        match self {
            MetricsReport::Classification(m) => m.accuracy,
            MetricsReport::Regression(m) => m.r2,
        }
    }
}

/// The fixed battery of diagnostic charts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    ConfusionMatrix,
    RocCurve,
    PrecisionRecallCurve,
    FeatureImportance,
    Residuals,
    ActualVsPredicted,
    ErrorDistribution,
    QqPlot,
}

impl DiagnosticKind {
    pub fn title(&self) -> &'static str {
        match self {
            DiagnosticKind::ConfusionMatrix => "Confusion Matrix",
            DiagnosticKind::RocCurve => "ROC Curve",
            DiagnosticKind::PrecisionRecallCurve => "Precision-Recall Curve",
            DiagnosticKind::FeatureImportance => "Feature Importance",
            DiagnosticKind::Residuals => "Residual Plot",
            DiagnosticKind::ActualVsPredicted => "Actual vs Predicted",
            DiagnosticKind::ErrorDistribution => "Error Distribution",
            DiagnosticKind::QqPlot => "Q-Q Plot",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            DiagnosticKind::ConfusionMatrix => "Shows TP, FP, FN, TN",
            DiagnosticKind::RocCurve => "Shows model's ability to distinguish classes",
            DiagnosticKind::PrecisionRecallCurve => {
                "Shows trade-off between precision and recall"
            }
            DiagnosticKind::FeatureImportance => {
                "Shows the importance of each feature in the Random Forest model"
            }
            DiagnosticKind::Residuals => "Shows residuals vs predictions",
            DiagnosticKind::ActualVsPredicted => "Compares predicted vs actual values",
            DiagnosticKind::ErrorDistribution => "Distribution of prediction errors",
            DiagnosticKind::QqPlot => "Check if residuals are normally distributed",
        }
    }

    fn file_stem(&self) -> &'static str {
        match self {
            DiagnosticKind::ConfusionMatrix => "cm",
            DiagnosticKind::RocCurve => "roc",
            DiagnosticKind::PrecisionRecallCurve => "pr",
            DiagnosticKind::FeatureImportance => "feature_importance",
            DiagnosticKind::Residuals => "residual",
            DiagnosticKind::ActualVsPredicted => "pred",
            DiagnosticKind::ErrorDistribution => "err_dist",
            DiagnosticKind::QqPlot => "qq",
        }
    }

    /// Collision-free file name for this chart within a run.
    ///
    /// ```
    /// use trainyard_learning::DiagnosticKind;
    ///
    /// assert_eq!(DiagnosticKind::QqPlot.file_name("run-7"), "qq_run-7.svg");
    /// ```
    pub fn file_name(&self, run_id: &str) -> String {
        format!("{}_{}.svg", self.file_stem(), run_id)
    }
}

/// A rendered chart.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiagnosticImage {
    pub kind: DiagnosticKind,
    pub title: String,
    pub description: String,
    pub media_type: String,
    pub file_name: String,

    /// SVG document bytes. Not part of the JSON summary.
    #[serde(skip)]
    pub bytes: Vec<u8>,
}

impl DiagnosticImage {
    pub(crate) fn svg(kind: DiagnosticKind, run_id: &str, svg: String) -> Self {
        Self {
            kind,
            title: kind.title().to_string(),
            description: kind.description().to_string(),
            media_type: "image/svg+xml".to_string(),
            file_name: kind.file_name(run_id),
            bytes: svg.into_bytes(),
        }
    }
}

/// Intercept and per-term coefficients of a linear-family model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearCoefficients {
    pub intercept: f64,

    /// `(term, coefficient)` in model order. Polynomial terms are named like
    /// `"x1^2 x2"`.
    pub terms: Vec<(String, f64)>,

    /// `true` when the terms refer to standardized features.
    pub standardized: bool,
}

/// The persisted output of a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[non_exhaustive]
pub struct TrainedModelArtifact {
    /// A serialized [`TrainedModel`](crate::TrainedModel). Not part of the JSON summary.
    #[serde(skip)]
    pub serialized_bytes: Vec<u8>,

    /// Feature column order expected at inference time.
    pub feature_names: Vec<String>,
    pub algorithm: Algorithm,
    pub hyperparameters: Hyperparameters,
    pub target_column: String,
    pub model_name: String,
    pub task: TrainingTask,
    pub capabilities: Capabilities,
}

/// Everything a completed pipeline run returns.
#[derive(Debug, Clone, Serialize)]
#[non_exhaustive]
pub struct PipelineResult {
    /// Identifier keying the artifact file names.
    pub run_id: String,

    pub model_artifact: TrainedModelArtifact,

    /// Absent when metric computation failed.
    pub metrics: Option<MetricsReport>,

    /// Charts that rendered. Failed charts are listed in `warnings`.
    pub images: Vec<DiagnosticImage>,

    /// Every search candidate, in search order.
    pub candidates: Vec<CandidateSummary>,

    /// Linear-family models only.
    pub coefficients: Option<LinearCoefficients>,

    /// `(feature, importance)` sorted descending. Random forest only.
    pub feature_importances: Vec<(String, f64)>,

    /// Non-fatal degradations, in the order they happened.
    pub warnings: Vec<String>,

    /// Wall-clock duration of the run in milliseconds.
    pub duration_ms: u64,
}

/// Result of a single prediction.
///
/// For classification `value` is the class code, `label` the decoded label
/// when the target was label-encoded, and `probabilities` maps each class
/// (label or code) to its probability. For regression only `value` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub value: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probabilities: Option<Vec<(String, f64)>>,

    /// Probability of the predicted class, when probabilities are available.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}
