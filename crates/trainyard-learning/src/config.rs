//! Configuration types for the training pipeline.
//!
//! This module provides [`PipelineConfig`] and its builder, the [`Algorithm`]
//! selector, caller-supplied [`HyperparameterOverrides`] and the per-call
//! chart style in [`RenderConfig`].
//!
//! # Example
//!
//! ```
//! use trainyard_learning::{Algorithm, PipelineConfig};
//!
//! let config = PipelineConfig::builder()
//!     .algorithm(Algorithm::KNearestNeighbors)
//!     .target_column("Survived")
//!     .model_name("titanic-knn")
//!     .seed(42)
//!     .build()
//!     .expect("valid config");
//! ```

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use trainyard_processing::{ProcessingConfig, TaskKind};

use crate::error::LearningError;
use crate::types::{Capabilities, Capability};

/// Default number of folds for the ridge alpha search.
pub const DEFAULT_CV_FOLDS: u32 = 5;

/// Default cap on the width of a polynomial feature expansion.
pub const DEFAULT_MAX_POLYNOMIAL_FEATURES: usize = 1_000;

/// The supported algorithm families.
///
/// Each family fixes its task kind and its capabilities:
///
/// | Algorithm | Task | Capabilities |
/// |-----------|------|--------------|
/// | [`DecisionTree`](Self::DecisionTree) | classification | probability |
/// | [`KNearestNeighbors`](Self::KNearestNeighbors) | classification | probability |
/// | [`RandomForest`](Self::RandomForest) | classification | probability, feature importance |
/// | [`LinearRegression`](Self::LinearRegression) | regression | linear coefficients |
/// | [`PolynomialRegression`](Self::PolynomialRegression) | regression | linear coefficients |
/// | [`RidgeRegression`](Self::RidgeRegression) | regression | linear coefficients |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Algorithm {
    DecisionTree,
    KNearestNeighbors,
    RandomForest,
    LinearRegression,
    PolynomialRegression,
    RidgeRegression,
}

impl Algorithm {
    /// Every algorithm, in declaration order.
    pub const ALL: [Algorithm; 6] = [
        Algorithm::DecisionTree,
        Algorithm::KNearestNeighbors,
        Algorithm::RandomForest,
        Algorithm::LinearRegression,
        Algorithm::PolynomialRegression,
        Algorithm::RidgeRegression,
    ];

    /// Returns the canonical identifier.
    ///
    /// # Examples
    ///
    /// ```
    /// use trainyard_learning::Algorithm;
    ///
    /// assert_eq!(Algorithm::KNearestNeighbors.as_str(), "knn");
    /// assert_eq!(Algorithm::RidgeRegression.as_str(), "ridge_regression");
    /// ```
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Algorithm::DecisionTree => "decision_tree",
            Algorithm::KNearestNeighbors => "knn",
            Algorithm::RandomForest => "random_forest",
            Algorithm::LinearRegression => "linear_regression",
            Algorithm::PolynomialRegression => "polynomial_regression",
            Algorithm::RidgeRegression => "ridge_regression",
        }
    }

    /// Human-readable name, as shown in reports.
    #[must_use]
    pub fn display_name(&self) -> &'static str {
        match self {
            Algorithm::DecisionTree => "Decision Tree",
            Algorithm::KNearestNeighbors => "K-Nearest Neighbors",
            Algorithm::RandomForest => "Random Forest",
            Algorithm::LinearRegression => "Linear Regression",
            Algorithm::PolynomialRegression => "Polynomial Regression",
            Algorithm::RidgeRegression => "Ridge Regression",
        }
    }

    /// The task this family is trained for.
    #[must_use]
    pub fn task_kind(&self) -> TaskKind {
        match self {
            Algorithm::DecisionTree | Algorithm::KNearestNeighbors | Algorithm::RandomForest => {
                TaskKind::Classification
            }
            Algorithm::LinearRegression
            | Algorithm::PolynomialRegression
            | Algorithm::RidgeRegression => TaskKind::Regression,
        }
    }

    /// Capabilities of the fitted estimator, resolved without inspecting it.
    #[must_use]
    pub fn capabilities(&self) -> Capabilities {
        match self {
            Algorithm::DecisionTree | Algorithm::KNearestNeighbors => {
                Capabilities::new(&[Capability::SupportsProbability])
            }
            Algorithm::RandomForest => Capabilities::new(&[
                Capability::SupportsProbability,
                Capability::SupportsFeatureImportance,
            ]),
            Algorithm::LinearRegression
            | Algorithm::PolynomialRegression
            | Algorithm::RidgeRegression => {
                Capabilities::new(&[Capability::SupportsLinearCoefficients])
            }
        }
    }

    fn valid_names() -> String {
        Self::ALL
            .iter()
            .map(Algorithm::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl std::fmt::Display for Algorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Algorithm {
    type Err = LearningError;

    /// Accepts the canonical identifier and common spellings such as
    /// `"DecisionTree"`, `"KNN"` or `"ridge"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| !matches!(c, '_' | '-' | ' '))
            .flat_map(char::to_lowercase)
            .collect();

        match normalized.as_str() {
            "decisiontree" | "tree" | "dt" => Ok(Algorithm::DecisionTree),
            "knn" | "kneighbors" | "knearestneighbors" => Ok(Algorithm::KNearestNeighbors),
            "randomforest" | "forest" | "rf" => Ok(Algorithm::RandomForest),
            "linearregression" | "linear" | "ols" => Ok(Algorithm::LinearRegression),
            "polynomialregression" | "polynomial" | "poly" => Ok(Algorithm::PolynomialRegression),
            "ridgeregression" | "ridge" => Ok(Algorithm::RidgeRegression),
            _ => Err(LearningError::UnknownAlgorithm {
                name: s.to_string(),
                valid: Self::valid_names(),
            }),
        }
    }
}

/// Caller-supplied hyperparameter overrides.
///
/// Values stay as raw text so that format problems surface as
/// `INVALID_ALPHA_FORMAT` inside the pipeline rather than at the transport.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HyperparameterOverrides {
    /// Ridge regularization strength; skips the alpha search when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alpha: Option<String>,
}

impl HyperparameterOverrides {
    pub fn with_alpha(alpha: impl Into<String>) -> Self {
        Self {
            alpha: Some(alpha.into()),
        }
    }

    /// Parse and check the alpha override.
    ///
    /// # Errors
    ///
    /// - [`LearningError::InvalidAlphaFormat`] if the text is not a finite number
    /// - [`LearningError::InvalidAlphaValue`] if the number is not positive
    pub fn parsed_alpha(&self) -> Result<Option<f64>, LearningError> {
        let Some(raw) = self.alpha.as_deref() else {
            return Ok(None);
        };
        let value = raw
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| LearningError::InvalidAlphaFormat {
                raw: raw.to_string(),
            })?;
        if value <= 0.0 {
            return Err(LearningError::InvalidAlphaValue { value });
        }
        Ok(Some(value))
    }
}

/// An RGB colour used by [`RenderConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgb(pub u8, pub u8, pub u8);

/// Explicit chart style, passed to every render call.
///
/// There is no process-wide theme: two runs with different configs can
/// render concurrently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderConfig {
    /// Chart width in pixels (default: 800).
    pub width: u32,
    /// Chart height in pixels (default: 600).
    pub height: u32,
    /// Font family written into the SVG (default: "sans-serif").
    pub font_family: String,
    /// Caption font size (default: 24).
    pub caption_size: u32,
    /// Axis label font size (default: 14).
    pub label_size: u32,
    /// Main series colour.
    pub primary: Rgb,
    /// Reference lines and secondary series.
    pub accent: Rgb,
    /// Per-class colours for one-vs-rest curves, cycled when exhausted.
    pub series: Vec<Rgb>,
    /// Number of histogram bins for the error distribution (default: 30).
    pub histogram_bins: usize,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
            font_family: "sans-serif".to_string(),
            caption_size: 24,
            label_size: 14,
            primary: Rgb(31, 119, 180),
            accent: Rgb(214, 39, 40),
            series: vec![
                Rgb(31, 119, 180),
                Rgb(255, 127, 14),
                Rgb(44, 160, 44),
                Rgb(148, 103, 189),
                Rgb(140, 86, 75),
                Rgb(227, 119, 194),
                Rgb(127, 127, 127),
                Rgb(188, 189, 34),
                Rgb(23, 190, 207),
            ],
            histogram_bins: 30,
        }
    }
}

/// Configuration for one pipeline run.
///
/// Use [`PipelineConfig::builder()`] to construct a configuration. The
/// builder requires `target_column` and `algorithm`; everything else has a
/// default.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// The algorithm family to train.
    pub algorithm: Algorithm,

    /// Name of the target column in the uploaded table.
    pub target_column: String,

    /// Name recorded on the trained model (default: "model").
    pub model_name: String,

    /// Identifier used to key artifact file names.
    ///
    /// If `None`, one is derived from the model name and the start time.
    pub run_id: Option<String>,

    /// Raw hyperparameter overrides.
    pub overrides: HyperparameterOverrides,

    /// Validation and split settings; `processing.seed` also seeds training.
    pub processing: ProcessingConfig,

    /// Folds for the ridge alpha search (default: 5). Must be at least 2.
    pub cv_folds: u32,

    /// Largest polynomial expansion attempted (default: 1000 columns).
    pub max_polynomial_features: usize,

    /// Chart style.
    pub render: RenderConfig,
}

impl PipelineConfig {
    /// Create a new builder for `PipelineConfig`.
    #[must_use]
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::default()
    }

    /// Seed shared by the split and every seeded estimator.
    pub fn seed(&self) -> u64 {
        self.processing.seed
    }
}

/// Builder for [`PipelineConfig`].
///
/// Created via [`PipelineConfig::builder()`]. All setters return `self` to
/// allow method chaining.
#[derive(Debug, Clone)]
pub struct PipelineConfigBuilder {
    algorithm: Option<Algorithm>,
    target_column: Option<String>,
    model_name: String,
    run_id: Option<String>,
    overrides: HyperparameterOverrides,
    processing: ProcessingConfig,
    cv_folds: u32,
    max_polynomial_features: usize,
    render: RenderConfig,
}

impl Default for PipelineConfigBuilder {
    fn default() -> Self {
        Self {
            algorithm: None,
            target_column: None,
            model_name: "model".to_string(),
            run_id: None,
            overrides: HyperparameterOverrides::default(),
            processing: ProcessingConfig::default(),
            cv_folds: DEFAULT_CV_FOLDS,
            max_polynomial_features: DEFAULT_MAX_POLYNOMIAL_FEATURES,
            render: RenderConfig::default(),
        }
    }
}

impl PipelineConfigBuilder {
    /// Set the algorithm family (required).
    #[must_use]
    pub fn algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = Some(algorithm);
        self
    }

    /// Set the target column name (required).
    #[must_use]
    pub fn target_column(mut self, column: impl Into<String>) -> Self {
        self.target_column = Some(column.into());
        self
    }

    #[must_use]
    pub fn model_name(mut self, name: impl Into<String>) -> Self {
        self.model_name = name.into();
        self
    }

    /// Set the identifier used in artifact file names.
    #[must_use]
    pub fn run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = Some(run_id.into());
        self
    }

    #[must_use]
    pub fn overrides(mut self, overrides: HyperparameterOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    /// Set the ridge alpha override as raw text.
    #[must_use]
    pub fn alpha(mut self, alpha: impl Into<String>) -> Self {
        self.overrides.alpha = Some(alpha.into());
        self
    }

    /// Replace the validation and split settings.
    #[must_use]
    pub fn processing(mut self, processing: ProcessingConfig) -> Self {
        self.processing = processing;
        self
    }

    /// Set the seed for the split and the seeded estimators (default: 42).
    #[must_use]
    pub fn seed(mut self, seed: u64) -> Self {
        self.processing.seed = seed;
        self
    }

    /// Set the number of ridge cross-validation folds (default: 5).
    ///
    /// [`build()`](Self::build) returns an error if `folds < 2`.
    #[must_use]
    pub fn cv_folds(mut self, folds: u32) -> Self {
        self.cv_folds = folds;
        self
    }

    /// Set the cap on polynomial expansion width.
    #[must_use]
    pub fn max_polynomial_features(mut self, max: usize) -> Self {
        self.max_polynomial_features = max;
        self
    }

    #[must_use]
    pub fn render(mut self, render: RenderConfig) -> Self {
        self.render = render;
        self
    }

    /// Build the configuration, validating all settings.
    ///
    /// # Errors
    ///
    /// Returns [`LearningError::InvalidConfig`] if:
    /// - `algorithm` or `target_column` is missing
    /// - `target_column` or `model_name` is blank
    /// - `cv_folds` is less than 2
    /// - `max_polynomial_features` is 0
    /// - the processing settings are invalid
    /// - the render size is zero
    pub fn build(self) -> Result<PipelineConfig, LearningError> {
        let algorithm = self
            .algorithm
            .ok_or_else(|| LearningError::InvalidConfig("algorithm is required".to_string()))?;

        let target_column = self
            .target_column
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| LearningError::InvalidConfig("target_column is required".to_string()))?;

        if self.model_name.trim().is_empty() {
            return Err(LearningError::InvalidConfig(
                "model_name must not be blank".to_string(),
            ));
        }

        if self.cv_folds < 2 {
            return Err(LearningError::InvalidConfig(
                "cv_folds must be at least 2".to_string(),
            ));
        }

        if self.max_polynomial_features == 0 {
            return Err(LearningError::InvalidConfig(
                "max_polynomial_features must be at least 1".to_string(),
            ));
        }

        self.processing
            .validate()
            .map_err(|e| LearningError::InvalidConfig(e.to_string()))?;

        if self.render.width == 0 || self.render.height == 0 {
            return Err(LearningError::InvalidConfig(
                "render width and height must be positive".to_string(),
            ));
        }

        if let Some(run_id) = &self.run_id {
            if !is_valid_run_id(run_id) {
                return Err(LearningError::InvalidConfig(format!(
                    "run_id '{run_id}' must be non-empty ASCII letters, digits, '-', '_' or '.', and not start with '.'"
                )));
            }
        }

        Ok(PipelineConfig {
            algorithm,
            target_column,
            model_name: self.model_name,
            run_id: self.run_id,
            overrides: self.overrides,
            processing: self.processing,
            cv_folds: self.cv_folds,
            max_polynomial_features: self.max_polynomial_features,
            render: self.render,
        })
    }
}

/// Run ids end up in file names, so keep them to a safe alphabet.
pub(crate) fn is_valid_run_id(run_id: &str) -> bool {
    !run_id.is_empty()
        && !run_id.starts_with('.')
        && run_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

/// A fresh run id: the model name reduced to the safe alphabet, a UTC
/// timestamp with millisecond precision and a random suffix.
///
/// Runs started in the same millisecond still get distinct ids, and so
/// distinct output file names.
pub fn generate_run_id(model_name: &str) -> String {
    let prefix: String = model_name
        .trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect();
    let stamp = chrono::Utc::now().format("%Y%m%d%H%M%S%3f");
    let suffix: u32 = rand::random();
    if prefix.is_empty() {
        format!("run_{stamp}_{suffix:08x}")
    } else {
        format!("{prefix}_{stamp}_{suffix:08x}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> PipelineConfigBuilder {
        PipelineConfig::builder()
            .algorithm(Algorithm::DecisionTree)
            .target_column("label")
    }

    #[test]
    fn test_defaults() {
        let config = base().build().unwrap();
        assert_eq!(config.model_name, "model");
        assert_eq!(config.cv_folds, 5);
        assert_eq!(config.seed(), 42);
        assert_eq!(config.render.width, 800);
        assert!(config.run_id.is_none());
    }

    #[test]
    fn test_required_fields() {
        let err = PipelineConfig::builder().target_column("y").build().unwrap_err();
        assert!(err.to_string().contains("algorithm"));

        let err = PipelineConfig::builder()
            .algorithm(Algorithm::KNearestNeighbors)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("target_column"));

        let err = PipelineConfig::builder()
            .algorithm(Algorithm::KNearestNeighbors)
            .target_column("  ")
            .build()
            .unwrap_err();
        assert_eq!(err.error_code(), "INVALID_CONFIG");
    }

    #[test]
    fn test_invalid_ranges() {
        assert!(base().cv_folds(1).build().is_err());
        assert!(base().max_polynomial_features(0).build().is_err());
        assert!(base().run_id("../escape").build().is_err());
        assert!(base().run_id("run-01_a.b").build().is_ok());

        let processing = ProcessingConfig {
            test_size: 1.5,
            ..ProcessingConfig::default()
        };
        assert!(base().processing(processing).build().is_err());
    }

    #[test]
    fn test_algorithm_from_str() {
        assert_eq!("knn".parse::<Algorithm>().unwrap(), Algorithm::KNearestNeighbors);
        assert_eq!("KNN".parse::<Algorithm>().unwrap(), Algorithm::KNearestNeighbors);
        assert_eq!(
            "DecisionTree".parse::<Algorithm>().unwrap(),
            Algorithm::DecisionTree
        );
        assert_eq!(
            "linear-regression".parse::<Algorithm>().unwrap(),
            Algorithm::LinearRegression
        );
        let err = "svm".parse::<Algorithm>().unwrap_err();
        assert_eq!(err.error_code(), "UNKNOWN_ALGORITHM");
        assert!(err.to_string().contains("ridge_regression"));
    }

    #[test]
    fn test_algorithm_round_trip_names() {
        for algorithm in Algorithm::ALL {
            assert_eq!(algorithm.as_str().parse::<Algorithm>().unwrap(), algorithm);
        }
    }

    #[test]
    fn test_capabilities() {
        let rf = Algorithm::RandomForest.capabilities();
        assert!(rf.supports(Capability::SupportsProbability));
        assert!(rf.supports(Capability::SupportsFeatureImportance));
        assert!(!rf.supports(Capability::SupportsLinearCoefficients));

        let ridge = Algorithm::RidgeRegression.capabilities();
        assert!(ridge.supports(Capability::SupportsLinearCoefficients));
        assert!(!ridge.supports(Capability::SupportsProbability));
    }

    #[test]
    fn test_alpha_parsing() {
        assert_eq!(HyperparameterOverrides::default().parsed_alpha().unwrap(), None);
        assert_eq!(
            HyperparameterOverrides::with_alpha("0.5").parsed_alpha().unwrap(),
            Some(0.5)
        );

        let err = HyperparameterOverrides::with_alpha("-5")
            .parsed_alpha()
            .unwrap_err();
        assert_eq!(err.error_code(), "INVALID_ALPHA_VALUE");

        let err = HyperparameterOverrides::with_alpha("0").parsed_alpha().unwrap_err();
        assert_eq!(err.error_code(), "INVALID_ALPHA_VALUE");

        for raw in ["abc", "", "inf", "NaN"] {
            let err = HyperparameterOverrides::with_alpha(raw)
                .parsed_alpha()
                .unwrap_err();
            assert_eq!(err.error_code(), "INVALID_ALPHA_FORMAT");
        }
    }

    #[test]
    fn test_generated_run_ids_are_valid() {
        let id = generate_run_id("My Model/v2");
        assert!(id.starts_with("My_Model_v2_"));
        assert!(is_valid_run_id(&id));
        assert!(generate_run_id("  ").starts_with("run_"));
    }

    #[test]
    fn test_back_to_back_run_ids_differ() {
        let ids: std::collections::HashSet<String> =
            (0..64).map(|_| generate_run_id("model")).collect();
        assert_eq!(ids.len(), 64);
        assert!(ids.iter().all(|id| is_valid_run_id(id)));
    }
}
