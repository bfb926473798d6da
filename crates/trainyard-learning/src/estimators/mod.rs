//! Native estimators for every supported algorithm family.
//!
//! [`FittedModel`] is the closed set of fitted estimators. Dispatch is a
//! `match`, and what each family can report (probabilities, coefficients,
//! importances) is fixed by its [`Algorithm`].

mod forest;
mod knn;
mod linear;
mod polynomial;
mod scaler;
mod tree;

pub use forest::{ForestParams, RandomForestClassifier};
pub use knn::KNearestNeighbors;
pub use linear::{LinearRegression, RidgeRegression};
pub use polynomial::{PolynomialRegression, expanded_width};
pub use scaler::StandardScaler;
pub use tree::{DecisionTreeClassifier, MaxFeatures, TreeParams};

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::config::Algorithm;
use crate::error::{LearningError, Result};
use crate::types::LinearCoefficients;

/// A fitted estimator of one of the supported families.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "estimator", rename_all = "snake_case")]
pub enum FittedModel {
    DecisionTree(DecisionTreeClassifier),
    KNearestNeighbors(KNearestNeighbors),
    RandomForest(RandomForestClassifier),
    LinearRegression(LinearRegression),
    PolynomialRegression(PolynomialRegression),
    RidgeRegression(RidgeRegression),
}

impl FittedModel {
    pub fn algorithm(&self) -> Algorithm {
        match self {
            FittedModel::DecisionTree(_) => Algorithm::DecisionTree,
            FittedModel::KNearestNeighbors(_) => Algorithm::KNearestNeighbors,
            FittedModel::RandomForest(_) => Algorithm::RandomForest,
            FittedModel::LinearRegression(_) => Algorithm::LinearRegression,
            FittedModel::PolynomialRegression(_) => Algorithm::PolynomialRegression,
            FittedModel::RidgeRegression(_) => Algorithm::RidgeRegression,
        }
    }

    /// Number of input columns the model was fitted on.
    pub fn n_features(&self) -> usize {
        match self {
            FittedModel::DecisionTree(m) => m.n_features(),
            FittedModel::KNearestNeighbors(m) => m.n_features(),
            FittedModel::RandomForest(m) => m.n_features(),
            FittedModel::LinearRegression(m) => m.n_features(),
            FittedModel::PolynomialRegression(m) => m.n_features(),
            FittedModel::RidgeRegression(m) => m.n_features(),
        }
    }

    fn check_width(&self, x: &Array2<f64>) -> Result<()> {
        if x.ncols() != self.n_features() {
            return Err(LearningError::InvalidFeatures(format!(
                "expected {} feature columns, got {}",
                self.n_features(),
                x.ncols()
            )));
        }
        Ok(())
    }

    /// Class codes for classifiers, continuous values for regressors.
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.check_width(x)?;
        Ok(match self {
            FittedModel::DecisionTree(m) => m.predict(x),
            FittedModel::KNearestNeighbors(m) => m.predict(x),
            FittedModel::RandomForest(m) => m.predict(x),
            FittedModel::LinearRegression(m) => m.predict(x),
            FittedModel::PolynomialRegression(m) => m.predict(x),
            FittedModel::RidgeRegression(m) => m.predict(x),
        })
    }

    /// Class probabilities, columns aligned with [`classes`](Self::classes).
    ///
    /// `Ok(None)` for regressors.
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Option<Array2<f64>>> {
        self.check_width(x)?;
        Ok(match self {
            FittedModel::DecisionTree(m) => Some(m.predict_proba(x)),
            FittedModel::KNearestNeighbors(m) => Some(m.predict_proba(x)),
            FittedModel::RandomForest(m) => Some(m.predict_proba(x)),
            _ => None,
        })
    }

    /// Classes seen in training, ascending. `None` for regressors.
    pub fn classes(&self) -> Option<&[f64]> {
        match self {
            FittedModel::DecisionTree(m) => Some(m.classes()),
            FittedModel::KNearestNeighbors(m) => Some(m.classes()),
            FittedModel::RandomForest(m) => Some(m.classes()),
            _ => None,
        }
    }

    /// Impurity-based importances, random forest only.
    pub fn feature_importances(&self) -> Option<&[f64]> {
        match self {
            FittedModel::RandomForest(m) => Some(m.feature_importances()),
            _ => None,
        }
    }

    /// Intercept and named coefficients, linear family only.
    pub fn coefficients(&self, feature_names: &[String]) -> Option<LinearCoefficients> {
        match self {
            FittedModel::LinearRegression(m) => Some(LinearCoefficients {
                intercept: m.intercept(),
                terms: feature_names
                    .iter()
                    .cloned()
                    .zip(m.coefficients().iter().copied())
                    .collect(),
                standardized: false,
            }),
            FittedModel::RidgeRegression(m) => {
                let (intercept, coefficients) = m.raw_coefficients();
                Some(LinearCoefficients {
                    intercept,
                    terms: feature_names.iter().cloned().zip(coefficients).collect(),
                    standardized: false,
                })
            }
            FittedModel::PolynomialRegression(m) => Some(LinearCoefficients {
                intercept: m.intercept(),
                terms: m
                    .term_names(feature_names)
                    .into_iter()
                    .zip(m.coefficients().iter().copied())
                    .collect(),
                standardized: true,
            }),
            _ => None,
        }
    }
}
