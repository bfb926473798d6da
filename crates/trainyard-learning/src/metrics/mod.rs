//! The Evaluator: task-appropriate metrics on the test partition.
//!
//! Metric failures never abort a run. [`evaluate`] logs them and returns
//! `None`; [`compute_metrics`] returns the error for callers that want to
//! record it.

pub mod classification;
pub mod curves;
pub mod regression;

use ndarray::{Array1, Array2};
use tracing::{debug, warn};
use trainyard_processing::{PreparedData, TargetEncoding};

use crate::error::{LearningError, Result};
use crate::estimators::FittedModel;
use crate::types::{
    Averaging, CandidateModel, ClassificationMetrics, MetricsReport, RegressionMetrics,
};

/// Predictions of one model on the test partition.
#[derive(Debug, Clone)]
pub struct TestPredictions {
    pub y_true: Array1<f64>,
    pub y_pred: Array1<f64>,
    /// Class probabilities, columns aligned with `classes`.
    pub proba: Option<Array2<f64>>,
    /// Classes the model was fitted on.
    pub classes: Vec<f64>,
}

impl TestPredictions {
    pub fn compute(model: &FittedModel, data: &PreparedData) -> Result<Self> {
        let x_test = data.x_test();
        if x_test.nrows() == 0 {
            return Err(LearningError::Metrics("the test partition is empty".to_string()));
        }
        Ok(Self {
            y_true: data.y_test(),
            y_pred: model.predict(&x_test)?,
            proba: model.predict_proba(&x_test)?,
            classes: model.classes().map(<[f64]>::to_vec).unwrap_or_default(),
        })
    }

    /// Scores for `class` and the truth vector of "is `class`".
    pub fn binary_view(&self, class: f64) -> Option<(Vec<bool>, Vec<f64>)> {
        let proba = self.proba.as_ref()?;
        let column = self.classes.iter().position(|c| *c == class)?;
        let truth = self.y_true.iter().map(|y| *y == class).collect();
        Some((truth, proba.column(column).to_vec()))
    }
}

/// Display name of a class code: the decoded label, or the code itself.
pub fn class_name(encoding: &TargetEncoding, class: f64) -> String {
    encoding
        .decode(class)
        .map(str::to_string)
        .unwrap_or_else(|| format!("{class}"))
}

/// Held-out score used for model selection: accuracy or R².
pub(crate) fn selection_score(model: &FittedModel, data: &PreparedData) -> Result<f64> {
    let x_test = data.x_test();
    if x_test.nrows() == 0 {
        return Err(LearningError::Metrics("the test partition is empty".to_string()));
    }
    let y_pred = model.predict(&x_test)?;
    let y_true = data.y_test();
    if data.task.is_classification() {
        classification::accuracy(&y_true, &y_pred)
    } else {
        regression::r2_score(&y_true, &y_pred)
    }
}

/// Compute the metrics report for a fitted model.
pub fn compute_metrics(model: &FittedModel, data: &PreparedData) -> Result<MetricsReport> {
    let predictions = TestPredictions::compute(model, data)?;
    let (y_true, y_pred) = (&predictions.y_true, &predictions.y_pred);

    if !data.task.is_classification() {
        let mse = regression::mean_squared_error(y_true, y_pred)?;
        let report = RegressionMetrics {
            r2: regression::r2_score(y_true, y_pred)?,
            mse,
            rmse: mse.sqrt(),
            mae: regression::mean_absolute_error(y_true, y_pred)?,
        };
        if [report.r2, report.mse, report.mae].iter().any(|v| !v.is_finite()) {
            return Err(LearningError::Metrics(
                "regression metrics are not finite".to_string(),
            ));
        }
        return Ok(MetricsReport::Regression(report));
    }

    let accuracy = classification::accuracy(y_true, y_pred)?;
    let classes = classification::observed_classes(y_true, y_pred);
    let confusion_matrix = classification::confusion_matrix(y_true, y_pred, &classes)?;

    let (averaging, scores, roc_auc) = if data.task.is_binary() {
        let positive = data
            .classes()
            .last()
            .copied()
            .ok_or_else(|| LearningError::Metrics("no classes in the target".to_string()))?;
        let scores = classification::binary_scores(y_true, y_pred, positive)?;
        let roc_auc = predictions
            .binary_view(positive)
            .and_then(|(truth, scores)| match curves::roc_curve(&truth, &scores) {
                Ok(curve) => Some(curve.auc),
                Err(e) => {
                    debug!("ROC AUC unavailable: {}", e);
                    None
                }
            });
        (Averaging::Binary, scores, roc_auc)
    } else {
        (
            Averaging::Macro,
            classification::macro_scores(&confusion_matrix),
            None,
        )
    };

    Ok(MetricsReport::Classification(ClassificationMetrics {
        accuracy,
        precision: scores.precision,
        recall: scores.recall,
        f1: scores.f1,
        averaging,
        classes,
        confusion_matrix,
        roc_auc,
    }))
}

/// Metrics of the selected candidate, or `None` (logged) if they cannot be
/// computed.
pub fn evaluate(candidate: &CandidateModel, data: &PreparedData) -> Option<MetricsReport> {
    match compute_metrics(&candidate.model, data) {
        Ok(report) => Some(report),
        Err(e) => {
            warn!("Metric computation failed: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimators::{KNearestNeighbors, LinearRegression};
    use ndarray::array;
    use trainyard_processing::{ClassificationKind, TrainingTask};

    fn binary_data() -> PreparedData {
        let x = array![[0.0], [0.1], [0.2], [1.0], [1.1], [1.2], [0.15], [1.05]];
        let y = array![0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 0.0, 1.0];
        PreparedData::from_parts(
            vec!["x".into()],
            x,
            y,
            vec![0, 1, 2, 3, 4, 5],
            vec![6, 7],
            TrainingTask::Classification(ClassificationKind::Binary),
        )
        .unwrap()
    }

    #[test]
    fn test_binary_metrics_with_auc() {
        let data = binary_data();
        let model = FittedModel::KNearestNeighbors(
            KNearestNeighbors::fit(&data.x_train(), &data.y_train(), 3).unwrap(),
        );
        let MetricsReport::Classification(m) = compute_metrics(&model, &data).unwrap() else {
            panic!("expected classification metrics");
        };
        assert_eq!(m.accuracy, 1.0);
        assert_eq!(m.averaging, Averaging::Binary);
        assert_eq!(m.confusion_matrix, vec![vec![1, 0], vec![0, 1]]);
        assert_eq!(m.roc_auc, Some(1.0));
    }

    #[test]
    fn test_regression_metrics_report() {
        let x = array![[0.0], [1.0], [2.0], [3.0], [4.0]];
        let y = array![1.0, 3.0, 5.0, 7.0, 9.0];
        let data = PreparedData::from_parts(
            vec!["x".into()],
            x,
            y,
            vec![0, 1, 2],
            vec![3, 4],
            TrainingTask::Regression,
        )
        .unwrap();
        let model = FittedModel::LinearRegression(
            LinearRegression::fit(&data.x_train(), &data.y_train()).unwrap(),
        );
        let MetricsReport::Regression(m) = compute_metrics(&model, &data).unwrap() else {
            panic!("expected regression metrics");
        };
        assert!((m.r2 - 1.0).abs() < 1e-9);
        assert!(m.rmse < 1e-6);
    }

    #[test]
    fn test_empty_test_partition_degrades() {
        let x = array![[0.0], [1.0]];
        let y = array![0.0, 1.0];
        let data = PreparedData::from_parts(
            vec!["x".into()],
            x,
            y,
            vec![0, 1],
            vec![],
            TrainingTask::Classification(ClassificationKind::Binary),
        )
        .unwrap();
        let model = FittedModel::KNearestNeighbors(
            KNearestNeighbors::fit(&data.x_train(), &data.y_train(), 1).unwrap(),
        );
        assert_eq!(
            compute_metrics(&model, &data).unwrap_err().error_code(),
            "METRICS_ERROR"
        );
    }
}
