//! Data types shared by the validator, the preparer and their callers.
//!
//! - [`TaskKind`] / [`TrainingTask`]: what kind of model the target calls for
//! - [`CleanDataset`]: an admissible table with incomplete rows removed
//! - [`ValidationReport`]: `Admissible` or `Rejected`, never both
//! - [`PreparedData`]: the numeric matrix, target vector and fixed partition

use ndarray::{Array1, Array2, Axis};
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::ProcessingError;
use crate::preparer::FeatureEncoder;

/// The task requested by the caller, before the target is inspected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    Classification,
    Regression,
}

impl TaskKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::Classification => "classification",
            TaskKind::Regression => "regression",
        }
    }
}

impl FromStr for TaskKind {
    type Err = ProcessingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "classification" => Ok(TaskKind::Classification),
            "regression" => Ok(TaskKind::Regression),
            other => Err(ProcessingError::InvalidConfig(format!(
                "unknown task kind '{other}'. Valid values are: classification, regression"
            ))),
        }
    }
}

/// Binary versus multiclass classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassificationKind {
    Binary,
    Multiclass,
}

/// The resolved task, derived from the target column once it is clean.
///
/// Drives which metrics and which diagnostic charts are produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrainingTask {
    Classification(ClassificationKind),
    Regression,
}

impl TrainingTask {
    /// Resolve a classification task from its distinct label count.
    #[must_use]
    pub fn classification(distinct_labels: usize) -> Self {
        if distinct_labels == 2 {
            TrainingTask::Classification(ClassificationKind::Binary)
        } else {
            TrainingTask::Classification(ClassificationKind::Multiclass)
        }
    }

    #[must_use]
    pub fn kind(&self) -> TaskKind {
        match self {
            TrainingTask::Classification(_) => TaskKind::Classification,
            TrainingTask::Regression => TaskKind::Regression,
        }
    }

    #[must_use]
    pub fn is_classification(&self) -> bool {
        matches!(self, TrainingTask::Classification(_))
    }

    #[must_use]
    pub fn is_binary(&self) -> bool {
        matches!(
            self,
            TrainingTask::Classification(ClassificationKind::Binary)
        )
    }

    /// Human-readable name, e.g. `"binary classification"`.
    #[must_use]
    pub fn describe(&self) -> &'static str {
        match self {
            TrainingTask::Classification(ClassificationKind::Binary) => "binary classification",
            TrainingTask::Classification(ClassificationKind::Multiclass) => {
                "multiclass classification"
            }
            TrainingTask::Regression => "regression",
        }
    }
}

/// An admissible table: parsed, within the null cap, incomplete rows dropped.
#[derive(Debug, Clone)]
pub struct CleanDataset {
    pub(crate) frame: DataFrame,
    pub(crate) target_column: String,
    pub(crate) task: TrainingTask,
    pub(crate) rows_before_cleaning: usize,
    pub(crate) null_cells: usize,
}

impl CleanDataset {
    /// The cleaned table, target column included.
    #[must_use]
    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    #[must_use]
    pub fn target_column(&self) -> &str {
        &self.target_column
    }

    #[must_use]
    pub fn task(&self) -> TrainingTask {
        self.task
    }

    #[must_use]
    pub fn rows(&self) -> usize {
        self.frame.height()
    }

    #[must_use]
    pub fn rows_before_cleaning(&self) -> usize {
        self.rows_before_cleaning
    }

    /// Rows removed because they contained at least one missing cell.
    #[must_use]
    pub fn rows_dropped(&self) -> usize {
        self.rows_before_cleaning - self.frame.height()
    }

    /// Missing cells observed before cleaning.
    #[must_use]
    pub fn null_cells(&self) -> usize {
        self.null_cells
    }

    #[must_use]
    pub fn column_names(&self) -> Vec<String> {
        self.frame
            .get_column_names()
            .into_iter()
            .map(|s| s.to_string())
            .collect()
    }
}

/// Outcome of validation. Exactly one variant holds.
#[derive(Debug)]
pub enum ValidationReport {
    Admissible(CleanDataset),
    Rejected(ProcessingError),
}

impl ValidationReport {
    #[must_use]
    pub fn is_admissible(&self) -> bool {
        matches!(self, ValidationReport::Admissible(_))
    }

    /// The rejection, if any.
    #[must_use]
    pub fn rejection(&self) -> Option<&ProcessingError> {
        match self {
            ValidationReport::Admissible(_) => None,
            ValidationReport::Rejected(e) => Some(e),
        }
    }

    /// Convert into a `Result` so `?` can be used on the rejection.
    pub fn into_result(self) -> Result<CleanDataset, ProcessingError> {
        match self {
            ValidationReport::Admissible(dataset) => Ok(dataset),
            ValidationReport::Rejected(e) => Err(e),
        }
    }
}

/// How target values map to the numeric codes used for training.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "labels")]
pub enum TargetEncoding {
    /// Target values were already numbers and are used as-is.
    Identity,
    /// Label `labels[i]` was assigned code `i`, in first-seen order.
    Labels(Vec<String>),
}

impl TargetEncoding {
    /// The original label for a code, if a label mapping exists.
    #[must_use]
    pub fn decode(&self, code: f64) -> Option<&str> {
        match self {
            TargetEncoding::Identity => None,
            TargetEncoding::Labels(labels) => {
                if code < 0.0 || code.fract() != 0.0 {
                    return None;
                }
                labels.get(code as usize).map(String::as_str)
            }
        }
    }
}

/// Numeric training data with a fixed train/test partition.
///
/// Invariants: `x.nrows() == y.len()`; `train_indices` and `test_indices` are
/// sorted, disjoint and together cover `0..y.len()`.
#[derive(Debug, Clone)]
pub struct PreparedData {
    pub feature_names: Vec<String>,
    pub x: Array2<f64>,
    pub y: Array1<f64>,
    pub train_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
    pub task: TrainingTask,
    pub target_column: String,
    pub target_encoding: TargetEncoding,
    pub encoder: FeatureEncoder,
    /// Whether the partition preserved label proportions.
    pub stratified: bool,
}

impl PreparedData {
    /// Assemble prepared data from an already-numeric matrix.
    ///
    /// Checks the shape and partition invariants; the encoder treats every
    /// column as a numeric passthrough.
    pub fn from_parts(
        feature_names: Vec<String>,
        x: Array2<f64>,
        y: Array1<f64>,
        train_indices: Vec<usize>,
        test_indices: Vec<usize>,
        task: TrainingTask,
    ) -> Result<Self, ProcessingError> {
        if x.nrows() != y.len() {
            return Err(ProcessingError::FeaturePreparation(format!(
                "feature matrix has {} rows but target has {}",
                x.nrows(),
                y.len()
            )));
        }
        if x.ncols() != feature_names.len() {
            return Err(ProcessingError::FeaturePreparation(format!(
                "feature matrix has {} columns but {} names were given",
                x.ncols(),
                feature_names.len()
            )));
        }
        let mut seen = vec![false; y.len()];
        for &i in train_indices.iter().chain(test_indices.iter()) {
            if i >= y.len() || seen[i] {
                return Err(ProcessingError::DataSplit(format!(
                    "row {i} is out of range or assigned twice"
                )));
            }
            seen[i] = true;
        }
        if seen.iter().any(|s| !s) {
            return Err(ProcessingError::DataSplit(
                "partition does not cover every row".to_string(),
            ));
        }

        let mut train_indices = train_indices;
        let mut test_indices = test_indices;
        train_indices.sort_unstable();
        test_indices.sort_unstable();

        let encoder = FeatureEncoder::numeric(&feature_names);
        Ok(Self {
            feature_names,
            x,
            y,
            train_indices,
            test_indices,
            task,
            target_column: "target".to_string(),
            target_encoding: TargetEncoding::Identity,
            encoder,
            stratified: false,
        })
    }

    #[must_use]
    pub fn n_rows(&self) -> usize {
        self.y.len()
    }

    #[must_use]
    pub fn n_features(&self) -> usize {
        self.x.ncols()
    }

    #[must_use]
    pub fn x_train(&self) -> Array2<f64> {
        self.x.select(Axis(0), &self.train_indices)
    }

    #[must_use]
    pub fn x_test(&self) -> Array2<f64> {
        self.x.select(Axis(0), &self.test_indices)
    }

    #[must_use]
    pub fn y_train(&self) -> Array1<f64> {
        self.y.select(Axis(0), &self.train_indices)
    }

    #[must_use]
    pub fn y_test(&self) -> Array1<f64> {
        self.y.select(Axis(0), &self.test_indices)
    }

    /// Sorted distinct target codes across all rows (classification).
    #[must_use]
    pub fn classes(&self) -> Vec<f64> {
        let mut classes: Vec<f64> = self.y.iter().copied().collect();
        classes.sort_by(|a, b| a.total_cmp(b));
        classes.dedup();
        classes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_task_kind_from_str() {
        assert_eq!(
            "classification".parse::<TaskKind>().unwrap(),
            TaskKind::Classification
        );
        assert_eq!("regression".parse::<TaskKind>().unwrap(), TaskKind::Regression);
        let err = "clustering".parse::<TaskKind>().unwrap_err();
        assert_eq!(err.error_code(), "INVALID_CONFIG");
    }

    #[test]
    fn test_training_task_resolution() {
        assert!(TrainingTask::classification(2).is_binary());
        assert!(!TrainingTask::classification(3).is_binary());
        assert_eq!(TrainingTask::Regression.kind(), TaskKind::Regression);
        assert_eq!(
            TrainingTask::classification(5).describe(),
            "multiclass classification"
        );
    }

    #[test]
    fn test_target_encoding_decode() {
        let encoding = TargetEncoding::Labels(vec!["cat".into(), "dog".into()]);
        assert_eq!(encoding.decode(1.0), Some("dog"));
        assert_eq!(encoding.decode(2.0), None);
        assert_eq!(encoding.decode(0.5), None);
        assert_eq!(TargetEncoding::Identity.decode(0.0), None);
    }

    #[test]
    fn test_prepared_data_from_parts() {
        let x = array![[1.0], [2.0], [3.0], [4.0]];
        let y = array![0.0, 1.0, 0.0, 1.0];
        let data = PreparedData::from_parts(
            vec!["a".into()],
            x,
            y,
            vec![3, 0, 1],
            vec![2],
            TrainingTask::classification(2),
        )
        .unwrap();

        assert_eq!(data.train_indices, vec![0, 1, 3]);
        assert_eq!(data.x_train().nrows(), 3);
        assert_eq!(data.y_test(), array![0.0]);
        assert_eq!(data.classes(), vec![0.0, 1.0]);
    }

    #[test]
    fn test_prepared_data_rejects_overlap() {
        let result = PreparedData::from_parts(
            vec!["a".into()],
            array![[1.0], [2.0]],
            array![0.0, 1.0],
            vec![0, 1],
            vec![1],
            TrainingTask::Regression,
        );
        assert_eq!(result.unwrap_err().error_code(), "DATA_SPLIT_ERROR");
    }
}
