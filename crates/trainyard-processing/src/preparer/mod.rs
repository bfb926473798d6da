//! Feature/target preparation.
//!
//! Turns an admissible [`CleanDataset`] into [`PreparedData`]:
//! - Target encoding (direct cast or first-seen label codes)
//! - One-hot encoding of non-numeric feature columns, first category dropped
//! - A seeded train/test partition, stratified for classification when possible

mod encoding;
mod split;

pub use encoding::{FeatureEncoder, FeatureSpec, count_target_classes, encode_target};
pub use split::{Split, random_split, split_with_fallback, stratified_split, test_count};

use tracing::{debug, info};

use crate::config::ProcessingConfig;
use crate::error::{ProcessingError, Result, ResultExt};
use crate::types::{CleanDataset, PreparedData, TaskKind, TrainingTask};

/// Prepare a cleaned table with the default split settings and the given seed.
pub fn prepare(
    dataset: &CleanDataset,
    target_column: &str,
    task_kind: TaskKind,
    seed: u64,
) -> Result<PreparedData> {
    let config = ProcessingConfig {
        seed,
        ..ProcessingConfig::default()
    };
    Preparer::new(config).prepare(dataset, target_column, task_kind)
}

/// Builds [`PreparedData`] according to a [`ProcessingConfig`].
#[derive(Debug, Clone, Default)]
pub struct Preparer {
    config: ProcessingConfig,
}

impl Preparer {
    pub fn new(config: ProcessingConfig) -> Self {
        Self { config }
    }

    pub fn prepare(
        &self,
        dataset: &CleanDataset,
        target_column: &str,
        task_kind: TaskKind,
    ) -> Result<PreparedData> {
        let frame = dataset.frame();
        let target = frame
            .column(target_column)
            .map_err(|_| ProcessingError::TargetColumnNotFound {
                column: target_column.to_string(),
                available_columns: dataset.column_names(),
            })?
            .as_materialized_series()
            .clone();

        let task = if dataset.task().kind() == task_kind && dataset.target_column() == target_column
        {
            dataset.task()
        } else {
            match task_kind {
                TaskKind::Regression => TrainingTask::Regression,
                TaskKind::Classification => TrainingTask::classification(target.n_unique()?),
            }
        };

        let (y, target_encoding) = encode_target(&target, task)?;

        let encoder = FeatureEncoder::fit(frame, target_column)
            .context("While fitting feature encoders")?;
        if encoder.width() == 0 {
            return Err(ProcessingError::NoFeaturesAvailable);
        }
        let x = encoder.transform(frame)?;
        let feature_names = encoder.feature_names();
        debug!(
            "Encoded {} source columns into {} features",
            encoder.specs().len(),
            feature_names.len()
        );

        let labels = y.to_vec();
        let split = split_with_fallback(
            &labels,
            self.config.test_size,
            self.config.seed,
            self.config.stratify && task.is_classification(),
        )?;

        info!(
            "Prepared {} rows x {} features ({} train / {} test{})",
            x.nrows(),
            x.ncols(),
            split.train.len(),
            split.test.len(),
            if split.stratified { ", stratified" } else { "" }
        );

        Ok(PreparedData {
            feature_names,
            x,
            y,
            train_indices: split.train,
            test_indices: split.test,
            task,
            target_column: target_column.to_string(),
            target_encoding,
            encoder,
            stratified: split.stratified,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TargetEncoding;
    use crate::validator::validate;

    fn dataset(rows: usize) -> CleanDataset {
        let mut text = String::from("height,color,species\n");
        for i in 0..rows {
            let species = ["setosa", "virginica", "versicolor"][i % 3];
            let color = ["red", "blue"][i % 2];
            text.push_str(&format!("{},{},{}\n", 10 + i, color, species));
        }
        validate(text.as_bytes(), "species", TaskKind::Classification)
            .into_result()
            .unwrap()
    }

    #[test]
    fn test_prepare_encodes_and_splits() {
        let data = prepare(&dataset(30), "species", TaskKind::Classification, 42).unwrap();
        assert_eq!(data.feature_names, vec!["height", "color_red"]);
        assert_eq!(data.x.nrows(), 30);
        assert_eq!(data.test_indices.len(), 6);
        assert!(data.stratified);
        assert_eq!(
            data.target_encoding,
            TargetEncoding::Labels(vec![
                "setosa".into(),
                "virginica".into(),
                "versicolor".into()
            ])
        );
    }

    #[test]
    fn test_prepare_is_idempotent() {
        let clean = dataset(40);
        let a = prepare(&clean, "species", TaskKind::Classification, 42).unwrap();
        let b = prepare(&clean, "species", TaskKind::Classification, 42).unwrap();
        assert_eq!(a.train_indices, b.train_indices);
        assert_eq!(a.test_indices, b.test_indices);
        assert_eq!(a.x, b.x);
    }

    #[test]
    fn test_no_features_available() {
        let mut text = String::from("label\n");
        for i in 0..12 {
            text.push_str(&format!("{}\n", i % 2));
        }
        let clean = validate(text.as_bytes(), "label", TaskKind::Classification)
            .into_result()
            .unwrap();
        let err = prepare(&clean, "label", TaskKind::Classification, 42).unwrap_err();
        assert_eq!(err.error_code(), "NO_FEATURES_AVAILABLE");
    }
}
