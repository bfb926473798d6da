//! Dataset validation.
//!
//! The validator decides whether an uploaded table may be trained on. Checks
//! run in a fixed order and the first failure wins:
//!
//! 1. Parse the bytes as CSV (empty, unreadable and malformed input)
//! 2. Non-empty table containing the target column
//! 3. Row floor before cleaning
//! 4. Cap on missing cells, then drop every incomplete row
//! 5. Row floor after cleaning
//! 6. Task-specific target checks (class count, or numeric coercion)

mod reader;

pub use reader::read_csv;

use polars::prelude::*;
use tracing::{debug, info, warn};

use crate::config::ProcessingConfig;
use crate::error::{ProcessingError, Result};
use crate::preparer::count_target_classes;
use crate::types::{CleanDataset, TaskKind, TrainingTask, ValidationReport};
use crate::utils::{DtypeCategory, get_dtype_category, text_values};

/// Validate raw upload bytes with the default admissibility rules.
pub fn validate(raw_bytes: &[u8], target_column: &str, task_kind: TaskKind) -> ValidationReport {
    Validator::new(ProcessingConfig::default()).validate(raw_bytes, target_column, task_kind)
}

/// Applies the admissibility rules of a [`ProcessingConfig`] to uploads.
#[derive(Debug, Clone, Default)]
pub struct Validator {
    config: ProcessingConfig,
}

impl Validator {
    pub fn new(config: ProcessingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ProcessingConfig {
        &self.config
    }

    /// Validate an upload, producing exactly one of `Admissible` or `Rejected`.
    pub fn validate(
        &self,
        raw_bytes: &[u8],
        target_column: &str,
        task_kind: TaskKind,
    ) -> ValidationReport {
        match self.check(raw_bytes, target_column, task_kind) {
            Ok(dataset) => {
                info!(
                    "Dataset admissible: {} rows ({} dropped), task {}",
                    dataset.rows(),
                    dataset.rows_dropped(),
                    dataset.task().describe()
                );
                ValidationReport::Admissible(dataset)
            }
            Err(e) => {
                warn!("Dataset rejected [{}]: {}", e.error_code(), e);
                ValidationReport::Rejected(e)
            }
        }
    }

    fn check(&self, raw_bytes: &[u8], target_column: &str, task_kind: TaskKind) -> Result<CleanDataset> {
        let df = read_csv(raw_bytes)?;

        if df.height() == 0 || df.width() == 0 {
            return Err(ProcessingError::EmptyDataset);
        }

        let available_columns: Vec<String> = df
            .get_column_names()
            .into_iter()
            .map(|s| s.to_string())
            .collect();
        if !available_columns.iter().any(|c| c == target_column) {
            return Err(ProcessingError::TargetColumnNotFound {
                column: target_column.to_string(),
                available_columns,
            });
        }

        let rows_before_cleaning = df.height();
        if rows_before_cleaning < self.config.min_rows {
            return Err(ProcessingError::InsufficientData {
                rows: rows_before_cleaning,
                min_rows: self.config.min_rows,
            });
        }

        let null_cells: usize = df.get_columns().iter().map(|c| c.null_count()).sum();
        debug!("Missing cells before cleaning: {}", null_cells);
        if null_cells > self.config.max_null_cells {
            return Err(ProcessingError::TooManyNulls {
                null_count: null_cells,
                max_null_cells: self.config.max_null_cells,
            });
        }

        let frame = drop_incomplete_rows(df)?;
        if frame.height() < self.config.min_rows_after_cleaning {
            return Err(ProcessingError::InsufficientDataAfterCleaning {
                rows: frame.height(),
                min_rows: self.config.min_rows_after_cleaning,
            });
        }
        if frame.height() < rows_before_cleaning {
            debug!(
                "Dropped {} incomplete rows",
                rows_before_cleaning - frame.height()
            );
        }

        let target = frame.column(target_column)?.as_materialized_series().clone();
        let task = match task_kind {
            TaskKind::Classification => self.check_classification_target(&target, target_column)?,
            TaskKind::Regression => {
                check_regression_target(&target, target_column)?;
                TrainingTask::Regression
            }
        };

        Ok(CleanDataset {
            frame,
            target_column: target_column.to_string(),
            task,
            rows_before_cleaning,
            null_cells,
        })
    }

    fn check_classification_target(&self, target: &Series, column: &str) -> Result<TrainingTask> {
        let classes = count_target_classes(target)?;
        debug!("Target '{}' has {} distinct values", column, classes);

        if classes < self.config.min_target_classes {
            return Err(ProcessingError::InsufficientTargetClasses {
                column: column.to_string(),
                classes,
                min_classes: self.config.min_target_classes,
            });
        }
        if classes > self.config.max_target_classes {
            return Err(ProcessingError::TooManyTargetClasses {
                column: column.to_string(),
                classes,
                max_classes: self.config.max_target_classes,
            });
        }

        Ok(TrainingTask::classification(classes))
    }
}

/// Keep only the rows in which every cell is present.
fn drop_incomplete_rows(df: DataFrame) -> Result<DataFrame> {
    let mut mask = BooleanChunked::full("complete".into(), true, df.height());
    for column in df.get_columns() {
        if column.null_count() > 0 {
            mask = &mask & &column.as_materialized_series().is_not_null();
        }
    }
    Ok(df.filter(&mask)?)
}

/// A regression target must be numeric, boolean, or text in which every
/// value parses as a finite number.
fn check_regression_target(target: &Series, column: &str) -> Result<()> {
    if get_dtype_category(target.dtype()) != DtypeCategory::Text {
        return Ok(());
    }

    let mut invalid_count = 0;
    let mut example = None;
    for value in text_values(target)?.into_iter().flatten() {
        let parsed = value.parse::<f64>().ok().filter(|v| v.is_finite());
        if parsed.is_none() {
            invalid_count += 1;
            if example.is_none() {
                example = Some(value);
            }
        }
    }

    if invalid_count > 0 {
        return Err(ProcessingError::NonNumericTarget {
            column: column.to_string(),
            invalid_count,
            example,
        });
    }
    Ok(())
}
