//! Configuration for dataset validation and preparation.
//!
//! The defaults reproduce the admissibility rules of the training service:
//! at least 10 rows before cleaning, at most 50 missing cells, at least 5
//! rows after incomplete rows are dropped, 2..=50 classes for
//! classification, and an 80/20 split seeded with 42.

use serde::{Deserialize, Serialize};

/// Default cap on the total number of missing cells.
pub const DEFAULT_MAX_NULL_CELLS: usize = 50;
/// Default minimum row count before cleaning.
pub const DEFAULT_MIN_ROWS: usize = 10;
/// Default minimum row count after incomplete rows are dropped.
pub const DEFAULT_MIN_ROWS_AFTER_CLEANING: usize = 5;
/// Default minimum number of distinct classification labels.
pub const DEFAULT_MIN_TARGET_CLASSES: usize = 2;
/// Default maximum number of distinct classification labels.
pub const DEFAULT_MAX_TARGET_CLASSES: usize = 50;
/// Default held-out fraction.
pub const DEFAULT_TEST_SIZE: f64 = 0.2;
/// Default partition seed.
pub const DEFAULT_SEED: u64 = 42;

/// Configuration for the validator and the preparer.
///
/// Use [`ProcessingConfig::builder()`] to create a configuration with a
/// fluent API.
///
/// # Example
///
/// ```
/// use trainyard_processing::ProcessingConfig;
///
/// let config = ProcessingConfig::builder()
///     .max_null_cells(100)
///     .seed(7)
///     .build()
///     .expect("valid config");
/// assert_eq!(config.max_null_cells, 100);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingConfig {
    /// Maximum number of missing cells across the whole table.
    /// Default: 50
    pub max_null_cells: usize,

    /// Minimum number of rows before cleaning.
    /// Default: 10
    pub min_rows: usize,

    /// Minimum number of rows after incomplete rows are dropped.
    /// Default: 5
    pub min_rows_after_cleaning: usize,

    /// Minimum number of distinct labels for classification targets.
    /// Default: 2
    pub min_target_classes: usize,

    /// Maximum number of distinct labels for classification targets.
    /// Default: 50
    pub max_target_classes: usize,

    /// Fraction of rows held out for testing, in `(0.0, 1.0)`.
    /// Default: 0.2
    pub test_size: f64,

    /// Seed for the train/test partition.
    /// Default: 42
    pub seed: u64,

    /// Whether classification splits try to preserve label proportions.
    /// Default: true
    pub stratify: bool,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            max_null_cells: DEFAULT_MAX_NULL_CELLS,
            min_rows: DEFAULT_MIN_ROWS,
            min_rows_after_cleaning: DEFAULT_MIN_ROWS_AFTER_CLEANING,
            min_target_classes: DEFAULT_MIN_TARGET_CLASSES,
            max_target_classes: DEFAULT_MAX_TARGET_CLASSES,
            test_size: DEFAULT_TEST_SIZE,
            seed: DEFAULT_SEED,
            stratify: true,
        }
    }
}

impl ProcessingConfig {
    /// Create a new configuration builder.
    pub fn builder() -> ProcessingConfigBuilder {
        ProcessingConfigBuilder::default()
    }

    /// Validate the configuration and return errors if invalid.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if !(self.test_size > 0.0 && self.test_size < 1.0) {
            return Err(ConfigValidationError::InvalidTestSize(self.test_size));
        }

        if self.min_target_classes < 2 {
            return Err(ConfigValidationError::InvalidClassBounds {
                min: self.min_target_classes,
                max: self.max_target_classes,
            });
        }

        if self.max_target_classes < self.min_target_classes {
            return Err(ConfigValidationError::InvalidClassBounds {
                min: self.min_target_classes,
                max: self.max_target_classes,
            });
        }

        if self.min_rows_after_cleaning < 2 {
            return Err(ConfigValidationError::InvalidRowFloor {
                field: "min_rows_after_cleaning".to_string(),
                value: self.min_rows_after_cleaning,
            });
        }

        Ok(())
    }
}

/// Errors that can occur during configuration validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Invalid test_size: {0} (must be between 0.0 and 1.0, exclusive)")]
    InvalidTestSize(f64),

    #[error("Invalid target class bounds: min {min}, max {max} (need 2 <= min <= max)")]
    InvalidClassBounds { min: usize, max: usize },

    #[error("Invalid row floor for '{field}': {value} (must be at least 2)")]
    InvalidRowFloor { field: String, value: usize },
}

/// Builder for [`ProcessingConfig`] with fluent API.
#[derive(Debug, Default)]
pub struct ProcessingConfigBuilder {
    max_null_cells: Option<usize>,
    min_rows: Option<usize>,
    min_rows_after_cleaning: Option<usize>,
    min_target_classes: Option<usize>,
    max_target_classes: Option<usize>,
    test_size: Option<f64>,
    seed: Option<u64>,
    stratify: Option<bool>,
}

impl ProcessingConfigBuilder {
    /// Set the cap on the total number of missing cells.
    pub fn max_null_cells(mut self, cap: usize) -> Self {
        self.max_null_cells = Some(cap);
        self
    }

    /// Set the minimum row count before cleaning.
    pub fn min_rows(mut self, rows: usize) -> Self {
        self.min_rows = Some(rows);
        self
    }

    /// Set the minimum row count after incomplete rows are dropped.
    pub fn min_rows_after_cleaning(mut self, rows: usize) -> Self {
        self.min_rows_after_cleaning = Some(rows);
        self
    }

    /// Set the minimum number of distinct classification labels.
    pub fn min_target_classes(mut self, classes: usize) -> Self {
        self.min_target_classes = Some(classes);
        self
    }

    /// Set the maximum number of distinct classification labels.
    pub fn max_target_classes(mut self, classes: usize) -> Self {
        self.max_target_classes = Some(classes);
        self
    }

    /// Set the held-out fraction.
    ///
    /// # Arguments
    /// * `size` - Value strictly between 0.0 and 1.0 (e.g., 0.2 = 20%)
    pub fn test_size(mut self, size: f64) -> Self {
        self.test_size = Some(size);
        self
    }

    /// Set the partition seed.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Enable or disable the stratified split attempt for classification.
    pub fn stratify(mut self, stratify: bool) -> Self {
        self.stratify = Some(stratify);
        self
    }

    /// Build the configuration.
    ///
    /// Returns a validated `ProcessingConfig` or an error if validation fails.
    pub fn build(self) -> Result<ProcessingConfig, ConfigValidationError> {
        let config = ProcessingConfig {
            max_null_cells: self.max_null_cells.unwrap_or(DEFAULT_MAX_NULL_CELLS),
            min_rows: self.min_rows.unwrap_or(DEFAULT_MIN_ROWS),
            min_rows_after_cleaning: self
                .min_rows_after_cleaning
                .unwrap_or(DEFAULT_MIN_ROWS_AFTER_CLEANING),
            min_target_classes: self
                .min_target_classes
                .unwrap_or(DEFAULT_MIN_TARGET_CLASSES),
            max_target_classes: self
                .max_target_classes
                .unwrap_or(DEFAULT_MAX_TARGET_CLASSES),
            test_size: self.test_size.unwrap_or(DEFAULT_TEST_SIZE),
            seed: self.seed.unwrap_or(DEFAULT_SEED),
            stratify: self.stratify.unwrap_or(true),
        };

        config.validate()?;
        Ok(config)
    }
}
