//! Dataset validation and preparation for supervised training.
//!
//! # Overview
//!
//! This crate covers the first two stages of the training pipeline:
//!
//! - **Validation**: parse an uploaded CSV, check it is structurally sound,
//!   cap missing cells, drop incomplete rows and check the target column
//! - **Preparation**: encode the target and the features into numbers and
//!   produce a seeded, reproducible train/test partition
//!
//! Both stages are pure functions of their inputs. Nothing is cached between
//! calls.
//!
//! # Quick Start
//!
//! ```rust
//! use trainyard_processing::{TaskKind, prepare, validate};
//!
//! let mut csv = String::from("width,height,shape\n");
//! for i in 0..20 {
//!     csv.push_str(&format!("{},{},{}\n", i, i * 2, if i % 2 == 0 { "round" } else { "square" }));
//! }
//!
//! let dataset = validate(csv.as_bytes(), "shape", TaskKind::Classification)
//!     .into_result()
//!     .expect("admissible dataset");
//! let data = prepare(&dataset, "shape", TaskKind::Classification, 42).expect("prepared");
//!
//! assert_eq!(data.feature_names, vec!["width", "height"]);
//! assert_eq!(data.test_indices.len(), 4);
//! ```
//!
//! # Configuration
//!
//! Use [`ProcessingConfig`] with [`Validator`] and [`Preparer`] to change the
//! admissibility rules or the split:
//!
//! ```rust
//! use trainyard_processing::{Preparer, ProcessingConfig, Validator};
//!
//! let config = ProcessingConfig::builder()
//!     .min_rows(5)
//!     .test_size(0.25)
//!     .stratify(false)
//!     .build()
//!     .expect("valid config");
//!
//! let validator = Validator::new(config.clone());
//! let preparer = Preparer::new(config);
//! # let _ = (validator, preparer);
//! ```

pub mod config;
pub mod error;
pub mod preparer;
pub mod types;
pub mod utils;
pub mod validator;

// Re-exports for convenient access
pub use config::{ConfigValidationError, ProcessingConfig, ProcessingConfigBuilder};
pub use error::{ErrorKind, ProcessingError, Result as ProcessingResult, ResultExt};
pub use preparer::{FeatureEncoder, FeatureSpec, Preparer, prepare};
pub use types::{
    ClassificationKind, CleanDataset, PreparedData, TargetEncoding, TaskKind, TrainingTask,
    ValidationReport,
};
pub use validator::{Validator, read_csv, validate};

#[cfg(test)]
mod tests {
    use super::*;

    static_assertions::assert_impl_all!(ProcessingError: Send, Sync);
    static_assertions::assert_impl_all!(PreparedData: Send, Sync, Clone);
    static_assertions::assert_impl_all!(CleanDataset: Send, Sync);
    static_assertions::assert_impl_all!(ProcessingConfig: Send, Sync, Clone);
}
