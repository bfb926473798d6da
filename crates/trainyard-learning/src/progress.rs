//! Progress reporting for pipeline runs.
//!
//! This module defines [`PipelineStage`], [`ProgressUpdate`] and the
//! [`ProgressCallback`] type alias.
//!
//! A run moves strictly forward through the stages; [`Failed`](PipelineStage::Failed)
//! can be reached from any of them.
//!
//! # Example
//!
//! ```
//! use trainyard_learning::{Algorithm, Pipeline, PipelineConfig, ProgressUpdate};
//!
//! let config = PipelineConfig::builder()
//!     .algorithm(Algorithm::LinearRegression)
//!     .target_column("price")
//!     .build()
//!     .expect("valid config");
//!
//! let pipeline = Pipeline::builder()
//!     .config(config)
//!     .on_progress(|update: ProgressUpdate| {
//!         println!("[{}] {:.0}% - {}", update.stage, update.progress * 100.0, update.message);
//!         if let Some((done, total)) = update.candidates {
//!             println!("  Candidates: {}/{}", done, total);
//!         }
//!     })
//!     .build()
//!     .expect("config is set");
//! # let _ = pipeline;
//! ```

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;

/// The state of a pipeline run.
///
/// 1. [`Received`](Self::Received) - Upload accepted, nothing checked yet
/// 2. [`Validated`](Self::Validated) - Dataset admissible and cleaned
/// 3. [`Prepared`](Self::Prepared) - Features encoded, partition fixed
/// 4. [`Trained`](Self::Trained) - Best candidate selected
/// 5. [`Evaluated`](Self::Evaluated) - Metrics computed (or skipped)
/// 6. [`Rendered`](Self::Rendered) - Diagnostics rendered (best effort)
/// 7. [`Completed`](Self::Completed) - Result handed to the caller
///
/// Terminal states: [`Completed`](Self::Completed), [`Failed`](Self::Failed).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum PipelineStage {
    #[default]
    Received,
    Validated,
    Prepared,
    Trained,
    Evaluated,
    Rendered,
    Completed,
    /// The run failed. This is a terminal state.
    Failed,
}

impl PipelineStage {
    /// Returns the wire representation of the stage.
    ///
    /// # Examples
    ///
    /// ```
    /// use trainyard_learning::PipelineStage;
    ///
    /// assert_eq!(PipelineStage::Trained.as_str(), "trained");
    /// ```
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::Received => "received",
            PipelineStage::Validated => "validated",
            PipelineStage::Prepared => "prepared",
            PipelineStage::Trained => "trained",
            PipelineStage::Evaluated => "evaluated",
            PipelineStage::Rendered => "rendered",
            PipelineStage::Completed => "completed",
            PipelineStage::Failed => "failed",
        }
    }

    /// Returns `true` for [`Completed`](Self::Completed) and [`Failed`](Self::Failed).
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineStage::Completed | PipelineStage::Failed)
    }

    /// Fraction of the run finished once this stage is reached.
    ///
    /// Monotone along the forward path. `Failed` reports 1.0.
    #[must_use]
    pub fn progress(&self) -> f64 {
        match self {
            PipelineStage::Received => 0.0,
            PipelineStage::Validated => 0.1,
            PipelineStage::Prepared => 0.2,
            PipelineStage::Trained => 0.7,
            PipelineStage::Evaluated => 0.8,
            PipelineStage::Rendered => 0.95,
            PipelineStage::Completed | PipelineStage::Failed => 1.0,
        }
    }
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error type for parsing a [`PipelineStage`] from a string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsePipelineStageError {
    invalid_value: String,
}

impl ParsePipelineStageError {
    /// Returns the invalid value that caused the parse error.
    #[must_use]
    pub fn invalid_value(&self) -> &str {
        &self.invalid_value
    }
}

impl std::fmt::Display for ParsePipelineStageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "invalid pipeline stage: '{}'. Valid values are: received, validated, prepared, \
             trained, evaluated, rendered, completed, failed",
            self.invalid_value
        )
    }
}

impl std::error::Error for ParsePipelineStageError {}

impl FromStr for PipelineStage {
    type Err = ParsePipelineStageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "received" => Ok(PipelineStage::Received),
            "validated" => Ok(PipelineStage::Validated),
            "prepared" => Ok(PipelineStage::Prepared),
            "trained" => Ok(PipelineStage::Trained),
            "evaluated" => Ok(PipelineStage::Evaluated),
            "rendered" => Ok(PipelineStage::Rendered),
            "completed" => Ok(PipelineStage::Completed),
            "failed" => Ok(PipelineStage::Failed),
            _ => Err(ParsePipelineStageError {
                invalid_value: s.to_string(),
            }),
        }
    }
}

/// A progress update from a pipeline run.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProgressUpdate {
    /// The stage just reached.
    pub stage: PipelineStage,

    /// Overall progress from 0.0 to 1.0, non-decreasing within a run.
    pub progress: f64,

    /// Human-readable status message. For `Failed` this is the error code.
    pub message: String,

    /// Candidates evaluated and total, `(evaluated, total)`.
    ///
    /// Only populated once the hyperparameter search has finished.
    pub candidates: Option<(u32, u32)>,
}

impl ProgressUpdate {
    /// An update at the stage's nominal progress.
    pub fn new(stage: PipelineStage, message: impl Into<String>) -> Self {
        Self {
            stage,
            progress: stage.progress(),
            message: message.into(),
            candidates: None,
        }
    }
}

/// Type alias for a progress callback function.
///
/// Callbacks must be thread-safe (`Send + Sync`). They run on the pipeline's
/// thread and should return quickly.
pub type ProgressCallback = Arc<dyn Fn(ProgressUpdate) + Send + Sync>;

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [PipelineStage; 8] = [
        PipelineStage::Received,
        PipelineStage::Validated,
        PipelineStage::Prepared,
        PipelineStage::Trained,
        PipelineStage::Evaluated,
        PipelineStage::Rendered,
        PipelineStage::Completed,
        PipelineStage::Failed,
    ];

    #[test]
    fn test_stage_roundtrip() {
        for stage in ALL {
            assert_eq!(stage.as_str().parse::<PipelineStage>(), Ok(stage));
        }
    }

    #[test]
    fn test_stage_from_str_error() {
        let err = "training".parse::<PipelineStage>().unwrap_err();
        assert_eq!(err.invalid_value(), "training");
        assert!(err.to_string().contains("Valid values"));
    }

    #[test]
    fn test_terminal_stages() {
        let terminal: Vec<_> = ALL.iter().filter(|s| s.is_terminal()).collect();
        assert_eq!(
            terminal,
            vec![&PipelineStage::Completed, &PipelineStage::Failed]
        );
    }

    #[test]
    fn test_progress_is_monotone() {
        let forward = &ALL[..7];
        assert!(forward.windows(2).all(|w| w[0].progress() < w[1].progress()));
        assert_eq!(PipelineStage::Completed.progress(), 1.0);
    }

    #[test]
    fn test_progress_update_new() {
        let update = ProgressUpdate::new(PipelineStage::Trained, "done");
        assert_eq!(update.progress, 0.7);
        assert!(update.candidates.is_none());
        assert_eq!(ProgressUpdate::default().stage, PipelineStage::Received);
    }
}
