//! Training pipeline implementation.
//!
//! This module provides the [`Pipeline`] struct and its builder. A run takes
//! the raw upload bytes through every stage in order:
//!
//! 1. **Validation** - Parse the CSV and check it is admissible
//! 2. **Preparation** - Encode features and target, fix the train/test split
//! 3. **Training** - Search the algorithm's hyperparameter space
//! 4. **Evaluation** - Compute test-set metrics (best effort)
//! 5. **Rendering** - Draw the diagnostic charts (best effort)
//!
//! Validation, preparation and training failures abort the run. Metric and
//! chart failures only degrade the result and are listed in
//! [`PipelineResult::warnings`].
//!
//! # Example
//!
//! ```rust,no_run
//! use trainyard_learning::{Algorithm, Pipeline, PipelineConfig};
//!
//! let config = PipelineConfig::builder()
//!     .algorithm(Algorithm::KNearestNeighbors)
//!     .target_column("species")
//!     .model_name("iris")
//!     .build()?;
//!
//! let pipeline = Pipeline::builder()
//!     .config(config)
//!     .on_progress(|update| println!("[{}] {}", update.stage, update.message))
//!     .build()?;
//!
//! let bytes = std::fs::read("iris.csv")?;
//! match pipeline.run(&bytes) {
//!     Ok(result) => println!("{} images, {:?}", result.images.len(), result.metrics),
//!     Err(e) => eprintln!("{} ({})", e.message, e.code),
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Thread Safety
//!
//! [`Pipeline`] is `Send + Sync` and holds no state between runs, so one
//! instance can serve concurrent requests as long as each run writes to its
//! own run id.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;
use tracing::{error, info, warn};
use trainyard_processing::{Preparer, Validator};

use crate::artifacts::DiagnosticRenderer;
use crate::config::{Algorithm, HyperparameterOverrides, PipelineConfig, generate_run_id};
use crate::error::{LearningError, PipelineError, Result};
use crate::metrics::compute_metrics;
use crate::model::TrainedModel;
use crate::progress::{PipelineStage, ProgressCallback, ProgressUpdate};
use crate::trainer::{TrainOptions, Trainer};
use crate::types::PipelineResult;

/// The dataset-to-model training pipeline.
///
/// Use [`Pipeline::builder()`] to construct one.
pub struct Pipeline {
    config: PipelineConfig,
    progress_callback: Option<ProgressCallback>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("config", &self.config)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<callback>"),
            )
            .finish()
    }
}

impl Pipeline {
    /// Create a new builder for `Pipeline`.
    #[must_use]
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run every stage on `raw_bytes` and package the outcome.
    ///
    /// Never panics: a panic anywhere inside the run is caught and returned
    /// as an `UNEXPECTED_ERROR`. On failure a [`PipelineStage::Failed`]
    /// update carrying the error code is emitted before returning.
    pub fn run(&self, raw_bytes: &[u8]) -> std::result::Result<PipelineResult, PipelineError> {
        let started = Instant::now();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.execute(raw_bytes, started)));

        let result = match outcome {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(e)) => Err(PipelineError::from(e)),
            Err(payload) => Err(PipelineError::unexpected(format!(
                "pipeline panicked: {}",
                panic_message(payload.as_ref())
            ))),
        };

        if let Err(e) = &result {
            error!("Pipeline failed: {}", e);
            self.emit(ProgressUpdate::new(PipelineStage::Failed, e.code.clone()));
        }
        result
    }

    fn emit(&self, update: ProgressUpdate) {
        info!(stage = update.stage.as_str(), "{}", update.message);
        if let Some(callback) = &self.progress_callback {
            callback(update);
        }
    }

    fn execute(&self, raw_bytes: &[u8], started: Instant) -> Result<PipelineResult> {
        let config = &self.config;
        let algorithm = config.algorithm;
        let task_kind = algorithm.task_kind();
        let run_id = config
            .run_id
            .clone()
            .unwrap_or_else(|| generate_run_id(&config.model_name));

        self.emit(ProgressUpdate::new(
            PipelineStage::Received,
            format!(
                "Received {} bytes for {} on '{}' (run {})",
                raw_bytes.len(),
                algorithm.display_name(),
                config.target_column,
                run_id
            ),
        ));

        // A malformed alpha is rejected before any data is touched.
        if algorithm == Algorithm::RidgeRegression {
            config.overrides.parsed_alpha()?;
        }

        let dataset = Validator::new(config.processing.clone())
            .validate(raw_bytes, &config.target_column, task_kind)
            .into_result()?;
        self.emit(ProgressUpdate::new(
            PipelineStage::Validated,
            format!(
                "Dataset validated: {} rows, {} columns ({} incomplete rows dropped)",
                dataset.rows(),
                dataset.column_names().len(),
                dataset.rows_dropped()
            ),
        ));

        let data = Preparer::new(config.processing.clone()).prepare(
            &dataset,
            &config.target_column,
            task_kind,
        )?;
        let mut warnings = Vec::new();
        if config.processing.stratify && data.task.is_classification() && !data.stratified {
            warnings.push("Stratified split not possible; used a random split".to_string());
        }
        self.emit(ProgressUpdate::new(
            PipelineStage::Prepared,
            format!(
                "Prepared {} features for {} ({} train / {} test rows)",
                data.n_features(),
                data.task.describe(),
                data.train_indices.len(),
                data.test_indices.len()
            ),
        ));

        let candidate = Trainer::new(TrainOptions::from(config)).train(
            &data,
            algorithm,
            Some(&config.overrides),
        )?;
        warnings.extend(candidate.warnings.iter().cloned());
        let scored = candidate.evaluated.iter().filter(|c| c.error.is_none()).count();
        let mut update = ProgressUpdate::new(
            PipelineStage::Trained,
            format!(
                "Selected {} {:?}",
                algorithm.display_name(),
                candidate.hyperparameters
            ),
        );
        update.candidates = Some((to_u32(scored), to_u32(candidate.evaluated.len())));
        self.emit(update);

        let metrics = match compute_metrics(&candidate.model, &data) {
            Ok(metrics) => Some(metrics),
            Err(e) => {
                warn!("Metrics unavailable: {}", e);
                warnings.push(format!("Metrics not computed: {e}"));
                None
            }
        };
        self.emit(ProgressUpdate::new(
            PipelineStage::Evaluated,
            match &metrics {
                Some(m) => format!("Primary test score {:.4}", m.primary_score()),
                None => "Metrics skipped".to_string(),
            },
        ));

        let rendered = DiagnosticRenderer::new(config.render.clone(), run_id.as_str())
            .render(&candidate, &data, data.task);
        warnings.extend(rendered.warnings);
        self.emit(ProgressUpdate::new(
            PipelineStage::Rendered,
            format!("Rendered {} diagnostic charts", rendered.images.len()),
        ));

        let model_artifact =
            TrainedModel::from_candidate(&candidate, &data, config.model_name.as_str()).artifact()?;

        let coefficients = candidate.model.coefficients(&data.feature_names);
        let mut feature_importances: Vec<(String, f64)> = candidate
            .model
            .feature_importances()
            .map(|values| data.feature_names.iter().cloned().zip(values.iter().copied()).collect())
            .unwrap_or_default();
        feature_importances.sort_by(|a, b| b.1.total_cmp(&a.1));

        let result = PipelineResult {
            run_id,
            model_artifact,
            metrics,
            images: rendered.images,
            candidates: candidate.evaluated,
            coefficients,
            feature_importances,
            warnings,
            duration_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        };

        self.emit(ProgressUpdate::new(
            PipelineStage::Completed,
            format!(
                "Completed in {} ms with {} warnings",
                result.duration_ms,
                result.warnings.len()
            ),
        ));
        Ok(result)
    }
}

fn to_u32(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Builder for [`Pipeline`].
#[derive(Default)]
pub struct PipelineBuilder {
    config: Option<PipelineConfig>,
    progress_callback: Option<ProgressCallback>,
}

impl std::fmt::Debug for PipelineBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineBuilder")
            .field("config", &self.config)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<callback>"),
            )
            .finish()
    }
}

impl PipelineBuilder {
    /// Set the pipeline configuration (required).
    #[must_use]
    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set a progress callback.
    ///
    /// The callback receives a [`ProgressUpdate`] on every stage transition,
    /// including the final `Completed` or `Failed`.
    #[must_use]
    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(ProgressUpdate) + Send + Sync + 'static,
    {
        self.progress_callback = Some(std::sync::Arc::new(callback));
        self
    }

    /// Build the pipeline.
    ///
    /// # Errors
    ///
    /// Returns [`LearningError::InvalidConfig`] if no configuration was set.
    pub fn build(self) -> Result<Pipeline> {
        let config = self
            .config
            .ok_or_else(|| LearningError::InvalidConfig("config is required".to_string()))?;
        Ok(Pipeline {
            config,
            progress_callback: self.progress_callback,
        })
    }
}

/// Run the whole pipeline with default settings.
///
/// Everything not named here (seed, split, search folds, chart style) takes
/// its [`PipelineConfig`] default.
pub fn run_pipeline(
    raw_bytes: &[u8],
    target_column: &str,
    algorithm: Algorithm,
    model_name: &str,
    overrides: Option<HyperparameterOverrides>,
) -> std::result::Result<PipelineResult, PipelineError> {
    let config = PipelineConfig::builder()
        .algorithm(algorithm)
        .target_column(target_column)
        .model_name(model_name)
        .overrides(overrides.unwrap_or_default())
        .build()?;
    Pipeline::builder().config(config).build()?.run(raw_bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn regression_csv(rows: usize) -> Vec<u8> {
        let mut csv = String::from("x,z,y\n");
        for i in 0..rows {
            let x = i as f64;
            let z = (i % 7) as f64;
            let noise = ((i * 37) % 11) as f64 * 0.01 - 0.05;
            csv.push_str(&format!("{x},{z},{}\n", 3.0 * x - 2.0 * z + 1.0 + noise));
        }
        csv.into_bytes()
    }

    fn config(algorithm: Algorithm, target: &str) -> PipelineConfig {
        PipelineConfig::builder()
            .algorithm(algorithm)
            .target_column(target)
            .model_name("unit")
            .run_id("unit-run")
            .build()
            .unwrap()
    }

    #[test]
    fn test_builder_requires_config() {
        let err = Pipeline::builder().build().unwrap_err();
        assert_eq!(err.error_code(), "INVALID_CONFIG");
    }

    #[test]
    fn test_progress_stages_in_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let pipeline = Pipeline::builder()
            .config(config(Algorithm::LinearRegression, "y"))
            .on_progress(move |u| sink.lock().unwrap().push(u))
            .build()
            .unwrap();

        let result = pipeline.run(&regression_csv(40)).unwrap();
        assert_eq!(result.run_id, "unit-run");

        let updates = seen.lock().unwrap();
        let stages: Vec<_> = updates.iter().map(|u| u.stage).collect();
        assert_eq!(
            stages,
            vec![
                PipelineStage::Received,
                PipelineStage::Validated,
                PipelineStage::Prepared,
                PipelineStage::Trained,
                PipelineStage::Evaluated,
                PipelineStage::Rendered,
                PipelineStage::Completed,
            ]
        );
        assert!(updates.windows(2).all(|w| w[0].progress <= w[1].progress));
        assert_eq!(updates[3].candidates, Some((1, 1)));
    }

    #[test]
    fn test_failure_emits_code() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let pipeline = Pipeline::builder()
            .config(config(Algorithm::LinearRegression, "missing"))
            .on_progress(move |u| sink.lock().unwrap().push(u))
            .build()
            .unwrap();

        let err = pipeline.run(&regression_csv(20)).unwrap_err();
        assert_eq!(err.code, "TARGET_COLUMN_NOT_FOUND");

        let updates = seen.lock().unwrap();
        let last = updates.last().unwrap();
        assert_eq!(last.stage, PipelineStage::Failed);
        assert_eq!(last.message, "TARGET_COLUMN_NOT_FOUND");
    }

    #[test]
    fn test_panics_become_unexpected_errors() {
        let pipeline = Pipeline::builder()
            .config(config(Algorithm::LinearRegression, "y"))
            .on_progress(|u| {
                if u.stage == PipelineStage::Validated {
                    panic!("callback exploded");
                }
            })
            .build()
            .unwrap();

        let err = pipeline.run(&regression_csv(20)).unwrap_err();
        assert_eq!(err.code, "UNEXPECTED_ERROR");
        assert!(err.message.contains("callback exploded"));
    }

    #[test]
    fn test_bad_alpha_rejected_before_validation() {
        let err = run_pipeline(
            b"",
            "y",
            Algorithm::RidgeRegression,
            "ridge",
            Some(HyperparameterOverrides::with_alpha("abc")),
        )
        .unwrap_err();
        assert_eq!(err.code, "INVALID_ALPHA_FORMAT");
    }

    #[test]
    fn test_linear_run_reports_coefficients() {
        let result = run_pipeline(&regression_csv(50), "y", Algorithm::LinearRegression, "lin", None)
            .unwrap();
        let coefficients = result.coefficients.unwrap();
        assert!((coefficients.intercept - 1.0).abs() < 0.1);
        assert!(result.feature_importances.is_empty());
        assert_eq!(result.images.len(), 4);
        assert!(result.run_id.starts_with("lin_"));
    }
}
