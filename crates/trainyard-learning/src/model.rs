//! Trained model persistence and inference.
//!
//! This module provides [`TrainedModel`], which bundles a fitted estimator
//! with everything needed to use it later:
//!
//! - **Single prediction** via [`predict()`](TrainedModel::predict) (encoded
//!   feature vector) or [`predict_record()`](TrainedModel::predict_record)
//!   (raw column values)
//! - **Batch prediction** via [`predict_batch()`](TrainedModel::predict_batch)
//! - **Serialization** via [`save()`](TrainedModel::save), [`load()`](TrainedModel::load),
//!   [`to_bytes()`](TrainedModel::to_bytes) and [`from_bytes()`](TrainedModel::from_bytes)
//!
//! # Serialization Format
//!
//! Models are stored as JSON. The document holds the estimator parameters,
//! the feature encoder and the target label mapping, so a loaded model
//! accepts the same raw records the training CSV contained.
//!
//! # Example
//!
//! ```rust,no_run
//! use trainyard_learning::TrainedModel;
//!
//! let model = TrainedModel::load("model_run-1.json")?;
//! let record = serde_json::json!({ "age": 31, "city": "Oslo" });
//! let prediction = model.predict_record(record.as_object().unwrap())?;
//! println!("{:?} ({:?})", prediction.label, prediction.confidence);
//! # Ok::<(), trainyard_learning::LearningError>(())
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;
use trainyard_processing::{FeatureEncoder, PreparedData, TargetEncoding, TrainingTask};

use crate::config::Algorithm;
use crate::error::{LearningError, Result};
use crate::estimators::FittedModel;
use crate::metrics::class_name;
use crate::types::{CandidateModel, Capabilities, Hyperparameters, Prediction, TrainedModelArtifact};

/// A fitted model ready for inference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedModel {
    model: FittedModel,
    feature_names: Vec<String>,
    encoder: FeatureEncoder,
    target_encoding: TargetEncoding,
    task: TrainingTask,
    algorithm: Algorithm,
    hyperparameters: Hyperparameters,
    target_column: String,
    model_name: String,
    /// RFC 3339 creation time.
    created_at: String,
}

impl TrainedModel {
    /// Bundle the selected candidate with the preparation state of `data`.
    pub fn from_candidate(
        candidate: &CandidateModel,
        data: &PreparedData,
        model_name: impl Into<String>,
    ) -> Self {
        Self {
            model: candidate.model.clone(),
            feature_names: data.feature_names.clone(),
            encoder: data.encoder.clone(),
            target_encoding: data.target_encoding.clone(),
            task: data.task,
            algorithm: candidate.algorithm,
            hyperparameters: candidate.hyperparameters.clone(),
            target_column: data.target_column.clone(),
            model_name: model_name.into(),
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn estimator(&self) -> &FittedModel {
        &self.model
    }

    /// Encoded feature order expected by [`predict()`](Self::predict).
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn task(&self) -> TrainingTask {
        self.task
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub fn hyperparameters(&self) -> &Hyperparameters {
        &self.hyperparameters
    }

    pub fn target_column(&self) -> &str {
        &self.target_column
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    pub fn created_at(&self) -> &str {
        &self.created_at
    }

    pub fn capabilities(&self) -> Capabilities {
        self.algorithm.capabilities()
    }

    /// Serialize to JSON bytes.
    ///
    /// # Errors
    ///
    /// [`LearningError::ModelSave`] if serialization fails.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| LearningError::ModelSave(e.to_string()))
    }

    /// Deserialize bytes produced by [`to_bytes()`](Self::to_bytes).
    ///
    /// # Errors
    ///
    /// [`LearningError::ModelLoad`] if the bytes are not a serialized model.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let model: Self = serde_json::from_slice(bytes)?;
        if model.model.n_features() != model.feature_names.len() {
            return Err(LearningError::ModelLoad(format!(
                "estimator expects {} features but {} names are stored",
                model.model.n_features(),
                model.feature_names.len()
            )));
        }
        Ok(model)
    }

    /// Write the model to `path`. The parent directory must exist.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let bytes = self.to_bytes()?;
        std::fs::write(path, bytes)?;
        Ok(())
    }

    /// Read a model written by [`save()`](Self::save).
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| {
            LearningError::ModelLoad(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_bytes(&bytes)
    }

    /// The persisted artifact: serialized bytes plus the metadata summary.
    pub fn artifact(&self) -> Result<TrainedModelArtifact> {
        Ok(TrainedModelArtifact {
            serialized_bytes: self.to_bytes()?,
            feature_names: self.feature_names.clone(),
            algorithm: self.algorithm,
            hyperparameters: self.hyperparameters.clone(),
            target_column: self.target_column.clone(),
            model_name: self.model_name.clone(),
            task: self.task,
            capabilities: self.capabilities(),
        })
    }

    /// Predict from an encoded feature vector in [`feature_names()`](Self::feature_names) order.
    ///
    /// # Errors
    ///
    /// [`LearningError::InvalidFeatures`] if the length is wrong or a value is
    /// not finite.
    pub fn predict(&self, features: &[f64]) -> Result<Prediction> {
        Ok(self.predict_batch(&[features.to_vec()])?.remove(0))
    }

    /// Predict from raw column values, encoded with the training encoder.
    pub fn predict_record(&self, record: &Map<String, Value>) -> Result<Prediction> {
        let features = self
            .encoder
            .encode_record(record)
            .map_err(|e| LearningError::InvalidFeatures(e.to_string()))?;
        self.predict(&features)
    }

    /// Predict several encoded rows at once.
    pub fn predict_batch(&self, rows: &[Vec<f64>]) -> Result<Vec<Prediction>> {
        let width = self.feature_names.len();
        for (i, row) in rows.iter().enumerate() {
            if row.len() != width {
                return Err(LearningError::InvalidFeatures(format!(
                    "row {i} has {} values, expected {width} ({})",
                    row.len(),
                    self.feature_names.join(", ")
                )));
            }
            if let Some(v) = row.iter().find(|v| !v.is_finite()) {
                return Err(LearningError::InvalidFeatures(format!(
                    "row {i} contains a non-finite value ({v})"
                )));
            }
        }
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let x = ndarray::Array2::from_shape_vec((rows.len(), width), rows.concat())
            .map_err(|e| LearningError::InvalidFeatures(e.to_string()))?;
        let values = self.model.predict(&x)?;
        let proba = self.model.predict_proba(&x)?;
        let classes = self.model.classes().unwrap_or_default();

        Ok(values
            .iter()
            .enumerate()
            .map(|(i, &value)| {
                if !self.task.is_classification() {
                    return Prediction {
                        value,
                        label: None,
                        probabilities: None,
                        confidence: None,
                    };
                }
                let probabilities = proba.as_ref().map(|p| {
                    classes
                        .iter()
                        .zip(p.row(i))
                        .map(|(c, prob)| (class_name(&self.target_encoding, *c), *prob))
                        .collect::<Vec<_>>()
                });
                let confidence = proba.as_ref().and_then(|p| {
                    classes
                        .iter()
                        .position(|c| *c == value)
                        .map(|k| p[[i, k]])
                });
                Prediction {
                    value,
                    label: self.target_encoding.decode(value).map(str::to_string),
                    probabilities,
                    confidence,
                }
            })
            .collect())
    }
}
