//! Human-readable run summary.
//!
//! [`ModelReport`] gathers the model metadata, the metrics with a short
//! plain-language reading of each, the chart captions and the warnings of
//! a [`PipelineResult`]. It is exported as JSON (`--emit-report`) or
//! Markdown.

use chrono::Local;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::{LearningError, Result};
use crate::types::{Hyperparameters, LinearCoefficients, MetricsReport, PipelineResult};

// ============================================================================
// Interpretations
// ============================================================================

pub fn interpret_r2(r2: f64) -> &'static str {
    if r2 >= 0.9 {
        "Excellent fit"
    } else if r2 >= 0.7 {
        "Good fit"
    } else if r2 >= 0.5 {
        "Moderate fit"
    } else {
        "Poor fit"
    }
}

pub fn interpret_accuracy(accuracy: f64) -> &'static str {
    if accuracy >= 0.9 {
        "Excellent performance"
    } else if accuracy >= 0.8 {
        "Good performance"
    } else if accuracy >= 0.7 {
        "Fair performance"
    } else {
        "Needs improvement"
    }
}

pub fn interpret_f1(f1: f64) -> &'static str {
    if f1 >= 0.8 {
        "Well balanced precision/recall"
    } else if f1 >= 0.6 {
        "Reasonably balanced"
    } else {
        "Imbalanced"
    }
}

// ============================================================================
// Report Types
// ============================================================================

/// One metric with its reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricLine {
    pub name: String,
    pub value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interpretation: Option<String>,
}

/// Caption of a rendered chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartCaption {
    pub title: String,
    pub description: String,
    pub file_name: String,
}

/// Summary of a completed run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelReport {
    /// Local time the report was assembled.
    pub generated_at: String,
    pub run_id: String,
    pub model_name: String,
    /// Display name, e.g. "Random Forest".
    pub algorithm: String,
    /// e.g. "binary classification".
    pub task: String,
    pub target_column: String,
    pub features: Vec<String>,
    pub hyperparameters: Hyperparameters,
    pub metrics: Vec<MetricLine>,
    pub charts: Vec<ChartCaption>,
    pub coefficients: Option<LinearCoefficients>,
    pub feature_importances: Vec<(String, f64)>,
    pub candidates_evaluated: usize,
    pub candidates_failed: usize,
    pub warnings: Vec<String>,
    pub duration_ms: u64,
}

fn metric_lines(metrics: &MetricsReport) -> Vec<MetricLine> {
    let line = |name: &str, value: f64, reading: Option<&str>| MetricLine {
        name: name.to_string(),
        value,
        interpretation: reading.map(str::to_string),
    };
    match metrics {
        MetricsReport::Classification(m) => {
            let mut lines = vec![
                line("accuracy", m.accuracy, Some(interpret_accuracy(m.accuracy))),
                line("precision", m.precision, None),
                line("recall", m.recall, None),
                line("f1", m.f1, Some(interpret_f1(m.f1))),
            ];
            if let Some(auc) = m.roc_auc {
                lines.push(line("roc_auc", auc, None));
            }
            lines
        }
        MetricsReport::Regression(m) => vec![
            line("r2", m.r2, Some(interpret_r2(m.r2))),
            line("mse", m.mse, None),
            line("rmse", m.rmse, None),
            line("mae", m.mae, None),
        ],
    }
}

impl ModelReport {
    pub fn from_result(result: &PipelineResult) -> Self {
        let artifact = &result.model_artifact;
        Self {
            generated_at: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            run_id: result.run_id.clone(),
            model_name: artifact.model_name.clone(),
            algorithm: artifact.algorithm.display_name().to_string(),
            task: artifact.task.describe().to_string(),
            target_column: artifact.target_column.clone(),
            features: artifact.feature_names.clone(),
            hyperparameters: artifact.hyperparameters.clone(),
            metrics: result.metrics.as_ref().map(metric_lines).unwrap_or_default(),
            charts: result
                .images
                .iter()
                .map(|image| ChartCaption {
                    title: image.title.clone(),
                    description: image.description.clone(),
                    file_name: image.file_name.clone(),
                })
                .collect(),
            coefficients: result.coefficients.clone(),
            feature_importances: result.feature_importances.clone(),
            candidates_evaluated: result.candidates.len(),
            candidates_failed: result.candidates.iter().filter(|c| c.error.is_some()).count(),
            warnings: result.warnings.clone(),
            duration_ms: result.duration_ms,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| LearningError::ModelSave(format!("report serialization failed: {e}")))
    }

    pub fn to_markdown(&self) -> String {
        let mut md = String::new();
        // Writing to a String cannot fail.
        let _ = writeln!(md, "# Model Report: {}\n", self.model_name);
        let _ = writeln!(md, "- **Run:** {}", self.run_id);
        let _ = writeln!(md, "- **Generated:** {}", self.generated_at);
        let _ = writeln!(md, "- **Algorithm:** {}", self.algorithm);
        let _ = writeln!(md, "- **Task:** {}", self.task);
        let _ = writeln!(md, "- **Target:** {}", self.target_column);
        let _ = writeln!(md, "- **Features:** {}", self.features.join(", "));
        let _ = writeln!(md, "- **Duration:** {} ms\n", self.duration_ms);

        if !self.hyperparameters.is_empty() {
            let _ = writeln!(md, "## Hyperparameters\n");
            for (name, value) in &self.hyperparameters {
                let _ = writeln!(md, "- `{name}` = {value}");
            }
            let _ = writeln!(md);
        }

        let _ = writeln!(md, "## Metrics\n");
        if self.metrics.is_empty() {
            let _ = writeln!(md, "Metrics could not be computed for this run.\n");
        } else {
            let _ = writeln!(md, "| Metric | Value | Interpretation |");
            let _ = writeln!(md, "|--------|-------|----------------|");
            for m in &self.metrics {
                let _ = writeln!(
                    md,
                    "| {} | {:.4} | {} |",
                    m.name,
                    m.value,
                    m.interpretation.as_deref().unwrap_or("")
                );
            }
            let _ = writeln!(md);
        }

        if let Some(coefficients) = &self.coefficients {
            let _ = writeln!(md, "## Coefficients\n");
            let _ = writeln!(md, "Intercept: {:.6}\n", coefficients.intercept);
            if coefficients.standardized {
                let _ = writeln!(md, "Terms refer to standardized features.\n");
            }
            for (term, value) in &coefficients.terms {
                let _ = writeln!(md, "- `{term}`: {value:.6}");
            }
            let _ = writeln!(md);
        }

        if !self.feature_importances.is_empty() {
            let _ = writeln!(md, "## Feature Importance\n");
            for (feature, value) in &self.feature_importances {
                let _ = writeln!(md, "- {feature}: {value:.4}");
            }
            let _ = writeln!(md);
        }

        if !self.charts.is_empty() {
            let _ = writeln!(md, "## Charts\n");
            for chart in &self.charts {
                let _ = writeln!(md, "- **{}** ({}): {}", chart.title, chart.file_name, chart.description);
            }
            let _ = writeln!(md);
        }

        let _ = writeln!(
            md,
            "## Search\n\n{} candidates evaluated, {} failed.\n",
            self.candidates_evaluated, self.candidates_failed
        );

        if !self.warnings.is_empty() {
            let _ = writeln!(md, "## Warnings\n");
            for w in &self.warnings {
                let _ = writeln!(md, "- {w}");
            }
        }
        md
    }

    /// Write `report_{run_id}.json` into `dir`, creating it if needed.
    pub fn write_json(&self, dir: impl AsRef<Path>) -> Result<PathBuf> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        let path = dir.join(format!("report_{}.json", self.run_id));
        std::fs::write(&path, self.to_json()?)?;
        info!("Report saved: {}", path.display());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interpretation_bands() {
        assert_eq!(interpret_r2(0.95), "Excellent fit");
        assert_eq!(interpret_r2(0.7), "Good fit");
        assert_eq!(interpret_r2(0.55), "Moderate fit");
        assert_eq!(interpret_r2(-3.0), "Poor fit");

        assert_eq!(interpret_accuracy(0.9), "Excellent performance");
        assert_eq!(interpret_accuracy(0.85), "Good performance");
        assert_eq!(interpret_accuracy(0.7), "Fair performance");
        assert_eq!(interpret_accuracy(0.1), "Needs improvement");

        assert_eq!(interpret_f1(0.8), "Well balanced precision/recall");
        assert_eq!(interpret_f1(0.6), "Reasonably balanced");
        assert_eq!(interpret_f1(0.59), "Imbalanced");
    }

    #[test]
    fn test_regression_metric_lines() {
        let lines = metric_lines(&MetricsReport::Regression(crate::types::RegressionMetrics {
            r2: 0.75,
            mse: 4.0,
            rmse: 2.0,
            mae: 1.5,
        }));
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0].interpretation.as_deref(), Some("Good fit"));
        assert_eq!(lines[2].name, "rmse");
    }
}
