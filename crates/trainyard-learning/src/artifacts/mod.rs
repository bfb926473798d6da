//! The Artifact Producer: a fixed battery of diagnostic charts.
//!
//! Classification runs get a confusion matrix, ROC and precision-recall
//! curves when the model has probability output, and a feature-importance
//! chart for random forests. Regression runs get residual, actual-vs-predicted,
//! error-distribution and Q-Q plots.
//!
//! Each chart is rendered on its own. A chart that fails is logged, recorded
//! as a warning and skipped; the rest are still produced.

mod charts;
mod stats;

pub use charts::ReferenceLine;

use tracing::{debug, info, warn};
use trainyard_processing::{PreparedData, TrainingTask};

use crate::config::{RenderConfig, generate_run_id};
use crate::error::{LearningError, Result};
use crate::metrics::curves::{self, CurveSet, NamedCurve};
use crate::metrics::{TestPredictions, class_name, classification};
use crate::types::{CandidateModel, Capability, DiagnosticImage, DiagnosticKind};

const KDE_POINTS: usize = 200;

/// Charts produced by one render, plus the reasons for any that were skipped.
#[derive(Debug, Clone, Default)]
pub struct RenderOutcome {
    pub images: Vec<DiagnosticImage>,
    pub warnings: Vec<String>,
}

impl RenderOutcome {
    fn record(&mut self, kind: DiagnosticKind, run_id: &str, result: Result<String>) {
        match result {
            Ok(svg) => {
                debug!("Rendered {} ({} bytes)", kind.title(), svg.len());
                self.images.push(DiagnosticImage::svg(kind, run_id, svg));
            }
            Err(e) => {
                warn!("Skipping {}: {}", kind.title(), e);
                self.warnings.push(format!("{} not rendered: {}", kind.title(), e));
            }
        }
    }
}

/// Renders diagnostics with an explicit style and run id.
#[derive(Debug, Clone)]
pub struct DiagnosticRenderer {
    config: RenderConfig,
    run_id: String,
}

impl DiagnosticRenderer {
    pub fn new(config: RenderConfig, run_id: impl Into<String>) -> Self {
        Self {
            config,
            run_id: run_id.into(),
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Render the battery for `task` from the candidate's test predictions.
    pub fn render(
        &self,
        candidate: &CandidateModel,
        data: &PreparedData,
        task: TrainingTask,
    ) -> RenderOutcome {
        let mut outcome = RenderOutcome::default();
        let predictions = match TestPredictions::compute(&candidate.model, data) {
            Ok(p) => p,
            Err(e) => {
                warn!("No diagnostics: {}", e);
                outcome.warnings.push(format!("Diagnostics not rendered: {e}"));
                return outcome;
            }
        };

        if task.is_classification() {
            self.classification(candidate, data, task, &predictions, &mut outcome);
        } else {
            self.regression(&predictions, &mut outcome);
        }

        info!(
            "Rendered {} diagnostic charts ({} skipped)",
            outcome.images.len(),
            outcome.warnings.len()
        );
        outcome
    }

    fn classification(
        &self,
        candidate: &CandidateModel,
        data: &PreparedData,
        task: TrainingTask,
        predictions: &TestPredictions,
        outcome: &mut RenderOutcome,
    ) {
        let encoding = &data.target_encoding;
        let classes = classification::observed_classes(&predictions.y_true, &predictions.y_pred);
        let labels: Vec<String> = classes.iter().map(|c| class_name(encoding, *c)).collect();
        let kind = DiagnosticKind::ConfusionMatrix;
        let cm = classification::confusion_matrix(&predictions.y_true, &predictions.y_pred, &classes)
            .and_then(|matrix| charts::confusion_matrix(kind.title(), &matrix, &labels, &self.config));
        outcome.record(kind, &self.run_id, cm);

        if candidate.capabilities().supports(Capability::SupportsProbability) {
            match probability_curves(data, task, predictions) {
                Ok(set) => {
                    let kind = DiagnosticKind::RocCurve;
                    let roc = charts::curves(
                        kind.title(),
                        "False Positive Rate",
                        "True Positive Rate",
                        &set.roc,
                        true,
                        &self.config,
                    );
                    outcome.record(kind, &self.run_id, roc);

                    let kind = DiagnosticKind::PrecisionRecallCurve;
                    let pr = charts::curves(
                        kind.title(),
                        "Recall",
                        "Precision",
                        &set.pr,
                        false,
                        &self.config,
                    );
                    outcome.record(kind, &self.run_id, pr);
                }
                Err(e) => {
                    let message = e.to_string();
                    for kind in [DiagnosticKind::RocCurve, DiagnosticKind::PrecisionRecallCurve] {
                        let failed = Err(LearningError::Diagnostic {
                            chart: kind.title().to_string(),
                            message: message.clone(),
                        });
                        outcome.record(kind, &self.run_id, failed);
                    }
                }
            }
        }

        if candidate.capabilities().supports(Capability::SupportsFeatureImportance) {
            let kind = DiagnosticKind::FeatureImportance;
            let chart = candidate
                .model
                .feature_importances()
                .ok_or_else(|| LearningError::Diagnostic {
                    chart: kind.title().to_string(),
                    message: "model exposes no importances".to_string(),
                })
                .and_then(|importances| {
                    let pairs: Vec<(String, f64)> = data
                        .feature_names
                        .iter()
                        .cloned()
                        .zip(importances.iter().copied())
                        .collect();
                    charts::feature_importance(kind.title(), &pairs, &self.config)
                });
            outcome.record(kind, &self.run_id, chart);
        }
    }

    fn regression(&self, predictions: &TestPredictions, outcome: &mut RenderOutcome) {
        let actual = predictions.y_true.to_vec();
        let predicted = predictions.y_pred.to_vec();
        let residuals: Vec<f64> = actual.iter().zip(&predicted).map(|(a, p)| a - p).collect();

        let kind = DiagnosticKind::Residuals;
        let points: Vec<(f64, f64)> = predicted.iter().copied().zip(residuals.iter().copied()).collect();
        let chart = charts::scatter(
            kind.title(),
            "Predicted Values",
            "Residuals",
            &points,
            Some(ReferenceLine::Horizontal(0.0)),
            &self.config,
        );
        outcome.record(kind, &self.run_id, chart);

        let kind = DiagnosticKind::ActualVsPredicted;
        let points: Vec<(f64, f64)> = actual.iter().copied().zip(predicted.iter().copied()).collect();
        let chart = charts::scatter(
            kind.title(),
            "Actual Values",
            "Predicted Values",
            &points,
            Some(ReferenceLine::IDENTITY),
            &self.config,
        );
        outcome.record(kind, &self.run_id, chart);

        let kind = DiagnosticKind::ErrorDistribution;
        let chart = stats::histogram(&residuals, self.config.histogram_bins).and_then(|hist| {
            let span = hist.edges[0]..hist.edges[hist.edges.len() - 1];
            let density = match stats::gaussian_kde(&residuals, span, KDE_POINTS) {
                Ok(points) => Some(points),
                Err(e) => {
                    debug!("Density overlay omitted: {}", e);
                    None
                }
            };
            charts::histogram(kind.title(), "Prediction Error", &hist, density.as_deref(), &self.config)
        });
        outcome.record(kind, &self.run_id, chart);

        let kind = DiagnosticKind::QqPlot;
        let chart = stats::normal_quantiles(&residuals).and_then(|points| {
            let reference = stats::fit_line(&points)
                .map(|(slope, intercept)| ReferenceLine::Line { slope, intercept });
            charts::scatter(
                kind.title(),
                "Theoretical Quantiles",
                "Ordered Residuals",
                &points,
                reference,
                &self.config,
            )
        });
        outcome.record(kind, &self.run_id, chart);
    }
}

/// ROC/PR curves: one for the positive class in binary tasks, one-vs-rest
/// plus a micro-average otherwise.
fn probability_curves(
    data: &PreparedData,
    task: TrainingTask,
    predictions: &TestPredictions,
) -> Result<CurveSet> {
    let proba = predictions.proba.as_ref().ok_or_else(|| {
        LearningError::Metrics("model returned no probabilities".to_string())
    })?;

    if task.is_binary() {
        let positive = data
            .classes()
            .last()
            .copied()
            .ok_or_else(|| LearningError::Metrics("no classes in the target".to_string()))?;
        let (truth, scores) = predictions.binary_view(positive).ok_or_else(|| {
            LearningError::Metrics(format!("class {positive} was not seen during training"))
        })?;
        let name = class_name(&data.target_encoding, positive);
        return Ok(CurveSet {
            roc: vec![NamedCurve {
                name: name.clone(),
                curve: curves::roc_curve(&truth, &scores)?,
            }],
            pr: vec![NamedCurve {
                name,
                curve: curves::precision_recall_curve(&truth, &scores)?,
            }],
        });
    }

    let names: Vec<String> = predictions
        .classes
        .iter()
        .map(|c| class_name(&data.target_encoding, *c))
        .collect();
    let y_true = predictions.y_true.to_vec();
    curves::one_vs_rest(&y_true, proba, &predictions.classes, &names)
}

/// Render the diagnostic battery with the default style and a generated run id.
///
/// See [`DiagnosticRenderer`] to choose the style and the run id.
pub fn render_diagnostics(
    candidate: &CandidateModel,
    data: &PreparedData,
    task: TrainingTask,
) -> Vec<DiagnosticImage> {
    let renderer = DiagnosticRenderer::new(
        RenderConfig::default(),
        generate_run_id(candidate.algorithm.as_str()),
    );
    renderer.render(candidate, data, task).images
}
