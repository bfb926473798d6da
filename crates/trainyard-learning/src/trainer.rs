//! The Trainer/Tuner: bounded hyperparameter search per algorithm family.
//!
//! Every family searches a fixed space (the constants below), scores each
//! candidate on the test partition (accuracy or R²) and keeps the first
//! candidate with the highest score. Ridge is the exception: its alpha is
//! chosen by K-fold cross-validation on the train partition.
//!
//! A candidate that fails to fit, or whose score is not finite, is skipped
//! and recorded in [`CandidateModel::evaluated`]. Only a search in which
//! nothing succeeds is an error, except for the random forest, which falls
//! back to a default fit.

use ndarray::{Array1, Array2, Axis};
use rayon::prelude::*;
use serde_json::json;
use std::ops::RangeInclusive;
use tracing::{debug, info, warn};
use trainyard_processing::PreparedData;

use crate::config::{
    Algorithm, DEFAULT_CV_FOLDS, DEFAULT_MAX_POLYNOMIAL_FEATURES, HyperparameterOverrides,
    PipelineConfig,
};
use crate::error::{LearningError, Result};
use crate::estimators::{
    DecisionTreeClassifier, FittedModel, ForestParams, KNearestNeighbors, LinearRegression,
    PolynomialRegression, RandomForestClassifier, RidgeRegression, TreeParams, expanded_width,
};
use crate::metrics::{regression, selection_score};
use crate::types::{CandidateModel, CandidateSummary, Hyperparameters};

/// Decision tree `max_depth` values searched.
pub const DECISION_TREE_MAX_DEPTHS: RangeInclusive<usize> = 1..=10;

/// KNN `n_neighbors` values searched.
pub const KNN_NEIGHBORS: RangeInclusive<usize> = 1..=24;

/// Random forest grid: the cross product of these four lists (216 candidates).
pub const FOREST_N_ESTIMATORS: [usize; 3] = [50, 100, 200];
pub const FOREST_MAX_DEPTHS: [Option<usize>; 4] = [None, Some(5), Some(10), Some(15)];
pub const FOREST_MIN_SAMPLES_SPLIT: [usize; 3] = [2, 5, 10];
pub const FOREST_MIN_SAMPLES_LEAF: [usize; 3] = [1, 2, 4];

/// Polynomial degrees searched.
pub const POLYNOMIAL_DEGREES: RangeInclusive<usize> = 1..=9;

/// Ridge alphas searched by cross-validation.
pub const RIDGE_ALPHAS: [f64; 6] = [0.01, 0.1, 1.0, 10.0, 100.0, 1000.0];

/// Alpha used when the cross-validated search cannot run.
pub const RIDGE_FALLBACK_ALPHA: f64 = 1.0;

/// Knobs the trainer takes from the pipeline configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrainOptions {
    /// Seeds every randomized estimator.
    pub seed: u64,
    /// Folds for the ridge alpha search.
    pub cv_folds: usize,
    /// Widest polynomial expansion attempted.
    pub max_polynomial_features: usize,
}

impl Default for TrainOptions {
    fn default() -> Self {
        Self {
            seed: 42,
            cv_folds: DEFAULT_CV_FOLDS as usize,
            max_polynomial_features: DEFAULT_MAX_POLYNOMIAL_FEATURES,
        }
    }
}

impl From<&PipelineConfig> for TrainOptions {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            seed: config.seed(),
            cv_folds: config.cv_folds as usize,
            max_polynomial_features: config.max_polynomial_features,
        }
    }
}

/// One point of a search space.
#[derive(Debug, Clone, Copy, PartialEq)]
enum CandidateSpec {
    Tree { max_depth: usize },
    Knn { k: usize },
    Forest(ForestParams),
    Polynomial { degree: usize },
}

impl CandidateSpec {
    fn hyperparameters(&self) -> Hyperparameters {
        let mut map = Hyperparameters::new();
        match self {
            CandidateSpec::Tree { max_depth } => {
                map.insert("max_depth".into(), json!(max_depth));
            }
            CandidateSpec::Knn { k } => {
                map.insert("n_neighbors".into(), json!(k));
            }
            CandidateSpec::Forest(p) => {
                map.extend(forest_hyperparameters(p));
            }
            CandidateSpec::Polynomial { degree } => {
                map.insert("degree".into(), json!(degree));
            }
        }
        map
    }
}

fn forest_hyperparameters(p: &ForestParams) -> Hyperparameters {
    Hyperparameters::from([
        ("n_estimators".to_string(), json!(p.n_estimators)),
        ("max_depth".to_string(), json!(p.max_depth)),
        ("min_samples_split".to_string(), json!(p.min_samples_split)),
        ("min_samples_leaf".to_string(), json!(p.min_samples_leaf)),
    ])
}

fn forest_grid() -> Vec<CandidateSpec> {
    let mut grid = Vec::with_capacity(216);
    for n_estimators in FOREST_N_ESTIMATORS {
        for max_depth in FOREST_MAX_DEPTHS {
            for min_samples_split in FOREST_MIN_SAMPLES_SPLIT {
                for min_samples_leaf in FOREST_MIN_SAMPLES_LEAF {
                    grid.push(CandidateSpec::Forest(ForestParams {
                        n_estimators,
                        max_depth,
                        min_samples_split,
                        min_samples_leaf,
                    }));
                }
            }
        }
    }
    grid
}

/// Contiguous, unshuffled K-fold test blocks. The first `n % k` folds get
/// one extra row.
fn k_fold(n: usize, k: usize) -> Result<Vec<Vec<usize>>> {
    if k < 2 {
        return Err(LearningError::InvalidConfig(
            "cv_folds must be at least 2".to_string(),
        ));
    }
    if n < k {
        return Err(LearningError::TuningFailed(format!(
            "cannot split {n} training rows into {k} folds"
        )));
    }
    let mut folds = Vec::with_capacity(k);
    let mut start = 0;
    for i in 0..k {
        let size = n / k + usize::from(i < n % k);
        folds.push((start..start + size).collect());
        start += size;
    }
    Ok(folds)
}

/// Runs hyperparameter searches.
#[derive(Debug, Clone, Default)]
pub struct Trainer {
    options: TrainOptions,
}

impl Trainer {
    pub fn new(options: TrainOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &TrainOptions {
        &self.options
    }

    /// Search the algorithm's space on `data` and return the best candidate.
    ///
    /// # Errors
    ///
    /// - [`LearningError::AlgorithmTaskMismatch`] if the algorithm does not fit the task
    /// - [`LearningError::InvalidAlphaFormat`] / [`LearningError::InvalidAlphaValue`]
    ///   for a bad ridge alpha override, before anything is fitted
    /// - [`LearningError::TuningFailed`] if no candidate could be fitted and scored
    /// - [`LearningError::TrainingFailed`] if a single required fit fails
    pub fn train(
        &self,
        data: &PreparedData,
        algorithm: Algorithm,
        overrides: Option<&HyperparameterOverrides>,
    ) -> Result<CandidateModel> {
        if algorithm.task_kind() != data.task.kind() {
            return Err(LearningError::AlgorithmTaskMismatch {
                algorithm: algorithm.as_str().to_string(),
                task: data.task.describe().to_string(),
            });
        }

        let alpha = match algorithm {
            Algorithm::RidgeRegression => overrides.map(|o| o.parsed_alpha()).transpose()?.flatten(),
            _ => None,
        };

        info!(
            "Training {} on {} rows ({} train / {} test)",
            algorithm.display_name(),
            data.n_rows(),
            data.train_indices.len(),
            data.test_indices.len()
        );

        let x_train = data.x_train();
        let y_train = data.y_train();

        match algorithm {
            Algorithm::DecisionTree => {
                let grid = DECISION_TREE_MAX_DEPTHS
                    .map(|max_depth| CandidateSpec::Tree { max_depth })
                    .collect();
                self.search(algorithm, grid, &x_train, &y_train, data, false)
            }
            Algorithm::KNearestNeighbors => {
                let grid = KNN_NEIGHBORS.map(|k| CandidateSpec::Knn { k }).collect();
                self.search(algorithm, grid, &x_train, &y_train, data, false)
            }
            Algorithm::RandomForest => self.train_forest(&x_train, &y_train, data),
            Algorithm::PolynomialRegression => {
                let grid = POLYNOMIAL_DEGREES
                    .map(|degree| CandidateSpec::Polynomial { degree })
                    .collect();
                self.search(algorithm, grid, &x_train, &y_train, data, false)
            }
            Algorithm::LinearRegression => self.train_linear(&x_train, &y_train, data),
            Algorithm::RidgeRegression => self.train_ridge(&x_train, &y_train, data, alpha),
        }
    }

    fn fit(&self, spec: &CandidateSpec, x: &Array2<f64>, y: &Array1<f64>) -> Result<FittedModel> {
        Ok(match *spec {
            CandidateSpec::Tree { max_depth } => {
                let params = TreeParams {
                    max_depth: Some(max_depth),
                    ..TreeParams::default()
                };
                FittedModel::DecisionTree(DecisionTreeClassifier::fit(x, y, params, self.options.seed)?)
            }
            CandidateSpec::Knn { k } => FittedModel::KNearestNeighbors(KNearestNeighbors::fit(x, y, k)?),
            CandidateSpec::Forest(params) => {
                FittedModel::RandomForest(RandomForestClassifier::fit(x, y, params, self.options.seed)?)
            }
            CandidateSpec::Polynomial { degree } => FittedModel::PolynomialRegression(
                PolynomialRegression::fit(x, y, degree, self.options.max_polynomial_features)?,
            ),
        })
    }

    /// Polynomial degrees whose expansion exceeds the width cap are not fitted.
    fn skip_reason(&self, spec: &CandidateSpec, n_features: usize) -> Option<String> {
        let CandidateSpec::Polynomial { degree } = *spec else {
            return None;
        };
        let width = expanded_width(n_features, degree).unwrap_or(usize::MAX);
        (width > self.options.max_polynomial_features).then(|| {
            format!(
                "Skipped polynomial degree {degree}: {width} expanded features exceed the limit of {}",
                self.options.max_polynomial_features
            )
        })
    }

    fn fit_and_score(
        &self,
        spec: &CandidateSpec,
        x: &Array2<f64>,
        y: &Array1<f64>,
        data: &PreparedData,
    ) -> Result<f64> {
        let model = self.fit(spec, x, y)?;
        let score = selection_score(&model, data)?;
        if !score.is_finite() {
            return Err(LearningError::Metrics(format!("score {score} is not finite")));
        }
        Ok(score)
    }

    /// Score every candidate, then refit the winner.
    ///
    /// Scores are collected in grid order whether or not the grid runs in
    /// parallel, so the winner does not depend on scheduling.
    fn search(
        &self,
        algorithm: Algorithm,
        grid: Vec<CandidateSpec>,
        x: &Array2<f64>,
        y: &Array1<f64>,
        data: &PreparedData,
        parallel: bool,
    ) -> Result<CandidateModel> {
        let mut warnings = Vec::new();
        let planned: Vec<(CandidateSpec, Option<String>)> = grid
            .into_iter()
            .map(|spec| {
                let skip = self.skip_reason(&spec, x.ncols());
                if let Some(message) = &skip {
                    warn!("{}", message);
                    warnings.push(message.clone());
                }
                (spec, skip)
            })
            .collect();

        let attempt = |(spec, skip): &(CandidateSpec, Option<String>)| {
            let outcome = match skip {
                Some(message) => Err(LearningError::TrainingFailed(message.clone())),
                None => self.fit_and_score(spec, x, y, data),
            };
            (*spec, outcome)
        };
        let attempts: Vec<(CandidateSpec, Result<f64>)> = if parallel {
            planned.par_iter().map(attempt).collect()
        } else {
            planned.iter().map(attempt).collect()
        };

        let mut best: Option<(CandidateSpec, f64)> = None;
        let mut evaluated = Vec::with_capacity(attempts.len());
        for (spec, outcome) in attempts {
            let hyperparameters = spec.hyperparameters();
            match outcome {
                Ok(score) => {
                    debug!("{} {:?} scored {:.4}", algorithm, hyperparameters, score);
                    if best.is_none_or(|(_, best_score)| score > best_score) {
                        best = Some((spec, score));
                    }
                    evaluated.push(CandidateSummary {
                        hyperparameters,
                        score: Some(score),
                        error: None,
                    });
                }
                Err(e) => {
                    debug!("{} {:?} skipped: {}", algorithm, hyperparameters, e);
                    evaluated.push(CandidateSummary {
                        hyperparameters,
                        score: None,
                        error: Some(e.to_string()),
                    });
                }
            }
        }

        let skipped = evaluated.iter().filter(|c| c.error.is_some()).count();
        if skipped > 0 {
            warn!("{} of {} {} candidates were skipped", skipped, evaluated.len(), algorithm);
        }

        let Some((spec, score)) = best else {
            return Err(LearningError::TuningFailed(format!(
                "none of the {} {} candidates could be fitted and scored",
                evaluated.len(),
                algorithm
            )));
        };

        let model = self.fit(&spec, x, y)?;
        info!(
            "Selected {} {:?} with score {:.4}",
            algorithm,
            spec.hyperparameters(),
            score
        );
        Ok(CandidateModel {
            algorithm,
            model,
            hyperparameters: spec.hyperparameters(),
            score: Some(score),
            evaluated,
            warnings,
        })
    }

    fn train_forest(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        data: &PreparedData,
    ) -> Result<CandidateModel> {
        let algorithm = Algorithm::RandomForest;
        match self.search(algorithm, forest_grid(), x, y, data, true) {
            Ok(candidate) => Ok(candidate),
            Err(LearningError::TuningFailed(reason)) => {
                let message = format!(
                    "Random forest grid search failed ({reason}); falling back to default hyperparameters"
                );
                warn!("{}", message);

                let params = ForestParams::default();
                let forest = RandomForestClassifier::fit(x, y, params, self.options.seed)?;
                let model = FittedModel::RandomForest(forest);
                let score = selection_score(&model, data).ok().filter(|s| s.is_finite());

                let hyperparameters = forest_hyperparameters(&params);
                Ok(CandidateModel {
                    algorithm,
                    model,
                    hyperparameters: hyperparameters.clone(),
                    score,
                    evaluated: vec![CandidateSummary {
                        hyperparameters,
                        score,
                        error: None,
                    }],
                    warnings: vec![message],
                })
            }
            Err(e) => Err(e),
        }
    }

    fn train_linear(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        data: &PreparedData,
    ) -> Result<CandidateModel> {
        let model = FittedModel::LinearRegression(LinearRegression::fit(x, y)?);
        let mut warnings = Vec::new();
        let score = match selection_score(&model, data) {
            Ok(s) if s.is_finite() => Some(s),
            Ok(s) => {
                warnings.push(format!("Test R² is not finite ({s})"));
                None
            }
            Err(e) => {
                warnings.push(format!("Test score unavailable: {e}"));
                None
            }
        };
        Ok(CandidateModel {
            algorithm: Algorithm::LinearRegression,
            model,
            hyperparameters: Hyperparameters::new(),
            score,
            evaluated: vec![CandidateSummary {
                hyperparameters: Hyperparameters::new(),
                score,
                error: None,
            }],
            warnings,
        })
    }

    /// Mean R² over unshuffled folds of the train partition.
    fn ridge_cv_score(&self, x: &Array2<f64>, y: &Array1<f64>, alpha: f64) -> Result<f64> {
        let folds = k_fold(x.nrows(), self.options.cv_folds)?;
        let mut total = 0.0;
        for test in &folds {
            let train: Vec<usize> = (0..x.nrows()).filter(|i| test.binary_search(i).is_err()).collect();
            let model = RidgeRegression::fit(&x.select(Axis(0), &train), &y.select(Axis(0), &train), alpha)?;
            let predicted = model.predict(&x.select(Axis(0), test));
            total += regression::r2_score(&y.select(Axis(0), test), &predicted)?;
        }
        let mean = total / folds.len() as f64;
        if !mean.is_finite() {
            return Err(LearningError::Metrics(format!("mean fold R² {mean} is not finite")));
        }
        Ok(mean)
    }

    fn ridge_search(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<(f64, Vec<CandidateSummary>)> {
        // Fold layout problems affect every alpha alike.
        k_fold(x.nrows(), self.options.cv_folds)?;

        let mut best: Option<(f64, f64)> = None;
        let mut evaluated = Vec::with_capacity(RIDGE_ALPHAS.len());
        for alpha in RIDGE_ALPHAS {
            let hyperparameters = Hyperparameters::from([("alpha".to_string(), json!(alpha))]);
            match self.ridge_cv_score(x, y, alpha) {
                Ok(score) => {
                    debug!("ridge alpha={} mean CV R² {:.4}", alpha, score);
                    if best.is_none_or(|(_, best_score)| score > best_score) {
                        best = Some((alpha, score));
                    }
                    evaluated.push(CandidateSummary {
                        hyperparameters,
                        score: Some(score),
                        error: None,
                    });
                }
                Err(e) => evaluated.push(CandidateSummary {
                    hyperparameters,
                    score: None,
                    error: Some(e.to_string()),
                }),
            }
        }

        let (alpha, _) = best.ok_or_else(|| {
            LearningError::TuningFailed("no ridge alpha produced a finite CV score".to_string())
        })?;
        Ok((alpha, evaluated))
    }

    fn train_ridge(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        data: &PreparedData,
        alpha_override: Option<f64>,
    ) -> Result<CandidateModel> {
        let mut warnings = Vec::new();
        let mut evaluated = Vec::new();

        let alpha = match alpha_override {
            Some(alpha) => {
                info!("Using caller-supplied ridge alpha {}", alpha);
                alpha
            }
            None => match self.ridge_search(x, y) {
                Ok((alpha, summaries)) => {
                    evaluated = summaries;
                    info!("Selected ridge alpha {} by {}-fold CV", alpha, self.options.cv_folds);
                    alpha
                }
                Err(e) => {
                    let message = format!(
                        "Ridge alpha search failed ({e}); using alpha = {RIDGE_FALLBACK_ALPHA}"
                    );
                    warn!("{}", message);
                    warnings.push(message);
                    RIDGE_FALLBACK_ALPHA
                }
            },
        };

        let model = FittedModel::RidgeRegression(RidgeRegression::fit(x, y, alpha)?);
        let score = selection_score(&model, data).ok().filter(|s| s.is_finite());
        let hyperparameters = Hyperparameters::from([("alpha".to_string(), json!(alpha))]);
        if evaluated.is_empty() {
            evaluated.push(CandidateSummary {
                hyperparameters: hyperparameters.clone(),
                score,
                error: None,
            });
        }

        Ok(CandidateModel {
            algorithm: Algorithm::RidgeRegression,
            model,
            hyperparameters,
            score,
            evaluated,
            warnings,
        })
    }
}

/// Train with default options (seed 42, 5 folds).
///
/// See [`Trainer::train`].
pub fn train(
    data: &PreparedData,
    algorithm: Algorithm,
    overrides: Option<&HyperparameterOverrides>,
) -> Result<CandidateModel> {
    Trainer::default().train(data, algorithm, overrides)
}
