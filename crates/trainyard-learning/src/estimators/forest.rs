//! Random forest classifier: bootstrapped CART trees with √p features per split.

use ndarray::{Array1, Array2};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::tree::{
    DecisionTreeClassifier, MaxFeatures, TreeParams, argmax_classes, class_indices, class_list,
};
use crate::error::{LearningError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForestParams {
    pub n_estimators: usize,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
        }
    }
}

/// A fitted random forest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForestClassifier {
    params: ForestParams,
    classes: Vec<f64>,
    n_features: usize,
    trees: Vec<DecisionTreeClassifier>,
    importances: Vec<f64>,
}

impl RandomForestClassifier {
    /// Fit `params.n_estimators` trees. Tree `t` draws its bootstrap sample
    /// and its feature subsets from `seed + t`.
    pub fn fit(x: &Array2<f64>, y: &Array1<f64>, params: ForestParams, seed: u64) -> Result<Self> {
        let n_samples = x.nrows();
        if n_samples == 0 {
            return Err(LearningError::TrainingFailed(
                "cannot fit a forest on zero rows".to_string(),
            ));
        }
        if params.n_estimators == 0 {
            return Err(LearningError::TrainingFailed(
                "n_estimators must be at least 1".to_string(),
            ));
        }
        if n_samples != y.len() {
            return Err(LearningError::TrainingFailed(format!(
                "feature matrix has {n_samples} rows but target has {}",
                y.len()
            )));
        }

        let classes = class_list(y);
        let labels = class_indices(y, &classes)?;
        let tree_params = TreeParams {
            max_depth: params.max_depth,
            min_samples_split: params.min_samples_split,
            min_samples_leaf: params.min_samples_leaf,
            max_features: MaxFeatures::Sqrt,
        };

        let trees = (0..params.n_estimators)
            .into_par_iter()
            .map(|t| {
                let mut rng = ChaCha8Rng::seed_from_u64(seed.wrapping_add(t as u64));
                let bootstrap: Vec<usize> = (0..n_samples)
                    .map(|_| rng.gen_range(0..n_samples))
                    .collect();
                DecisionTreeClassifier::fit_rows(
                    x,
                    &labels,
                    classes.clone(),
                    bootstrap,
                    tree_params,
                    &mut rng,
                )
            })
            .collect::<Result<Vec<_>>>()?;

        let n_features = x.ncols();
        let mut importances = vec![0.0; n_features];
        for tree in &trees {
            for (total, v) in importances.iter_mut().zip(tree.feature_importances()) {
                *total += v;
            }
        }
        let sum: f64 = importances.iter().sum();
        if sum > 0.0 {
            importances.iter_mut().for_each(|v| *v /= sum);
        }

        Ok(Self {
            params,
            classes,
            n_features,
            trees,
            importances,
        })
    }

    pub fn params(&self) -> &ForestParams {
        &self.params
    }

    pub fn classes(&self) -> &[f64] {
        &self.classes
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Mean impurity decrease across trees, normalized to sum to 1.
    pub fn feature_importances(&self) -> &[f64] {
        &self.importances
    }

    /// Average of the trees' leaf distributions.
    pub fn predict_proba(&self, x: &Array2<f64>) -> Array2<f64> {
        let mut proba = Array2::zeros((x.nrows(), self.classes.len()));
        for tree in &self.trees {
            proba += &tree.predict_proba(x);
        }
        proba / self.trees.len() as f64
    }

    pub fn predict(&self, x: &Array2<f64>) -> Array1<f64> {
        argmax_classes(&self.predict_proba(x), &self.classes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array;

    fn blobs() -> (Array2<f64>, Array1<f64>) {
        let n = 40;
        let x = Array::from_shape_fn((n, 3), |(i, j)| {
            let base = if i < n / 2 { 0.0 } else { 10.0 };
            base + ((i * 7 + j * 3) % 5) as f64 * 0.3
        });
        let y = Array::from_shape_fn(n, |i| if i < n / 2 { 0.0 } else { 1.0 });
        (x, y)
    }

    #[test]
    fn test_forest_fits_and_is_deterministic() {
        let (x, y) = blobs();
        let params = ForestParams {
            n_estimators: 10,
            ..ForestParams::default()
        };
        let a = RandomForestClassifier::fit(&x, &y, params, 42).unwrap();
        let b = RandomForestClassifier::fit(&x, &y, params, 42).unwrap();

        assert_eq!(a.n_trees(), 10);
        assert_eq!(a.predict(&x), y);
        assert_eq!(a.predict_proba(&x), b.predict_proba(&x));
        assert_eq!(a.feature_importances(), b.feature_importances());
    }

    #[test]
    fn test_importances_normalized() {
        let (x, y) = blobs();
        let forest = RandomForestClassifier::fit(
            &x,
            &y,
            ForestParams {
                n_estimators: 5,
                ..ForestParams::default()
            },
            7,
        )
        .unwrap();
        let sum: f64 = forest.feature_importances().iter().sum();
        assert!((sum - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_single_row_fits_a_stump() {
        let x = Array2::from_elem((1, 2), 1.0);
        let y = Array1::from_elem(1, 1.0);
        let forest = RandomForestClassifier::fit(&x, &y, ForestParams::default(), 42).unwrap();
        assert_eq!(forest.predict(&x)[0], 1.0);
        assert!(RandomForestClassifier::fit(&x.slice(ndarray::s![..0, ..]).to_owned(), &Array1::zeros(0), ForestParams::default(), 42).is_err());
    }
}
