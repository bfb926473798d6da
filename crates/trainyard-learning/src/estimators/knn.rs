//! K-nearest-neighbours classifier.

use ndarray::{Array1, Array2, ArrayView1};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::tree::{argmax_classes, class_indices, class_list};
use crate::error::{LearningError, Result};

/// A fitted KNN classifier: Euclidean distance, uniform vote.
///
/// Equal distances are broken by training row order, so the earlier row
/// counts as nearer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KNearestNeighbors {
    k: usize,
    classes: Vec<f64>,
    x_train: Array2<f64>,
    labels: Vec<usize>,
}

fn squared_distance(a: ArrayView1<'_, f64>, b: ArrayView1<'_, f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum()
}

impl KNearestNeighbors {
    /// Store the training rows.
    ///
    /// # Errors
    ///
    /// [`LearningError::TrainingFailed`] if `k` is 0 or larger than the
    /// number of training rows.
    pub fn fit(x: &Array2<f64>, y: &Array1<f64>, k: usize) -> Result<Self> {
        if k == 0 {
            return Err(LearningError::TrainingFailed(
                "n_neighbors must be at least 1".to_string(),
            ));
        }
        if k > x.nrows() {
            return Err(LearningError::TrainingFailed(format!(
                "n_neighbors = {k} exceeds the {} training rows",
                x.nrows()
            )));
        }
        let classes = class_list(y);
        let labels = class_indices(y, &classes)?;
        Ok(Self {
            k,
            classes,
            x_train: x.to_owned(),
            labels,
        })
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub fn classes(&self) -> &[f64] {
        &self.classes
    }

    pub fn n_features(&self) -> usize {
        self.x_train.ncols()
    }

    fn vote(&self, sample: ArrayView1<'_, f64>) -> Vec<f64> {
        let mut neighbours: Vec<(f64, usize)> = self
            .x_train
            .rows()
            .into_iter()
            .enumerate()
            .map(|(i, row)| (squared_distance(sample, row), i))
            .collect();
        neighbours.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

        let mut votes = vec![0.0; self.classes.len()];
        for &(_, i) in neighbours.iter().take(self.k) {
            votes[self.labels[i]] += 1.0;
        }
        votes.iter_mut().for_each(|v| *v /= self.k as f64);
        votes
    }

    /// Fraction of the `k` neighbours in each class.
    pub fn predict_proba(&self, x: &Array2<f64>) -> Array2<f64> {
        let rows: Vec<Vec<f64>> = (0..x.nrows())
            .into_par_iter()
            .map(|i| self.vote(x.row(i)))
            .collect();

        let mut proba = Array2::zeros((x.nrows(), self.classes.len()));
        for (i, row) in rows.into_iter().enumerate() {
            for (j, p) in row.into_iter().enumerate() {
                proba[[i, j]] = p;
            }
        }
        proba
    }

    pub fn predict(&self, x: &Array2<f64>) -> Array1<f64> {
        argmax_classes(&self.predict_proba(x), &self.classes)
    }
}
