//! CART classification tree with gini impurity.

use ndarray::{Array1, Array2};
use rand::seq::index::sample;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::error::{LearningError, Result};

/// How many features each split considers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaxFeatures {
    #[default]
    All,
    /// `max(1, floor(sqrt(n_features)))`, drawn afresh at every node.
    Sqrt,
}

impl MaxFeatures {
    fn count(&self, n_features: usize) -> usize {
        match self {
            MaxFeatures::All => n_features,
            MaxFeatures::Sqrt => ((n_features as f64).sqrt().floor() as usize).max(1),
        }
    }
}

/// Growth limits for a tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeParams {
    /// `None` grows until leaves are pure or too small to split.
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub max_features: MaxFeatures,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::All,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
enum TreeNode {
    Leaf {
        /// Class proportions, aligned with the tree's class list.
        distribution: Vec<f64>,
        n_samples: usize,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
        n_samples: usize,
    },
}

/// A fitted decision tree classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTreeClassifier {
    params: TreeParams,
    classes: Vec<f64>,
    n_features: usize,
    root: TreeNode,
    importances: Vec<f64>,
}

/// Sorted distinct class codes of `y`.
pub(crate) fn class_list(y: &Array1<f64>) -> Vec<f64> {
    let mut classes: Vec<f64> = y.iter().copied().collect();
    classes.sort_by(|a, b| a.total_cmp(b));
    classes.dedup();
    classes
}

/// Position of every label in `classes`.
pub(crate) fn class_indices(y: &Array1<f64>, classes: &[f64]) -> Result<Vec<usize>> {
    y.iter()
        .map(|v| {
            classes
                .iter()
                .position(|c| c == v)
                .ok_or_else(|| LearningError::TrainingFailed(format!("unknown class label {v}")))
        })
        .collect()
}

fn gini(counts: &[usize], n: usize) -> f64 {
    if n == 0 {
        return 0.0;
    }
    let n = n as f64;
    1.0 - counts
        .iter()
        .map(|&c| {
            let p = c as f64 / n;
            p * p
        })
        .sum::<f64>()
}

struct Builder<'a> {
    x: &'a Array2<f64>,
    labels: &'a [usize],
    n_classes: usize,
    params: TreeParams,
    rng: &'a mut ChaCha8Rng,
    importances: Vec<f64>,
}

struct BestSplit {
    feature: usize,
    threshold: f64,
    gain: f64,
}

impl Builder<'_> {
    fn counts(&self, rows: &[usize]) -> Vec<usize> {
        let mut counts = vec![0; self.n_classes];
        for &r in rows {
            counts[self.labels[r]] += 1;
        }
        counts
    }

    fn leaf(&self, counts: &[usize], n: usize) -> TreeNode {
        let distribution = counts
            .iter()
            .map(|&c| if n == 0 { 0.0 } else { c as f64 / n as f64 })
            .collect();
        TreeNode::Leaf {
            distribution,
            n_samples: n,
        }
    }

    fn build(&mut self, rows: &mut [usize], depth: usize) -> TreeNode {
        let n = rows.len();
        let counts = self.counts(rows);
        let impurity = gini(&counts, n);

        let stop = n < self.params.min_samples_split
            || n < 2 * self.params.min_samples_leaf
            || self.params.max_depth.is_some_and(|d| depth >= d)
            || impurity <= 0.0;
        if stop {
            return self.leaf(&counts, n);
        }

        let Some(best) = self.find_best_split(rows, &counts, impurity) else {
            return self.leaf(&counts, n);
        };

        self.importances[best.feature] += n as f64 * best.gain;

        // Stable partition: left rows first, original order kept on each side.
        let (mut left, mut right): (Vec<usize>, Vec<usize>) = rows
            .iter()
            .partition(|&&r| self.x[[r, best.feature]] <= best.threshold);
        let left_node = self.build(&mut left, depth + 1);
        let right_node = self.build(&mut right, depth + 1);

        TreeNode::Split {
            feature: best.feature,
            threshold: best.threshold,
            left: Box::new(left_node),
            right: Box::new(right_node),
            n_samples: n,
        }
    }

    fn find_best_split(
        &mut self,
        rows: &mut [usize],
        parent_counts: &[usize],
        parent_impurity: f64,
    ) -> Option<BestSplit> {
        let n_features = self.x.ncols();
        let n_try = self.params.max_features.count(n_features);
        let features: Vec<usize> = if n_try >= n_features {
            (0..n_features).collect()
        } else {
            let mut drawn = sample(&mut *self.rng, n_features, n_try).into_vec();
            drawn.sort_unstable();
            drawn
        };

        let n = rows.len();
        let min_leaf = self.params.min_samples_leaf.max(1);
        let mut best: Option<BestSplit> = None;

        for feature in features {
            rows.sort_by(|&a, &b| self.x[[a, feature]].total_cmp(&self.x[[b, feature]]));

            let mut left = vec![0usize; self.n_classes];
            let mut right = parent_counts.to_vec();

            for i in 0..n - 1 {
                let label = self.labels[rows[i]];
                left[label] += 1;
                right[label] -= 1;

                let n_left = i + 1;
                let n_right = n - n_left;
                if n_left < min_leaf || n_right < min_leaf {
                    continue;
                }
                let here = self.x[[rows[i], feature]];
                let next = self.x[[rows[i + 1], feature]];
                if here >= next {
                    continue;
                }

                let weighted = (n_left as f64 * gini(&left, n_left)
                    + n_right as f64 * gini(&right, n_right))
                    / n as f64;
                let gain = parent_impurity - weighted;
                if gain <= 0.0 || best.as_ref().is_some_and(|b| gain <= b.gain) {
                    continue;
                }

                let mut threshold = (here + next) / 2.0;
                if threshold >= next || !threshold.is_finite() {
                    threshold = here;
                }
                best = Some(BestSplit {
                    feature,
                    threshold,
                    gain,
                });
            }
        }

        best
    }
}

impl DecisionTreeClassifier {
    /// Fit a tree on every row of `x`.
    pub fn fit(x: &Array2<f64>, y: &Array1<f64>, params: TreeParams, seed: u64) -> Result<Self> {
        let classes = class_list(y);
        let labels = class_indices(y, &classes)?;
        let rows: Vec<usize> = (0..x.nrows()).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        Self::fit_rows(x, &labels, classes, rows, params, &mut rng)
    }

    /// Fit on a (possibly repeating) selection of rows.
    ///
    /// `labels[r]` is the index of row `r`'s class in `classes`.
    pub(crate) fn fit_rows(
        x: &Array2<f64>,
        labels: &[usize],
        classes: Vec<f64>,
        mut rows: Vec<usize>,
        params: TreeParams,
        rng: &mut ChaCha8Rng,
    ) -> Result<Self> {
        if rows.is_empty() {
            return Err(LearningError::TrainingFailed(
                "cannot fit a tree on zero rows".to_string(),
            ));
        }
        if x.nrows() != labels.len() {
            return Err(LearningError::TrainingFailed(format!(
                "feature matrix has {} rows but {} labels",
                x.nrows(),
                labels.len()
            )));
        }

        let mut builder = Builder {
            x,
            labels,
            n_classes: classes.len(),
            params,
            rng,
            importances: vec![0.0; x.ncols()],
        };
        let root = builder.build(&mut rows, 0);

        let mut importances = builder.importances;
        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            importances.iter_mut().for_each(|v| *v /= total);
        }

        Ok(Self {
            params,
            classes,
            n_features: x.ncols(),
            root,
            importances,
        })
    }

    pub fn classes(&self) -> &[f64] {
        &self.classes
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Normalized impurity decrease per feature; all zero for a single leaf.
    pub fn feature_importances(&self) -> &[f64] {
        &self.importances
    }

    pub fn params(&self) -> &TreeParams {
        &self.params
    }

    pub fn depth(&self) -> usize {
        fn walk(node: &TreeNode) -> usize {
            match node {
                TreeNode::Leaf { .. } => 0,
                TreeNode::Split { left, right, .. } => 1 + walk(left).max(walk(right)),
            }
        }
        walk(&self.root)
    }

    fn leaf_for(&self, sample: ndarray::ArrayView1<'_, f64>) -> &[f64] {
        let mut node = &self.root;
        loop {
            match node {
                TreeNode::Leaf { distribution, .. } => return distribution,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                    ..
                } => {
                    node = if sample[*feature] <= *threshold {
                        left
                    } else {
                        right
                    };
                }
            }
        }
    }

    /// Class probabilities, one column per entry of [`classes`](Self::classes).
    pub fn predict_proba(&self, x: &Array2<f64>) -> Array2<f64> {
        let mut proba = Array2::zeros((x.nrows(), self.classes.len()));
        for (i, row) in x.rows().into_iter().enumerate() {
            for (j, p) in self.leaf_for(row).iter().enumerate() {
                proba[[i, j]] = *p;
            }
        }
        proba
    }

    pub fn predict(&self, x: &Array2<f64>) -> Array1<f64> {
        argmax_classes(&self.predict_proba(x), &self.classes)
    }
}

/// Most probable class per row; ties go to the lower class code.
pub(crate) fn argmax_classes(proba: &Array2<f64>, classes: &[f64]) -> Array1<f64> {
    proba
        .rows()
        .into_iter()
        .map(|row| {
            let mut best = 0;
            for (j, p) in row.iter().enumerate() {
                if *p > row[best] {
                    best = j;
                }
            }
            classes.get(best).copied().unwrap_or(f64::NAN)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_separable_data() {
        let x = array![[1.0, 0.0], [2.0, 0.0], [3.0, 1.0], [10.0, 1.0], [11.0, 0.0], [12.0, 1.0]];
        let y = array![0.0, 0.0, 0.0, 1.0, 1.0, 1.0];
        let tree = DecisionTreeClassifier::fit(&x, &y, TreeParams::default(), 42).unwrap();

        assert_eq!(tree.predict(&x), y);
        assert_eq!(tree.depth(), 1);
        assert_eq!(tree.feature_importances(), &[1.0, 0.0]);
    }

    #[test]
    fn test_max_depth_limits_growth() {
        let x = array![[1.0], [2.0], [3.0], [4.0], [5.0], [6.0]];
        let y = array![0.0, 1.0, 0.0, 1.0, 0.0, 1.0];
        let params = TreeParams {
            max_depth: Some(1),
            ..TreeParams::default()
        };
        let tree = DecisionTreeClassifier::fit(&x, &y, params, 0).unwrap();
        assert!(tree.depth() <= 1);

        let unlimited = DecisionTreeClassifier::fit(&x, &y, TreeParams::default(), 0).unwrap();
        assert_eq!(unlimited.predict(&x), y);
    }

    #[test]
    fn test_probabilities_sum_to_one() {
        let x = array![[0.0], [0.0], [1.0], [1.0], [1.0]];
        let y = array![0.0, 1.0, 1.0, 1.0, 2.0];
        let tree = DecisionTreeClassifier::fit(&x, &y, TreeParams::default(), 0).unwrap();
        let proba = tree.predict_proba(&x);

        assert_eq!(proba.ncols(), 3);
        for row in proba.rows() {
            assert!((row.sum() - 1.0).abs() < 1e-12);
        }
        // Tied leaf [0, 0] resolves to the lower code.
        assert_eq!(tree.predict(&array![[0.0]])[0], 0.0);
    }

    #[test]
    fn test_min_samples_leaf_respected() {
        let x = array![[1.0], [2.0], [3.0], [4.0]];
        let y = array![0.0, 1.0, 1.0, 1.0];
        let params = TreeParams {
            min_samples_leaf: 2,
            ..TreeParams::default()
        };
        let tree = DecisionTreeClassifier::fit(&x, &y, params, 0).unwrap();
        // The pure split would leave one row on the left, so rows 1 and 2 share a leaf.
        let proba = tree.predict_proba(&array![[1.0]]);
        assert_eq!(proba.row(0).to_vec(), vec![0.5, 0.5]);
    }

    #[test]
    fn test_single_class_is_a_leaf() {
        let x = array![[1.0], [2.0]];
        let y = array![3.0, 3.0];
        let tree = DecisionTreeClassifier::fit(&x, &y, TreeParams::default(), 0).unwrap();
        assert_eq!(tree.depth(), 0);
        assert_eq!(tree.classes(), &[3.0]);
        assert_eq!(tree.feature_importances(), &[0.0]);
    }
}
