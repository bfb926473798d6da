//! Polynomial regression: standardize, expand to every monomial up to a
//! degree, then ordinary least squares.

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use super::linear::LinearRegression;
use super::scaler::StandardScaler;
use crate::error::{LearningError, Result};

/// Number of columns of a degree-`degree` expansion of `n_features`
/// features, bias excluded: `C(n + d, d) - 1`.
///
/// Returns `None` on overflow.
///
/// ```
/// use trainyard_learning::estimators::expanded_width;
///
/// assert_eq!(expanded_width(2, 2), Some(5)); // a, b, a², ab, b²
/// assert_eq!(expanded_width(3, 1), Some(3));
/// ```
pub fn expanded_width(n_features: usize, degree: usize) -> Option<usize> {
    let mut combinations: usize = 1;
    for i in 1..=degree {
        combinations = combinations.checked_mul(n_features.checked_add(i)?)? / i;
    }
    combinations.checked_sub(1)
}

/// Every monomial of degree 1 to `degree`, as sorted lists of feature
/// indices with repetition. Ordered by degree, then lexicographically.
fn monomials(n_features: usize, degree: usize) -> Vec<Vec<usize>> {
    fn extend(
        start: usize,
        remaining: usize,
        n_features: usize,
        current: &mut Vec<usize>,
        out: &mut Vec<Vec<usize>>,
    ) {
        if remaining == 0 {
            out.push(current.clone());
            return;
        }
        for f in start..n_features {
            current.push(f);
            extend(f, remaining - 1, n_features, current, out);
            current.pop();
        }
    }

    let mut terms = Vec::new();
    for d in 1..=degree {
        extend(0, d, n_features, &mut Vec::with_capacity(d), &mut terms);
    }
    terms
}

fn expand(z: &Array2<f64>, terms: &[Vec<usize>]) -> Array2<f64> {
    Array2::from_shape_fn((z.nrows(), terms.len()), |(i, t)| {
        terms[t].iter().map(|&f| z[[i, f]]).product()
    })
}

/// A fitted polynomial regression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolynomialRegression {
    degree: usize,
    scaler: StandardScaler,
    terms: Vec<Vec<usize>>,
    linear: LinearRegression,
}

impl PolynomialRegression {
    /// Fit with a given degree.
    ///
    /// # Errors
    ///
    /// [`LearningError::TrainingFailed`] if `degree` is 0, the expansion is
    /// wider than `max_width`, or the least-squares solve fails.
    pub fn fit(x: &Array2<f64>, y: &Array1<f64>, degree: usize, max_width: usize) -> Result<Self> {
        if degree == 0 {
            return Err(LearningError::TrainingFailed(
                "polynomial degree must be at least 1".to_string(),
            ));
        }
        let width = expanded_width(x.ncols(), degree).unwrap_or(usize::MAX);
        if width > max_width {
            return Err(LearningError::TrainingFailed(format!(
                "degree {degree} expands {} features to {width} columns (limit {max_width})",
                x.ncols()
            )));
        }

        let scaler = StandardScaler::fit(x)?;
        let terms = monomials(x.ncols(), degree);
        let expanded = expand(&scaler.transform(x), &terms);
        let linear = LinearRegression::fit(&expanded, y)?;

        Ok(Self {
            degree,
            scaler,
            terms,
            linear,
        })
    }

    pub fn degree(&self) -> usize {
        self.degree
    }

    pub fn n_features(&self) -> usize {
        self.scaler.mean().len()
    }

    pub fn intercept(&self) -> f64 {
        self.linear.intercept()
    }

    pub fn coefficients(&self) -> &[f64] {
        self.linear.coefficients()
    }

    /// Names of the expanded terms, e.g. `"x1^2 x2"`.
    pub fn term_names(&self, feature_names: &[String]) -> Vec<String> {
        self.terms
            .iter()
            .map(|term| {
                let mut parts: Vec<String> = Vec::new();
                let mut i = 0;
                while i < term.len() {
                    let f = term[i];
                    let power = term[i..].iter().take_while(|&&g| g == f).count();
                    let name = feature_names
                        .get(f)
                        .cloned()
                        .unwrap_or_else(|| format!("x{f}"));
                    parts.push(if power == 1 {
                        name
                    } else {
                        format!("{name}^{power}")
                    });
                    i += power;
                }
                parts.join(" ")
            })
            .collect()
    }

    pub fn predict(&self, x: &Array2<f64>) -> Array1<f64> {
        let expanded = expand(&self.scaler.transform(x), &self.terms);
        self.linear.predict(&expanded)
    }
}
