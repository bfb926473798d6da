//! Ordinary least squares and ridge regression, both with an intercept.

use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

use super::scaler::StandardScaler;
use crate::error::{LearningError, Result};
use crate::linalg::{cholesky_solve, lstsq};

fn check_shapes(x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
    if x.nrows() == 0 {
        return Err(LearningError::TrainingFailed(
            "cannot fit a regression on zero rows".to_string(),
        ));
    }
    if x.nrows() != y.len() {
        return Err(LearningError::TrainingFailed(format!(
            "feature matrix has {} rows but target has {}",
            x.nrows(),
            y.len()
        )));
    }
    Ok(())
}

/// Ordinary least squares fitted on centered data.
///
/// Rank-deficient designs get the minimum-norm coefficients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearRegression {
    coefficients: Vec<f64>,
    intercept: f64,
}

impl LinearRegression {
    pub fn fit(x: &Array2<f64>, y: &Array1<f64>) -> Result<Self> {
        check_shapes(x, y)?;

        let x_mean = x
            .mean_axis(Axis(0))
            .ok_or_else(|| LearningError::TrainingFailed("empty design".to_string()))?;
        let y_mean = y.mean().unwrap_or(0.0);
        let x_centered = x - &x_mean.view().insert_axis(Axis(0));
        let y_centered = y - y_mean;

        let coefficients = lstsq(&x_centered, &y_centered)?;
        let intercept = y_mean - coefficients.dot(&x_mean);

        Ok(Self {
            coefficients: coefficients.to_vec(),
            intercept,
        })
    }

    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    pub fn n_features(&self) -> usize {
        self.coefficients.len()
    }

    pub fn predict(&self, x: &Array2<f64>) -> Array1<f64> {
        x.dot(&Array1::from(self.coefficients.clone())) + self.intercept
    }
}

/// L2-penalized least squares on standardized features.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RidgeRegression {
    alpha: f64,
    scaler: StandardScaler,
    /// Coefficients on the standardized features.
    coefficients: Vec<f64>,
    intercept: f64,
}

impl RidgeRegression {
    /// Solve `(ZᵀZ + αI) β = Zᵀ(y - ȳ)` with `Z` the standardized features.
    pub fn fit(x: &Array2<f64>, y: &Array1<f64>, alpha: f64) -> Result<Self> {
        check_shapes(x, y)?;
        if !(alpha > 0.0) || !alpha.is_finite() {
            return Err(LearningError::InvalidAlphaValue { value: alpha });
        }

        let scaler = StandardScaler::fit(x)?;
        let z = scaler.transform(x);
        let y_mean = y.mean().unwrap_or(0.0);
        let y_centered = y - y_mean;

        let mut gram = z.t().dot(&z);
        for i in 0..gram.nrows() {
            gram[[i, i]] += alpha;
        }
        let rhs = z.t().dot(&y_centered);
        let coefficients = cholesky_solve(&gram, &rhs)?;

        Ok(Self {
            alpha,
            scaler,
            coefficients: coefficients.to_vec(),
            intercept: y_mean,
        })
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn n_features(&self) -> usize {
        self.coefficients.len()
    }

    /// Intercept and coefficients expressed on the original feature scale.
    pub fn raw_coefficients(&self) -> (f64, Vec<f64>) {
        let coefficients: Vec<f64> = self
            .coefficients
            .iter()
            .zip(self.scaler.scale())
            .map(|(b, s)| b / s)
            .collect();
        let shift: f64 = coefficients
            .iter()
            .zip(self.scaler.mean())
            .map(|(b, m)| b * m)
            .sum();
        (self.intercept - shift, coefficients)
    }

    pub fn predict(&self, x: &Array2<f64>) -> Array1<f64> {
        self.scaler
            .transform(x)
            .dot(&Array1::from(self.coefficients.clone()))
            + self.intercept
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_ols_recovers_plane() {
        // y = 3 + 2 a - b
        let x = array![[0.0, 0.0], [1.0, 0.0], [0.0, 1.0], [2.0, 3.0], [4.0, 1.0]];
        let y = x.map_axis(Axis(1), |r| 3.0 + 2.0 * r[0] - r[1]);
        let model = LinearRegression::fit(&x, &y).unwrap();

        assert!((model.intercept() - 3.0).abs() < 1e-9);
        assert!((model.coefficients()[0] - 2.0).abs() < 1e-9);
        assert!((model.coefficients()[1] + 1.0).abs() < 1e-9);
        let residual = model.predict(&x) - &y;
        assert!(residual.iter().all(|r| r.abs() < 1e-9));
    }

    #[test]
    fn test_ols_duplicate_columns() {
        let x = array![[1.0, 1.0], [2.0, 2.0], [3.0, 3.0], [4.0, 4.0]];
        let y = array![2.0, 4.0, 6.0, 8.0];
        let model = LinearRegression::fit(&x, &y).unwrap();
        assert!((model.coefficients()[0] - model.coefficients()[1]).abs() < 1e-9);
        let residual = model.predict(&x) - &y;
        assert!(residual.iter().all(|r| r.abs() < 1e-9));
    }

    #[test]
    fn test_ridge_shrinks_towards_mean() {
        let x = array![[1.0], [2.0], [3.0], [4.0]];
        let y = array![1.0, 2.0, 3.0, 4.0];
        let weak = RidgeRegression::fit(&x, &y, 1e-6).unwrap();
        let strong = RidgeRegression::fit(&x, &y, 1e6).unwrap();

        let (intercept, coefficients) = weak.raw_coefficients();
        assert!(intercept.abs() < 1e-4);
        assert!((coefficients[0] - 1.0).abs() < 1e-4);

        let flat = strong.predict(&x);
        assert!(flat.iter().all(|p| (p - 2.5).abs() < 1e-3));
    }

    #[test]
    fn test_ridge_rejects_bad_alpha() {
        let x = array![[1.0], [2.0]];
        let y = array![1.0, 2.0];
        let err = RidgeRegression::fit(&x, &y, 0.0).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_ALPHA_VALUE");
    }
}
