use ndarray::Array1;

use crate::error::{LearningError, Result};

fn check(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<()> {
    if y_true.is_empty() {
        return Err(LearningError::Metrics("no samples to score".to_string()));
    }
    if y_true.len() != y_pred.len() {
        return Err(LearningError::Metrics(format!(
            "{} true values but {} predictions",
            y_true.len(),
            y_pred.len()
        )));
    }
    Ok(())
}

/// Coefficient of determination.
///
/// With constant true values the score is 1.0 for a perfect fit and 0.0
/// otherwise, so it is always finite for finite inputs.
pub fn r2_score(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<f64> {
    check(y_true, y_pred)?;
    let mean = y_true.mean().unwrap_or(0.0);
    let ss_res: f64 = y_true
        .iter()
        .zip(y_pred)
        .map(|(t, p)| (t - p) * (t - p))
        .sum();
    let ss_tot: f64 = y_true.iter().map(|t| (t - mean) * (t - mean)).sum();

    if ss_tot == 0.0 {
        return Ok(if ss_res == 0.0 { 1.0 } else { 0.0 });
    }
    Ok(1.0 - ss_res / ss_tot)
}

pub fn mean_squared_error(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<f64> {
    check(y_true, y_pred)?;
    let total: f64 = y_true
        .iter()
        .zip(y_pred)
        .map(|(t, p)| (t - p) * (t - p))
        .sum();
    Ok(total / y_true.len() as f64)
}

pub fn mean_absolute_error(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<f64> {
    check(y_true, y_pred)?;
    let total: f64 = y_true.iter().zip(y_pred).map(|(t, p)| (t - p).abs()).sum();
    Ok(total / y_true.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_regression_metrics() {
        let y_true = array![3.0, -0.5, 2.0, 7.0];
        let y_pred = array![2.5, 0.0, 2.0, 8.0];
        assert!((r2_score(&y_true, &y_pred).unwrap() - 0.948_608_137_044_968).abs() < 1e-12);
        assert_eq!(mean_squared_error(&y_true, &y_pred).unwrap(), 0.375);
        assert_eq!(mean_absolute_error(&y_true, &y_pred).unwrap(), 0.5);
    }

    #[test]
    fn test_r2_constant_truth_is_finite() {
        let y_true = array![2.0, 2.0];
        assert_eq!(r2_score(&y_true, &array![2.0, 2.0]).unwrap(), 1.0);
        assert_eq!(r2_score(&y_true, &array![2.0, 3.0]).unwrap(), 0.0);
    }

    #[test]
    fn test_empty_input_is_an_error() {
        let empty = Array1::<f64>::zeros(0);
        assert_eq!(
            r2_score(&empty, &empty).unwrap_err().error_code(),
            "METRICS_ERROR"
        );
    }
}
