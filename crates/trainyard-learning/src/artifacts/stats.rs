//! Small statistical helpers behind the regression diagnostics.

use statrs::distribution::{ContinuousCDF, Normal};
use std::ops::Range;

use crate::error::{LearningError, Result};

/// `[lo, hi)` bins of equal width with their counts. The last bin is closed.
#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    pub edges: Vec<f64>,
    pub counts: Vec<usize>,
}

impl Histogram {
    pub fn bin_width(&self) -> f64 {
        self.edges[1] - self.edges[0]
    }

    /// Count scaled so the bars integrate to one.
    pub fn densities(&self) -> Vec<f64> {
        let total: usize = self.counts.iter().sum();
        let width = self.bin_width();
        self.counts
            .iter()
            .map(|&c| c as f64 / (total as f64 * width))
            .collect()
    }
}

pub fn histogram(values: &[f64], bins: usize) -> Result<Histogram> {
    if values.is_empty() || bins == 0 {
        return Err(LearningError::Metrics(
            "histogram needs values and at least one bin".to_string(),
        ));
    }
    let (mut lo, mut hi) = min_max(values);
    if lo == hi {
        lo -= 0.5;
        hi += 0.5;
    }
    let width = (hi - lo) / bins as f64;
    let edges = (0..=bins).map(|i| lo + width * i as f64).collect();
    let mut counts = vec![0; bins];
    for v in values {
        let bin = (((v - lo) / width) as usize).min(bins - 1);
        counts[bin] += 1;
    }
    Ok(Histogram { edges, counts })
}

fn min_max(values: &[f64]) -> (f64, f64) {
    values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(*v), hi.max(*v)))
}

/// Axis range covering `values` with 5% padding on each side.
pub fn padded_range(values: &[f64]) -> Range<f64> {
    let (lo, hi) = min_max(values);
    if !lo.is_finite() || !hi.is_finite() {
        return -1.0..1.0;
    }
    if lo == hi {
        return lo - 1.0..hi + 1.0;
    }
    let pad = (hi - lo) * 0.05;
    lo - pad..hi + pad
}

fn sample_std(values: &[f64]) -> f64 {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let ss: f64 = values.iter().map(|v| (v - mean) * (v - mean)).sum();
    (ss / (n - 1.0)).sqrt()
}

/// Gaussian kernel density estimate evaluated at `points` evenly spaced
/// over `range`. Bandwidth follows Scott's rule, `σ · n^(-1/5)`.
///
/// # Errors
///
/// Fewer than two values, or values with zero spread.
pub fn gaussian_kde(values: &[f64], range: Range<f64>, points: usize) -> Result<Vec<(f64, f64)>> {
    if values.len() < 2 {
        return Err(LearningError::Metrics(
            "density estimate needs at least two values".to_string(),
        ));
    }
    let sigma = sample_std(values);
    let n = values.len() as f64;
    let bandwidth = sigma * n.powf(-0.2);
    if !(bandwidth.is_finite() && bandwidth > 0.0) {
        return Err(LearningError::Metrics(
            "density estimate needs values with non-zero spread".to_string(),
        ));
    }

    let norm = 1.0 / (n * bandwidth * (2.0 * std::f64::consts::PI).sqrt());
    let step = (range.end - range.start) / (points.max(2) - 1) as f64;
    Ok((0..points.max(2))
        .map(|i| {
            let x = range.start + step * i as f64;
            let density: f64 = values
                .iter()
                .map(|v| {
                    let z = (x - v) / bandwidth;
                    (-0.5 * z * z).exp()
                })
                .sum();
            (x, density * norm)
        })
        .collect())
}

/// Filliben's estimate of the uniform order statistic medians.
fn uniform_order_medians(n: usize) -> Vec<f64> {
    let last = 0.5_f64.powf(1.0 / n as f64);
    (1..=n)
        .map(|i| match i {
            1 => 1.0 - last,
            i if i == n => last,
            i => (i as f64 - 0.3175) / (n as f64 + 0.365),
        })
        .collect()
}

/// `(theoretical, ordered sample)` pairs of a normal probability plot.
pub fn normal_quantiles(values: &[f64]) -> Result<Vec<(f64, f64)>> {
    if values.is_empty() {
        return Err(LearningError::Metrics("no values for a Q-Q plot".to_string()));
    }
    let normal =
        Normal::new(0.0, 1.0).map_err(|e| LearningError::Metrics(e.to_string()))?;

    let mut ordered = values.to_vec();
    ordered.sort_by(|a, b| a.total_cmp(b));
    Ok(uniform_order_medians(ordered.len())
        .into_iter()
        .map(|p| normal.inverse_cdf(p))
        .zip(ordered)
        .collect())
}

/// Ordinary least-squares line through `points` as `(slope, intercept)`.
pub fn fit_line(points: &[(f64, f64)]) -> Option<(f64, f64)> {
    if points.len() < 2 {
        return None;
    }
    let n = points.len() as f64;
    let mx = points.iter().map(|p| p.0).sum::<f64>() / n;
    let my = points.iter().map(|p| p.1).sum::<f64>() / n;
    let sxx: f64 = points.iter().map(|p| (p.0 - mx) * (p.0 - mx)).sum();
    if sxx == 0.0 {
        return None;
    }
    let sxy: f64 = points.iter().map(|p| (p.0 - mx) * (p.1 - my)).sum();
    let slope = sxy / sxx;
    Some((slope, my - slope * mx))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_histogram_counts_every_value() {
        let h = histogram(&[0.0, 0.5, 1.0, 1.0, 2.0], 2).unwrap();
        assert_eq!(h.edges, vec![0.0, 1.0, 2.0]);
        assert_eq!(h.counts, vec![2, 3]);
        let area: f64 = h.densities().iter().map(|d| d * h.bin_width()).sum();
        assert!((area - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_histogram_of_constant_values() {
        let h = histogram(&[3.0, 3.0], 4).unwrap();
        assert_eq!(h.counts.iter().sum::<usize>(), 2);
        assert!(h.bin_width() > 0.0);
    }

    #[test]
    fn test_kde_integrates_to_about_one() {
        let values = [-1.0, -0.5, 0.0, 0.2, 0.4, 1.1];
        let curve = gaussian_kde(&values, -6.0..6.0, 601).unwrap();
        let area: f64 = curve.windows(2).map(|w| (w[1].0 - w[0].0) * (w[0].1 + w[1].1) / 2.0).sum();
        assert!((area - 1.0).abs() < 1e-3);
        assert!(gaussian_kde(&[1.0, 1.0, 1.0], -1.0..1.0, 10).is_err());
    }

    #[test]
    fn test_normal_quantiles_are_symmetric() {
        let q = normal_quantiles(&[5.0, 1.0, 3.0]).unwrap();
        assert_eq!(q.iter().map(|p| p.1).collect::<Vec<_>>(), vec![1.0, 3.0, 5.0]);
        assert!((q[0].0 + q[2].0).abs() < 1e-9);
        assert!(q[1].0.abs() < 1e-9);
    }

    #[test]
    fn test_fit_line() {
        let (slope, intercept) = fit_line(&[(0.0, 1.0), (1.0, 3.0), (2.0, 5.0)]).unwrap();
        assert!((slope - 2.0).abs() < 1e-12);
        assert!((intercept - 1.0).abs() < 1e-12);
        assert!(fit_line(&[(1.0, 1.0), (1.0, 2.0)]).is_none());
    }
}
