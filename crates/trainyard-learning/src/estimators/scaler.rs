use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};

use crate::error::{LearningError, Result};

/// Per-column standardization `(x - mean) / std`, population std.
///
/// Constant columns get a scale of 1 so they map to zero instead of NaN.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    mean: Vec<f64>,
    scale: Vec<f64>,
}

impl StandardScaler {
    pub fn fit(x: &Array2<f64>) -> Result<Self> {
        let mean = x.mean_axis(Axis(0)).ok_or_else(|| {
            LearningError::TrainingFailed("cannot standardize zero rows".to_string())
        })?;
        let scale = x
            .std_axis(Axis(0), 0.0)
            .mapv(|s| if s > 0.0 && s.is_finite() { s } else { 1.0 });
        Ok(Self {
            mean: mean.to_vec(),
            scale: scale.to_vec(),
        })
    }

    pub fn mean(&self) -> &[f64] {
        &self.mean
    }

    pub fn scale(&self) -> &[f64] {
        &self.scale
    }

    pub fn transform(&self, x: &Array2<f64>) -> Array2<f64> {
        let mut z = x.to_owned();
        for (j, mut column) in z.axis_iter_mut(Axis(1)).enumerate() {
            let (m, s) = (self.mean[j], self.scale[j]);
            column.mapv_inplace(|v| (v - m) / s);
        }
        z
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_standardizes_columns() {
        let x = array![[1.0, 5.0], [3.0, 5.0]];
        let scaler = StandardScaler::fit(&x).unwrap();
        assert_eq!(scaler.mean(), &[2.0, 5.0]);
        assert_eq!(scaler.scale(), &[1.0, 1.0]);
        assert_eq!(scaler.transform(&x), array![[-1.0, 0.0], [1.0, 0.0]]);
    }
}
