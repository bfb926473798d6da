use ndarray::Array1;

use crate::error::{LearningError, Result};

fn check(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<()> {
    if y_true.is_empty() {
        return Err(LearningError::Metrics("no samples to score".to_string()));
    }
    if y_true.len() != y_pred.len() {
        return Err(LearningError::Metrics(format!(
            "{} true labels but {} predictions",
            y_true.len(),
            y_pred.len()
        )));
    }
    Ok(())
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 { 0.0 } else { num as f64 / den as f64 }
}

fn f1(precision: f64, recall: f64) -> f64 {
    if precision + recall == 0.0 {
        0.0
    } else {
        2.0 * precision * recall / (precision + recall)
    }
}

/// Precision, recall and F1 for one averaging scheme.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scores {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

pub fn accuracy(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<f64> {
    check(y_true, y_pred)?;
    let correct = y_true.iter().zip(y_pred).filter(|(t, p)| t == p).count();
    Ok(correct as f64 / y_true.len() as f64)
}

/// Sorted distinct labels appearing in either vector.
pub fn observed_classes(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Vec<f64> {
    let mut classes: Vec<f64> = y_true.iter().chain(y_pred.iter()).copied().collect();
    classes.sort_by(|a, b| a.total_cmp(b));
    classes.dedup();
    classes
}

/// `matrix[i][j]` counts rows of true class `classes[i]` predicted as `classes[j]`.
pub fn confusion_matrix(
    y_true: &Array1<f64>,
    y_pred: &Array1<f64>,
    classes: &[f64],
) -> Result<Vec<Vec<usize>>> {
    check(y_true, y_pred)?;
    let position = |v: &f64| {
        classes
            .iter()
            .position(|c| c == v)
            .ok_or_else(|| LearningError::Metrics(format!("label {v} is not in the class list")))
    };
    let mut matrix = vec![vec![0; classes.len()]; classes.len()];
    for (t, p) in y_true.iter().zip(y_pred) {
        matrix[position(t)?][position(p)?] += 1;
    }
    Ok(matrix)
}

/// Scores of `positive` against everything else. Undefined ratios are 0.
pub fn binary_scores(y_true: &Array1<f64>, y_pred: &Array1<f64>, positive: f64) -> Result<Scores> {
    check(y_true, y_pred)?;
    let (mut tp, mut fp, mut fn_) = (0, 0, 0);
    for (t, p) in y_true.iter().zip(y_pred) {
        match (*t == positive, *p == positive) {
            (true, true) => tp += 1,
            (false, true) => fp += 1,
            (true, false) => fn_ += 1,
            (false, false) => {}
        }
    }
    let precision = ratio(tp, tp + fp);
    let recall = ratio(tp, tp + fn_);
    Ok(Scores {
        precision,
        recall,
        f1: f1(precision, recall),
    })
}

/// Unweighted mean of the per-class scores of a confusion matrix.
///
/// F1 is averaged per class, not derived from the averaged precision and recall.
pub fn macro_scores(matrix: &[Vec<usize>]) -> Scores {
    let n = matrix.len();
    if n == 0 {
        return Scores {
            precision: 0.0,
            recall: 0.0,
            f1: 0.0,
        };
    }
    let (mut precision, mut recall, mut f1_sum) = (0.0, 0.0, 0.0);
    for k in 0..n {
        let tp = matrix[k][k];
        let predicted: usize = matrix.iter().map(|row| row[k]).sum();
        let actual: usize = matrix[k].iter().sum();
        let p = ratio(tp, predicted);
        let r = ratio(tp, actual);
        precision += p;
        recall += r;
        f1_sum += f1(p, r);
    }
    Scores {
        precision: precision / n as f64,
        recall: recall / n as f64,
        f1: f1_sum / n as f64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_binary_scores() {
        let y_true = array![0.0, 1.0, 1.0, 0.0, 1.0];
        let y_pred = array![0.0, 1.0, 0.0, 1.0, 1.0];
        assert_eq!(accuracy(&y_true, &y_pred).unwrap(), 0.6);

        let scores = binary_scores(&y_true, &y_pred, 1.0).unwrap();
        assert!((scores.precision - 2.0 / 3.0).abs() < 1e-12);
        assert!((scores.recall - 2.0 / 3.0).abs() < 1e-12);
        assert!((scores.f1 - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_macro_scores_zero_division() {
        let y_true = array![0.0, 1.0, 2.0, 2.0];
        let y_pred = array![0.0, 0.0, 2.0, 2.0];
        let classes = observed_classes(&y_true, &y_pred);
        let matrix = confusion_matrix(&y_true, &y_pred, &classes).unwrap();
        assert_eq!(matrix, vec![vec![1, 0, 0], vec![1, 0, 0], vec![0, 0, 2]]);

        // Class 1 is never predicted: its precision counts as 0.
        let scores = macro_scores(&matrix);
        assert!((scores.precision - (0.5 + 0.0 + 1.0) / 3.0).abs() < 1e-12);
        assert!((scores.recall - (1.0 + 0.0 + 1.0) / 3.0).abs() < 1e-12);
        let f1_class0 = 2.0 * 0.5 * 1.0 / 1.5;
        assert!((scores.f1 - (f1_class0 + 0.0 + 1.0) / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_no_positive_predictions() {
        let scores = binary_scores(&array![1.0, 0.0], &array![0.0, 0.0], 1.0).unwrap();
        assert_eq!(scores.precision, 0.0);
        assert_eq!(scores.f1, 0.0);
    }
}
