//! ROC and precision-recall curves, including one-vs-rest for multiclass.

use ndarray::Array2;
use serde::Serialize;

use crate::error::{LearningError, Result};

/// Points of a curve in plotting order plus the area under it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Curve {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub auc: f64,
}

/// A curve with the series name it is plotted under.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NamedCurve {
    pub name: String,
    pub curve: Curve,
}

/// Area under a polyline by the trapezoidal rule.
pub fn trapezoid(x: &[f64], y: &[f64]) -> f64 {
    x.windows(2)
        .zip(y.windows(2))
        .map(|(xs, ys)| (xs[1] - xs[0]) * (ys[0] + ys[1]) / 2.0)
        .sum()
}

/// Cumulative true/false positives at each distinct threshold, highest first.
fn cumulative_counts(truth: &[bool], scores: &[f64]) -> (Vec<f64>, Vec<f64>) {
    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));

    let (mut tps, mut fps) = (Vec::new(), Vec::new());
    let (mut tp, mut fp) = (0.0, 0.0);
    for (rank, &i) in order.iter().enumerate() {
        if truth[i] {
            tp += 1.0;
        } else {
            fp += 1.0;
        }
        let last_of_threshold = order
            .get(rank + 1)
            .is_none_or(|&next| scores[next] != scores[i]);
        if last_of_threshold {
            tps.push(tp);
            fps.push(fp);
        }
    }
    (tps, fps)
}

fn check(truth: &[bool], scores: &[f64]) -> Result<()> {
    if truth.len() != scores.len() || truth.is_empty() {
        return Err(LearningError::Metrics(
            "curve needs equally sized, non-empty truth and scores".to_string(),
        ));
    }
    if scores.iter().any(|s| !s.is_finite()) {
        return Err(LearningError::Metrics("scores must be finite".to_string()));
    }
    Ok(())
}

/// Receiver operating characteristic: false positive rate on `x`, true
/// positive rate on `y`, starting at (0, 0).
///
/// # Errors
///
/// [`LearningError::Metrics`] if `truth` lacks positives or negatives.
pub fn roc_curve(truth: &[bool], scores: &[f64]) -> Result<Curve> {
    check(truth, scores)?;
    let positives = truth.iter().filter(|t| **t).count() as f64;
    let negatives = truth.len() as f64 - positives;
    if positives == 0.0 || negatives == 0.0 {
        return Err(LearningError::Metrics(
            "ROC needs both positive and negative samples".to_string(),
        ));
    }

    let (tps, fps) = cumulative_counts(truth, scores);
    let mut x = vec![0.0];
    let mut y = vec![0.0];
    x.extend(fps.iter().map(|f| f / negatives));
    y.extend(tps.iter().map(|t| t / positives));
    let auc = trapezoid(&x, &y);
    Ok(Curve { x, y, auc })
}

/// Precision-recall curve: recall on `x`, precision on `y`, starting at
/// (0, 1) and stopping once full recall is reached.
///
/// # Errors
///
/// [`LearningError::Metrics`] if `truth` has no positives.
pub fn precision_recall_curve(truth: &[bool], scores: &[f64]) -> Result<Curve> {
    check(truth, scores)?;
    let positives = truth.iter().filter(|t| **t).count() as f64;
    if positives == 0.0 {
        return Err(LearningError::Metrics(
            "precision-recall needs at least one positive sample".to_string(),
        ));
    }

    let (tps, fps) = cumulative_counts(truth, scores);
    let mut x = vec![0.0];
    let mut y = vec![1.0];
    for (tp, fp) in tps.iter().zip(&fps) {
        x.push(tp / positives);
        y.push(tp / (tp + fp));
        if *tp == positives {
            break;
        }
    }
    let auc = trapezoid(&x, &y);
    Ok(Curve { x, y, auc })
}

/// ROC and PR curve families for one model's test predictions.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CurveSet {
    pub roc: Vec<NamedCurve>,
    pub pr: Vec<NamedCurve>,
}

/// One curve per class (positive vs the rest) plus a micro-average over the
/// one-hot binarized labels.
///
/// `proba` columns are aligned with `classes`; `names` gives the series
/// name of each class. Classes whose curve is undefined (absent from the
/// test labels) are left out.
pub fn one_vs_rest(
    y_true: &[f64],
    proba: &Array2<f64>,
    classes: &[f64],
    names: &[String],
) -> Result<CurveSet> {
    if proba.nrows() != y_true.len() || proba.ncols() != classes.len() {
        return Err(LearningError::Metrics(
            "probability matrix does not match labels and classes".to_string(),
        ));
    }

    let mut set = CurveSet::default();
    let mut all_truth = Vec::with_capacity(y_true.len() * classes.len());
    let mut all_scores = Vec::with_capacity(y_true.len() * classes.len());

    for (k, class) in classes.iter().enumerate() {
        let truth: Vec<bool> = y_true.iter().map(|y| y == class).collect();
        let scores: Vec<f64> = proba.column(k).to_vec();
        let name = names.get(k).cloned().unwrap_or_else(|| class.to_string());

        if let Ok(curve) = roc_curve(&truth, &scores) {
            set.roc.push(NamedCurve {
                name: name.clone(),
                curve,
            });
        }
        if let Ok(curve) = precision_recall_curve(&truth, &scores) {
            set.pr.push(NamedCurve { name, curve });
        }
    }

    // Row-major ravel of the binarized labels and the probabilities.
    for (i, y) in y_true.iter().enumerate() {
        for (k, class) in classes.iter().enumerate() {
            all_truth.push(y == class);
            all_scores.push(proba[[i, k]]);
        }
    }
    set.roc.push(NamedCurve {
        name: "micro-average".to_string(),
        curve: roc_curve(&all_truth, &all_scores)?,
    });
    set.pr.push(NamedCurve {
        name: "micro-average".to_string(),
        curve: precision_recall_curve(&all_truth, &all_scores)?,
    });

    Ok(set)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_roc_auc_known_value() {
        let truth = [false, false, true, true];
        let scores = [0.1, 0.4, 0.35, 0.8];
        let curve = roc_curve(&truth, &scores).unwrap();
        assert!((curve.auc - 0.75).abs() < 1e-12);
        assert_eq!(curve.x.first(), Some(&0.0));
        assert_eq!(curve.y.last(), Some(&1.0));
    }

    #[test]
    fn test_perfect_ranking() {
        let truth = [false, true, false, true];
        let scores = [0.1, 0.9, 0.2, 0.8];
        assert_eq!(roc_curve(&truth, &scores).unwrap().auc, 1.0);
        assert_eq!(precision_recall_curve(&truth, &scores).unwrap().auc, 1.0);
    }

    #[test]
    fn test_tied_scores_form_one_step() {
        let truth = [true, false];
        let scores = [0.5, 0.5];
        let curve = roc_curve(&truth, &scores).unwrap();
        assert_eq!(curve.x, vec![0.0, 1.0]);
        assert_eq!(curve.auc, 0.5);
    }

    #[test]
    fn test_single_class_is_undefined() {
        assert!(roc_curve(&[true, true], &[0.2, 0.3]).is_err());
        assert!(precision_recall_curve(&[false, false], &[0.2, 0.3]).is_err());
    }

    #[test]
    fn test_one_vs_rest_three_classes() {
        let y_true = [0.0, 1.0, 2.0, 2.0, 1.0, 0.0];
        let proba = array![
            [0.8, 0.1, 0.1],
            [0.2, 0.6, 0.2],
            [0.1, 0.2, 0.7],
            [0.3, 0.3, 0.4],
            [0.1, 0.5, 0.4],
            [0.6, 0.3, 0.1],
        ];
        let names: Vec<String> = ["a", "b", "c"].iter().map(|s| s.to_string()).collect();
        let set = one_vs_rest(&y_true, &proba, &[0.0, 1.0, 2.0], &names).unwrap();

        assert_eq!(set.roc.len(), 4);
        assert_eq!(set.pr.len(), 4);
        assert_eq!(set.roc[3].name, "micro-average");
        assert!(set.roc.iter().all(|c| (0.0..=1.0).contains(&c.curve.auc)));
    }
}
