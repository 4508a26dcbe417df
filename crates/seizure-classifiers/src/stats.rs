use serde::{Deserialize, Serialize};
use smartcore::metrics::{f1, precision, recall, roc_auc_score};
use statrs::statistics::Statistics;

use crate::data_handling::Label;
use crate::error::{ModelSelectionError, Result};

/// 1.0 where the label is `class`, 0.0 elsewhere.
fn one_vs_rest(labels: &[Label], class: Label) -> Vec<f64> {
    labels
        .iter()
        .map(|&l| if l == class { 1.0 } else { 0.0 })
        .collect()
}

/// smartcore reports a zero denominator as NaN.
fn defined_or_zero(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value
    }
}

fn check_lengths(what: &str, labels: usize, other: usize, other_name: &str) -> Result<()> {
    if labels != other {
        return Err(ModelSelectionError::config(format!(
            "{}: {} labels but {} {}",
            what, labels, other, other_name
        )));
    }
    Ok(())
}

/// Area under the ROC curve of `scores` against `labels` (preictal positive).
///
/// smartcore ranks the scores with midranks, so tied scores count one half.
/// For two classes this equals the support-weighted AUC.
///
/// # Errors
///
/// `Configuration` when the lengths differ or one of the classes is absent.
pub fn roc_auc(labels: &[Label], scores: &[f64]) -> Result<f64> {
    check_lengths("roc_auc", labels.len(), scores.len(), "scores")?;
    let n_pos = labels.iter().filter(|l| l.is_preictal()).count();
    if n_pos == 0 || n_pos == labels.len() {
        return Err(ModelSelectionError::config(
            "Only one class present in y_true. ROC AUC score is not defined in that case.",
        ));
    }
    let truth = one_vs_rest(labels, Label::Preictal);
    Ok(roc_auc_score(&truth, &scores.to_vec()))
}

/// ROC curve points `(fpr, tpr, thresholds)` with decreasing thresholds,
/// starting at (0, 0).
///
/// Each distinct score is used as a threshold; the true positive rate is the
/// preictal recall and the false positive rate one minus the interictal
/// recall of the thresholded predictions.
pub fn roc_curve(labels: &[Label], scores: &[f64]) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
    let mut thresholds: Vec<f64> = scores.to_vec();
    thresholds.sort_by(|a, b| b.total_cmp(a));
    thresholds.dedup();

    let positives = one_vs_rest(labels, Label::Preictal);
    let negatives = one_vs_rest(labels, Label::Interictal);

    let mut fpr = vec![0.0];
    let mut tpr = vec![0.0];
    for &threshold in &thresholds {
        let called: Vec<f64> = scores
            .iter()
            .map(|&s| if s >= threshold { 1.0 } else { 0.0 })
            .collect();
        let not_called: Vec<f64> = called.iter().map(|c| 1.0 - c).collect();
        tpr.push(defined_or_zero(recall(&positives, &called)));
        fpr.push(1.0 - defined_or_zero(recall(&negatives, &not_called)));
    }
    thresholds.insert(0, f64::INFINITY);
    (fpr, tpr, thresholds)
}

/// Mean and population standard deviation of per-fold scores.
pub fn mean_and_std(scores: &[f64]) -> (f64, f64) {
    if scores.is_empty() {
        return (f64::NAN, f64::NAN);
    }
    (scores.iter().mean(), scores.iter().population_std_dev())
}

/// 2x2 confusion matrix; rows are true classes, columns predicted classes,
/// both in [`Label::ALL`] order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ConfusionMatrix(pub [[usize; 2]; 2]);

impl ConfusionMatrix {
    pub fn from_predictions(truth: &[Label], predicted: &[Label]) -> Result<Self> {
        check_lengths("confusion matrix", truth.len(), predicted.len(), "predictions")?;
        let mut cm = [[0usize; 2]; 2];
        for (t, p) in truth.iter().zip(predicted.iter()) {
            cm[t.as_u8() as usize][p.as_u8() as usize] += 1;
        }
        Ok(ConfusionMatrix(cm))
    }

    pub fn get(&self, truth: Label, predicted: Label) -> usize {
        self.0[truth.as_u8() as usize][predicted.as_u8() as usize]
    }

    pub fn total(&self) -> usize {
        self.0.iter().flatten().sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

/// Precision, recall, F1 and support for `class`, scored one-vs-rest with
/// smartcore; undefined ratios are 0.
pub fn class_metrics(truth: &[Label], predicted: &[Label], class: Label) -> Result<ClassMetrics> {
    check_lengths("class metrics", truth.len(), predicted.len(), "predictions")?;
    let y_true = one_vs_rest(truth, class);
    let y_pred = one_vs_rest(predicted, class);
    Ok(ClassMetrics {
        precision: defined_or_zero(precision(&y_true, &y_pred)),
        recall: defined_or_zero(recall(&y_true, &y_pred)),
        f1: defined_or_zero(f1(&y_true, &y_pred, 1.0)),
        support: truth.iter().filter(|&&l| l == class).count(),
    })
}

/// Support-weighted average of per-class metrics.
pub fn weighted_average(per_class: &[ClassMetrics]) -> ClassMetrics {
    let support: usize = per_class.iter().map(|m| m.support).sum();
    ClassMetrics {
        precision: weighted(per_class, support, |m| m.precision),
        recall: weighted(per_class, support, |m| m.recall),
        f1: weighted(per_class, support, |m| m.f1),
        support,
    }
}

fn weighted(per_class: &[ClassMetrics], support: usize, metric: impl Fn(&ClassMetrics) -> f64) -> f64 {
    if support == 0 {
        return 0.0;
    }
    per_class
        .iter()
        .map(|m| metric(m) * m.support as f64)
        .sum::<f64>()
        / support as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_handling::Label::{Interictal as I, Preictal as P};

    #[test]
    fn test_auc_perfect_and_inverted() {
        let y = [I, I, P, P];
        assert_eq!(roc_auc(&y, &[0.1, 0.2, 0.8, 0.9]).unwrap(), 1.0);
        assert_eq!(roc_auc(&y, &[0.9, 0.8, 0.2, 0.1]).unwrap(), 0.0);
    }

    #[test]
    fn test_auc_constant_scores() {
        let y = [I, P, I, P, P];
        assert_eq!(roc_auc(&y, &[0.3; 5]).unwrap(), 0.5);
    }

    #[test]
    fn test_auc_midranks() {
        // pairs (neg, pos): (0.1,0.5) win, (0.1,0.5) win, (0.5,0.5) tie, (0.5,0.5) tie
        let y = [I, I, P, P];
        let auc = roc_auc(&y, &[0.1, 0.5, 0.5, 0.5]).unwrap();
        assert!((auc - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_auc_requires_both_classes() {
        assert!(roc_auc(&[P, P], &[0.1, 0.2]).is_err());
        assert!(roc_auc(&[P, I], &[0.1]).is_err());
    }

    #[test]
    fn test_roc_curve_endpoints() {
        let (fpr, tpr, _) = roc_curve(&[I, P, I, P], &[0.1, 0.4, 0.35, 0.8]);
        assert_eq!(fpr.first(), Some(&0.0));
        assert_eq!(tpr.first(), Some(&0.0));
        assert_eq!(fpr.last(), Some(&1.0));
        assert_eq!(tpr.last(), Some(&1.0));
    }

    #[test]
    fn test_metrics_with_zero_division() {
        let truth = [I, I, P, P];
        let predicted = [I, I, I, I];
        let cm = ConfusionMatrix::from_predictions(&truth, &predicted).unwrap();
        assert_eq!(cm.0, [[2, 0], [2, 0]]);
        let pre = class_metrics(&truth, &predicted, P).unwrap();
        assert_eq!(pre.precision, 0.0);
        assert_eq!(pre.f1, 0.0);
        assert_eq!(pre.support, 2);
        let inter = class_metrics(&truth, &predicted, I).unwrap();
        assert_eq!(inter.precision, 0.5);
        assert_eq!(inter.recall, 1.0);
        let avg = weighted_average(&[inter, pre]);
        assert_eq!(avg.support, 4);
        assert!((avg.recall - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_metrics_per_class() {
        let truth = [I, I, I, P, P];
        let predicted = [I, P, I, P, I];
        let pre = class_metrics(&truth, &predicted, P).unwrap();
        assert!((pre.precision - 0.5).abs() < 1e-12);
        assert!((pre.recall - 0.5).abs() < 1e-12);
        assert!((pre.f1 - 0.5).abs() < 1e-12);
        let inter = class_metrics(&truth, &predicted, I).unwrap();
        assert!((inter.recall - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(inter.support, 3);
        assert!(class_metrics(&truth, &predicted[..2], P).is_err());
    }

    #[test]
    fn test_roc_curve_merges_tied_scores() {
        let (fpr, tpr, thresholds) = roc_curve(&[I, P, I, P], &[0.2, 0.5, 0.5, 0.9]);
        assert_eq!(thresholds, vec![f64::INFINITY, 0.9, 0.5, 0.2]);
        assert_eq!(tpr, vec![0.0, 0.5, 1.0, 1.0]);
        assert_eq!(fpr, vec![0.0, 0.0, 0.5, 1.0]);
    }

    #[test]
    fn test_mean_and_population_std() {
        let (mean, std) = mean_and_std(&[1.0, 3.0]);
        assert_eq!(mean, 2.0);
        assert_eq!(std, 1.0);
    }
}
