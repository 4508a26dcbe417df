//! Helpers shared by the estimator implementations.
use std::fmt;

use linfa::Dataset;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Ix1};

use crate::data_handling::Label;
use crate::error::{ModelSelectionError, Result};

/// Validate a training set: matching lengths, at least one row, both classes.
pub(crate) fn check_fit_input(estimator: &str, x: ArrayView2<f64>, y: &[Label]) -> Result<()> {
    if x.nrows() != y.len() {
        return Err(ModelSelectionError::config(format!(
            "{}: {} feature rows but {} labels",
            estimator,
            x.nrows(),
            y.len()
        )));
    }
    if x.nrows() == 0 || x.ncols() == 0 {
        return Err(ModelSelectionError::config(format!(
            "{}: cannot fit on an empty feature matrix",
            estimator
        )));
    }
    for class in Label::ALL {
        if !y.contains(&class) {
            return Err(ModelSelectionError::config(format!(
                "{}: training data contains no {} rows, both classes are required",
                estimator, class
            )));
        }
    }
    if x.iter().any(|v| !v.is_finite()) {
        return Err(ModelSelectionError::config(format!(
            "{}: feature matrix contains NaN or infinite values",
            estimator
        )));
    }
    Ok(())
}

/// Validate a prediction input against the fitted feature count.
pub(crate) fn check_predict_input(
    estimator: &str,
    fitted_features: Option<usize>,
    x: ArrayView2<f64>,
) -> Result<()> {
    match fitted_features {
        None => Err(ModelSelectionError::config(format!(
            "{} has not been fitted",
            estimator
        ))),
        Some(n) if n != x.ncols() => Err(ModelSelectionError::config(format!(
            "{} was fitted on {} features but got {}",
            estimator,
            n,
            x.ncols()
        ))),
        Some(_) => Ok(()),
    }
}

/// linfa training set with `true` marking preictal rows.
pub(crate) fn binary_dataset(x: ArrayView2<f64>, y: &[Label]) -> Dataset<f64, bool, Ix1> {
    let targets: Array1<bool> = y.iter().map(|l| l.is_preictal()).collect();
    Dataset::new(x.to_owned(), targets)
}

pub(crate) fn label_from_bool(preictal: bool) -> Label {
    if preictal {
        Label::Preictal
    } else {
        Label::Interictal
    }
}

/// Wrap an error raised by the underlying learning library.
pub(crate) fn library_error(estimator: &str, err: impl fmt::Display) -> ModelSelectionError {
    ModelSelectionError::config(format!("{}: {}", estimator, err))
}

pub(crate) fn squared_distance(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(u, v)| (u - v) * (u - v)).sum()
}

/// Two-column probability matrix `[P(interictal), P(preictal)]`.
pub(crate) fn binary_proba(positive: impl Iterator<Item = f64>) -> Array2<f64> {
    let p: Vec<f64> = positive.collect();
    Array2::from_shape_fn((p.len(), 2), |(i, j)| if j == 1 { p[i] } else { 1.0 - p[i] })
}

/// Fitted class order used by every family.
pub(crate) const BINARY_CLASSES: [Label; 2] = Label::ALL;

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_fit_input_requires_both_classes() {
        let x = array![[0.0], [1.0]];
        assert!(check_fit_input("t", x.view(), &[Label::Preictal, Label::Preictal]).is_err());
        assert!(check_fit_input("t", x.view(), &[Label::Preictal, Label::Interictal]).is_ok());
        assert!(check_fit_input("t", x.view(), &[Label::Preictal]).is_err());
    }

    #[test]
    fn test_binary_dataset_marks_preictal() {
        let x = array![[0.0], [1.0], [2.0]];
        let ds = binary_dataset(x.view(), &[Label::Preictal, Label::Interictal, Label::Preictal]);
        assert_eq!(ds.targets(), &array![true, false, true]);
        assert_eq!(ds.records().nrows(), 3);
    }

    #[test]
    fn test_binary_proba_columns() {
        let p = binary_proba([0.25, 1.0].into_iter());
        assert_eq!(p, array![[0.75, 0.25], [0.0, 1.0]]);
    }
}
