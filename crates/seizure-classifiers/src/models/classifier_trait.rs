use ndarray::{Array2, ArrayView2};

use crate::data_handling::Label;
use crate::error::{ModelSelectionError, Result};

/// Capability contract shared by every estimator family.
///
/// Probability columns follow the order of [`Classifier::classes`], so callers
/// must look the positive class up instead of assuming a column index.
pub trait Classifier {
    /// Fit on `x` (n_rows, n_features) with one label per row.
    fn fit(&mut self, x: ArrayView2<f64>, y: &[Label]) -> Result<()>;

    /// Hard class predictions.
    fn predict(&self, x: ArrayView2<f64>) -> Result<Vec<Label>>;

    /// Whether [`Classifier::predict_proba`] is available for this configuration.
    fn supports_proba(&self) -> bool {
        false
    }

    /// Class membership probabilities, shape (n_rows, n_classes).
    fn predict_proba(&self, _x: ArrayView2<f64>) -> Result<Array2<f64>> {
        Err(ModelSelectionError::config(format!(
            "{} does not provide class probabilities",
            self.name()
        )))
    }

    /// Class ordering of the probability columns; empty before fitting.
    fn classes(&self) -> &[Label];

    /// Human readable name of the estimator.
    fn name(&self) -> &str {
        "classifier"
    }
}
