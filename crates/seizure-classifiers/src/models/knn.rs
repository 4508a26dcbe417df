use linfa_nn::distance::L2Dist;
use linfa_nn::{CommonNearestNeighbour, NearestNeighbour};
use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::data_handling::Label;
use crate::error::{ModelSelectionError, Result};
use crate::models::classifier_trait::Classifier;
use crate::models::params::{ParamReader, ParamSet};
use crate::models::utils::{
    binary_proba, check_fit_input, check_predict_input, label_from_bool, library_error,
    BINARY_CLASSES,
};

/// k-nearest-neighbours vote with uniform weights under the Euclidean distance.
///
/// `algorithm` picks the `linfa-nn` index: `ball_tree`, `kd_tree` (also used
/// for `auto`) or `brute` for a linear scan. All of them return exact
/// neighbours; only rows at equal distance may be picked differently. The
/// index borrows the training rows, so it is rebuilt for every prediction
/// call and only the rows are stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KNeighbors {
    pub n_neighbors: usize,
    pub algorithm: String,
    train_x: Option<Array2<f64>>,
    train_y: Vec<Label>,
    classes: Vec<Label>,
}

impl KNeighbors {
    pub const NAME: &'static str = "KNeighborsClassifier";

    pub fn from_params(params: &ParamSet) -> Result<Self> {
        let mut reader = ParamReader::new(Self::NAME, params);
        let n_neighbors = reader.usize("n_neighbors", 5)?;
        let algorithm = reader.choice(
            "algorithm",
            &["auto", "ball_tree", "kd_tree", "brute"],
            "auto",
        )?;
        reader.finish()?;
        if n_neighbors == 0 {
            return Err(ModelSelectionError::config(format!(
                "{}: n_neighbors must be at least 1",
                Self::NAME
            )));
        }
        Ok(KNeighbors {
            n_neighbors,
            algorithm,
            train_x: None,
            train_y: Vec::new(),
            classes: Vec::new(),
        })
    }

    fn index_kind(&self) -> CommonNearestNeighbour {
        match self.algorithm.as_str() {
            "ball_tree" => CommonNearestNeighbour::BallTree,
            "brute" => CommonNearestNeighbour::LinearSearch,
            _ => CommonNearestNeighbour::KdTree,
        }
    }

    /// Fraction of preictal rows among the nearest neighbours of each row.
    fn positive_fraction(&self, x: ArrayView2<f64>) -> Result<Vec<f64>> {
        let train_x = self.train_x.as_ref().ok_or_else(|| {
            ModelSelectionError::config(format!("{} has not been fitted", Self::NAME))
        })?;
        check_predict_input(Self::NAME, Some(train_x.ncols()), x)?;

        let index = self
            .index_kind()
            .from_batch(train_x, L2Dist)
            .map_err(|e| library_error(Self::NAME, e))?;
        let k = self.n_neighbors;
        x.rows()
            .into_iter()
            .map(|row| {
                let neighbours = index
                    .k_nearest(row, k)
                    .map_err(|e| library_error(Self::NAME, e))?;
                let positives = neighbours
                    .iter()
                    .filter(|(_, i)| self.train_y[*i].is_preictal())
                    .count();
                Ok(positives as f64 / k as f64)
            })
            .collect()
    }
}

impl Classifier for KNeighbors {
    fn fit(&mut self, x: ArrayView2<f64>, y: &[Label]) -> Result<()> {
        check_fit_input(Self::NAME, x, y)?;
        if self.n_neighbors > x.nrows() {
            return Err(ModelSelectionError::config(format!(
                "{}: n_neighbors={} exceeds the {} training rows",
                Self::NAME,
                self.n_neighbors,
                x.nrows()
            )));
        }
        self.train_x = Some(x.to_owned());
        self.train_y = y.to_vec();
        self.classes = BINARY_CLASSES.to_vec();
        Ok(())
    }

    fn predict(&self, x: ArrayView2<f64>) -> Result<Vec<Label>> {
        // majority vote; an even split goes to the first class
        Ok(self
            .positive_fraction(x)?
            .into_iter()
            .map(|p| label_from_bool(p > 0.5))
            .collect())
    }

    fn supports_proba(&self) -> bool {
        true
    }

    fn predict_proba(&self, x: ArrayView2<f64>) -> Result<Array2<f64>> {
        Ok(binary_proba(self.positive_fraction(x)?.into_iter()))
    }

    fn classes(&self) -> &[Label] {
        &self.classes
    }

    fn name(&self) -> &str {
        Self::NAME
    }
}
