use ndarray::{Array1, Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use statrs::statistics::{Data, Median};

use crate::data_handling::Label;
use crate::error::{ModelSelectionError, Result};
use crate::models::classifier_trait::Classifier;
use crate::models::params::{ParamReader, ParamSet};
use crate::models::utils::{check_fit_input, check_predict_input, squared_distance, BINARY_CLASSES};

/// Nearest (shrunken) centroid classifier.
///
/// With a `shrink_threshold`, each class centroid is pulled towards the
/// overall centroid by soft-thresholding its standardized deviation
/// (Tibshirani et al. 2002). Per-feature spreads are the pooled
/// within-class standard deviations offset by their median.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NearestCentroid {
    pub shrink_threshold: Option<f64>,
    /// Rows are classes in `classes` order
    centroids: Option<Array2<f64>>,
    classes: Vec<Label>,
}

impl NearestCentroid {
    pub const NAME: &'static str = "NearestCentroid";

    pub fn from_params(params: &ParamSet) -> Result<Self> {
        let mut reader = ParamReader::new(Self::NAME, params);
        let shrink_threshold = reader.opt_f64("shrink_threshold")?;
        reader.finish()?;
        if let Some(t) = shrink_threshold {
            if t < 0.0 {
                return Err(ModelSelectionError::config(format!(
                    "{}: shrink_threshold must be non-negative, got {}",
                    Self::NAME,
                    t
                )));
            }
        }
        Ok(NearestCentroid {
            shrink_threshold,
            centroids: None,
            classes: Vec::new(),
        })
    }

    pub fn centroids(&self) -> Option<&Array2<f64>> {
        self.centroids.as_ref()
    }
}

impl Classifier for NearestCentroid {
    fn fit(&mut self, x: ArrayView2<f64>, y: &[Label]) -> Result<()> {
        check_fit_input(Self::NAME, x, y)?;
        let (n, d) = x.dim();
        let classes = BINARY_CLASSES;

        let members: Vec<Vec<usize>> = classes
            .iter()
            .map(|&c| (0..n).filter(|&i| y[i] == c).collect())
            .collect();

        let mut centroids = Array2::<f64>::zeros((classes.len(), d));
        for (k, rows) in members.iter().enumerate() {
            let class_rows = x.select(Axis(0), rows);
            if let Some(mean) = class_rows.mean_axis(Axis(0)) {
                centroids.row_mut(k).assign(&mean);
            }
        }

        if let Some(threshold) = self.shrink_threshold {
            if n <= classes.len() {
                return Err(ModelSelectionError::config(format!(
                    "{}: shrinkage needs more rows than classes, got {} rows",
                    Self::NAME,
                    n
                )));
            }
            let overall = x.mean_axis(Axis(0)).ok_or_else(|| {
                ModelSelectionError::config(format!("{}: empty training data", Self::NAME))
            })?;

            let mut variance = Array1::<f64>::zeros(d);
            for (k, rows) in members.iter().enumerate() {
                for &i in rows {
                    let diff = &x.row(i) - &centroids.row(k);
                    variance += &diff.mapv(|v| v * v);
                }
            }
            variance /= (n - classes.len()) as f64;

            let mut spread = variance.mapv(f64::sqrt);
            let median = Data::new(spread.to_vec()).median();
            spread += median;

            for (k, rows) in members.iter().enumerate() {
                let m = (1.0 / rows.len() as f64 - 1.0 / n as f64).sqrt();
                for j in 0..d {
                    let ms = m * spread[j];
                    if ms == 0.0 {
                        centroids[[k, j]] = overall[j];
                        continue;
                    }
                    let deviation = (centroids[[k, j]] - overall[j]) / ms;
                    let shrunk = deviation.signum() * (deviation.abs() - threshold).max(0.0);
                    centroids[[k, j]] = overall[j] + ms * shrunk;
                }
            }
        }

        self.centroids = Some(centroids);
        self.classes = classes.to_vec();
        Ok(())
    }

    fn predict(&self, x: ArrayView2<f64>) -> Result<Vec<Label>> {
        let centroids = self.centroids.as_ref().ok_or_else(|| {
            ModelSelectionError::config(format!("{} has not been fitted", Self::NAME))
        })?;
        check_predict_input(Self::NAME, Some(centroids.ncols()), x)?;
        Ok(x.rows()
            .into_iter()
            .map(|row| {
                let mut best = 0;
                let mut best_dist = f64::INFINITY;
                for (k, centroid) in centroids.rows().into_iter().enumerate() {
                    let dist = squared_distance(row, centroid);
                    if dist < best_dist {
                        best = k;
                        best_dist = dist;
                    }
                }
                self.classes[best]
            })
            .collect())
    }

    fn classes(&self) -> &[Label] {
        &self.classes
    }

    fn name(&self) -> &str {
        Self::NAME
    }
}
