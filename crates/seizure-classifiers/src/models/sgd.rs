//! Linear classifiers with the `SGDClassifier` parameter surface.
//!
//! Both losses minimize `mean loss + alpha R(w)` with the elastic-net penalty
//! `R(w) = (1 - l1_ratio) / 2 |w|^2 + l1_ratio |w|_1`.
//!
//! * `log` is trained online with linfa's FTRL-Proximal learner, one pass
//!   per epoch over a seeded shuffle of the rows, until the training log loss
//!   stops improving by `tol` for `n_iter_no_change` epochs. The L1 and L2
//!   shares of `alpha` become FTRL's L1 and L2 strengths, and the intercept
//!   is a constant feature column.
//! * `hinge` is a linear-kernel `linfa-svm` model with `C = 1 / (alpha n)`;
//!   L1 and elastic-net penalties go through [`fit_elastic_net`].
use linfa::dataset::Pr;
use linfa::traits::{Fit, FitWith, Predict};
use linfa::{Dataset, ParamGuard};
use linfa_ftrl::Ftrl;
use linfa_svm::Svm;
use ndarray::{concatenate, Array1, Array2, ArrayView2, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::data_handling::Label;
use crate::error::{ModelSelectionError, Result};
use crate::models::classifier_trait::Classifier;
use crate::models::params::{ParamReader, ParamSet};
use crate::models::penalty::fit_elastic_net;
use crate::models::utils::{
    binary_proba, check_fit_input, check_predict_input, label_from_bool, library_error,
    BINARY_CLASSES,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SgdLoss {
    Hinge,
    Log,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
enum FittedLinear {
    Online(Ftrl<f64>),
    Margin {
        model: Svm<f64, bool>,
        column_scale: Array1<f64>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SgdClassifier {
    pub loss: SgdLoss,
    pub alpha: f64,
    /// Share of the penalty that is L1 (0 for l2, 1 for l1)
    pub l1_ratio: f64,
    /// FTRL learning rate of the log loss
    pub eta0: f64,
    pub max_iter: usize,
    pub tol: f64,
    pub n_iter_no_change: usize,
    pub shuffle: bool,
    pub fit_intercept: bool,
    pub random_state: u64,
    fitted: Option<FittedLinear>,
    n_features: Option<usize>,
    classes: Vec<Label>,
}

impl SgdClassifier {
    pub const NAME: &'static str = "SGDClassifier";

    pub fn from_params(params: &ParamSet) -> Result<Self> {
        let mut reader = ParamReader::new(Self::NAME, params);
        let loss = match reader
            .choice("loss", &["hinge", "log", "log_loss"], "hinge")?
            .as_str()
        {
            "hinge" => SgdLoss::Hinge,
            _ => SgdLoss::Log,
        };
        let penalty = reader.choice("penalty", &["l1", "l2", "elasticnet"], "l2")?;
        let alpha = reader.f64("alpha", 1e-4)?;
        let elastic_ratio = reader.f64("l1_ratio", 0.15)?;
        let eta0 = reader.f64("eta0", 0.5)?;
        let max_iter = reader.usize("max_iter", 1000)?;
        let tol = reader.f64("tol", 1e-3)?;
        let n_iter_no_change = reader.usize("n_iter_no_change", 5)?;
        let shuffle = reader.bool("shuffle", true)?;
        let fit_intercept = reader.bool("fit_intercept", true)?;
        let random_state = reader.seed("random_state", 0)?;
        reader.finish()?;

        if alpha <= 0.0 {
            return Err(ModelSelectionError::config(format!(
                "{}: alpha must be positive, got {}",
                Self::NAME,
                alpha
            )));
        }
        if !(0.0..=1.0).contains(&elastic_ratio) {
            return Err(ModelSelectionError::config(format!(
                "{}: l1_ratio must be in [0, 1], got {}",
                Self::NAME,
                elastic_ratio
            )));
        }
        if eta0 <= 0.0 || max_iter == 0 {
            return Err(ModelSelectionError::config(format!(
                "{}: eta0 and max_iter must be positive, got {} and {}",
                Self::NAME,
                eta0,
                max_iter
            )));
        }
        let l1_ratio = match penalty.as_str() {
            "l1" => 1.0,
            "l2" => 0.0,
            _ => elastic_ratio,
        };

        Ok(SgdClassifier {
            loss,
            alpha,
            l1_ratio,
            eta0,
            max_iter,
            tol,
            n_iter_no_change: n_iter_no_change.max(1),
            shuffle,
            fit_intercept,
            random_state,
            fitted: None,
            n_features: None,
            classes: Vec::new(),
        })
    }

    /// Rows as seen by the online learner: a trailing column of ones when an
    /// intercept is fitted.
    fn online_records(&self, x: ArrayView2<f64>) -> Result<Array2<f64>> {
        if !self.fit_intercept {
            return Ok(x.to_owned());
        }
        let ones = Array2::<f64>::ones((x.nrows(), 1));
        concatenate(Axis(1), &[x.view(), ones.view()])
            .map_err(|e| ModelSelectionError::config(format!("{}: {}", Self::NAME, e)))
    }

    fn fit_online(&self, x: ArrayView2<f64>, targets: &Array1<bool>) -> Result<FittedLinear> {
        let records = self.online_records(x)?;
        let params = Ftrl::params()
            .alpha(self.eta0)
            .beta(1.0)
            .l1_ratio(self.alpha * self.l1_ratio)
            .l2_ratio(self.alpha * (1.0 - self.l1_ratio))
            .check()
            .map_err(|e| library_error(Self::NAME, e))?;

        let mut rng = StdRng::seed_from_u64(self.random_state);
        let mut order: Vec<usize> = (0..records.nrows()).collect();
        let mut model: Option<Ftrl<f64>> = None;
        let mut best_loss = f64::INFINITY;
        let mut no_improvement = 0;

        for epoch in 0..self.max_iter {
            if self.shuffle {
                order.shuffle(&mut rng);
            }
            let epoch_data = Dataset::new(
                records.select(Axis(0), &order),
                targets.select(Axis(0), &order),
            );
            let fitted = params
                .fit_with(model.take(), &epoch_data)
                .map_err(|e| library_error(Self::NAME, e))?;
            let proba: Array1<Pr> = fitted.predict(&records);
            let loss = mean_log_loss(&proba, targets);
            model = Some(fitted);

            if !loss.is_finite() {
                return Err(ModelSelectionError::config(format!(
                    "{}: log loss diverged in epoch {} (alpha={})",
                    Self::NAME,
                    epoch,
                    self.alpha
                )));
            }
            if loss > best_loss - self.tol {
                no_improvement += 1;
            } else {
                no_improvement = 0;
            }
            best_loss = best_loss.min(loss);
            if no_improvement >= self.n_iter_no_change {
                log::trace!("{} stopped after {} epochs", Self::NAME, epoch + 1);
                break;
            }
        }

        model
            .map(FittedLinear::Online)
            .ok_or_else(|| ModelSelectionError::config(format!("{}: no epochs ran", Self::NAME)))
    }

    fn fit_margin(&self, x: ArrayView2<f64>, targets: &Array1<bool>) -> Result<FittedLinear> {
        let c = 1.0 / (self.alpha * x.nrows() as f64);
        let fitted = fit_elastic_net(x, self.l1_ratio, self.tol, |scaled| {
            let n_features = scaled.ncols();
            let model = Svm::<f64, bool>::params()
                .eps(self.tol)
                .pos_neg_weights(c, c)
                .linear_kernel()
                .fit(&Dataset::new(scaled, targets.clone()))
                .map_err(|e| library_error(Self::NAME, e))?;
            let coef = linear_weights(&model, n_features);
            Ok((model, coef))
        })?;
        Ok(FittedLinear::Margin {
            model: fitted.model,
            column_scale: fitted.column_scale,
        })
    }

    fn fitted(&self, x: ArrayView2<f64>) -> Result<&FittedLinear> {
        check_predict_input(Self::NAME, self.n_features, x)?;
        self.fitted.as_ref().ok_or_else(|| {
            ModelSelectionError::config(format!("{} has not been fitted", Self::NAME))
        })
    }

    fn preictal_probability(&self, x: ArrayView2<f64>) -> Result<Vec<f64>> {
        match self.fitted(x)? {
            FittedLinear::Online(model) => {
                let proba: Array1<Pr> = model.predict(&self.online_records(x)?);
                Ok(proba.iter().map(|p| f64::from(**p)).collect())
            }
            FittedLinear::Margin { .. } => Err(ModelSelectionError::config(
                "SGDClassifier probabilities are only available for log loss",
            )),
        }
    }
}

/// Weights of a linear-kernel SVM, read off its response to unit vectors.
fn linear_weights(model: &Svm<f64, bool>, n_features: usize) -> Array1<f64> {
    let unit = Array2::<f64>::eye(n_features);
    unit.rows()
        .into_iter()
        .map(|e| model.weighted_sum(&e))
        .collect()
}

fn mean_log_loss(proba: &Array1<Pr>, targets: &Array1<bool>) -> f64 {
    let total: f64 = proba
        .iter()
        .zip(targets.iter())
        .map(|(p, &preictal)| {
            let p = f64::from(**p).clamp(1e-15, 1.0 - 1e-15);
            if preictal {
                -p.ln()
            } else {
                -(1.0 - p).ln()
            }
        })
        .sum();
    total / targets.len() as f64
}

impl Classifier for SgdClassifier {
    fn fit(&mut self, x: ArrayView2<f64>, y: &[Label]) -> Result<()> {
        check_fit_input(Self::NAME, x, y)?;
        let targets: Array1<bool> = y.iter().map(|l| l.is_preictal()).collect();
        let fitted = match self.loss {
            SgdLoss::Log => self.fit_online(x, &targets)?,
            SgdLoss::Hinge => self.fit_margin(x, &targets)?,
        };
        self.fitted = Some(fitted);
        self.n_features = Some(x.ncols());
        self.classes = BINARY_CLASSES.to_vec();
        Ok(())
    }

    fn predict(&self, x: ArrayView2<f64>) -> Result<Vec<Label>> {
        match self.fitted(x)? {
            FittedLinear::Online(_) => Ok(self
                .preictal_probability(x)?
                .into_iter()
                .map(|p| label_from_bool(p > 0.5))
                .collect()),
            FittedLinear::Margin {
                model,
                column_scale,
            } => {
                let predicted: Array1<bool> = model.predict(&(&x * column_scale));
                Ok(predicted.iter().map(|&b| label_from_bool(b)).collect())
            }
        }
    }

    fn supports_proba(&self) -> bool {
        self.loss == SgdLoss::Log
    }

    fn predict_proba(&self, x: ArrayView2<f64>) -> Result<Array2<f64>> {
        Ok(binary_proba(self.preictal_probability(x)?.into_iter()))
    }

    fn classes(&self) -> &[Label] {
        &self.classes
    }

    fn name(&self) -> &str {
        Self::NAME
    }
}
