//! L1/L2 penalized logistic regression on top of `linfa-logistic`.
//!
//! `C` is the inverse regularization strength, so the L2 model is fitted with
//! `alpha = 1 / C`. The L1 model goes through [`fit_elastic_net`] with a pure
//! L1 ratio; its ridge term is half the L1 norm, hence `alpha = 2 / C`.
use linfa::traits::Fit;
use linfa::Dataset;
use linfa_logistic::{FittedLogisticRegression, LogisticRegression as LinfaLogistic};
use ndarray::{Array1, Array2, ArrayView2, Ix1};
use serde::{Deserialize, Serialize};

use crate::data_handling::Label;
use crate::error::{ModelSelectionError, Result};
use crate::models::classifier_trait::Classifier;
use crate::models::params::{ParamReader, ParamSet};
use crate::models::penalty::fit_elastic_net;
use crate::models::utils::{
    binary_dataset, binary_proba, check_fit_input, check_predict_input, label_from_bool,
    library_error, BINARY_CLASSES,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Penalty {
    L1,
    L2,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct FittedModel {
    model: FittedLogisticRegression<f64, bool>,
    /// Column scale applied before the library model; `None` for L2.
    column_scale: Option<Array1<f64>>,
}

impl FittedModel {
    fn records(&self, x: ArrayView2<f64>) -> Array2<f64> {
        match &self.column_scale {
            Some(scale) => &x * scale,
            None => x.to_owned(),
        }
    }

    /// Probability of the preictal class for every row.
    fn preictal_probability(&self, x: ArrayView2<f64>) -> Array1<f64> {
        let p = self.model.predict_probabilities(&self.records(x));
        if self.model.labels().pos.class {
            p
        } else {
            p.mapv(|v| 1.0 - v)
        }
    }

    /// Weights in the original feature space, oriented towards preictal.
    fn coef(&self) -> Array1<f64> {
        let mut w = self.model.params().to_owned();
        if let Some(scale) = &self.column_scale {
            w *= scale;
        }
        if self.model.labels().pos.class {
            w
        } else {
            -w
        }
    }

    fn intercept(&self) -> f64 {
        if self.model.labels().pos.class {
            self.model.intercept()
        } else {
            -self.model.intercept()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticRegression {
    pub c: f64,
    pub penalty: Penalty,
    pub tol: f64,
    pub max_iter: usize,
    pub fit_intercept: bool,
    pub random_state: u64,
    fitted: Option<FittedModel>,
    n_features: Option<usize>,
    classes: Vec<Label>,
}

impl LogisticRegression {
    pub const NAME: &'static str = "LogisticRegression";

    pub fn from_params(params: &ParamSet) -> Result<Self> {
        let mut reader = ParamReader::new(Self::NAME, params);
        let c = reader.f64("C", 1.0)?;
        let penalty = match reader.choice("penalty", &["l1", "l2"], "l2")?.as_str() {
            "l1" => Penalty::L1,
            _ => Penalty::L2,
        };
        let tol = reader.f64("tol", 1e-4)?;
        let max_iter = reader.usize("max_iter", 1000)?;
        let fit_intercept = reader.bool("fit_intercept", true)?;
        let random_state = reader.seed("random_state", 0)?;
        reader.finish()?;

        if c <= 0.0 {
            return Err(ModelSelectionError::config(format!(
                "{}: C must be positive, got {}",
                Self::NAME,
                c
            )));
        }

        Ok(LogisticRegression {
            c,
            penalty,
            tol,
            max_iter,
            fit_intercept,
            random_state,
            fitted: None,
            n_features: None,
            classes: Vec::new(),
        })
    }

    pub fn coef(&self) -> Option<Array1<f64>> {
        self.fitted.as_ref().map(FittedModel::coef)
    }

    pub fn intercept(&self) -> f64 {
        self.fitted.as_ref().map_or(0.0, FittedModel::intercept)
    }

    fn library_fit(
        &self,
        alpha: f64,
        dataset: &Dataset<f64, bool, Ix1>,
    ) -> Result<FittedLogisticRegression<f64, bool>> {
        LinfaLogistic::default()
            .alpha(alpha)
            .with_intercept(self.fit_intercept)
            .max_iterations(self.max_iter as u64)
            .gradient_tolerance(self.tol)
            .fit(dataset)
            .map_err(|e| library_error(Self::NAME, e))
    }

    fn fit_l1(&self, x: ArrayView2<f64>, y: &[Label]) -> Result<FittedModel> {
        let targets: Array1<bool> = y.iter().map(|l| l.is_preictal()).collect();
        let fitted = fit_elastic_net(x, 1.0, self.tol, |scaled| {
            let model = self.library_fit(2.0 / self.c, &Dataset::new(scaled, targets.clone()))?;
            let coef = model.params().to_owned();
            Ok((model, coef))
        })?;
        Ok(FittedModel {
            model: fitted.model,
            column_scale: Some(fitted.column_scale),
        })
    }

    fn fitted(&self, x: ArrayView2<f64>) -> Result<&FittedModel> {
        check_predict_input(Self::NAME, self.n_features, x)?;
        self.fitted.as_ref().ok_or_else(|| {
            ModelSelectionError::config(format!("{} has not been fitted", Self::NAME))
        })
    }
}

impl Classifier for LogisticRegression {
    fn fit(&mut self, x: ArrayView2<f64>, y: &[Label]) -> Result<()> {
        check_fit_input(Self::NAME, x, y)?;
        let fitted = match self.penalty {
            Penalty::L2 => FittedModel {
                model: self.library_fit(1.0 / self.c, &binary_dataset(x, y))?,
                column_scale: None,
            },
            Penalty::L1 => self.fit_l1(x, y)?,
        };
        self.fitted = Some(fitted);
        self.n_features = Some(x.ncols());
        self.classes = BINARY_CLASSES.to_vec();
        Ok(())
    }

    fn predict(&self, x: ArrayView2<f64>) -> Result<Vec<Label>> {
        Ok(self
            .fitted(x)?
            .preictal_probability(x)
            .iter()
            .map(|&p| label_from_bool(p > 0.5))
            .collect())
    }

    fn supports_proba(&self) -> bool {
        true
    }

    fn predict_proba(&self, x: ArrayView2<f64>) -> Result<Array2<f64>> {
        let p = self.fitted(x)?.preictal_probability(x);
        Ok(binary_proba(p.into_iter()))
    }

    fn classes(&self) -> &[Label] {
        &self.classes
    }

    fn name(&self) -> &str {
        Self::NAME
    }
}
