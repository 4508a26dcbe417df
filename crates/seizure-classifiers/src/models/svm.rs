//! C-support vector classification on top of `linfa-svm`.
//!
//! Parameters follow the usual `C`/`kernel`/`gamma` names and are translated
//! into a [`SvmParams`] at fit time. With `probability` set the model carries
//! Platt coefficients and predicts a preictal probability per row; otherwise
//! it predicts hard labels only.
use linfa::dataset::Pr;
use linfa::traits::{Fit, Predict};
use linfa_svm::{Svm, SvmParams};
use ndarray::{Array1, Array2, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::data_handling::Label;
use crate::error::{ModelSelectionError, Result};
use crate::models::classifier_trait::Classifier;
use crate::models::params::{ParamReader, ParamSet, ParamValue};
use crate::models::utils::{
    binary_dataset, binary_proba, check_fit_input, check_predict_input, label_from_bool,
    library_error, BINARY_CLASSES,
};

/// How `gamma` is resolved once the training data is known.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gamma {
    /// `1 / n_features` (also selected by a numeric 0)
    Auto,
    /// `1 / (n_features * var(X))`
    Scale,
    Value(f64),
}

impl Gamma {
    fn from_param(value: Option<&ParamValue>) -> Result<Gamma> {
        match value {
            None => Ok(Gamma::Auto),
            Some(ParamValue::Text(s)) if s == "auto" => Ok(Gamma::Auto),
            Some(ParamValue::Text(s)) if s == "scale" => Ok(Gamma::Scale),
            Some(v) => match v.as_f64() {
                Some(g) if g == 0.0 => Ok(Gamma::Auto),
                Some(g) if g > 0.0 => Ok(Gamma::Value(g)),
                _ => Err(ModelSelectionError::config(format!(
                    "SVC: gamma must be positive, 0, 'auto' or 'scale', got {}",
                    v
                ))),
            },
        }
    }

    fn resolve(&self, x: ArrayView2<f64>) -> f64 {
        let n_features = x.ncols() as f64;
        match *self {
            Gamma::Auto => 1.0 / n_features,
            Gamma::Scale => {
                let n = x.len() as f64;
                let mean = x.sum() / n;
                let var = x.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
                if var > 0.0 {
                    1.0 / (n_features * var)
                } else {
                    1.0
                }
            }
            Gamma::Value(g) => g,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SvcParams {
    pub c: f64,
    pub kernel: String,
    pub gamma: Gamma,
    pub coef0: f64,
    pub degree: u32,
    pub probability: bool,
    pub balanced: bool,
    pub tol: f64,
    pub random_state: u64,
}

impl Default for SvcParams {
    fn default() -> Self {
        SvcParams {
            c: 1.0,
            kernel: "rbf".to_string(),
            gamma: Gamma::Auto,
            coef0: 0.0,
            degree: 3,
            probability: false,
            balanced: false,
            tol: 1e-3,
            random_state: 0,
        }
    }
}

/// The fitted library model; only the calibrated variant yields probabilities.
#[derive(Debug, Clone, Serialize, Deserialize)]
enum FittedSvm {
    Calibrated(Svm<f64, Pr>),
    Hard(Svm<f64, bool>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Svc {
    pub params: SvcParams,
    model: Option<FittedSvm>,
    n_features: Option<usize>,
    classes: Vec<Label>,
}

impl Svc {
    pub const NAME: &'static str = "SVC";

    pub fn new(params: SvcParams) -> Self {
        Svc {
            params,
            model: None,
            n_features: None,
            classes: Vec::new(),
        }
    }

    /// Parameters on top of `base`; anything not named in `params` keeps the base value.
    pub fn from_params_with_base(params: &ParamSet, base: SvcParams) -> Result<Self> {
        let mut reader = ParamReader::new(Self::NAME, params);
        let c = reader.f64("C", base.c)?;
        let kernel = reader.choice("kernel", &["rbf", "linear", "poly"], &base.kernel)?;
        let gamma = match reader.raw("gamma") {
            None => base.gamma,
            some => Gamma::from_param(some)?,
        };
        let coef0 = reader.f64("coef0", base.coef0)?;
        let degree = reader.usize("degree", base.degree as usize)? as u32;
        let probability = reader.bool("probability", base.probability)?;
        let balanced = match reader.raw("class_weight") {
            None => base.balanced,
            Some(ParamValue::None) => false,
            Some(ParamValue::Text(s)) if s == "balanced" || s == "auto" => true,
            Some(other) => {
                return Err(ModelSelectionError::config(format!(
                    "{}: class_weight must be None, 'balanced' or 'auto', got {}",
                    Self::NAME,
                    other
                )))
            }
        };
        let tol = reader.f64("tol", base.tol)?;
        let random_state = reader.seed("random_state", base.random_state)?;
        reader.finish()?;

        if c <= 0.0 {
            return Err(ModelSelectionError::config(format!(
                "{}: C must be positive, got {}",
                Self::NAME,
                c
            )));
        }
        if tol <= 0.0 {
            return Err(ModelSelectionError::config(format!(
                "{}: tol must be positive, got {}",
                Self::NAME,
                tol
            )));
        }

        Ok(Svc::new(SvcParams {
            c,
            kernel,
            gamma,
            coef0,
            degree,
            probability,
            balanced,
            tol,
            random_state,
        }))
    }

    pub fn from_params(params: &ParamSet) -> Result<Self> {
        Self::from_params_with_base(params, SvcParams::default())
    }

    /// Number of support vectors of the fitted model.
    pub fn n_support(&self) -> usize {
        match &self.model {
            Some(FittedSvm::Calibrated(m)) => m.nsupport(),
            Some(FittedSvm::Hard(m)) => m.nsupport(),
            None => 0,
        }
    }

    /// Per-class box constraints `(C+, C-)`, reweighted inversely to class
    /// frequency when `balanced` is set.
    fn class_costs(&self, y: &[Label]) -> (f64, f64) {
        let n = y.len() as f64;
        let n_pos = y.iter().filter(|l| l.is_preictal()).count() as f64;
        let n_neg = n - n_pos;
        if self.params.balanced {
            (
                self.params.c * n / (2.0 * n_pos),
                self.params.c * n / (2.0 * n_neg),
            )
        } else {
            (self.params.c, self.params.c)
        }
    }

    /// Library parameters for a training matrix `x`.
    ///
    /// linfa's Gaussian kernel is `exp(-|a - b|^2 / eps)`, so `eps = 1 / gamma`.
    /// Its polynomial kernel has no gamma: `(gamma a.b + coef0)^d` equals
    /// `gamma^d (a.b + coef0 / gamma)^d`, and the `gamma^d` factor is folded
    /// into the box constraints.
    fn library_params<T>(&self, x: ArrayView2<f64>, y: &[Label]) -> SvmParams<f64, T> {
        let (c_pos, c_neg) = self.class_costs(y);
        let base = Svm::<f64, T>::params().eps(self.params.tol);
        match self.params.kernel.as_str() {
            "linear" => base.pos_neg_weights(c_pos, c_neg).linear_kernel(),
            "poly" => {
                let gamma = self.params.gamma.resolve(x);
                let scale = gamma.powi(self.params.degree as i32);
                base.pos_neg_weights(c_pos * scale, c_neg * scale)
                    .polynomial_kernel(self.params.coef0 / gamma, f64::from(self.params.degree))
            }
            _ => base
                .pos_neg_weights(c_pos, c_neg)
                .gaussian_kernel(1.0 / self.params.gamma.resolve(x)),
        }
    }

    fn fitted(&self, x: ArrayView2<f64>) -> Result<&FittedSvm> {
        check_predict_input(Self::NAME, self.n_features, x)?;
        self.model.as_ref().ok_or_else(|| {
            ModelSelectionError::config(format!("{} has not been fitted", Self::NAME))
        })
    }

    fn preictal_probability(&self, x: ArrayView2<f64>) -> Result<Vec<f64>> {
        match self.fitted(x)? {
            FittedSvm::Calibrated(model) => {
                let p: Array1<Pr> = model.predict(&x.to_owned());
                Ok(p.iter().map(|v| f64::from(**v)).collect())
            }
            FittedSvm::Hard(_) => Err(ModelSelectionError::config(
                "SVC probabilities require probability=true",
            )),
        }
    }
}

impl Classifier for Svc {
    fn fit(&mut self, x: ArrayView2<f64>, y: &[Label]) -> Result<()> {
        check_fit_input(Self::NAME, x, y)?;
        let dataset = binary_dataset(x, y);

        let model = if self.params.probability {
            let params = self.library_params::<Pr>(x, y);
            FittedSvm::Calibrated(params.fit(&dataset).map_err(|e| library_error(Self::NAME, e))?)
        } else {
            let params = self.library_params::<bool>(x, y);
            FittedSvm::Hard(params.fit(&dataset).map_err(|e| library_error(Self::NAME, e))?)
        };

        self.model = Some(model);
        self.n_features = Some(x.ncols());
        self.classes = BINARY_CLASSES.to_vec();
        log::trace!(
            "{} fitted with {} support vectors",
            Self::NAME,
            self.n_support()
        );
        Ok(())
    }

    fn predict(&self, x: ArrayView2<f64>) -> Result<Vec<Label>> {
        match self.fitted(x)? {
            FittedSvm::Calibrated(_) => Ok(self
                .preictal_probability(x)?
                .into_iter()
                .map(|p| label_from_bool(p > 0.5))
                .collect()),
            FittedSvm::Hard(model) => {
                let predicted: Array1<bool> = model.predict(&x.to_owned());
                Ok(predicted.iter().map(|&b| label_from_bool(b)).collect())
            }
        }
    }

    fn supports_proba(&self) -> bool {
        self.params.probability
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
