//! Bagged RBF support vector machines.
use ndarray::{Array2, ArrayView2};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::data_handling::Label;
use crate::error::{ModelSelectionError, Result};
use crate::models::classifier_trait::Classifier;
use crate::models::ensemble::{draw, fit_member, member_seeds, vote_fraction, Member, Vote};
use crate::models::params::{ParamReader, ParamSet, ParamValue};
use crate::models::svm::{Gamma, Svc, SvcParams};
use crate::models::utils::{
    binary_proba, check_fit_input, check_predict_input, label_from_bool, BINARY_CLASSES,
};

/// Base learner of every bag: RBF kernel, C = 500, balanced class weights,
/// no probability output.
pub fn base_svc_params(random_state: u64) -> SvcParams {
    SvcParams {
        c: 500.0,
        kernel: "rbf".to_string(),
        gamma: Gamma::Auto,
        probability: false,
        balanced: true,
        random_state,
        ..SvcParams::default()
    }
}

/// Absolute count or fraction of the available rows/features.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DrawSize {
    Count(usize),
    Fraction(f64),
}

impl DrawSize {
    fn from_param(name: &str, value: Option<&ParamValue>) -> Result<DrawSize> {
        match value {
            None => Ok(DrawSize::Fraction(1.0)),
            Some(ParamValue::Int(n)) if *n > 0 => Ok(DrawSize::Count(*n as usize)),
            Some(ParamValue::Float(f)) if *f > 0.0 && *f <= 1.0 => Ok(DrawSize::Fraction(*f)),
            Some(other) => Err(ModelSelectionError::config(format!(
                "BaggingClassifier: {} must be a positive count or a fraction in (0, 1], got {}",
                name, other
            ))),
        }
    }

    fn resolve(&self, available: usize) -> usize {
        match *self {
            DrawSize::Count(n) => n,
            DrawSize::Fraction(f) => ((f * available as f64) as usize).max(1),
        }
    }
}

impl Vote for Svc {
    fn vote(&self, x: ArrayView2<f64>) -> Result<Vec<Label>> {
        self.predict(x)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaggingSvc {
    pub n_estimators: usize,
    pub max_samples: DrawSize,
    pub max_features: DrawSize,
    pub bootstrap: bool,
    pub bootstrap_features: bool,
    pub random_state: u64,
    members: Vec<Member<Svc>>,
    n_features: Option<usize>,
    classes: Vec<Label>,
}

impl BaggingSvc {
    pub const NAME: &'static str = "BaggingClassifier";

    pub fn from_params(params: &ParamSet) -> Result<Self> {
        let mut reader = ParamReader::new(Self::NAME, params);
        let n_estimators = reader.usize("n_estimators", 10)?;
        let max_samples = DrawSize::from_param("max_samples", reader.raw("max_samples"))?;
        let max_features = DrawSize::from_param("max_features", reader.raw("max_features"))?;
        let bootstrap = reader.bool("bootstrap", true)?;
        let bootstrap_features = reader.bool("bootstrap_features", false)?;
        let random_state = reader.seed("random_state", 0)?;
        reader.finish()?;

        if n_estimators == 0 {
            return Err(ModelSelectionError::config(
                "BaggingClassifier: n_estimators must be at least 1",
            ));
        }

        Ok(BaggingSvc {
            n_estimators,
            max_samples,
            max_features,
            bootstrap,
            bootstrap_features,
            random_state,
            members: Vec::new(),
            n_features: None,
            classes: Vec::new(),
        })
    }

    /// Fraction of members voting preictal.
    fn vote_fraction(&self, x: ArrayView2<f64>) -> Result<Vec<f64>> {
        check_predict_input(Self::NAME, self.n_features, x)?;
        vote_fraction(&self.members, x)
    }
}

impl Classifier for BaggingSvc {
    fn fit(&mut self, x: ArrayView2<f64>, y: &[Label]) -> Result<()> {
        check_fit_input(Self::NAME, x, y)?;
        let (n, d) = x.dim();
        let n_samples = self.max_samples.resolve(n);
        let n_draw_features = self.max_features.resolve(d);
        if !self.bootstrap && n_samples > n {
            return Err(ModelSelectionError::config(format!(
                "{}: max_samples={} exceeds the {} rows without bootstrap",
                Self::NAME,
                n_samples,
                n
            )));
        }
        if !self.bootstrap_features && n_draw_features > d {
            return Err(ModelSelectionError::config(format!(
                "{}: max_features={} exceeds the {} features without bootstrap",
                Self::NAME,
                n_draw_features,
                d
            )));
        }

        let base = base_svc_params(self.random_state);
        let (bootstrap, bootstrap_features) = (self.bootstrap, self.bootstrap_features);

        let members = member_seeds(self.random_state, self.n_estimators)
            .into_par_iter()
            .map(|seed| {
                let mut rng = StdRng::seed_from_u64(seed);
                let features = draw(&mut rng, d, n_draw_features, bootstrap_features);
                let rows = draw(&mut rng, n, n_samples, bootstrap);
                fit_member(x, y, &rows, features, |mx, my| {
                    let mut svc = Svc::new(base.clone());
                    svc.fit(mx, my)?;
                    Ok(svc)
                })
            })
            .collect::<Result<Vec<_>>>()?;

        self.members = members;
        self.n_features = Some(d);
        self.classes = BINARY_CLASSES.to_vec();
        Ok(())
    }

    fn predict(&self, x: ArrayView2<f64>) -> Result<Vec<Label>> {
        Ok(self
            .vote_fraction(x)?
            .into_iter()
            .map(|p| label_from_bool(p > 0.5))
            .collect())
    }

    fn supports_proba(&self) -> bool {
        true
    }

    fn predict_proba(&self, x: ArrayView2<f64>) -> Result<Array2<f64>> {
        Ok(binary_proba(self.vote_fraction(x)?.into_iter()))
    }

    fn classes(&self) -> &[Label] {
        &self.classes
    }

    fn name(&self) -> &str {
        Self::NAME
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn blobs() -> (Array2<f64>, Vec<Label>) {
        let x = array![
            [0.0, 0.1],
            [0.1, 0.0],
            [0.2, 0.2],
            [0.1, 0.3],
            [0.3, 0.1],
            [3.0, 3.1],
            [3.1, 3.0],
            [2.9, 3.2],
            [3.2, 2.9],
            [3.0, 3.0]
        ];
        let mut y = vec![Label::Interictal; 5];
        y.extend(vec![Label::Preictal; 5]);
        (x, y)
    }

    #[test]
    fn test_bagging_separates_blobs() {
        let (x, y) = blobs();
        let params = ParamSet::new()
            .with("n_estimators", 10i64)
            .with("max_samples", 0.5)
            .with("random_state", 2i64);
        let mut model = BaggingSvc::from_params(&params).unwrap();
        model.fit(x.view(), &y).unwrap();
        let proba = model.predict_proba(array![[0.1, 0.1], [3.0, 3.0]].view()).unwrap();
        assert!(proba[[0, 1]] < 0.5);
        assert!(proba[[1, 1]] > 0.5);
    }

    #[test]
    fn test_bootstrap_features_is_reproducible() {
        let (x, y) = blobs();
        let params = ParamSet::new()
            .with("n_estimators", 5i64)
            .with("bootstrap_features", true)
            .with("random_state", 4i64);
        let mut a = BaggingSvc::from_params(&params).unwrap();
        let mut b = BaggingSvc::from_params(&params).unwrap();
        a.fit(x.view(), &y).unwrap();
        b.fit(x.view(), &y).unwrap();
        assert_eq!(a.predict_proba(x.view()).unwrap(), b.predict_proba(x.view()).unwrap());
    }

    #[test]
    fn test_invalid_max_samples() {
        let params = ParamSet::new().with("max_samples", 1.5);
        assert!(BaggingSvc::from_params(&params).is_err());
    }
}
