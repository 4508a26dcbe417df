pub mod bagging;
pub mod classifier_trait;
pub(crate) mod ensemble;
pub mod knn;
pub mod logistic;
pub mod nearest_centroid;
pub mod params;
pub(crate) mod penalty;
pub mod random_forest;
pub mod registry;
pub mod sgd;
pub mod svm;
pub(crate) mod utils;

use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::data_handling::Label;
use crate::error::Result;
use crate::models::bagging::BaggingSvc;
use crate::models::classifier_trait::Classifier;
use crate::models::knn::KNeighbors;
use crate::models::logistic::LogisticRegression;
use crate::models::nearest_centroid::NearestCentroid;
use crate::models::params::ParamSet;
use crate::models::random_forest::RandomForest;
use crate::models::registry::Method;
use crate::models::sgd::SgdClassifier;
use crate::models::svm::Svc;

/// One estimator of the supported families, fitted or not.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "estimator")]
pub enum Estimator {
    LogisticRegression(LogisticRegression),
    Svc(Svc),
    Sgd(SgdClassifier),
    RandomForest(RandomForest),
    NearestCentroid(NearestCentroid),
    KNeighbors(KNeighbors),
    Bagging(BaggingSvc),
}

impl Estimator {
    /// Construct an unfitted estimator of `method` from a full parameter set.
    pub fn from_params(method: Method, params: &ParamSet) -> Result<Estimator> {
        Ok(match method {
            Method::Logistic => Estimator::LogisticRegression(LogisticRegression::from_params(params)?),
            Method::Svm | Method::MirowskiSvm => Estimator::Svc(Svc::from_params(params)?),
            Method::Sgd => Estimator::Sgd(SgdClassifier::from_params(params)?),
            Method::RandomForest => Estimator::RandomForest(RandomForest::from_params(params)?),
            Method::NearestCentroid => {
                Estimator::NearestCentroid(NearestCentroid::from_params(params)?)
            }
            Method::Knn => Estimator::KNeighbors(KNeighbors::from_params(params)?),
            Method::Bagging => Estimator::Bagging(BaggingSvc::from_params(params)?),
        })
    }

    fn inner(&self) -> &dyn Classifier {
        match self {
            Estimator::LogisticRegression(m) => m,
            Estimator::Svc(m) => m,
            Estimator::Sgd(m) => m,
            Estimator::RandomForest(m) => m,
            Estimator::NearestCentroid(m) => m,
            Estimator::KNeighbors(m) => m,
            Estimator::Bagging(m) => m,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn Classifier {
        match self {
            Estimator::LogisticRegression(m) => m,
            Estimator::Svc(m) => m,
            Estimator::Sgd(m) => m,
            Estimator::RandomForest(m) => m,
            Estimator::NearestCentroid(m) => m,
            Estimator::KNeighbors(m) => m,
            Estimator::Bagging(m) => m,
        }
    }

    /// Preictal score per row: the probability column of `Preictal` when the
    /// estimator has probabilities, otherwise the hard prediction as 0/1.
    pub fn positive_scores(&self, x: ArrayView2<f64>) -> Result<Vec<f64>> {
        if self.supports_proba() {
            let proba = self.predict_proba(x)?;
            if let Some(col) = self.classes().iter().position(|&c| c == Label::Preictal) {
                return Ok(proba.column(col).to_vec());
            }
        }
        Ok(self
            .predict(x)?
            .into_iter()
            .map(|l| f64::from(l.as_u8()))
            .collect())
    }
}

impl Classifier for Estimator {
    fn fit(&mut self, x: ArrayView2<f64>, y: &[Label]) -> Result<()> {
        self.inner_mut().fit(x, y)
    }

    fn predict(&self, x: ArrayView2<f64>) -> Result<Vec<Label>> {
        self.inner().predict(x)
    }

    fn supports_proba(&self) -> bool {
        self.inner().supports_proba()
    }

    fn predict_proba(&self, x: ArrayView2<f64>) -> Result<Array2<f64>> {
        self.inner().predict_proba(x)
    }

    fn classes(&self) -> &[Label] {
        self.inner().classes()
    }

    fn name(&self) -> &str {
        self.inner().name()
    }
}
