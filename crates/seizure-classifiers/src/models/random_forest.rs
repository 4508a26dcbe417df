//! Random forest of `linfa-trees` decision trees.
//!
//! Every tree is grown on a bootstrap draw of the rows and on its own random
//! subset of `max_features` columns. The preictal probability is the fraction
//! of trees voting preictal.
use linfa::traits::{Fit, Predict};
use linfa_trees::{DecisionTree, SplitQuality};
use ndarray::{Array1, Array2, ArrayView2};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::data_handling::Label;
use crate::error::{ModelSelectionError, Result};
use crate::models::classifier_trait::Classifier;
use crate::models::ensemble::{draw, fit_member, member_seeds, vote_fraction, Member, Vote};
use crate::models::params::{ParamReader, ParamSet, ParamValue};
use crate::models::utils::{
    binary_dataset, binary_proba, check_fit_input, check_predict_input, label_from_bool,
    library_error, BINARY_CLASSES,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Criterion {
    Gini,
    Entropy,
}

impl Criterion {
    fn split_quality(self) -> SplitQuality {
        match self {
            Criterion::Gini => SplitQuality::Gini,
            Criterion::Entropy => SplitQuality::Entropy,
        }
    }
}

impl Vote for DecisionTree<f64, bool> {
    fn vote(&self, x: ArrayView2<f64>) -> Result<Vec<Label>> {
        let predicted: Array1<bool> = self.predict(&x.to_owned());
        Ok(predicted.iter().map(|&b| label_from_bool(b)).collect())
    }
}

/// Number of features given to each tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MaxFeatures {
    Sqrt,
    Log2,
    All,
    Count(usize),
    Fraction(f64),
}

impl MaxFeatures {
    fn from_param(value: Option<&ParamValue>) -> Result<MaxFeatures> {
        match value {
            None => Ok(MaxFeatures::Sqrt),
            Some(ParamValue::None) => Ok(MaxFeatures::All),
            Some(ParamValue::Text(s)) => match s.as_str() {
                "sqrt" | "auto" => Ok(MaxFeatures::Sqrt),
                "log2" => Ok(MaxFeatures::Log2),
                other => Err(ModelSelectionError::config(format!(
                    "RandomForestClassifier: unknown max_features '{}'",
                    other
                ))),
            },
            Some(ParamValue::Int(n)) if *n > 0 => Ok(MaxFeatures::Count(*n as usize)),
            Some(ParamValue::Float(f)) if *f > 0.0 && *f <= 1.0 => Ok(MaxFeatures::Fraction(*f)),
            Some(other) => Err(ModelSelectionError::config(format!(
                "RandomForestClassifier: invalid max_features {}",
                other
            ))),
        }
    }

    fn resolve(&self, n_features: usize) -> usize {
        let k = match *self {
            MaxFeatures::Sqrt => (n_features as f64).sqrt() as usize,
            MaxFeatures::Log2 => (n_features as f64).log2() as usize,
            MaxFeatures::All => n_features,
            MaxFeatures::Count(k) => k,
            MaxFeatures::Fraction(f) => (f * n_features as f64) as usize,
        };
        k.clamp(1, n_features)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    pub n_estimators: usize,
    pub criterion: Criterion,
    pub max_features: MaxFeatures,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub bootstrap: bool,
    pub random_state: u64,
    trees: Vec<Member<DecisionTree<f64, bool>>>,
    n_features: Option<usize>,
    classes: Vec<Label>,
}

impl RandomForest {
    pub const NAME: &'static str = "RandomForestClassifier";

    pub fn from_params(params: &ParamSet) -> Result<Self> {
        let mut reader = ParamReader::new(Self::NAME, params);
        let n_estimators = reader.usize("n_estimators", 10)?;
        let criterion = match reader.choice("criterion", &["gini", "entropy"], "gini")?.as_str() {
            "entropy" => Criterion::Entropy,
            _ => Criterion::Gini,
        };
        let max_features = MaxFeatures::from_param(reader.raw("max_features"))?;
        let max_depth = reader.opt_usize("max_depth")?;
        let min_samples_split = reader.usize("min_samples_split", 2)?;
        let min_samples_leaf = reader.usize("min_samples_leaf", 1)?;
        let bootstrap = reader.bool("bootstrap", true)?;
        let random_state = reader.seed("random_state", 0)?;
        reader.finish()?;

        if n_estimators == 0 {
            return Err(ModelSelectionError::config(
                "RandomForestClassifier: n_estimators must be at least 1",
            ));
        }

        Ok(RandomForest {
            n_estimators,
            criterion,
            max_features,
            max_depth,
            min_samples_split: min_samples_split.max(2),
            min_samples_leaf: min_samples_leaf.max(1),
            bootstrap,
            random_state,
            trees: Vec::new(),
            n_features: None,
            classes: Vec::new(),
        })
    }

    fn positive_proba(&self, x: ArrayView2<f64>) -> Result<Vec<f64>> {
        check_predict_input(Self::NAME, self.n_features, x)?;
        vote_fraction(&self.trees, x)
    }

    fn grow_tree(&self, x: ArrayView2<f64>, y: &[Label]) -> Result<DecisionTree<f64, bool>> {
        DecisionTree::<f64, bool>::params()
            .split_quality(self.criterion.split_quality())
            .max_depth(self.max_depth)
            .min_weight_split(self.min_samples_split as f32)
            .min_weight_leaf(self.min_samples_leaf as f32)
            .fit(&binary_dataset(x, y))
            .map_err(|e| library_error(Self::NAME, e))
    }
}

impl Classifier for RandomForest {
    fn fit(&mut self, x: ArrayView2<f64>, y: &[Label]) -> Result<()> {
        check_fit_input(Self::NAME, x, y)?;
        let (n, d) = x.dim();
        let n_tree_features = self.max_features.resolve(d);
        let bootstrap = self.bootstrap;

        let forest = &*self;
        let trees = member_seeds(self.random_state, self.n_estimators)
            .into_par_iter()
            .map(|seed| {
                let mut rng = StdRng::seed_from_u64(seed);
                let features = draw(&mut rng, d, n_tree_features, false);
                let rows: Vec<usize> = if bootstrap {
                    draw(&mut rng, n, n, true)
                } else {
                    (0..n).collect()
                };
                fit_member(x, y, &rows, features, |tx, ty| forest.grow_tree(tx, ty))
            })
            .collect::<Result<Vec<_>>>()?;

        log::trace!(
            "{} grew {} trees on {} of {} features each",
            Self::NAME,
            trees.len(),
            n_tree_features,
            d
        );
        self.trees = trees;
        self.n_features = Some(d);
        self.classes = BINARY_CLASSES.to_vec();
        Ok(())
    }

    fn predict(&self, x: ArrayView2<f64>) -> Result<Vec<Label>> {
        Ok(self
            .positive_proba(x)?
            .into_iter()
            .map(|p| label_from_bool(p > 0.5))
            .collect())
    }

    fn supports_proba(&self) -> bool {
        true
    }

    fn predict_proba(&self, x: ArrayView2<f64>) -> Result<Array2<f64>> {
        Ok(binary_proba(self.positive_proba(x)?.into_iter()))
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

    fn separable() -> (Array2<f64>, Vec<Label>) {
        let x = array![
            [0.0, 1.0, 0.3],
            [0.5, 0.8, 0.1],
            [1.0, 1.2, 0.2],
            [0.2, 0.9, 0.4],
            [5.0, 1.1, 0.3],
            [5.5, 0.7, 0.2],
            [6.0, 1.0, 0.1],
            [5.2, 1.3, 0.4]
        ];
        let mut y = vec![Label::Interictal; 4];
        y.extend(vec![Label::Preictal; 4]);
        (x, y)
    }

    #[test]
    fn test_forest_separates_toy_problem() {
        let (x, y) = separable();
        let params = ParamSet::new()
            .with("n_estimators", 25i64)
            .with("max_features", ParamValue::None)
            .with("random_state", 5i64);
        let mut forest = RandomForest::from_params(&params).unwrap();
        forest.fit(x.view(), &y).unwrap();
        let proba = forest.predict_proba(array![[0.1, 1.0, 0.2], [5.8, 1.0, 0.2]].view()).unwrap();
        assert!(proba[[0, 1]] < 0.5);
        assert!(proba[[1, 1]] > 0.5);
    }

    #[test]
    fn test_same_seed_same_forest() {
        let (x, y) = separable();
        let params = ParamSet::new().with("n_estimators", 8i64).with("random_state", 9i64);
        let mut a = RandomForest::from_params(&params).unwrap();
        let mut b = RandomForest::from_params(&params).unwrap();
        a.fit(x.view(), &y).unwrap();
        b.fit(x.view(), &y).unwrap();
        assert_eq!(
            a.predict_proba(x.view()).unwrap(),
            b.predict_proba(x.view()).unwrap()
        );
    }

    #[test]
    fn test_max_features_resolution() {
        assert_eq!(MaxFeatures::Sqrt.resolve(16), 4);
        assert_eq!(MaxFeatures::Log2.resolve(16), 4);
        assert_eq!(MaxFeatures::Log2.resolve(1), 1);
        assert_eq!(MaxFeatures::All.resolve(7), 7);
        assert!(MaxFeatures::from_param(Some(&ParamValue::Text("cube".into()))).is_err());
    }

    #[test]
    fn test_entropy_criterion_and_depth_limit() {
        let (x, y) = separable();
        let params = ParamSet::new()
            .with("n_estimators", 5i64)
            .with("criterion", "entropy")
            .with("max_depth", 1i64)
            .with("max_features", ParamValue::None)
            .with("bootstrap", false);
        let mut forest = RandomForest::from_params(&params).unwrap();
        forest.fit(x.view(), &y).unwrap();
        // without bootstrap every stump sees the same rows and agrees
        let proba = forest.predict_proba(x.view()).unwrap();
        assert!(proba.column(1).iter().all(|&p| p == 0.0 || p == 1.0));
        assert_eq!(forest.predict(x.view()).unwrap(), y);
    }
}
