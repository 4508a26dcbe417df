//! Supported model families and their default search spaces.
//!
//! Adding a family means adding a [`Method`] variant, its fixed constructor
//! arguments in [`fixed_args`] and its grid in [`create_default_grid`].
use std::fmt;
use std::str::FromStr;

use itertools_num::linspace;
use ndarray::ArrayView2;
use serde::{Deserialize, Serialize};

use crate::data_handling::Label;
use crate::error::{ModelSelectionError, Result};
use crate::models::params::{ParamGrid, ParamOverrides, ParamSet, ParamValue};
use crate::models::Estimator;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Method {
    Logistic,
    Svm,
    MirowskiSvm,
    Sgd,
    RandomForest,
    NearestCentroid,
    Knn,
    Bagging,
}

impl Method {
    pub const ALL: [Method; 8] = [
        Method::Logistic,
        Method::Svm,
        Method::MirowskiSvm,
        Method::Sgd,
        Method::RandomForest,
        Method::NearestCentroid,
        Method::Knn,
        Method::Bagging,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Logistic => "logistic",
            Method::Svm => "svm",
            Method::MirowskiSvm => "mirowski-svm",
            Method::Sgd => "sgd",
            Method::RandomForest => "random-forest",
            Method::NearestCentroid => "nearest-centroid",
            Method::Knn => "knn",
            Method::Bagging => "bagging",
        }
    }
}

impl FromStr for Method {
    type Err = ModelSelectionError;

    fn from_str(s: &str) -> Result<Self> {
        Method::ALL
            .iter()
            .copied()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| ModelSelectionError::UnsupportedMethod(s.to_string()))
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A model family with its fixed constructor arguments and search grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSpec {
    pub method: Method,
    /// Arguments every configuration starts from; grid values win on conflict
    pub fixed: ParamSet,
    pub grid: ParamGrid,
}

impl ModelSpec {
    /// Replace the default grid with caller overrides.
    ///
    /// Bagging overrides without `max_samples` get `max_samples = 0.5`.
    pub fn with_overrides(mut self, overrides: ParamOverrides) -> ModelSpec {
        let mut grid = ParamGrid::from_overrides(overrides);
        if self.method == Method::Bagging {
            grid.insert_missing("max_samples", ParamValue::Float(0.5));
        }
        self.grid = grid;
        self
    }

    /// Full parameter set of one grid configuration.
    pub fn params_for(&self, config: &ParamSet) -> ParamSet {
        self.fixed.merged(config)
    }

    /// Unfitted estimator for one grid configuration.
    pub fn build(&self, config: &ParamSet) -> Result<Estimator> {
        Estimator::from_params(self.method, &self.params_for(config))
    }
}

/// Resolve `method` into a [`ModelSpec`] with its default grid.
///
/// Fails with [`ModelSelectionError::UnsupportedMethod`] for unknown names.
pub fn lookup(method: &str, x: ArrayView2<f64>, y: &[Label], seed: u64) -> Result<ModelSpec> {
    let method: Method = method.parse()?;
    Ok(ModelSpec {
        method,
        fixed: fixed_args(method, seed),
        grid: create_default_grid(method, x, y, seed)?,
    })
}

/// Constructor arguments that are not searched over.
pub fn fixed_args(method: Method, seed: u64) -> ParamSet {
    let seed = seed as i64;
    match method {
        Method::Logistic => ParamSet::new().with("C", 1.0).with("random_state", seed),
        Method::Svm => ParamSet::new()
            .with("probability", true)
            .with("class_weight", "auto"),
        Method::MirowskiSvm => ParamSet::new()
            .with("probability", true)
            .with("class_weight", "auto"),
        Method::Sgd | Method::RandomForest | Method::Bagging => {
            ParamSet::new().with("random_state", seed)
        }
        Method::NearestCentroid | Method::Knn => ParamSet::new(),
    }
}

/// Default search grid of `method`. Logistic regression and the coarse SVM
/// grid start their `C` axis at [`l1_min_c`] of the training data.
pub fn create_default_grid(
    method: Method,
    x: ArrayView2<f64>,
    y: &[Label],
    seed: u64,
) -> Result<ParamGrid> {
    let grid = match method {
        Method::Logistic => {
            let min_c = l1_min_c(x, y)?;
            ParamGrid::new()
                .axis("C", linspace(min_c, 1e5, 10).collect::<Vec<f64>>())
                .axis("penalty", vec!["l1", "l2"])
                .axis("random_state", vec![seed as i64])
        }
        Method::Svm => {
            let min_c = l1_min_c(x, y)?;
            ParamGrid::new()
                .axis("kernel", vec!["rbf"])
                .axis("gamma", vec![0.0, 1e-1, 1e-3])
                .axis("C", linspace(min_c, 1000.0, 3).collect::<Vec<f64>>())
        }
        Method::MirowskiSvm => {
            // fine grid around C = 2^6, gamma = 2^-13
            let scale: Vec<f64> = linspace(0.25, 4.0, 4).collect();
            ParamGrid::new()
                .axis("kernel", vec!["rbf"])
                .axis("C", scale.iter().map(|s| 64.0 * s).collect::<Vec<f64>>())
                .axis(
                    "gamma",
                    scale.iter().map(|s| 2f64.powi(-13) * s).collect::<Vec<f64>>(),
                )
        }
        Method::Sgd => ParamGrid::new()
            .axis("loss", vec!["hinge", "log"])
            .axis("penalty", vec!["l1", "l2", "elasticnet"])
            .axis("alpha", vec![1e-4, 1e-3, 1e-2, 1e-1]),
        Method::RandomForest => ParamGrid::new()
            .axis("max_features", vec!["sqrt", "log2"])
            .axis("n_estimators", vec![10i64, 100, 1000])
            .axis("criterion", vec!["gini", "entropy"]),
        Method::NearestCentroid => ParamGrid::new()
            .subgrid()
            .axis("shrink_threshold", vec![ParamValue::None])
            .subgrid()
            .axis("shrink_threshold", linspace(0.0, 2.0, 10).collect::<Vec<f64>>()),
        Method::Knn => ParamGrid::new()
            .axis("algorithm", vec!["ball_tree", "kd_tree", "brute"])
            .axis("n_neighbors", (1..5).collect::<Vec<i64>>()),
        Method::Bagging => ParamGrid::new()
            .axis("n_estimators", vec![10i64, 20])
            .axis("bootstrap_features", vec![true, false]),
    };
    Ok(grid)
}

/// Smallest `C` at which an L1-penalized logistic model with intercept is
/// not all zeros: `2 / max |Y^T [X, 1]|` with `Y` in {-1, +1}.
pub fn l1_min_c(x: ArrayView2<f64>, y: &[Label]) -> Result<f64> {
    if x.nrows() != y.len() {
        return Err(ModelSelectionError::config(format!(
            "l1_min_c: {} feature rows but {} labels",
            x.nrows(),
            y.len()
        )));
    }
    let signs: Vec<f64> = y
        .iter()
        .map(|l| if l.is_preictal() { 1.0 } else { -1.0 })
        .collect();

    let intercept: f64 = signs.iter().sum();
    let den = x
        .columns()
        .into_iter()
        .map(|col| col.iter().zip(signs.iter()).map(|(v, s)| v * s).sum::<f64>().abs())
        .fold(intercept.abs(), f64::max);

    if den == 0.0 {
        return Err(ModelSelectionError::config(
            "Ill-posed l1_min_c calculation: l1 will always select zero coefficients for this data",
        ));
    }
    Ok(2.0 / den)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn toy() -> (ndarray::Array2<f64>, Vec<Label>) {
        (
            array![[1.0, 2.0], [3.0, -1.0], [0.5, 0.0]],
            vec![Label::Preictal, Label::Interictal, Label::Interictal],
        )
    }

    #[test]
    fn test_l1_min_c_closed_form() {
        let (x, y) = toy();
        // Y^T [X, 1] = [1 - 3 - 0.5, 2 + 1 - 0, 1 - 1 - 1] = [-2.5, 3, -1]
        let c = l1_min_c(x.view(), &y).unwrap();
        assert!((c - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_l1_min_c_zero_denominator() {
        let x = array![[1.0], [1.0]];
        let y = vec![Label::Preictal, Label::Interictal];
        assert!(matches!(
            l1_min_c(x.view(), &y),
            Err(ModelSelectionError::Configuration(_))
        ));
    }

    #[test]
    fn test_unknown_method() {
        let (x, y) = toy();
        assert!(matches!(
            lookup("not-a-real-method", x.view(), &y, 0),
            Err(ModelSelectionError::UnsupportedMethod(_))
        ));
    }

    #[test]
    fn test_method_names_round_trip() {
        for method in Method::ALL {
            assert_eq!(method.to_string().parse::<Method>().unwrap(), method);
        }
        assert_eq!(serde_json::to_string(&Method::MirowskiSvm).unwrap(), "\"mirowski-svm\"");
    }

    #[test]
    fn test_default_grid_sizes() {
        let (x, y) = toy();
        let sizes = [
            (Method::Logistic, 20),
            (Method::Svm, 9),
            (Method::MirowskiSvm, 16),
            (Method::Sgd, 24),
            (Method::RandomForest, 12),
            (Method::NearestCentroid, 11),
            (Method::Knn, 12),
            (Method::Bagging, 4),
        ];
        for (method, size) in sizes {
            let spec = lookup(method.as_str(), x.view(), &y, 1).unwrap();
            assert_eq!(spec.grid.len(), size, "{}", method);
            // every default configuration must be accepted by its estimator
            for config in spec.grid.iter() {
                spec.build(&config).unwrap();
            }
        }
    }

    #[test]
    fn test_logistic_grid_starts_at_min_c() {
        let (x, y) = toy();
        let spec = lookup("logistic", x.view(), &y, 3).unwrap();
        let first = &spec.grid.iter()[0];
        assert!((first.get("C").unwrap().as_f64().unwrap() - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(first.get("random_state"), Some(&ParamValue::Int(3)));
    }

    #[test]
    fn test_overrides_replace_grid() {
        let (x, y) = toy();
        let overrides: ParamOverrides = serde_json::from_str(r#"{"n_estimators": [5]}"#).unwrap();
        let spec = lookup("bagging", x.view(), &y, 0).unwrap().with_overrides(overrides);
        let configs = spec.grid.iter();
        assert_eq!(configs.len(), 1);
        assert_eq!(configs[0].get("max_samples"), Some(&ParamValue::Float(0.5)));
        assert!(!configs[0].contains("bootstrap_features"));

        let overrides: ParamOverrides = serde_json::from_str(r#"{"C": 2.0}"#).unwrap();
        let spec = lookup("logistic", x.view(), &y, 0).unwrap().with_overrides(overrides);
        assert_eq!(spec.grid.iter(), vec![ParamSet::new().with("C", 2.0)]);
    }
}
