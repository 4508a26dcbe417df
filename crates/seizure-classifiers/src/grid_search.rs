//! Exhaustive hyperparameter search with cross-validation.
//!
//! Every (configuration, fold) pair is an independent task. Tasks run on a
//! dedicated rayon pool and their results are gathered in enumeration order,
//! so the selected configuration and the reported failure never depend on
//! which worker finished first.
use ndarray::{Array2, ArrayView2, Axis};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::cross_validation::{cv_generator, Fold};
use crate::data_handling::{Label, LabeledDataset};
use crate::error::{ModelSelectionError, Result};
use crate::models::classifier_trait::Classifier;
use crate::models::params::{OneOrMany, ParamOverrides, ParamSet};
use crate::models::registry::{fixed_args, lookup, Method, ModelSpec};
use crate::models::Estimator;
use crate::resample::resolve_seed;
use crate::stats::{mean_and_std, roc_auc};

/// Scores a fitted estimator on held-out rows; higher is better.
pub type Scorer = fn(&Estimator, ArrayView2<f64>, &[Label]) -> Result<f64>;

/// ROC AUC of the preictal scores (probabilities when available, else hard labels).
pub fn auc_scorer(estimator: &Estimator, x: ArrayView2<f64>, y: &[Label]) -> Result<f64> {
    let scores = estimator.positive_scores(x)?;
    roc_auc(y, &scores)
}

#[derive(Debug, Clone)]
pub struct SelectionOptions {
    pub segment_aware: bool,
    pub n_folds: usize,
    pub parallelism: usize,
    pub overrides: Option<ParamOverrides>,
    pub seed: Option<u64>,
}

impl Default for SelectionOptions {
    fn default() -> Self {
        SelectionOptions {
            segment_aware: true,
            n_folds: 10,
            parallelism: 1,
            overrides: None,
            seed: None,
        }
    }
}

/// Cross-validation outcome of one configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CvResult {
    pub params: ParamSet,
    pub fold_scores: Vec<f64>,
    pub mean_score: f64,
    /// Population standard deviation across folds
    pub std_score: f64,
}

/// A fitted estimator together with how it was chosen.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainedModel {
    pub method: Method,
    pub estimator: Estimator,
    /// Winning grid configuration
    pub best_params: ParamSet,
    /// Everything the estimator was built from (fixed arguments plus `best_params`)
    pub params: ParamSet,
    /// One entry per configuration, in enumeration order; empty without search
    pub cv_results: Vec<CvResult>,
    pub best_index: Option<usize>,
    pub seed: u64,
    pub n_folds: usize,
    pub segment_aware: bool,
}

impl TrainedModel {
    pub fn best_params(&self) -> &ParamSet {
        &self.best_params
    }

    pub fn best_score(&self) -> Option<f64> {
        self.best_index.map(|i| self.cv_results[i].mean_score)
    }

    pub fn predict(&self, x: ArrayView2<f64>) -> Result<Vec<Label>> {
        self.estimator.predict(x)
    }

    pub fn predict_proba(&self, x: ArrayView2<f64>) -> Result<Array2<f64>> {
        self.estimator.predict_proba(x)
    }

    pub fn positive_scores(&self, x: ArrayView2<f64>) -> Result<Vec<f64>> {
        self.estimator.positive_scores(x)
    }

    /// Fit the same configuration again on `dataset`, keeping the search history.
    pub fn refit(&self, dataset: &LabeledDataset) -> Result<TrainedModel> {
        let mut estimator = Estimator::from_params(self.method, &self.params)?;
        estimator
            .fit(dataset.x.view(), &dataset.y)
            .map_err(|e| ModelSelectionError::FitFailure {
                params: self.best_params.clone(),
                fold: None,
                message: e.to_string(),
            })?;
        Ok(TrainedModel {
            estimator,
            ..self.clone()
        })
    }
}

/// A prepared search: resolved seed, folds and model specification.
pub struct GridSearch {
    spec: ModelSpec,
    configs: Vec<ParamSet>,
    folds: Vec<Fold>,
    parallelism: usize,
    seed: u64,
    segment_aware: bool,
    scorer: Scorer,
}

impl GridSearch {
    /// Validate everything that can be validated before any fitting happens.
    pub fn prepare(
        training: &LabeledDataset,
        method: &str,
        options: &SelectionOptions,
    ) -> Result<GridSearch> {
        if options.parallelism == 0 {
            return Err(ModelSelectionError::config("parallelism must be at least 1"));
        }
        let seed = resolve_seed(options.seed);

        let mut spec = lookup(method, training.x.view(), &training.y, seed)?;
        if let Some(overrides) = &options.overrides {
            spec = spec.with_overrides(overrides.clone());
        }
        let configs = spec.grid.iter();
        if configs.is_empty() {
            return Err(ModelSelectionError::config(format!(
                "The hyperparameter grid for {} is empty",
                spec.method
            )));
        }
        for config in &configs {
            spec.build(config)?;
        }

        let folds = cv_generator(options.segment_aware, options.n_folds, seed).split(training)?;

        Ok(GridSearch {
            spec,
            configs,
            folds,
            parallelism: options.parallelism,
            seed,
            segment_aware: options.segment_aware,
            scorer: auc_scorer,
        })
    }

    pub fn with_scorer(mut self, scorer: Scorer) -> Self {
        self.scorer = scorer;
        self
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    fn fit_and_score(&self, training: &LabeledDataset, config: &ParamSet, fold: &Fold) -> Result<f64> {
        let mut estimator = self.spec.build(config)?;
        let train_y: Vec<Label> = fold.train.iter().map(|&i| training.y[i]).collect();
        let test_y: Vec<Label> = fold.test.iter().map(|&i| training.y[i]).collect();
        let train_x = training.x.select(Axis(0), &fold.train);
        estimator.fit(train_x.view(), &train_y)?;
        let test_x = training.x.select(Axis(0), &fold.test);
        (self.scorer)(&estimator, test_x.view(), &test_y)
    }

    /// Score every configuration on every fold.
    pub fn evaluate(&self, training: &LabeledDataset) -> Result<Vec<CvResult>> {
        let n_folds = self.folds.len();
        let tasks: Vec<(usize, usize)> = (0..self.configs.len())
            .flat_map(|c| (0..n_folds).map(move |f| (c, f)))
            .collect();

        log::info!(
            "Fitting {} folds for each of {} candidates, totalling {} fits ({} workers)",
            n_folds,
            self.configs.len(),
            tasks.len(),
            self.parallelism
        );

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.parallelism)
            .build()
            .map_err(|e| ModelSelectionError::config(format!("Failed to build worker pool: {}", e)))?;

        let outcomes: Vec<Result<f64>> = pool.install(|| {
            tasks
                .par_iter()
                .map(|&(c, f)| self.fit_and_score(training, &self.configs[c], &self.folds[f]))
                .collect()
        });

        let mut results = Vec::with_capacity(self.configs.len());
        let mut outcomes = outcomes.into_iter();
        for config in &self.configs {
            let mut fold_scores = Vec::with_capacity(n_folds);
            for fold in 0..n_folds {
                match outcomes.next() {
                    Some(Ok(score)) => {
                        log::trace!("{} fold {}: {:.4}", config, fold, score);
                        fold_scores.push(score);
                    }
                    Some(Err(e)) => {
                        return Err(ModelSelectionError::FitFailure {
                            params: config.clone(),
                            fold: Some(fold),
                            message: e.to_string(),
                        })
                    }
                    None => {
                        return Err(ModelSelectionError::config("Missing grid search result"))
                    }
                }
            }
            let (mean_score, std_score) = mean_and_std(&fold_scores);
            log::debug!("{:.3} (+/-{:.3}) for {}", mean_score, std_score / 2.0, config);
            results.push(CvResult {
                params: config.clone(),
                fold_scores,
                mean_score,
                std_score,
            });
        }
        Ok(results)
    }

    /// Run the search and refit the winner on all of `training`.
    pub fn run(&self, training: &LabeledDataset) -> Result<TrainedModel> {
        log::info!(
            "Training a {} model on {} rows (seed {})",
            self.spec.method,
            training.n_rows(),
            self.seed
        );
        let cv_results = self.evaluate(training)?;
        let best = best_index(&cv_results)
            .ok_or_else(|| ModelSelectionError::config("No configuration was evaluated"))?;
        let best_params = cv_results[best].params.clone();
        log::info!(
            "Best configuration {} with mean score {:.4}",
            best_params,
            cv_results[best].mean_score
        );

        let mut estimator = self.spec.build(&best_params)?;
        estimator
            .fit(training.x.view(), &training.y)
            .map_err(|e| ModelSelectionError::FitFailure {
                params: best_params.clone(),
                fold: None,
                message: e.to_string(),
            })?;

        Ok(TrainedModel {
            method: self.spec.method,
            estimator,
            params: self.spec.params_for(&best_params),
            best_params,
            cv_results,
            best_index: Some(best),
            seed: self.seed,
            n_folds: self.folds.len(),
            segment_aware: self.segment_aware,
        })
    }
}

/// Highest mean score; the earliest configuration wins ties. NaN never wins.
pub fn best_index(results: &[CvResult]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (idx, result) in results.iter().enumerate() {
        let score = if result.mean_score.is_nan() {
            f64::NEG_INFINITY
        } else {
            result.mean_score
        };
        match best {
            Some((_, best_score)) if score <= best_score => {}
            _ => best = Some((idx, score)),
        }
    }
    best.map(|(idx, _)| idx)
}

/// Cross-validated model selection over the default (or overridden) grid of `method`.
pub fn select_model(
    training: &LabeledDataset,
    method: &str,
    options: &SelectionOptions,
) -> Result<TrainedModel> {
    GridSearch::prepare(training, method, options)?.run(training)
}

/// Fit a single configuration on all rows without any search.
///
/// Each override must hold exactly one value and wins over the family's
/// fixed arguments (which carry `random_state = seed` where it applies).
pub fn fit_without_search(
    dataset: &LabeledDataset,
    method: &str,
    overrides: Option<&ParamOverrides>,
    seed: Option<u64>,
) -> Result<TrainedModel> {
    let method: Method = method.parse()?;
    let seed = resolve_seed(seed);

    let mut params = fixed_args(method, seed);
    if let Some(overrides) = overrides {
        for (name, value) in overrides {
            let value = match value {
                OneOrMany::One(v) => v.clone(),
                OneOrMany::Many(values) if values.len() == 1 => values[0].clone(),
                OneOrMany::Many(values) => {
                    return Err(ModelSelectionError::config(format!(
                        "Parameter '{}' has {} candidate values but cross-validation is disabled",
                        name,
                        values.len()
                    )))
                }
            };
            params.insert(name, value);
        }
    }

    log::info!("Fitting data to a {} model", method);
    let mut estimator = Estimator::from_params(method, &params)?;
    estimator
        .fit(dataset.x.view(), &dataset.y)
        .map_err(|e| ModelSelectionError::FitFailure {
            params: params.clone(),
            fold: None,
            message: e.to_string(),
        })?;

    Ok(TrainedModel {
        method,
        estimator,
        best_params: params.clone(),
        params,
        cv_results: Vec::new(),
        best_index: None,
        seed,
        n_folds: 0,
        segment_aware: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::params::ParamValue;

    fn result(mean: f64) -> CvResult {
        CvResult {
            params: ParamSet::new().with("m", mean),
            fold_scores: vec![mean],
            mean_score: mean,
            std_score: 0.0,
        }
    }

    #[test]
    fn test_best_index_first_seen_wins() {
        let results = vec![result(0.5), result(0.8), result(0.8), result(0.1)];
        assert_eq!(best_index(&results), Some(1));
        assert_eq!(best_index(&[]), None);
    }

    #[test]
    fn test_best_index_ignores_nan() {
        let results = vec![result(f64::NAN), result(0.2)];
        assert_eq!(best_index(&results), Some(1));
    }

    #[test]
    fn test_fit_without_search_rejects_lists() {
        let ds = LabeledDataset::new(
            ndarray::array![[0.0], [1.0]],
            vec![Label::Interictal, Label::Preictal],
            vec!["a".into(), "b".into()],
            vec![0, 0],
        )
        .unwrap();
        let mut overrides = ParamOverrides::new();
        overrides.insert(
            "n_neighbors".into(),
            OneOrMany::Many(vec![ParamValue::Int(1), ParamValue::Int(2)]),
        );
        assert!(fit_without_search(&ds, "knn", Some(&overrides), Some(0)).is_err());

        overrides.insert("n_neighbors".into(), OneOrMany::One(ParamValue::Int(1)));
        let model = fit_without_search(&ds, "knn", Some(&overrides), Some(0)).unwrap();
        assert!(model.cv_results.is_empty());
        assert_eq!(model.predict(ds.x.view()).unwrap(), ds.y);
    }
}
