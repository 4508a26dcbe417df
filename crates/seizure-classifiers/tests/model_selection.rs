//! Integration tests for the registry, the grid search and the report builder.

mod common;

use ndarray::ArrayView2;
use seizure_classifiers::data_handling::Label;
use seizure_classifiers::error::{ModelSelectionError, Result};
use seizure_classifiers::grid_search::{select_model, GridSearch, SelectionOptions, TrainedModel};
use seizure_classifiers::models::classifier_trait::Classifier;
use seizure_classifiers::models::params::{OneOrMany, ParamOverrides, ParamSet, ParamValue};
use seizure_classifiers::models::registry::{fixed_args, lookup, Method};
use seizure_classifiers::models::Estimator;
use seizure_classifiers::report::build_report;

use common::{init_logging, separable};

fn constant_scorer(_: &Estimator, _: ArrayView2<f64>, _: &[Label]) -> Result<f64> {
    Ok(0.5)
}

fn single(name: &str, value: ParamValue) -> ParamOverrides {
    let mut overrides = ParamOverrides::new();
    overrides.insert(name.to_string(), OneOrMany::One(value));
    overrides
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

#[test]
fn unknown_method_is_unsupported() {
    let ds = separable(2, 2, 2, 0);
    assert!(matches!(
        lookup("not-a-real-method", ds.x.view(), &ds.y, 0),
        Err(ModelSelectionError::UnsupportedMethod(_))
    ));
    let result = select_model(&ds, "not-a-real-method", &SelectionOptions::default());
    assert!(matches!(result, Err(ModelSelectionError::UnsupportedMethod(_))));
}

#[test]
fn misspelled_override_is_a_configuration_error() {
    let ds = separable(4, 4, 2, 1);
    let options = SelectionOptions {
        n_folds: 2,
        overrides: Some(single("n_neighbours", ParamValue::Int(1))),
        seed: Some(1),
        ..SelectionOptions::default()
    };
    assert!(matches!(
        select_model(&ds, "knn", &options),
        Err(ModelSelectionError::Configuration(_))
    ));
}

// ---------------------------------------------------------------------------
// Every family separates a toy problem
// ---------------------------------------------------------------------------

#[test]
fn each_family_separates_toy_data() {
    let train = separable(4, 4, 5, 2);
    let test = separable(2, 2, 5, 3);
    for method in Method::ALL {
        let mut estimator = Estimator::from_params(method, &fixed_args(method, 7)).unwrap();
        estimator.fit(train.x.view(), &train.y).unwrap();
        let predicted = estimator.predict(test.x.view()).unwrap();
        assert_eq!(predicted, test.y, "{}", method);

        let scores = estimator.positive_scores(test.x.view()).unwrap();
        for (score, label) in scores.iter().zip(&test.y) {
            if label.is_preictal() {
                assert!(*score >= 0.5, "{}: preictal score {}", method, score);
            } else {
                assert!(*score <= 0.5, "{}: interictal score {}", method, score);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Grid search
// ---------------------------------------------------------------------------

#[test]
fn constant_scores_pick_first_configuration() {
    let ds = separable(6, 6, 2, 4);
    let mut winners = Vec::new();
    for parallelism in [1, 4, 1, 4] {
        let options = SelectionOptions {
            n_folds: 3,
            parallelism,
            seed: Some(11),
            ..SelectionOptions::default()
        };
        let search = GridSearch::prepare(&ds, "knn", &options)
            .unwrap()
            .with_scorer(constant_scorer);
        let model = search.run(&ds).unwrap();
        assert_eq!(model.best_index, Some(0));
        winners.push(model.best_params().clone());
    }
    let first = ParamSet::new()
        .with("algorithm", "ball_tree")
        .with("n_neighbors", 1i64);
    assert!(winners.iter().all(|w| *w == first));
}

#[test]
fn parallel_and_serial_searches_agree() {
    let ds = separable(6, 6, 3, 5);
    let run = |parallelism| {
        let options = SelectionOptions {
            n_folds: 3,
            parallelism,
            seed: Some(3),
            ..SelectionOptions::default()
        };
        select_model(&ds, "nearest-centroid", &options).unwrap()
    };
    let serial = run(1);
    let parallel = run(4);
    assert_eq!(serial.cv_results, parallel.cv_results);
    assert_eq!(serial.best_params(), parallel.best_params());
}

#[test]
fn single_configuration_is_refit_on_all_rows() {
    let ds = separable(4, 4, 3, 6);
    let options = SelectionOptions {
        n_folds: 2,
        overrides: Some(single("n_neighbors", ParamValue::Int(3))),
        seed: Some(2),
        ..SelectionOptions::default()
    };
    let model = select_model(&ds, "knn", &options).unwrap();
    assert_eq!(model.cv_results.len(), 1);
    assert_eq!(model.cv_results[0].fold_scores.len(), 2);
    assert_eq!(model.best_params(), &ParamSet::new().with("n_neighbors", 3i64));

    match &model.estimator {
        Estimator::KNeighbors(knn) => assert_eq!(knn.n_neighbors, 3),
        other => panic!("unexpected estimator {}", other.name()),
    }
    assert_eq!(model.predict(ds.x.view()).unwrap(), ds.y);
}

#[test]
fn zero_parallelism_is_rejected() {
    let ds = separable(4, 4, 2, 7);
    let options = SelectionOptions {
        parallelism: 0,
        ..SelectionOptions::default()
    };
    assert!(matches!(
        select_model(&ds, "knn", &options),
        Err(ModelSelectionError::Configuration(_))
    ));
}

#[test]
fn five_folds_over_three_segments_fails() {
    let ds = separable(1, 2, 3, 8);
    let options = SelectionOptions {
        n_folds: 5,
        seed: Some(0),
        ..SelectionOptions::default()
    };
    assert!(matches!(
        select_model(&ds, "nearest-centroid", &options),
        Err(ModelSelectionError::Configuration(_))
    ));
}

#[test]
fn default_ten_folds_over_six_segments_per_class_fails_before_fitting() {
    init_logging();
    let ds = separable(6, 6, 2, 14);
    let options = SelectionOptions {
        seed: Some(0),
        ..SelectionOptions::default()
    };
    assert_eq!(options.n_folds, 10);
    match select_model(&ds, "knn", &options) {
        Err(ModelSelectionError::Configuration(message)) => {
            assert!(message.contains("fewer than n_folds=10"), "{}", message)
        }
        other => panic!("expected a configuration error, got {:?}", other.map(|m| m.best_index)),
    }
}

#[test]
fn failing_fold_is_reported_with_its_configuration() {
    // n_neighbors larger than any training fold
    let ds = separable(2, 2, 2, 9);
    let options = SelectionOptions {
        n_folds: 2,
        overrides: Some(single("n_neighbors", ParamValue::Int(50))),
        seed: Some(0),
        ..SelectionOptions::default()
    };
    match select_model(&ds, "knn", &options) {
        Err(ModelSelectionError::FitFailure { params, fold, .. }) => {
            assert_eq!(fold, Some(0));
            assert_eq!(params.get("n_neighbors"), Some(&ParamValue::Int(50)));
        }
        other => panic!("expected a fit failure, got {:?}", other.map(|m| m.best_index)),
    }
}

// ---------------------------------------------------------------------------
// End to end
// ---------------------------------------------------------------------------

#[test]
fn end_to_end_two_segments_per_class() {
    init_logging();
    let training = separable(2, 2, 3, 10);
    assert_eq!(training.n_rows(), 12);

    let options = SelectionOptions {
        segment_aware: true,
        n_folds: 2,
        parallelism: 1,
        overrides: Some(single("n_neighbors", ParamValue::Int(1))),
        seed: Some(21),
    };
    let model = select_model(&training, "knn", &options).unwrap();
    assert_eq!(model.n_folds, 2);
    assert!(model.segment_aware);

    let held_out = separable(2, 2, 1, 11);
    assert_eq!(held_out.n_rows(), 4);
    let report = build_report(&model, held_out.x.view(), &held_out.y).unwrap();
    assert_eq!(report.confusion_matrix.total(), 4);
    assert_eq!(report.best_params, ParamSet::new().with("n_neighbors", 1i64));
    assert_eq!(report.grid_scores.len(), 1);
    assert_eq!(report.roc_auc, Some(1.0));
    assert!(report.to_string().contains("Grid scores on development set:"));
}

#[test]
fn trained_model_round_trips_through_json() {
    let ds = separable(4, 4, 3, 12);
    let test = separable(2, 2, 3, 13);
    for method in ["logistic", "svm", "random-forest", "bagging"] {
        let options = SelectionOptions {
            n_folds: 2,
            overrides: Some(fixed_single_config(method)),
            seed: Some(4),
            ..SelectionOptions::default()
        };
        let model = select_model(&ds, method, &options).unwrap();
        let json = serde_json::to_string(&model).unwrap();
        let restored: TrainedModel = serde_json::from_str(&json).unwrap();

        assert_eq!(restored.best_params(), model.best_params());
        assert_eq!(
            restored.predict(test.x.view()).unwrap(),
            model.predict(test.x.view()).unwrap(),
            "{}",
            method
        );
        let before = model.positive_scores(test.x.view()).unwrap();
        let after = restored.positive_scores(test.x.view()).unwrap();
        for (a, b) in before.iter().zip(&after) {
            assert!((a - b).abs() < 1e-9, "{}: {} vs {}", method, a, b);
        }
    }
}

fn fixed_single_config(method: &str) -> ParamOverrides {
    match method {
        "logistic" => single("C", ParamValue::Float(1.0)),
        "svm" => single("C", ParamValue::Float(10.0)),
        "random-forest" => single("n_estimators", ParamValue::Int(5)),
        _ => single("n_estimators", ParamValue::Int(3)),
    }
}
