//! Integration tests for the train, score and batch commands.

use std::fs;
use std::path::Path;

use seizure_classifiers::config::ExperimentConfig;
use seizure_classifiers::io::DEFAULT_FILE_PATTERN;
use seizure_classifiers::models::params::{OneOrMany, ParamOverrides, ParamValue};
use seizure_classifiers::models::registry::Method;
use seizure_cli::commands::batch::run_batch;
use seizure_cli::commands::score::{resolve_model_path, run_score};
use seizure_cli::commands::train::{run_train, TrainSettings};
use seizure_cli::util::subject_folders;

/// A subject folder with `n` segments per class plus `n` test segments.
fn write_subject(folder: &Path, n: usize) {
    fs::create_dir_all(folder).unwrap();
    for (class_name, center) in [("interictal", -3.0), ("preictal", 3.0), ("test", 3.0)] {
        for segment in 0..n {
            let name = format!("Dog_1_{}_segment_{:04}.{}", class_name, segment, DEFAULT_FILE_PATTERN);
            let body: String = (0..3)
                .map(|r| {
                    let v = center + (segment * 3 + r) as f64 * 0.01;
                    format!("{},{},{}\n", v, v * 0.5, -v)
                })
                .collect();
            fs::write(folder.join(name), body).unwrap();
        }
    }
}

fn knn_settings() -> TrainSettings {
    let mut overrides = ParamOverrides::new();
    overrides.insert("n_neighbors".into(), OneOrMany::One(ParamValue::Int(1)));
    TrainSettings {
        experiment: ExperimentConfig {
            method: Method::Knn,
            n_folds: 2,
            training_ratio: 1.0,
            seed: Some(3),
            model_params: Some(overrides),
            ..ExperimentConfig::default()
        },
        output: None,
        write_report: true,
    }
}

// ---------------------------------------------------------------------------
// train + score
// ---------------------------------------------------------------------------

#[test]
fn train_then_score_writes_submission() {
    let dir = tempfile::tempdir().unwrap();
    write_subject(dir.path(), 4);

    let (model, model_path) = run_train(dir.path(), &knn_settings()).unwrap();
    assert_eq!(model.method, Method::Knn);
    assert!(model_path.exists());
    assert_eq!(resolve_model_path(dir.path(), None).unwrap(), model_path);

    let output = dir.path().join("submission.csv");
    run_score(dir.path(), None, DEFAULT_FILE_PATTERN, Some(&output)).unwrap();
    let written = fs::read_to_string(&output).unwrap();
    let lines: Vec<&str> = written.lines().collect();
    assert_eq!(lines[0], "clip,preictal");
    assert_eq!(lines.len(), 5);
    assert!(lines[1..].iter().all(|l| l.ends_with(",1")));
}

#[test]
fn explicit_output_path_is_used() {
    let dir = tempfile::tempdir().unwrap();
    write_subject(dir.path(), 4);
    let model_path = dir.path().join("my_model.json");
    let settings = TrainSettings {
        output: Some(model_path.clone()),
        ..knn_settings()
    };
    let (_, path) = run_train(dir.path(), &settings).unwrap();
    assert_eq!(path, model_path);
    assert!(model_path.exists());
}

// ---------------------------------------------------------------------------
// batch
// ---------------------------------------------------------------------------

#[test]
fn batch_runs_every_subject() {
    let root = tempfile::tempdir().unwrap();
    write_subject(&root.path().join("Dog_1"), 4);
    write_subject(&root.path().join("Patient_1"), 4);

    let subjects = subject_folders(root.path()).unwrap();
    assert_eq!(subjects.len(), 2);

    let runs = run_batch(root.path(), &knn_settings()).unwrap();
    assert_eq!(runs.len(), 2);
    for run in &runs {
        assert!(run.model.starts_with(&run.subject));
        assert!(run.scores.exists());
    }
}

#[test]
fn batch_on_empty_root_fails() {
    let root = tempfile::tempdir().unwrap();
    assert!(run_batch(root.path(), &knn_settings()).is_err());
}
