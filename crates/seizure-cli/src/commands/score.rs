//! `seizure score`: per-segment preictal scores for the unlabeled `test` segments.
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use chrono::Local;

use seizure_classifiers::grid_search::TrainedModel;
use seizure_classifiers::io::{latest_model, load_class_features, load_model, write_segment_scores};
use seizure_classifiers::pipeline::assign_segment_scores;

use crate::util::validate_folder;

/// Default submission path: `submission_<method>_<timestamp>.csv` in `folder`.
pub fn default_output(folder: &Path, model: &TrainedModel) -> PathBuf {
    folder.join(format!(
        "submission_{}_{}.csv",
        model.method,
        Local::now().format("%m-%d-%Y-%H.%M.%S")
    ))
}

/// Resolve the model to use: the given path or the newest model in `folder`.
pub fn resolve_model_path(folder: &Path, model: Option<&PathBuf>) -> Result<PathBuf> {
    match model {
        Some(path) => Ok(path.clone()),
        None => latest_model(folder)?
            .ok_or_else(|| anyhow!("No model file given and none found in {}", folder.display())),
    }
}

/// Score the `test` segments of `folder` with `model` and write the submission CSV.
pub fn score_folder(
    folder: &Path,
    model: &TrainedModel,
    file_pattern: &str,
    parallel: bool,
    output: Option<&PathBuf>,
) -> Result<PathBuf> {
    let unlabeled = load_class_features(folder, "test", file_pattern, parallel)?;
    let scores = assign_segment_scores(model, &unlabeled)?;

    let path = output
        .cloned()
        .unwrap_or_else(|| default_output(folder, model));
    write_segment_scores(&path, &scores)?;
    Ok(path)
}

pub fn run_score(
    folder: &Path,
    model_path: Option<&PathBuf>,
    file_pattern: &str,
    output: Option<&PathBuf>,
) -> Result<PathBuf> {
    validate_folder(folder)?;
    let model_path = resolve_model_path(folder, model_path)?;
    log::info!("Scoring {} with {}", folder.display(), model_path.display());
    let model = load_model(&model_path)?;
    score_folder(folder, &model, file_pattern, false, output)
}
