//! `seizure batch`: train and score every subject folder under a root.
use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::commands::score::score_folder;
use crate::commands::train::{run_train, TrainSettings};
use crate::util::subject_folders;

/// Outcome of one subject.
#[derive(Debug)]
pub struct SubjectRun {
    pub subject: PathBuf,
    pub model: PathBuf,
    pub scores: PathBuf,
}

/// Run `train` followed by `score` for every subdirectory of `root`.
///
/// Stops at the first subject that fails.
pub fn run_batch(root: &Path, settings: &TrainSettings) -> Result<Vec<SubjectRun>> {
    let subjects = subject_folders(root)?;
    if subjects.is_empty() {
        anyhow::bail!("No subject folders found in {}", root.display());
    }
    log::info!("Running {} subjects from {}", subjects.len(), root.display());

    // each subject keeps its model next to its features
    let settings = TrainSettings {
        output: None,
        ..settings.clone()
    };

    let mut runs = Vec::with_capacity(subjects.len());
    for subject in subjects {
        let (model, model_path) = run_train(&subject, &settings)?;
        let parallel = settings.experiment.processes > 1;
        let scores = score_folder(
            &subject,
            &model,
            &settings.experiment.file_pattern,
            parallel,
            None,
        )?;
        runs.push(SubjectRun {
            subject,
            model: model_path,
            scores,
        });
    }
    Ok(runs)
}
