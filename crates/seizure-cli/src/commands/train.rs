//! `seizure train`: load a subject's features, select a model, persist it.
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::ArgMatches;

use seizure_classifiers::config::ExperimentConfig;
use seizure_classifiers::data_handling::LabeledDataset;
use seizure_classifiers::grid_search::TrainedModel;
use seizure_classifiers::io::{load_class_features, save_model, save_model_in};
use seizure_classifiers::models::registry::Method;
use seizure_classifiers::pipeline::train_model;
use seizure_classifiers::report::html::write_html;

use crate::util::{sibling_with_extension, validate_folder};

/// Everything `train` needs besides the feature folder.
#[derive(Debug, Clone)]
pub struct TrainSettings {
    pub experiment: ExperimentConfig,
    /// Explicit model path; defaults to a timestamped file in the feature folder
    pub output: Option<PathBuf>,
    pub write_report: bool,
}

impl Default for TrainSettings {
    fn default() -> Self {
        TrainSettings {
            experiment: ExperimentConfig::default(),
            output: None,
            write_report: true,
        }
    }
}

impl TrainSettings {
    /// Read the optional config file and apply the command line overrides on top.
    pub fn from_arguments(config_path: Option<&PathBuf>, matches: &ArgMatches) -> Result<Self> {
        let mut experiment = match config_path {
            Some(path) => ExperimentConfig::from_file(path)?,
            None => {
                let defaults = ExperimentConfig::default();
                log::info!(
                    "No config file provided; using defaults:\n{}",
                    serde_json::to_string_pretty(&defaults)?
                );
                defaults
            }
        };

        if let Some(method) = matches.get_one::<String>("method") {
            experiment.method = method.parse::<Method>()?;
        }
        if let Some(seed) = matches.get_one::<u64>("seed") {
            experiment.seed = Some(*seed);
        }
        if let Some(processes) = matches.get_one::<usize>("processes") {
            experiment.processes = *processes;
        }
        if let Some(folds) = matches.get_one::<usize>("folds") {
            experiment.n_folds = *folds;
        }
        if matches.get_flag("no_segment_split") {
            experiment.segment_aware = false;
        }
        if matches.get_flag("no_downsample") {
            experiment.downsample = false;
        }

        Ok(TrainSettings {
            experiment,
            // `batch` has no --output
            output: matches.try_get_one::<PathBuf>("output").ok().flatten().cloned(),
            write_report: !matches.get_flag("no_report"),
        })
    }
}

/// Load the interictal and preictal tables of `folder`.
pub fn load_training_data(
    folder: &Path,
    config: &ExperimentConfig,
) -> Result<(LabeledDataset, LabeledDataset)> {
    let parallel = config.processes > 1;
    let interictal = load_class_features(folder, "interictal", &config.file_pattern, parallel)?;
    let preictal = load_class_features(folder, "preictal", &config.file_pattern, parallel)?;
    Ok((interictal, preictal))
}

/// Train on `folder` and return the fitted model with the path it was saved to.
pub fn run_train(folder: &Path, settings: &TrainSettings) -> Result<(TrainedModel, PathBuf)> {
    validate_folder(folder)?;
    let config = &settings.experiment;
    log::info!(
        "Running {} classification on folder {}",
        config.method,
        folder.display()
    );

    let (interictal, preictal) = load_training_data(folder, config)?;
    let (model, report) = train_model(&interictal, &preictal, config)
        .with_context(|| format!("Training failed for {}", folder.display()))?;

    let model_path = match &settings.output {
        Some(path) => {
            save_model(&model, path)?;
            path.clone()
        }
        None => save_model_in(&model, folder)?,
    };

    if let Some(report) = report {
        log::info!("Held-out evaluation:\n{}", report);
        if settings.write_report {
            let subtitle = format!("{} (seed {})", folder.display(), model.seed);
            write_html(&report, &subtitle, sibling_with_extension(&model_path, "html"))?;
        }
    }

    Ok((model, model_path))
}
