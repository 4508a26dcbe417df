use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::grid_search::SelectionOptions;
use crate::io::DEFAULT_FILE_PATTERN;
use crate::models::params::ParamOverrides;
use crate::models::registry::Method;

/// Settings of one training experiment. Every field has a default, so a
/// config file only needs the values it changes.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ExperimentConfig {
    pub method: Method,
    /// Share of segments (or rows) kept for training; the rest is the evaluation set
    pub training_ratio: f64,
    pub segment_aware: bool,
    pub n_folds: usize,
    pub downsample: bool,
    /// Interictal rows kept per preictal row
    pub downsample_ratio: f64,
    pub processes: usize,
    pub seed: Option<u64>,
    pub model_params: Option<ParamOverrides>,
    pub no_crossvalidation: bool,
    pub file_pattern: String,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            method: Method::Logistic,
            training_ratio: 0.8,
            segment_aware: true,
            n_folds: 10,
            downsample: true,
            downsample_ratio: 1.0,
            processes: 1,
            seed: None,
            model_params: None,
            no_crossvalidation: false,
            file_pattern: DEFAULT_FILE_PATTERN.to_string(),
        }
    }
}

impl ExperimentConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// Options handed to the grid search. `seed` is the already resolved seed.
    pub fn to_selection_options(&self, seed: u64) -> SelectionOptions {
        SelectionOptions {
            segment_aware: self.segment_aware,
            n_folds: self.n_folds,
            parallelism: self.processes,
            overrides: self.model_params.clone(),
            seed: Some(seed),
        }
    }
}
