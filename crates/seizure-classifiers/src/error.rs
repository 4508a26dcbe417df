use thiserror::Error;

use crate::models::params::ParamSet;

/// Errors raised by the model selection core.
///
/// None of these are retried: callers are expected to halt the experiment and
/// inspect the attached context.
#[derive(Debug, Error)]
pub enum ModelSelectionError {
    /// Requested model family is not part of the registry.
    #[error("Method {0} is not supported")]
    UnsupportedMethod(String),

    /// Invalid fold count, empty grid, missing class, bad parameters, shape mismatch.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Downsampling asked for more majority-class rows than exist.
    #[error("Insufficient data: requested {requested} interictal rows but only {available} are available")]
    InsufficientData { requested: usize, available: usize },

    /// An estimator failed to fit or score during the search (or the final refit).
    #[error("Fit failure for {params} ({}): {message}", fold_label(.fold))]
    FitFailure {
        params: ParamSet,
        fold: Option<usize>,
        message: String,
    },
}

fn fold_label(fold: &Option<usize>) -> String {
    match fold {
        Some(k) => format!("fold {}", k),
        None => "refit on full training set".to_string(),
    }
}

impl ModelSelectionError {
    pub(crate) fn config<S: Into<String>>(msg: S) -> Self {
        ModelSelectionError::Configuration(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, ModelSelectionError>;
