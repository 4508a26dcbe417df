//! File formats: per-segment feature CSVs, submission scores and persisted models.
pub mod feature_csv;
pub mod model_store;

pub use feature_csv::{
    find_class_files, load_class_features, load_segment_csv, write_segment_scores,
    DEFAULT_FILE_PATTERN,
};
pub use model_store::{latest_model, load_model, model_file_name, save_model, save_model_in};
