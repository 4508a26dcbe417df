//! seizure-classifiers: model selection for iEEG seizure prediction.
//!
//! The crate takes per-class feature tables (interictal and preictal frames
//! grouped by recording segment), balances them, holds out an evaluation
//! partition, and runs an exhaustive cross-validated grid search over a fixed
//! set of classifier families. Splits never separate the frames of one
//! segment, and every random draw is driven by an explicit seed so that an
//! experiment can be replayed exactly.
//!
//! Estimators wrap the linfa family behind one `Classifier` trait, held-out
//! metrics come from `smartcore`, and the grid search runs its
//! (configuration, fold) tasks on a `rayon` pool.
pub mod config;
pub mod cross_validation;
pub mod data_handling;
pub mod error;
pub mod grid_search;
pub mod io;
pub mod models;
pub mod pipeline;
pub mod report;
pub mod resample;
pub mod stats;
