//! Dataset builders shared by the integration tests.
#![allow(dead_code)]

use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use seizure_classifiers::data_handling::{Label, LabeledDataset};

/// One class table: `n_segments` segments of `rows` frames each, features
/// scattered around `center`. Segment ids are `<prefix>_<k>`.
pub fn class_table(
    label: Label,
    prefix: &str,
    n_segments: usize,
    rows: usize,
    center: f64,
    seed: u64,
) -> LabeledDataset {
    let mut rng = StdRng::seed_from_u64(seed);
    let segments = (0..n_segments)
        .map(|s| {
            let frames = Array2::from_shape_fn((rows, 2), |_| center + rng.gen_range(-0.5..0.5));
            (format!("{}_{}", prefix, s), frames)
        })
        .collect();
    LabeledDataset::from_segments(label, segments).unwrap()
}

/// Well separated preictal (around +2) and interictal (around -2) segments,
/// interictal rows first.
pub fn separable(n_pre: usize, n_inter: usize, rows: usize, seed: u64) -> LabeledDataset {
    let inter = class_table(Label::Interictal, "interictal", n_inter, rows, -2.0, seed);
    let pre = class_table(Label::Preictal, "preictal", n_pre, rows, 2.0, seed + 1);
    inter.concat(&pre).unwrap()
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
