//! Majority-class downsampling.
//!
//! The interictal class usually outnumbers the preictal class by an order of
//! magnitude. [`downsample`] draws `floor(ratio * preictal)` interictal rows
//! without replacement and appends all preictal rows.
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::data_handling::{merge_interictal_preictal, Label, LabeledDataset};
use crate::error::{ModelSelectionError, Result};

/// A balanced working set and the seed that produced it.
#[derive(Debug, Clone)]
pub struct Downsampled {
    pub dataset: LabeledDataset,
    pub seed: u64,
}

/// Draw a fresh seed in the 32-bit range.
pub fn generate_seed() -> u64 {
    rand::thread_rng().gen_range(0..u32::MAX) as u64
}

/// Resolve an optional seed, logging the value when one had to be generated.
pub fn resolve_seed(seed: Option<u64>) -> u64 {
    match seed {
        Some(seed) => seed,
        None => {
            let seed = generate_seed();
            log::info!("No seed supplied, generated seed {}", seed);
            seed
        }
    }
}

/// Number of interictal rows requested for a given preictal count.
pub fn desired_interictal_count(downsample_ratio: f64, preictal_count: usize) -> Result<usize> {
    if !downsample_ratio.is_finite() || downsample_ratio < 0.0 {
        return Err(ModelSelectionError::config(format!(
            "downsample_ratio must be a non-negative number, got {}",
            downsample_ratio
        )));
    }
    Ok((downsample_ratio * preictal_count as f64).floor() as usize)
}

/// Downsample `interictal` to `downsample_ratio` times the preictal row count.
///
/// The returned dataset holds the sampled interictal rows (in draw order)
/// followed by every preictal row.
pub fn downsample(
    interictal: &LabeledDataset,
    preictal: &LabeledDataset,
    downsample_ratio: f64,
    seed: Option<u64>,
) -> Result<Downsampled> {
    let interictal_samples = interictal.n_rows();
    let preictal_samples = preictal.n_rows();

    if preictal_samples > interictal_samples {
        log::warn!(
            "More preictal than interictal samples: preictal {}, interictal {}",
            preictal_samples,
            interictal_samples
        );
    }

    let desired = desired_interictal_count(downsample_ratio, preictal_samples)?;
    if desired > interictal_samples {
        return Err(ModelSelectionError::InsufficientData {
            requested: desired,
            available: interictal_samples,
        });
    }

    let seed = resolve_seed(seed);
    let mut rng = StdRng::seed_from_u64(seed);
    let rows = rand::seq::index::sample(&mut rng, interictal_samples, desired).into_vec();

    let mut sampled = interictal.select(&rows);
    sampled.y = vec![Label::Interictal; sampled.n_rows()];
    let dataset = merge_interictal_preictal(&sampled, preictal)?;

    log::info!("Original interictal samples: {}", interictal_samples);
    log::info!("Original preictal samples: {}", preictal_samples);
    log::info!(
        "Interictal samples after downsampling: {} (seed {})",
        sampled.n_rows(),
        seed
    );
    log::info!(
        "Preictal samples after downsampling: {}",
        dataset.count(Label::Preictal)
    );

    Ok(Downsampled { dataset, seed })
}
