//! Cross-validation splitters.
//!
//! [`StratifiedKFold`] splits rows, [`SegmentKFold`] splits whole recording
//! segments: it collapses the dataset to one label per segment, runs the
//! stratified split over segments and expands the result back to rows. Both
//! are deterministic for a given seed.
use std::collections::BTreeSet;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::data_handling::{Label, LabeledDataset};
use crate::error::{ModelSelectionError, Result};

/// One train/test partition of row indices. Both sides are sorted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fold {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// A strategy producing K folds over a dataset.
pub trait CrossValidator {
    fn split(&self, dataset: &LabeledDataset) -> Result<Vec<Fold>>;

    fn n_folds(&self) -> usize;
}

/// Per-row stratified K-fold.
#[derive(Debug, Clone)]
pub struct StratifiedKFold {
    n_folds: usize,
    seed: u64,
}

impl StratifiedKFold {
    pub fn new(n_folds: usize, seed: u64) -> Self {
        Self { n_folds, seed }
    }

    /// Assign every item to a test fold, stratified by `labels`.
    ///
    /// Items of each class are shuffled and dealt to folds in contiguous
    /// blocks; the first `n_class % K` folds get one extra item. Every class
    /// needs at least K items so that no test fold misses a class.
    fn assign(&self, labels: &[Label], unit: &str) -> Result<Vec<usize>> {
        check_fold_count(self.n_folds, labels.len(), unit)?;
        for class in Label::ALL {
            if !labels.contains(&class) {
                return Err(ModelSelectionError::config(format!(
                    "Stratification class {} is absent from the {} labels",
                    class, unit
                )));
            }
        }

        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut test_fold = vec![0usize; labels.len()];
        for class in Label::ALL {
            let mut members: Vec<usize> = labels
                .iter()
                .enumerate()
                .filter_map(|(i, &l)| if l == class { Some(i) } else { None })
                .collect();
            if members.len() < self.n_folds {
                return Err(ModelSelectionError::config(format!(
                    "Class {} has only {} {}s, fewer than n_folds={}; every test fold needs both classes",
                    class,
                    members.len(),
                    unit,
                    self.n_folds
                )));
            }
            members.shuffle(&mut rng);

            let base = members.len() / self.n_folds;
            let extra = members.len() % self.n_folds;
            let mut start = 0;
            for fold in 0..self.n_folds {
                let size = base + usize::from(fold < extra);
                for &member in &members[start..start + size] {
                    test_fold[member] = fold;
                }
                start += size;
            }
        }
        Ok(test_fold)
    }
}

impl CrossValidator for StratifiedKFold {
    fn split(&self, dataset: &LabeledDataset) -> Result<Vec<Fold>> {
        let test_fold = self.assign(&dataset.y, "row")?;
        Ok(folds_from_assignment(&test_fold, self.n_folds))
    }

    fn n_folds(&self) -> usize {
        self.n_folds
    }
}

/// Stratified K-fold over segments; a segment's rows always stay together.
#[derive(Debug, Clone)]
pub struct SegmentKFold {
    inner: StratifiedKFold,
}

impl SegmentKFold {
    pub fn new(n_folds: usize, seed: u64) -> Self {
        Self {
            inner: StratifiedKFold::new(n_folds, seed),
        }
    }
}

impl CrossValidator for SegmentKFold {
    fn split(&self, dataset: &LabeledDataset) -> Result<Vec<Fold>> {
        let segments = dataset.segments();
        let segment_labels = segments
            .iter()
            .map(|segment| segment_label(dataset, &segment.segment_id, &segment.rows))
            .collect::<Result<Vec<Label>>>()?;

        let segment_fold = self.inner.assign(&segment_labels, "segment")?;

        let mut row_fold = vec![0usize; dataset.n_rows()];
        for (segment, &fold) in segments.iter().zip(segment_fold.iter()) {
            for &row in &segment.rows {
                row_fold[row] = fold;
            }
        }

        let folds = folds_from_assignment(&row_fold, self.inner.n_folds);
        for (k, fold) in folds.iter().enumerate() {
            log::trace!(
                "Segment fold {}: {} training rows, {} test rows",
                k,
                fold.train.len(),
                fold.test.len()
            );
        }
        Ok(folds)
    }

    fn n_folds(&self) -> usize {
        self.inner.n_folds
    }
}

/// Majority label of a segment's rows; an exact tie counts as preictal.
fn segment_label(dataset: &LabeledDataset, segment_id: &str, rows: &[usize]) -> Result<Label> {
    if rows.is_empty() {
        return Err(ModelSelectionError::config(format!(
            "Segment {} has no rows",
            segment_id
        )));
    }
    let preictal = rows.iter().filter(|&&r| dataset.y[r].is_preictal()).count();
    if 2 * preictal >= rows.len() {
        Ok(Label::Preictal)
    } else {
        Ok(Label::Interictal)
    }
}

fn check_fold_count(n_folds: usize, n_units: usize, unit: &str) -> Result<()> {
    if n_folds < 2 {
        return Err(ModelSelectionError::config(format!(
            "At least 2 folds are required, got {}",
            n_folds
        )));
    }
    if n_folds > n_units {
        return Err(ModelSelectionError::config(format!(
            "Cannot build {} folds from {} distinct {}s",
            n_folds, n_units, unit
        )));
    }
    Ok(())
}

fn folds_from_assignment(test_fold: &[usize], n_folds: usize) -> Vec<Fold> {
    (0..n_folds)
        .map(|k| {
            let (test, train): (Vec<usize>, Vec<usize>) =
                (0..test_fold.len()).partition(|&i| test_fold[i] == k);
            Fold { train, test }
        })
        .collect()
}

/// Build the splitter used by the grid search.
pub fn cv_generator(segment_aware: bool, n_folds: usize, seed: u64) -> Box<dyn CrossValidator> {
    if segment_aware {
        Box::new(SegmentKFold::new(n_folds, seed))
    } else {
        Box::new(StratifiedKFold::new(n_folds, seed))
    }
}

/// Hold-out split: each segment (or row, when not segment aware) goes to the
/// training side with probability `training_ratio`.
///
/// Returns `(train, test)`.
pub fn train_test_split(
    dataset: &LabeledDataset,
    training_ratio: f64,
    segment_aware: bool,
    seed: u64,
) -> Result<(LabeledDataset, LabeledDataset)> {
    if !(0.0..=1.0).contains(&training_ratio) {
        return Err(ModelSelectionError::config(format!(
            "training_ratio must be in [0, 1], got {}",
            training_ratio
        )));
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut mask = vec![false; dataset.n_rows()];
    if segment_aware {
        for segment in dataset.segments() {
            let keep = rng.gen::<f64>() < training_ratio;
            for row in segment.rows {
                mask[row] = keep;
            }
        }
    } else {
        for m in mask.iter_mut() {
            *m = rng.gen::<f64>() < training_ratio;
        }
    }

    let inverse: Vec<bool> = mask.iter().map(|m| !m).collect();
    Ok((dataset.filter(&mask), dataset.filter(&inverse)))
}

/// Distinct segment ids referenced by `rows`.
pub fn segment_ids_of<'a>(dataset: &'a LabeledDataset, rows: &[usize]) -> BTreeSet<&'a str> {
    rows.iter()
        .map(|&r| dataset.segment_ids[r].as_str())
        .collect()
}
