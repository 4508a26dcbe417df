//! Labeled feature tables for interictal/preictal EEG segments.
//!
//! A [`LabeledDataset`] keeps the feature matrix together with the row
//! metadata (segment id, frame id) and one [`Label`] per row. Rows that share
//! a `segment_id` came from the same recording segment; the splitters in
//! [`crate::cross_validation`] never separate them.
use std::collections::HashMap;
use std::convert::TryFrom;
use std::fmt;

use ndarray::{concatenate, Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

use crate::error::{ModelSelectionError, Result};

/// Binary class of a feature row. `Preictal` is the positive class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Label {
    Interictal,
    Preictal,
}

impl Label {
    /// Both labels in class order (as used for confusion matrix rows/columns).
    pub const ALL: [Label; 2] = [Label::Interictal, Label::Preictal];

    pub fn as_u8(self) -> u8 {
        match self {
            Label::Interictal => 0,
            Label::Preictal => 1,
        }
    }

    pub fn is_preictal(self) -> bool {
        self == Label::Preictal
    }

    pub fn name(self) -> &'static str {
        match self {
            Label::Interictal => "Interictal",
            Label::Preictal => "Preictal",
        }
    }
}

impl From<Label> for u8 {
    fn from(label: Label) -> Self {
        label.as_u8()
    }
}

impl TryFrom<u8> for Label {
    type Error = String;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        match value {
            0 => Ok(Label::Interictal),
            1 => Ok(Label::Preictal),
            other => Err(format!("Invalid label {}, expected 0 or 1", other)),
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Row indices belonging to one recording segment.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentGroup {
    pub segment_id: String,
    pub rows: Vec<usize>,
}

#[derive(Debug, Clone)]
pub struct LabeledDataset {
    /// Feature matrix, shape (n_rows, n_features)
    pub x: Array2<f64>,
    /// One label per row
    pub y: Vec<Label>,
    /// Source recording of each row
    pub segment_ids: Vec<String>,
    /// Position of each row within its segment
    pub frame_ids: Vec<usize>,
}

impl LabeledDataset {
    pub fn new(
        x: Array2<f64>,
        y: Vec<Label>,
        segment_ids: Vec<String>,
        frame_ids: Vec<usize>,
    ) -> Result<Self> {
        let n = x.nrows();
        if y.len() != n || segment_ids.len() != n || frame_ids.len() != n {
            return Err(ModelSelectionError::config(format!(
                "Dataset columns have mismatched lengths: {} feature rows, {} labels, {} segment ids, {} frame ids",
                n,
                y.len(),
                segment_ids.len(),
                frame_ids.len()
            )));
        }
        Ok(LabeledDataset {
            x,
            y,
            segment_ids,
            frame_ids,
        })
    }

    /// Build a single-class dataset from per-segment frame matrices.
    ///
    /// Frame ids restart at zero for every segment.
    pub fn from_segments(label: Label, segments: Vec<(String, Array2<f64>)>) -> Result<Self> {
        let Some(n_features) = segments.first().map(|(_, frames)| frames.ncols()) else {
            return Err(ModelSelectionError::config(format!(
                "No {} segments were provided",
                label
            )));
        };

        let mut segment_ids = Vec::new();
        let mut frame_ids = Vec::new();
        let mut views: Vec<ArrayView2<f64>> = Vec::with_capacity(segments.len());
        for (segment_id, frames) in &segments {
            if frames.ncols() != n_features {
                return Err(ModelSelectionError::config(format!(
                    "Segment {} has {} features, expected {}",
                    segment_id,
                    frames.ncols(),
                    n_features
                )));
            }
            if frames.nrows() == 0 {
                return Err(ModelSelectionError::config(format!(
                    "Segment {} has no rows",
                    segment_id
                )));
            }
            for frame in 0..frames.nrows() {
                segment_ids.push(segment_id.clone());
                frame_ids.push(frame);
            }
            views.push(frames.view());
        }

        let x = concatenate(Axis(0), &views)
            .map_err(|e| ModelSelectionError::config(format!("Failed to stack segments: {}", e)))?;
        let y = vec![label; x.nrows()];
        LabeledDataset::new(x, y, segment_ids, frame_ids)
    }

    pub fn n_rows(&self) -> usize {
        self.x.nrows()
    }

    pub fn n_features(&self) -> usize {
        self.x.ncols()
    }

    pub fn is_empty(&self) -> bool {
        self.x.nrows() == 0
    }

    pub fn count(&self, label: Label) -> usize {
        self.y.iter().filter(|&&l| l == label).count()
    }

    pub fn log_input_data_summary(&self) {
        log::info!(
            "{} interictal rows and {} preictal rows from {} segments, {} features",
            self.count(Label::Interictal),
            self.count(Label::Preictal),
            self.segments().len(),
            self.n_features()
        );
    }

    /// Rows at `indices`, in the given order.
    pub fn select(&self, indices: &[usize]) -> LabeledDataset {
        LabeledDataset {
            x: self.x.select(Axis(0), indices),
            y: indices.iter().map(|&i| self.y[i]).collect(),
            segment_ids: indices.iter().map(|&i| self.segment_ids[i].clone()).collect(),
            frame_ids: indices.iter().map(|&i| self.frame_ids[i]).collect(),
        }
    }

    /// Rows where `mask[i]` is true.
    pub fn filter(&self, mask: &[bool]) -> LabeledDataset {
        let selected: Vec<usize> = mask
            .iter()
            .enumerate()
            .filter_map(|(i, &m)| if m { Some(i) } else { None })
            .collect();
        self.select(&selected)
    }

    /// Append the rows of `other` after the rows of `self`.
    pub fn concat(&self, other: &LabeledDataset) -> Result<LabeledDataset> {
        if self.is_empty() {
            return Ok(other.clone());
        }
        if other.is_empty() {
            return Ok(self.clone());
        }
        if self.n_features() != other.n_features() {
            return Err(ModelSelectionError::config(format!(
                "Cannot concatenate datasets with {} and {} features",
                self.n_features(),
                other.n_features()
            )));
        }
        let x = concatenate(Axis(0), &[self.x.view(), other.x.view()])
            .map_err(|e| ModelSelectionError::config(format!("Failed to concatenate: {}", e)))?;
        let mut y = self.y.clone();
        y.extend_from_slice(&other.y);
        let mut segment_ids = self.segment_ids.clone();
        segment_ids.extend(other.segment_ids.iter().cloned());
        let mut frame_ids = self.frame_ids.clone();
        frame_ids.extend_from_slice(&other.frame_ids);
        LabeledDataset::new(x, y, segment_ids, frame_ids)
    }

    /// Segments in order of first appearance.
    pub fn segments(&self) -> Vec<SegmentGroup> {
        let mut position: HashMap<&str, usize> = HashMap::new();
        let mut groups: Vec<SegmentGroup> = Vec::new();
        for (row, segment_id) in self.segment_ids.iter().enumerate() {
            match position.get(segment_id.as_str()) {
                Some(&idx) => groups[idx].rows.push(row),
                None => {
                    position.insert(segment_id.as_str(), groups.len());
                    groups.push(SegmentGroup {
                        segment_id: segment_id.clone(),
                        rows: vec![row],
                    });
                }
            }
        }
        groups
    }
}

/// Stack the interictal rows followed by the preictal rows.
pub fn merge_interictal_preictal(
    interictal: &LabeledDataset,
    preictal: &LabeledDataset,
) -> Result<LabeledDataset> {
    interictal.concat(preictal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn toy() -> LabeledDataset {
        LabeledDataset::new(
            array![[0.0, 1.0], [1.0, 1.0], [2.0, 1.0], [3.0, 1.0]],
            vec![Label::Interictal, Label::Interictal, Label::Preictal, Label::Preictal],
            vec!["a".into(), "b".into(), "a".into(), "c".into()],
            vec![0, 0, 1, 0],
        )
        .unwrap()
    }

    #[test]
    fn test_new_rejects_mismatched_lengths() {
        let result = LabeledDataset::new(
            array![[0.0], [1.0]],
            vec![Label::Preictal],
            vec!["a".into(), "a".into()],
            vec![0, 1],
        );
        assert!(matches!(result, Err(ModelSelectionError::Configuration(_))));
    }

    #[test]
    fn test_segments_in_first_appearance_order() {
        let groups = toy().segments();
        assert_eq!(groups.len(), 3);
        assert_eq!(groups[0].segment_id, "a");
        assert_eq!(groups[0].rows, vec![0, 2]);
        assert_eq!(groups[1].rows, vec![1]);
        assert_eq!(groups[2].rows, vec![3]);
    }

    #[test]
    fn test_select_and_filter_keep_metadata_aligned() {
        let ds = toy();
        let sub = ds.select(&[3, 0]);
        assert_eq!(sub.x[[0, 0]], 3.0);
        assert_eq!(sub.y, vec![Label::Preictal, Label::Interictal]);
        assert_eq!(sub.segment_ids, vec!["c".to_string(), "a".to_string()]);

        let filtered = ds.filter(&[false, true, true, false]);
        assert_eq!(filtered.n_rows(), 2);
        assert_eq!(filtered.frame_ids, vec![0, 1]);
    }

    #[test]
    fn test_from_segments_assigns_frame_ids() {
        let ds = LabeledDataset::from_segments(
            Label::Preictal,
            vec![
                ("s1".to_string(), array![[1.0, 2.0], [3.0, 4.0]]),
                ("s2".to_string(), array![[5.0, 6.0]]),
            ],
        )
        .unwrap();
        assert_eq!(ds.n_rows(), 3);
        assert_eq!(ds.frame_ids, vec![0, 1, 0]);
        assert_eq!(ds.count(Label::Preictal), 3);
    }

    #[test]
    fn test_label_serializes_as_integer() {
        let json = serde_json::to_string(&vec![Label::Interictal, Label::Preictal]).unwrap();
        assert_eq!(json, "[0,1]");
        let back: Vec<Label> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, vec![Label::Interictal, Label::Preictal]);
        assert!(serde_json::from_str::<Label>("2").is_err());
    }
}
