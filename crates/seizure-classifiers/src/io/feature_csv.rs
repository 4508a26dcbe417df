//! Per-segment feature CSV reader and submission writer.
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use ndarray::Array2;
use rayon::prelude::*;

use crate::data_handling::{Label, LabeledDataset};

/// Default suffix of feature files written by the extraction front end.
pub const DEFAULT_FILE_PATTERN: &str = "extract_features_for_segment.csv";

/// Read one headerless, comma separated feature file (one row per frame).
pub fn load_segment_csv<P: AsRef<Path>>(path: P) -> Result<Array2<f64>> {
    let path = path.as_ref();
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .from_path(path)
        .with_context(|| format!("Failed to open feature file: {}", path.display()))?;

    let mut values = Vec::new();
    let mut n_cols: Option<usize> = None;
    let mut n_rows = 0;
    for (line, record) in reader.records().enumerate() {
        let record =
            record.with_context(|| format!("Failed to read line {} of {}", line + 1, path.display()))?;
        match n_cols {
            None => n_cols = Some(record.len()),
            Some(expected) if expected != record.len() => bail!(
                "Line {} of {} has {} columns, expected {}",
                line + 1,
                path.display(),
                record.len(),
                expected
            ),
            Some(_) => {}
        }
        for (col, field) in record.iter().enumerate() {
            let value: f64 = field.trim().parse().with_context(|| {
                format!(
                    "Invalid number '{}' at line {}, column {} of {}",
                    field,
                    line + 1,
                    col + 1,
                    path.display()
                )
            })?;
            values.push(value);
        }
        n_rows += 1;
    }

    Array2::from_shape_vec((n_rows, n_cols.unwrap_or(0)), values)
        .with_context(|| format!("Inconsistent feature matrix in {}", path.display()))
}

/// Feature files of `class_name` in `folder`: names containing the class name
/// followed (somewhere) by `pattern` at the end. Sorted by file name.
pub fn find_class_files<P: AsRef<Path>>(folder: P, class_name: &str, pattern: &str) -> Result<Vec<PathBuf>> {
    let folder = folder.as_ref();
    let entries = fs::read_dir(folder)
        .with_context(|| format!("Failed to list feature folder: {}", folder.display()))?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let matches = name
            .find(class_name)
            .map_or(false, |at| name[at + class_name.len()..].ends_with(pattern));
        if matches {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Label given to the rows of a class folder. `test` segments carry
/// `Interictal` placeholders and are only ever scored.
pub fn class_label(class_name: &str) -> Result<Label> {
    match class_name {
        "preictal" => Ok(Label::Preictal),
        "interictal" | "test" => Ok(Label::Interictal),
        other => Err(anyhow!(
            "Unknown class '{}', expected preictal, interictal or test",
            other
        )),
    }
}

/// Load every feature file of `class_name` into one dataset sorted by segment id.
pub fn load_class_features<P: AsRef<Path>>(
    folder: P,
    class_name: &str,
    pattern: &str,
    parallel: bool,
) -> Result<LabeledDataset> {
    let folder = folder.as_ref();
    let label = class_label(class_name)?;
    let files = find_class_files(folder, class_name, pattern)?;
    if files.is_empty() {
        bail!(
            "No {} feature files matching '*{}*{}' in {}",
            class_name,
            class_name,
            pattern,
            folder.display()
        );
    }

    let load = |path: &PathBuf| -> Result<(String, Array2<f64>)> {
        let segment = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string)
            .ok_or_else(|| anyhow!("Invalid file name: {}", path.display()))?;
        Ok((segment, load_segment_csv(path)?))
    };

    let segments: Vec<(String, Array2<f64>)> = if parallel {
        log::info!("Reading {} {} files in parallel", files.len(), class_name);
        files.par_iter().map(load).collect::<Result<_>>()?
    } else {
        log::info!("Reading {} {} files serially", files.len(), class_name);
        files.iter().map(load).collect::<Result<_>>()?
    };

    let dataset = LabeledDataset::from_segments(label, segments)
        .with_context(|| format!("Failed to assemble {} features from {}", class_name, folder.display()))?;
    log::debug!(
        "Loaded {} rows of {} features for class {}",
        dataset.n_rows(),
        dataset.n_features(),
        class_name
    );
    Ok(dataset)
}

/// Write per-segment scores as a `clip,preictal` CSV.
pub fn write_segment_scores<P: AsRef<Path>>(path: P, scores: &[(String, f64)]) -> Result<()> {
    let path = path.as_ref();
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create score file: {}", path.display()))?;
    writer.write_record(["clip", "preictal"])?;
    for (segment, score) in scores {
        writer.write_record([segment.as_str(), &score.to_string()])?;
    }
    writer.flush()?;
    log::info!("Wrote {} segment scores to {}", scores.len(), path.display());
    Ok(())
}
