//! JSON persistence of trained models.
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Local};

use crate::grid_search::TrainedModel;
use crate::models::registry::Method;

/// File name of a model saved at `time`: `model_<method>_<%m-%d-%Y-%H.%M.%S>.json`.
pub fn model_file_name(method: Method, time: DateTime<Local>) -> String {
    format!("model_{}_{}.json", method, time.format("%m-%d-%Y-%H.%M.%S"))
}

pub fn save_model<P: AsRef<Path>>(model: &TrainedModel, path: P) -> Result<()> {
    let path = path.as_ref();
    let json = serde_json::to_string_pretty(model).context("Failed to serialize model")?;
    fs::write(path, json).with_context(|| format!("Failed to write model to {}", path.display()))?;
    log::info!("Saved {} model to {}", model.method, path.display());
    Ok(())
}

/// Save `model` into `folder` under a timestamped name and return the path.
pub fn save_model_in<P: AsRef<Path>>(model: &TrainedModel, folder: P) -> Result<PathBuf> {
    let path = folder
        .as_ref()
        .join(model_file_name(model.method, Local::now()));
    save_model(model, &path)?;
    Ok(path)
}

pub fn load_model<P: AsRef<Path>>(path: P) -> Result<TrainedModel> {
    let path = path.as_ref();
    let bytes = fs::read(path).with_context(|| format!("Failed to read model file {}", path.display()))?;
    serde_json::from_slice(&bytes)
        .with_context(|| format!("Failed to parse model file {}", path.display()))
}

/// Most recently modified `model_*.json` in `folder`, if any.
pub fn latest_model<P: AsRef<Path>>(folder: P) -> Result<Option<PathBuf>> {
    let folder = folder.as_ref();
    let mut newest: Option<(std::time::SystemTime, PathBuf)> = None;
    for entry in fs::read_dir(folder)
        .with_context(|| format!("Failed to list {}", folder.display()))?
    {
        let entry = entry?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if !(name.starts_with("model_") && name.ends_with(".json")) {
            continue;
        }
        let modified = entry.metadata()?.modified()?;
        if newest.as_ref().map_or(true, |(t, _)| modified > *t) {
            newest = Some((modified, entry.path()));
        }
    }
    Ok(newest.map(|(_, path)| path))
}
