use std::path::{Path, PathBuf};

use anyhow::Result;

pub fn validate_folder(path: &Path) -> Result<()> {
    if !path.is_dir() {
        anyhow::bail!("Feature folder does not exist: {}", path.display());
    }
    Ok(())
}

/// Path of a file next to `anchor` with the extension replaced.
pub fn sibling_with_extension(anchor: &Path, extension: &str) -> PathBuf {
    anchor.with_extension(extension)
}

/// Immediate subdirectories of `root`, sorted by name.
pub fn subject_folders(root: &Path) -> Result<Vec<PathBuf>> {
    validate_folder(root)?;
    let mut folders: Vec<PathBuf> = std::fs::read_dir(root)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_dir())
        .collect();
    folders.sort();
    Ok(folders)
}
