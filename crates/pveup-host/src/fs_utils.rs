use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

pub fn remove_file_if_exists(path: &Path) -> io::Result<()> {
    if path.exists() {
        fs::remove_file(path)?;
    }
    Ok(())
}

fn part_path(path: &Path) -> PathBuf {
    path.with_file_name(format!(
        "{}.part",
        path.file_name()
            .and_then(|value| value.to_str())
            .unwrap_or("pveup")
    ))
}

/// Writes through a sibling `.part` file and renames it over `path`.
pub fn write_file_atomically(path: &Path, payload: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }

    let part = part_path(path);
    if let Err(err) = fs::write(&part, payload) {
        let _ = remove_file_if_exists(&part);
        return Err(err).with_context(|| format!("failed to write {}", part.display()));
    }
    if let Err(err) = fs::rename(&part, path) {
        let _ = remove_file_if_exists(&part);
        return Err(err).with_context(|| format!("failed to move {} into place", path.display()));
    }
    Ok(())
}
