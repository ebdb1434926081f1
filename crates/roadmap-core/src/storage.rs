//! Read/write roadmap files from disk.

use crate::item::Roadmap;
use crate::schema;
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

const ROADMAP_DIR: &str = ".roadmap";
const ROADMAP_FILE: &str = "roadmap.json";

/// Get the path to the roadmap directory for a given project root.
pub fn roadmap_dir(project_root: &Path) -> PathBuf {
    project_root.join(ROADMAP_DIR)
}

/// Get the path to the roadmap file for a given project root.
pub fn roadmap_file(project_root: &Path) -> PathBuf {
    roadmap_dir(project_root).join(ROADMAP_FILE)
}

/// Check if a roadmap exists for the given project root.
pub fn roadmap_exists(project_root: &Path) -> bool {
    roadmap_file(project_root).exists()
}

/// Load the roadmap stored under a project root.
pub fn load(project_root: &Path) -> Result<Roadmap> {
    load_file(&roadmap_file(project_root))
}

/// Save a roadmap under a project root, creating the .roadmap directory if needed.
pub fn save(project_root: &Path, roadmap: &Roadmap) -> Result<()> {
    save_file(&roadmap_file(project_root), roadmap)
}

/// Load a roadmap from an explicit file path.
pub fn load_file(path: &Path) -> Result<Roadmap> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("failed to read roadmap from {}", path.display()))?;
    schema::from_json(&json)
}

/// Save a roadmap to an explicit file path, creating parent directories.
pub fn save_file(path: &Path, roadmap: &Roadmap) -> Result<()> {
    if let Some(dir) = path.parent()
        && !dir.as_os_str().is_empty()
    {
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create directory {}", dir.display()))?;
    }

    let json = schema::to_json(roadmap)?;
    fs::write(path, json)
        .with_context(|| format!("failed to write roadmap to {}", path.display()))?;

    Ok(())
}
