//! JSON serialization and version handling for roadmap files.

use crate::item::Roadmap;
use anyhow::{Context, Result};

pub const CURRENT_VERSION: &str = "1.0.0";

/// Validate a roadmap's schema version.
pub fn validate_version(roadmap: &Roadmap) -> Result<()> {
    if roadmap.version != CURRENT_VERSION {
        anyhow::bail!(
            "roadmap version mismatch: expected {}, found {}",
            CURRENT_VERSION,
            roadmap.version
        );
    }
    Ok(())
}

/// Serialize a roadmap to a pretty-printed JSON string.
pub fn to_json(roadmap: &Roadmap) -> Result<String> {
    serde_json::to_string_pretty(roadmap).context("failed to serialize roadmap to JSON")
}

/// Deserialize a roadmap from a JSON string and re-link parent references.
pub fn from_json(json: &str) -> Result<Roadmap> {
    let mut roadmap: Roadmap =
        serde_json::from_str(json).context("failed to deserialize roadmap from JSON")?;
    validate_version(&roadmap)?;
    roadmap.relink_parents();
    Ok(roadmap)
}
