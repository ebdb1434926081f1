//! Configuration for coherence validation and LLM access.
//!
//! Load order: `.roadmap/config.toml` → environment variables → defaults.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level roadmap configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RoadmapConfig {
    pub coherence: CoherenceConfig,
    pub llm: LlmConfig,
}

/// Policy constants for the coherence validator and auto-fixer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoherenceConfig {
    /// Name similarity above which two items are flagged as potential duplicates.
    pub similarity_threshold: f64,
    /// Minimum shared keywords between a story and its tasks.
    pub min_keyword_overlap: usize,
    /// Epics with more stories than this are flagged as oversized.
    pub max_stories_per_epic: usize,
    /// Stories with more tasks than this are flagged as oversized.
    pub max_tasks_per_story: usize,
    /// Number of stories sharing a two-word prefix that counts as repetitive.
    pub repetitive_prefix_threshold: usize,
    /// Characters of the compared name shown in duplicate findings.
    pub duplicate_name_preview: usize,
    /// Default cap on LLM-backed fixes per run.
    pub max_fixes: usize,
    /// Maximum dependency hops included in cascading context.
    pub context_depth: usize,
}

/// LLM provider selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Force a provider ("anthropic", "openai"). Auto-detected from API keys when unset.
    pub provider: Option<String>,
    pub model: Option<String>,
    /// Base URL for OpenAI-compatible servers.
    pub base_url: Option<String>,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

impl Default for CoherenceConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.8,
            min_keyword_overlap: 2,
            max_stories_per_epic: 10,
            max_tasks_per_story: 8,
            repetitive_prefix_threshold: 4,
            duplicate_name_preview: 40,
            max_fixes: 10,
            context_depth: 3,
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: None,
            model: None,
            base_url: None,
            max_tokens: 4096,
            timeout_secs: 120,
        }
    }
}

/// Helper to parse an env var and apply it to a config field.
fn env_override<T: std::str::FromStr>(var: &str, target: &mut T) {
    if let Ok(v) = std::env::var(var)
        && let Ok(n) = v.parse()
    {
        *target = n;
    }
}

fn env_override_opt(var: &str, target: &mut Option<String>) {
    if let Ok(v) = std::env::var(var)
        && !v.trim().is_empty()
    {
        *target = Some(v);
    }
}

impl RoadmapConfig {
    /// Load config from `.roadmap/config.toml` in the project root, with env var overrides.
    /// Falls back to defaults if no config file exists.
    pub fn load(project_root: &Path) -> Result<Self> {
        let config_path = project_root.join(".roadmap").join("config.toml");

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content)?
        } else {
            Self::default()
        };

        env_override(
            "ROADMAP_SIMILARITY_THRESHOLD",
            &mut config.coherence.similarity_threshold,
        );
        env_override(
            "ROADMAP_MIN_KEYWORD_OVERLAP",
            &mut config.coherence.min_keyword_overlap,
        );
        env_override(
            "ROADMAP_MAX_STORIES_PER_EPIC",
            &mut config.coherence.max_stories_per_epic,
        );
        env_override(
            "ROADMAP_MAX_TASKS_PER_STORY",
            &mut config.coherence.max_tasks_per_story,
        );
        env_override("ROADMAP_MAX_FIXES", &mut config.coherence.max_fixes);
        env_override_opt("ROADMAP_LLM_PROVIDER", &mut config.llm.provider);
        env_override_opt("ROADMAP_MODEL", &mut config.llm.model);

        config.validate()?;
        Ok(config)
    }

    /// Reject values the validator cannot work with.
    pub fn validate(&self) -> Result<()> {
        let threshold = self.coherence.similarity_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            anyhow::bail!(
                "similarity_threshold ({}) must be between 0.0 and 1.0",
                threshold
            );
        }
        if self.coherence.repetitive_prefix_threshold < 2 {
            anyhow::bail!(
                "repetitive_prefix_threshold ({}) must be at least 2",
                self.coherence.repetitive_prefix_threshold
            );
        }
        Ok(())
    }
}
