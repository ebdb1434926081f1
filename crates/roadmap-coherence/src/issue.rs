//! Coherence issue data structures.
//!
//! Each finding carries a closed [`IssueKind`]. Severity and the repair
//! strategy are properties of the kind, so the auto-fixable table and the
//! fix dispatch live in one exhaustive match.

use serde::{Deserialize, Serialize};

/// Item id used for findings that concern the whole roadmap.
pub const ROADMAP_SCOPE_ID: &str = "roadmap";

/// Severity of a coherence issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    /// Correctness defect: missing required structure or a dangling reference
    Critical,
    /// Quality concern
    Warning,
    /// Advisory
    Info,
}

impl Severity {
    pub const ALL: [Severity; 3] = [Self::Critical, Self::Warning, Self::Info];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Critical => "CRITICAL",
            Self::Warning => "WARNING",
            Self::Info => "INFO",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How an auto-fixable issue is repaired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixStrategy {
    /// Ask the LLM for a fresh task list for the story. When `clear_existing`
    /// is set, the story's current tasks are replaced.
    RegenerateTasks { clear_existing: bool },
    /// Ask the LLM for 2-4 stories for an empty epic.
    GenerateStories,
}

/// The type of a coherence finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    MissingTasks,
    TaskStoryMismatch,
    PotentialDuplicate,
    InvalidDependency,
    EmptyEpic,
    SingleStoryEpic,
    OversizedEpic,
    OversizedStory,
    RepetitiveNaming,
}

impl IssueKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MissingTasks => "missing_tasks",
            Self::TaskStoryMismatch => "task_story_mismatch",
            Self::PotentialDuplicate => "potential_duplicate",
            Self::InvalidDependency => "invalid_dependency",
            Self::EmptyEpic => "empty_epic",
            Self::SingleStoryEpic => "single_story_epic",
            Self::OversizedEpic => "oversized_epic",
            Self::OversizedStory => "oversized_story",
            Self::RepetitiveNaming => "repetitive_naming",
        }
    }

    pub const fn severity(self) -> Severity {
        match self {
            Self::MissingTasks | Self::InvalidDependency | Self::EmptyEpic => Severity::Critical,
            Self::TaskStoryMismatch
            | Self::PotentialDuplicate
            | Self::OversizedEpic
            | Self::OversizedStory => Severity::Warning,
            Self::SingleStoryEpic | Self::RepetitiveNaming => Severity::Info,
        }
    }

    /// The repair strategy for this kind, if one exists.
    pub const fn fix_strategy(self) -> Option<FixStrategy> {
        match self {
            Self::MissingTasks => Some(FixStrategy::RegenerateTasks {
                clear_existing: false,
            }),
            Self::TaskStoryMismatch => Some(FixStrategy::RegenerateTasks {
                clear_existing: true,
            }),
            Self::EmptyEpic => Some(FixStrategy::GenerateStories),
            Self::PotentialDuplicate
            | Self::InvalidDependency
            | Self::SingleStoryEpic
            | Self::OversizedEpic
            | Self::OversizedStory
            | Self::RepetitiveNaming => None,
        }
    }

    pub const fn auto_fixable(self) -> bool {
        self.fix_strategy().is_some()
    }
}

impl std::fmt::Display for IssueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single coherence finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoherenceIssue {
    pub severity: Severity,
    /// Offending item, or [`ROADMAP_SCOPE_ID`] for roadmap-wide findings
    pub item_id: String,
    pub issue_type: IssueKind,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_item_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    pub auto_fixable: bool,
}

impl CoherenceIssue {
    /// Create an issue; severity and fixability follow from the kind.
    #[must_use]
    pub fn new(
        issue_type: IssueKind,
        item_id: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            severity: issue_type.severity(),
            item_id: item_id.into(),
            issue_type,
            description: description.into(),
            related_item_id: None,
            suggestion: None,
            auto_fixable: issue_type.auto_fixable(),
        }
    }

    #[must_use]
    pub fn with_related(mut self, related_item_id: impl Into<String>) -> Self {
        self.related_item_id = Some(related_item_id.into());
        self
    }

    #[must_use]
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Identity used to compare runs: `(item_id, issue_type, related_item_id)`.
    pub fn key(&self) -> (&str, IssueKind, Option<&str>) {
        (
            self.item_id.as_str(),
            self.issue_type,
            self.related_item_id.as_deref(),
        )
    }
}
