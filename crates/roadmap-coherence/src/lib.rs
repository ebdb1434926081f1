//! Roadmap coherence: cross-level validation and LLM-backed repair.
//!
//! Validation is deterministic and read-only. It checks that tasks implement
//! their story, that names are not near-duplicates, that dependencies resolve,
//! that epics and stories are sensibly sized, and that story names are not
//! boilerplate. Structural gaps (stories without tasks, empty epics) can then
//! be repaired by asking an LLM for replacement children.

pub mod blocks;
pub mod context;
pub mod fixer;
pub mod issue;
pub mod keywords;
pub mod prompts;
pub mod report;
pub mod similarity;
pub mod validator;

pub use context::{DependencyLink, cascading_context, dependency_chain};
pub use fixer::{CoherenceFixer, FixError, FixReport, FixResult};
pub use issue::{CoherenceIssue, FixStrategy, IssueKind, Severity};
pub use report::{CoherenceSummary, SeverityCounts, format_report};
pub use validator::{CoherenceValidator, ValidationRun, validate};
