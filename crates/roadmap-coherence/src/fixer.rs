//! LLM-backed repair of auto-fixable coherence issues.
//!
//! Issues are processed in input order, one blocking LLM call per attempted
//! fix. Non-fixable issues are skipped. Once `max_fixes` fixes have been
//! attempted the remaining issues are left untouched. A failure while fixing
//! one issue is recorded on its result and never aborts the batch.

use crate::blocks::{parse_story_blocks, parse_task_blocks};
use crate::context::{cascading_context, resolve};
use crate::issue::{CoherenceIssue, FixStrategy, IssueKind};
use crate::prompts::{REPAIR_SYSTEM, story_generation_prompt, task_regeneration_prompt};
use roadmap_core::item::{Item, ItemType, Roadmap, TreeError};
use roadmap_llm::{LlmProvider, ProviderError};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};

/// Why a single fix attempt failed.
#[derive(Debug, thiserror::Error)]
pub enum FixError {
    #[error("item '{0}' not found in roadmap")]
    ItemNotFound(String),
    #[error("item '{id}' is a {actual}, expected a {expected}")]
    WrongItemType {
        id: String,
        expected: ItemType,
        actual: ItemType,
    },
    #[error("LLM call failed: {0}")]
    Provider(#[from] ProviderError),
}

/// Outcome of one attempted fix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FixResult {
    pub issue_type: IssueKind,
    pub item_id: String,
    pub success: bool,
    pub message: String,
}

impl FixResult {
    fn new(issue: &CoherenceIssue, success: bool, message: impl Into<String>) -> Self {
        Self {
            issue_type: issue.issue_type,
            item_id: issue.item_id.clone(),
            success,
            message: message.into(),
        }
    }
}

/// Aggregate outcome of a `fix_issues` run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FixReport {
    pub fixed: usize,
    pub failed: usize,
    /// Non-fixable issues encountered before the fix budget ran out
    pub skipped: usize,
    /// One record per attempted fix
    pub details: Vec<FixResult>,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl FixReport {
    fn record(&mut self, result: FixResult) {
        if result.success {
            self.fixed += 1;
        } else {
            self.failed += 1;
        }
        self.details.push(result);
    }

    pub fn attempted(&self) -> usize {
        self.details.len()
    }

    /// Human-readable multi-line summary.
    pub fn format_summary(&self) -> String {
        let mut out = format!(
            "Auto-fix results: {} fixed, {} failed, {} skipped\n",
            self.fixed, self.failed, self.skipped
        );
        if self.details.is_empty() {
            out.push_str("  No fixes attempted.\n");
            return out;
        }
        for result in &self.details {
            let status = if result.success { "OK  " } else { "FAIL" };
            out.push_str(&format!(
                "  [{}] {} {}: {}\n",
                status, result.issue_type, result.item_id, result.message
            ));
        }
        if self.input_tokens + self.output_tokens > 0 {
            out.push_str(&format!(
                "  Tokens: {} input, {} output\n",
                self.input_tokens, self.output_tokens
            ));
        }
        out
    }
}

/// What a successful strategy run produced.
struct Applied {
    created: usize,
    message: String,
}

/// Applies fix strategies to a roadmap using an LLM provider.
pub struct CoherenceFixer<'a> {
    provider: &'a dyn LlmProvider,
    context_depth: usize,
}

impl<'a> CoherenceFixer<'a> {
    pub fn new(provider: &'a dyn LlmProvider) -> Self {
        Self {
            provider,
            context_depth: 3,
        }
    }

    /// Dependency hops included in the context embedded in prompts.
    #[must_use]
    pub fn with_context_depth(mut self, depth: usize) -> Self {
        self.context_depth = depth;
        self
    }

    /// Attempt up to `max_fixes` auto-fixable issues, mutating the roadmap in place.
    ///
    /// Returns an error only if the roadmap itself violates the unique-id contract.
    pub fn fix_issues(
        &self,
        roadmap: &mut Roadmap,
        issues: &[CoherenceIssue],
        max_fixes: usize,
    ) -> Result<FixReport, TreeError> {
        // Built fresh: the tree may have changed since validation.
        let index = roadmap.item_index()?;
        let mut report = FixReport::default();

        for issue in issues {
            if report.attempted() >= max_fixes {
                debug!(max_fixes, "fix budget exhausted");
                break;
            }
            if !issue.auto_fixable {
                report.skipped += 1;
                continue;
            }

            let result = match issue.issue_type.fix_strategy() {
                None => FixResult::new(
                    issue,
                    false,
                    format!("Unknown issue type: {}", issue.issue_type),
                ),
                Some(strategy) => {
                    match self.apply(roadmap, &index, issue, strategy, &mut report) {
                        Ok(applied) if applied.created > 0 => {
                            info!(item = %issue.item_id, kind = %issue.issue_type, "{}", applied.message);
                            FixResult::new(issue, true, applied.message)
                        }
                        Ok(applied) => FixResult::new(issue, false, applied.message),
                        Err(e) => {
                            warn!(item = %issue.item_id, kind = %issue.issue_type, error = %e, "fix failed");
                            FixResult::new(issue, false, e.to_string())
                        }
                    }
                }
            };
            report.record(result);
        }

        if report.fixed > 0 {
            roadmap.touch();
        }
        Ok(report)
    }

    fn apply(
        &self,
        roadmap: &mut Roadmap,
        index: &HashMap<String, Vec<usize>>,
        issue: &CoherenceIssue,
        strategy: FixStrategy,
        report: &mut FixReport,
    ) -> Result<Applied, FixError> {
        let (path, item) = resolve(roadmap, index, &issue.item_id)
            .ok_or_else(|| FixError::ItemNotFound(issue.item_id.clone()))?;
        let expected = match strategy {
            FixStrategy::RegenerateTasks { .. } => ItemType::Story,
            FixStrategy::GenerateStories => ItemType::Epic,
        };
        if item.item_type != expected {
            return Err(FixError::WrongItemType {
                id: item.id.clone(),
                expected,
                actual: item.item_type,
            });
        }

        let context = cascading_context(roadmap, index, &issue.item_id, self.context_depth);
        let prompt = match strategy {
            FixStrategy::RegenerateTasks { .. } => task_regeneration_prompt(item, &context),
            FixStrategy::GenerateStories => story_generation_prompt(item, &context),
        };

        let response = self.provider.complete(REPAIR_SYSTEM, &prompt)?;
        report.input_tokens += response.input_tokens.unwrap_or(0);
        report.output_tokens += response.output_tokens.unwrap_or(0);

        let mut taken: HashSet<String> = roadmap
            .all_items()
            .into_iter()
            .map(|i| i.id.clone())
            .collect();
        let target = roadmap
            .item_at_mut(&path)
            .ok_or_else(|| FixError::ItemNotFound(issue.item_id.clone()))?;

        Ok(match strategy {
            FixStrategy::RegenerateTasks { clear_existing } => {
                apply_tasks(target, &response.text, clear_existing, &mut taken)
            }
            FixStrategy::GenerateStories => apply_stories(target, &response.text, &taken),
        })
    }
}

/// True if `id` is exactly one numeric segment below `parent_id`.
fn is_direct_child_id(parent_id: &str, id: &str) -> bool {
    id.strip_prefix(parent_id)
        .and_then(|rest| rest.strip_prefix('.'))
        .is_some_and(|segment| !segment.is_empty() && segment.chars().all(|c| c.is_ascii_digit()))
}

/// Append parsed tasks to a story. Existing tasks are only replaced once the
/// response has produced at least one task.
fn apply_tasks(
    story: &mut Item,
    response: &str,
    clear_existing: bool,
    taken: &mut HashSet<String>,
) -> Applied {
    let blocks = parse_task_blocks(response);
    if blocks.is_empty() {
        return Applied {
            created: 0,
            message: "LLM response contained no task blocks".to_string(),
        };
    }

    if clear_existing {
        let removed = story.remove_children_of_type(ItemType::Task);
        debug!(story = %story.id, removed = removed.len(), "cleared misaligned tasks");
        for task in &removed {
            taken.remove(&task.id);
        }
    }

    let mut next = story.count_children_of_type(ItemType::Task) + 1;
    let mut created = 0;
    for block in blocks {
        let usable = ItemType::Task.validate_id(&block.id).is_ok()
            && is_direct_child_id(&story.id, &block.id)
            && !taken.contains(&block.id);
        let id = if usable {
            block.id
        } else {
            loop {
                let candidate = format!("{}.{}", story.id, next);
                next += 1;
                if !taken.contains(&candidate) {
                    break candidate;
                }
            }
        };
        taken.insert(id.clone());

        let mut task = Item::new(id, block.title, ItemType::Task).with_description(block.goal);
        task.duration_hours = block.duration_hours;
        story.add_child(task);
        created += 1;
    }

    Applied {
        created,
        message: format!("Generated {} task(s) for story '{}'", created, story.name),
    }
}

/// Append parsed stories to an epic, skipping blocks whose id is malformed,
/// not numbered under the epic, or already in use.
fn apply_stories(epic: &mut Item, response: &str, taken: &HashSet<String>) -> Applied {
    let blocks = parse_story_blocks(response);
    let mut created = 0;
    let mut rejected = 0;

    for block in blocks {
        if let Err(e) = ItemType::Story.validate_id(&block.id) {
            warn!(epic = %epic.id, error = %e, "skipping generated story");
            rejected += 1;
            continue;
        }
        if !is_direct_child_id(&epic.id, &block.id) {
            warn!(epic = %epic.id, story = %block.id, "skipping story numbered outside the epic");
            rejected += 1;
            continue;
        }
        if taken.contains(&block.id) || epic.children.iter().any(|c| c.id == block.id) {
            warn!(epic = %epic.id, story = %block.id, "skipping generated story with duplicate id");
            rejected += 1;
            continue;
        }

        let story = Item::new(block.id, block.title, ItemType::Story)
            .with_description(block.description)
            .with_acceptance_criteria(block.acceptance_criteria);
        epic.add_child(story);
        created += 1;
    }

    let message = if created > 0 {
        format!("Created {} story(ies) for epic '{}'", created, epic.name)
    } else if rejected > 0 {
        format!("All {} generated story block(s) were rejected", rejected)
    } else {
        "LLM response contained no story blocks".to_string()
    };
    Applied { created, message }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_tasks_assigns_ids_on_collision() {
        let mut story = Item::new("1.1.1", "Login", ItemType::Story);
        story.add_child(Item::new("1.1.1.1", "Existing", ItemType::Task));
        let mut taken: HashSet<String> =
            ["1.1.1".to_string(), "1.1.1.1".to_string()].into_iter().collect();

        let response = "###TASK_START### 1.1.1.1\nTASK_TITLE: Clash\n###TASK_END###\n\
                        ###TASK_START###\nTASK_TITLE: No id\n###TASK_END###";
        let applied = apply_tasks(&mut story, response, false, &mut taken);

        assert_eq!(applied.created, 2);
        let ids: Vec<&str> = story.children.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["1.1.1.1", "1.1.1.2", "1.1.1.3"]);
    }

    #[test]
    fn test_apply_tasks_clears_only_with_new_blocks() {
        let mut story = Item::new("2.1", "Export", ItemType::Story);
        story.add_child(Item::new("2.1.1", "Old", ItemType::Task));
        let mut taken = HashSet::new();

        let applied = apply_tasks(&mut story, "nothing useful", true, &mut taken);
        assert_eq!(applied.created, 0);
        assert_eq!(story.children.len(), 1);

        let response = "###TASK_START### 2.1.1\nTASK_TITLE: New\n###TASK_END###";
        let applied = apply_tasks(&mut story, response, true, &mut taken);
        assert_eq!(applied.created, 1);
        assert_eq!(story.children.len(), 1);
        assert_eq!(story.children[0].name, "New");
    }

    #[test]
    fn test_apply_stories_rejects_bad_ids() {
        let mut epic = Item::new("3", "Reports", ItemType::Epic);
        let taken: HashSet<String> = ["3.2".to_string()].into_iter().collect();
        let response = "###STORY_START### 3.1\nSTORY_TITLE: Weekly\n###STORY_END###\n\
                        ###STORY_START### weekly-2\nSTORY_TITLE: Bad\n###STORY_END###\n\
                        ###STORY_START### 3.2\nSTORY_TITLE: Taken\n###STORY_END###";
        let applied = apply_stories(&mut epic, response, &taken);

        assert_eq!(applied.created, 1);
        assert_eq!(epic.children.len(), 1);
        assert_eq!(epic.children[0].parent_id.as_deref(), Some("3"));
    }

    #[test]
    fn test_apply_tasks_renumbers_ids_outside_the_story() {
        let mut story = Item::new("1.2.1", "Checkout", ItemType::Story);
        let mut taken: HashSet<String> = ["1.2.1".to_string()].into_iter().collect();
        let response = "###TASK_START### 7.7\nTASK_TITLE: Stray\n###TASK_END###\n\
                        ###TASK_START### 9.9.9.9\nTASK_TITLE: Far away\n###TASK_END###\n\
                        ###TASK_START### 1.2.1.1.1\nTASK_TITLE: Too deep\n###TASK_END###";
        let applied = apply_tasks(&mut story, response, false, &mut taken);

        assert_eq!(applied.created, 3);
        let ids: Vec<&str> = story.children.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["1.2.1.1", "1.2.1.2", "1.2.1.3"]);
        assert!(!taken.contains("7.7"));
        assert!(!taken.contains("9.9.9.9"));
    }

    #[test]
    fn test_apply_stories_skips_ids_outside_the_epic() {
        let mut epic = Item::new("3", "Reports", ItemType::Epic);
        let response = "###STORY_START### 8.4\nSTORY_TITLE: Elsewhere\n###STORY_END###\n\
                        ###STORY_START### 31.1\nSTORY_TITLE: Prefix lookalike\n###STORY_END###\n\
                        ###STORY_START### 3.1\nSTORY_TITLE: Weekly digest\n###STORY_END###";
        let applied = apply_stories(&mut epic, response, &HashSet::new());

        assert_eq!(applied.created, 1);
        let ids: Vec<&str> = epic.children.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["3.1"]);
    }

    #[test]
    fn test_direct_child_id() {
        assert!(is_direct_child_id("1.2", "1.2.3"));
        assert!(is_direct_child_id("3", "3.10"));
        assert!(!is_direct_child_id("3", "31.1"));
        assert!(!is_direct_child_id("1.2", "1.2"));
        assert!(!is_direct_child_id("1.2", "1.2."));
        assert!(!is_direct_child_id("1.2", "1.2.3.4"));
        assert!(!is_direct_child_id("1.2", "7.7"));
    }

    #[test]
    fn test_format_summary() {
        let issue = CoherenceIssue::new(IssueKind::EmptyEpic, "3", "Epic 'Reports' has no stories");
        let mut report = FixReport {
            skipped: 2,
            ..FixReport::default()
        };
        report.record(FixResult::new(&issue, true, "Created 2 story(ies) for epic 'Reports'"));
        let text = report.format_summary();
        assert!(text.starts_with("Auto-fix results: 1 fixed, 0 failed, 2 skipped"));
        assert!(text.contains("[OK  ] empty_epic 3: Created 2 story(ies)"));
    }

    #[test]
    fn test_format_summary_without_attempts() {
        let text = FixReport::default().format_summary();
        assert!(text.contains("No fixes attempted."));
    }
}
