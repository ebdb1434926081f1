//! Cross-reference coherence validation.
//!
//! Runs five independent passes over a roadmap snapshot, in a fixed order:
//!
//! 1. task/story keyword alignment
//! 2. near-duplicate item names
//! 3. dependency existence
//! 4. scope balance of epics and stories
//! 5. repetitive story naming
//!
//! Data-quality findings become [`CoherenceIssue`]s. Only contract violations
//! of the tree itself (duplicate ids) are returned as errors.
//!
//! The duplicate pass compares every pair of items and is O(n²) in the number
//! of non-project items. That is fine for roadmaps of tens to low hundreds of
//! items; larger trees should be validated per milestone.

use crate::issue::{CoherenceIssue, IssueKind, ROADMAP_SCOPE_ID, Severity};
use crate::keywords::item_keywords;
use crate::report::{CoherenceSummary, format_report};
use crate::similarity::similarity;
use roadmap_core::config::CoherenceConfig;
use roadmap_core::item::{ItemType, Roadmap, TreeError};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::debug;

/// The outcome of one validation pass over a roadmap.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationRun {
    pub issues: Vec<CoherenceIssue>,
    /// Number of items in the lookup built for this run
    pub items_validated: usize,
}

impl ValidationRun {
    pub fn summary(&self) -> CoherenceSummary {
        CoherenceSummary::from_issues(&self.issues, self.items_validated)
    }
}

/// Validate a roadmap without retaining any state.
pub fn validate(roadmap: &Roadmap, config: &CoherenceConfig) -> Result<ValidationRun, TreeError> {
    let index = roadmap.item_index()?;
    let mut issues = Vec::new();

    check_task_alignment(roadmap, config, &mut issues);
    check_duplicates(roadmap, config, &mut issues);
    check_dependencies(roadmap, &index, &mut issues);
    check_scope(roadmap, config, &mut issues);
    check_naming(roadmap, config, &mut issues);

    debug!(
        items = index.len(),
        issues = issues.len(),
        "coherence validation finished"
    );

    Ok(ValidationRun {
        issues,
        items_validated: index.len(),
    })
}

/// Validator that keeps a snapshot of its most recent run.
///
/// `summary()`, `critical_issues()` and `format_report()` read the last stored
/// run; they report nothing until `validate_roadmap()` has been called.
#[derive(Debug, Clone, Default)]
pub struct CoherenceValidator {
    config: CoherenceConfig,
    last_run: Option<ValidationRun>,
}

impl CoherenceValidator {
    pub fn new(config: CoherenceConfig) -> Self {
        Self {
            config,
            last_run: None,
        }
    }

    pub fn config(&self) -> &CoherenceConfig {
        &self.config
    }

    /// Validate the roadmap, store the run, and return its issues.
    pub fn validate_roadmap(
        &mut self,
        roadmap: &Roadmap,
    ) -> Result<Vec<CoherenceIssue>, TreeError> {
        let run = validate(roadmap, &self.config)?;
        let issues = run.issues.clone();
        self.last_run = Some(run);
        Ok(issues)
    }

    pub fn last_run(&self) -> Option<&ValidationRun> {
        self.last_run.as_ref()
    }

    /// Issues from the last run.
    pub fn issues(&self) -> &[CoherenceIssue] {
        self.last_run
            .as_ref()
            .map(|r| r.issues.as_slice())
            .unwrap_or_default()
    }

    pub fn critical_issues(&self) -> Vec<&CoherenceIssue> {
        self.issues()
            .iter()
            .filter(|i| i.severity == Severity::Critical)
            .collect()
    }

    pub fn auto_fixable_issues(&self) -> Vec<&CoherenceIssue> {
        self.issues().iter().filter(|i| i.auto_fixable).collect()
    }

    pub fn summary(&self) -> CoherenceSummary {
        self.last_run
            .as_ref()
            .map(ValidationRun::summary)
            .unwrap_or_default()
    }

    pub fn format_report(&self) -> String {
        format_report(self.issues())
    }
}

/// Every story needs tasks, and those tasks should talk about what the story is about.
fn check_task_alignment(
    roadmap: &Roadmap,
    config: &CoherenceConfig,
    issues: &mut Vec<CoherenceIssue>,
) {
    for story in roadmap.stories() {
        let tasks: Vec<_> = story.children_of_type(ItemType::Task).collect();
        if tasks.is_empty() {
            issues.push(
                CoherenceIssue::new(
                    IssueKind::MissingTasks,
                    &story.id,
                    format!("Story '{}' has no tasks", story.name),
                )
                .with_suggestion("Generate implementation tasks for this story"),
            );
            continue;
        }

        let story_keywords = item_keywords(story);
        let task_keywords: BTreeSet<String> =
            tasks.iter().flat_map(|task| item_keywords(task)).collect();
        let overlap = story_keywords.intersection(&task_keywords).count();

        if overlap < config.min_keyword_overlap {
            issues.push(
                CoherenceIssue::new(
                    IssueKind::TaskStoryMismatch,
                    &story.id,
                    format!(
                        "Tasks of story '{}' share {} keyword(s) with the story (minimum {})",
                        story.name, overlap, config.min_keyword_overlap
                    ),
                )
                .with_suggestion("Regenerate tasks that directly implement the story"),
            );
        }
    }
}

/// Pairwise name comparison over all non-project items.
fn check_duplicates(roadmap: &Roadmap, config: &CoherenceConfig, issues: &mut Vec<CoherenceIssue>) {
    let items: Vec<_> = roadmap
        .all_items()
        .into_iter()
        .filter(|i| i.item_type != ItemType::Project)
        .collect();

    for (i, first) in items.iter().enumerate() {
        for second in &items[i + 1..] {
            let ratio = similarity(&first.name, &second.name);
            if ratio > config.similarity_threshold {
                let preview: String = second
                    .name
                    .chars()
                    .take(config.duplicate_name_preview)
                    .collect();
                issues.push(
                    CoherenceIssue::new(
                        IssueKind::PotentialDuplicate,
                        &first.id,
                        format!(
                            "Name is {:.0}% similar to '{}'",
                            ratio * 100.0,
                            preview
                        ),
                    )
                    .with_related(&second.id)
                    .with_suggestion("Merge the items or clarify how their scope differs"),
                );
            }
        }
    }
}

/// Every referenced id must exist in the item lookup.
fn check_dependencies(
    roadmap: &Roadmap,
    index: &HashMap<String, Vec<usize>>,
    issues: &mut Vec<CoherenceIssue>,
) {
    for item in roadmap.all_items() {
        for dep in item.all_dependency_ids() {
            if !index.contains_key(dep) {
                issues.push(
                    CoherenceIssue::new(
                        IssueKind::InvalidDependency,
                        &item.id,
                        format!(
                            "{} '{}' depends on '{}', which does not exist",
                            item.item_type, item.name, dep
                        ),
                    )
                    .with_related(dep)
                    .with_suggestion("Remove the dependency or point it at an existing item"),
                );
            }
        }
    }
}

fn check_scope(roadmap: &Roadmap, config: &CoherenceConfig, issues: &mut Vec<CoherenceIssue>) {
    for epic in roadmap.epics() {
        let stories = epic.count_children_of_type(ItemType::Story);
        let issue = match stories {
            0 => CoherenceIssue::new(
                IssueKind::EmptyEpic,
                &epic.id,
                format!("Epic '{}' has no stories", epic.name),
            )
            .with_suggestion("Generate stories that deliver this epic"),
            1 => CoherenceIssue::new(
                IssueKind::SingleStoryEpic,
                &epic.id,
                format!("Epic '{}' has only 1 story", epic.name),
            )
            .with_suggestion("Split the story or merge the epic into a related one"),
            n if n > config.max_stories_per_epic => CoherenceIssue::new(
                IssueKind::OversizedEpic,
                &epic.id,
                format!(
                    "Epic '{}' has {} stories (recommended maximum {})",
                    epic.name, n, config.max_stories_per_epic
                ),
            )
            .with_suggestion("Split the epic into smaller epics"),
            _ => continue,
        };
        issues.push(issue);
    }

    for story in roadmap.stories() {
        let tasks = story.count_children_of_type(ItemType::Task);
        if tasks > config.max_tasks_per_story {
            issues.push(
                CoherenceIssue::new(
                    IssueKind::OversizedStory,
                    &story.id,
                    format!(
                        "Story '{}' has {} tasks (recommended maximum {})",
                        story.name, tasks, config.max_tasks_per_story
                    ),
                )
                .with_suggestion("Split the story into smaller stories"),
            );
        }
    }
}

/// Flag two-word prefixes shared by many story names.
fn check_naming(roadmap: &Roadmap, config: &CoherenceConfig, issues: &mut Vec<CoherenceIssue>) {
    let mut prefixes: BTreeMap<String, usize> = BTreeMap::new();
    for story in roadmap.stories() {
        let mut words = story.name.split_whitespace();
        if let (Some(first), Some(second)) = (words.next(), words.next()) {
            let prefix = format!("{} {}", first.to_lowercase(), second.to_lowercase());
            *prefixes.entry(prefix).or_insert(0) += 1;
        }
    }

    for (prefix, count) in prefixes {
        if count >= config.repetitive_prefix_threshold {
            issues.push(
                CoherenceIssue::new(
                    IssueKind::RepetitiveNaming,
                    ROADMAP_SCOPE_ID,
                    format!("{} stories start with '{}'", count, prefix),
                )
                .with_suggestion("Name stories after the outcome they deliver"),
            );
        }
    }
}
