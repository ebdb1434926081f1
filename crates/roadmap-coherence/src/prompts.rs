//! Regeneration prompts sent to the LLM by the auto-fixer.

use roadmap_core::item::Item;

/// System prompt shared by every repair request.
pub const REPAIR_SYSTEM: &str = include_str!("prompts/repair_system.md");

const REGENERATE_TASKS_TEMPLATE: &str = include_str!("prompts/regenerate_tasks.md");
const GENERATE_STORIES_TEMPLATE: &str = include_str!("prompts/generate_stories.md");

/// Placeholder for empty descriptions, criteria and context.
pub const NOT_SPECIFIED: &str = "Not specified";

fn or_not_specified(text: &str) -> &str {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        NOT_SPECIFIED
    } else {
        trimmed
    }
}

fn bullet_list(items: &[String]) -> String {
    let lines: Vec<String> = items
        .iter()
        .map(|c| c.trim())
        .filter(|c| !c.is_empty())
        .map(|c| format!("- {}", c))
        .collect();
    if lines.is_empty() {
        NOT_SPECIFIED.to_string()
    } else {
        lines.join("\n")
    }
}

/// Substitute `{key}` placeholders in one scan of the template. Inserted
/// values are never rescanned, and unknown placeholders are kept verbatim.
fn fill(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let tail = &rest[open..];
        let value = tail.find('}').and_then(|close| {
            let key = &tail[1..close];
            values
                .iter()
                .find(|(name, _)| *name == key)
                .map(|(_, value)| (*value, close))
        });
        match value {
            Some((value, close)) => {
                out.push_str(value);
                rest = &tail[close + 1..];
            }
            None => {
                out.push('{');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// Prompt asking for a fresh task list for a story.
pub fn task_regeneration_prompt(story: &Item, context: &str) -> String {
    let criteria = bullet_list(story.criteria());
    fill(
        REGENERATE_TASKS_TEMPLATE,
        &[
            ("context", or_not_specified(context)),
            ("story_id", story.id.as_str()),
            ("story_name", story.name.as_str()),
            ("story_description", or_not_specified(&story.description)),
            ("acceptance_criteria", criteria.as_str()),
        ],
    )
}

/// Prompt asking for 2-4 stories for an empty epic.
pub fn story_generation_prompt(epic: &Item, context: &str) -> String {
    let criteria = bullet_list(epic.criteria());
    fill(
        GENERATE_STORIES_TEMPLATE,
        &[
            ("context", or_not_specified(context)),
            ("epic_id", epic.id.as_str()),
            ("epic_name", epic.name.as_str()),
            ("epic_description", or_not_specified(&epic.description)),
            ("success_criteria", criteria.as_str()),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use roadmap_core::item::ItemType;

    #[test]
    fn test_task_prompt_embeds_story() {
        let story = Item::new("2.1.3", "Invoice export", ItemType::Story)
            .with_description("Export invoices as PDF")
            .with_acceptance_criteria(["PDF renders", "Totals match"]);
        let prompt = task_regeneration_prompt(&story, "Epic: Billing");

        assert!(prompt.contains("ID: 2.1.3"));
        assert!(prompt.contains("Title: Invoice export"));
        assert!(prompt.contains("Description: Export invoices as PDF"));
        assert!(prompt.contains("- PDF renders\n- Totals match"));
        assert!(prompt.contains("Epic: Billing"));
        assert!(prompt.contains("2.1.3.1, 2.1.3.2"));
        assert!(prompt.contains("###TASK_START### <task_id>"));
        assert!(!prompt.contains("{story_"));
    }

    #[test]
    fn test_task_prompt_falls_back_to_not_specified() {
        let story = Item::new("1.1", "Bare", ItemType::Story);
        let prompt = task_regeneration_prompt(&story, "");
        assert!(prompt.contains("Description: Not specified"));
        assert!(prompt.contains("Acceptance criteria:\nNot specified"));
    }

    #[test]
    fn test_placeholders_in_item_text_stay_literal() {
        let story = Item::new("4.2", "Template {story_id}", ItemType::Story)
            .with_description("Mentions {acceptance_criteria} and {context} verbatim")
            .with_acceptance_criteria(["Shows {story_name}"]);
        let prompt = task_regeneration_prompt(&story, "Epic: {story_description}");

        assert!(prompt.contains("Title: Template {story_id}"));
        assert!(prompt.contains("Description: Mentions {acceptance_criteria} and {context} verbatim"));
        assert!(prompt.contains("- Shows {story_name}"));
        assert!(prompt.contains("Epic: {story_description}"));
        assert!(prompt.contains("ID: 4.2"));
    }

    #[test]
    fn test_fill_keeps_unknown_and_unclosed_braces() {
        let filled = fill("{a} {b} {a}{ tail", &[("a", "x{b}")]);
        assert_eq!(filled, "x{b} {b} x{b}{ tail");
    }

    #[test]
    fn test_story_prompt_uses_success_criteria() {
        let mut epic = Item::new("3", "Reporting", ItemType::Epic);
        epic.success_criteria = vec!["Weekly digest sent".to_string()];
        let prompt = story_generation_prompt(&epic, "");

        assert!(prompt.contains("Title: Reporting"));
        assert!(prompt.contains("- Weekly digest sent"));
        assert!(prompt.contains("###STORY_START### <story_id>"));
        assert!(prompt.contains("3.1, 3.2"));
        assert!(!prompt.contains("{epic_"));
    }
}
