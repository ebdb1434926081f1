//! Parsing of delimited task/story blocks from LLM responses.
//!
//! ```text
//! ###TASK_START### <task_id>
//! TASK_TITLE: <title>
//! TASK_GOAL: <goal>
//! TASK_DURATION_HOURS: <int 1-4>
//! ###TASK_END###
//!
//! ###STORY_START### <story_id>
//! STORY_TITLE: <title>
//! STORY_DESCRIPTION: <description>
//! ACCEPTANCE_CRITERIA:
//! - <criterion>
//! ###STORY_END###
//! ```
//!
//! The grammar is permissive: surrounding prose is ignored, markers and keys
//! tolerate extra whitespace and case differences, a block left open is closed
//! by the next start marker or the end of the text, and values may continue
//! on following lines.

use roadmap_llm::strip_think_blocks;

const TASK_START: &str = "###TASK_START###";
const TASK_END: &str = "###TASK_END###";
const STORY_START: &str = "###STORY_START###";
const STORY_END: &str = "###STORY_END###";

/// Accepted range for `TASK_DURATION_HOURS`; values outside are clamped.
pub const TASK_DURATION_RANGE: (u32, u32) = (1, 4);

/// A task parsed from a `###TASK_START###` block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskBlock {
    /// Id from the start marker; empty if the model omitted it
    pub id: String,
    pub title: String,
    pub goal: String,
    pub duration_hours: Option<u32>,
}

/// A story parsed from a `###STORY_START###` block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoryBlock {
    pub id: String,
    pub title: String,
    pub description: String,
    pub acceptance_criteria: Vec<String>,
}

/// Raw block: marker id plus the lines between the markers.
struct RawBlock<'a> {
    id: String,
    lines: Vec<&'a str>,
}

/// If `line` starts with `marker` (ignoring case and surrounding whitespace),
/// return the remainder.
fn strip_marker<'a>(line: &'a str, marker: &str) -> Option<&'a str> {
    let line = line.trim();
    let head = line.get(..marker.len())?;
    if head.eq_ignore_ascii_case(marker) {
        Some(line[marker.len()..].trim())
    } else {
        None
    }
}

fn split_blocks<'a>(text: &'a str, start: &str, end: &str) -> Vec<RawBlock<'a>> {
    let mut blocks = Vec::new();
    let mut current: Option<RawBlock<'a>> = None;

    for line in text.lines() {
        if let Some(rest) = strip_marker(line, start) {
            if let Some(open) = current.take() {
                blocks.push(open);
            }
            let id = rest.split_whitespace().next().unwrap_or_default();
            current = Some(RawBlock {
                id: id.to_string(),
                lines: Vec::new(),
            });
        } else if strip_marker(line, end).is_some() {
            if let Some(open) = current.take() {
                blocks.push(open);
            }
        } else if let Some(open) = current.as_mut() {
            open.lines.push(line);
        }
    }
    if let Some(open) = current {
        blocks.push(open);
    }
    blocks
}

/// Split `KEY: value` into a normalized key and value. Keys are uppercased,
/// stripped of markdown emphasis, and spaces become underscores.
fn split_field(line: &str) -> Option<(String, &str)> {
    let (key, value) = line.split_once(':')?;
    let key = key.trim().trim_matches('*').trim();
    if key.is_empty() || !key.chars().all(|c| c.is_ascii_alphabetic() || c == '_' || c == ' ') {
        return None;
    }
    Some((key.to_ascii_uppercase().replace(' ', "_"), value.trim()))
}

fn strip_bullet(line: &str) -> Option<&str> {
    let line = line.trim();
    for bullet in ["- ", "* ", "• "] {
        if let Some(rest) = line.strip_prefix(bullet) {
            return Some(rest.trim());
        }
    }
    // Numbered bullets: "1. text" / "1) text"
    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits > 0 {
        let rest = &line[digits..];
        if let Some(rest) = rest.strip_prefix(". ").or_else(|| rest.strip_prefix(") ")) {
            return Some(rest.trim());
        }
    }
    None
}

fn append_line(target: &mut String, line: &str) {
    if target.is_empty() {
        target.push_str(line);
    } else {
        target.push(' ');
        target.push_str(line);
    }
}

/// First integer in the value, clamped to [`TASK_DURATION_RANGE`].
fn parse_duration(value: &str) -> Option<u32> {
    let digits: String = value
        .trim()
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    let hours: u32 = digits.parse().ok()?;
    Some(hours.clamp(TASK_DURATION_RANGE.0, TASK_DURATION_RANGE.1))
}

fn non_empty_or(value: String, fallback: impl FnOnce() -> String) -> String {
    if value.trim().is_empty() {
        fallback()
    } else {
        value
    }
}

/// Parse every task block in an LLM response.
pub fn parse_task_blocks(text: &str) -> Vec<TaskBlock> {
    #[derive(Clone, Copy)]
    enum Field {
        None,
        Title,
        Goal,
    }

    let text = strip_think_blocks(text);
    split_blocks(&text, TASK_START, TASK_END)
        .into_iter()
        .map(|raw| {
            let mut title = String::new();
            let mut goal = String::new();
            let mut duration_hours = None;
            let mut field = Field::None;

            for line in raw.lines {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                match split_field(trimmed) {
                    Some((key, value)) if key == "TASK_TITLE" || key == "TITLE" => {
                        title = value.to_string();
                        field = Field::Title;
                    }
                    Some((key, value)) if key == "TASK_GOAL" || key == "GOAL" => {
                        goal = value.to_string();
                        field = Field::Goal;
                    }
                    Some((key, value)) if key.ends_with("DURATION_HOURS") || key == "DURATION" => {
                        duration_hours = parse_duration(value);
                        field = Field::None;
                    }
                    _ => match field {
                        Field::Title => append_line(&mut title, trimmed),
                        Field::Goal => append_line(&mut goal, trimmed),
                        Field::None => {}
                    },
                }
            }

            let id = raw.id;
            TaskBlock {
                title: non_empty_or(title, || format!("Task {}", id)),
                id,
                goal,
                duration_hours,
            }
        })
        .collect()
}

/// Parse every story block in an LLM response.
pub fn parse_story_blocks(text: &str) -> Vec<StoryBlock> {
    #[derive(Clone, Copy)]
    enum Field {
        None,
        Title,
        Description,
        Criteria,
    }

    let text = strip_think_blocks(text);
    split_blocks(&text, STORY_START, STORY_END)
        .into_iter()
        .map(|raw| {
            let mut title = String::new();
            let mut description = String::new();
            let mut acceptance_criteria = Vec::new();
            let mut field = Field::None;

            for line in raw.lines {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                if let Field::Criteria = field
                    && let Some(criterion) = strip_bullet(trimmed)
                {
                    if !criterion.is_empty() {
                        acceptance_criteria.push(criterion.to_string());
                    }
                    continue;
                }
                match split_field(trimmed) {
                    Some((key, value)) if key == "STORY_TITLE" || key == "TITLE" => {
                        title = value.to_string();
                        field = Field::Title;
                    }
                    Some((key, value)) if key == "STORY_DESCRIPTION" || key == "DESCRIPTION" => {
                        description = value.to_string();
                        field = Field::Description;
                    }
                    Some((key, value)) if key == "ACCEPTANCE_CRITERIA" => {
                        if !value.is_empty() {
                            acceptance_criteria.push(value.to_string());
                        }
                        field = Field::Criteria;
                    }
                    _ => match field {
                        Field::Title => append_line(&mut title, trimmed),
                        Field::Description => append_line(&mut description, trimmed),
                        Field::Criteria => acceptance_criteria.push(trimmed.to_string()),
                        Field::None => {}
                    },
                }
            }

            let id = raw.id;
            StoryBlock {
                title: non_empty_or(title, || format!("Story {}", id)),
                id,
                description,
                acceptance_criteria,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_single_task_block() {
        let text = "\
###TASK_START### 1.1.1.1
TASK_TITLE: Build login form
TASK_GOAL: Render email and password fields
TASK_DURATION_HOURS: 3
###TASK_END###";
        let tasks = parse_task_blocks(text);
        assert_eq!(
            tasks,
            vec![TaskBlock {
                id: "1.1.1.1".to_string(),
                title: "Build login form".to_string(),
                goal: "Render email and password fields".to_string(),
                duration_hours: Some(3),
            }]
        );
    }

    #[test]
    fn test_task_blocks_tolerate_prose_and_whitespace() {
        let text = "Here are your tasks:\n\n   ###task_start###   2.1.1\n  task_title :  Wire API client \n task_goal: Call the endpoint\n   and parse the body\nTASK_DURATION_HOURS: 9 hours\n###TASK_END###\nThanks!";
        let tasks = parse_task_blocks(text);
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].id, "2.1.1");
        assert_eq!(tasks[0].title, "Wire API client");
        assert_eq!(tasks[0].goal, "Call the endpoint and parse the body");
        assert_eq!(tasks[0].duration_hours, Some(4));
    }

    #[test]
    fn test_missing_task_title_uses_placeholder() {
        let text = "###TASK_START### 5.1\nTASK_GOAL: Something\n###TASK_END###";
        let tasks = parse_task_blocks(text);
        assert_eq!(tasks[0].title, "Task 5.1");
        assert_eq!(tasks[0].duration_hours, None);
    }

    #[test]
    fn test_unterminated_blocks_are_closed() {
        let text = "###TASK_START### 1\nTASK_TITLE: A\n###TASK_START### 2\nTASK_TITLE: B\n";
        let tasks = parse_task_blocks(text);
        let titles: Vec<&str> = tasks.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["A", "B"]);
    }

    #[test]
    fn test_think_blocks_are_ignored() {
        let text = "<think>###TASK_START### 0\nTASK_TITLE: ghost\n###TASK_END###</think>\n###TASK_START### 1\nTASK_TITLE: real\n###TASK_END###";
        let tasks = parse_task_blocks(text);
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].title, "real");
    }

    #[test]
    fn test_parse_story_block_with_criteria() {
        let text = "\
###STORY_START### 1.1
STORY_TITLE: Password reset
STORY_DESCRIPTION: Users can reset a forgotten password
ACCEPTANCE_CRITERIA:
- Reset email is sent
* Link expires after 1 hour
3. Old password stops working
###STORY_END###";
        let stories = parse_story_blocks(text);
        assert_eq!(stories.len(), 1);
        let story = &stories[0];
        assert_eq!(story.id, "1.1");
        assert_eq!(story.title, "Password reset");
        assert_eq!(story.description, "Users can reset a forgotten password");
        assert_eq!(
            story.acceptance_criteria,
            vec![
                "Reset email is sent",
                "Link expires after 1 hour",
                "Old password stops working"
            ]
        );
    }

    #[test]
    fn test_story_optional_sections_default_empty() {
        let text = "###STORY_START### 2.4\n###STORY_END###";
        let stories = parse_story_blocks(text);
        assert_eq!(stories[0].title, "Story 2.4");
        assert!(stories[0].description.is_empty());
        assert!(stories[0].acceptance_criteria.is_empty());
    }

    #[test]
    fn test_markdown_bold_keys() {
        let text = "###STORY_START### 1.2\n**STORY_TITLE**: Audit log\n###STORY_END###";
        assert_eq!(parse_story_blocks(text)[0].title, "Audit log");
    }

    #[test]
    fn test_no_blocks() {
        assert!(parse_task_blocks("I could not generate tasks.").is_empty());
        assert!(parse_story_blocks("").is_empty());
    }
}
