//! Todo-list payload parsing for `update_todo` / `manage_todo_list`.
//!
//! Two payload shapes are accepted: a `todos` string holding a markdown
//! checklist, or a structured list under one of several well-known keys.
//! Parsing is total; anything unreadable yields zero steps and the update is
//! suppressed upstream.

use regex::Regex;
use serde_json::Value;
use skein_core::ToolArgs;
use std::sync::OnceLock;

/// Completion class of one todo step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepState {
    Done,
    Failed,
    Running,
}

impl StepState {
    /// `completed` is done; `failed`, `blocked` and `cancelled` are failed;
    /// every other status string (including custom ones) is running.
    pub fn classify(status: &str) -> Self {
        match status.trim().to_lowercase().as_str() {
            "completed" => StepState::Done,
            "failed" | "blocked" | "cancelled" => StepState::Failed,
            _ => StepState::Running,
        }
    }
}

/// One parsed todo step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TodoStep {
    pub id: Option<u64>,
    pub title: String,
    pub state: StepState,
}

/// A parsed todo payload
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TodoUpdate {
    pub steps: Vec<TodoStep>,
}

impl TodoUpdate {
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// (completed, failed, total)
    pub fn counts(&self) -> (usize, usize, usize) {
        let completed = self.steps.iter().filter(|s| s.state == StepState::Done).count();
        let failed = self.steps.iter().filter(|s| s.state == StepState::Failed).count();
        (completed, failed, self.steps.len())
    }
}

const LIST_KEYS: &[&str] = &["todoList", "todo", "items", "tasks", "todos"];
const TITLE_KEYS: &[&str] = &["title", "step", "name", "label"];
const STATUS_KEYS: &[&str] = &["status", "state"];

fn checkbox_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*[-*]\s*\[(?<mark> |x|X)\]\s*(?<title>.*)$").unwrap())
}

/// Parse a todo payload into steps; unknown shapes yield zero steps
pub fn parse_todo(args: &ToolArgs) -> TodoUpdate {
    if let Some(checklist) = args.str_field(&["todos"]) {
        return parse_checklist(checklist);
    }
    if let Some(items) = args.array_field(LIST_KEYS) {
        return parse_structured(items);
    }
    TodoUpdate::default()
}

/// Markdown checklist: `- [x] Title` is done, `- [ ] Title` is pending, and
/// any other non-empty line is a pending step titled by the whole line.
fn parse_checklist(text: &str) -> TodoUpdate {
    let mut steps = Vec::new();
    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Some(caps) = checkbox_re().captures(line) {
            let done = caps["mark"].eq_ignore_ascii_case("x");
            steps.push(TodoStep {
                id: None,
                title: caps["title"].trim().to_string(),
                state: if done { StepState::Done } else { StepState::Running },
            });
        } else {
            steps.push(TodoStep { id: None, title: trimmed.to_string(), state: StepState::Running });
        }
    }
    TodoUpdate { steps }
}

fn parse_structured(items: &[Value]) -> TodoUpdate {
    let mut steps = Vec::new();
    for item in items {
        let entry = ToolArgs::from_value(item.clone());
        let Some(title) = entry.str_field(TITLE_KEYS) else { continue };
        let status = entry.str_field(STATUS_KEYS).unwrap_or("not-started");
        steps.push(TodoStep {
            id: entry.u64_field(&["id"]),
            title: title.to_string(),
            state: StepState::classify(status),
        });
    }
    TodoUpdate { steps }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_states() {
        assert_eq!(StepState::classify("completed"), StepState::Done);
        assert_eq!(StepState::classify("failed"), StepState::Failed);
        assert_eq!(StepState::classify("blocked"), StepState::Failed);
        assert_eq!(StepState::classify("cancelled"), StepState::Failed);
        assert_eq!(StepState::classify("in-progress"), StepState::Running);
        assert_eq!(StepState::classify("not-started"), StepState::Running);
        assert_eq!(StepState::classify("some-custom-status"), StepState::Running);
        assert_eq!(StepState::classify("COMPLETED"), StepState::Done);
    }

    #[test]
    fn test_parse_checklist() {
        let args = ToolArgs::parse(r#"{"todos": "- [x] Write parser\n- [ ] Wire it up\nFollow up later\n"}"#);
        let update = parse_todo(&args);
        assert_eq!(update.steps.len(), 3);
        assert_eq!(update.steps[0].title, "Write parser");
        assert_eq!(update.steps[0].state, StepState::Done);
        assert_eq!(update.steps[1].state, StepState::Running);
        assert_eq!(update.steps[2].title, "Follow up later");
        assert_eq!(update.steps[2].state, StepState::Running);
        assert_eq!(update.counts(), (1, 0, 3));
    }

    #[test]
    fn test_parse_checklist_uppercase_mark() {
        let args = ToolArgs::parse(r#"{"todos": "* [X] Shout"}"#);
        let update = parse_todo(&args);
        assert_eq!(update.steps[0].state, StepState::Done);
    }

    #[test]
    fn test_parse_structured_list() {
        let args = ToolArgs::parse(
            r#"{"todoList": [
                {"id": 1, "title": "First", "status": "completed"},
                {"step": "Second", "state": "blocked"},
                {"name": "Third"},
                {"status": "completed"}
            ]}"#,
        );
        let update = parse_todo(&args);
        assert_eq!(update.steps.len(), 3);
        assert_eq!(update.steps[0].id, Some(1));
        assert_eq!(update.steps[0].state, StepState::Done);
        assert_eq!(update.steps[1].state, StepState::Failed);
        assert_eq!(update.steps[2].title, "Third");
        assert_eq!(update.steps[2].state, StepState::Running);
        assert_eq!(update.counts(), (1, 1, 3));
    }

    #[test]
    fn test_parse_bare_array_payload() {
        let args = ToolArgs::parse(r#"[{"title": "Only", "status": "cancelled"}]"#);
        let update = parse_todo(&args);
        assert_eq!(update.counts(), (0, 1, 1));
    }

    #[test]
    fn test_parse_unknown_shape_is_empty() {
        assert!(parse_todo(&ToolArgs::parse(r#"{"note": "nothing here"}"#)).is_empty());
        assert!(parse_todo(&ToolArgs::parse("not json")).is_empty());
    }
}
