//! Per-message classification.
//!
//! `classify` maps one message to a list of intents the build session then
//! applies against the aggregation context and the canvas. All argument
//! parsing is total: malformed payloads degrade to the generic fallback
//! display, never to an error.

use skein_core::{DisplaySettings, FileEdit, Message, Role, SearchSource, SkillRef, ToolArgs, ToolStatus};
use std::path::{Path, PathBuf};

use super::block::{QuestionCard, TextBlock, ToolCallBlock};
use super::group::AggregationContext;
use super::todo::{TodoUpdate, parse_todo};

/// Tool names whose messages never render (their effects arrive out-of-band)
const SUPPRESSED_TOOLS: &[&str] = &["stop_powershell", "write_powershell", "read_powershell"];

/// Tools that mutate files; each emits a tool child plus extracted edits
const FILE_EDIT_TOOLS: &[&str] = &[
    "edit",
    "edit_file",
    "str_replace",
    "str_replace_editor",
    "replace_string_in_file",
    "insert",
    "multi_replace_string_in_file",
    "create",
    "write_file",
    "create_file",
    "create_and_write_file",
    "write",
    "save_file",
];

/// Tools that only create a file; the whole payload is the new text
const FILE_CREATE_TOOLS: &[&str] =
    &["create", "write_file", "create_file", "create_and_write_file", "write", "save_file"];

const PATH_KEYS: &[&str] = &["path", "file_path", "filePath", "fileName", "file"];
const OLD_TEXT_KEYS: &[&str] = &["old_str", "old_string", "oldText", "old_text", "oldString"];
const NEW_TEXT_KEYS: &[&str] = &["new_str", "new_string", "newText", "new_text", "newString", "content", "text"];

/// Argument fields worth surfacing as a one-line summary
const SUMMARY_KEYS: &[&str] =
    &["query", "path", "file_path", "filePath", "command", "url", "pattern", "prompt", "name", "text"];

/// A standalone block request (always closes the open group first)
#[derive(Debug, Clone, PartialEq)]
pub enum Standalone {
    Text(TextBlock),
    Question(QuestionCard),
}

/// A terminal-preview child request; merged per call id by the aggregator
#[derive(Debug, Clone, PartialEq)]
pub struct TerminalSpec {
    pub call_id: Option<String>,
    pub command: String,
    pub status: ToolStatus,
}

/// What one message asks the build session to do
#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    Suppress,
    /// Close the open tool group without emitting anything
    CloseGroup,
    CollectFileChip(PathBuf),
    CollectSkill(SkillRef),
    CollectSource(SearchSource),
    CollectFileEdit(FileEdit),
    SetIntentLabel(String),
    UpsertTodo(TodoUpdate),
    EmitToolChild(ToolCallBlock),
    EmitTerminalChild(TerminalSpec),
    EmitStandalone(Standalone),
}

/// Classify one message against the current display policy
///
/// `replaying` is true inside any batch build (full rebuild or older-batch
/// load) and false on the live single-message path; the distinction only
/// matters for `ask_question`, whose live card arrives via a host event
/// instead.
pub fn classify(
    msg: &Message, settings: &DisplaySettings, replaying: bool, ctx: &AggregationContext,
) -> Vec<Intent> {
    match msg.role {
        Role::Tool => classify_tool(msg, settings, replaying, ctx),
        Role::Reasoning => {
            if settings.show_reasoning {
                vec![Intent::CloseGroup, Intent::EmitStandalone(Standalone::Text(text_block(msg, settings)))]
            } else {
                vec![Intent::CloseGroup]
            }
        }
        Role::User | Role::Assistant | Role::System => {
            vec![Intent::CloseGroup, Intent::EmitStandalone(Standalone::Text(text_block(msg, settings)))]
        }
    }
}

fn classify_tool(
    msg: &Message, settings: &DisplaySettings, replaying: bool, ctx: &AggregationContext,
) -> Vec<Intent> {
    let name = msg.tool_name().unwrap_or_default();
    let args = ToolArgs::parse(&msg.content);
    let status = msg.tool_status.unwrap_or(ToolStatus::Completed);

    if SUPPRESSED_TOOLS.contains(&name) {
        return vec![Intent::Suppress];
    }

    let mut intents: Vec<Intent> = Vec::new();

    // Persisted search attributions ride along on tool messages and attach
    // to the next assistant block.
    intents.extend(msg.sources.iter().cloned().map(Intent::CollectSource));

    match name {
        "ask_question" => {
            if replaying {
                intents.push(Intent::EmitStandalone(Standalone::Question(question_card(&args))));
            } else {
                intents.push(Intent::Suppress);
            }
        }
        "announce_file" => {
            if let Some(path) = args.str_field(PATH_KEYS).map(PathBuf::from)
                && path.exists()
                && !ctx.file_already_shown(&path)
            {
                intents.push(Intent::CollectFileChip(path));
            } else {
                intents.push(Intent::Suppress);
            }
        }
        "fetch_skill" => {
            if let Some(skill) = args.str_field(&["skill", "name", "skill_name"]) {
                let mut skill = SkillRef::new(skill);
                skill.source = args.str_field(&["source", "path"]).map(str::to_string);
                intents.push(Intent::CollectSkill(skill));
            } else {
                intents.push(Intent::Suppress);
            }
        }
        "report_intent" => {
            let text = args
                .str_field(&["intent", "text", "message", "description"])
                .map(str::trim)
                .unwrap_or_default();
            if text.is_empty() {
                intents.push(Intent::Suppress);
            } else {
                intents.push(Intent::SetIntentLabel(text.to_string()));
            }
        }
        "update_todo" | "manage_todo_list" => {
            let update = parse_todo(&args);
            if update.is_empty() || !settings.show_tool_calls {
                intents.push(Intent::Suppress);
            } else {
                intents.push(Intent::UpsertTodo(update));
            }
        }
        "powershell" => {
            if settings.show_tool_calls {
                let command = args
                    .str_field(&["command", "script", "commandline", "cmd"])
                    .unwrap_or_default()
                    .to_string();
                intents.push(Intent::EmitTerminalChild(TerminalSpec {
                    call_id: msg.tool_call_id.clone(),
                    command,
                    status,
                }));
            } else {
                intents.push(Intent::Suppress);
            }
        }
        _ if FILE_EDIT_TOOLS.contains(&name) => {
            intents.extend(extract_file_edits(name, &args).into_iter().map(Intent::CollectFileEdit));
            if settings.show_tool_calls {
                let summary = args.str_field(PATH_KEYS).map(str::to_string);
                intents.push(Intent::EmitToolChild(ToolCallBlock {
                    name: friendly_tool_name(name),
                    status,
                    duration_ms: None,
                    input_summary: summary,
                }));
            } else {
                intents.push(Intent::Suppress);
            }
        }
        _ => {
            if settings.show_tool_calls {
                intents.push(Intent::EmitToolChild(ToolCallBlock {
                    name: friendly_tool_name(name),
                    status,
                    duration_ms: None,
                    input_summary: summarize_args(&args),
                }));
            } else {
                intents.push(Intent::Suppress);
            }
        }
    }

    intents
}

fn text_block(msg: &Message, settings: &DisplaySettings) -> TextBlock {
    let mut block = TextBlock::new(msg.role, msg.content.clone());
    block.streaming = msg.in_progress();
    block.author = msg.author.clone();
    block.timestamp = settings.show_timestamps.then_some(msg.timestamp);
    if msg.role == Role::User {
        block.attachments = msg.attachments.clone();
        block.skills = msg.active_skills.clone();
    }
    if msg.role == Role::Assistant {
        block.sources = msg.sources.clone();
    }
    block
}

fn question_card(args: &ToolArgs) -> QuestionCard {
    let question = args
        .str_field(&["question", "prompt", "text"])
        .unwrap_or("Question")
        .to_string();
    let options = args
        .array_field(&["options", "choices"])
        .map(|items| {
            items
                .iter()
                .filter_map(|item| {
                    item.as_str()
                        .map(str::to_string)
                        .or_else(|| ToolArgs::from_value(item.clone()).str_field(&["label", "text"]).map(str::to_string))
                })
                .collect()
        })
        .unwrap_or_default();
    let allow_free_text = args.bool_field(&["allowFreeText", "allow_free_text", "freeText"]).unwrap_or(false);
    QuestionCard { question, options, allow_free_text }
}

/// Extract (path, old, new) triples from a file-edit payload
///
/// `multi_replace_string_in_file` yields one triple per replacement entry;
/// create-style tools treat the whole payload as the new text.
pub fn extract_file_edits(name: &str, args: &ToolArgs) -> Vec<FileEdit> {
    if name == "multi_replace_string_in_file" {
        let fallback_path = args.str_field(PATH_KEYS).map(str::to_string);
        let Some(entries) = args.array_field(&["replacements", "edits"]) else {
            return Vec::new();
        };
        return entries
            .iter()
            .filter_map(|entry| {
                let entry = ToolArgs::from_value(entry.clone());
                let path = entry
                    .str_field(PATH_KEYS)
                    .map(str::to_string)
                    .or_else(|| fallback_path.clone())?;
                Some(FileEdit {
                    path: PathBuf::from(path),
                    old_text: entry.str_field(OLD_TEXT_KEYS).unwrap_or_default().to_string(),
                    new_text: entry.str_field(NEW_TEXT_KEYS).unwrap_or_default().to_string(),
                })
            })
            .collect();
    }

    let Some(path) = args.str_field(PATH_KEYS) else {
        return Vec::new();
    };
    let old_text = if FILE_CREATE_TOOLS.contains(&name) {
        String::new()
    } else {
        args.str_field(OLD_TEXT_KEYS).unwrap_or_default().to_string()
    };
    let new_text = args
        .str_field(NEW_TEXT_KEYS)
        .or_else(|| args.str_field(&["file_text", "fileText"]))
        .unwrap_or_default()
        .to_string();

    vec![FileEdit { path: PathBuf::from(path), old_text, new_text }]
}

/// `lumi_search` -> `Lumi Search`
pub fn friendly_tool_name(name: &str) -> String {
    if name.is_empty() {
        return "Tool".to_string();
    }
    name.split(['_', '-'])
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// One-line argument summary: a well-known field if present, otherwise a
/// flat "field: value" listing
pub fn summarize_args(args: &ToolArgs) -> Option<String> {
    if let Some(value) = args.str_field(SUMMARY_KEYS) {
        return Some(value.to_string());
    }
    let entries = args.entries();
    if entries.is_empty() {
        return None;
    }
    Some(
        entries
            .iter()
            .map(|(k, v)| format!("{}: {}", k, v))
            .collect::<Vec<_>>()
            .join(", "),
    )
}

/// Is this path chip already on screen (case-insensitive)
pub(crate) fn chip_key(path: &Path) -> String {
    path.to_string_lossy().to_lowercase()
}
