//! Tool group aggregation.
//!
//! At most one group is open at a time. It opens lazily on the first
//! tool-adjacent message, collects tool calls, terminal previews and the
//! singleton todo node, and closes when a standalone message arrives or the
//! build ends. All of the scratch that feeds the open group lives in
//! [`AggregationContext`], a plain value that nested builds snapshot with
//! `std::mem::take` and restore afterwards.

use chrono::{DateTime, Utc};
use skein_core::{FileEdit, SearchSource, SkillRef, ToolStatus};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::debug;

use super::SourceMode;
use super::block::{
    Block, BlockId, BlockIdGen, BlockKind, Progress, TerminalPreviewBlock, TodoProgressBlock, ToolCallBlock,
    ToolGroup,
};
use super::canvas::Canvas;
use super::classify::{TerminalSpec, chip_key};
use super::todo::TodoUpdate;

/// Fixed label for todo-driven groups
pub const TODO_TITLE: &str = "To-do list";

/// Address of a child inside a (possibly no longer open) group
///
/// Children are only ever appended, so the index stays valid for the life of
/// the group block, including after it moves into a turn summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChildRef {
    pub group: BlockId,
    pub index: usize,
}

/// Scratch state shared by the classifier and the aggregator
///
/// Group-scoped fields reset when the group closes; the rest lives for the
/// whole conversation and resets only on a full rebuild.
#[derive(Debug, Default)]
pub struct AggregationContext {
    // group-scoped
    open_group: Option<BlockId>,
    intent_label: Option<String>,
    terminal_children: HashMap<String, ChildRef>,
    todo_child: Option<ChildRef>,
    todo_updates: u32,
    todo_tool_failed: bool,

    // conversation-scoped
    tool_children: HashMap<String, ChildRef>,
    tool_started: HashMap<String, DateTime<Utc>>,
    text_blocks: HashMap<u64, BlockId>,
    shown_files: HashSet<String>,
    pending_chips: Vec<PathBuf>,
    pending_skills: Vec<SkillRef>,
    pending_sources: Vec<SearchSource>,
    pending_edits: Vec<FileEdit>,
}

impl AggregationContext {
    pub fn open_group(&self) -> Option<BlockId> {
        self.open_group
    }

    pub fn intent_label(&self) -> Option<&str> {
        self.intent_label.as_deref()
    }

    pub fn set_intent_label(&mut self, label: String) {
        self.intent_label = Some(label);
    }

    pub fn file_already_shown(&self, path: &Path) -> bool {
        self.shown_files.contains(&chip_key(path))
    }

    /// Remember a chip for the next assistant block
    pub fn collect_chip(&mut self, path: PathBuf) {
        self.shown_files.insert(chip_key(&path));
        self.pending_chips.push(path);
    }

    pub fn collect_skill(&mut self, skill: SkillRef) {
        self.pending_skills.push(skill);
    }

    pub fn collect_source(&mut self, source: SearchSource) {
        self.pending_sources.push(source);
    }

    pub fn collect_edit(&mut self, edit: FileEdit) {
        self.pending_edits.push(edit);
    }

    /// Drain everything collected since the previous standalone block
    pub fn take_pending(&mut self) -> (Vec<PathBuf>, Vec<SkillRef>, Vec<SearchSource>, Vec<FileEdit>) {
        (
            std::mem::take(&mut self.pending_chips),
            std::mem::take(&mut self.pending_skills),
            std::mem::take(&mut self.pending_sources),
            std::mem::take(&mut self.pending_edits),
        )
    }

    pub fn register_text_block(&mut self, message_id: u64, block: BlockId) {
        self.text_blocks.insert(message_id, block);
    }

    pub fn text_block(&self, message_id: u64) -> Option<BlockId> {
        self.text_blocks.get(&message_id).copied()
    }

    pub fn record_start(&mut self, call_id: &str, at: DateTime<Utc>) {
        self.tool_started.entry(call_id.to_string()).or_insert(at);
    }

    pub fn started_at(&self, call_id: &str) -> Option<DateTime<Utc>> {
        self.tool_started.get(call_id).copied()
    }

    pub fn tool_child(&self, call_id: &str) -> Option<ChildRef> {
        self.tool_children.get(call_id).copied()
    }

    pub fn terminal_child(&self, call_id: &str) -> Option<ChildRef> {
        self.terminal_children.get(call_id).copied()
    }

    /// Open a group if none is, returning its id
    pub fn ensure_group(
        &mut self, canvas: &mut dyn Canvas, ids: &mut BlockIdGen, mode: SourceMode, active: bool,
    ) -> BlockId {
        if let Some(id) = self.open_group {
            return id;
        }
        let label = working_label(self.intent_label.as_deref(), 0);
        let group = ToolGroup {
            label,
            meta: None,
            active,
            expanded: false,
            progress: Progress::None,
            children: Vec::new(),
        };
        let id = ids.next();
        canvas.append(Block::new(id, BlockKind::Group(group)));
        self.open_group = Some(id);
        debug!(%id, mode = ?mode, "tool group opened");
        id
    }

    /// Append a tool call to the open group (opening one if needed)
    pub fn add_tool_child(
        &mut self, canvas: &mut dyn Canvas, ids: &mut BlockIdGen, mode: SourceMode, call_id: Option<&str>,
        call: ToolCallBlock,
    ) {
        let in_progress = call.status == ToolStatus::InProgress;
        let group_id = self.ensure_group(canvas, ids, mode, in_progress);
        let child_id = ids.next();
        let child = Block::new(child_id, BlockKind::ToolCall(call));
        let index = self.push_child(canvas, group_id, child, mode, in_progress);
        if let Some(call_id) = call_id {
            self.tool_children.insert(call_id.to_string(), ChildRef { group: group_id, index });
            if in_progress {
                self.record_start(call_id, Utc::now());
            }
        }
        self.refresh_group(canvas, mode);
    }

    /// Append or revisit the terminal preview for one call id
    pub fn add_terminal_child(
        &mut self, canvas: &mut dyn Canvas, ids: &mut BlockIdGen, mode: SourceMode, spec: TerminalSpec,
    ) {
        if let Some(child) = spec.call_id.as_deref().and_then(|id| self.terminal_children.get(id)).copied() {
            if let Some(block) = group_child_mut(canvas, child)
                && let BlockKind::TerminalPreview(term) = &mut block.kind
            {
                term.status = spec.status;
                if !spec.command.is_empty() {
                    term.command = spec.command;
                }
            }
            self.refresh_group(canvas, mode);
            return;
        }

        let in_progress = spec.status == ToolStatus::InProgress;
        let group_id = self.ensure_group(canvas, ids, mode, in_progress);
        let child_id = ids.next();
        let term = TerminalPreviewBlock { command: spec.command, output: String::new(), status: spec.status };
        let index =
            self.push_child(canvas, group_id, Block::new(child_id, BlockKind::TerminalPreview(term)), mode, in_progress);
        if let Some(call_id) = spec.call_id {
            self.terminal_children.insert(call_id.clone(), ChildRef { group: group_id, index });
            if in_progress {
                self.record_start(&call_id, Utc::now());
            }
        }
        self.refresh_group(canvas, mode);
    }

    /// Apply a todo update to the group's single todo node
    pub fn upsert_todo(
        &mut self, canvas: &mut dyn Canvas, ids: &mut BlockIdGen, mode: SourceMode, update: &TodoUpdate,
        tool_failed: bool,
    ) {
        let (completed, failed, total) = update.counts();
        self.todo_tool_failed = tool_failed;

        if let Some(child) = self.todo_child {
            if let Some(block) = group_child_mut(canvas, child)
                && let BlockKind::TodoProgress(todo) = &mut block.kind
            {
                todo.total = total;
                todo.completed = completed;
                todo.failed = failed;
                todo.updates += 1;
                self.todo_updates = todo.updates;
            }
            self.refresh_group(canvas, mode);
            return;
        }

        let running = total.saturating_sub(completed + failed);
        let group_id = self.ensure_group(canvas, ids, mode, running > 0);
        let child_id = ids.next();
        let todo = TodoProgressBlock { title: TODO_TITLE.to_string(), total, completed, failed, updates: 1 };
        let index = self.push_child(
            canvas,
            group_id,
            Block::new(child_id, BlockKind::TodoProgress(todo)),
            mode,
            running > 0 && !tool_failed,
        );
        self.todo_child = Some(ChildRef { group: group_id, index });
        self.todo_updates = 1;
        self.refresh_group(canvas, mode);
    }

    /// Merge an out-of-band terminal output chunk into its preview node
    ///
    /// Chunks for call ids with no live preview (group already closed) are
    /// dropped.
    pub fn merge_terminal_output(
        &mut self, canvas: &mut dyn Canvas, mode: SourceMode, call_id: &str, chunk: &str, replace: bool,
    ) {
        let Some(child) = self.terminal_children.get(call_id).copied() else {
            debug!(call_id, "terminal output for unknown call id dropped");
            return;
        };
        if let Some(block) = group_child_mut(canvas, child)
            && let BlockKind::TerminalPreview(term) = &mut block.kind
        {
            merge_output(&mut term.output, chunk, replace);
        }
        self.refresh_group(canvas, mode);
    }

    /// Update a tool or terminal child's status after a live transition
    ///
    /// Returns the resolved duration when the call finishes and its start was
    /// seen. Labels of already-closed groups stay frozen.
    pub fn update_child_status(
        &mut self, canvas: &mut dyn Canvas, mode: SourceMode, call_id: &str, status: ToolStatus,
    ) -> Option<u64> {
        let child = self.tool_children.get(call_id).or_else(|| self.terminal_children.get(call_id)).copied()?;
        let mut duration_ms = None;
        if status.is_finished()
            && let Some(started) = self.started_at(call_id)
        {
            duration_ms = u64::try_from((Utc::now() - started).num_milliseconds()).ok();
        }
        if let Some(block) = group_child_mut(canvas, child) {
            match &mut block.kind {
                BlockKind::ToolCall(call) => {
                    call.status = status;
                    call.duration_ms = duration_ms.or(call.duration_ms);
                }
                BlockKind::TerminalPreview(term) => term.status = status,
                _ => {}
            }
        }
        if self.open_group == Some(child.group) {
            self.refresh_group(canvas, mode);
        }
        duration_ms
    }

    /// Close the open group and clear group-scoped scratch
    ///
    /// A group that ended up with zero children leaves no trace.
    pub fn close_group(&mut self, canvas: &mut dyn Canvas, mode: SourceMode) {
        let Some(group_id) = self.open_group else { return };

        let empty = canvas
            .get(group_id)
            .and_then(Block::as_group)
            .map(|g| g.children.is_empty())
            .unwrap_or(true);
        if empty {
            canvas.remove(group_id);
            debug!(%group_id, "empty tool group removed");
        } else {
            self.refresh_group(canvas, mode);
        }

        self.open_group = None;
        self.intent_label = None;
        self.terminal_children.clear();
        self.todo_child = None;
        self.todo_updates = 0;
        self.todo_tool_failed = false;
    }

    fn push_child(
        &mut self, canvas: &mut dyn Canvas, group_id: BlockId, child: Block, mode: SourceMode, child_active: bool,
    ) -> usize {
        let Some(group) = canvas.get_mut(group_id).and_then(Block::as_group_mut) else {
            return 0;
        };
        let was_empty = group.children.is_empty();
        group.children.push(child);
        // A live group auto-expands the moment it gains in-progress content;
        // historical replay stays collapsed.
        if was_empty && mode == SourceMode::Live && child_active {
            group.expanded = true;
        }
        group.children.len() - 1
    }

    /// Re-derive label, meta, progress and activity for the open group
    pub fn refresh_group(&mut self, canvas: &mut dyn Canvas, mode: SourceMode) {
        let Some(group_id) = self.open_group else { return };
        let intent = self.intent_label.clone();
        let todo_failed = self.todo_tool_failed;
        let historical = mode == SourceMode::Historical;
        let Some(group) = canvas.get_mut(group_id).and_then(Block::as_group_mut) else {
            return;
        };

        if let Some(todo) = group.todo().cloned() {
            group.label = todo.title.clone();
            group.meta = Some(todo_meta(&todo));
            group.active = todo.running() > 0 && !todo_failed;
            group.progress = if historical {
                Progress::Indeterminate
            } else if todo.total > 0 {
                let done = todo.completed + todo.failed;
                Progress::Percent(((done * 100 / todo.total).min(100)) as u8)
            } else {
                Progress::Indeterminate
            };
            if historical {
                group.expanded = false;
            }
            return;
        }

        let (finished, failed, total) = group.child_counts();
        let done = total > 0 && finished == total;
        if done {
            group.label = finished_label(intent.as_deref(), total, failed);
            group.active = false;
        } else {
            group.label = working_label(intent.as_deref(), total);
            group.active = true;
        }
        group.meta = (total > 0).then(|| format!("{}/{}", finished, total));
        group.progress = if historical {
            Progress::Indeterminate
        } else if total > 0 {
            Progress::Percent(((finished * 100 / total).min(100)) as u8)
        } else {
            Progress::Indeterminate
        };
        if historical && done {
            group.expanded = false;
        }
    }
}

/// Merge one terminal output chunk into the accumulated output
///
/// Branch order is load-bearing: replace on request or first output, then
/// prefix growth replaces, then a chunk already at the tail is dropped,
/// otherwise the chunk appends on a new line. Re-delivered and out-of-order
/// chunks thus never duplicate content.
pub fn merge_output(current: &mut String, chunk: &str, replace: bool) {
    if replace || current.is_empty() {
        *current = chunk.to_string();
    } else if chunk.starts_with(current.as_str()) {
        *current = chunk.to_string();
    } else if !current.ends_with(chunk) {
        current.push('\n');
        current.push_str(chunk);
    }
}

/// "3/5" plus failure and update-count suffixes
pub fn todo_meta(todo: &TodoProgressBlock) -> String {
    let mut meta = format!("{}/{}", todo.completed, todo.total);
    if todo.failed > 0 {
        meta.push_str(&format!(", {} failed", todo.failed));
    }
    if todo.updates > 1 {
        meta.push_str(&format!(", {} updates", todo.updates));
    }
    meta
}

/// Label for a finished run: the intent text when one was reported,
/// otherwise a pluralized count with a failure suffix
pub fn finished_label(intent: Option<&str>, count: usize, failed: usize) -> String {
    if let Some(text) = intent {
        return text.to_string();
    }
    let mut label = format!("Finished {} action{}", count, if count == 1 { "" } else { "s" });
    if failed > 0 {
        label.push_str(&format!(", {} failed", failed));
    }
    label
}

/// Label for a still-running group
pub fn working_label(intent: Option<&str>, count: usize) -> String {
    if let Some(text) = intent {
        return format!("{}…", text);
    }
    if count == 0 {
        return "Working…".to_string();
    }
    format!("Working on {} action{}", count, if count == 1 { "" } else { "s" })
}

fn group_child_mut(canvas: &mut dyn Canvas, child: ChildRef) -> Option<&mut Block> {
    canvas
        .get_mut(child.group)
        .and_then(Block::as_group_mut)
        .and_then(|group| group.children.get_mut(child.index))
}
