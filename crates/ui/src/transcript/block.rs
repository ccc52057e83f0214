use chrono::{DateTime, Utc};
use skein_core::{FileEdit, Role, SearchSource, SkillRef, ToolStatus};
use std::path::PathBuf;

/// Stable identity of one rendered block
///
/// Ids come from a per-transcript counter so automated UI drivers can address
/// blocks deterministically: rebuilding the same log twice yields the same
/// ids in the same order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(pub u64);

impl std::fmt::Display for BlockId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "block-{}", self.0)
    }
}

/// Counter behind [`BlockId`]; reset at the start of every full rebuild
#[derive(Debug, Default)]
pub struct BlockIdGen(u64);

impl BlockIdGen {
    pub fn next(&mut self) -> BlockId {
        self.0 += 1;
        BlockId(self.0)
    }

    pub fn reset(&mut self) {
        self.0 = 0;
    }
}

/// Completion indicator for a tool group
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Progress {
    /// No indicator
    None,
    /// Busy, extent unknown (forced during historical replay)
    Indeterminate,
    /// Percentage of finished work, 0..=100
    Percent(u8),
}

/// A standalone message bubble (user, assistant, reasoning, system)
#[derive(Debug, Clone, PartialEq)]
pub struct TextBlock {
    pub role: Role,
    pub content: String,
    pub streaming: bool,
    pub author: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
    /// File chips shown under the bubble
    pub attachments: Vec<PathBuf>,
    pub skills: Vec<SkillRef>,
    pub sources: Vec<SearchSource>,
    pub edits: Vec<FileEdit>,
}

impl TextBlock {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            streaming: false,
            author: None,
            timestamp: None,
            attachments: Vec::new(),
            skills: Vec::new(),
            sources: Vec::new(),
            edits: Vec::new(),
        }
    }
}

/// One tool invocation inside a group
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCallBlock {
    /// Friendly display name, not the wire name
    pub name: String,
    pub status: ToolStatus,
    pub duration_ms: Option<u64>,
    pub input_summary: Option<String>,
}

/// A live terminal run, merged across output chunks
#[derive(Debug, Clone, PartialEq)]
pub struct TerminalPreviewBlock {
    pub command: String,
    pub output: String,
    pub status: ToolStatus,
}

/// Aggregated todo-list progress; at most one per group
#[derive(Debug, Clone, PartialEq)]
pub struct TodoProgressBlock {
    pub title: String,
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    /// How many upserts have landed on this node
    pub updates: u32,
}

impl TodoProgressBlock {
    /// Steps neither done nor failed
    pub fn running(&self) -> usize {
        self.total.saturating_sub(self.completed + self.failed)
    }

    pub fn in_progress(&self) -> bool {
        self.running() > 0
    }
}

/// Collapsible container for consecutive tool activity
#[derive(Debug, Clone, PartialEq)]
pub struct ToolGroup {
    pub label: String,
    pub meta: Option<String>,
    pub active: bool,
    pub expanded: bool,
    pub progress: Progress,
    pub children: Vec<Block>,
}

impl ToolGroup {
    /// (finished, failed, total) over children carrying a status
    pub fn child_counts(&self) -> (usize, usize, usize) {
        let mut finished = 0;
        let mut failed = 0;
        let mut total = 0;
        for child in &self.children {
            let status = match &child.kind {
                BlockKind::ToolCall(call) => Some(call.status),
                BlockKind::TerminalPreview(term) => Some(term.status),
                _ => None,
            };
            let Some(status) = status else { continue };
            total += 1;
            if status.is_finished() {
                finished += 1;
            }
            if status == ToolStatus::Failed {
                failed += 1;
            }
        }
        (finished, failed, total)
    }

    /// The group's todo node, if one was upserted
    pub fn todo(&self) -> Option<&TodoProgressBlock> {
        self.children.iter().find_map(|c| match &c.kind {
            BlockKind::TodoProgress(todo) => Some(todo),
            _ => None,
        })
    }
}

/// Collapsible wrapper merging several finished groups before one assistant
/// message
#[derive(Debug, Clone, PartialEq)]
pub struct TurnSummary {
    pub label: String,
    pub has_failures: bool,
    pub expanded: bool,
    pub children: Vec<Block>,
}

/// A question posed to the user, replayed from history or raised live
#[derive(Debug, Clone, PartialEq)]
pub struct QuestionCard {
    pub question: String,
    pub options: Vec<String>,
    pub allow_free_text: bool,
}

/// Everything the canvas can hold
#[derive(Debug, Clone, PartialEq)]
pub enum BlockKind {
    Text(TextBlock),
    ToolCall(ToolCallBlock),
    TerminalPreview(TerminalPreviewBlock),
    TodoProgress(TodoProgressBlock),
    Group(ToolGroup),
    Summary(TurnSummary),
    QuestionCard(QuestionCard),
    TypingIndicator,
}

/// One renderable unit in the transcript
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub id: BlockId,
    pub kind: BlockKind,
}

impl Block {
    pub fn new(id: BlockId, kind: BlockKind) -> Self {
        Self { id, kind }
    }

    pub fn is_group(&self) -> bool {
        matches!(self.kind, BlockKind::Group(_))
    }

    /// Reasoning turns count as group-adjacent for turn collapsing
    pub fn is_reasoning(&self) -> bool {
        matches!(&self.kind, BlockKind::Text(text) if text.role == Role::Reasoning)
    }

    pub fn as_group(&self) -> Option<&ToolGroup> {
        match &self.kind {
            BlockKind::Group(group) => Some(group),
            _ => None,
        }
    }

    pub fn as_group_mut(&mut self) -> Option<&mut ToolGroup> {
        match &mut self.kind {
            BlockKind::Group(group) => Some(group),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&TextBlock> {
        match &self.kind {
            BlockKind::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Height of this block in display lines, used by the viewport extent
    /// model (collapsed containers contribute their header only)
    pub fn line_height(&self) -> usize {
        match &self.kind {
            BlockKind::Text(text) => text.content.lines().count().max(1) + 1,
            BlockKind::ToolCall(_) => 1,
            BlockKind::TerminalPreview(term) => 1 + term.output.lines().count(),
            BlockKind::TodoProgress(_) => 1,
            BlockKind::Group(group) => {
                let header = 1;
                if group.expanded {
                    header + group.children.iter().map(Block::line_height).sum::<usize>()
                } else {
                    header
                }
            }
            BlockKind::Summary(summary) => {
                let header = 1;
                if summary.expanded {
                    header + summary.children.iter().map(Block::line_height).sum::<usize>()
                } else {
                    header
                }
            }
            BlockKind::QuestionCard(card) => 1 + card.options.len(),
            BlockKind::TypingIndicator => 1,
        }
    }
}
