//! Turn collapsing.
//!
//! Once an assistant message finishes, the run of group/reasoning blocks
//! directly above it merges into a single collapsible turn summary. A run of
//! one stays as it is: the group is already a collapsible unit, and wrapping
//! it again would nest two expanders around the same content.

use skein_core::Role;
use tracing::debug;

use super::SourceMode;
use super::block::{Block, BlockId, BlockIdGen, BlockKind, TurnSummary};
use super::canvas::Canvas;
use super::group::{finished_label, todo_meta};

/// Collapse the run of group/reasoning blocks preceding a finished
/// assistant block; runs shorter than two are left alone
pub fn collapse_turn(canvas: &mut dyn Canvas, assistant_id: BlockId, mode: SourceMode, ids: &mut BlockIdGen) {
    let Some(index) = canvas.index_of(assistant_id) else {
        return;
    };

    let mut run_start = index;
    while run_start > 0 {
        let block = &canvas.blocks()[run_start - 1];
        if block.is_group() || block.is_reasoning() {
            run_start -= 1;
        } else {
            break;
        }
    }
    let run_len = index - run_start;
    if run_len < 2 {
        return;
    }

    let run_ids: Vec<BlockId> = canvas.blocks()[run_start..index].iter().map(|b| b.id).collect();

    let mut total_calls = 0;
    let mut failures = 0;
    let mut todo_label = None;
    for block in &canvas.blocks()[run_start..index] {
        if let Some(group) = block.as_group() {
            let (_, failed, total) = group.child_counts();
            total_calls += total;
            failures += failed;
            if let Some(todo) = group.todo() {
                todo_label = Some((format!("{}: {}", todo.title, todo_meta(todo)), todo.in_progress()));
            }
        }
    }

    let (label, todo_in_progress) = match todo_label {
        Some((label, in_progress)) => (label, in_progress),
        None => (finished_label(None, total_calls, failures), false),
    };

    let mut children = Vec::with_capacity(run_len);
    for id in run_ids {
        if let Some(block) = canvas.remove(id) {
            children.push(block);
        }
    }

    let summary = TurnSummary {
        label,
        has_failures: failures > 0,
        expanded: todo_in_progress && mode == SourceMode::Live,
        children,
    };
    let summary_id = ids.next();
    canvas.insert_before(Some(assistant_id), Block::new(summary_id, BlockKind::Summary(summary)));
    debug!(%summary_id, blocks = run_len, "turn collapsed");
}

/// Collapse every finished assistant turn on the canvas (runs once after a
/// full historical rebuild)
pub fn collapse_all(canvas: &mut dyn Canvas, mode: SourceMode, ids: &mut BlockIdGen) {
    let mut index = 0;
    while index < canvas.len() {
        let block = &canvas.blocks()[index];
        let id = block.id;
        let finished_assistant =
            matches!(&block.kind, BlockKind::Text(text) if text.role == Role::Assistant && !text.streaming);
        if finished_assistant {
            collapse_turn(canvas, id, mode, ids);
            // The assistant block may have moved left after the splice.
            index = canvas.index_of(id).map(|i| i + 1).unwrap_or(index + 1);
        } else {
            index += 1;
        }
    }
}
