//! Build sessions.
//!
//! A full rebuild classifies a windowed slice of the log into a staging
//! surface and commits it to the canvas in one step, so a superseded build
//! leaves no observable effect. Cancellation is cooperative: the session
//! token is checked at every suspension point and loop iteration, and a
//! cancelled build returns silently. The live single-message path and the
//! older-batch loader share the same apply logic but never the same
//! aggregation context at the same time.

use skein_core::{DisplaySettings, Message, MessageLog, Role, SearchSource, ToolStatus};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::SourceMode;
use super::block::{Block, BlockId, BlockIdGen, BlockKind, QuestionCard};
use super::canvas::{BlockList, Canvas, Viewport};
use super::classify::{Intent, Standalone, classify};
use super::collapse::{collapse_all, collapse_turn};
use super::group::AggregationContext;
use super::virtualize::{LOADING_YIELD_THRESHOLD, VirtualizationState, initial_window_start};

/// Drives classification, aggregation and windowing for one conversation
///
/// One builder owns one canvas's worth of state. On a chat switch the host
/// cancels any in-flight build ([`TranscriptBuilder::cancel_in_flight`]) and
/// runs [`TranscriptBuilder::rebuild`] against the new log.
pub struct TranscriptBuilder {
    settings: DisplaySettings,
    mode: SourceMode,
    ctx: AggregationContext,
    virt: VirtualizationState,
    ids: BlockIdGen,
    generation: u64,
    cancel: CancellationToken,
    depth: u32,
    rebuild_active: bool,
    loading: bool,
    typing_block: Option<BlockId>,
}

impl TranscriptBuilder {
    pub fn new(settings: DisplaySettings, mode: SourceMode) -> Self {
        Self {
            settings,
            mode,
            ctx: AggregationContext::default(),
            virt: VirtualizationState::default(),
            ids: BlockIdGen::default(),
            generation: 0,
            cancel: CancellationToken::new(),
            depth: 0,
            rebuild_active: false,
            loading: false,
            typing_block: None,
        }
    }

    pub fn settings(&self) -> &DisplaySettings {
        &self.settings
    }

    /// Swap the display policy; takes effect on the next rebuild
    pub fn set_settings(&mut self, settings: DisplaySettings) {
        self.settings = settings;
    }

    pub fn mode(&self) -> SourceMode {
        self.mode
    }

    /// Monotonic count of build sessions started
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// True between the loading yield and the commit of a large rebuild;
    /// hosts show a spinner off this
    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// Handle the host uses to cancel the in-flight build from its event
    /// loop
    pub fn cancel_handle(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Cancel whatever build is in flight; the next rebuild arms a fresh
    /// session token
    pub fn cancel_in_flight(&mut self) {
        self.cancel.cancel();
    }

    /// Messages still deferred by the virtualization window
    pub fn deferred_len(&self) -> usize {
        self.virt.deferred_len()
    }

    /// Full rebuild: window the log, classify the tail, commit atomically
    ///
    /// Cancellation (via [`Self::cancel_handle`]) at any checkpoint leaves
    /// the canvas exactly as it was.
    pub async fn rebuild<C: Canvas>(&mut self, log: &MessageLog, canvas: &mut C) {
        if self.cancel.is_cancelled() {
            self.cancel = CancellationToken::new();
        }
        let token = self.cancel.clone();
        self.generation += 1;
        self.rebuild_active = true;

        self.ids.reset();
        self.ctx = AggregationContext::default();
        self.typing_block = None;

        let messages = log.as_slice();
        let start = initial_window_start(messages);
        self.virt.set_deferred(messages[..start].to_vec());

        if messages.len() - start > LOADING_YIELD_THRESHOLD {
            if token.is_cancelled() {
                self.finish_build(true);
                return;
            }
            self.loading = true;
            tokio::task::yield_now().await;
            if token.is_cancelled() {
                self.finish_build(true);
                return;
            }
        }

        let mut staging = BlockList::new();
        for msg in &messages[start..] {
            if token.is_cancelled() {
                self.finish_build(true);
                return;
            }
            self.apply_message(msg, &mut staging, true);
        }
        self.ctx.close_group(&mut staging, self.mode);
        if self.mode == SourceMode::Historical {
            collapse_all(&mut staging, self.mode, &mut self.ids);
        }

        if token.is_cancelled() {
            self.finish_build(true);
            return;
        }
        canvas.clear();
        for block in staging.into_blocks() {
            canvas.append(block);
        }
        self.finish_build(false);
        debug!(generation = self.generation, blocks = canvas.len(), "rebuild committed");
    }

    fn finish_build(&mut self, cancelled: bool) {
        self.loading = false;
        self.rebuild_active = false;
        if cancelled {
            debug!(generation = self.generation, "rebuild cancelled");
        }
    }

    /// Live path: classify one appended message against the open context
    ///
    /// Ignored while a full rebuild is in flight; the rebuild renders the
    /// message from the log instead.
    pub fn append_live(&mut self, msg: &Message, canvas: &mut dyn Canvas) {
        if self.rebuild_active {
            debug!(message = msg.id, "live append ignored during rebuild");
            return;
        }
        self.apply_message(msg, canvas, false);
    }

    /// Streaming content growth or a tool status transition on a message
    /// that already has a block
    pub fn message_updated(&mut self, msg: &Message, canvas: &mut dyn Canvas) {
        if self.rebuild_active {
            return;
        }

        if let Some(block_id) = self.ctx.text_block(msg.id) {
            let mut finished_assistant = false;
            if let Some(block) = canvas.get_mut(block_id)
                && let BlockKind::Text(text) = &mut block.kind
            {
                text.content = msg.content.clone();
                let still_streaming = msg.in_progress();
                finished_assistant = text.streaming && !still_streaming && text.role == Role::Assistant;
                text.streaming = still_streaming;
            }
            if finished_assistant {
                collapse_turn(canvas, block_id, self.mode, &mut self.ids);
            }
            return;
        }

        if let Some(call_id) = msg.tool_call_id.as_deref()
            && let Some(status) = msg.tool_status
        {
            self.ctx.update_child_status(canvas, self.mode, call_id, status);
        }
    }

    /// Whether the current scroll position should trigger an older load
    pub fn wants_older(&self, viewport: &dyn Viewport) -> bool {
        self.depth == 0 && !self.rebuild_active && self.virt.wants_older(viewport.scroll_offset())
    }

    /// Materialize the next deferred batch at the front of the canvas,
    /// keeping the viewport visually still
    ///
    /// The live aggregation context is swapped out for a private one around
    /// the nested build, so the two never observe each other's scratch.
    pub async fn load_older<C: Canvas + Viewport>(&mut self, canvas: &mut C) {
        if !self.virt.begin_load() {
            return;
        }
        self.depth += 1;
        let batch = self.virt.take_batch();
        debug!(batch = batch.len(), "older batch build started");

        let live_ctx = std::mem::take(&mut self.ctx);
        let mut staging = BlockList::new();
        for msg in &batch {
            self.apply_message(msg, &mut staging, true);
        }
        self.ctx.close_group(&mut staging, self.mode);
        self.ctx = live_ctx;

        let offset_before = canvas.scroll_offset();
        let extent_before = canvas.content_extent();
        let anchor = canvas.blocks().first().map(|b| b.id);
        for block in staging.into_blocks() {
            canvas.insert_before(anchor, block);
        }

        // One tick so the surface has measured the prepended content before
        // the offset correction lands.
        tokio::task::yield_now().await;

        let delta = canvas.content_extent() - extent_before;
        canvas.set_scroll_offset(offset_before + delta);
        self.depth -= 1;
        self.virt.end_load();
    }

    /// Out-of-band terminal output for a running command
    pub fn terminal_output(&mut self, call_id: &str, chunk: &str, replace: bool, canvas: &mut dyn Canvas) {
        self.ctx.merge_terminal_output(canvas, self.mode, call_id, chunk, replace);
    }

    /// Search attributions collected for the next assistant block
    pub fn search_results(&mut self, sources: Vec<SearchSource>) {
        for source in sources {
            self.ctx.collect_source(source);
        }
    }

    /// A tool created a file; chip it onto the next assistant block
    pub fn file_created(&mut self, path: PathBuf) {
        if path.exists() && !self.ctx.file_already_shown(&path) {
            self.ctx.collect_chip(path);
        }
    }

    /// Live question card, raised by the host when the agent asks
    pub fn question_asked(
        &mut self, question: impl Into<String>, options: Vec<String>, allow_free_text: bool, canvas: &mut dyn Canvas,
    ) {
        let card = QuestionCard { question: question.into(), options, allow_free_text };
        let id = self.ids.next();
        self.push_block(canvas, Block::new(id, BlockKind::QuestionCard(card)));
    }

    /// Toggle the trailing typing indicator
    pub fn set_typing(&mut self, on: bool, canvas: &mut dyn Canvas) {
        match (on, self.typing_block) {
            (true, None) => {
                let id = self.ids.next();
                canvas.append(Block::new(id, BlockKind::TypingIndicator));
                self.typing_block = Some(id);
            }
            (false, Some(id)) => {
                canvas.remove(id);
                self.typing_block = None;
            }
            _ => {}
        }
    }

    fn apply_message(&mut self, msg: &Message, canvas: &mut dyn Canvas, replaying: bool) {
        for intent in classify(msg, &self.settings, replaying, &self.ctx) {
            match intent {
                Intent::Suppress => {}
                Intent::CloseGroup => self.ctx.close_group(canvas, self.mode),
                Intent::CollectFileChip(path) => self.ctx.collect_chip(path),
                Intent::CollectSkill(skill) => self.ctx.collect_skill(skill),
                Intent::CollectSource(source) => self.ctx.collect_source(source),
                Intent::CollectFileEdit(edit) => self.ctx.collect_edit(edit),
                Intent::SetIntentLabel(text) => {
                    self.ctx.set_intent_label(text);
                    if self.settings.show_tool_calls {
                        self.ctx.ensure_group(canvas, &mut self.ids, self.mode, true);
                        self.ctx.refresh_group(canvas, self.mode);
                    }
                }
                Intent::UpsertTodo(update) => {
                    let failed = msg.tool_status == Some(ToolStatus::Failed);
                    self.ctx.upsert_todo(canvas, &mut self.ids, self.mode, &update, failed);
                }
                Intent::EmitToolChild(call) => {
                    self.ctx
                        .add_tool_child(canvas, &mut self.ids, self.mode, msg.tool_call_id.as_deref(), call);
                }
                Intent::EmitTerminalChild(spec) => {
                    self.ctx.add_terminal_child(canvas, &mut self.ids, self.mode, spec);
                }
                Intent::EmitStandalone(standalone) => self.emit_standalone(msg, standalone, canvas),
            }
        }
    }

    fn emit_standalone(&mut self, msg: &Message, standalone: Standalone, canvas: &mut dyn Canvas) {
        self.ctx.close_group(canvas, self.mode);
        match standalone {
            Standalone::Text(mut text) => {
                if msg.role == Role::Assistant {
                    let (chips, skills, sources, edits) = self.ctx.take_pending();
                    text.attachments = chips;
                    text.skills = skills;
                    text.sources.extend(sources);
                    text.edits = edits;
                }
                let id = self.ids.next();
                self.ctx.register_text_block(msg.id, id);
                self.push_block(canvas, Block::new(id, BlockKind::Text(text)));
            }
            Standalone::Question(card) => {
                let id = self.ids.next();
                self.push_block(canvas, Block::new(id, BlockKind::QuestionCard(card)));
            }
        }
    }

    /// Standalone blocks land before the typing indicator when one is shown
    fn push_block(&mut self, canvas: &mut dyn Canvas, block: Block) {
        match self.typing_block {
            Some(typing) => canvas.insert_before(Some(typing), block),
            None => canvas.append(block),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skein_core::Message;

    fn builder(mode: SourceMode) -> TranscriptBuilder {
        TranscriptBuilder::new(DisplaySettings::default(), mode)
    }

    fn search_turn(first_id: u64) -> Vec<Message> {
        vec![
            Message::user(first_id, "hi"),
            Message::tool(first_id + 1, "report_intent", r#"{"intent": "Searching"}"#)
                .with_status(ToolStatus::Completed),
            Message::tool(first_id + 2, "lumi_search", r#"{"query": "cats"}"#)
                .with_call_id(format!("c-{}", first_id + 2))
                .with_status(ToolStatus::Completed),
            Message::tool(first_id + 3, "lumi_search", r#"{"query": "dogs"}"#)
                .with_call_id(format!("c-{}", first_id + 3))
                .with_status(ToolStatus::Completed),
            Message::assistant(first_id + 4, "Found it"),
        ]
    }

    #[tokio::test]
    async fn test_rebuild_end_to_end_scenario() {
        let log = MessageLog::from(search_turn(1));
        let mut builder = builder(SourceMode::Historical);
        let mut canvas = BlockList::new();

        builder.rebuild(&log, &mut canvas).await;

        // user text, one group with two children, assistant text; a single
        // group before the assistant is never wrapped in a summary.
        assert_eq!(canvas.len(), 3);
        let group = canvas.blocks()[1].as_group().unwrap();
        assert_eq!(group.label, "Searching");
        assert_eq!(group.meta.as_deref(), Some("2/2"));
        assert_eq!(group.children.len(), 2);
        assert!(!group.active);
        assert!(!group.expanded);
    }

    #[tokio::test]
    async fn test_rebuild_is_idempotent() {
        let log = MessageLog::from(search_turn(1));
        let mut builder = builder(SourceMode::Historical);
        let mut canvas = BlockList::new();

        builder.rebuild(&log, &mut canvas).await;
        let first = canvas.clone();
        builder.rebuild(&log, &mut canvas).await;

        assert_eq!(canvas, first);
    }

    #[tokio::test]
    async fn test_rebuild_windows_large_log() {
        let mut messages = Vec::new();
        for turn in 0..8 {
            messages.extend(search_turn(turn * 100));
        }
        let log = MessageLog::from(messages);
        let mut builder = builder(SourceMode::Historical);
        let mut canvas = BlockList::new();

        builder.rebuild(&log, &mut canvas).await;

        // 40 messages: window snaps to the user message opening the last
        // four turns.
        assert_eq!(builder.deferred_len(), 20);
        let first = canvas.blocks()[0].as_text().unwrap();
        assert_eq!(first.role, Role::User);
    }

    #[test]
    fn test_cancelled_rebuild_commits_nothing() {
        let mut messages = Vec::new();
        for turn in 0..4 {
            messages.extend(search_turn(turn * 100));
        }
        let log = MessageLog::from(messages);
        let mut builder = builder(SourceMode::Historical);
        let mut canvas = BlockList::new();
        canvas.append(Block::new(BlockId(999), BlockKind::TypingIndicator));

        let handle = builder.cancel_handle();
        {
            let mut task = tokio_test::task::spawn(builder.rebuild(&log, &mut canvas));
            // The large rebuild parks once at the loading yield.
            assert!(task.poll().is_pending());
            handle.cancel();
            assert!(task.poll().is_ready());
        }

        // The canvas still holds exactly what it held before.
        assert_eq!(canvas.len(), 1);
        assert_eq!(canvas.blocks()[0].id, BlockId(999));
        assert!(!builder.is_loading());
    }

    #[tokio::test]
    async fn test_cancel_in_flight_arms_next_session() {
        let log = MessageLog::from(search_turn(1));
        let mut builder = builder(SourceMode::Historical);
        let mut canvas = BlockList::new();

        builder.cancel_in_flight();
        builder.rebuild(&log, &mut canvas).await;
        assert_eq!(canvas.len(), 3);
    }

    #[test]
    fn test_live_flow_groups_and_collapses() {
        let mut builder = builder(SourceMode::Live);
        let mut canvas = BlockList::new();

        builder.append_live(&Message::user(1, "hi"), &mut canvas);
        builder.append_live(
            &Message::tool(2, "lumi_search", r#"{"query": "cats"}"#)
                .with_call_id("c-2")
                .with_status(ToolStatus::Completed),
            &mut canvas,
        );
        builder.append_live(&Message::reasoning(3, "narrowing down"), &mut canvas);

        let mut assistant = Message::assistant(4, "");
        assistant.tool_status = Some(ToolStatus::InProgress);
        builder.append_live(&assistant, &mut canvas);
        assert_eq!(canvas.len(), 4);

        assistant.content = "Found it".to_string();
        assistant.tool_status = Some(ToolStatus::Completed);
        builder.message_updated(&assistant, &mut canvas);

        // group + reasoning collapse into one summary above the assistant.
        assert_eq!(canvas.len(), 3);
        match &canvas.blocks()[1].kind {
            BlockKind::Summary(summary) => assert_eq!(summary.children.len(), 2),
            other => panic!("expected summary, got {:?}", other),
        }
        let text = canvas.blocks()[2].as_text().unwrap();
        assert_eq!(text.content, "Found it");
        assert!(!text.streaming);
    }

    #[test]
    fn test_live_tool_status_update_refreshes_group() {
        let mut builder = builder(SourceMode::Live);
        let mut canvas = BlockList::new();

        let tool = Message::tool(2, "lumi_search", r#"{"query": "cats"}"#).with_call_id("c-2");
        builder.append_live(&tool, &mut canvas);
        let group = canvas.blocks()[0].as_group().unwrap();
        assert!(group.active);

        let done = tool.clone().with_status(ToolStatus::Completed);
        builder.message_updated(&done, &mut canvas);
        let group = canvas.blocks()[0].as_group().unwrap();
        assert!(!group.active);
        assert_eq!(group.meta.as_deref(), Some("1/1"));
    }

    #[tokio::test]
    async fn test_load_older_preserves_scroll_position() {
        let mut messages = Vec::new();
        for turn in 0..8 {
            messages.extend(search_turn(turn * 100));
        }
        let log = MessageLog::from(messages);
        let mut builder = builder(SourceMode::Historical);
        let mut canvas = BlockList::new();
        builder.rebuild(&log, &mut canvas).await;

        let blocks_before = canvas.len();
        canvas.set_scroll_offset(40.0);
        assert!(builder.wants_older(&canvas));

        let extent_before = canvas.content_extent();
        builder.load_older(&mut canvas).await;

        let extent_after = canvas.content_extent();
        assert!(extent_after >= extent_before);
        assert!(canvas.len() > blocks_before);
        assert_eq!(canvas.scroll_offset(), 40.0 + (extent_after - extent_before));
        assert!(builder.deferred_len() < 20);
    }

    #[tokio::test]
    async fn test_load_older_keeps_live_context_private() {
        let mut messages = Vec::new();
        for turn in 0..8 {
            messages.extend(search_turn(turn * 100));
        }
        let log = MessageLog::from(messages);
        let mut builder = builder(SourceMode::Live);
        let mut canvas = BlockList::new();
        builder.rebuild(&log, &mut canvas).await;

        // Open a live group, then load older history into the front.
        builder.append_live(
            &Message::tool(9001, "lumi_search", r#"{"query": "late"}"#).with_call_id("c-9001"),
            &mut canvas,
        );
        let open_group = canvas.blocks().last().unwrap().id;
        canvas.set_scroll_offset(10.0);
        builder.load_older(&mut canvas).await;

        // The open live group is untouched and still extendable.
        builder.append_live(
            &Message::tool(9002, "lumi_search", r#"{"query": "later"}"#).with_call_id("c-9002"),
            &mut canvas,
        );
        let group = canvas.get(open_group).unwrap().as_group().unwrap();
        assert_eq!(group.children.len(), 2);
    }

    #[test]
    fn test_question_card_and_typing_indicator() {
        let mut builder = builder(SourceMode::Live);
        let mut canvas = BlockList::new();

        builder.set_typing(true, &mut canvas);
        builder.question_asked("Proceed?", vec!["Yes".to_string()], true, &mut canvas);
        builder.append_live(&Message::assistant(5, "ok"), &mut canvas);

        // The indicator stays last while blocks arrive.
        assert!(matches!(canvas.blocks().last().unwrap().kind, BlockKind::TypingIndicator));
        builder.set_typing(false, &mut canvas);
        assert_eq!(canvas.len(), 2);
        assert!(matches!(canvas.blocks()[0].kind, BlockKind::QuestionCard(_)));
    }

    #[test]
    fn test_collected_attachments_land_on_next_assistant() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("made.txt");
        std::fs::write(&path, "x").unwrap();

        let mut builder = builder(SourceMode::Live);
        let mut canvas = BlockList::new();

        builder.file_created(path.clone());
        // A second sighting of the same path is deduplicated.
        builder.file_created(path.clone());
        builder.search_results(vec![SearchSource { title: "Cats".to_string(), url: "https://example.test".to_string() }]);
        builder.append_live(
            &Message::tool(2, "fetch_skill", r#"{"skill": "web-search"}"#).with_status(ToolStatus::Completed),
            &mut canvas,
        );
        builder.append_live(&Message::assistant(3, "here you go"), &mut canvas);

        let text = canvas.blocks().last().unwrap().as_text().unwrap();
        assert_eq!(text.attachments, vec![path]);
        assert_eq!(text.skills.len(), 1);
        assert_eq!(text.sources.len(), 1);

        // Drained: the following assistant block starts clean.
        builder.append_live(&Message::assistant(4, "anything else?"), &mut canvas);
        let text = canvas.blocks().last().unwrap().as_text().unwrap();
        assert!(text.attachments.is_empty());
        assert!(text.sources.is_empty());
    }
}
