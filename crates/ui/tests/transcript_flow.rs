use skein_core::{DisplaySettings, Message, MessageLog, Role, ToolStatus};
use skein_ui::transcript::{BlockKind, BlockList, Canvas, SourceMode, TranscriptBuilder, Viewport};

fn tool(id: u64, name: &str, args: &str, status: ToolStatus) -> Message {
    Message::tool(id, name, args).with_call_id(format!("c-{}", id)).with_status(status)
}

fn turn(first_id: u64, intent: &str) -> Vec<Message> {
    vec![
        Message::user(first_id, "hi"),
        tool(first_id + 1, "report_intent", &format!(r#"{{"intent": "{}"}}"#, intent), ToolStatus::Completed),
        tool(first_id + 2, "lumi_search", r#"{"query": "cats"}"#, ToolStatus::Completed),
        tool(first_id + 3, "lumi_search", r#"{"query": "dogs"}"#, ToolStatus::Completed),
        Message::assistant(first_id + 4, "Found it"),
    ]
}

#[tokio::test]
async fn test_single_group_turn_has_no_summary_wrapper() {
    // log = [user, report_intent "Searching", search, search, assistant]
    let log = MessageLog::from(turn(1, "Searching"));
    let mut builder = TranscriptBuilder::new(DisplaySettings::default(), SourceMode::Historical);
    let mut canvas = BlockList::new();

    builder.rebuild(&log, &mut canvas).await;

    assert_eq!(canvas.len(), 3);
    let group = canvas.blocks()[1].as_group().unwrap();
    assert_eq!(group.label, "Searching");
    assert_eq!(group.meta.as_deref(), Some("2/2"));
    assert_eq!(group.children.len(), 2);
    assert!(!canvas.blocks().iter().any(|b| matches!(b.kind, BlockKind::Summary(_))));
}

#[tokio::test]
async fn test_reasoning_next_to_group_collapses_into_summary() {
    let messages = vec![
        Message::user(1, "hi"),
        tool(2, "lumi_search", r#"{"query": "cats"}"#, ToolStatus::Completed),
        Message::reasoning(3, "weighing options"),
        Message::assistant(4, "Found it"),
    ];
    let log = MessageLog::from(messages);
    let mut builder = TranscriptBuilder::new(DisplaySettings::default(), SourceMode::Historical);
    let mut canvas = BlockList::new();

    builder.rebuild(&log, &mut canvas).await;

    assert_eq!(canvas.len(), 3);
    match &canvas.blocks()[1].kind {
        BlockKind::Summary(summary) => {
            assert_eq!(summary.children.len(), 2);
            assert!(!summary.expanded);
        }
        other => panic!("expected summary, got {:?}", other),
    }
}

#[tokio::test]
async fn test_hidden_reasoning_still_splits_groups() {
    let mut settings = DisplaySettings::default();
    settings.show_reasoning = false;

    let messages = vec![
        Message::user(1, "hi"),
        tool(2, "lumi_search", r#"{"query": "cats"}"#, ToolStatus::Completed),
        Message::reasoning(3, "hidden"),
        tool(4, "lumi_search", r#"{"query": "dogs"}"#, ToolStatus::Completed),
        Message::assistant(5, "Found it"),
    ];
    let log = MessageLog::from(messages);
    let mut builder = TranscriptBuilder::new(settings, SourceMode::Historical);
    let mut canvas = BlockList::new();

    builder.rebuild(&log, &mut canvas).await;

    // The suppressed reasoning message still closed the first group, so the
    // two searches land in two groups, which then merge into a summary.
    match &canvas.blocks()[1].kind {
        BlockKind::Summary(summary) => {
            assert_eq!(summary.children.len(), 2);
            assert!(summary.children.iter().all(skein_ui::Block::is_group));
        }
        other => panic!("expected summary, got {:?}", other),
    }
}

#[tokio::test]
async fn test_tool_calls_hidden_leaves_plain_text_transcript() {
    let mut settings = DisplaySettings::default();
    settings.show_tool_calls = false;

    let log = MessageLog::from(turn(1, "Searching"));
    let mut builder = TranscriptBuilder::new(settings, SourceMode::Historical);
    let mut canvas = BlockList::new();

    builder.rebuild(&log, &mut canvas).await;

    assert_eq!(canvas.len(), 2);
    assert!(canvas.blocks().iter().all(|b| matches!(b.kind, BlockKind::Text(_))));
}

#[tokio::test]
async fn test_scroll_preserving_prepend_property() {
    let mut messages = Vec::new();
    for i in 0..10 {
        messages.extend(turn(i * 10, "Searching"));
    }
    let log = MessageLog::from(messages);
    let mut builder = TranscriptBuilder::new(DisplaySettings::default(), SourceMode::Historical);
    let mut canvas = BlockList::new();
    builder.rebuild(&log, &mut canvas).await;

    while builder.deferred_len() > 0 {
        let old_offset = 42.0;
        canvas.set_scroll_offset(old_offset);
        let extent_before = canvas.content_extent();

        builder.load_older(&mut canvas).await;

        let extent_after = canvas.content_extent();
        assert!(extent_after >= extent_before);
        assert_eq!(canvas.scroll_offset(), old_offset + (extent_after - extent_before));
    }

    // Everything materialized: one user turn boundary per 5-message turn.
    let users = canvas
        .blocks()
        .iter()
        .filter(|b| matches!(&b.kind, BlockKind::Text(t) if t.role == Role::User))
        .count();
    assert_eq!(users, 10);
}

#[tokio::test]
async fn test_terminal_output_merge_through_engine() {
    let mut builder = TranscriptBuilder::new(DisplaySettings::default(), SourceMode::Live);
    let mut canvas = BlockList::new();

    builder.append_live(&Message::user(1, "run it"), &mut canvas);
    builder.append_live(&tool(2, "powershell", r#"{"command": "dir"}"#, ToolStatus::InProgress), &mut canvas);

    builder.terminal_output("c-2", "A", false, &mut canvas);
    builder.terminal_output("c-2", "AB", false, &mut canvas);
    builder.terminal_output("c-2", "B", false, &mut canvas);
    builder.terminal_output("c-2", "X", false, &mut canvas);

    let group = canvas.blocks()[1].as_group().unwrap();
    match &group.children[0].kind {
        BlockKind::TerminalPreview(term) => assert_eq!(term.output, "AB\nX"),
        other => panic!("expected terminal preview, got {:?}", other),
    }
}

#[tokio::test]
async fn test_live_question_suppressed_but_replayed() {
    let question = tool(2, "ask_question", r#"{"question": "Proceed?", "options": ["Yes"]}"#, ToolStatus::Completed);

    let mut builder = TranscriptBuilder::new(DisplaySettings::default(), SourceMode::Live);
    let mut canvas = BlockList::new();
    builder.append_live(&Message::user(1, "hi"), &mut canvas);
    builder.append_live(&question, &mut canvas);
    assert_eq!(canvas.len(), 1, "live ask_question renders nothing");

    let log = MessageLog::from(vec![Message::user(1, "hi"), question]);
    let mut replayer = TranscriptBuilder::new(DisplaySettings::default(), SourceMode::Historical);
    let mut replay_canvas = BlockList::new();
    replayer.rebuild(&log, &mut replay_canvas).await;
    assert!(replay_canvas.blocks().iter().any(|b| matches!(b.kind, BlockKind::QuestionCard(_))));
}

#[tokio::test]
async fn test_todo_group_survives_replay_collapsed() {
    let messages = vec![
        Message::user(1, "plan it"),
        tool(
            2,
            "manage_todo_list",
            r#"{"todoList": [
                {"title": "One", "status": "completed"},
                {"title": "Two", "status": "in-progress"},
                {"title": "Three", "status": "blocked"}
            ]}"#,
            ToolStatus::Completed,
        ),
        tool(3, "lumi_search", r#"{"query": "cats"}"#, ToolStatus::Completed),
        Message::assistant(4, "on it"),
    ];
    let log = MessageLog::from(messages);
    let mut builder = TranscriptBuilder::new(DisplaySettings::default(), SourceMode::Historical);
    let mut canvas = BlockList::new();

    builder.rebuild(&log, &mut canvas).await;

    let group = canvas.blocks()[1].as_group().unwrap();
    assert_eq!(group.label, "To-do list");
    assert_eq!(group.meta.as_deref(), Some("1/3, 1 failed"));
    assert!(!group.expanded);
    assert_eq!(group.progress, skein_ui::transcript::Progress::Indeterminate);
}

#[tokio::test]
async fn test_block_ids_are_deterministic_across_rebuilds() {
    let log = MessageLog::from(turn(1, "Searching"));
    let mut builder = TranscriptBuilder::new(DisplaySettings::default(), SourceMode::Historical);

    let mut first = BlockList::new();
    builder.rebuild(&log, &mut first).await;
    let mut second = BlockList::new();
    builder.rebuild(&log, &mut second).await;

    let first_ids: Vec<_> = first.blocks().iter().map(|b| b.id).collect();
    let second_ids: Vec<_> = second.blocks().iter().map(|b| b.id).collect();
    assert_eq!(first_ids, second_ids);
}
