//! Block rendering to ratatui lines.
//!
//! A thin consumer of the engine: every block kind maps to styled lines,
//! collapsed containers render their header only, and the whole transcript
//! draws as one scrollable paragraph.

use ratatui::{
    Frame,
    layout::Rect,
    style::{Color, Style, Stylize},
    text::{Line, Span},
    widgets::{Paragraph, Wrap},
};
use skein_core::{Role, ToolStatus};

use crate::transcript::{Block, BlockKind, Progress, TerminalPreviewBlock, TextBlock, ToolCallBlock};

/// Colors used by the block renderer
#[derive(Debug, Clone, Copy)]
pub struct Palette {
    pub user: Color,
    pub assistant: Color,
    pub reasoning: Color,
    pub muted: Color,
    pub ok: Color,
    pub err: Color,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            user: Color::Blue,
            assistant: Color::Cyan,
            reasoning: Color::Magenta,
            muted: Color::DarkGray,
            ok: Color::Green,
            err: Color::Red,
        }
    }
}

/// Renders a block tree to terminal lines
pub struct BlockRenderer<'a> {
    blocks: &'a [Block],
    palette: Palette,
    scroll: u16,
}

impl<'a> BlockRenderer<'a> {
    pub fn new(blocks: &'a [Block]) -> Self {
        Self { blocks, palette: Palette::default(), scroll: 0 }
    }

    pub fn with_palette(mut self, palette: Palette) -> Self {
        self.palette = palette;
        self
    }

    pub fn with_scroll(mut self, scroll: u16) -> Self {
        self.scroll = scroll;
        self
    }

    /// Render to the given frame area as a wrapped, scrolled paragraph
    pub fn render(&self, frame: &mut Frame<'_>, area: Rect) {
        let paragraph = Paragraph::new(self.lines(area.width as usize))
            .wrap(Wrap { trim: false })
            .scroll((self.scroll, 0));
        frame.render_widget(paragraph, area);
    }

    /// All display lines for the current block tree
    pub fn lines(&self, width: usize) -> Vec<Line<'static>> {
        let mut lines = Vec::new();
        for block in self.blocks {
            self.push_block(block, 0, width, &mut lines);
        }
        lines
    }

    fn push_block(&self, block: &Block, indent: usize, width: usize, lines: &mut Vec<Line<'static>>) {
        match &block.kind {
            BlockKind::Text(text) => self.push_text(text, indent, width, lines),
            BlockKind::ToolCall(call) => self.push_tool_call(call, indent, lines),
            BlockKind::TerminalPreview(term) => self.push_terminal(term, indent, lines),
            BlockKind::TodoProgress(todo) => {
                let mut spans = vec![
                    indent_span(indent),
                    Span::styled("☰ ", Style::default().fg(self.palette.muted)),
                    Span::styled(todo.title.clone(), Style::default().bold()),
                    Span::styled(
                        format!("  {}", crate::transcript::group::todo_meta(todo)),
                        Style::default().fg(self.palette.muted),
                    ),
                ];
                if todo.failed > 0 {
                    spans.push(Span::styled(" !", Style::default().fg(self.palette.err)));
                }
                lines.push(Line::from(spans));
            }
            BlockKind::Group(group) => {
                let arrow = if group.expanded { "▾ " } else { "▸ " };
                let mut spans = vec![
                    indent_span(indent),
                    Span::styled(arrow.to_string(), Style::default().fg(self.palette.muted)),
                    Span::styled(group.label.clone(), Style::default().bold()),
                ];
                if let Some(meta) = &group.meta {
                    spans.push(Span::styled(format!("  {}", meta), Style::default().fg(self.palette.muted)));
                }
                match group.progress {
                    Progress::Percent(pct) => {
                        spans.push(Span::styled(format!("  {}%", pct), Style::default().fg(self.palette.muted)));
                    }
                    Progress::Indeterminate if group.active => {
                        spans.push(Span::styled("  …", Style::default().fg(self.palette.muted)));
                    }
                    _ => {}
                }
                lines.push(Line::from(spans));
                if group.expanded {
                    for child in &group.children {
                        self.push_block(child, indent + 1, width, lines);
                    }
                }
            }
            BlockKind::Summary(summary) => {
                let arrow = if summary.expanded { "▾ " } else { "▸ " };
                let mut spans = vec![
                    indent_span(indent),
                    Span::styled(arrow.to_string(), Style::default().fg(self.palette.muted)),
                    Span::styled(summary.label.clone(), Style::default().fg(self.palette.muted).bold()),
                ];
                if summary.has_failures {
                    spans.push(Span::styled(" !", Style::default().fg(self.palette.err)));
                }
                lines.push(Line::from(spans));
                if summary.expanded {
                    for child in &summary.children {
                        self.push_block(child, indent + 1, width, lines);
                    }
                }
            }
            BlockKind::QuestionCard(card) => {
                lines.push(Line::from(vec![
                    indent_span(indent),
                    Span::styled("? ", Style::default().fg(self.palette.user)),
                    Span::styled(card.question.clone(), Style::default().bold()),
                ]));
                for option in &card.options {
                    lines.push(Line::from(vec![
                        indent_span(indent + 1),
                        Span::styled(format!("◦ {}", option), Style::default().fg(self.palette.muted)),
                    ]));
                }
            }
            BlockKind::TypingIndicator => {
                lines.push(Line::from(vec![
                    indent_span(indent),
                    Span::styled("···", Style::default().fg(self.palette.muted)),
                ]));
            }
        }
    }

    fn push_text(&self, text: &TextBlock, indent: usize, width: usize, lines: &mut Vec<Line<'static>>) {
        let (glyph, name, color) = match text.role {
            Role::User => ("● ", "User", self.palette.user),
            Role::Assistant => ("◆ ", "Assistant", self.palette.assistant),
            Role::Reasoning => ("◇ ", "Reasoning", self.palette.reasoning),
            Role::System | Role::Tool => ("• ", "System", self.palette.muted),
        };
        let mut header = vec![
            indent_span(indent),
            Span::styled(glyph.to_string(), Style::default().fg(color)),
            Span::styled(
                text.author.clone().unwrap_or_else(|| name.to_string()),
                Style::default().fg(color).bold(),
            ),
        ];
        if let Some(timestamp) = text.timestamp {
            header.push(Span::styled(
                format!("  {}", timestamp.format("%H:%M:%S")),
                Style::default().fg(self.palette.muted),
            ));
        }
        lines.push(Line::from(header));

        let body_width = width.saturating_sub(indent * 2 + 2).max(8);
        for source_line in text.content.lines() {
            if source_line.is_empty() {
                lines.push(Line::default());
                continue;
            }
            for wrapped in textwrap::wrap(source_line, body_width) {
                lines.push(Line::from(vec![indent_span(indent), Span::raw(format!("  {}", wrapped))]));
            }
        }
        if text.streaming {
            lines.push(Line::from(vec![
                indent_span(indent),
                Span::styled("  █", Style::default().fg(self.palette.muted)),
            ]));
        }
        for path in &text.attachments {
            lines.push(Line::from(vec![
                indent_span(indent),
                Span::styled(format!("  ⎘ {}", path.display()), Style::default().fg(self.palette.muted)),
            ]));
        }
        for source in &text.sources {
            lines.push(Line::from(vec![
                indent_span(indent),
                Span::styled(format!("  ↗ {}", source.title), Style::default().fg(self.palette.muted)),
            ]));
        }
    }

    fn push_tool_call(&self, call: &ToolCallBlock, indent: usize, lines: &mut Vec<Line<'static>>) {
        let mut spans = vec![
            indent_span(indent),
            self.status_span(call.status),
            Span::raw(" "),
            Span::styled(call.name.clone(), Style::default().bold()),
        ];
        if let Some(summary) = &call.input_summary {
            spans.push(Span::styled(format!(" {}", summary), Style::default().fg(self.palette.muted)));
        }
        if let Some(ms) = call.duration_ms {
            spans.push(Span::styled(format!(" ({}ms)", ms), Style::default().fg(self.palette.muted)));
        }
        lines.push(Line::from(spans));
    }

    fn push_terminal(&self, term: &TerminalPreviewBlock, indent: usize, lines: &mut Vec<Line<'static>>) {
        lines.push(Line::from(vec![
            indent_span(indent),
            self.status_span(term.status),
            Span::raw(" "),
            Span::styled(format!("$ {}", term.command), Style::default().bold()),
        ]));
        for output_line in term.output.lines() {
            lines.push(Line::from(vec![
                indent_span(indent + 1),
                Span::styled(output_line.to_string(), Style::default().fg(self.palette.muted)),
            ]));
        }
    }

    fn status_span(&self, status: ToolStatus) -> Span<'static> {
        match status {
            ToolStatus::InProgress => Span::styled("●", Style::default().fg(self.palette.muted)),
            ToolStatus::Completed => Span::styled("✓", Style::default().fg(self.palette.ok)),
            ToolStatus::Failed => Span::styled("✗", Style::default().fg(self.palette.err)),
        }
    }
}

fn indent_span(indent: usize) -> Span<'static> {
    Span::raw("  ".repeat(indent))
}
