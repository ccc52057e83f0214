//! `skein` — replay a stored chat session to the terminal.

use anyhow::Context;
use clap::{Parser, Subcommand};
use owo_colors::OwoColorize;
use std::path::{Path, PathBuf};

use skein_core::{Config, DisplaySettings, MessageLog};
use skein_ui::render::BlockRenderer;
use skein_ui::transcript::{BlockList, Canvas, SourceMode, TranscriptBuilder, Viewport};

#[derive(Parser)]
#[command(name = "skein", version, about = "Transcript renderer for stored agent chat sessions")]
struct Cli {
    /// Path to skein.toml (defaults to ./skein.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a session JSONL file as a transcript
    Replay {
        /// The stored session to replay
        session: PathBuf,

        /// Hide tool calls and tool groups
        #[arg(long)]
        no_tool_calls: bool,

        /// Hide reasoning turns
        #[arg(long)]
        no_reasoning: bool,

        /// Show per-message timestamps
        #[arg(long)]
        timestamps: bool,

        /// Render only the initial history window instead of loading all
        /// deferred batches
        #[arg(long)]
        window: bool,

        /// Output width in columns
        #[arg(long, default_value_t = 100)]
        width: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(|| PathBuf::from("skein.toml"));
    let config = Config::load(&config_path).with_context(|| format!("loading {}", config_path.display()))?;
    if let Err(e) = skein_core::logging::init_logging(Some(config.logging.clone())) {
        eprintln!("{} logging setup failed: {}", "Warning:".yellow(), e);
    }

    match cli.command {
        Commands::Replay { session, no_tool_calls, no_reasoning, timestamps, window, width } => {
            let settings = DisplaySettings {
                show_tool_calls: config.display.show_tool_calls && !no_tool_calls,
                show_reasoning: config.display.show_reasoning && !no_reasoning,
                show_timestamps: config.display.show_timestamps || timestamps,
            };
            replay(&session, settings, window, width).await
        }
    }
}

async fn replay(session: &Path, settings: DisplaySettings, window_only: bool, width: usize) -> anyhow::Result<()> {
    let messages =
        skein_core::read_session(session).with_context(|| format!("reading {}", session.display()))?;
    let log = MessageLog::from(messages);

    let mut builder = TranscriptBuilder::new(settings, SourceMode::Historical);
    let mut canvas = BlockList::new();
    builder.rebuild(&log, &mut canvas).await;

    if !window_only {
        // Pull every deferred batch in, front to back, like a reader
        // scrolling to the top of the chat.
        while builder.deferred_len() > 0 {
            canvas.set_scroll_offset(0.0);
            builder.load_older(&mut canvas).await;
        }
    } else if builder.deferred_len() > 0 {
        println!("{}", format!("({} older messages not shown)", builder.deferred_len()).dimmed());
    }

    let renderer = BlockRenderer::new(canvas.blocks());
    for line in renderer.lines(width) {
        let text: String = line.spans.iter().map(|span| span.content.as_ref()).collect();
        println!("{}", text);
    }
    Ok(())
}
