//! skein-ui: the transcript build & virtualization engine plus a terminal
//! block renderer.

pub mod render;
pub mod transcript;

pub use render::{BlockRenderer, Palette};
pub use transcript::{
    Block, BlockId, BlockKind, BlockList, Canvas, SourceMode, TranscriptBuilder, Viewport,
};
