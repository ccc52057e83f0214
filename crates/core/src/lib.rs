//! skein-core: conversation data model and host plumbing for the skein
//! transcript engine — messages, stored-session replay, tool-argument
//! decoding, configuration, and logging.

pub mod args;
pub mod config;
pub mod error;
pub mod logging;
pub mod message;
pub mod session;

pub use args::ToolArgs;
pub use config::{Config, DisplaySettings};
pub use error::{Error, Result, SessionError};
pub use message::{FileEdit, Message, MessageLog, Role, SearchSource, SkillRef, ToolStatus};
pub use session::{LoggedMessage, read_session, write_session};
