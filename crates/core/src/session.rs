//! Stored-chat replay source.
//!
//! A session is a JSONL file of [`LoggedMessage`] records, one per line, in
//! log order. Replaying a session feeds the same aggregation pipeline as a
//! live conversation, with streaming already settled.

use crate::error::{Result, SessionError};
use crate::message::Message;
use serde::{Deserialize, Serialize};
use std::io::{BufRead, BufReader};
use std::path::Path;

/// One line of a stored session file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggedMessage {
    /// Sequence number within the session
    pub seq: u64,
    /// Wall-clock time the record was written (RFC 3339)
    pub timestamp: String,
    /// The message as the producer last left it
    pub message: Message,
}

/// Read a stored session into log order
///
/// Blank lines are skipped; any malformed line fails the whole read with its
/// line number, since replaying a partial chat silently would be worse than
/// refusing it.
pub fn read_session(path: &Path) -> Result<Vec<Message>> {
    if !path.exists() {
        return Err(SessionError::NotFound(path.to_path_buf()).into());
    }

    let file = std::fs::File::open(path)?;
    let reader = BufReader::new(file);

    let mut messages = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record: LoggedMessage = serde_json::from_str(&line)
            .map_err(|e| SessionError::InvalidRecord { line: index + 1, reason: e.to_string() })?;
        messages.push(record.message);
    }

    tracing::debug!(count = messages.len(), path = %path.display(), "session loaded");
    Ok(messages)
}

/// Write messages as a session file (one JSONL record per message)
pub fn write_session(path: &Path, messages: &[Message]) -> Result<()> {
    use std::io::Write;

    let mut file = std::fs::File::create(path)?;
    for (seq, message) in messages.iter().enumerate() {
        let record = LoggedMessage {
            seq: seq as u64,
            timestamp: message.timestamp.to_rfc3339(),
            message: message.clone(),
        };
        let line = serde_json::to_string(&record).map_err(|e| crate::Error::Parse(e.to_string()))?;
        writeln!(file, "{}", line)?;
    }
    Ok(())
}
