use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for skein-core
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for the skein transcript engine
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error for file operations
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Session-related errors
    #[error("session error: {0}")]
    Session(#[from] SessionError),

    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(String),

    /// Parse/serialization errors
    #[error("parse error: {0}")]
    Parse(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

/// Session-specific errors
#[derive(Debug, Error)]
pub enum SessionError {
    /// Session file not found
    #[error("session file not found: {0}")]
    NotFound(PathBuf),

    /// Corrupted session data
    #[error("corrupted session data: {0}")]
    Corrupted(String),

    /// Invalid record in JSONL
    #[error("invalid record at line {line}: {reason}")]
    InvalidRecord { line: usize, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let io_err: Error = Error::Io(std::io::Error::new(std::io::ErrorKind::NotFound, "file not found"));
        assert_eq!(io_err.to_string(), "I/O error: file not found");

        let config_err: Error = Error::Config("invalid display settings".to_string());
        assert_eq!(config_err.to_string(), "configuration error: invalid display settings");

        let parse_err: Error = Error::Parse("invalid JSON".to_string());
        assert_eq!(parse_err.to_string(), "parse error: invalid JSON");

        let other_err: Error = Error::Other("something went wrong".to_string());
        assert_eq!(other_err.to_string(), "something went wrong");
    }

    #[test]
    fn test_session_error_display() {
        let not_found = SessionError::NotFound(PathBuf::from("/tmp/chat.jsonl"));
        assert_eq!(not_found.to_string(), "session file not found: /tmp/chat.jsonl");

        let corrupted = SessionError::Corrupted("truncated file".to_string());
        assert_eq!(corrupted.to_string(), "corrupted session data: truncated file");

        let invalid = SessionError::InvalidRecord { line: 42, reason: "missing field".to_string() };
        assert_eq!(invalid.to_string(), "invalid record at line 42: missing field");
    }

    #[test]
    fn test_error_from_session_error() {
        let session_err = SessionError::Corrupted("bad header".to_string());
        let error: Error = session_err.into();
        assert_eq!(error.to_string(), "session error: corrupted session data: bad header");
    }

    #[test]
    fn test_result_type_alias() {
        let ok: Result<i32> = Ok(42);
        assert!(ok.is_ok());

        let err: Result<i32> = Err(Error::Other("error".to_string()));
        assert!(err.is_err());
    }
}
