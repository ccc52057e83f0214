//! Logging setup on the tracing ecosystem.
//!
//! # Environment Variables
//!
//! - `SKEIN_LOG`: filter directive (like `RUST_LOG`), e.g. `skein=debug`
//! - `SKEIN_LOG_FORMAT`: stderr format: `pretty`, `json`, `compact`
//! - `SKEIN_LOG_DIR`: override the file-log directory
//!
//! File output (daily-rolling JSON under `~/.skein/logs/`) is opt-in via the
//! `[logging.file]` config section.

use crate::Error;
use crate::config::LoggingConfig;
use std::env;
use std::io;
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, Registry, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Log output format for stderr
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Pretty, human-readable output with colors (default for TTY)
    #[default]
    Pretty,
    /// JSON output (one line per event)
    Json,
    /// Compact, single-line output
    Compact,
}

impl LogFormat {
    /// Parse a log format from a string
    pub fn parse_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pretty" => Some(LogFormat::Pretty),
            "json" => Some(LogFormat::Json),
            "compact" => Some(LogFormat::Compact),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LogFormat::Pretty => "pretty",
            LogFormat::Json => "json",
            LogFormat::Compact => "compact",
        }
    }
}

fn build_env_filter(config: &LoggingConfig) -> EnvFilter {
    let filter = env::var("SKEIN_LOG")
        .ok()
        .or_else(|| env::var("RUST_LOG").ok())
        .unwrap_or_else(|| config.level.clone());

    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter))
}

fn detect_format(config: &LoggingConfig) -> LogFormat {
    if let Ok(fmt_str) = env::var("SKEIN_LOG_FORMAT")
        && let Some(fmt) = LogFormat::parse_str(&fmt_str)
    {
        return fmt;
    }
    if let Some(fmt) = LogFormat::parse_str(&config.format) {
        return fmt;
    }

    if atty::is(atty::Stream::Stderr) { LogFormat::Pretty } else { LogFormat::Compact }
}

fn log_dir() -> Result<PathBuf, Error> {
    if let Ok(custom_dir) = env::var("SKEIN_LOG_DIR") {
        return Ok(PathBuf::from(custom_dir));
    }

    let home = env::var("HOME")
        .or_else(|_| env::var("USERPROFILE"))
        .map_err(|_| Error::Config("Could not determine home directory".to_string()))?;

    Ok(PathBuf::from(home).join(".skein").join("logs"))
}

/// Initialize the global tracing subscriber
///
/// Stderr output follows `SKEIN_LOG` / `SKEIN_LOG_FORMAT`; when file logging
/// is enabled, a daily-rolling JSON log is written alongside it.
pub fn init_logging(config: Option<LoggingConfig>) -> Result<(), Error> {
    let config = config.unwrap_or_default();
    let env_filter = build_env_filter(&config);
    let format = detect_format(&config);

    let registry = Registry::default().with(env_filter);

    if config.file.enabled {
        let log_dir = log_dir()?;
        std::fs::create_dir_all(&log_dir)
            .map_err(|e| Error::Config(format!("Failed to create log directory: {}", e)))?;

        let file_appender = tracing_appender::rolling::daily(log_dir, "skein.log");
        let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

        match format {
            LogFormat::Pretty => {
                registry
                    .with(fmt::layer().pretty().with_writer(io::stderr).with_ansi(true))
                    .with(fmt::layer().json().with_writer(non_blocking))
                    .init();
            }
            LogFormat::Json => {
                registry
                    .with(fmt::layer().json().with_writer(io::stderr))
                    .with(fmt::layer().json().with_writer(non_blocking))
                    .init();
            }
            LogFormat::Compact => {
                registry
                    .with(fmt::layer().compact().with_writer(io::stderr))
                    .with(fmt::layer().json().with_writer(non_blocking))
                    .init();
            }
        }
    } else {
        match format {
            LogFormat::Pretty => {
                registry
                    .with(fmt::layer().pretty().with_writer(io::stderr).with_ansi(true))
                    .init();
            }
            LogFormat::Json => {
                registry.with(fmt::layer().json().with_writer(io::stderr)).init();
            }
            LogFormat::Compact => {
                registry.with(fmt::layer().compact().with_writer(io::stderr)).init();
            }
        }
    }

    Ok(())
}
