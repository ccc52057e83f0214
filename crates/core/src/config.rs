use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Error, Result};

/// Which transcript layers are rendered
///
/// Changing any flag requires a full rebuild of the transcript; the engine
/// never patches visibility in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct DisplaySettings {
    /// Render tool calls and tool groups
    pub show_tool_calls: bool,
    /// Render reasoning turns
    pub show_reasoning: bool,
    /// Render per-message timestamps
    pub show_timestamps: bool,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self { show_tool_calls: true, show_reasoning: true, show_timestamps: false }
    }
}

/// File logging settings (`[logging.file]`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct FileLoggingConfig {
    pub enabled: bool,
    pub level: String,
}

impl Default for FileLoggingConfig {
    fn default() -> Self {
        Self { enabled: false, level: "debug".to_string() }
    }
}

/// Logging settings (`[logging]`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct LoggingConfig {
    /// Default stderr filter level
    pub level: String,
    /// Output format: `pretty`, `json`, `compact`
    pub format: String,
    pub file: FileLoggingConfig,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "warn".to_string(), format: "pretty".to_string(), file: FileLoggingConfig::default() }
    }
}

/// Top-level configuration, loaded from `skein.toml`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Config {
    pub display: DisplaySettings,
    pub logging: LoggingConfig,
}

impl Config {
    /// Load from a TOML file; a missing file yields defaults
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        toml::from_str(&raw).map_err(|e| Error::Config(e.to_string()))
    }
}
