use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{BuildError, Result};

/// Default capacity of the in-memory pipe between the COPY archive
/// producer and the upload consumer.
pub const DEFAULT_COPY_BUFFER_SIZE: usize = 64 * 1024;

/// Build-wide configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BuildConfig {
    /// Always pull the FROM image before inspecting it
    pub pull: bool,

    /// Directory COPY sources are resolved against
    pub context_dir: PathBuf,

    /// What to do when a container cannot be removed after a commit
    pub cleanup_policy: CleanupPolicy,

    /// Capacity in bytes of the COPY transfer pipe
    pub copy_buffer_size: usize,

    /// Log level
    pub log_level: LogLevel,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            pull: false,
            context_dir: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            cleanup_policy: CleanupPolicy::default(),
            copy_buffer_size: DEFAULT_COPY_BUFFER_SIZE,
            log_level: LogLevel::Info,
        }
    }
}

impl BuildConfig {
    /// Parse a configuration from YAML text.
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()
    }

    /// Parse a configuration from JSON text.
    pub fn from_json_str(content: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(content)?;
        config.validate()
    }

    /// Load a configuration file. `.json` files are read as JSON, anything
    /// else as YAML.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            BuildError::ConfigError(format!(
                "Failed to read config at {}: {}",
                path.display(),
                e
            ))
        })?;

        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_str(&content),
            _ => Self::from_yaml_str(&content),
        }
    }

    fn validate(self) -> Result<Self> {
        if self.copy_buffer_size == 0 {
            return Err(BuildError::ConfigError(
                "copy_buffer_size must be greater than zero".to_string(),
            ));
        }
        Ok(self)
    }
}

/// Policy for a container that cannot be removed after its image was committed.
///
/// The image exists either way; the policy only decides whether the build
/// reports the leaked container as a failure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CleanupPolicy {
    /// Surface the removal failure as a build error
    #[default]
    Fail,
    /// Log a warning and continue with the committed image
    Warn,
}

/// Log level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => tracing::Level::TRACE,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Trace => write!(f, "trace"),
            Self::Debug => write!(f, "debug"),
            Self::Info => write!(f, "info"),
            Self::Warn => write!(f, "warn"),
            Self::Error => write!(f, "error"),
        }
    }
}
