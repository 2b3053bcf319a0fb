//! Logging configuration and initialization.
//!
//! JSON output by default, pretty output for development. An optional
//! file receives the same events instead of stderr.

use std::path::PathBuf;
use std::str::FromStr;

use thiserror::Error;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

impl FromStr for LogFormat {
    type Err = LogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "pretty" | "text" => Ok(Self::Pretty),
            other => Err(LogError::UnknownFormat(other.to_string())),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub format: LogFormat,
    /// Filter directive, e.g. `info` or `forge_core::models=debug`.
    pub level: String,
    /// Log file. `None` logs to stderr.
    pub output_path: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self { format: LogFormat::Json, level: "info".to_string(), output_path: None }
    }
}

#[derive(Debug, Error)]
pub enum LogError {
    #[error("Invalid log filter: {0}")]
    InvalidFilter(String),
    #[error("Unknown log format: {0}")]
    UnknownFormat(String),
    #[error("Failed to open log file: {0}")]
    FileOpen(String),
    #[error("Subscriber already initialized")]
    AlreadyInitialized,
}

/// Build the filter for `level`, without installing anything.
pub fn build_filter(level: &str) -> Result<EnvFilter, LogError> {
    EnvFilter::try_new(level).map_err(|e| LogError::InvalidFilter(e.to_string()))
}

/// Install the global subscriber. Call once at startup.
pub fn init_logging(config: &LogConfig) -> Result<(), LogError> {
    let filter = build_filter(&config.level)?;
    let registry = tracing_subscriber::registry().with(filter);

    let file = match &config.output_path {
        Some(path) => Some(
            std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| LogError::FileOpen(format!("{}: {e}", path.display())))?,
        ),
        None => None,
    };

    let installed = match (config.format, file) {
        (LogFormat::Json, Some(file)) => registry
            .with(fmt::layer().json().with_writer(std::sync::Mutex::new(file)))
            .try_init(),
        (LogFormat::Json, None) => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init(),
        (LogFormat::Pretty, Some(file)) => registry
            .with(fmt::layer().pretty().with_ansi(false).with_writer(std::sync::Mutex::new(file)))
            .try_init(),
        (LogFormat::Pretty, None) => registry
            .with(fmt::layer().pretty().with_writer(std::io::stderr))
            .try_init(),
    };
    installed.map_err(|_| LogError::AlreadyInitialized)
}
