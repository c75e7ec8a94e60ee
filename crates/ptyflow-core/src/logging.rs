//! Structured logging for ptyflow
//!
//! The engine itself only emits `tracing` events; this module is the
//! opt-in subscriber setup for hosts that do not install their own.
//!
//! - **Pretty format**: human-friendly output for interactive use
//! - **JSON format**: machine-parseable lines for CI and ops
//! - **File output**: optional log file for diagnostic bundles
//!
//! The `RUST_LOG` environment variable overrides the configured level.
//!
//! Never log flushed terminal contents at info or above: stream output can
//! contain secrets. The engine logs byte counts and stream IDs only.

use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

use serde::{Deserialize, Serialize};
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

/// Global flag to track if logging has been initialized
static LOGGING_INITIALIZED: OnceLock<bool> = OnceLock::new();

/// Output format for log events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-friendly output.
    Pretty,
    /// JSON lines.
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log level filter (trace, debug, info, warn, error).
    /// Can be overridden by the RUST_LOG environment variable.
    pub level: String,

    /// Output format.
    pub format: LogFormat,

    /// Optional log file path. When set, output goes to this file instead
    /// of stderr.
    pub file: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
            file: None,
        }
    }
}

/// Error type for logging initialization.
#[derive(Debug, thiserror::Error)]
pub enum LogError {
    /// A global subscriber is already installed.
    #[error("logging already initialized")]
    AlreadyInitialized,

    /// The configured level is not a valid filter directive.
    #[error("invalid log filter '{0}'")]
    InvalidFilter(String),

    /// The configured log file could not be opened.
    #[error("failed to open log file: {0}")]
    File(#[from] std::io::Error),
}

/// Build the env filter for a configured level, honoring `RUST_LOG`.
pub fn build_env_filter(level: &str) -> Result<EnvFilter, LogError> {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .map_err(|_| LogError::InvalidFilter(level.to_string()))
}

/// Initialize global logging once at startup.
pub fn init_logging(config: &LogConfig) -> Result<(), LogError> {
    if LOGGING_INITIALIZED.get().is_some() {
        return Err(LogError::AlreadyInitialized);
    }

    let filter = build_env_filter(&config.level)?;

    let writer = match &config.file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            let file = Arc::new(file);
            BoxMakeWriter::new(move || Arc::clone(&file))
        }
        None => BoxMakeWriter::new(std::io::stderr),
    };
    let ansi = config.file.is_none();

    let registry = tracing_subscriber::registry().with(filter);
    let result = match config.format {
        LogFormat::Pretty => registry
            .with(fmt::layer().with_writer(writer).with_ansi(ansi))
            .try_init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(writer))
            .try_init(),
    };
    result.map_err(|_| LogError::AlreadyInitialized)?;

    let _ = LOGGING_INITIALIZED.set(true);
    tracing::debug!(level = %config.level, format = ?config.format, "logging initialized");
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================
