//! Process-wide `tracing` setup for binaries.

use thiserror::Error;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, Layer, Registry};

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("invalid log filter '{filter}': {reason}")]
    InvalidFilter { filter: String, reason: String },

    #[error("a global subscriber is already installed")]
    AlreadyInitialized,
}

/// Where and how log lines are written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// `EnvFilter` directive, e.g. `info` or `cwait=debug,warn`.
    pub level: String,
    pub json: bool,
    pub stderr: bool,
}

impl LogConfig {
    /// Honors `RUST_LOG`, then `CWAIT_LOG_LEVEL`, then `default_level`.
    pub fn from_env(default_level: &str) -> Self {
        let level = std::env::var("RUST_LOG")
            .or_else(|_| std::env::var("CWAIT_LOG_LEVEL"))
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| default_level.to_string());
        Self {
            level,
            json: false,
            stderr: false,
        }
    }

    #[must_use]
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }

    #[must_use]
    pub fn with_stderr(mut self) -> Self {
        self.stderr = true;
        self
    }

    #[must_use]
    pub fn with_json(mut self) -> Self {
        self.json = true;
        self
    }

    pub fn filter(&self) -> Result<EnvFilter, LoggingError> {
        EnvFilter::try_new(&self.level).map_err(|e| LoggingError::InvalidFilter {
            filter: self.level.clone(),
            reason: e.to_string(),
        })
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            stderr: true,
        }
    }
}

/// Install the global subscriber described by `config`.
pub fn init_logging(config: &LogConfig) -> Result<(), LoggingError> {
    let filter = config.filter()?;
    tracing_subscriber::registry()
        .with(fmt_layer(config))
        .with(filter)
        .try_init()
        .map_err(|_| LoggingError::AlreadyInitialized)
}

fn fmt_layer(config: &LogConfig) -> Box<dyn Layer<Registry> + Send + Sync> {
    let layer = tracing_subscriber::fmt::layer();
    match (config.json, config.stderr) {
        (true, true) => layer
            .json()
            .with_current_span(true)
            .with_target(true)
            .with_writer(std::io::stderr)
            .boxed(),
        (true, false) => layer
            .json()
            .with_current_span(true)
            .with_target(true)
            .boxed(),
        (false, true) => layer
            .with_target(false)
            .compact()
            .with_writer(std::io::stderr)
            .boxed(),
        (false, false) => layer.with_target(false).compact().boxed(),
    }
}
