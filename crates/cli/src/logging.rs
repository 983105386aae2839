//! Logging setup for the dbshift CLI
//!
//! Logs go to stderr so that stdout carries only command output (for example
//! `status --json`). `RUST_LOG` overrides the configured filter.

use clap::ValueEnum;
use std::io;
use tracing_subscriber::{fmt::Layer, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Output format for log lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

/// Logging configuration for the CLI
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Log level for dbshift's own targets (e.g. "info", "debug")
    pub level: String,
    pub format: LogFormat,
    /// Include timestamps in text output
    pub include_timestamp: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
            include_timestamp: false,
        }
    }
}

impl LoggingConfig {
    /// Configuration derived from the global `--verbose` / `--log-format` flags
    pub fn from_flags(verbose: bool, format: LogFormat) -> Self {
        Self {
            level: if verbose { "debug" } else { "info" }.to_string(),
            format,
            include_timestamp: verbose || format == LogFormat::Json,
        }
    }

    /// Filter directive applied when `RUST_LOG` is unset
    ///
    /// Only dbshift's targets get the configured level; driver chatter is
    /// kept at `warn`.
    pub fn directive(&self) -> String {
        format!(
            "warn,dbshift={level},dbshift_migrate={level}",
            level = self.level
        )
    }
}

/// Install the global tracing subscriber
pub fn init_logging(config: LoggingConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(config.directive()))?;

    match config.format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(Layer::new().with_writer(io::stderr).json())
            .try_init()?,
        LogFormat::Text if config.include_timestamp => tracing_subscriber::registry()
            .with(filter)
            .with(Layer::new().with_writer(io::stderr).with_target(false))
            .try_init()?,
        LogFormat::Text => tracing_subscriber::registry()
            .with(filter)
            .with(
                Layer::new()
                    .with_writer(io::stderr)
                    .with_target(false)
                    .without_time(),
            )
            .try_init()?,
    }

    tracing::debug!(
        level = %config.level,
        format = ?config.format,
        "logging initialized"
    );
    Ok(())
}
