// src/logging.rs

//! Logging setup for `devloop` using `tracing` + `tracing-subscriber`.
//!
//! Priority for determining the log level:
//! 1. `--log-level` CLI flag (if provided)
//! 2. `DEVLOOP_LOG` environment variable (e.g. "info", "debug", or a full
//!    `EnvFilter` directive such as "devloop=debug,info")
//! 3. default to `info`
//!
//! Logs are sent to STDERR so that the dev server's stdout stays readable.

use anyhow::{Context, Result};
use tracing_subscriber::{EnvFilter, fmt};

use crate::cli::LogLevel;

/// Initialise global logging subscriber.
///
/// Safe to call once at startup.
pub fn init_logging(cli_level: Option<LogLevel>) -> Result<()> {
    let filter = match cli_level {
        Some(lvl) => EnvFilter::new(filter_name(level_from_log_level(lvl))),
        None => match std::env::var("DEVLOOP_LOG") {
            Ok(s) => filter_from_str(&s)?,
            Err(_) => EnvFilter::new("info"),
        },
    };

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!(e))
        .context("installing tracing subscriber")?;

    Ok(())
}

fn level_from_log_level(lvl: LogLevel) -> tracing::Level {
    match lvl {
        LogLevel::Error => tracing::Level::ERROR,
        LogLevel::Warn => tracing::Level::WARN,
        LogLevel::Info => tracing::Level::INFO,
        LogLevel::Debug => tracing::Level::DEBUG,
        LogLevel::Trace => tracing::Level::TRACE,
    }
}

fn filter_name(level: tracing::Level) -> String {
    level.as_str().to_lowercase()
}

fn filter_from_str(s: &str) -> Result<EnvFilter> {
    if let Some(level) = parse_level_str(s) {
        return Ok(EnvFilter::new(filter_name(level)));
    }
    EnvFilter::try_new(s.trim()).with_context(|| format!("invalid DEVLOOP_LOG value {s:?}"))
}

fn parse_level_str(s: &str) -> Option<tracing::Level> {
    match s.trim().to_lowercase().as_str() {
        "error" => Some(tracing::Level::ERROR),
        "warn" | "warning" => Some(tracing::Level::WARN),
        "info" => Some(tracing::Level::INFO),
        "debug" => Some(tracing::Level::DEBUG),
        "trace" => Some(tracing::Level::TRACE),
        _ => None,
    }
}
