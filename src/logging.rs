// src/logging.rs

//! Logging setup for `storydag` using `tracing` + `tracing-subscriber`.
//!
//! Filter resolution, first match wins:
//! 1. `--log-level` CLI flag, applied to every target
//! 2. `STORYDAG_LOG`, in `EnvFilter` directive syntax
//!    (e.g. `info,storydag::queue=debug`)
//! 3. `info`
//!
//! Logs go to STDERR; stdout carries the JSON/listing output of commands.

use anyhow::{Context, Result};
use tracing_subscriber::{EnvFilter, fmt};

use crate::cli::LogLevel;

pub const LOG_ENV_VAR: &str = "STORYDAG_LOG";

/// Install the global subscriber. Fails if one is already installed.
pub fn init_logging(cli_level: Option<LogLevel>) -> Result<()> {
    let filter = build_filter(cli_level, std::env::var(LOG_ENV_VAR).ok().as_deref())?;

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("installing tracing subscriber: {e}"))?;

    Ok(())
}

/// Resolve the filter `init_logging` would install.
pub fn build_filter(cli_level: Option<LogLevel>, env: Option<&str>) -> Result<EnvFilter> {
    if let Some(level) = cli_level {
        return Ok(EnvFilter::new(level.as_directive()));
    }

    match env.map(str::trim).filter(|s| !s.is_empty()) {
        Some(directives) => EnvFilter::try_new(directives)
            .with_context(|| format!("invalid {LOG_ENV_VAR} value '{directives}'")),
        None => Ok(EnvFilter::new("info")),
    }
}

impl LogLevel {
    fn as_directive(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}
