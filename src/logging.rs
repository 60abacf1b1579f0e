// src/logging.rs

//! Logging setup for `sitepipe` using `tracing` + `tracing-subscriber`.
//!
//! Level priority:
//! 1. `--log-level` CLI flag
//! 2. `SITEPIPE_LOG` (any `EnvFilter` directive, e.g. `sitepipe=debug`)
//! 3. `info`
//!
//! Logs go to stderr; stdout is reserved for the dry-run plan.

use anyhow::{anyhow, Result};
use tracing_subscriber::EnvFilter;

use crate::cli::LogLevel;

/// Environment variable holding filter directives.
pub const LOG_ENV: &str = "SITEPIPE_LOG";

/// Install the global subscriber. Call once at startup.
pub fn init_logging(cli_level: Option<LogLevel>) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(build_filter(cli_level))
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| anyhow!("installing log subscriber: {err}"))
}

/// Filter for the given CLI level, falling back to [`LOG_ENV`] and then
/// `info`. Unparseable env directives fall back to `info`.
pub fn build_filter(cli_level: Option<LogLevel>) -> EnvFilter {
    if let Some(level) = cli_level {
        return EnvFilter::new(level.as_directive());
    }
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"))
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
