// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `sitepipe`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "sitepipe",
    version,
    about = "Build, serve and deploy static-site assets from a declarative task graph.",
    long_about = None
)]
pub struct CliArgs {
    /// Task or preset to run: `dev` (default), `build`, `deploy`, `serve`,
    /// or the name of a single task such as `sass` or `images`.
    #[arg(value_name = "TASK", default_value = "dev")]
    pub task: String,

    /// Production mode: minify output and deploy to production.
    #[arg(long)]
    pub prod: bool,

    /// Path to the build configuration (YAML, or TOML by extension).
    ///
    /// Relative source and destination paths are resolved against the
    /// directory containing this file.
    #[arg(long, value_name = "PATH", default_value = "site.config.yml")]
    pub config: String,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `SITEPIPE_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Load and validate the config, print the task plan, run nothing.
    #[arg(long)]
    pub dry_run: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
