// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

use crate::types::RunMode;

/// Command-line arguments for `buildrig`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "buildrig",
    version,
    about = "Compose build tasks into sequential/parallel pipelines and watch for changes.",
    long_about = None
)]
pub struct CliArgs {
    /// Task to run.
    ///
    /// Default: `[config].default_task` from the config file (itself
    /// defaulting to `default`).
    #[arg(value_name = "TASK")]
    pub task: Option<String>,

    /// Keep running: execute TASK, then re-run bound tasks on file changes
    /// until interrupted.
    #[arg(long, short = 'w')]
    pub watch: bool,

    /// Path to the config file (TOML).
    #[arg(long, value_name = "PATH", default_value = "Buildrig.toml")]
    pub config: String,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `BUILDRIG_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Resolve and print the execution plan without running anything.
    #[arg(long)]
    pub dry_run: bool,

    /// List registered tasks and exit.
    #[arg(long)]
    pub list: bool,
}

impl CliArgs {
    pub fn mode(&self) -> RunMode {
        if self.watch {
            RunMode::Watch
        } else {
            RunMode::Once
        }
    }
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
