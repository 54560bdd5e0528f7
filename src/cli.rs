// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::config::default_config_path;

/// Command-line arguments for `taskweave`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "taskweave",
    version,
    about = "Run build tasks, watch rules and process groups declared in a TOML file.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `Taskweave.toml` in the current working directory.
    #[arg(
        long,
        global = true,
        value_name = "PATH",
        default_value_os_t = default_config_path()
    )]
    pub config: PathBuf,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `TASKWEAVE_LOG` or a default level will be used.
    #[arg(long, global = true, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Clone, Subcommand)]
pub enum CliCommand {
    /// Run one or more tasks, in order, as a single plan.
    Run {
        /// Tasks to run; defaults to `[config].default_task`.
        #[arg(value_name = "TASK")]
        tasks: Vec<String>,

        /// Resolve and print the plan without running anything.
        #[arg(long)]
        dry_run: bool,
    },

    /// List tasks, watch rules and process groups.
    List,
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
