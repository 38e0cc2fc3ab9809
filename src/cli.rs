// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::config::default_config_path;
use crate::types::{ChangeType, Priority, PropagationStrategy};

/// Command-line arguments for `storydag`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "storydag",
    version,
    about = "Track story artifact dependencies and schedule their regeneration.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `Storydag.toml` in the current working directory.
    #[arg(long, value_name = "PATH", default_value_os_t = default_config_path())]
    pub config: PathBuf,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `STORYDAG_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL", global = true)]
    pub log_level: Option<LogLevel>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Print every node in dependency order with its direct dependencies.
    Show {
        /// Print the graph as JSON instead.
        #[arg(long)]
        json: bool,
    },

    /// Flag a node and everything downstream of it for regeneration.
    Mark {
        node: String,

        #[arg(long, default_value = "manual edit")]
        reason: String,
    },

    /// Propagate a change event and print the result.
    Propagate {
        node: String,

        #[arg(long, value_name = "KIND", default_value = "content_edit")]
        change: ChangeType,

        /// Defaults to `[config].default_strategy`.
        #[arg(long, value_name = "STRATEGY")]
        strategy: Option<PropagationStrategy>,

        /// Node-id glob for the selective strategy; repeatable.
        #[arg(long = "select", value_name = "GLOB")]
        select: Vec<String>,
    },

    /// Mark a node (or use existing flags), then drain the regeneration queue
    /// with a simulated generator and print the final status.
    Regenerate {
        /// Node whose downstream closure should be regenerated.
        #[arg(long, value_name = "ID")]
        node: Option<String>,

        /// Node-id glob whose regeneration should fail; repeatable.
        #[arg(long = "fail", value_name = "GLOB")]
        fail: Vec<String>,

        #[arg(long, value_name = "PRIORITY", default_value = "normal")]
        priority: Priority,
    },
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
