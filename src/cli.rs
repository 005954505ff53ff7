// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `relhooks`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "relhooks",
    version,
    about = "Play relation membership scenarios through the relation hook engine.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the scenario config file (TOML).
    ///
    /// Default: `Relhooks.toml` in the current working directory.
    #[arg(long, value_name = "PATH", default_value = "Relhooks.toml")]
    pub config: String,

    /// Only run the relation with this endpoint name.
    #[arg(long, value_name = "NAME")]
    pub relation: Option<String>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `RELHOOKS_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse + validate, print the scenario, but don't run anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Print the persisted relation state directories and exit.
    #[arg(long)]
    pub inspect: bool,
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
