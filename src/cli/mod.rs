//! Command-line interface.

pub mod commands;

use clap::{Parser, Subcommand};

/// Lattice Local - single-process partition groups.
#[derive(Parser, Debug)]
#[command(name = "lattice-local")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file path. Defaults apply when omitted.
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// First port probed for partition endpoints (0 for ephemeral ports).
    #[arg(long, global = true)]
    pub base_port: Option<u16>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the controller and the configured partition groups.
    Start(commands::StartArgs),
    /// Configuration operations.
    Config(commands::ConfigArgs),
    /// Execute a command or query against a running endpoint.
    Exec(commands::ExecArgs),
}
