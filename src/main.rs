//! Lattice Local - CLI entrypoint.
//!
//! Usage:
//!   lattice-local start --config lattice-local.toml
//!   lattice-local config validate --config lattice-local.toml
//!   lattice-local config show --base-port 0
//!   lattice-local exec --endpoint 127.0.0.1:5680 --partition 1 payload

use anyhow::Result;
use clap::Parser;
use lattice_local::cli::commands::{load_config, run_config, run_exec, run_start};
use lattice_local::cli::{Cli, Commands};
use lattice_local::config::ConfigOverrides;
use std::path::PathBuf;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.map(PathBuf::from);
    let overrides = ConfigOverrides {
        log_level: cli.log_level,
        base_port: cli.base_port,
    };

    match cli.command {
        Commands::Start(args) => {
            let config = load_config(config_path.as_deref(), &overrides)?;
            run_start(args, config).await
        }
        Commands::Config(args) => {
            let config = load_config(config_path.as_deref(), &overrides)?;
            run_config(args, &config)
        }
        Commands::Exec(args) => run_exec(args).await,
    }
}
