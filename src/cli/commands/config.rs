//! Config command implementation.

use crate::core::config::{Config, ConfigOverrides};
use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use std::path::Path;

/// Configuration operations.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Validate the configuration.
    Validate,
    /// Print the effective configuration with defaults and overrides applied.
    Show,
}

/// Load the configuration file, or defaults when no path is given, then
/// apply CLI overrides and validate the result.
pub fn load_config(path: Option<&Path>, overrides: &ConfigOverrides) -> Result<Config> {
    let mut config = match path {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => Config::default(),
    };
    config.apply_overrides(overrides);
    config.validate().context("invalid configuration")?;
    Ok(config)
}

/// Run the config command against an already loaded configuration.
pub fn run_config(args: ConfigArgs, config: &Config) -> Result<()> {
    match args.command {
        ConfigCommand::Validate => {
            println!(
                "configuration is valid: {} bootstrap group(s), base port {}",
                config.groups.len(),
                config.controller.base_port
            );
            Ok(())
        }
        ConfigCommand::Show => {
            let rendered = toml::to_string_pretty(config).context("failed to render config")?;
            println!("{}", rendered);
            Ok(())
        }
    }
}
