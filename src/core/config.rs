//! Configuration parsing and validation.
//!
//! Configuration is loaded from a TOML file with CLI overrides. Every
//! section has defaults, so an empty file is a valid configuration.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::net::IpAddr;
use std::path::Path;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Partition-group controller configuration.
    #[serde(default)]
    pub controller: ControllerConfig,

    /// Telemetry configuration.
    #[serde(default)]
    pub telemetry: TelemetryConfig,

    /// Groups created when the runtime starts.
    #[serde(default)]
    pub groups: Vec<BootstrapGroup>,
}

/// Controller and endpoint provisioning configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Host every endpoint listener binds to.
    #[serde(default = "default_bind_host")]
    pub bind_host: String,

    /// First port probed for each partition. 0 lets the OS pick.
    #[serde(default = "default_base_port")]
    pub base_port: u16,

    /// Bind attempts per endpoint before giving up.
    #[serde(default = "default_port_probe_limit")]
    pub port_probe_limit: u16,

    /// Capacity of each engine's request queue.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            bind_host: default_bind_host(),
            base_port: default_base_port(),
            port_probe_limit: default_port_probe_limit(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

impl ControllerConfig {
    /// Parse the bind host.
    pub fn bind_ip(&self) -> Result<IpAddr> {
        self.bind_host
            .parse()
            .with_context(|| format!("controller.bind_host is not an IP address: {}", self.bind_host))
    }

    /// Validate the controller section.
    pub fn validate(&self) -> Result<()> {
        self.bind_ip()?;
        if self.port_probe_limit == 0 {
            anyhow::bail!("controller.port_probe_limit must be > 0");
        }
        if self.queue_capacity == 0 {
            anyhow::bail!("controller.queue_capacity must be > 0");
        }
        Ok(())
    }
}

/// Telemetry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

/// Partition group created at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BootstrapGroup {
    #[serde(default = "default_namespace")]
    pub namespace: String,
    pub name: String,
    pub partitions: u32,
    #[serde(default = "default_partition_size")]
    pub partition_size: u32,
    #[serde(default = "default_state_machine")]
    pub state_machine: String,
}

fn default_bind_host() -> String {
    "127.0.0.1".to_string()
}

fn default_base_port() -> u16 {
    5680
}

fn default_port_probe_limit() -> u16 {
    100
}

fn default_queue_capacity() -> usize {
    1024
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_namespace() -> String {
    "default".to_string()
}

fn default_partition_size() -> u32 {
    1
}

pub(crate) fn default_state_machine() -> String {
    "echo".to_string()
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        Self::from_toml(&content)
    }

    /// Load configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).with_context(|| "failed to parse config")?;
        config.validate()?;
        Ok(config)
    }

    /// Apply CLI overrides to the configuration.
    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(ref log_level) = overrides.log_level {
            self.telemetry.log_level = log_level.clone();
        }
        if let Some(base_port) = overrides.base_port {
            self.controller.base_port = base_port;
        }
    }

    /// Validate configuration consistency.
    pub fn validate(&self) -> Result<()> {
        self.controller.validate()?;
        self.validate_telemetry()?;
        self.validate_groups()?;
        Ok(())
    }

    fn validate_telemetry(&self) -> Result<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.telemetry.log_level.as_str()) {
            anyhow::bail!(
                "telemetry.log_level must be one of {:?}, got: {}",
                valid_levels,
                self.telemetry.log_level
            );
        }
        Ok(())
    }

    fn validate_groups(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for group in &self.groups {
            if group.name.is_empty() {
                anyhow::bail!("groups.name must not be empty");
            }
            if group.partitions == 0 {
                anyhow::bail!("group {}:{} must have partitions > 0", group.namespace, group.name);
            }
            if group.partition_size == 0 {
                anyhow::bail!(
                    "group {}:{} must have partition_size > 0",
                    group.namespace,
                    group.name
                );
            }
            if !seen.insert((group.namespace.as_str(), group.name.as_str())) {
                anyhow::bail!("group {}:{} is declared twice", group.namespace, group.name);
            }
        }
        Ok(())
    }
}

/// CLI override options that can be applied to configuration.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// Override log level.
    pub log_level: Option<String>,
    /// Override the controller base port.
    pub base_port: Option<u16>,
}
