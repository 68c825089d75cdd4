//! Main runtime orchestration.
//!
//! The runtime owns the partition group controller for the life of the
//! process:
//! - Start: build the controller, create the bootstrap groups
//! - Shutdown: stop every group, releasing engines and listeners

use crate::control::controller::PartitionGroupController;
use crate::control::group::{PartitionGroupId, PartitionGroupSpec};
use crate::core::config::Config;
use crate::partition::state_machine::StateMachineRegistry;
use anyhow::{Context, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

/// Runtime health status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentHealth {
    /// Not started, or starting.
    Starting,
    /// Controller running and bootstrap groups provisioned.
    Healthy,
    /// Startup failed.
    Failed,
    /// Stopping groups.
    Stopping,
    /// All groups stopped.
    Stopped,
}

/// Local runtime holding the controller.
pub struct Runtime {
    config: Arc<Config>,
    registry: Arc<StateMachineRegistry>,
    controller: Option<Arc<PartitionGroupController>>,
    health: ComponentHealth,
    running: Arc<AtomicBool>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl Runtime {
    /// Create a runtime with the built-in state machines.
    pub fn new(config: Config) -> Result<Self> {
        Self::with_registry(config, StateMachineRegistry::with_builtins())
    }

    /// Create a runtime with a custom state machine registry.
    pub fn with_registry(config: Config, registry: StateMachineRegistry) -> Result<Self> {
        config.validate().context("invalid configuration")?;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Ok(Self {
            config: Arc::new(config),
            registry: Arc::new(registry),
            controller: None,
            health: ComponentHealth::Starting,
            running: Arc::new(AtomicBool::new(false)),
            shutdown_tx,
            shutdown_rx,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn health(&self) -> ComponentHealth {
        self.health
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Controller, once started.
    pub fn controller(&self) -> Option<&Arc<PartitionGroupController>> {
        self.controller.as_ref()
    }

    /// Get a shutdown receiver for graceful shutdown coordination.
    pub fn shutdown_receiver(&self) -> watch::Receiver<bool> {
        self.shutdown_rx.clone()
    }

    /// Start the controller and create the bootstrap groups.
    pub async fn start(&mut self) -> Result<()> {
        let controller = PartitionGroupController::new(
            self.config.controller.clone(),
            self.registry.clone(),
        )
        .context("failed to create partition group controller")?;
        let controller = Arc::new(controller);

        tracing::info!(
            bind_host = %self.config.controller.bind_host,
            base_port = self.config.controller.base_port,
            state_machines = ?self.registry.names(),
            "starting local runtime"
        );

        for group in &self.config.groups {
            let id = PartitionGroupId::new(&group.namespace, &group.name);
            let spec = PartitionGroupSpec::new(group.partitions, group.partition_size)
                .with_state_machine(&group.state_machine);
            let created = controller.create_group(id.clone(), spec).await;
            match created {
                Ok(descriptor) => {
                    for partition in &descriptor.partitions {
                        let ports: Vec<u16> =
                            partition.endpoints.iter().map(|e| e.port).collect();
                        tracing::info!(
                            group = %id,
                            partition = partition.partition_id,
                            ports = ?ports,
                            "bootstrap partition ready"
                        );
                    }
                }
                Err(e) => {
                    self.health = ComponentHealth::Failed;
                    controller.shutdown().await;
                    return Err(e).with_context(|| format!("failed to create group {}", id));
                }
            }
        }

        self.controller = Some(controller);
        self.health = ComponentHealth::Healthy;
        self.running.store(true, Ordering::Release);
        tracing::info!(groups = self.config.groups.len(), "local runtime started");
        Ok(())
    }

    /// Trigger graceful shutdown.
    pub fn shutdown(&self) {
        tracing::info!("shutdown requested");
        let _ = self.shutdown_tx.send(true);
    }

    /// Wait for the shutdown signal.
    pub async fn wait_for_shutdown(&self) {
        let mut rx = self.shutdown_rx.clone();
        while !*rx.borrow() {
            if rx.changed().await.is_err() {
                break;
            }
        }
    }

    /// Run until Ctrl-C or an explicit shutdown, then stop.
    pub async fn run(&mut self) -> Result<()> {
        self.start().await?;

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::warn!("shutdown signal received (SIGINT)");
            }
            _ = self.wait_for_shutdown() => {
                tracing::info!("shutdown requested by component");
            }
        }

        self.stop().await
    }

    /// Stop every partition group.
    pub async fn stop(&mut self) -> Result<()> {
        tracing::info!("stopping local runtime");
        self.running.store(false, Ordering::Release);
        let _ = self.shutdown_tx.send(true);

        self.health = ComponentHealth::Stopping;
        if let Some(controller) = self.controller.take() {
            controller.shutdown().await;
        }
        self.health = ComponentHealth::Stopped;

        tracing::info!("local runtime stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::group::GroupFilter;
    use crate::core::config::BootstrapGroup;

    fn config_with_group() -> Config {
        let mut config = Config::default();
        config.controller.base_port = 0;
        config.groups.push(BootstrapGroup {
            namespace: "default".to_string(),
            name: "boot".to_string(),
            partitions: 2,
            partition_size: 1,
            state_machine: "counter".to_string(),
        });
        config
    }

    #[tokio::test]
    async fn test_start_creates_bootstrap_groups() {
        let mut runtime = Runtime::new(config_with_group()).unwrap();
        assert_eq!(runtime.health(), ComponentHealth::Starting);

        runtime.start().await.unwrap();
        assert!(runtime.is_running());
        assert_eq!(runtime.health(), ComponentHealth::Healthy);

        let controller = runtime.controller().unwrap().clone();
        let groups = controller.list_groups(&GroupFilter::all()).await;
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].partitions.len(), 2);

        runtime.stop().await.unwrap();
        assert!(!runtime.is_running());
        assert_eq!(runtime.health(), ComponentHealth::Stopped);
        assert_eq!(controller.group_count().await, 0);
    }

    #[tokio::test]
    async fn test_unknown_state_machine_fails_start() {
        let mut config = config_with_group();
        config.groups[0].state_machine = "missing".to_string();

        let mut runtime = Runtime::new(config).unwrap();
        assert!(runtime.start().await.is_err());
        assert_eq!(runtime.health(), ComponentHealth::Failed);
        assert!(runtime.controller().is_none());
    }

    #[tokio::test]
    async fn test_shutdown_signal() {
        let runtime = Runtime::new(Config::default()).unwrap();
        let mut rx = runtime.shutdown_receiver();
        runtime.shutdown();
        rx.changed().await.unwrap();
        assert!(*rx.borrow());
        runtime.wait_for_shutdown().await;
    }
}
