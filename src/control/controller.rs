//! Partition group controller.
//!
//! Owns the process-wide registry of partition groups. Creating a group
//! binds one listener and starts one execution engine per partition
//! endpoint; deleting it stops them again. Mutations hold the registry's
//! write lock for the whole provisioning or teardown, listing holds the
//! read lock.

use super::group::{
    GroupFilter, PartitionEndpoint, PartitionGroup, PartitionGroupId, PartitionGroupSpec,
    PartitionInfo,
};
use crate::core::config::ControllerConfig;
use crate::core::error::{LocalError, LocalResult};
use crate::core::time::{Clock, SystemClock};
use crate::net::server::EndpointServer;
use crate::net::tcp::bind_skipping_held;
use crate::partition::engine::{EngineConfig, LocalPartition};
use crate::partition::state_machine::StateMachineRegistry;
use std::collections::{HashMap, HashSet};
use std::net::IpAddr;
use std::sync::Arc;
use tokio::sync::RwLock;

/// One endpoint of a running partition: its engine and listener.
struct EndpointReplica {
    engine: Arc<LocalPartition>,
    server: EndpointServer,
}

/// Running partition.
struct PartitionRuntime {
    info: PartitionInfo,
    replicas: Vec<EndpointReplica>,
}

impl PartitionRuntime {
    /// Stop every started endpoint. Safe after partial startup.
    async fn stop(&mut self) {
        for replica in self.replicas.drain(..) {
            replica.engine.shutdown().await;
            replica.server.shutdown().await;
        }
    }
}

/// Running group.
struct GroupEntry {
    spec: PartitionGroupSpec,
    partitions: Vec<PartitionRuntime>,
}

impl GroupEntry {
    fn descriptor(&self, id: &PartitionGroupId) -> PartitionGroup {
        PartitionGroup {
            id: id.clone(),
            spec: self.spec.clone(),
            partitions: self.partitions.iter().map(|p| p.info.clone()).collect(),
        }
    }

    async fn stop(&mut self) {
        for partition in &mut self.partitions {
            partition.stop().await;
        }
    }

    fn ports(&self) -> impl Iterator<Item = u16> + '_ {
        self.partitions
            .iter()
            .flat_map(|p| p.info.endpoints.iter())
            .filter(|e| e.is_bound())
            .map(|e| e.port)
    }
}

/// Where the next endpoint of a group starts probing.
///
/// Ports held by registered groups or bound earlier in the same create are
/// skipped without counting against the probe limit.
struct PortCursor {
    next: u16,
    held: HashSet<u16>,
}

impl PortCursor {
    fn record(&mut self, port: u16) {
        self.held.insert(port);
        if self.next != 0 {
            self.next = port.saturating_add(1);
        }
    }
}

/// Controller for partition group lifecycle.
pub struct PartitionGroupController {
    config: ControllerConfig,
    bind_ip: IpAddr,
    registry: Arc<StateMachineRegistry>,
    clock: Arc<dyn Clock>,
    groups: RwLock<HashMap<PartitionGroupId, GroupEntry>>,
}

impl PartitionGroupController {
    /// Create a controller with no groups.
    pub fn new(config: ControllerConfig, registry: Arc<StateMachineRegistry>) -> LocalResult<Self> {
        let bind_ip = config.bind_host.parse().map_err(|_| {
            LocalError::invalid_spec(format!(
                "bind host is not an IP address: {}",
                config.bind_host
            ))
        })?;
        Ok(Self {
            config,
            bind_ip,
            registry,
            clock: Arc::new(SystemClock),
            groups: RwLock::new(HashMap::new()),
        })
    }

    /// Use a different timestamp source for engines started from now on.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<StateMachineRegistry> {
        &self.registry
    }

    /// Create a partition group, or return the existing one under `id`.
    ///
    /// Either every partition starts and the group is registered, or every
    /// endpoint started by this call is stopped again and nothing is
    /// registered.
    pub async fn create_group(
        &self,
        id: PartitionGroupId,
        spec: PartitionGroupSpec,
    ) -> LocalResult<PartitionGroup> {
        let mut groups = self.groups.write().await;
        if let Some(existing) = groups.get(&id) {
            tracing::debug!(group = %id, "partition group already exists");
            return Ok(existing.descriptor(&id));
        }

        spec.validate()?;
        if !self.registry.contains(&spec.state_machine) {
            return Err(LocalError::invalid_spec(format!(
                "unknown state machine type: {}",
                spec.state_machine
            )));
        }

        let mut entry = GroupEntry {
            spec: spec.clone(),
            partitions: Vec::with_capacity(spec.partitions as usize),
        };
        let mut ports = PortCursor {
            next: self.config.base_port,
            held: groups.values().flat_map(|entry| entry.ports()).collect(),
        };
        for partition_id in 1..=spec.partitions {
            let mut runtime = PartitionRuntime {
                info: PartitionInfo::unbound(partition_id, spec.partition_size),
                replicas: Vec::with_capacity(spec.partition_size as usize),
            };
            if let Err(e) = self.start_partition(&id, &spec, &mut runtime, &mut ports).await {
                tracing::warn!(
                    group = %id,
                    partition = partition_id,
                    error = %e,
                    "partition failed to start, rolling back group"
                );
                runtime.stop().await;
                entry.stop().await;
                return Err(e);
            }
            entry.partitions.push(runtime);
        }

        let descriptor = entry.descriptor(&id);
        groups.insert(id.clone(), entry);
        tracing::info!(
            group = %id,
            partitions = spec.partitions,
            partition_size = spec.partition_size,
            state_machine = %spec.state_machine,
            "partition group created"
        );
        Ok(descriptor)
    }

    /// Bind and start every endpoint of one partition.
    ///
    /// Each endpoint continues probing past the port the previous endpoint
    /// of the group bound.
    async fn start_partition(
        &self,
        id: &PartitionGroupId,
        spec: &PartitionGroupSpec,
        runtime: &mut PartitionRuntime,
        ports: &mut PortCursor,
    ) -> LocalResult<()> {
        let partition_id = runtime.info.partition_id;

        for slot in 0..runtime.info.endpoints.len() {
            let listener = bind_skipping_held(
                self.bind_ip,
                ports.next,
                self.config.port_probe_limit,
                &ports.held,
            )
            .await?;
            let bound = listener.local_addr().map_err(|e| LocalError::Provisioning {
                addr: std::net::SocketAddr::new(self.bind_ip, ports.next),
                message: e.to_string(),
            })?;
            ports.record(bound.port());

            let endpoint = PartitionEndpoint {
                host: bound.ip().to_string(),
                port: bound.port(),
            };
            let machine = self.registry.build(&spec.state_machine)?;
            let engine_config = EngineConfig::new(
                format!("{}/{}/{}", id, partition_id, slot),
                partition_id,
                endpoint.address(),
            )
            .with_queue_capacity(self.config.queue_capacity)
            .with_clock(self.clock.clone());
            let engine = LocalPartition::start(engine_config, machine);

            let server = match EndpointServer::start(listener, engine.clone()) {
                Ok(server) => server,
                Err(e) => {
                    engine.shutdown().await;
                    return Err(e);
                }
            };

            tracing::debug!(
                group = %id,
                partition = partition_id,
                endpoint = slot,
                port = endpoint.port,
                "partition endpoint started"
            );
            runtime.info.endpoints[slot] = endpoint;
            runtime.replicas.push(EndpointReplica { engine, server });
        }
        Ok(())
    }

    /// Stop and remove a group. Unknown ids are ignored.
    ///
    /// Listener ports are released before this returns.
    pub async fn delete_group(&self, id: &PartitionGroupId) -> LocalResult<()> {
        let mut groups = self.groups.write().await;
        match groups.remove(id) {
            Some(mut entry) => {
                entry.stop().await;
                tracing::info!(group = %id, "partition group deleted");
            }
            None => tracing::debug!(group = %id, "delete of unknown partition group ignored"),
        }
        Ok(())
    }

    /// Snapshot of the groups matching `filter`, ordered by id.
    pub async fn list_groups(&self, filter: &GroupFilter) -> Vec<PartitionGroup> {
        let groups = self.groups.read().await;
        let mut listed: Vec<_> = groups
            .iter()
            .filter(|(id, _)| filter.matches(id))
            .map(|(id, entry)| entry.descriptor(id))
            .collect();
        listed.sort_by(|a, b| a.id.cmp(&b.id));
        listed
    }

    /// Look up one group.
    pub async fn get_group(&self, id: &PartitionGroupId) -> LocalResult<PartitionGroup> {
        let groups = self.groups.read().await;
        groups
            .get(id)
            .map(|entry| entry.descriptor(id))
            .ok_or_else(|| LocalError::GroupNotFound {
                group: id.to_string(),
            })
    }

    /// In-process handle to the engine behind one partition endpoint.
    pub async fn partition(
        &self,
        id: &PartitionGroupId,
        partition_id: u32,
        endpoint: usize,
    ) -> LocalResult<Arc<LocalPartition>> {
        let groups = self.groups.read().await;
        let entry = groups.get(id).ok_or_else(|| LocalError::GroupNotFound {
            group: id.to_string(),
        })?;
        entry
            .partitions
            .iter()
            .find(|p| p.info.partition_id == partition_id)
            .and_then(|p| p.replicas.get(endpoint))
            .map(|replica| replica.engine.clone())
            .ok_or_else(|| LocalError::PartitionNotFound {
                group: id.to_string(),
                partition_id,
                endpoint,
            })
    }

    /// Leader election has no meaning without replication.
    pub async fn enter_election(&self, id: &PartitionGroupId) -> LocalResult<()> {
        tracing::debug!(group = %id, "election requested in local mode");
        Err(LocalError::NotSupportedInLocalMode {
            operation: "EnterElection",
        })
    }

    /// Number of registered groups.
    pub async fn group_count(&self) -> usize {
        self.groups.read().await.len()
    }

    /// Stop and remove every group.
    pub async fn shutdown(&self) {
        let mut groups = self.groups.write().await;
        let count = groups.len();
        for (id, mut entry) in groups.drain() {
            entry.stop().await;
            tracing::debug!(group = %id, "partition group stopped");
        }
        if count > 0 {
            tracing::info!(groups = count, "controller stopped all partition groups");
        }
    }
}

impl std::fmt::Debug for PartitionGroupController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PartitionGroupController")
            .field("bind_ip", &self.bind_ip)
            .field("base_port", &self.config.base_port)
            .field("registry", &self.registry)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller() -> PartitionGroupController {
        let config = ControllerConfig {
            base_port: 0,
            ..ControllerConfig::default()
        };
        PartitionGroupController::new(config, Arc::new(StateMachineRegistry::with_builtins()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_and_delete() {
        let controller = controller();
        let id = PartitionGroupId::new("ns", "g");

        let group = controller
            .create_group(id.clone(), PartitionGroupSpec::new(2, 1))
            .await
            .unwrap();
        assert_eq!(group.partitions.len(), 2);
        assert_eq!(group.partitions[0].partition_id, 1);
        assert_eq!(group.partitions[1].partition_id, 2);
        assert!(group.partitions[0].endpoints[0].is_bound());

        controller.delete_group(&id).await.unwrap();
        assert_eq!(controller.group_count().await, 0);
    }

    #[tokio::test]
    async fn test_invalid_spec_registers_nothing() {
        let controller = controller();
        let id = PartitionGroupId::new("ns", "g");

        let err = controller
            .create_group(id.clone(), PartitionGroupSpec::new(0, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, LocalError::InvalidSpec { .. }));

        let err = controller
            .create_group(id, PartitionGroupSpec::new(1, 1).with_state_machine("missing"))
            .await
            .unwrap_err();
        assert!(matches!(err, LocalError::InvalidSpec { .. }));
        assert_eq!(controller.group_count().await, 0);
    }

    #[tokio::test]
    async fn test_partition_lookup() {
        let controller = controller();
        let id = PartitionGroupId::new("ns", "g");
        controller
            .create_group(id.clone(), PartitionGroupSpec::new(1, 2))
            .await
            .unwrap();

        let engine = controller.partition(&id, 1, 1).await.unwrap();
        assert_eq!(engine.partition_id(), 1);

        assert!(matches!(
            controller.partition(&id, 2, 0).await,
            Err(LocalError::PartitionNotFound { .. })
        ));
        assert!(matches!(
            controller.partition(&id, 1, 2).await,
            Err(LocalError::PartitionNotFound { .. })
        ));
        assert!(matches!(
            controller
                .partition(&PartitionGroupId::new("ns", "other"), 1, 0)
                .await,
            Err(LocalError::GroupNotFound { .. })
        ));

        controller.shutdown().await;
        assert!(engine.is_closed());
    }

    #[test]
    fn test_rejects_hostname_bind_host() {
        let config = ControllerConfig {
            bind_host: "localhost".to_string(),
            ..ControllerConfig::default()
        };
        let result =
            PartitionGroupController::new(config, Arc::new(StateMachineRegistry::with_builtins()));
        assert!(result.is_err());
    }
}
