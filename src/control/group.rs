//! Partition group descriptors.

use crate::core::config::default_state_machine;
use crate::core::error::{LocalError, LocalResult};
use serde::{Deserialize, Serialize};

/// Unique key of a partition group.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PartitionGroupId {
    pub namespace: String,
    pub name: String,
}

impl PartitionGroupId {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl std::fmt::Display for PartitionGroupId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.namespace, self.name)
    }
}

/// Requested shape of a partition group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionGroupSpec {
    /// Number of partitions.
    pub partitions: u32,

    /// Endpoints per partition.
    pub partition_size: u32,

    /// State machine type every engine in the group runs.
    #[serde(default = "default_state_machine")]
    pub state_machine: String,
}

impl PartitionGroupSpec {
    pub fn new(partitions: u32, partition_size: u32) -> Self {
        Self {
            partitions,
            partition_size,
            state_machine: default_state_machine(),
        }
    }

    pub fn with_state_machine(mut self, state_machine: impl Into<String>) -> Self {
        self.state_machine = state_machine.into();
        self
    }

    /// Check that the group can be provisioned.
    pub fn validate(&self) -> LocalResult<()> {
        if self.partitions == 0 {
            return Err(LocalError::invalid_spec("partitions must be greater than 0"));
        }
        if self.partition_size == 0 {
            return Err(LocalError::invalid_spec(
                "partition_size must be greater than 0",
            ));
        }
        if self.state_machine.is_empty() {
            return Err(LocalError::invalid_spec("state_machine must not be empty"));
        }
        Ok(())
    }
}

/// Network location of one partition endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionEndpoint {
    pub host: String,
    pub port: u16,
}

impl PartitionEndpoint {
    /// `host:port`, bracketing IPv6 hosts.
    pub fn address(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    /// Check if a listener has been bound for this slot.
    pub fn is_bound(&self) -> bool {
        self.port != 0
    }
}

/// Descriptor of one partition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionInfo {
    /// 1-based partition id, stable for the group's lifetime.
    pub partition_id: u32,

    pub endpoints: Vec<PartitionEndpoint>,
}

impl PartitionInfo {
    /// Descriptor with `size` unbound endpoint slots.
    pub fn unbound(partition_id: u32, size: u32) -> Self {
        Self {
            partition_id,
            endpoints: vec![PartitionEndpoint::default(); size as usize],
        }
    }
}

/// Descriptor of a partition group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionGroup {
    pub id: PartitionGroupId,
    pub spec: PartitionGroupSpec,
    pub partitions: Vec<PartitionInfo>,
}

impl PartitionGroup {
    /// Look up a partition by id.
    pub fn partition(&self, partition_id: u32) -> Option<&PartitionInfo> {
        self.partitions
            .iter()
            .find(|p| p.partition_id == partition_id)
    }
}

/// Group listing filter. Unset or empty fields match every group.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupFilter {
    pub namespace: Option<String>,
    pub name: Option<String>,
}

impl GroupFilter {
    /// Match every group.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn namespace(namespace: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
            name: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn matches(&self, id: &PartitionGroupId) -> bool {
        field_matches(self.namespace.as_deref(), &id.namespace)
            && field_matches(self.name.as_deref(), &id.name)
    }
}

fn field_matches(filter: Option<&str>, value: &str) -> bool {
    match filter {
        None | Some("") => true,
        Some(expected) => expected == value,
    }
}
