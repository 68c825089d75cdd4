//! Partition group management.
//!
//! - [`group`] - Group identity, spec and descriptors
//! - [`controller`] - Group lifecycle and endpoint provisioning
//!
//! # Provisioning
//!
//! A group of `partitions × partition_size` endpoints is created
//! atomically: every endpoint gets a bound listener and a running engine,
//! or the call fails and releases whatever it had started.

pub mod controller;
pub mod group;

pub use controller::PartitionGroupController;
pub use group::{
    GroupFilter, PartitionEndpoint, PartitionGroup, PartitionGroupId, PartitionGroupSpec,
    PartitionInfo,
};
