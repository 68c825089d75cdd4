//! Lattice Local - single-process partition groups.
//!
//! A local, non-replicated substitute for a partitioned, replicated
//! state-machine protocol. Application code written against the partition
//! client contract runs unchanged against in-process engines: commands and
//! queries are applied in order per partition, and partition groups can be
//! created and deleted at runtime. There is no leader election, no log
//! replication and no persistence.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                  PartitionGroupController                       │
//! │        create / delete / list groups, provision endpoints       │
//! └─────────────────────────────────────────────────────────────────┘
//!                                  │  one per partition endpoint
//! ┌────────────────────────────┐      ┌────────────────────────────┐
//! │       EndpointServer       │ ───▶ │       LocalPartition       │
//! │   loopback TCP listener    │      │  bounded queue + worker    │
//! └────────────────────────────┘      └────────────────────────────┘
//!                                                   │
//!                                     ┌────────────────────────────┐
//!                                     │        StateMachine        │
//!                                     │  index │ timestamp │ sink  │
//!                                     └────────────────────────────┘
//! ```
//!
//! # Module Organization
//!
//! ## Core
//! - [`core::config`] - Configuration parsing and validation
//! - [`core::runtime`] - Runtime orchestration
//! - [`core::time`] - Logical clock and time sources
//! - [`core::error`] - Error types and status mapping
//!
//! ## Control
//! - [`control::group`] - Partition group descriptors
//! - [`control::controller`] - Partition group lifecycle
//!
//! ## Partition
//! - [`partition::engine`] - Execution engine and the `Partition` trait
//! - [`partition::state_machine`] - State machine contract and registry
//! - [`partition::sink`] - Result delivery
//!
//! ## Networking
//! - [`net::tcp`] - Port probing and listener bookkeeping
//! - [`net::codec`] - Endpoint frame protocol
//! - [`net::server`] - Endpoint server
//! - [`net::client`] - Endpoint client
//!
//! ## CLI
//! - [`cli::commands`] - CLI command implementations

// Core infrastructure
pub mod core;

// Partition group management
pub mod control;

// Execution engines
pub mod partition;

// Networking
pub mod net;

// CLI
pub mod cli;

// Re-exports for convenience
pub use self::core::{config, error, runtime, time};
pub use control::{
    GroupFilter, PartitionEndpoint, PartitionGroup, PartitionGroupController, PartitionGroupId,
    PartitionGroupSpec, PartitionInfo,
};
pub use error::{LocalError, LocalResult};
pub use net::EndpointClient;
pub use partition::{
    ApplyContext, LocalPartition, OperationType, Partition, RequestContext, ResultSink,
    ResultStream, StateMachine, StateMachineRegistry,
};
