//! Per-partition execution.
//!
//! - [`engine`] - Single-writer execution engine and the [`Partition`] trait
//! - [`request`] - Request kinds and submission context
//! - [`sink`] - Result delivery
//! - [`state_machine`] - State machine contract and registry
//! - [`builtin`] - Built-in state machines
//!
//! # Ordering
//!
//! Within one engine, requests are applied in the order they were accepted
//! into its queue. Commands advance the engine's index by exactly one and
//! stamp the wall-clock time; queries observe both without changing them.
//! Engines are independent of each other.

pub mod builtin;
pub mod engine;
pub mod request;
pub mod sink;
pub mod state_machine;

pub use engine::{EngineConfig, EngineMetrics, LocalPartition, Partition};
pub use request::{OperationType, Request, RequestContext};
pub use sink::{OutputError, ResultSink, ResultStream, SinkEvent};
pub use state_machine::{ApplyContext, StateMachine, StateMachineRegistry, LOCAL_NODE};
