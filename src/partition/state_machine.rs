//! State machine contract and registry.
//!
//! The primitive logic applied to commands and queries lives outside this
//! crate. Engines only need a [`StateMachine`] instance per partition
//! endpoint, built from a named factory in the [`StateMachineRegistry`].

use super::request::OperationType;
use super::sink::ResultSink;
use crate::core::error::{LocalError, LocalResult};
use crate::core::time::LogicalClock;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::SystemTime;

/// Node identity reported to state machines in local mode.
pub const LOCAL_NODE: &str = "local";

/// Read-only view of the engine handed to a state machine while it applies a request.
#[derive(Debug, Clone, Copy)]
pub struct ApplyContext {
    clock: LogicalClock,
    operation: OperationType,
}

impl ApplyContext {
    pub(crate) fn new(clock: LogicalClock, operation: OperationType) -> Self {
        Self { clock, operation }
    }

    /// Node identity.
    pub fn node(&self) -> &'static str {
        LOCAL_NODE
    }

    /// Index of the most recently applied command.
    pub fn index(&self) -> u64 {
        self.clock.index()
    }

    /// Timestamp of the most recently applied command.
    pub fn timestamp(&self) -> SystemTime {
        self.clock.timestamp()
    }

    /// Kind of operation being applied.
    pub fn operation_type(&self) -> OperationType {
        self.operation
    }
}

/// Primitive logic driven by an execution engine.
///
/// Both methods run on the engine's worker, one request at a time. Output
/// and application errors go through `sink`.
pub trait StateMachine: Send + 'static {
    /// Apply a command.
    fn command(&mut self, ctx: &ApplyContext, input: Bytes, sink: ResultSink);

    /// Apply a query.
    fn query(&self, ctx: &ApplyContext, input: Bytes, sink: ResultSink);
}

/// Factory producing a fresh state machine for one engine.
pub type StateMachineFactory = Arc<dyn Fn() -> Box<dyn StateMachine> + Send + Sync>;

/// Registry of known state machine types.
#[derive(Clone, Default)]
pub struct StateMachineRegistry {
    factories: HashMap<String, StateMachineFactory>,
}

impl StateMachineRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding the built-in machines.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        super::builtin::register_builtins(&mut registry);
        registry
    }

    /// Register a factory under a type name, replacing any previous one.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> Box<dyn StateMachine> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Arc::new(factory));
    }

    /// Check if a type name is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered type names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }

    /// Build a new instance of the named type.
    pub fn build(&self, name: &str) -> LocalResult<Box<dyn StateMachine>> {
        self.factories
            .get(name)
            .map(|factory| factory())
            .ok_or_else(|| LocalError::invalid_spec(format!("unknown state machine type: {}", name)))
    }
}

impl std::fmt::Debug for StateMachineRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateMachineRegistry")
            .field("types", &self.names())
            .finish()
    }
}
