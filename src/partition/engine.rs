//! Single-writer execution engine.
//!
//! Each partition endpoint runs one [`ApplyLoop`] on its own task. Callers
//! enqueue requests into a bounded FIFO and the loop applies them one at a
//! time, so requests are applied in exactly the order they were accepted
//! and never concurrently. Only the loop touches the state machine and the
//! logical clock.

use super::request::{OperationType, Request, RequestContext};
use super::sink::ResultSink;
use super::state_machine::{ApplyContext, StateMachine};
use crate::core::error::{LocalError, LocalResult};
use crate::core::time::{Clock, LogicalClock, SystemClock};
use bytes::Bytes;
use parking_lot::Mutex;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

/// Capability set shared by every partition client implementation.
///
/// Local mode has no leadership: every endpoint reports itself as the
/// current leader and any endpoint may serve a request.
pub trait Partition: Send + Sync {
    /// Submit a command. Resolves once the request is accepted, not applied.
    fn execute_command(
        &self,
        ctx: RequestContext,
        input: Bytes,
        sink: ResultSink,
    ) -> impl Future<Output = LocalResult<()>> + Send;

    /// Submit a query. Resolves once the request is accepted, not applied.
    fn execute_query(
        &self,
        ctx: RequestContext,
        input: Bytes,
        sink: ResultSink,
    ) -> impl Future<Output = LocalResult<()>> + Send;

    /// Address of the current leader.
    fn leader(&self) -> String;

    /// Whether this member is the leader.
    fn is_leader(&self) -> bool;

    /// Whether requests must be routed to the leader.
    fn must_leader(&self) -> bool;
}

/// Engine construction parameters.
#[derive(Clone)]
pub struct EngineConfig {
    /// Display name used in logs and errors.
    pub name: String,
    /// Partition this engine serves.
    pub partition_id: u32,
    /// Address reported by `leader()`.
    pub address: String,
    /// Request queue capacity.
    pub queue_capacity: usize,
    /// Source of command timestamps.
    pub clock: Arc<dyn Clock>,
}

impl EngineConfig {
    pub fn new(name: impl Into<String>, partition_id: u32, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            partition_id,
            address: address.into(),
            queue_capacity: 1024,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

/// Counters updated by the apply loop.
#[derive(Debug, Default)]
pub struct EngineStats {
    commands_applied: AtomicU64,
    queries_applied: AtomicU64,
    last_index: AtomicU64,
    requests_accepted: AtomicU64,
    requests_rejected: AtomicU64,
}

/// Point-in-time copy of engine counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineMetrics {
    pub commands_applied: u64,
    pub queries_applied: u64,
    pub last_index: u64,
    pub requests_accepted: u64,
    pub requests_rejected: u64,
}

impl EngineStats {
    fn snapshot(&self) -> EngineMetrics {
        EngineMetrics {
            commands_applied: self.commands_applied.load(Ordering::Relaxed),
            queries_applied: self.queries_applied.load(Ordering::Relaxed),
            last_index: self.last_index.load(Ordering::Acquire),
            requests_accepted: self.requests_accepted.load(Ordering::Relaxed),
            requests_rejected: self.requests_rejected.load(Ordering::Relaxed),
        }
    }
}

/// Worker-owned state: the state machine and its logical clock.
pub struct ApplyLoop {
    machine: Box<dyn StateMachine>,
    clock: LogicalClock,
    clock_source: Arc<dyn Clock>,
    stats: Arc<EngineStats>,
}

impl ApplyLoop {
    fn new(machine: Box<dyn StateMachine>, clock_source: Arc<dyn Clock>, stats: Arc<EngineStats>) -> Self {
        Self {
            machine,
            clock: LogicalClock::new(),
            clock_source,
            stats,
        }
    }

    /// Apply one request.
    fn apply(&mut self, request: Request) {
        match request.op {
            OperationType::Command => {
                let index = self.clock.advance(self.clock_source.now());
                self.stats.last_index.store(index, Ordering::Release);
                let ctx = ApplyContext::new(self.clock, OperationType::Command);
                self.machine.command(&ctx, request.input, request.sink);
                self.stats.commands_applied.fetch_add(1, Ordering::Relaxed);
            }
            OperationType::Query => {
                let ctx = ApplyContext::new(self.clock, OperationType::Query);
                self.machine.query(&ctx, request.input, request.sink);
                self.stats.queries_applied.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Consume requests until shutdown, then drain what was already accepted.
    async fn run(
        mut self,
        name: String,
        mut rx: mpsc::Receiver<Request>,
        mut shutdown_rx: watch::Receiver<bool>,
    ) {
        tracing::debug!(engine = %name, "apply loop started");
        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.changed() => break,
                request = rx.recv() => match request {
                    Some(request) => self.apply(request),
                    None => break,
                },
            }
        }

        rx.close();
        let mut drained = 0u64;
        while let Some(request) = rx.recv().await {
            self.apply(request);
            drained += 1;
        }
        tracing::debug!(
            engine = %name,
            index = self.clock.index(),
            drained,
            "apply loop stopped"
        );
    }
}

/// Local execution engine for one partition endpoint.
pub struct LocalPartition {
    name: String,
    partition_id: u32,
    address: String,
    queue_capacity: usize,
    tx: mpsc::Sender<Request>,
    closed: AtomicBool,
    shutdown_tx: watch::Sender<bool>,
    stats: Arc<EngineStats>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl LocalPartition {
    /// Start an engine around a state machine. Must be called within a tokio runtime.
    pub fn start(config: EngineConfig, machine: Box<dyn StateMachine>) -> Arc<Self> {
        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let stats = Arc::new(EngineStats::default());

        let apply_loop = ApplyLoop::new(machine, config.clock.clone(), stats.clone());
        let worker = tokio::spawn(apply_loop.run(config.name.clone(), rx, shutdown_rx));

        Arc::new(Self {
            name: config.name,
            partition_id: config.partition_id,
            address: config.address,
            queue_capacity: config.queue_capacity.max(1),
            tx,
            closed: AtomicBool::new(false),
            shutdown_tx,
            stats,
            worker: Mutex::new(Some(worker)),
        })
    }

    /// Engine name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Partition served by this engine.
    pub fn partition_id(&self) -> u32 {
        self.partition_id
    }

    /// Endpoint address.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Request queue capacity.
    pub fn queue_capacity(&self) -> usize {
        self.queue_capacity
    }

    /// Check if shutdown has begun.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Current counters.
    pub fn metrics(&self) -> EngineMetrics {
        self.stats.snapshot()
    }

    /// Enqueue a request, waiting for queue space until the context deadline.
    pub async fn submit(
        &self,
        ctx: RequestContext,
        op: OperationType,
        input: Bytes,
        sink: ResultSink,
    ) -> LocalResult<()> {
        if self.is_closed() {
            return Err(self.reject());
        }
        if ctx.is_expired() {
            return Err(LocalError::DeadlineExceeded {
                partition: self.name.clone(),
            });
        }

        let send = self.tx.send(Request::new(op, input, sink));
        let sent = match ctx.deadline() {
            Some(deadline) => match tokio::time::timeout_at(deadline, send).await {
                Ok(sent) => sent,
                Err(_) => {
                    return Err(LocalError::DeadlineExceeded {
                        partition: self.name.clone(),
                    })
                }
            },
            None => send.await,
        };

        match sent {
            Ok(()) => {
                self.stats.requests_accepted.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(_) => Err(self.reject()),
        }
    }

    fn reject(&self) -> LocalError {
        self.stats.requests_rejected.fetch_add(1, Ordering::Relaxed);
        LocalError::unavailable(self.name.clone())
    }

    /// Begin shutdown: close the queue. Accepted requests are still applied.
    pub fn stop(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            tracing::debug!(engine = %self.name, "stopping engine");
            let _ = self.shutdown_tx.send(true);
        }
    }

    /// Stop and wait for the worker to finish draining.
    pub async fn shutdown(&self) {
        self.stop();
        let worker = self.worker.lock().take();
        if let Some(worker) = worker {
            if let Err(e) = worker.await {
                tracing::warn!(engine = %self.name, error = %e, "apply loop task failed");
            }
        }
    }
}

impl Partition for LocalPartition {
    fn execute_command(
        &self,
        ctx: RequestContext,
        input: Bytes,
        sink: ResultSink,
    ) -> impl Future<Output = LocalResult<()>> + Send {
        self.submit(ctx, OperationType::Command, input, sink)
    }

    fn execute_query(
        &self,
        ctx: RequestContext,
        input: Bytes,
        sink: ResultSink,
    ) -> impl Future<Output = LocalResult<()>> + Send {
        self.submit(ctx, OperationType::Query, input, sink)
    }

    fn leader(&self) -> String {
        self.address.clone()
    }

    fn is_leader(&self) -> bool {
        true
    }

    fn must_leader(&self) -> bool {
        false
    }
}

impl Drop for LocalPartition {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for LocalPartition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalPartition")
            .field("name", &self.name)
            .field("address", &self.address)
            .field("closed", &self.is_closed())
            .finish()
    }
}
