//! Common test utilities.
//!
//! This module contains shared helpers for integration tests.
//! Import with `mod common;` in test files.

#![allow(dead_code)]

use bytes::Bytes;
use lattice_local::config::ControllerConfig;
use lattice_local::partition::state_machine::{ApplyContext, StateMachine};
use lattice_local::{OperationType, PartitionGroupController, ResultSink, StateMachineRegistry};
use parking_lot::Mutex;
use std::io::Write;
use std::sync::Arc;
use tempfile::NamedTempFile;

/// Write a configuration file.
pub fn create_config(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("Failed to create temp file");
    file.write_all(content.as_bytes())
        .expect("Failed to write config");
    file
}

/// Controller config binding OS-assigned ports.
pub fn ephemeral_config() -> ControllerConfig {
    ControllerConfig {
        base_port: 0,
        ..ControllerConfig::default()
    }
}

/// Controller using ephemeral ports and the built-in machines.
pub fn controller() -> PartitionGroupController {
    controller_with(ephemeral_config())
}

pub fn controller_with(config: ControllerConfig) -> PartitionGroupController {
    PartitionGroupController::new(config, Arc::new(StateMachineRegistry::with_builtins()))
        .expect("valid controller config")
}

/// Port that was free a moment ago.
pub fn free_port() -> u16 {
    std::net::TcpListener::bind("127.0.0.1:0")
        .and_then(|l| l.local_addr())
        .map(|addr| addr.port())
        .expect("ephemeral bind")
}

/// Check that nothing is listening on a loopback port.
pub fn port_is_free(port: u16) -> bool {
    std::net::TcpListener::bind(("127.0.0.1", port)).is_ok()
}

/// One request as seen by a state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Applied {
    pub op: OperationType,
    pub index: u64,
    pub timestamp_ms: u64,
    pub input: Bytes,
}

/// Shared record of applied requests, in apply order.
pub type ApplyLog = Arc<Mutex<Vec<Applied>>>;

/// Records every request and replies with the index it observed.
pub struct RecordingStateMachine {
    pub log: ApplyLog,
}

impl RecordingStateMachine {
    fn record(&self, ctx: &ApplyContext, input: Bytes, sink: ResultSink) {
        let timestamp_ms = ctx
            .timestamp()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        self.log.lock().push(Applied {
            op: ctx.operation_type(),
            index: ctx.index(),
            timestamp_ms,
            input,
        });
        sink.reply(Bytes::copy_from_slice(&ctx.index().to_be_bytes()));
    }
}

impl StateMachine for RecordingStateMachine {
    fn command(&mut self, ctx: &ApplyContext, input: Bytes, sink: ResultSink) {
        self.record(ctx, input, sink);
    }

    fn query(&self, ctx: &ApplyContext, input: Bytes, sink: ResultSink) {
        self.record(ctx, input, sink);
    }
}

/// Decode the index a recording machine replied with.
pub fn decode_index(output: &[u8]) -> u64 {
    let raw: [u8; 8] = output.try_into().expect("8-byte index reply");
    u64::from_be_bytes(raw)
}
