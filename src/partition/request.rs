//! Requests submitted to an execution engine.

use super::sink::ResultSink;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;

/// Kind of operation carried by a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationType {
    /// Mutating operation; advances the logical clock.
    Command,
    /// Read-only operation; observes the logical clock.
    Query,
}

impl OperationType {
    /// Wire tag for the operation.
    pub fn as_u8(self) -> u8 {
        match self {
            Self::Command => 1,
            Self::Query => 2,
        }
    }

    /// Parse a wire tag.
    pub fn from_u8(tag: u8) -> Option<Self> {
        match tag {
            1 => Some(Self::Command),
            2 => Some(Self::Query),
            _ => None,
        }
    }
}

impl std::fmt::Display for OperationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Command => write!(f, "command"),
            Self::Query => write!(f, "query"),
        }
    }
}

/// Per-call context for request submission.
///
/// The deadline bounds how long a caller waits for its request to be
/// accepted into the engine queue. It does not apply once accepted.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestContext {
    deadline: Option<Instant>,
}

impl RequestContext {
    /// A context without a deadline.
    pub fn background() -> Self {
        Self { deadline: None }
    }

    /// A context expiring after the given duration.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            deadline: Some(Instant::now() + timeout),
        }
    }

    /// A context expiring at the given instant.
    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            deadline: Some(deadline),
        }
    }

    /// The submission deadline, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Check if the deadline has already passed.
    pub fn is_expired(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }
}

/// A command or query waiting in an engine queue.
#[derive(Debug)]
pub struct Request {
    pub op: OperationType,
    pub input: Bytes,
    pub sink: ResultSink,
}

impl Request {
    pub fn new(op: OperationType, input: Bytes, sink: ResultSink) -> Self {
        Self { op, input, sink }
    }
}
