//! Error types and status mapping.
//!
//! Every fallible operation of the controller and the execution engine
//! returns a [`LocalError`]. Errors are always synchronous return values;
//! failures raised by a state machine while applying a request travel
//! through the request's result sink instead.

use std::net::SocketAddr;
use thiserror::Error;

/// Common error conditions of the local protocol.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LocalError {
    /// A listener could not be bound for a reason other than the port being in use.
    #[error("provisioning failed for {addr}: {message}")]
    Provisioning { addr: SocketAddr, message: String },

    /// Port probing exhausted its attempt budget.
    #[error("no available port in {first_port}..={last_port} on {host}")]
    NoAvailablePort {
        host: String,
        first_port: u16,
        last_port: u16,
    },

    /// The engine queue is closed; the partition is shutting down or stopped.
    #[error("partition unavailable: {partition}")]
    PartitionUnavailable { partition: String },

    /// The operation has no meaning without real leadership.
    #[error("{operation} is not supported in local mode")]
    NotSupportedInLocalMode { operation: &'static str },

    /// The request deadline expired before the request was accepted.
    #[error("deadline exceeded before request was accepted by {partition}")]
    DeadlineExceeded { partition: String },

    /// No group is registered under the given identity.
    #[error("partition group {group} not found")]
    GroupNotFound { group: String },

    /// The group exists but the partition or endpoint does not.
    #[error("partition {partition_id} endpoint {endpoint} not found in {group}")]
    PartitionNotFound {
        group: String,
        partition_id: u32,
        endpoint: usize,
    },

    /// The group specification cannot be provisioned.
    #[error("invalid partition group spec: {message}")]
    InvalidSpec { message: String },

    /// A frame on an endpoint connection was malformed or unexpected.
    #[error("protocol error: {message}")]
    Protocol { message: String },

    /// Transport failure talking to an endpoint.
    #[error("transport error: {message}")]
    Transport { message: String },
}

/// Status codes an RPC layer reports for a [`LocalError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    InvalidArgument = 3,
    DeadlineExceeded = 4,
    NotFound = 5,
    ResourceExhausted = 8,
    Unimplemented = 12,
    Internal = 13,
    Unavailable = 14,
}

impl LocalError {
    /// Create a PartitionUnavailable error.
    pub fn unavailable(partition: impl Into<String>) -> Self {
        Self::PartitionUnavailable {
            partition: partition.into(),
        }
    }

    /// Create an InvalidSpec error.
    pub fn invalid_spec(message: impl Into<String>) -> Self {
        Self::InvalidSpec {
            message: message.into(),
        }
    }

    /// Create a Protocol error.
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Create a Transport error.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Map the error to the status an RPC layer would return.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Provisioning { .. } => StatusCode::Internal,
            Self::NoAvailablePort { .. } => StatusCode::ResourceExhausted,
            Self::PartitionUnavailable { .. } => StatusCode::Unavailable,
            Self::NotSupportedInLocalMode { .. } => StatusCode::Unimplemented,
            Self::DeadlineExceeded { .. } => StatusCode::DeadlineExceeded,
            Self::GroupNotFound { .. } | Self::PartitionNotFound { .. } => StatusCode::NotFound,
            Self::InvalidSpec { .. } => StatusCode::InvalidArgument,
            Self::Protocol { .. } => StatusCode::InvalidArgument,
            Self::Transport { .. } => StatusCode::Unavailable,
        }
    }

    /// Check if the caller may retry the operation unchanged.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            Self::DeadlineExceeded { .. } | Self::NoAvailablePort { .. } | Self::Transport { .. }
        )
    }
}

/// Result type using LocalError.
pub type LocalResult<T> = Result<T, LocalError>;
