//! TCP listener plumbing for partition endpoints.
//!
//! Endpoints bind on the configured host starting at a base port and probe
//! upward while the port is taken. Only `AddrInUse` moves the probe forward;
//! any other bind failure is reported immediately.

use crate::core::error::{LocalError, LocalResult};
use parking_lot::RwLock;
use std::collections::HashSet;
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::net::TcpListener as TokioTcpListener;

/// Bind a listener at `start_port` or the first free port above it.
///
/// At most `probe_limit` ports are tried. A `start_port` of 0 binds an
/// OS-assigned ephemeral port without probing.
pub async fn bind_with_probe(
    ip: IpAddr,
    start_port: u16,
    probe_limit: u16,
) -> LocalResult<TokioTcpListener> {
    bind_skipping_held(ip, start_port, probe_limit, &HashSet::new()).await
}

/// Like [`bind_with_probe`], but ports in `held` are passed over without
/// trying them and without counting against `probe_limit`.
pub async fn bind_skipping_held(
    ip: IpAddr,
    start_port: u16,
    probe_limit: u16,
    held: &HashSet<u16>,
) -> LocalResult<TokioTcpListener> {
    if start_port == 0 {
        let addr = SocketAddr::new(ip, 0);
        return TokioTcpListener::bind(addr)
            .await
            .map_err(|e| provisioning(addr, &e));
    }

    let limit = probe_limit.max(1);
    let mut attempts = 0u16;
    let mut first_tried = None;
    let mut last_tried = start_port;
    let mut next = Some(start_port);

    while let Some(port) = next {
        if attempts >= limit {
            break;
        }
        next = port.checked_add(1);
        if held.contains(&port) {
            continue;
        }

        attempts += 1;
        first_tried.get_or_insert(port);
        last_tried = port;
        let addr = SocketAddr::new(ip, port);
        match TokioTcpListener::bind(addr).await {
            Ok(listener) => return Ok(listener),
            Err(e) if e.kind() == io::ErrorKind::AddrInUse => {
                tracing::debug!(port, "port in use, probing next");
            }
            Err(e) => return Err(provisioning(addr, &e)),
        }
    }

    Err(LocalError::NoAvailablePort {
        host: ip.to_string(),
        first_port: first_tried.unwrap_or(start_port),
        last_port: last_tried,
    })
}

fn provisioning(addr: SocketAddr, error: &io::Error) -> LocalError {
    LocalError::Provisioning {
        addr,
        message: error.to_string(),
    }
}

/// Endpoint listener lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerState {
    /// Accepting connections.
    Listening,
    /// Stop requested, accept loop winding down.
    ShuttingDown,
    /// Accept loop exited and the socket is released.
    Stopped,
}

/// Connection identifier, unique per listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(pub u64);

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Endpoint listener counters.
#[derive(Debug, Default)]
pub struct ListenerMetrics {
    connections_total: AtomicU64,
    connections_active: AtomicU64,
    requests_served: AtomicU64,
    protocol_errors: AtomicU64,
}

impl ListenerMetrics {
    pub fn connection_accepted(&self) -> ConnectionId {
        self.connections_active.fetch_add(1, Ordering::Relaxed);
        ConnectionId(self.connections_total.fetch_add(1, Ordering::Relaxed) + 1)
    }

    pub fn connection_closed(&self) {
        self.connections_active.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn request_served(&self) {
        self.requests_served.fetch_add(1, Ordering::Relaxed);
    }

    pub fn protocol_error(&self) {
        self.protocol_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connections_total(&self) -> u64 {
        self.connections_total.load(Ordering::Relaxed)
    }

    pub fn active_connections(&self) -> u64 {
        self.connections_active.load(Ordering::Relaxed)
    }

    pub fn requests_served(&self) -> u64 {
        self.requests_served.load(Ordering::Relaxed)
    }

    pub fn protocol_errors(&self) -> u64 {
        self.protocol_errors.load(Ordering::Relaxed)
    }
}

/// Shared listener state cell.
#[derive(Debug)]
pub struct StateCell(RwLock<ListenerState>);

impl StateCell {
    pub fn new(state: ListenerState) -> Self {
        Self(RwLock::new(state))
    }

    pub fn get(&self) -> ListenerState {
        *self.0.read()
    }

    pub fn set(&self, state: ListenerState) {
        *self.0.write() = state;
    }
}
