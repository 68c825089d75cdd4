//! Networking layer.
//!
//! Every partition endpoint is reachable over a loopback TCP listener:
//! - [`tcp`] - Port probing, listener state and metrics
//! - [`codec`] - Length-prefixed request/response frames
//! - [`server`] - Per-endpoint accept loop feeding the engine
//! - [`client`] - Client for a single endpoint

pub mod client;
pub mod codec;
pub mod server;
pub mod tcp;

pub use client::EndpointClient;
pub use server::EndpointServer;
