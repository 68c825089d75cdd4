//! Core runtime infrastructure.
//!
//! - [`config`] - Configuration parsing and validation
//! - [`runtime`] - Main runtime orchestration
//! - [`time`] - Logical clock and time sources
//! - [`error`] - Error types and status mapping

pub mod config;
pub mod error;
pub mod runtime;
pub mod time;
