//! CLI command implementations.

mod config;
mod exec;
mod start;

pub use config::{load_config, run_config, ConfigArgs};
pub use exec::{run_exec, ExecArgs};
pub use start::{run_start, StartArgs};
