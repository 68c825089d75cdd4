//! Core infrastructure tests.

mod common;

use common::create_config;
use lattice_local::config::{Config, ConfigOverrides};
use lattice_local::error::StatusCode;
use lattice_local::runtime::{ComponentHealth, Runtime};
use lattice_local::time::LogicalClock;
use lattice_local::{GroupFilter, LocalError, PartitionGroupId};
use std::time::{Duration, UNIX_EPOCH};

// ============================================================================
// Config tests
// ============================================================================

#[test]
fn parse_full_config() {
    let file = create_config(
        r#"
[controller]
bind_host = "127.0.0.1"
base_port = 6000
port_probe_limit = 10
queue_capacity = 16

[telemetry]
log_level = "debug"

[[groups]]
namespace = "apps"
name = "raft"
partitions = 3
partition_size = 2
state_machine = "counter"
"#,
    );

    let config = Config::from_file(file.path()).unwrap();
    assert_eq!(config.controller.base_port, 6000);
    assert_eq!(config.controller.port_probe_limit, 10);
    assert_eq!(config.controller.queue_capacity, 16);
    assert_eq!(config.telemetry.log_level, "debug");
    assert_eq!(config.groups.len(), 1);
    assert_eq!(config.groups[0].namespace, "apps");
    assert_eq!(config.groups[0].state_machine, "counter");
}

#[test]
fn validate_invalid_log_level() {
    let file = create_config("[telemetry]\nlog_level = \"chatty\"\n");
    let result = Config::from_file(file.path());
    assert!(result.is_err());
    assert!(format!("{:#}", result.unwrap_err()).contains("log_level"));
}

#[test]
fn validate_zero_queue_capacity() {
    let result = Config::from_toml("[controller]\nqueue_capacity = 0\n");
    assert!(result.is_err());
}

#[test]
fn validate_group_without_partitions() {
    let result = Config::from_toml("[[groups]]\nname = \"g\"\npartitions = 0\n");
    assert!(result.is_err());
}

#[test]
fn missing_config_file() {
    let result = Config::from_file(std::path::Path::new("/nonexistent/lattice-local.toml"));
    assert!(result.is_err());
}

#[test]
fn overrides_take_precedence() {
    let mut config = Config::from_toml("[controller]\nbase_port = 6000\n").unwrap();
    config.apply_overrides(&ConfigOverrides {
        log_level: None,
        base_port: Some(7000),
    });
    assert_eq!(config.controller.base_port, 7000);
    assert_eq!(config.telemetry.log_level, "info");
}

// ============================================================================
// Error tests
// ============================================================================

#[test]
fn error_status_codes() {
    let cases = [
        (LocalError::unavailable("p"), StatusCode::Unavailable),
        (
            LocalError::NotSupportedInLocalMode {
                operation: "EnterElection",
            },
            StatusCode::Unimplemented,
        ),
        (
            LocalError::DeadlineExceeded {
                partition: "p".to_string(),
            },
            StatusCode::DeadlineExceeded,
        ),
        (LocalError::invalid_spec("bad"), StatusCode::InvalidArgument),
        (
            LocalError::GroupNotFound {
                group: "a:b".to_string(),
            },
            StatusCode::NotFound,
        ),
    ];
    for (error, code) in cases {
        assert_eq!(error.status_code(), code, "{}", error);
    }
}

// ============================================================================
// Time tests
// ============================================================================

#[test]
fn logical_clock_advances_per_command() {
    let mut clock = LogicalClock::new();
    assert_eq!(clock.index(), 0);

    let t1 = UNIX_EPOCH + Duration::from_millis(10);
    assert_eq!(clock.advance(t1), 1);
    assert_eq!(clock.timestamp_ms(), 10);

    let t2 = UNIX_EPOCH + Duration::from_millis(25);
    assert_eq!(clock.advance(t2), 2);
    assert_eq!(clock.timestamp(), t2);
}

// ============================================================================
// Runtime tests
// ============================================================================

#[tokio::test]
async fn runtime_bootstraps_groups_from_config() {
    let config = Config::from_toml(
        r#"
[controller]
base_port = 0

[[groups]]
namespace = "boot"
name = "one"
partitions = 1
partition_size = 2

[[groups]]
namespace = "boot"
name = "two"
partitions = 2
"#,
    )
    .unwrap();

    let mut runtime = Runtime::new(config).unwrap();
    runtime.start().await.unwrap();
    assert_eq!(runtime.health(), ComponentHealth::Healthy);

    let controller = runtime.controller().unwrap().clone();
    let groups = controller.list_groups(&GroupFilter::namespace("boot")).await;
    assert_eq!(groups.len(), 2);

    let one = controller
        .get_group(&PartitionGroupId::new("boot", "one"))
        .await
        .unwrap();
    assert_eq!(one.partitions[0].endpoints.len(), 2);
    assert_eq!(one.spec.state_machine, "echo");

    runtime.shutdown();
    runtime.stop().await.unwrap();
    assert!(controller.list_groups(&GroupFilter::all()).await.is_empty());
}

#[tokio::test]
async fn runtime_run_returns_after_shutdown() {
    let mut config = Config::default();
    config.controller.base_port = 0;
    let mut runtime = Runtime::new(config).unwrap();

    // signal before running: run starts, sees the signal and stops
    runtime.shutdown();
    tokio::time::timeout(Duration::from_secs(5), runtime.run())
        .await
        .expect("runtime did not stop")
        .unwrap();
    assert!(!runtime.is_running());
    assert_eq!(runtime.health(), ComponentHealth::Stopped);
}
