//! Logical clock utilities.
//!
//! Each execution engine keeps a logical clock made of a monotonic index and
//! the wall-clock timestamp captured when the latest command was applied.
//! Only commands advance the clock; queries observe it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Source of wall-clock time for command timestamps.
pub trait Clock: Send + Sync {
    /// Sample the current time.
    fn now(&self) -> SystemTime;
}

/// Clock backed by the operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    ms: AtomicU64,
}

impl ManualClock {
    /// Create a manual clock starting at the given milliseconds since the epoch.
    pub fn new(start_ms: u64) -> Self {
        Self {
            ms: AtomicU64::new(start_ms),
        }
    }

    /// Move the clock forward.
    pub fn advance_ms(&self, ms: u64) {
        self.ms.fetch_add(ms, Ordering::AcqRel);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> SystemTime {
        UNIX_EPOCH + Duration::from_millis(self.ms.load(Ordering::Acquire))
    }
}

/// Index and timestamp of the most recently applied command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogicalClock {
    index: u64,
    timestamp: SystemTime,
}

impl LogicalClock {
    /// A clock that has not applied any command.
    pub fn new() -> Self {
        Self {
            index: 0,
            timestamp: UNIX_EPOCH,
        }
    }

    /// Index of the last applied command (0 before the first one).
    pub fn index(&self) -> u64 {
        self.index
    }

    /// Timestamp of the last applied command.
    pub fn timestamp(&self) -> SystemTime {
        self.timestamp
    }

    /// Milliseconds since the epoch of the last applied command.
    pub fn timestamp_ms(&self) -> u64 {
        self.timestamp
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    }

    /// Advance for a new command and return the new index.
    pub fn advance(&mut self, now: SystemTime) -> u64 {
        self.index += 1;
        self.timestamp = now;
        self.index
    }
}

impl Default for LogicalClock {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for LogicalClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "index={} ts={}ms", self.index, self.timestamp_ms())
    }
}
