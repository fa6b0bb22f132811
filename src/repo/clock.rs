//! Time source for repository timestamping.

use std::time::{SystemTime, UNIX_EPOCH};

/// Supplies the instant used for `created_at`/`updated_at` assignment.
///
/// One `now()` call covers both timestamps of a single save.
pub trait Clock {
    /// Current time in epoch milliseconds.
    fn now(&self) -> i64;
}

/// Wall-clock time source.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis() as i64)
            .unwrap_or(0)
    }
}

/// Clock pinned to one instant, for tests and replay tooling.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub i64);

impl Clock for FixedClock {
    fn now(&self) -> i64 {
        self.0
    }
}
