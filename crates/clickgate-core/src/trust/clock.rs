//! Monotonic time source for the recency check.

use std::sync::OnceLock;
use std::time::Instant;

/// Monotonic microsecond clock, in the same unit and epoch as click event
/// timestamps.
pub trait MonotonicClock: Send + Sync {
    fn now_us(&self) -> u64;
}

static PROCESS_EPOCH: OnceLock<Instant> = OnceLock::new();

/// Microseconds elapsed since the first time any `SystemMonotonicClock` was
/// read in this process.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemMonotonicClock;

impl SystemMonotonicClock {
    pub fn new() -> Self {
        let _ = PROCESS_EPOCH.get_or_init(Instant::now);
        Self
    }
}

impl MonotonicClock for SystemMonotonicClock {
    fn now_us(&self) -> u64 {
        let epoch = PROCESS_EPOCH.get_or_init(Instant::now);
        u64::try_from(epoch.elapsed().as_micros()).unwrap_or(u64::MAX)
    }
}

/// A clock frozen at a fixed instant.  Useful for deterministic tests and
/// for replaying recorded traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedClock(pub u64);

impl MonotonicClock for FixedClock {
    fn now_us(&self) -> u64 {
        self.0
    }
}
