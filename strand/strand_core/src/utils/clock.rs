//! Clock sources.
//!
//! Task expiry deadlines and connect throttling compare absolute
//! wall-clock timestamps in milliseconds since the Unix epoch. Code that
//! needs the time takes an `Arc<dyn Clock>` so tests can substitute a
//! [`ManualClock`].

use chrono::Utc;
use std::sync::atomic::{AtomicI64, Ordering};

/// A source of wall-clock timestamps.
pub trait Clock: Send + Sync + 'static {
    /// Milliseconds since the Unix epoch.
    fn now_ms(&self) -> i64;

    /// Whole seconds since the Unix epoch.
    fn now_secs(&self) -> i64 {
        self.now_ms().div_euclid(1000)
    }
}

/// The system wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now_ms: AtomicI64,
}

impl ManualClock {
    /// Create a clock frozen at `start_ms`.
    pub fn new(start_ms: i64) -> Self {
        Self {
            now_ms: AtomicI64::new(start_ms),
        }
    }

    /// Move the clock forward by `delta_ms`.
    pub fn advance(&self, delta_ms: i64) {
        self.now_ms.fetch_add(delta_ms, Ordering::SeqCst);
    }

    /// Jump to an absolute time.
    pub fn set(&self, now_ms: i64) {
        self.now_ms.store(now_ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.now_ms.load(Ordering::SeqCst)
    }
}

/// Absolute deadline `timeout_ms` after `now_ms`, or `0` (no deadline)
/// when `timeout_ms` is zero.
pub fn deadline_after(now_ms: i64, timeout_ms: u64) -> i64 {
    if timeout_ms == 0 {
        return 0;
    }
    let timeout = i64::try_from(timeout_ms).unwrap_or(i64::MAX);
    now_ms.saturating_add(timeout)
}

/// Whether a deadline produced by [`deadline_after`] has passed.
pub fn is_expired(deadline_ms: i64, now_ms: i64) -> bool {
    deadline_ms != 0 && deadline_ms < now_ms
}
