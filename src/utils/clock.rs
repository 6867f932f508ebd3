//! Time sources for the price accumulator.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;

/// A source of the current time in seconds.
pub trait Clock {
    /// Current time in seconds
    fn now(&self) -> u64;
}

/// Wall clock time (UTC seconds since the epoch)
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> u64 {
        // Negative timestamps predate the epoch; treat them as zero
        u64::try_from(Utc::now().timestamp()).unwrap_or_default()
    }
}

/// A settable clock. Clones share the same time, so a test can keep one
/// handle and move the time of a pool that owns another.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    /// Shared current time
    now: Arc<AtomicU64>,
}

impl ManualClock {
    /// Creates a clock starting at `now`
    #[must_use]
    pub fn new(now: u64) -> Self {
        Self {
            now: Arc::new(AtomicU64::new(now)),
        }
    }

    /// Sets the current time
    pub fn set(&self, now: u64) {
        self.now.store(now, Ordering::SeqCst);
    }

    /// Moves the current time forward by `seconds`
    pub fn advance(&self, seconds: u64) {
        self.now.fetch_add(seconds, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}
