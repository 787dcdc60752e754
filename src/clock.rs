//! Clock Module
//!
//! Time source abstraction so expiration can be driven by simulated time.

use std::fmt::Debug;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use chrono::Utc;

// == Clock Trait ==
/// Source of the current time in Unix seconds.
pub trait Clock: Send + Sync + Debug {
    /// Returns the current Unix timestamp in seconds.
    fn now(&self) -> i64;
}

// == System Clock ==
/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        Utc::now().timestamp()
    }
}

// == Manual Clock ==
/// Wall-clock time shifted by an adjustable offset.
///
/// Clones share the same offset, so a test can hold one handle while the
/// cache holds another.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    offset: Arc<AtomicI64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves time forward (or backward, for negative values) by `seconds`.
    pub fn advance(&self, seconds: i64) {
        self.offset.fetch_add(seconds, Ordering::SeqCst);
    }

    /// Pins the clock so that `now()` returns `timestamp`.
    pub fn set(&self, timestamp: i64) {
        self.offset
            .store(timestamp - Utc::now().timestamp(), Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> i64 {
        Utc::now().timestamp() + self.offset.load(Ordering::SeqCst)
    }
}
