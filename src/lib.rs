//! File Cache - A persistent key/value cache backed by the local filesystem
//!
//! Stores one file per entry with TTL expiration, atomic writes, bulk
//! operations and lock-protected counters. Several processes may share one
//! cache directory.

pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod tasks;

pub use cache::{CacheStats, CalendarInterval, FileCache, SweepReport, Ttl};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::CacheConfig;
pub use error::{CacheError, Result};
pub use tasks::spawn_sweep_task;
