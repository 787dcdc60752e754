//! Cache Module
//!
//! Persistent file-per-entry caching with TTL expiration, atomic writes and
//! lock-protected counters.

mod counter;
mod entry;
mod file_cache;
mod fs;
mod key;
mod stats;
mod store;
mod sweeper;
mod ttl;

#[cfg(test)]
mod property_tests;

// Re-export public types
pub use counter::{CounterEngine, ShardLock};
pub use entry::{CacheEntry, CodecError};
pub use file_cache::FileCache;
pub use fs::ensure_dir;
pub use key::{validate_key, KeyPath, PathMapper, LOCK_FILE_NAME, RESERVED_CHARACTERS};
pub use stats::{CacheStats, StatsRecorder};
pub use store::{AtomicStore, ReadOutcome, TEMP_FILE_PREFIX};
pub use sweeper::{StoredFile, SweepReport, Sweeper};
pub use ttl::{CalendarInterval, Ttl};
