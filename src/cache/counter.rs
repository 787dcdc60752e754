//! Counter Engine Module
//!
//! Read-increment-write of integer entries under an exclusive advisory lock
//! on the key's shard directory. Every counter in the same shard shares one
//! lock; counters in different shards never contend.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use fs2::FileExt;
use tracing::{debug, warn};

use crate::cache::fs::{ensure_dir, set_mode};
use crate::cache::key::KeyPath;
use crate::cache::store::AtomicStore;
use crate::clock::Clock;
use crate::error::{CacheError, Result};

/// Poll interval while waiting for a lock with a timeout
const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(5);

// == Shard Lock ==
/// Exclusive advisory lock held until dropped.
#[derive(Debug)]
pub struct ShardLock {
    file: File,
    path: PathBuf,
}

impl ShardLock {
    /// Acquires the lock at `path`, blocking indefinitely or until `timeout`.
    ///
    /// A lock file created by this call gets `mode`, so other users sharing
    /// the root can open it too.
    pub fn acquire(path: &Path, mode: Option<u32>, timeout: Option<Duration>) -> Result<Self> {
        let file = match OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(file) => {
                set_mode(path, mode)?;
                file
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                OpenOptions::new().write(true).open(path)?
            }
            Err(e) => return Err(e.into()),
        };

        match timeout {
            None => file.lock_exclusive()?,
            Some(timeout) => {
                let deadline = Instant::now() + timeout;
                loop {
                    match file.try_lock_exclusive() {
                        Ok(()) => break,
                        Err(e) if is_contended(&e) => {
                            if Instant::now() >= deadline {
                                return Err(CacheError::LockTimeout(path.to_path_buf()));
                            }
                            thread::sleep(LOCK_POLL_INTERVAL);
                        }
                        Err(e) => return Err(e.into()),
                    }
                }
            }
        }

        debug!(path = %path.display(), "shard lock acquired");
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }
}

impl Drop for ShardLock {
    fn drop(&mut self) {
        // The lock file stays on disk; removing it would let a waiter lock
        // an unlinked inode while a newcomer locks a fresh one.
        if let Err(e) = FileExt::unlock(&self.file) {
            warn!(path = %self.path.display(), error = %e, "failed to release shard lock");
        }
    }
}

fn is_contended(e: &io::Error) -> bool {
    e.kind() == io::ErrorKind::WouldBlock
        || e.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}

// == Counter Engine ==
/// Lock-protected integer adjustment on top of the atomic store.
#[derive(Debug, Clone)]
pub struct CounterEngine {
    store: AtomicStore,
    lock_timeout: Option<Duration>,
}

impl CounterEngine {
    pub fn new(store: AtomicStore, lock_timeout: Option<Duration>) -> Self {
        Self { store, lock_timeout }
    }

    // == Adjust ==
    /// Adds `delta` to the counter at `path` and returns the new value.
    ///
    /// A missing, expired or non-integer entry counts as zero. `clock` is read
    /// only once the lock is held, so time spent waiting for the lock counts
    /// against the current entry. The result is written with `expires_at`
    /// computed by the caller from that same instant.
    pub fn adjust(
        &self,
        key: &str,
        path: &KeyPath,
        delta: i64,
        clock: &dyn Clock,
        expires_at: impl FnOnce(i64) -> Result<i64>,
    ) -> Result<i64> {
        ensure_dir(&path.shard, self.store.dir_mode())?;
        let _lock = ShardLock::acquire(&path.lock_file(), self.store.file_mode(), self.lock_timeout)?;
        let now = clock.now();

        let current: i64 = self.store.get(&path.file, now).into_option().unwrap_or(0);
        let next = current
            .checked_add(delta)
            .ok_or_else(|| CacheError::Overflow(key.to_string()))?;

        self.store.put(&path.file, &next, expires_at(now)?)?;
        debug!(key, current, next, "counter adjusted");
        Ok(next)
    }
}
