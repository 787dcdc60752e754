//! File Cache Module
//!
//! Public cache facade combining key mapping, the atomic store, the counter
//! engine and the sweeper.
//!
//! Contract violations (invalid keys or TTLs) are returned as `Err`. Storage
//! failures are logged and absorbed: reads degrade to "not found", writes
//! report `false`, counters report `None`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use indexmap::IndexMap;
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::Serialize;
use tempfile::Builder;
use tracing::{debug, info, warn};

use crate::cache::counter::CounterEngine;
use crate::cache::entry;
use crate::cache::fs::ensure_dir;
use crate::cache::key::{validate_key, KeyPath, PathMapper};
use crate::cache::stats::{CacheStats, StatsRecorder};
use crate::cache::store::{AtomicStore, ReadOutcome, TEMP_FILE_PREFIX};
use crate::cache::sweeper::{SweepReport, Sweeper};
use crate::cache::ttl::Ttl;
use crate::clock::{Clock, SystemClock};
use crate::config::CacheConfig;
use crate::error::{CacheError, Result};

// == File Cache ==
/// Persistent key/value cache storing one file per entry.
///
/// Holds no entry contents in memory; every read goes to disk so that other
/// processes sharing the root are always observed.
#[derive(Debug)]
pub struct FileCache {
    mapper: PathMapper,
    store: AtomicStore,
    counters: CounterEngine,
    sweeper: Sweeper,
    clock: Arc<dyn Clock>,
    default_ttl: i64,
    stats: StatsRecorder,
}

impl FileCache {
    // == Constructor ==
    /// Opens (and if necessary creates) a cache using the system clock.
    pub fn new(config: CacheConfig) -> Result<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Opens a cache driven by the given clock.
    ///
    /// The root is created when it is missing but its parent exists, then
    /// canonicalized and probed for writability.
    pub fn with_clock(config: CacheConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        let root = prepare_root(&config)?;
        info!(root = %root.display(), default_ttl = config.default_ttl, "file cache opened");

        let store = AtomicStore::new(&root, config.dir_mode, config.file_mode);
        Ok(Self {
            mapper: PathMapper::new(&root, config.namespace.clone()),
            counters: CounterEngine::new(store.clone(), config.lock_timeout),
            sweeper: Sweeper::new(&root, config.temp_file_grace),
            store,
            clock,
            default_ttl: config.default_ttl,
            stats: StatsRecorder::new(),
        })
    }

    /// Canonical storage root.
    pub fn root(&self) -> &Path {
        self.mapper.root()
    }

    /// Default TTL in seconds applied to writes without explicit TTL.
    pub fn default_ttl(&self) -> i64 {
        self.default_ttl
    }

    /// Entry file path for `key`.
    pub fn path_for(&self, key: &str) -> Result<PathBuf> {
        Ok(self.key_path(key)?.file)
    }

    /// Statistics for operations made through this instance.
    pub fn stats(&self) -> CacheStats {
        self.stats.snapshot()
    }

    // == Get ==
    /// Retrieves the value stored under `key`, or `None` if it is missing,
    /// expired, unreadable or not decodable as `T`.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let path = self.key_path(key)?;

        let value = match self.store.get(&path.file, self.clock.now()) {
            ReadOutcome::Hit(value) => Some(value),
            ReadOutcome::Missing => None,
            ReadOutcome::Expired => {
                self.stats.record_eviction();
                None
            }
            ReadOutcome::Unreadable(e) => {
                debug!(key, error = %e, "treating unreadable entry as missing");
                self.stats.record_unreadable();
                None
            }
        };

        if value.is_some() {
            self.stats.record_hit();
        } else {
            self.stats.record_miss();
        }
        Ok(value)
    }

    /// Retrieves the value stored under `key`, or `default`.
    pub fn get_or<T: DeserializeOwned>(&self, key: &str, default: T) -> Result<T> {
        Ok(self.get(key)?.unwrap_or(default))
    }

    // == Has ==
    /// True if a live entry exists for `key`, whatever its value.
    pub fn has(&self, key: &str) -> Result<bool> {
        Ok(self.get::<IgnoredAny>(key)?.is_some())
    }

    // == Set ==
    /// Stores `value` under `key`.
    ///
    /// A TTL that resolves to now or earlier is accepted; the entry is simply
    /// expired on the next read.
    pub fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T, ttl: impl Into<Ttl>) -> Result<bool> {
        let path = self.key_path(key)?;
        let expires_at = self.resolve_ttl(ttl.into())?;
        let bytes = entry::encode(value, expires_at)?;
        Ok(self.write(key, &path, &bytes))
    }

    // == Delete ==
    /// Removes `key`. Deleting an absent key succeeds.
    pub fn delete(&self, key: &str) -> Result<bool> {
        let path = self.key_path(key)?;
        Ok(self.remove(key, &path))
    }

    // == Get Multiple ==
    /// Retrieves several keys, preserving input order. Missing keys map to
    /// a clone of `default`. All keys are validated before any read.
    pub fn get_multiple<I, K, T>(&self, keys: I, default: T) -> Result<IndexMap<String, T>>
    where
        I: IntoIterator<Item = K>,
        K: AsRef<str>,
        T: DeserializeOwned + Clone,
    {
        let keys = validate_all(keys.into_iter().map(|k| k.as_ref().to_string()))?;

        let mut values = IndexMap::with_capacity(keys.len());
        for key in keys {
            let value = self.get(&key)?.unwrap_or_else(|| default.clone());
            values.insert(key, value);
        }
        Ok(values)
    }

    // == Set Multiple ==
    /// Stores several entries with one shared TTL. Every entry is attempted;
    /// the result is true only if all writes succeeded.
    ///
    /// Keys are validated and values serialized before the first write, so
    /// a bad key or an unserializable value fails the call with nothing
    /// written.
    pub fn set_multiple<I, K, V>(&self, entries: I, ttl: impl Into<Ttl>) -> Result<bool>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Serialize,
    {
        let entries: Vec<(K, V)> = entries.into_iter().collect();
        validate_all(entries.iter().map(|(k, _)| k.as_ref()))?;
        let expires_at = self.resolve_ttl(ttl.into())?;

        let mut encoded = Vec::with_capacity(entries.len());
        for (key, value) in &entries {
            encoded.push((key.as_ref(), entry::encode(value, expires_at)?));
        }

        let mut ok = true;
        for (key, bytes) in &encoded {
            let path = self.mapper.path_for(key);
            ok = self.write(key, &path, bytes) && ok;
        }
        Ok(ok)
    }

    // == Delete Multiple ==
    /// Removes several keys. Every key is attempted; the result is true
    /// only if all removals succeeded.
    pub fn delete_multiple<I, K>(&self, keys: I) -> Result<bool>
    where
        I: IntoIterator<Item = K>,
        K: AsRef<str>,
    {
        let keys = validate_all(keys.into_iter().map(|k| k.as_ref().to_string()))?;

        let mut ok = true;
        for key in &keys {
            let path = self.mapper.path_for(key);
            ok = self.remove(key, &path) && ok;
        }
        Ok(ok)
    }

    // == Increment ==
    /// Adds `step` to the integer stored under `key` (missing counts as 0)
    /// and returns the new value, or `None` if the update failed.
    ///
    /// The result is written with the default TTL.
    pub fn increment(&self, key: &str, step: i64) -> Result<Option<i64>> {
        let path = self.key_path(key)?;
        let default_ttl = self.default_ttl;

        let result = self.counters.adjust(key, &path, step, self.clock.as_ref(), |now| {
            Ttl::Default.resolve(now, default_ttl)
        });

        match result {
            Ok(value) => {
                self.stats.record_write(true);
                Ok(Some(value))
            }
            Err(e) if e.is_contract_violation() => Err(e),
            Err(e) => {
                warn!(key, step, error = %e, "counter update failed");
                self.stats.record_write(false);
                Ok(None)
            }
        }
    }

    // == Decrement ==
    /// Subtracts `step` from the integer stored under `key`.
    pub fn decrement(&self, key: &str, step: i64) -> Result<Option<i64>> {
        let step = step
            .checked_neg()
            .ok_or_else(|| CacheError::Overflow(key.to_string()))?;
        self.increment(key, step)
    }

    // == Clear ==
    /// Deletes every stored entry. True only if every deletion succeeded.
    pub fn clear(&self) -> bool {
        let report = self.sweeper.clear();
        self.stats.record_swept(report.removed);
        report.is_clean()
    }

    // == Clean Expired ==
    /// Deletes entries whose TTL has elapsed. Meant to be called on a
    /// schedule chosen by the host application.
    pub fn clean_expired(&self) -> SweepReport {
        let report = self.sweeper.clean_expired(self.clock.now());
        self.stats.record_swept(report.removed);
        report
    }

    // == Internal Helpers ==
    fn key_path(&self, key: &str) -> Result<KeyPath> {
        validate_key(key)?;
        Ok(self.mapper.path_for(key))
    }

    fn resolve_ttl(&self, ttl: Ttl) -> Result<i64> {
        ttl.resolve(self.clock.now(), self.default_ttl)
    }

    fn write(&self, key: &str, path: &KeyPath, bytes: &[u8]) -> bool {
        match self.store.put_encoded(&path.file, bytes) {
            Ok(()) => {
                self.stats.record_write(true);
                true
            }
            Err(e) => {
                warn!(key, error = %e, "cache write failed");
                self.stats.record_write(false);
                false
            }
        }
    }

    fn remove(&self, key: &str, path: &KeyPath) -> bool {
        match self.store.remove(&path.file) {
            Ok(_) => true,
            Err(e) => {
                warn!(key, error = %e, "cache delete failed");
                false
            }
        }
    }
}

fn validate_all<I, K>(keys: I) -> Result<Vec<K>>
where
    I: IntoIterator<Item = K>,
    K: AsRef<str>,
{
    keys.into_iter()
        .map(|key| validate_key(key.as_ref()).map(|()| key))
        .collect()
}

fn prepare_root(config: &CacheConfig) -> Result<PathBuf> {
    let invalid = |reason: String| CacheError::InvalidPath {
        path: config.root.clone(),
        reason,
    };

    let root = &config.root;
    let parent_exists = match root.parent() {
        Some(parent) if parent.as_os_str().is_empty() => true,
        Some(parent) => parent.exists(),
        None => false,
    };
    if !root.exists() && parent_exists {
        ensure_dir(root, config.dir_mode).map_err(|e| invalid(e.to_string()))?;
    }

    let root = root
        .canonicalize()
        .map_err(|_| invalid("cache path does not exist".to_string()))?;
    if !root.is_dir() {
        return Err(invalid("cache path is not a directory".to_string()));
    }

    Builder::new()
        .prefix(TEMP_FILE_PREFIX)
        .tempfile_in(&root)
        .map_err(|e| invalid(format!("cache path is not writable: {e}")))?;

    Ok(root)
}
