//! Directory Sweeper Module
//!
//! Walks the storage tree for bulk clear and expired-entry cleanup. The walk
//! tolerates files disappearing underneath it, since other processes keep
//! reading, writing and evicting while a sweep runs.

use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use serde::Serialize;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::cache::entry;
use crate::cache::fs::remove_if_exists;
use crate::cache::key::LOCK_FILE_NAME;
use crate::cache::store::{AtomicStore, TEMP_FILE_PREFIX};

// == Stored File ==
/// A file found under the storage root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoredFile {
    /// Entry file inside the shard tree
    Entry(PathBuf),
    /// In-flight or orphaned temp file in the root
    Temp(PathBuf),
}

impl StoredFile {
    pub fn path(&self) -> &Path {
        match self {
            StoredFile::Entry(path) | StoredFile::Temp(path) => path,
        }
    }
}

// == Sweep Report ==
/// Outcome of one sweep over the storage tree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Files examined
    pub scanned: u64,
    /// Files deleted by this sweep
    pub removed: u64,
    /// Deletions (or reads) that failed
    pub failed: u64,
    /// Files left in place (live entries, young temp files)
    pub skipped: u64,
}

impl SweepReport {
    /// True when no deletion failed.
    pub fn is_clean(&self) -> bool {
        self.failed == 0
    }

    fn record_removal(&mut self, path: &Path, result: io::Result<bool>) {
        match result {
            Ok(true) => self.removed += 1,
            // Someone else removed it first
            Ok(false) => self.skipped += 1,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to remove cache file");
                self.failed += 1;
            }
        }
    }
}

// == Sweeper ==
/// Enumerates and prunes the files below one storage root.
#[derive(Debug, Clone)]
pub struct Sweeper {
    root: PathBuf,
    temp_file_grace: Duration,
}

impl Sweeper {
    pub fn new(root: impl Into<PathBuf>, temp_file_grace: Duration) -> Self {
        Self {
            root: root.into(),
            temp_file_grace,
        }
    }

    // == For Each Entry ==
    /// Lazily yields every stored file under the root, skipping directories
    /// and shard lock files.
    pub fn files(&self) -> impl Iterator<Item = StoredFile> + '_ {
        WalkDir::new(&self.root)
            .min_depth(1)
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                // Directory removed mid-walk, or unreadable
                Err(e) => {
                    debug!(error = %e, "skipping unreadable path during sweep");
                    None
                }
            })
            .filter(|entry| !entry.file_type().is_dir())
            .filter(|entry| entry.file_name() != LOCK_FILE_NAME)
            .map(|entry| {
                let is_temp = entry.depth() == 1
                    && entry
                        .file_name()
                        .to_string_lossy()
                        .starts_with(TEMP_FILE_PREFIX);
                if is_temp {
                    StoredFile::Temp(entry.into_path())
                } else {
                    StoredFile::Entry(entry.into_path())
                }
            })
    }

    // == Clear ==
    /// Deletes every stored file regardless of expiration. Failures do not
    /// stop the sweep; they are counted in the report.
    pub fn clear(&self) -> SweepReport {
        let mut report = SweepReport::default();

        for file in self.files() {
            report.scanned += 1;
            report.record_removal(file.path(), remove_if_exists(file.path()));
        }

        info!(
            removed = report.removed,
            failed = report.failed,
            "cleared cache directory {}",
            self.root.display()
        );
        report
    }

    // == Clean Expired ==
    /// Deletes entries whose expiration is at or before `now`, entries whose
    /// header cannot be parsed, and temp files older than the grace period.
    pub fn clean_expired(&self, now: i64) -> SweepReport {
        let mut report = SweepReport::default();

        for file in self.files() {
            report.scanned += 1;
            let path = file.path();

            let remove = match &file {
                StoredFile::Entry(path) => match AtomicStore::expires_at(path) {
                    Ok(Ok(expires_at)) => entry::is_expired(expires_at, now),
                    Ok(Err(e)) => {
                        debug!(path = %path.display(), error = %e, "removing unreadable entry");
                        true
                    }
                    Err(e) if e.kind() == io::ErrorKind::NotFound => false,
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "failed to read entry header");
                        report.failed += 1;
                        continue;
                    }
                },
                StoredFile::Temp(path) => self.is_stale_temp(path),
            };

            if remove {
                report.record_removal(path, remove_if_exists(path));
            } else {
                report.skipped += 1;
            }
        }

        info!(
            scanned = report.scanned,
            removed = report.removed,
            failed = report.failed,
            "expired entry sweep finished"
        );
        report
    }

    fn is_stale_temp(&self, path: &Path) -> bool {
        std::fs::metadata(path)
            .and_then(|meta| meta.modified())
            .ok()
            .and_then(|modified| SystemTime::now().duration_since(modified).ok())
            .is_some_and(|age| age >= self.temp_file_grace)
    }
}
