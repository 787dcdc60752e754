//! Atomic Store Module
//!
//! Reads and writes single entry files. Writes go to a temp file in the
//! storage root and are renamed over the destination, so readers observe
//! either the previous complete entry or the new one.

use std::fs::File;
use std::io::{self, BufReader, Read, Write};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tempfile::Builder;
use tracing::{debug, warn};

use crate::cache::entry::{self, CodecError};
use crate::cache::fs::{ensure_dir, remove_if_exists, set_mode};
use crate::error::Result;

/// Prefix of in-flight temp files in the storage root
pub const TEMP_FILE_PREFIX: &str = ".tmp";

// == Read Outcome ==
/// Result of reading an entry file.
#[derive(Debug, PartialEq)]
pub enum ReadOutcome<T> {
    /// Live entry
    Hit(T),
    /// No file at the path
    Missing,
    /// File was expired and has been lazily evicted
    Expired,
    /// File exists but could not be decoded
    Unreadable(CodecError),
}

impl<T> ReadOutcome<T> {
    /// Collapses all non-hit outcomes into `None`.
    pub fn into_option(self) -> Option<T> {
        match self {
            ReadOutcome::Hit(value) => Some(value),
            _ => None,
        }
    }
}

// == Atomic Store ==
/// File-level persistence rooted at one storage directory.
#[derive(Debug, Clone)]
pub struct AtomicStore {
    root: PathBuf,
    dir_mode: Option<u32>,
    file_mode: Option<u32>,
}

impl AtomicStore {
    pub fn new(root: impl Into<PathBuf>, dir_mode: Option<u32>, file_mode: Option<u32>) -> Self {
        Self {
            root: root.into(),
            dir_mode,
            file_mode,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn dir_mode(&self) -> Option<u32> {
        self.dir_mode
    }

    pub fn file_mode(&self) -> Option<u32> {
        self.file_mode
    }

    // == Put ==
    /// Atomically writes `value` with `expires_at` to `path`.
    ///
    /// The temp file is removed on every failure path; nothing is ever
    /// observable at `path` until the rename succeeds.
    pub fn put<T: Serialize + ?Sized>(&self, path: &Path, value: &T, expires_at: i64) -> Result<()> {
        let bytes = entry::encode(value, expires_at)?;
        self.put_encoded(path, &bytes)
    }

    /// Atomically writes an already encoded entry to `path`.
    pub fn put_encoded(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        if let Some(dir) = path.parent() {
            ensure_dir(dir, self.dir_mode)?;
        }

        // NamedTempFile deletes itself when dropped before persist
        let mut temp = Builder::new()
            .prefix(TEMP_FILE_PREFIX)
            .tempfile_in(&self.root)?;
        temp.write_all(bytes)?;
        temp.flush()?;
        set_mode(temp.path(), self.file_mode)?;

        temp.persist(path).map_err(|e| e.error)?;
        debug!(path = %path.display(), bytes = bytes.len(), "entry written");
        Ok(())
    }

    // == Get ==
    /// Reads the entry at `path` as seen at time `now`.
    ///
    /// Expired files are deleted. A file vanishing between open and read
    /// counts as missing, as does any other I/O failure.
    pub fn get<T: DeserializeOwned>(&self, path: &Path, now: i64) -> ReadOutcome<T> {
        match self.try_get(path, now) {
            Ok(outcome) => outcome,
            Err(e) if e.kind() == io::ErrorKind::NotFound => ReadOutcome::Missing,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "cache read failed");
                ReadOutcome::Missing
            }
        }
    }

    fn try_get<T: DeserializeOwned>(&self, path: &Path, now: i64) -> io::Result<ReadOutcome<T>> {
        let mut reader = BufReader::new(File::open(path)?);

        let expires_at = match entry::read_expires_at(&mut reader)? {
            Ok(expires_at) => expires_at,
            Err(e) => return Ok(ReadOutcome::Unreadable(e)),
        };

        if entry::is_expired(expires_at, now) {
            drop(reader);
            if let Err(e) = remove_if_exists(path) {
                warn!(path = %path.display(), error = %e, "failed to evict expired entry");
            }
            debug!(path = %path.display(), expires_at, now, "evicted expired entry");
            return Ok(ReadOutcome::Expired);
        }

        let mut payload = Vec::new();
        reader.read_to_end(&mut payload)?;

        Ok(match entry::decode_payload(&payload) {
            Ok(value) => ReadOutcome::Hit(value),
            Err(e) => ReadOutcome::Unreadable(e),
        })
    }

    // == Remove ==
    /// Deletes the entry at `path`. Returns `false` if it was already absent.
    pub fn remove(&self, path: &Path) -> Result<bool> {
        Ok(remove_if_exists(path)?)
    }

    // == Read Expiration ==
    /// Reads only the expiration header of a file.
    pub fn expires_at(path: &Path) -> io::Result<std::result::Result<i64, CodecError>> {
        let mut reader = BufReader::new(File::open(path)?);
        entry::read_expires_at(&mut reader)
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn setup() -> (TempDir, AtomicStore) {
        let tmp = TempDir::new().unwrap();
        let store = AtomicStore::new(tmp.path(), None, None);
        (tmp, store)
    }

    fn temp_files(root: &Path) -> usize {
        fs::read_dir(root)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with(TEMP_FILE_PREFIX))
            .count()
    }

    #[test]
    fn test_put_and_get() {
        let (tmp, store) = setup();
        let path = tmp.path().join("a").join("b").join("entry");

        store.put(&path, "value1", 200).unwrap();
        assert_eq!(store.get::<String>(&path, 100), ReadOutcome::Hit("value1".to_string()));
        assert_eq!(temp_files(tmp.path()), 0, "temp file should be renamed away");
    }

    #[test]
    fn test_get_missing() {
        let (tmp, store) = setup();
        let path = tmp.path().join("nothing");
        assert_eq!(store.get::<String>(&path, 100), ReadOutcome::Missing);
    }

    #[test]
    fn test_get_expired_evicts_file() {
        let (tmp, store) = setup();
        let path = tmp.path().join("entry");

        store.put(&path, &1, 100).unwrap();
        assert_eq!(store.get::<i32>(&path, 100), ReadOutcome::Expired);
        assert!(!path.exists(), "expired file should be deleted");
        assert_eq!(store.get::<i32>(&path, 100), ReadOutcome::Missing);
    }

    #[test]
    fn test_put_overwrites() {
        let (tmp, store) = setup();
        let path = tmp.path().join("entry");

        store.put(&path, "first", 200).unwrap();
        store.put(&path, "second", 300).unwrap();
        assert_eq!(store.get::<String>(&path, 250), ReadOutcome::Hit("second".to_string()));
    }

    #[test]
    fn test_get_corrupt_file() {
        let (tmp, store) = setup();
        let path = tmp.path().join("entry");
        fs::write(&path, b"garbage").unwrap();

        assert!(matches!(
            store.get::<String>(&path, 100),
            ReadOutcome::Unreadable(CodecError::Corrupt(_))
        ));
    }

    #[test]
    fn test_get_false_is_hit() {
        let (tmp, store) = setup();
        let path = tmp.path().join("entry");

        store.put(&path, &false, 200).unwrap();
        assert_eq!(store.get::<bool>(&path, 100), ReadOutcome::Hit(false));
    }

    #[test]
    fn test_put_into_unwritable_location_cleans_temp() {
        let (tmp, store) = setup();
        // Destination is an existing directory, so the rename fails
        let path = tmp.path().join("occupied");
        fs::create_dir_all(path.join("child")).unwrap();

        assert!(store.put(&path, "value", 200).is_err());
        assert_eq!(temp_files(tmp.path()), 0, "temp file should be removed on failure");
    }

    #[test]
    fn test_remove() {
        let (tmp, store) = setup();
        let path = tmp.path().join("entry");

        store.put(&path, "value", 200).unwrap();
        assert!(store.remove(&path).unwrap());
        assert!(!store.remove(&path).unwrap());
    }

    #[test]
    fn test_expires_at_header_only() {
        let (tmp, store) = setup();
        let path = tmp.path().join("entry");

        store.put(&path, &vec!["x"; 1000], 12345).unwrap();
        assert_eq!(AtomicStore::expires_at(&path).unwrap(), Ok(12345));
    }

    #[cfg(unix)]
    #[test]
    fn test_put_applies_file_mode() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = TempDir::new().unwrap();
        let store = AtomicStore::new(tmp.path(), Some(0o750), Some(0o640));
        let path = tmp.path().join("a").join("entry");

        store.put(&path, "value", 200).unwrap();
        let file_mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        let dir_mode = fs::metadata(tmp.path().join("a")).unwrap().permissions().mode() & 0o777;
        assert_eq!(file_mode, 0o640);
        assert_eq!(dir_mode, 0o750);
    }
}
