//! Key Module
//!
//! Key validation and the deterministic key-to-path mapping.
//!
//! Keys hash to `<root>/<h0>/<h1>/<h2..h63>` where `h` is the lower-case hex
//! SHA-256 digest of the namespace followed by the key. The first two digest
//! characters select one of 256 shard directories.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::error::{CacheError, Result};

// == Public Constants ==
/// Characters reserved by PSR-16 that may not appear in a key
pub const RESERVED_CHARACTERS: &[char] = &['{', '}', '(', ')', '/', '\\', '@', ':'];

/// Name of the per-shard advisory lock file
pub const LOCK_FILE_NAME: &str = ".lock";

// == Validate Key ==
/// Rejects empty keys and keys containing a reserved character.
pub fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(CacheError::InvalidKey("empty string given".to_string()));
    }

    if let Some(c) = key.chars().find(|c| RESERVED_CHARACTERS.contains(c)) {
        return Err(CacheError::InvalidKey(format!(
            "invalid character in key: {c}"
        )));
    }

    Ok(())
}

// == Key Path ==
/// Location of one entry inside the sharded tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPath {
    /// Entry file path
    pub file: PathBuf,
    /// Second-level shard directory containing the entry
    pub shard: PathBuf,
}

impl KeyPath {
    /// Path of the shard's advisory lock file.
    pub fn lock_file(&self) -> PathBuf {
        self.shard.join(LOCK_FILE_NAME)
    }
}

// == Path Mapper ==
/// Maps validated keys onto the sharded directory tree under `root`.
#[derive(Debug, Clone)]
pub struct PathMapper {
    root: PathBuf,
    namespace: String,
}

impl PathMapper {
    pub fn new(root: impl Into<PathBuf>, namespace: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            namespace: namespace.into(),
        }
    }

    /// Storage root all paths are derived from.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Hex digest for `key`. Assumes the key was already validated.
    pub fn digest(&self, key: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.namespace.as_bytes());
        hasher.update(key.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Computes the entry path for `key`. Pure; creates no directories.
    pub fn path_for(&self, key: &str) -> KeyPath {
        let hash = self.digest(key);
        let shard = self.root.join(&hash[0..1]).join(&hash[1..2]);
        let file = shard.join(&hash[2..]);
        KeyPath { file, shard }
    }
}
