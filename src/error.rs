//! Error types for the file cache
//!
//! Provides unified error handling using thiserror.
//!
//! Only contract violations (bad keys, bad TTLs, unusable storage root) and
//! internal storage failures travel through `CacheError`. The public cache
//! facade absorbs storage failures into `false` / `None` results.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the file cache.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Key is empty or contains a reserved character
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// TTL cannot be resolved to an expiration timestamp
    #[error("invalid TTL: {0}")]
    InvalidTtl(String),

    /// Storage root is missing or not writable
    #[error("invalid cache path {}: {reason}", path.display())]
    InvalidPath { path: PathBuf, reason: String },

    /// Value could not be serialized for storage
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Shard lock was not acquired within the configured wait
    #[error("timed out waiting for lock {}", .0.display())]
    LockTimeout(PathBuf),

    /// Counter arithmetic left the i64 range
    #[error("counter overflow for key {0}")]
    Overflow(String),

    /// Underlying filesystem failure
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl CacheError {
    /// Returns true for errors caused by the caller rather than the environment.
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            CacheError::InvalidKey(_) | CacheError::InvalidTtl(_) | CacheError::InvalidPath { .. }
        )
    }
}

// == Result Type Alias ==
/// Convenience Result type for the file cache.
pub type Result<T> = std::result::Result<T, CacheError>;
