//! Configuration Module
//!
//! Handles loading and managing cache configuration from environment variables.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Default TTL in seconds (one day).
pub const DEFAULT_TTL: i64 = 86_400;

/// Default permission mode for created directories.
pub const DEFAULT_DIR_MODE: u32 = 0o775;

/// Default permission mode for created entry files.
pub const DEFAULT_FILE_MODE: u32 = 0o664;

/// File cache configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Absolute root path of the cache-file tree
    pub root: PathBuf,
    /// Default TTL in seconds for entries written without explicit TTL
    pub default_ttl: i64,
    /// Permission mode applied to created directories (unix only)
    pub dir_mode: Option<u32>,
    /// Permission mode applied to created entry files (unix only)
    pub file_mode: Option<u32>,
    /// Optional prefix mixed into every key hash
    pub namespace: String,
    /// Bounded wait for counter shard locks; `None` blocks indefinitely
    pub lock_timeout: Option<Duration>,
    /// Age after which an orphaned temp file is swept
    pub temp_file_grace: Duration,
    /// Background sweep interval in seconds
    pub sweep_interval: u64,
}

impl CacheConfig {
    /// Creates a config rooted at `root` with default settings otherwise.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    /// Sets the default TTL in seconds.
    pub fn with_default_ttl(mut self, seconds: i64) -> Self {
        self.default_ttl = seconds;
        self
    }

    /// Sets the directory and file permission modes.
    pub fn with_modes(mut self, dir_mode: u32, file_mode: u32) -> Self {
        self.dir_mode = Some(dir_mode);
        self.file_mode = Some(file_mode);
        self
    }

    /// Sets the key hash namespace.
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Bounds the wait for counter locks.
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = Some(timeout);
        self
    }

    /// Creates a new CacheConfig by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `FILECACHE_ROOT` - Cache root directory (default: `<tmp>/filecache`)
    /// - `FILECACHE_DEFAULT_TTL` - Default TTL in seconds (default: 86400)
    /// - `FILECACHE_DIR_MODE` - Octal directory mode (default: 775)
    /// - `FILECACHE_FILE_MODE` - Octal file mode (default: 664)
    /// - `FILECACHE_NAMESPACE` - Key hash namespace (default: empty)
    /// - `FILECACHE_LOCK_TIMEOUT_MS` - Counter lock wait (default: unbounded)
    /// - `FILECACHE_TEMP_GRACE` - Orphaned temp file age in seconds (default: 3600)
    /// - `FILECACHE_SWEEP_INTERVAL` - Sweep frequency in seconds (default: 3600)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            root: env::var("FILECACHE_ROOT")
                .map(PathBuf::from)
                .unwrap_or(defaults.root),
            default_ttl: env::var("FILECACHE_DEFAULT_TTL")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.default_ttl),
            dir_mode: env::var("FILECACHE_DIR_MODE")
                .ok()
                .and_then(|v| parse_octal(&v))
                .or(defaults.dir_mode),
            file_mode: env::var("FILECACHE_FILE_MODE")
                .ok()
                .and_then(|v| parse_octal(&v))
                .or(defaults.file_mode),
            namespace: env::var("FILECACHE_NAMESPACE").unwrap_or(defaults.namespace),
            lock_timeout: env::var("FILECACHE_LOCK_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_millis),
            temp_file_grace: env::var("FILECACHE_TEMP_GRACE")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.temp_file_grace),
            sweep_interval: env::var("FILECACHE_SWEEP_INTERVAL")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.sweep_interval),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            root: env::temp_dir().join("filecache"),
            default_ttl: DEFAULT_TTL,
            dir_mode: Some(DEFAULT_DIR_MODE),
            file_mode: Some(DEFAULT_FILE_MODE),
            namespace: String::new(),
            lock_timeout: None,
            temp_file_grace: Duration::from_secs(3600),
            sweep_interval: 3600,
        }
    }
}

/// Parses a mode such as `775` or `0o775`.
fn parse_octal(value: &str) -> Option<u32> {
    let digits = value.trim().trim_start_matches("0o");
    u32::from_str_radix(digits, 8).ok()
}
