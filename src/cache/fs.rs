//! Filesystem helpers shared by the store and the counter engine.

use std::fs;
use std::io;
use std::path::Path;

use tracing::debug;

// == Ensure Dir ==
/// Creates `dir` and any missing parents, applying `mode` to each directory
/// this call creates. Existing directories are left untouched.
pub fn ensure_dir(dir: &Path, mode: Option<u32>) -> io::Result<()> {
    if dir.is_dir() {
        return Ok(());
    }

    if let Some(parent) = dir.parent().filter(|p| !p.as_os_str().is_empty()) {
        ensure_dir(parent, mode)?;
    }

    match fs::create_dir(dir) {
        Ok(()) => {
            debug!(path = %dir.display(), "created cache directory");
            set_mode(dir, mode)
        }
        // Another process won the race
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists && dir.is_dir() => Ok(()),
        Err(e) => Err(e),
    }
}

// == Set Mode ==
/// Applies a unix permission mode. No-op when `mode` is `None` or off unix.
pub fn set_mode(path: &Path, mode: Option<u32>) -> io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Some(mode) = mode {
            fs::set_permissions(path, fs::Permissions::from_mode(mode))?;
        }
    }

    #[cfg(not(unix))]
    let _ = (path, mode);

    Ok(())
}

// == Remove File ==
/// Removes a file, treating "already gone" as success.
///
/// Returns `true` if this call deleted the file.
pub fn remove_if_exists(path: &Path) -> io::Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}
