//! File operations for private keys and signature artifacts
//!
//! Private keys are read with a permission check: on Unix, a key that group or
//! others can access is still loaded, but a warning is logged.
//!
//! Signatures are written atomically. Data goes to a temporary file next to the
//! target, is synced, and is then renamed over the target, so a failed write
//! never leaves a truncated signature behind.
//!
//! # Example
//!
//! ```no_run
//! use ssign::secure_file;
//! use std::path::Path;
//!
//! let key = secure_file::read_secure(Path::new("/home/me/.ssh/id_ed25519"))?;
//! secure_file::write_atomic(Path::new("README.md.ssig"), b"-----BEGIN SSH SIGNATURE-----\n")?;
//! # Ok::<(), ssign::SSError>(())
//! ```

use crate::error::SSError;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Permission bits for signature artifacts (world readable, owner writable).
#[cfg(unix)]
pub const ARTIFACT_FILE_MODE: u32 = 0o644;

/// Check if file permissions are restrictive enough for a private key (Unix only)
///
/// Returns `Ok(())` in every case where the metadata can be read; overly
/// permissive files only produce a warning.
#[cfg(unix)]
pub fn check_permissions(path: &Path) -> Result<(), SSError> {
    use std::os::unix::fs::PermissionsExt;

    let metadata = fs::metadata(path).map_err(|e| SSError::file(path, e))?;
    let perm_bits = metadata.permissions().mode() & 0o777;

    if perm_bits & 0o077 != 0 {
        log::warn!(
            "Private key '{}' is accessible by others (mode {:o}). \
             Consider running: chmod 600 '{}'",
            path.display(),
            perm_bits,
            path.display()
        );
    }

    Ok(())
}

#[cfg(not(unix))]
pub fn check_permissions(path: &Path) -> Result<(), SSError> {
    log::debug!(
        "Permission check skipped for '{}': not supported on this platform",
        path.display()
    );
    Ok(())
}

/// Read a private key file after checking its permissions.
pub fn read_secure(path: &Path) -> Result<Vec<u8>, SSError> {
    check_permissions(path)?;
    fs::read(path).map_err(|e| SSError::file(path, e))
}

fn temp_path_for(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{}.{}.tmp", name, std::process::id()))
}

/// Write `data` to `path` atomically.
///
/// Either the complete new content is visible at `path`, or the previous state
/// (including absence) is left untouched.
pub fn write_atomic(path: &Path, data: &[u8]) -> Result<(), SSError> {
    let tmp = temp_path_for(path);
    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(ARTIFACT_FILE_MODE);
    }
    // Not ours if it already exists.
    let file = options.open(&tmp).map_err(|e| SSError::file(&tmp, e))?;

    let result = write_then_rename(file, &tmp, path, data);
    if result.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    result
}

fn write_then_rename(
    mut file: fs::File,
    tmp: &Path,
    path: &Path,
    data: &[u8],
) -> Result<(), SSError> {
    file.write_all(data).map_err(|e| SSError::file(path, e))?;
    file.sync_all().map_err(|e| SSError::file(path, e))?;
    drop(file);

    fs::rename(tmp, path).map_err(|e| SSError::file(path, e))?;

    #[cfg(unix)]
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty())
        && let Ok(dir) = fs::File::open(dir)
    {
        let _ = dir.sync_all();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_atomic_and_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("file.txt.ssig");

        write_atomic(&path, b"signature").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"signature");
    }

    #[test]
    fn test_write_atomic_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("file.txt.ssig");

        write_atomic(&path, b"initial data").unwrap();
        write_atomic(&path, b"new").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"new");
    }

    #[test]
    fn test_write_atomic_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("file.txt.ssig");

        write_atomic(&path, b"signature").unwrap();
        let entries: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_write_atomic_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nonexistent_dir").join("file.ssig");

        let result = write_atomic(&path, b"test");
        assert!(matches!(result, Err(SSError::FileError(..))));
        assert!(!path.exists());
    }

    #[test]
    fn test_write_atomic_failure_keeps_previous_content() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("occupied");
        fs::create_dir(&target).unwrap();
        fs::write(target.join("inner"), b"x").unwrap();

        // Renaming a file over a non-empty directory fails.
        assert!(write_atomic(&target, b"data").is_err());
        assert!(target.is_dir());
        let leftovers: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(leftovers.len(), 1);
    }

    #[test]
    fn test_write_atomic_keeps_foreign_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("file.txt.ssig");
        let tmp = temp_path_for(&path);
        fs::write(&tmp, b"not ours").unwrap();

        let result = write_atomic(&path, b"signature");
        assert!(matches!(result, Err(SSError::FileError(..))));
        assert_eq!(fs::read(&tmp).unwrap(), b"not ours");
        assert!(!path.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_write_atomic_mode() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("file.ssig");
        write_atomic(&path, b"data").unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        // umask can only remove bits
        assert_eq!(mode & !ARTIFACT_FILE_MODE, 0);
    }

    #[test]
    fn test_read_secure_nonexistent_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = read_secure(&dir.path().join("nonexistent.key"));
        assert!(matches!(result, Err(SSError::FileError(..))));
    }

    #[cfg(unix)]
    #[test]
    fn test_read_insecure_file_still_reads() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("id_ed25519");
        fs::write(&path, b"secret data").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();

        assert!(check_permissions(&path).is_ok());
        assert_eq!(read_secure(&path).unwrap(), b"secret data");
    }
}
