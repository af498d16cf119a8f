//! Crash-safe file writes and permission validation.
//!
//! All persistent state (secrets ciphertext, leases, config) goes through
//! [`atomic_write_mode`]: write a sibling temp file, sync, rename over the
//! target, then fsync the parent directory. After a crash the target holds
//! either the old bytes or the new bytes, never a partial write.

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use uuid::Uuid;

use crate::error::{Result, StoreError};

/// File mode required for key material and state files.
pub const SECURE_FILE_MODE: u32 = 0o600;

/// Directory mode for the keyward data directory.
pub const SECURE_DIR_MODE: u32 = 0o700;

/// Create the data directory with owner-only permissions.
pub fn ensure_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(SECURE_DIR_MODE))?;
    }
    Ok(())
}

/// Atomically replace `path` with `data`, creating it with `mode`.
pub fn atomic_write_mode(path: &Path, data: &[u8], mode: u32) -> Result<()> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .ok_or_else(|| {
            std::io::Error::other(format!("path has no parent directory: {}", path.display()))
        })?;
    fs::create_dir_all(parent)?;

    let file_name = path.file_name().and_then(|s| s.to_str()).unwrap_or("file");
    let temp = parent.join(format!(".{}.tmp.{}", file_name, Uuid::new_v4()));

    let mut file = File::create(&temp)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(fs::Permissions::from_mode(mode))?;
    }
    #[cfg(not(unix))]
    let _ = mode;

    if let Err(e) = file.write_all(data).and_then(|()| file.sync_all()) {
        drop(file);
        let _ = fs::remove_file(&temp);
        return Err(e.into());
    }
    drop(file);

    if let Err(e) = fs::rename(&temp, path) {
        let _ = fs::remove_file(&temp);
        return Err(e.into());
    }

    fsync_dir(parent)?;
    Ok(())
}

/// Fsync the parent directory so the rename itself is durable.
#[cfg(unix)]
fn fsync_dir(path: &Path) -> std::io::Result<()> {
    File::open(path)?.sync_all()
}

#[cfg(not(unix))]
fn fsync_dir(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

/// Check that a state file is mode 0600.
///
/// A missing file passes: it will be created with the right mode.
pub fn validate_secure_mode(path: &Path) -> Result<()> {
    let meta = match fs::metadata(path) {
        Ok(meta) => meta,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e.into()),
    };

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = meta.permissions().mode() & 0o777;
        if mode != SECURE_FILE_MODE {
            return Err(StoreError::PermissionInsecure {
                path: path.display().to_string(),
                mode,
            }
            .into());
        }
    }
    #[cfg(not(unix))]
    let _ = meta;

    Ok(())
}

/// Validate every key file unless the operator override is set.
pub fn validate_key_files(paths: &[&Path], skip_check: bool) -> Result<()> {
    if skip_check {
        return Ok(());
    }
    for path in paths {
        validate_secure_mode(path)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_atomic_write_creates_and_overwrites() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");

        atomic_write_mode(&path, b"first", SECURE_FILE_MODE).unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"first");

        atomic_write_mode(&path, b"second", SECURE_FILE_MODE).unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"second");
    }

    #[test]
    fn test_atomic_write_leaves_no_temp_files() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        atomic_write_mode(&path, b"data", SECURE_FILE_MODE).unwrap();

        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["state.json"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_atomic_write_sets_mode() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let path = dir.path().join("secret.bin");
        atomic_write_mode(&path, b"x", SECURE_FILE_MODE).unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, SECURE_FILE_MODE);
    }

    #[test]
    fn test_validate_missing_file_passes() {
        let dir = tempdir().unwrap();
        validate_secure_mode(&dir.path().join("absent")).unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn test_validate_world_readable_fails() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let path = dir.path().join("leaky");
        fs::write(&path, b"x").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();

        let err = validate_secure_mode(&path).unwrap_err();
        assert!(err.to_string().contains("insecure permissions"));

        // Operator override skips the check entirely.
        validate_key_files(&[path.as_path()], true).unwrap();
    }
}
