//! Local filesystem I/O for secret files.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::permissions::Permission;
use keyward_common::{Error, Result};

/// Outcome of [`ensure_dir`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirStatus {
    /// The directory did not exist and was created.
    Created,
    /// The directory existed with other permissions, which were corrected.
    Repaired,
    /// The directory already existed with the requested permissions.
    Unchanged,
}

fn staging_path(path: &Path) -> Result<PathBuf> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| Error::InvalidInput(format!("Not a file path: {}", path.display())))?;
    Ok(path.with_file_name(format!(".{}.tmp", name)))
}

fn check_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            return Err(Error::NotFound(format!(
                "Parent directory not found: {}",
                parent.display()
            )));
        }
    }
    Ok(())
}

/// Create `path` exclusively with the final mode and write `data` to it.
fn write_new(path: &Path, data: &[u8], permission: Permission) -> Result<()> {
    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(permission.mode());
    }

    let mut file = options.open(path)?;
    file.write_all(data)?;
    file.sync_all()?;
    drop(file);

    permission.apply(path)
}

fn write_staged(staging: &Path, path: &Path, data: &[u8], permission: Permission) -> Result<()> {
    write_new(staging, data, permission)?;
    fs::rename(staging, path)?;
    Ok(())
}

/// Write `data` to `path` and set its permissions.
///
/// The bytes are first written to a sibling staging file created with the
/// final mode, then renamed over `path`. An existing read-only target is
/// therefore replaced rather than failing, and a crash never leaves a
/// half-written file at `path`.
///
/// # Errors
/// - `NotFound` if the parent directory does not exist
/// - `Io` for any other filesystem failure
pub fn write_secret_file(path: &Path, data: &[u8], permission: Permission) -> Result<()> {
    check_parent(path)?;

    let staging = staging_path(path)?;
    if staging.exists() {
        fs::remove_file(&staging)?;
    }

    let written = write_staged(&staging, path, data, permission);
    if written.is_err() && staging.exists() {
        if let Err(e) = fs::remove_file(&staging) {
            warn!("Failed to remove staging file {}: {}", staging.display(), e);
        }
    }
    written?;

    debug!("Wrote {} bytes to {}", data.len(), path.display());
    Ok(())
}

/// Write `data` to a new file at `path` and set its permissions.
///
/// Never replaces an existing file; key material is written this way.
///
/// # Errors
/// - `InvalidInput` if `path` already exists
/// - `NotFound` if the parent directory does not exist
pub fn create_secret_file(path: &Path, data: &[u8], permission: Permission) -> Result<()> {
    check_parent(path)?;

    match write_new(path, data, permission) {
        Ok(()) => {}
        Err(Error::Io(e)) if e.kind() == ErrorKind::AlreadyExists => {
            return Err(Error::InvalidInput(format!(
                "Refusing to overwrite existing file: {}",
                path.display()
            )));
        }
        Err(e) => return Err(e),
    }

    debug!("Created {} ({} bytes)", path.display(), data.len());
    Ok(())
}

/// Read the full contents of `path`.
///
/// # Errors
/// - `NotFound` if the file does not exist
pub fn read_secret_file(path: &Path) -> Result<Vec<u8>> {
    if !path.exists() {
        return Err(Error::NotFound(format!("File not found: {}", path.display())));
    }

    if path.is_dir() {
        return Err(Error::InvalidInput(format!(
            "Expected a file, found a directory: {}",
            path.display()
        )));
    }

    Ok(fs::read(path)?)
}

/// Create `path` as a directory with `permission`, or correct the
/// permissions of an existing directory. Idempotent; contents are untouched.
pub fn ensure_dir(path: &Path, permission: Permission) -> Result<DirStatus> {
    if !path.exists() {
        fs::create_dir_all(path)?;
        permission.apply(path)?;
        return Ok(DirStatus::Created);
    }

    if !path.is_dir() {
        return Err(Error::InvalidInput(format!(
            "Expected a directory: {}",
            path.display()
        )));
    }

    if permission.matches(path)? {
        return Ok(DirStatus::Unchanged);
    }

    permission.apply(path)?;
    Ok(DirStatus::Repaired)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_read_roundtrip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("secret.bin");

        write_secret_file(&path, b"wrapped", Permission::OwnerReadOnly).unwrap();

        assert_eq!(read_secret_file(&path).unwrap(), b"wrapped");
        assert!(!staging_path(&path).unwrap().exists());
    }

    #[test]
    fn test_read_missing_file_is_not_found() {
        let temp = TempDir::new().unwrap();
        let result = read_secret_file(&temp.path().join("absent"));

        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[test]
    fn test_write_into_missing_dir_is_not_found() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nope").join("file");

        let result = write_secret_file(&path, b"x", Permission::OwnerReadWrite);
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[test]
    fn test_overwrites_read_only_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("key");

        write_secret_file(&path, b"first", Permission::OwnerReadOnly).unwrap();
        write_secret_file(&path, b"second", Permission::OwnerReadOnly).unwrap();

        assert_eq!(read_secret_file(&path).unwrap(), b"second");
    }

    #[test]
    fn test_create_never_replaces_existing_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("private_key.pem");

        create_secret_file(&path, b"original", Permission::OwnerReadOnly).unwrap();
        let result = create_secret_file(&path, b"replacement", Permission::OwnerReadOnly);

        assert!(matches!(result, Err(Error::InvalidInput(_))));
        assert_eq!(read_secret_file(&path).unwrap(), b"original");
    }

    #[test]
    fn test_create_into_missing_dir_is_not_found() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nope").join("file");

        let result = create_secret_file(&path, b"x", Permission::OwnerReadOnly);
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[cfg(unix)]
    #[test]
    fn test_modes_are_applied() {
        use crate::permissions::mode_of;

        let temp = TempDir::new().unwrap();
        let private = temp.path().join("private");
        let public = temp.path().join("public");

        write_secret_file(&private, b"p", Permission::OwnerReadOnly).unwrap();
        write_secret_file(&public, b"q", Permission::WorldReadable).unwrap();

        assert_eq!(mode_of(&private).unwrap(), Some(0o400));
        assert_eq!(mode_of(&public).unwrap(), Some(0o644));
    }

    #[cfg(unix)]
    #[test]
    fn test_ensure_dir_creates_then_repairs() {
        use crate::permissions::mode_of;

        let temp = TempDir::new().unwrap();
        let dir = temp.path().join(".keys");

        assert_eq!(
            ensure_dir(&dir, Permission::OwnerOnlyDir).unwrap(),
            DirStatus::Created
        );
        assert_eq!(mode_of(&dir).unwrap(), Some(0o700));
        assert_eq!(
            ensure_dir(&dir, Permission::OwnerOnlyDir).unwrap(),
            DirStatus::Unchanged
        );

        fs::write(dir.join("inside"), b"keep me").unwrap();
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&dir, fs::Permissions::from_mode(0o755)).unwrap();
        }

        assert_eq!(
            ensure_dir(&dir, Permission::OwnerOnlyDir).unwrap(),
            DirStatus::Repaired
        );
        assert_eq!(mode_of(&dir).unwrap(), Some(0o700));
        assert_eq!(fs::read(dir.join("inside")).unwrap(), b"keep me");
    }
}
