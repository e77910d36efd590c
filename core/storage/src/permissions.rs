//! File permission policy.
//!
//! Unix targets map each policy onto mode bits. Elsewhere only the read-only
//! attribute is available, so the owner-only guarantees degrade to
//! "read-only or not".

use std::fs;
use std::path::Path;

use keyward_common::Result;

/// Permission policy for files and directories written by Keyward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    /// `0400`: wrapped key files.
    OwnerReadOnly,
    /// `0600`: files the owner rewrites, such as the account table.
    OwnerReadWrite,
    /// `0700`: the key directory.
    OwnerOnlyDir,
    /// `0644`: the public key.
    WorldReadable,
}

impl Permission {
    /// Unix mode bits for this policy.
    pub fn mode(self) -> u32 {
        match self {
            Permission::OwnerReadOnly => 0o400,
            Permission::OwnerReadWrite => 0o600,
            Permission::OwnerOnlyDir => 0o700,
            Permission::WorldReadable => 0o644,
        }
    }

    /// Apply this policy to an existing path.
    pub fn apply(self, path: &Path) -> Result<()> {
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(path, fs::Permissions::from_mode(self.mode()))?;
        }

        #[cfg(not(unix))]
        {
            let mut permissions = fs::metadata(path)?.permissions();
            permissions.set_readonly(self == Permission::OwnerReadOnly);
            fs::set_permissions(path, permissions)?;
        }

        Ok(())
    }

    /// Whether `path` currently carries exactly this policy.
    pub fn matches(self, path: &Path) -> Result<bool> {
        match mode_of(path)? {
            Some(mode) => Ok(mode == self.mode()),
            None => {
                let readonly = fs::metadata(path)?.permissions().readonly();
                Ok(readonly == (self == Permission::OwnerReadOnly))
            }
        }
    }
}

/// Current permission bits of `path` (`mode & 0o777`), or `None` on
/// platforms without Unix modes.
#[cfg(unix)]
pub fn mode_of(path: &Path) -> Result<Option<u32>> {
    use std::os::unix::fs::PermissionsExt;
    let mode = fs::metadata(path)?.permissions().mode() & 0o777;
    Ok(Some(mode))
}

#[cfg(not(unix))]
pub fn mode_of(path: &Path) -> Result<Option<u32>> {
    fs::metadata(path)?;
    Ok(None)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_apply_and_match() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("file");
        fs::write(&path, b"data").unwrap();

        Permission::WorldReadable.apply(&path).unwrap();
        assert_eq!(mode_of(&path).unwrap(), Some(0o644));
        assert!(Permission::WorldReadable.matches(&path).unwrap());
        assert!(!Permission::OwnerReadOnly.matches(&path).unwrap());

        Permission::OwnerReadOnly.apply(&path).unwrap();
        assert_eq!(mode_of(&path).unwrap(), Some(0o400));
    }

    #[test]
    fn test_missing_path_is_an_error() {
        let temp = TempDir::new().unwrap();
        assert!(mode_of(&temp.path().join("absent")).is_err());
    }
}
