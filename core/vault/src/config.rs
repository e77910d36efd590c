//! On-disk layout of a Keyward configuration directory.

use std::path::{Path, PathBuf};

use keyward_common::{Error, Result};

/// Directory holding the wrapped keys, relative to the base directory.
pub const KEYS_DIRNAME: &str = ".keys";

/// Wrapped master key file name in the keys directory.
pub const MASTER_KEY_FILENAME: &str = "master_key.enc";

/// Wrapped private key file name in the keys directory.
pub const PRIVATE_KEY_FILENAME: &str = "private_key.pem";

/// Public key file name in the keys directory.
pub const PUBLIC_KEY_FILENAME: &str = "public_key.pem";

/// Env-style secret file name in the base directory.
pub const ENV_FILENAME: &str = ".env";

/// Account table file name in the base directory.
pub const ACCOUNTS_FILENAME: &str = "accounts.yaml";

/// Name of the application directory under the platform config dir.
pub const APP_DIRNAME: &str = "keyward";

/// Env file key holding the base64 KDF salt.
pub const SALT_VAR: &str = "SALT";

/// Env file key holding the base64 encryption key.
pub const ENCRYPTION_KEY_VAR: &str = "ENCRYPTION_KEY";

/// Resolved paths of every artifact under one base directory.
///
/// ```text
/// <base>/.keys/master_key.enc
/// <base>/.keys/private_key.pem
/// <base>/.keys/public_key.pem
/// <base>/.env
/// <base>/accounts.yaml
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultLayout {
    base_dir: PathBuf,
}

impl VaultLayout {
    /// Layout rooted at `base_dir`.
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Layout rooted at the platform config directory, e.g.
    /// `~/.config/keyward` on Linux.
    ///
    /// # Errors
    /// - `NotFound` if the platform has no config directory
    pub fn system_default() -> Result<Self> {
        let base = dirs::config_dir().ok_or_else(|| {
            Error::NotFound("No configuration directory for this platform".to_string())
        })?;
        Ok(Self::new(base.join(APP_DIRNAME)))
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn keys_dir(&self) -> PathBuf {
        self.base_dir.join(KEYS_DIRNAME)
    }

    pub fn master_key_file(&self) -> PathBuf {
        self.keys_dir().join(MASTER_KEY_FILENAME)
    }

    pub fn private_key_file(&self) -> PathBuf {
        self.keys_dir().join(PRIVATE_KEY_FILENAME)
    }

    pub fn public_key_file(&self) -> PathBuf {
        self.keys_dir().join(PUBLIC_KEY_FILENAME)
    }

    pub fn env_file(&self) -> PathBuf {
        self.base_dir.join(ENV_FILENAME)
    }

    pub fn accounts_file(&self) -> PathBuf {
        self.base_dir.join(ACCOUNTS_FILENAME)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_resolve_under_base() {
        let layout = VaultLayout::new("/tmp/kw");

        assert_eq!(
            layout.master_key_file(),
            PathBuf::from("/tmp/kw/.keys/master_key.enc")
        );
        assert_eq!(
            layout.private_key_file(),
            PathBuf::from("/tmp/kw/.keys/private_key.pem")
        );
        assert_eq!(
            layout.public_key_file(),
            PathBuf::from("/tmp/kw/.keys/public_key.pem")
        );
        assert_eq!(layout.env_file(), PathBuf::from("/tmp/kw/.env"));
        assert_eq!(layout.accounts_file(), PathBuf::from("/tmp/kw/accounts.yaml"));
    }

    #[test]
    fn test_system_default_ends_in_app_dir() {
        if let Ok(layout) = VaultLayout::system_default() {
            assert!(layout.base_dir().ends_with(APP_DIRNAME));
        }
    }
}
