//! Key vault: generation and loading of the wrapped X25519 keypair.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use crate::config::{VaultLayout, ENCRYPTION_KEY_VAR, SALT_VAR};
use keyward_common::{Error, Result};
use keyward_crypto::{
    unwrap_master_key, unwrap_private_key, validate_keypair, wrap_master_key, wrap_private_key,
    EncryptionConfig, EncryptionKey, KeyPair, MasterKey, PublicKey, Salt,
};
use keyward_storage::{
    create_secret_file, ensure_dir, read_env_var, read_secret_file, write_env_var, DirStatus,
    EnvValue, Permission,
};

/// What is currently on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VaultState {
    /// None of the key files exist.
    Uninitialized,
    /// Some key files exist, but not all three.
    Partial,
    /// Master, private, and public key files all exist.
    Present,
}

/// Manages the key files of one [`VaultLayout`].
///
/// The vault holds no key material itself. [`KeyVault::load`] hands the
/// caller a [`KeyPair`], which the caller keeps resident for the rest of
/// the process.
#[derive(Debug, Clone)]
pub struct KeyVault {
    layout: VaultLayout,
    config: EncryptionConfig,
}

impl KeyVault {
    pub fn new(layout: VaultLayout, config: EncryptionConfig) -> Self {
        Self { layout, config }
    }

    /// Generate keys if none exist yet, then load them.
    pub fn open(layout: VaultLayout, config: EncryptionConfig) -> Result<KeyPair> {
        let vault = Self::new(layout, config);
        vault.generate_if_absent()?;
        vault.load()
    }

    pub fn layout(&self) -> &VaultLayout {
        &self.layout
    }

    /// Create the keys directory with mode 0700, or repair its mode.
    ///
    /// Idempotent. Files inside the directory are left alone. Generation
    /// and loading run this first.
    pub fn ensure_directory(&self) -> Result<()> {
        let dir = self.layout.keys_dir();
        match ensure_dir(&dir, Permission::OwnerOnlyDir)? {
            DirStatus::Created => debug!("Created key directory {}", dir.display()),
            DirStatus::Repaired => warn!("Repaired permissions on {}", dir.display()),
            DirStatus::Unchanged => {}
        }
        Ok(())
    }

    /// Inspect the key files without reading them.
    pub fn state(&self) -> VaultState {
        let present = [
            self.layout.master_key_file(),
            self.layout.private_key_file(),
            self.layout.public_key_file(),
        ]
        .iter()
        .filter(|path| path.exists())
        .count();

        match present {
            0 => VaultState::Uninitialized,
            3 => VaultState::Present,
            _ => VaultState::Partial,
        }
    }

    /// Generate and persist a new keypair if no key files exist yet.
    ///
    /// Returns `true` if keys were generated. A complete vault is left as
    /// is. An incomplete one is an error and no file in it is touched.
    ///
    /// # Postconditions
    /// - master and private key files are mode 0400, public key file 0644
    /// - `SALT` and `ENCRYPTION_KEY` are set in the env file
    ///
    /// # Errors
    /// - `VaultLoadFailed` wrapping `InvalidInput` if the vault is
    ///   incomplete
    /// - `VaultLoadFailed` wrapping the underlying I/O or crypto error
    pub fn generate_if_absent(&self) -> Result<bool> {
        self.ensure_directory().map_err(Error::vault_load)?;

        match self.state() {
            VaultState::Present => {
                debug!("Keypair already present in {}", self.layout.keys_dir().display());
                Ok(false)
            }
            VaultState::Partial => Err(Error::vault_load(Error::InvalidInput(format!(
                "Incomplete vault in {}; move the remaining key files away and generate again",
                self.layout.keys_dir().display()
            )))),
            VaultState::Uninitialized => {
                self.generate().map_err(Error::vault_load)?;
                info!("Generated new keypair in {}", self.layout.keys_dir().display());
                Ok(true)
            }
        }
    }

    fn generate(&self) -> Result<()> {
        let keypair = KeyPair::generate();
        let master_key = MasterKey::generate();

        let wrapped_private = wrap_private_key(keypair.private_key(), &master_key)?;
        let wrapped_master = wrap_master_key(&master_key, &self.config)?;
        drop(master_key);

        create_secret_file(
            &self.layout.master_key_file(),
            &wrapped_master.ciphertext,
            Permission::OwnerReadOnly,
        )?;
        create_secret_file(
            &self.layout.private_key_file(),
            &wrapped_private,
            Permission::OwnerReadOnly,
        )?;
        create_secret_file(
            &self.layout.public_key_file(),
            keypair.public_key().as_bytes(),
            Permission::WorldReadable,
        )?;

        let env_file = self.layout.env_file();
        write_env_var(
            &env_file,
            SALT_VAR,
            EnvValue::Bytes(wrapped_master.salt.as_bytes()),
        )?;
        write_env_var(
            &env_file,
            ENCRYPTION_KEY_VAR,
            EnvValue::Bytes(wrapped_master.encryption_key.as_bytes()),
        )?;

        Ok(())
    }

    /// Read the four artifacts and reconstruct the keypair.
    ///
    /// The recovered keypair is checked with a seal/unseal probe before it
    /// is returned. The master key is wiped before this returns.
    ///
    /// # Errors
    /// - `VaultLoadFailed` wrapping the first failure: a missing file, a
    ///   missing env secret, a failed unwrap, or a failed probe
    pub fn load(&self) -> Result<KeyPair> {
        self.ensure_directory().map_err(Error::vault_load)?;
        let keypair = self.load_inner().map_err(Error::vault_load)?;
        info!("Loaded keypair from {}", self.layout.keys_dir().display());
        Ok(keypair)
    }

    fn load_inner(&self) -> Result<KeyPair> {
        let master_ciphertext = read_secret_file(&self.layout.master_key_file())?;
        let private_ciphertext = read_secret_file(&self.layout.private_key_file())?;
        let public_bytes = read_secret_file(&self.layout.public_key_file())?;

        let env_file = self.layout.env_file();
        let salt = Salt::from_slice(&decode_secret(&read_env_var(&env_file, SALT_VAR)?, SALT_VAR)?)?;
        let encryption_key = EncryptionKey::from_slice(&decode_secret(
            &read_env_var(&env_file, ENCRYPTION_KEY_VAR)?,
            ENCRYPTION_KEY_VAR,
        )?)?;

        let master_key =
            unwrap_master_key(&master_ciphertext, &salt, &encryption_key, &self.config)?;
        drop(encryption_key);
        let private_key = unwrap_private_key(&private_ciphertext, &master_key)?;
        drop(master_key);

        let public_key = PublicKey::from_slice(&public_bytes)?;
        validate_keypair(&private_key, &public_key)?;

        Ok(KeyPair::from_parts(private_key, public_key))
    }
}

fn decode_secret(value: &str, name: &str) -> Result<Zeroizing<Vec<u8>>> {
    BASE64
        .decode(value.trim())
        .map(Zeroizing::new)
        .map_err(|_| Error::Serialization(format!("{} is not valid base64", name)))
}
