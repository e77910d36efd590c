//! Key types with secure memory handling.
//!
//! All secret key types zeroize their memory on drop so that key material
//! does not outlive its last use.

use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;
use x25519_dalek::StaticSecret;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use keyward_common::{Error, Result};

/// Length of symmetric and X25519 keys in bytes (256-bit).
pub const KEY_LENGTH: usize = 32;

/// Length of the KDF salt in bytes.
pub const SALT_LENGTH: usize = 32;

/// Overwrite a buffer with zeros in place.
///
/// Used for ad-hoc copies of key material that are not already held in a
/// zeroizing type, immediately after their last use.
pub fn secure_erase<Z: Zeroize + ?Sized>(buffer: &mut Z) {
    buffer.zeroize();
}

fn random_key() -> [u8; KEY_LENGTH] {
    let mut key = [0u8; KEY_LENGTH];
    OsRng.fill_bytes(&mut key);
    key
}

/// Master key that wraps the private key at rest.
///
/// Only ever written to disk in wrapped form.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct MasterKey {
    key: [u8; KEY_LENGTH],
}

impl MasterKey {
    /// Create a master key from raw bytes.
    pub fn from_bytes(key: [u8; KEY_LENGTH]) -> Self {
        Self { key }
    }

    /// Generate a random master key.
    pub fn generate() -> Self {
        Self { key: random_key() }
    }

    /// Get the key bytes.
    ///
    /// # Security
    /// The returned slice should be used immediately and not stored.
    pub fn as_bytes(&self) -> &[u8; KEY_LENGTH] {
        &self.key
    }
}

impl fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MasterKey([REDACTED])")
    }
}

/// Key derived by Argon2id; wraps the master key.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct DerivedKey {
    key: [u8; KEY_LENGTH],
}

impl DerivedKey {
    pub(crate) fn from_bytes(key: [u8; KEY_LENGTH]) -> Self {
        Self { key }
    }

    /// Get the key bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_LENGTH] {
        &self.key
    }
}

impl fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DerivedKey([REDACTED])")
    }
}

/// High-entropy input to the KDF, stored in the env file as `ENCRYPTION_KEY`.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct EncryptionKey {
    key: [u8; KEY_LENGTH],
}

impl EncryptionKey {
    /// Create an encryption key from raw bytes.
    pub fn from_bytes(key: [u8; KEY_LENGTH]) -> Self {
        Self { key }
    }

    /// Create from a slice, which must be exactly `KEY_LENGTH` bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let key: [u8; KEY_LENGTH] = bytes.try_into().map_err(|_| {
            Error::InvalidInput(format!(
                "Invalid encryption key length: expected {}, got {}",
                KEY_LENGTH,
                bytes.len()
            ))
        })?;
        Ok(Self { key })
    }

    /// Generate a random encryption key.
    pub fn generate() -> Self {
        Self { key: random_key() }
    }

    /// Get the key bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_LENGTH] {
        &self.key
    }
}

impl fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EncryptionKey([REDACTED])")
    }
}

/// Salt for key derivation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Salt(pub [u8; SALT_LENGTH]);

impl Salt {
    /// Generate a random salt.
    pub fn generate() -> Self {
        let mut salt = [0u8; SALT_LENGTH];
        OsRng.fill_bytes(&mut salt);
        Self(salt)
    }

    /// Create from bytes.
    pub fn from_bytes(bytes: [u8; SALT_LENGTH]) -> Self {
        Self(bytes)
    }

    /// Create from a slice, which must be exactly `SALT_LENGTH` bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let salt: [u8; SALT_LENGTH] = bytes.try_into().map_err(|_| {
            Error::InvalidInput(format!(
                "Invalid salt length: expected {}, got {}",
                SALT_LENGTH,
                bytes.len()
            ))
        })?;
        Ok(Self(salt))
    }

    /// Get the salt bytes.
    pub fn as_bytes(&self) -> &[u8; SALT_LENGTH] {
        &self.0
    }
}

/// X25519 private key used to unseal account passwords.
///
/// The inner secret zeroizes itself on drop.
#[derive(Clone)]
pub struct PrivateKey(StaticSecret);

impl PrivateKey {
    /// Generate a fresh private key from the OS RNG.
    pub fn generate() -> Self {
        Self(StaticSecret::random_from_rng(OsRng))
    }

    /// Create a private key from raw bytes.
    pub fn from_bytes(bytes: [u8; KEY_LENGTH]) -> Self {
        Self(StaticSecret::from(bytes))
    }

    /// Derive the matching public key.
    pub fn public_key(&self) -> PublicKey {
        PublicKey(x25519_dalek::PublicKey::from(&self.0))
    }

    /// Copy out the raw key bytes in a zeroizing container.
    pub fn to_bytes(&self) -> Zeroizing<[u8; KEY_LENGTH]> {
        Zeroizing::new(self.0.to_bytes())
    }

    pub(crate) fn secret(&self) -> &StaticSecret {
        &self.0
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PrivateKey([REDACTED])")
    }
}

/// X25519 public key used to seal account passwords.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublicKey(x25519_dalek::PublicKey);

impl PublicKey {
    /// Create a public key from raw bytes.
    pub fn from_bytes(bytes: [u8; KEY_LENGTH]) -> Self {
        Self(x25519_dalek::PublicKey::from(bytes))
    }

    /// Create from a slice, which must be exactly `KEY_LENGTH` bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let key: [u8; KEY_LENGTH] = bytes.try_into().map_err(|_| {
            Error::InvalidInput(format!(
                "Invalid public key length: expected {}, got {}",
                KEY_LENGTH,
                bytes.len()
            ))
        })?;
        Ok(Self::from_bytes(key))
    }

    /// Get the key bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_LENGTH] {
        self.0.as_bytes()
    }

    pub(crate) fn inner(&self) -> &x25519_dalek::PublicKey {
        &self.0
    }
}

/// A private key together with its public key.
///
/// Immutable once built; share it across threads behind an `Arc`.
#[derive(Clone)]
pub struct KeyPair {
    private_key: PrivateKey,
    public_key: PublicKey,
}

impl KeyPair {
    /// Generate a fresh keypair.
    pub fn generate() -> Self {
        let private_key = PrivateKey::generate();
        let public_key = private_key.public_key();
        Self {
            private_key,
            public_key,
        }
    }

    /// Assemble a keypair from separately stored halves.
    ///
    /// No consistency check happens here; run
    /// [`validate_keypair`](crate::seal::validate_keypair) first.
    pub fn from_parts(private_key: PrivateKey, public_key: PublicKey) -> Self {
        Self {
            private_key,
            public_key,
        }
    }

    /// The private half.
    pub fn private_key(&self) -> &PrivateKey {
        &self.private_key
    }

    /// The public half.
    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("private_key", &self.private_key)
            .field("public_key", &self.public_key)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_master_key_generate() {
        let key1 = MasterKey::generate();
        let key2 = MasterKey::generate();

        // Random keys should be different
        assert_ne!(key1.as_bytes(), key2.as_bytes());
    }

    #[test]
    fn test_salt_generate() {
        let salt1 = Salt::generate();
        let salt2 = Salt::generate();

        assert_ne!(salt1.as_bytes(), salt2.as_bytes());
    }

    #[test]
    fn test_public_key_is_derived_from_private() {
        let private = PrivateKey::generate();
        let restored = PrivateKey::from_bytes(*private.to_bytes());

        assert_eq!(private.public_key(), restored.public_key());
    }

    #[test]
    fn test_slice_constructors_check_length() {
        assert!(Salt::from_slice(&[0u8; 16]).is_err());
        assert!(EncryptionKey::from_slice(&[0u8; 31]).is_err());
        assert!(PublicKey::from_slice(&[0u8; 33]).is_err());
        assert!(PublicKey::from_slice(&[9u8; 32]).is_ok());
    }

    #[test]
    fn test_debug_output_redacts_secrets() {
        let pair = KeyPair::generate();
        let debug = format!("{:?}", pair);
        assert!(debug.contains("PrivateKey([REDACTED])"));
        assert_eq!(format!("{:?}", MasterKey::generate()), "MasterKey([REDACTED])");
    }

    #[test]
    fn test_secure_erase_zeroes_buffer() {
        let mut buffer = [0xFFu8; 8];
        secure_erase(&mut buffer);
        assert_eq!(buffer, [0u8; 8]);

        let mut vec = vec![1u8, 2, 3];
        secure_erase(&mut vec);
        assert!(vec.is_empty());
    }
}
