//! Process-wide encryption constants.

use serde::{Deserialize, Serialize};

use crate::aead::NONCE_SIZE;
use crate::kdf::KdfParams;
use crate::keys::{KEY_LENGTH, SALT_LENGTH};

/// Encryption configuration shared by key generation and key loading.
///
/// Lengths are fixed by the primitives in use. Only the KDF cost can be
/// chosen, and it must be identical for generation and every later load,
/// since the parameters are not recorded next to the wrapped key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptionConfig {
    kdf: KdfParams,
}

impl EncryptionConfig {
    /// Create a configuration with explicit KDF parameters.
    pub fn new(kdf: KdfParams) -> Self {
        Self { kdf }
    }

    /// Symmetric key length in bytes.
    pub fn key_bytes(&self) -> usize {
        KEY_LENGTH
    }

    /// KDF salt length in bytes.
    pub fn salt_bytes(&self) -> usize {
        SALT_LENGTH
    }

    /// AEAD nonce length in bytes.
    pub fn nonce_bytes(&self) -> usize {
        NONCE_SIZE
    }

    /// Argon2id cost parameters.
    pub fn kdf(&self) -> &KdfParams {
        &self.kdf
    }
}

impl Default for EncryptionConfig {
    fn default() -> Self {
        Self::new(KdfParams::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_lengths() {
        let config = EncryptionConfig::default();
        assert_eq!(config.key_bytes(), 32);
        assert_eq!(config.salt_bytes(), 32);
        assert_eq!(config.nonce_bytes(), 24);
        assert_eq!(config.kdf(), &KdfParams::interactive());
    }
}
