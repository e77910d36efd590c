//! Envelope wrapping of the vault keys.
//!
//! The private key is wrapped under a random master key, and the master key
//! is wrapped under a key derived from a random encryption key and salt.
//! Both wraps use XChaCha20-Poly1305 with a fresh random nonce.

use crate::aead;
use crate::config::EncryptionConfig;
use crate::kdf::derive_key;
use crate::keys::{secure_erase, EncryptionKey, MasterKey, PrivateKey, Salt, KEY_LENGTH};
use keyward_common::{Error, Result};

/// A wrapped master key and the two generation secrets needed to reverse it.
///
/// `salt` and `encryption_key` must be persisted apart from `ciphertext`.
#[derive(Debug)]
pub struct WrappedMasterKey {
    /// nonce || ciphertext || tag
    pub ciphertext: Vec<u8>,
    pub salt: Salt,
    pub encryption_key: EncryptionKey,
}

/// Wrap `master_key` under a key derived from a fresh salt and a fresh
/// encryption key.
pub fn wrap_master_key(
    master_key: &MasterKey,
    config: &EncryptionConfig,
) -> Result<WrappedMasterKey> {
    let salt = Salt::generate();
    let encryption_key = EncryptionKey::generate();

    let derived = derive_key(encryption_key.as_bytes(), &salt, config.kdf())?;
    let ciphertext = aead::encrypt(derived.as_bytes(), master_key.as_bytes())?;

    Ok(WrappedMasterKey {
        ciphertext,
        salt,
        encryption_key,
    })
}

/// Reverse [`wrap_master_key`].
///
/// # Errors
/// - `DecryptionFailed` on tampering or wrong salt / encryption key
pub fn unwrap_master_key(
    ciphertext: &[u8],
    salt: &Salt,
    encryption_key: &EncryptionKey,
    config: &EncryptionConfig,
) -> Result<MasterKey> {
    let derived = derive_key(encryption_key.as_bytes(), salt, config.kdf())?;
    let plaintext = aead::decrypt(derived.as_bytes(), ciphertext)?;

    let mut raw = plaintext
        .to_array::<KEY_LENGTH>()
        .ok_or(Error::DecryptionFailed)?;
    let master_key = MasterKey::from_bytes(raw);
    secure_erase(&mut raw);

    Ok(master_key)
}

/// Wrap `private_key` under `master_key`.
pub fn wrap_private_key(private_key: &PrivateKey, master_key: &MasterKey) -> Result<Vec<u8>> {
    let raw = private_key.to_bytes();
    aead::encrypt(master_key.as_bytes(), &raw[..])
}

/// Reverse [`wrap_private_key`].
///
/// # Errors
/// - `DecryptionFailed` on tampering, a wrong master key, or a plaintext of
///   the wrong length
pub fn unwrap_private_key(ciphertext: &[u8], master_key: &MasterKey) -> Result<PrivateKey> {
    let plaintext = aead::decrypt(master_key.as_bytes(), ciphertext)?;

    let mut raw = plaintext
        .to_array::<KEY_LENGTH>()
        .ok_or(Error::DecryptionFailed)?;
    let private_key = PrivateKey::from_bytes(raw);
    secure_erase(&mut raw);

    Ok(private_key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kdf::KdfParams;
    use crate::keys::KeyPair;
    use proptest::prelude::*;

    fn config() -> EncryptionConfig {
        EncryptionConfig::new(KdfParams {
            memory_cost: 1024,
            time_cost: 1,
            parallelism: 1,
        })
    }

    #[test]
    fn test_master_key_roundtrip() {
        let master = MasterKey::generate();
        let wrapped = wrap_master_key(&master, &config()).unwrap();

        let unwrapped = unwrap_master_key(
            &wrapped.ciphertext,
            &wrapped.salt,
            &wrapped.encryption_key,
            &config(),
        )
        .unwrap();

        assert_eq!(unwrapped.as_bytes(), master.as_bytes());
    }

    #[test]
    fn test_master_key_wrong_encryption_key_fails() {
        let master = MasterKey::generate();
        let wrapped = wrap_master_key(&master, &config()).unwrap();

        let result = unwrap_master_key(
            &wrapped.ciphertext,
            &wrapped.salt,
            &EncryptionKey::generate(),
            &config(),
        );
        assert!(matches!(result, Err(Error::DecryptionFailed)));
    }

    #[test]
    fn test_master_key_wrong_salt_fails() {
        let master = MasterKey::generate();
        let wrapped = wrap_master_key(&master, &config()).unwrap();

        let result = unwrap_master_key(
            &wrapped.ciphertext,
            &Salt::generate(),
            &wrapped.encryption_key,
            &config(),
        );
        assert!(matches!(result, Err(Error::DecryptionFailed)));
    }

    #[test]
    fn test_each_wrap_uses_fresh_secrets() {
        let master = MasterKey::generate();
        let a = wrap_master_key(&master, &config()).unwrap();
        let b = wrap_master_key(&master, &config()).unwrap();

        assert_ne!(a.salt, b.salt);
        assert_ne!(a.encryption_key.as_bytes(), b.encryption_key.as_bytes());
        assert_ne!(a.ciphertext, b.ciphertext);
    }

    #[test]
    fn test_private_key_roundtrip() {
        let pair = KeyPair::generate();
        let master = MasterKey::generate();

        let wrapped = wrap_private_key(pair.private_key(), &master).unwrap();
        let unwrapped = unwrap_private_key(&wrapped, &master).unwrap();

        assert_eq!(unwrapped.public_key(), *pair.public_key());
    }

    #[test]
    fn test_private_key_wrong_master_fails() {
        let pair = KeyPair::generate();
        let wrapped = wrap_private_key(pair.private_key(), &MasterKey::generate()).unwrap();

        assert!(matches!(
            unwrap_private_key(&wrapped, &MasterKey::generate()),
            Err(Error::DecryptionFailed)
        ));
    }

    #[test]
    fn test_wrong_plaintext_length_is_rejected() {
        let master = MasterKey::generate();
        let ciphertext = aead::encrypt(master.as_bytes(), &[1u8; 16]).unwrap();

        assert!(matches!(
            unwrap_private_key(&ciphertext, &master),
            Err(Error::DecryptionFailed)
        ));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn prop_tampered_master_key_is_rejected(
            position in any::<prop::sample::Index>(),
            bit in 0u8..8,
        ) {
            let master = MasterKey::generate();
            let mut wrapped = wrap_master_key(&master, &config()).unwrap();
            let i = position.index(wrapped.ciphertext.len());
            wrapped.ciphertext[i] ^= 1 << bit;

            let result = unwrap_master_key(
                &wrapped.ciphertext,
                &wrapped.salt,
                &wrapped.encryption_key,
                &config(),
            );
            prop_assert!(matches!(result, Err(Error::DecryptionFailed)));
        }

        #[test]
        fn prop_private_key_roundtrip(raw in any::<[u8; 32]>(), key in any::<[u8; 32]>()) {
            let private = PrivateKey::from_bytes(raw);
            let master = MasterKey::from_bytes(key);

            let wrapped = wrap_private_key(&private, &master).unwrap();
            let unwrapped = unwrap_private_key(&wrapped, &master).unwrap();
            prop_assert_eq!(*unwrapped.to_bytes(), *private.to_bytes());
        }
    }
}
