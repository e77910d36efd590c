//! Anonymous public-key sealing over X25519.
//!
//! A sealed box can be produced by anyone holding the recipient's public key
//! and opened only with the matching private key. Layout:
//!
//! ```text
//! ephemeral_public (32) || XChaCha20-Poly1305 ciphertext || tag (16)
//! ```
//!
//! The message key is BLAKE2b-256 over the shared secret and both public
//! keys; the nonce is BLAKE2b-192 over both public keys. Each ephemeral key
//! is used for exactly one message, so the derived nonce never repeats
//! under a given key.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use blake2::digest::consts::{U24, U32};
use blake2::{Blake2b, Digest};
use rand::rngs::OsRng;
use x25519_dalek::{EphemeralSecret, PublicKey as X25519PublicKey};
use zeroize::Zeroizing;

use crate::aead::{self, NONCE_SIZE, TAG_SIZE};
use crate::keys::{PrivateKey, PublicKey, KEY_LENGTH};
use keyward_common::{Error, Result, SensitiveBytes};

/// Bytes a sealed box adds on top of the plaintext.
pub const SEAL_OVERHEAD: usize = KEY_LENGTH + TAG_SIZE;

const SEAL_KEY_DOMAIN: &[u8] = b"keyward-sealed-box-v1";

/// Plaintext used by [`validate_keypair`].
const KEYPAIR_PROBE: &[u8] = b"test";

fn message_key(
    shared: &[u8; 32],
    ephemeral: &[u8; 32],
    recipient: &[u8; 32],
) -> Zeroizing<[u8; 32]> {
    let mut hasher = Blake2b::<U32>::new();
    hasher.update(SEAL_KEY_DOMAIN);
    hasher.update(shared);
    hasher.update(ephemeral);
    hasher.update(recipient);

    let mut key = Zeroizing::new([0u8; 32]);
    key.copy_from_slice(&hasher.finalize());
    key
}

fn message_nonce(ephemeral: &[u8; 32], recipient: &[u8; 32]) -> [u8; NONCE_SIZE] {
    let mut hasher = Blake2b::<U24>::new();
    hasher.update(ephemeral);
    hasher.update(recipient);

    let mut nonce = [0u8; NONCE_SIZE];
    nonce.copy_from_slice(&hasher.finalize());
    nonce
}

/// Seal `plaintext` for the holder of `public_key`.
///
/// # Errors
/// - `Crypto` if `public_key` is a low-order point
pub fn seal(plaintext: &[u8], public_key: &PublicKey) -> Result<Vec<u8>> {
    let ephemeral = EphemeralSecret::random_from_rng(OsRng);
    let ephemeral_public = X25519PublicKey::from(&ephemeral);

    let shared = ephemeral.diffie_hellman(public_key.inner());
    if !shared.was_contributory() {
        return Err(Error::Crypto("Invalid recipient public key".to_string()));
    }

    let key = message_key(
        shared.as_bytes(),
        ephemeral_public.as_bytes(),
        public_key.as_bytes(),
    );
    let nonce = message_nonce(ephemeral_public.as_bytes(), public_key.as_bytes());
    let ciphertext = aead::encrypt_with_nonce(&key[..], &nonce, plaintext)?;

    let mut sealed = Vec::with_capacity(KEY_LENGTH + ciphertext.len());
    sealed.extend_from_slice(ephemeral_public.as_bytes());
    sealed.extend_from_slice(&ciphertext);
    Ok(sealed)
}

/// Open a sealed box with `private_key`.
///
/// # Errors
/// - `DecryptionFailed` if the box was sealed for another key or is damaged
pub fn open(sealed: &[u8], private_key: &PrivateKey) -> Result<SensitiveBytes> {
    if sealed.len() < SEAL_OVERHEAD {
        return Err(Error::DecryptionFailed);
    }

    let (ephemeral_bytes, ciphertext) = sealed.split_at(KEY_LENGTH);
    let mut ephemeral = [0u8; KEY_LENGTH];
    ephemeral.copy_from_slice(ephemeral_bytes);
    let ephemeral_public = X25519PublicKey::from(ephemeral);
    let recipient = private_key.public_key();

    let shared = private_key.secret().diffie_hellman(&ephemeral_public);
    if !shared.was_contributory() {
        return Err(Error::DecryptionFailed);
    }

    let key = message_key(shared.as_bytes(), &ephemeral, recipient.as_bytes());
    let nonce = message_nonce(&ephemeral, recipient.as_bytes());
    aead::decrypt_with_nonce(&key[..], &nonce, ciphertext)
}

/// Seal an account password and encode it as base64 for the account table.
pub fn seal_password(password: &str, public_key: &PublicKey) -> Result<String> {
    let sealed = seal(password.as_bytes(), public_key)?;
    Ok(BASE64.encode(sealed))
}

/// Decode and open a password produced by [`seal_password`].
///
/// # Errors
/// - `DecryptionFailed` on bad base64, wrong key, tampering, or a plaintext
///   that is not UTF-8
pub fn unseal_password(encrypted: &str, private_key: &PrivateKey) -> Result<Zeroizing<String>> {
    let sealed = BASE64
        .decode(encrypted.trim())
        .map_err(|_| Error::DecryptionFailed)?;
    let plaintext = open(&sealed, private_key)?;

    let password = std::str::from_utf8(plaintext.as_bytes())
        .map_err(|_| Error::DecryptionFailed)?
        .to_owned();
    Ok(Zeroizing::new(password))
}

/// Check that `public_key` belongs to `private_key` by sealing a fixed probe
/// and opening it again.
///
/// # Errors
/// - `KeypairInvalid` if the round trip does not reproduce the probe
pub fn validate_keypair(private_key: &PrivateKey, public_key: &PublicKey) -> Result<()> {
    let sealed = seal(KEYPAIR_PROBE, public_key).map_err(|_| Error::KeypairInvalid)?;
    match open(&sealed, private_key) {
        Ok(plaintext) if plaintext.as_bytes() == KEYPAIR_PROBE => Ok(()),
        _ => Err(Error::KeypairInvalid),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::KeyPair;
    use proptest::prelude::*;

    #[test]
    fn test_seal_open_roundtrip() {
        let pair = KeyPair::generate();

        let sealed = seal(b"pw123", pair.public_key()).unwrap();
        let opened = open(&sealed, pair.private_key()).unwrap();

        assert_eq!(opened.as_bytes(), b"pw123");
        assert_eq!(sealed.len(), 5 + SEAL_OVERHEAD);
    }

    #[test]
    fn test_sealing_is_randomized() {
        let pair = KeyPair::generate();

        let a = seal_password("same", pair.public_key()).unwrap();
        let b = seal_password("same", pair.public_key()).unwrap();

        assert_ne!(a, b);
    }

    #[test]
    fn test_wrong_private_key_fails() {
        let alice = KeyPair::generate();
        let mallory = KeyPair::generate();

        let sealed = seal_password("secret", alice.public_key()).unwrap();

        assert!(matches!(
            unseal_password(&sealed, mallory.private_key()),
            Err(Error::DecryptionFailed)
        ));
    }

    #[test]
    fn test_garbage_input_fails() {
        let pair = KeyPair::generate();

        assert!(matches!(
            unseal_password("not base64!!", pair.private_key()),
            Err(Error::DecryptionFailed)
        ));
        assert!(matches!(
            unseal_password("AAAA", pair.private_key()),
            Err(Error::DecryptionFailed)
        ));
    }

    #[test]
    fn test_low_order_recipient_rejected() {
        let zero = PublicKey::from_bytes([0u8; 32]);
        assert!(matches!(seal(b"x", &zero), Err(Error::Crypto(_))));
    }

    #[test]
    fn test_validate_keypair() {
        let pair = KeyPair::generate();
        let other = KeyPair::generate();

        assert!(validate_keypair(pair.private_key(), pair.public_key()).is_ok());
        assert!(matches!(
            validate_keypair(pair.private_key(), other.public_key()),
            Err(Error::KeypairInvalid)
        ));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_password_roundtrip(password in "\\PC{0,40}") {
            let pair = KeyPair::generate();
            let sealed = seal_password(&password, pair.public_key()).unwrap();
            let opened = unseal_password(&sealed, pair.private_key()).unwrap();
            prop_assert_eq!(opened.as_str(), password.as_str());
        }

        #[test]
        fn prop_bit_flip_never_yields_plaintext(
            position in any::<prop::sample::Index>(),
            bit in 0u8..8,
        ) {
            let pair = KeyPair::generate();
            let mut sealed = seal(b"hunter2", pair.public_key()).unwrap();
            let i = position.index(sealed.len());
            sealed[i] ^= 1 << bit;

            prop_assert!(open(&sealed, pair.private_key()).is_err());
        }
    }
}
