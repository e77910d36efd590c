//! Authenticated encryption using XChaCha20-Poly1305.
//!
//! XChaCha20-Poly1305 provides both confidentiality and authenticity,
//! with a 24-byte nonce that is safe for random generation.

use chacha20poly1305::{
    aead::{generic_array::GenericArray, Aead, AeadCore, KeyInit, OsRng},
    XChaCha20Poly1305,
};

use crate::keys::KEY_LENGTH;
use keyward_common::{Error, Result, SensitiveBytes};

/// Nonce size for XChaCha20-Poly1305 (24 bytes).
pub const NONCE_SIZE: usize = 24;

/// Authentication tag size (16 bytes).
pub const TAG_SIZE: usize = 16;

fn cipher_for(key: &[u8]) -> Result<XChaCha20Poly1305> {
    if key.len() != KEY_LENGTH {
        return Err(Error::Crypto(format!(
            "Invalid key length: expected {}, got {}",
            KEY_LENGTH,
            key.len()
        )));
    }
    Ok(XChaCha20Poly1305::new(GenericArray::from_slice(key)))
}

/// Encrypt plaintext using XChaCha20-Poly1305.
///
/// # Postconditions
/// - Returns nonce || ciphertext || tag
/// - The nonce is randomly generated
///
/// # Errors
/// - Returns error if key length is incorrect
pub fn encrypt(key: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
    let cipher = cipher_for(key)?;
    let nonce = XChaCha20Poly1305::generate_nonce(&mut OsRng);

    let ciphertext = cipher
        .encrypt(&nonce, plaintext)
        .map_err(|e| Error::Crypto(format!("Encryption failed: {}", e)))?;

    let mut result = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    result.extend_from_slice(&nonce);
    result.extend_from_slice(&ciphertext);

    Ok(result)
}

/// Decrypt ciphertext produced by [`encrypt`].
///
/// # Errors
/// - `Crypto` if key length is incorrect
/// - `DecryptionFailed` if the ciphertext is truncated, was produced under
///   another key, or was modified in any way
pub fn decrypt(key: &[u8], ciphertext: &[u8]) -> Result<SensitiveBytes> {
    let cipher = cipher_for(key)?;

    if ciphertext.len() < NONCE_SIZE + TAG_SIZE {
        return Err(Error::DecryptionFailed);
    }

    let (nonce_bytes, encrypted) = ciphertext.split_at(NONCE_SIZE);
    let nonce = GenericArray::from_slice(nonce_bytes);

    cipher
        .decrypt(nonce, encrypted)
        .map(SensitiveBytes::new)
        .map_err(|_| Error::DecryptionFailed)
}

/// Encrypt plaintext with a specific nonce.
///
/// # Warning
/// Only for keys that are used exactly once, such as the per-message key of a
/// sealed box. Reusing a nonce under the same key breaks confidentiality.
pub fn encrypt_with_nonce(
    key: &[u8],
    nonce: &[u8; NONCE_SIZE],
    plaintext: &[u8],
) -> Result<Vec<u8>> {
    let cipher = cipher_for(key)?;

    cipher
        .encrypt(GenericArray::from_slice(nonce), plaintext)
        .map_err(|e| Error::Crypto(format!("Encryption failed: {}", e)))
}

/// Decrypt ciphertext with a specific nonce.
pub fn decrypt_with_nonce(
    key: &[u8],
    nonce: &[u8; NONCE_SIZE],
    ciphertext: &[u8],
) -> Result<SensitiveBytes> {
    let cipher = cipher_for(key)?;

    if ciphertext.len() < TAG_SIZE {
        return Err(Error::DecryptionFailed);
    }

    cipher
        .decrypt(GenericArray::from_slice(nonce), ciphertext)
        .map(SensitiveBytes::new)
        .map_err(|_| Error::DecryptionFailed)
}
