//! Key derivation using Argon2id.
//!
//! Argon2id is a memory-hard password hashing function that provides
//! resistance to both GPU and time-memory trade-off attacks.

use argon2::{Algorithm, Argon2, Params, Version};
use serde::{Deserialize, Serialize};

use crate::keys::{secure_erase, DerivedKey, Salt, KEY_LENGTH};
use keyward_common::{Error, Result};

/// Parameters for Argon2id key derivation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    /// Memory cost in KiB (e.g., 65536 = 64 MiB).
    pub memory_cost: u32,
    /// Number of iterations.
    pub time_cost: u32,
    /// Degree of parallelism.
    pub parallelism: u32,
}

impl KdfParams {
    /// Create parameters suitable for interactive use.
    ///
    /// These parameters provide a balance between security and usability,
    /// targeting approximately 0.5-1 second of derivation time.
    pub fn interactive() -> Self {
        Self {
            memory_cost: 65536, // 64 MiB
            time_cost: 3,
            parallelism: 4,
        }
    }
}

impl Default for KdfParams {
    fn default() -> Self {
        Self::interactive()
    }
}

/// Derive a wrapping key from a low-entropy secret and salt using Argon2id.
///
/// # Preconditions
/// - `secret` must not be empty
/// - `params` must have valid Argon2id parameters
///
/// # Postconditions
/// - The derived key is deterministic given the same inputs
///
/// # Errors
/// - Returns error if `secret` is empty
/// - Returns error if Argon2id parameters are invalid
pub fn derive_key(secret: &[u8], salt: &Salt, params: &KdfParams) -> Result<DerivedKey> {
    if secret.is_empty() {
        return Err(Error::InvalidInput("KDF input cannot be empty".to_string()));
    }

    let argon2_params = Params::new(
        params.memory_cost,
        params.time_cost,
        params.parallelism,
        Some(KEY_LENGTH),
    )
    .map_err(|e| Error::Crypto(format!("Invalid KDF parameters: {}", e)))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon2_params);

    // The stack copy is wiped whether or not derivation succeeded.
    let mut key_bytes = [0u8; KEY_LENGTH];
    let derived = argon2
        .hash_password_into(secret, salt.as_bytes(), &mut key_bytes)
        .map_err(|e| Error::Crypto(format!("Key derivation failed: {}", e)))
        .map(|()| DerivedKey::from_bytes(key_bytes));
    secure_erase(&mut key_bytes);

    derived
}
