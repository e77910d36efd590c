//! Common error types for Keyward.

use thiserror::Error;

/// Top-level error type for Keyward operations.
///
/// Payloads carry paths, key names, and usernames only. Secret material,
/// ciphertext, and plaintext passwords never end up in an error.
#[derive(Debug, Error)]
pub enum Error {
    /// Expected artifact is missing on disk.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Required env-style secret key is not set.
    #[error("Missing required secret: {0}")]
    MissingSecret(String),

    /// Authenticated decryption failed.
    ///
    /// Tampering, a wrong key, and corruption are deliberately
    /// indistinguishable.
    #[error("Decryption failed")]
    DecryptionFailed,

    /// Keypair self-test failed.
    #[error("Keypair validation failed")]
    KeypairInvalid,

    /// The key vault could not be generated or loaded.
    #[error("Vault load failed: {source}")]
    VaultLoadFailed {
        #[source]
        source: Box<Error>,
    },

    /// An account with this username already exists.
    #[error("Account already exists: {0}")]
    DuplicateAccount(String),

    /// No account with this username.
    #[error("Account not found: {0}")]
    AccountNotFound(String),

    /// Every account has exhausted its quota, or there are none.
    #[error("No eligible account: all accounts have exceeded their quota")]
    NoEligibleAccount,

    /// Cryptographic operation failed for a reason other than authentication.
    #[error("Cryptographic error: {0}")]
    Crypto(String),

    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid input provided.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl Error {
    /// Wrap any error as a vault load failure, keeping the cause.
    ///
    /// Already-wrapped errors are returned unchanged.
    pub fn vault_load(source: Error) -> Self {
        match source {
            Error::VaultLoadFailed { .. } => source,
            other => Error::VaultLoadFailed {
                source: Box::new(other),
            },
        }
    }

    /// The innermost cause of a `VaultLoadFailed`, or `self`.
    pub fn root_cause(&self) -> &Error {
        match self {
            Error::VaultLoadFailed { source } => source.root_cause(),
            other => other,
        }
    }
}

/// Result type alias using the common Error.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vault_load_preserves_cause() {
        let err = Error::vault_load(Error::NotFound("private_key.pem".to_string()));
        assert!(matches!(err.root_cause(), Error::NotFound(p) if p == "private_key.pem"));
        assert!(err.to_string().contains("private_key.pem"));
    }

    #[test]
    fn test_vault_load_does_not_double_wrap() {
        let once = Error::vault_load(Error::KeypairInvalid);
        let twice = Error::vault_load(once);
        match twice {
            Error::VaultLoadFailed { source } => {
                assert!(matches!(*source, Error::KeypairInvalid))
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
