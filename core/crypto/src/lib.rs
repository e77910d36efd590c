//! Cryptographic primitives for Keyward.
//!
//! This module provides:
//! - Key derivation using Argon2id
//! - Authenticated encryption using XChaCha20-Poly1305
//! - Anonymous public-key sealing over X25519
//! - Envelope wrapping of the master and private keys
//!
//! Every function here is pure over its explicit inputs; nothing reads
//! ambient state or touches the filesystem.
//!
//! # Security Guarantees
//! - All key material is zeroized on drop
//! - No plaintext or key material is ever logged
//!
//! # Limitations
//! Zeroing is best-effort. It does not cover pages swapped to disk, core
//! dumps, or copies left behind by the allocator or the OS.

pub mod aead;
pub mod config;
pub mod kdf;
pub mod keys;
pub mod seal;
pub mod wrap;

pub use aead::{decrypt, encrypt};
pub use config::EncryptionConfig;
pub use kdf::{derive_key, KdfParams};
pub use keys::{
    secure_erase, DerivedKey, EncryptionKey, KeyPair, MasterKey, PrivateKey, PublicKey, Salt,
};
pub use seal::{seal_password, unseal_password, validate_keypair};
pub use wrap::{
    unwrap_master_key, unwrap_private_key, wrap_master_key, wrap_private_key, WrappedMasterKey,
};
