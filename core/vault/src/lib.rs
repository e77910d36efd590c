//! Key vault for Keyward.
//!
//! This module provides:
//! - Resolution of every on-disk artifact from one base directory
//! - First-run generation of the wrapped X25519 keypair
//! - Loading and self-testing of the keypair on later runs
//!
//! # Architecture
//! The vault sits between the account registry and the crypto and storage
//! crates. It owns no key material: `load()` returns a [`KeyPair`] that the
//! caller keeps resident, typically inside an `Arc`.
//!
//! [`KeyPair`]: keyward_crypto::KeyPair

pub mod config;
pub mod manager;

pub use config::VaultLayout;
pub use manager::{KeyVault, VaultState};
