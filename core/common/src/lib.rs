//! Common utilities and types shared across Keyward modules.
//!
//! This module provides the error taxonomy used by every layer of the
//! credential vault and the zeroizing buffer type for transient secrets.

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::SensitiveBytes;
