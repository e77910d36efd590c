//! Secure storage primitives for Keyward.
//!
//! This module provides plain file and env-file I/O with explicit permission
//! handling. It holds no state and applies no policy: callers choose every
//! permission mode.
//!
//! # Design Principles
//! - No cryptography here; bytes in, bytes out
//! - Files are replaced atomically and created with their final mode
//! - Permission handling goes through [`Permission`] so that platforms
//!   without POSIX mode bits degrade predictably

pub mod env;
pub mod local;
pub mod permissions;

pub use env::{read_env_var, write_env_var, EnvValue};
pub use local::{create_secret_file, ensure_dir, read_secret_file, write_secret_file, DirStatus};
pub use permissions::{mode_of, Permission};
