//! Account registry for Keyward.
//!
//! Stores scraper credentials in `accounts.yaml`, each password sealed to
//! the vault's public key, and tracks which accounts have hit their
//! download quota.
//!
//! Exceeded accounts come back into rotation 24 hours after they were
//! flagged. The check runs when the registry is opened and on demand via
//! [`AccountRegistry::sweep_quota`].

pub mod account;
pub mod registry;
mod table;

pub use account::{Account, QuotaStatus};
pub use registry::{AccountRegistry, SelectionPolicy};
pub use table::QUOTA_RESET_HOURS;
