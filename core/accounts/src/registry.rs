//! Account registry: the locked, persisted account table.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use subtle::ConstantTimeEq;
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use crate::account::{now, Account, QuotaStatus};
use crate::table::AccountTable;
use keyward_common::{Error, Result};
use keyward_crypto::{seal_password, unseal_password, PrivateKey, PublicKey};
use keyward_storage::{ensure_dir, Permission};

/// How [`AccountRegistry::select_account`] draws among eligible accounts.
///
/// Both policies pick uniformly over the eligible accounts in username
/// order; they differ only in how the generator is seeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectionPolicy {
    /// Seeded from the operating system.
    #[default]
    Uniform,
    /// Seeded from a fixed value, for reproducible runs.
    Seeded(u64),
}

impl SelectionPolicy {
    fn rng(self) -> StdRng {
        match self {
            SelectionPolicy::Uniform => StdRng::from_entropy(),
            SelectionPolicy::Seeded(seed) => StdRng::seed_from_u64(seed),
        }
    }
}

struct Inner {
    table: AccountTable,
    rng: StdRng,
}

/// Credential store backed by a YAML file.
///
/// Every operation takes one lock for its whole read-modify-write, and
/// every mutation is written to disk before it returns. A mutation whose
/// write fails leaves the in-memory table unchanged.
///
/// Share across threads with `Arc<AccountRegistry>`. Call
/// [`close`](Self::close) when done; a registry dropped without closing
/// flushes on a best-effort basis.
pub struct AccountRegistry {
    path: PathBuf,
    inner: Mutex<Inner>,
    closed: bool,
}

impl AccountRegistry {
    /// Load the table at `path` and reset accounts whose quota window has
    /// passed.
    ///
    /// A missing file is an empty table. A missing parent directory is
    /// created with mode 0700; an existing one is left as is.
    pub fn open(path: impl Into<PathBuf>, policy: SelectionPolicy) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                ensure_dir(parent, Permission::OwnerOnlyDir)?;
                debug!("Created account directory {}", parent.display());
            }
        }

        let table = AccountTable::load(&path)?;
        debug!("Opened account table {}", path.display());

        let registry = Self {
            path,
            inner: Mutex::new(Inner {
                table,
                rng: policy.rng(),
            }),
            closed: false,
        };
        registry.sweep_quota()?;
        Ok(registry)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // The table is only replaced after a successful write, so a
        // panicking holder cannot leave it half-updated.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply `change` to a copy of the table, persist the copy, then swap
    /// it in.
    fn commit<T>(
        &self,
        inner: &mut Inner,
        change: impl FnOnce(&mut AccountTable) -> Result<T>,
    ) -> Result<T> {
        let mut staged = inner.table.clone();
        let value = change(&mut staged)?;
        staged.save(&self.path)?;
        inner.table = staged;
        Ok(value)
    }

    /// Add a new account with its password sealed to `public_key`.
    ///
    /// # Errors
    /// - `DuplicateAccount` if `username` is taken
    /// - `InvalidInput` if `username` or `password` is empty
    pub fn create(&self, username: &str, password: &str, public_key: &PublicKey) -> Result<()> {
        if username.is_empty() {
            return Err(Error::InvalidInput("Username cannot be empty".to_string()));
        }
        if password.is_empty() {
            return Err(Error::InvalidInput("Password cannot be empty".to_string()));
        }

        let mut inner = self.lock();
        if inner.table.contains(username) {
            return Err(Error::DuplicateAccount(username.to_string()));
        }

        let sealed = seal_password(password, public_key)?;
        self.commit(&mut inner, |table| {
            table.insert(username.to_string(), Account::new(sealed));
            Ok(())
        })?;

        info!("Created account {}", username);
        Ok(())
    }

    /// A copy of the account record, if present.
    pub fn read(&self, username: &str) -> Option<Account> {
        self.lock().table.get(username).cloned()
    }

    /// Every account, sorted by username.
    pub fn list(&self) -> Vec<(String, Account)> {
        self.lock()
            .table
            .iter()
            .map(|(username, account)| (username.clone(), account.clone()))
            .collect()
    }

    /// Rename an account and/or replace its password.
    ///
    /// `None` and empty strings both mean "keep the current value". The
    /// password is only resealed when a new one is given. Renaming onto an
    /// existing username replaces that account.
    ///
    /// # Errors
    /// - `AccountNotFound` if `old_username` does not exist
    pub fn edit(
        &self,
        public_key: &PublicKey,
        old_username: &str,
        new_username: Option<&str>,
        new_password: Option<&str>,
    ) -> Result<()> {
        let new_username = new_username.filter(|name| !name.is_empty());
        let new_password = new_password.filter(|password| !password.is_empty());

        let mut inner = self.lock();
        if !inner.table.contains(old_username) {
            return Err(Error::AccountNotFound(old_username.to_string()));
        }

        let sealed = new_password
            .map(|password| seal_password(password, public_key))
            .transpose()?;

        self.commit(&mut inner, |table| {
            let mut account = table
                .remove(old_username)
                .ok_or_else(|| Error::AccountNotFound(old_username.to_string()))?;
            if let Some(sealed) = sealed {
                account.encrypted_password = sealed;
            }
            let username = new_username.unwrap_or(old_username);
            if table.insert(username.to_string(), account).is_some() {
                warn!("Rename of {} replaced existing account {}", old_username, username);
            }
            Ok(())
        })?;

        match new_username {
            Some(username) if username != old_username => {
                info!("Renamed account {} to {}", old_username, username)
            }
            _ => info!("Updated account {}", old_username),
        }
        Ok(())
    }

    /// Remove an account.
    ///
    /// # Errors
    /// - `AccountNotFound` if `username` does not exist
    pub fn delete(&self, username: &str) -> Result<()> {
        let mut inner = self.lock();
        self.commit(&mut inner, |table| {
            table
                .remove(username)
                .map(|_| ())
                .ok_or_else(|| Error::AccountNotFound(username.to_string()))
        })?;

        info!("Deleted account {}", username);
        Ok(())
    }

    /// Set or clear the quota flag of an account.
    ///
    /// # Errors
    /// - `AccountNotFound` if `username` does not exist
    pub fn update_quota(&self, username: &str, status: QuotaStatus) -> Result<()> {
        let mut inner = self.lock();
        self.commit(&mut inner, |table| {
            let account = table
                .get_mut(username)
                .ok_or_else(|| Error::AccountNotFound(username.to_string()))?;
            match status {
                QuotaStatus::Exceeded { at } => {
                    account.exceed_quota = true;
                    account.exceed_time = Some(at);
                }
                QuotaStatus::Available => {
                    account.exceed_quota = false;
                    account.exceed_time = None;
                }
            }
            Ok(())
        })?;

        debug!("Quota of {} set to {:?}", username, status);
        Ok(())
    }

    /// Flag an account as over quota as of now.
    pub fn mark_exceeded(&self, username: &str) -> Result<()> {
        self.update_quota(username, QuotaStatus::Exceeded { at: now() })
    }

    /// Check `candidate` against the stored password in constant time.
    ///
    /// An unknown `username` never matches.
    ///
    /// # Errors
    /// - `DecryptionFailed` if the stored ciphertext cannot be opened
    pub fn verify_password(
        &self,
        username: &str,
        candidate: &str,
        private_key: &PrivateKey,
    ) -> Result<bool> {
        let sealed = match self.read(username) {
            Some(account) => account.encrypted_password,
            None => {
                warn!("Password check for unknown account {}", username);
                return Ok(false);
            }
        };

        let stored = unseal_password(&sealed, private_key)?;
        Ok(stored.as_bytes().ct_eq(candidate.as_bytes()).into())
    }

    /// Reset accounts whose quota was exceeded more than 24 hours ago.
    /// Returns how many were reset.
    pub fn sweep_quota(&self) -> Result<usize> {
        self.sweep_quota_at(now())
    }

    /// [`sweep_quota`](Self::sweep_quota) against an explicit clock.
    pub fn sweep_quota_at(&self, now: DateTime<Utc>) -> Result<usize> {
        let mut inner = self.lock();

        let mut staged = inner.table.clone();
        let reset = staged.reset_expired(now);
        if reset.is_empty() {
            return Ok(0);
        }
        staged.save(&self.path)?;
        inner.table = staged;

        for username in &reset {
            debug!("Quota window passed for {}", username);
        }
        info!("Reset quota on {} account(s)", reset.len());
        Ok(reset.len())
    }

    /// Pick an account that is not over quota and unseal its password.
    ///
    /// # Errors
    /// - `NoEligibleAccount` if every account is over quota, or there are
    ///   none
    /// - `DecryptionFailed` if the chosen account's ciphertext is corrupt
    pub fn select_account(&self, private_key: &PrivateKey) -> Result<(String, Zeroizing<String>)> {
        let mut guard = self.lock();
        let inner = &mut *guard;

        let available = inner.table.available();
        let username = available
            .choose(&mut inner.rng)
            .map(|username| username.to_string())
            .ok_or(Error::NoEligibleAccount)?;

        let sealed = inner
            .table
            .get(&username)
            .map(|account| account.encrypted_password.clone())
            .ok_or_else(|| Error::AccountNotFound(username.clone()))?;
        drop(guard);

        let password = unseal_password(&sealed, private_key)?;
        debug!("Selected account {}", username);
        Ok((username, password))
    }

    /// Write the table to disk unconditionally.
    pub fn flush(&self) -> Result<()> {
        self.lock().table.save(&self.path)
    }

    /// Flush and release the registry.
    pub fn close(mut self) -> Result<()> {
        let flushed = self.flush();
        self.closed = true;
        debug!("Closed account table {}", self.path.display());
        flushed
    }
}

impl Drop for AccountRegistry {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        if let Err(e) = self.flush() {
            warn!("Failed to flush account table {}: {}", self.path.display(), e);
        }
    }
}
