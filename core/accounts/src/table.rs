//! In-memory account table and its YAML persistence.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::account::Account;
use keyward_common::{Error, Result};
use keyward_storage::{read_secret_file, write_secret_file, Permission};

/// Hours an exceeded account stays out of rotation.
pub const QUOTA_RESET_HOURS: i64 = 24;

/// Username to account, ordered by username.
///
/// Only reachable through the registry lock.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub(crate) struct AccountTable {
    accounts: BTreeMap<String, Account>,
}

impl AccountTable {
    /// Load the table at `path`. A missing or empty file is an empty table.
    pub(crate) fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let bytes = read_secret_file(path)?;
        let text = std::str::from_utf8(&bytes)
            .map_err(|e| Error::Serialization(format!("Account table is not UTF-8: {}", e)))?;
        if text.trim().is_empty() {
            return Ok(Self::default());
        }

        let accounts: Option<BTreeMap<String, Account>> = serde_yaml::from_str(text)
            .map_err(|e| Error::Serialization(format!("Invalid account table: {}", e)))?;
        Ok(Self {
            accounts: accounts.unwrap_or_default(),
        })
    }

    /// Write the whole table to `path`, replacing what was there.
    pub(crate) fn save(&self, path: &Path) -> Result<()> {
        let yaml = serde_yaml::to_string(self)
            .map_err(|e| Error::Serialization(format!("Cannot encode account table: {}", e)))?;
        write_secret_file(path, yaml.as_bytes(), Permission::OwnerReadWrite)
    }

    pub(crate) fn get(&self, username: &str) -> Option<&Account> {
        self.accounts.get(username)
    }

    pub(crate) fn get_mut(&mut self, username: &str) -> Option<&mut Account> {
        self.accounts.get_mut(username)
    }

    pub(crate) fn contains(&self, username: &str) -> bool {
        self.accounts.contains_key(username)
    }

    pub(crate) fn insert(&mut self, username: String, account: Account) -> Option<Account> {
        self.accounts.insert(username, account)
    }

    pub(crate) fn remove(&mut self, username: &str) -> Option<Account> {
        self.accounts.remove(username)
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (&String, &Account)> {
        self.accounts.iter()
    }

    /// Usernames not over quota, in username order.
    pub(crate) fn available(&self) -> Vec<&str> {
        self.accounts
            .iter()
            .filter(|(_, account)| account.is_available())
            .map(|(username, _)| username.as_str())
            .collect()
    }

    /// Clear the quota flag of every account whose `exceed_time` is more
    /// than [`QUOTA_RESET_HOURS`] before `now`. Returns the reset usernames.
    pub(crate) fn reset_expired(&mut self, now: DateTime<Utc>) -> Vec<String> {
        let window = Duration::hours(QUOTA_RESET_HOURS);
        let mut reset = Vec::new();
        for (username, account) in self.accounts.iter_mut() {
            let expired = account
                .exceed_time
                .is_some_and(|at| now.signed_duration_since(at) > window);
            if expired {
                account.exceed_quota = false;
                account.exceed_time = None;
                reset.push(username.clone());
            }
        }
        reset
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn exceeded_at(at: DateTime<Utc>) -> Account {
        Account {
            encrypted_password: "x".to_string(),
            created_at: at,
            exceed_quota: true,
            exceed_time: Some(at),
        }
    }

    #[test]
    fn test_missing_and_empty_files_load_empty() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("accounts.yaml");

        assert_eq!(AccountTable::load(&path).unwrap(), AccountTable::default());

        std::fs::write(&path, "").unwrap();
        assert_eq!(AccountTable::load(&path).unwrap(), AccountTable::default());

        std::fs::write(&path, "{}\n").unwrap();
        assert_eq!(AccountTable::load(&path).unwrap(), AccountTable::default());
    }

    #[test]
    fn test_save_then_load() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("accounts.yaml");

        let mut table = AccountTable::default();
        table.insert("bob".to_string(), Account::new("sealed-b".to_string()));
        table.insert("alice".to_string(), Account::new("sealed-a".to_string()));
        table.save(&path).unwrap();

        let loaded = AccountTable::load(&path).unwrap();
        assert_eq!(loaded, table);
        let names: Vec<_> = loaded.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(names, ["alice", "bob"]);
    }

    #[test]
    fn test_garbage_is_serialization_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("accounts.yaml");
        std::fs::write(&path, "- just\n- a list\n").unwrap();

        assert!(matches!(
            AccountTable::load(&path),
            Err(Error::Serialization(_))
        ));
    }

    #[test]
    fn test_reset_expired_boundary() {
        let now = crate::account::now();
        let mut table = AccountTable::default();
        table.insert("old".to_string(), exceeded_at(now - Duration::hours(25)));
        table.insert("recent".to_string(), exceeded_at(now - Duration::hours(1)));
        table.insert("edge".to_string(), exceeded_at(now - Duration::hours(24)));

        let reset = table.reset_expired(now);

        assert_eq!(reset, ["old"]);
        assert!(table.get("old").unwrap().is_available());
        assert_eq!(table.get("old").unwrap().exceed_time, None);
        assert!(!table.get("recent").unwrap().is_available());
        assert!(!table.get("edge").unwrap().is_available());
        assert_eq!(table.available(), ["old"]);
    }
}
