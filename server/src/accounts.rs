//! Account records and their file-backed store.

use crate::error::StoreError;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use shared::{CharacterId, NamedValues};
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRecord {
    pub name: String,
    pub password: String,
    pub character_id: CharacterId,
    /// Persisted character state; empty for a fresh character.
    pub character: NamedValues,
}

pub trait AccountStore: Send {
    /// Returns the account when the credentials match.
    fn login(&mut self, name: &str, password: &str) -> Result<Option<AccountRecord>, StoreError>;

    fn save_character(&mut self, name: &str, values: NamedValues) -> Result<(), StoreError>;
}

#[derive(Default, Serialize, Deserialize)]
struct AccountFile {
    accounts: Vec<AccountRecord>,
}

pub struct FileAccountStore {
    path: Option<PathBuf>,
    accounts: BTreeMap<String, AccountRecord>,
    auto_register: bool,
}

fn is_valid_account_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric())
}

impl FileAccountStore {
    /// Loads the account file. A missing file starts an empty store; a file
    /// that cannot be read or decoded is an error.
    pub fn open(path: impl AsRef<Path>, auto_register: bool) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let file = match fs::read(&path) {
            Ok(bytes) => bincode::deserialize::<AccountFile>(&bytes)?,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!("No account file at {}, starting empty", path.display());
                AccountFile::default()
            }
            Err(e) => return Err(e.into()),
        };

        let accounts = file
            .accounts
            .into_iter()
            .map(|record| (record.name.to_lowercase(), record))
            .collect::<BTreeMap<_, _>>();
        info!("Loaded {} accounts", accounts.len());

        Ok(Self {
            path: Some(path),
            accounts,
            auto_register,
        })
    }

    /// A store that never touches the disk.
    pub fn in_memory(auto_register: bool) -> Self {
        Self {
            path: None,
            accounts: BTreeMap::new(),
            auto_register,
        }
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    pub fn create_account(&mut self, name: &str, password: &str) -> Result<AccountRecord, StoreError> {
        let next_id = self
            .accounts
            .values()
            .map(|record| record.character_id.get())
            .max()
            .unwrap_or(0)
            + 1;
        let record = AccountRecord {
            name: name.to_string(),
            password: password.to_string(),
            character_id: CharacterId::new(next_id),
            character: NamedValues::new(),
        };
        let key = name.to_lowercase();
        self.accounts.insert(key.clone(), record.clone());
        if let Err(e) = self.save() {
            self.accounts.remove(&key);
            return Err(e);
        }
        info!("Created account `{}`", name);
        Ok(record)
    }

    fn save(&self) -> Result<(), StoreError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let file = AccountFile {
            accounts: self.accounts.values().cloned().collect(),
        };
        let bytes = bincode::serialize(&file)?;
        let temp = path.with_extension("tmp");
        fs::write(&temp, bytes)?;
        fs::rename(&temp, path)?;
        Ok(())
    }
}

impl AccountStore for FileAccountStore {
    fn login(&mut self, name: &str, password: &str) -> Result<Option<AccountRecord>, StoreError> {
        match self.accounts.get(&name.to_lowercase()) {
            Some(record) if record.password == password => Ok(Some(record.clone())),
            Some(_) => Ok(None),
            None if self.auto_register && is_valid_account_name(name) && !password.is_empty() => {
                self.create_account(name, password).map(Some)
            }
            None => Ok(None),
        }
    }

    fn save_character(&mut self, name: &str, values: NamedValues) -> Result<(), StoreError> {
        match self.accounts.get_mut(&name.to_lowercase()) {
            Some(record) => {
                record.character = values;
                self.save()
            }
            None => {
                warn!("Cannot save character for unknown account `{}`", name);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::ValueWriter;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("netgore-accounts-{}-{}.bin", name, std::process::id()))
    }

    #[test]
    fn test_login_checks_password() {
        let mut store = FileAccountStore::in_memory(false);
        store.create_account("Spodi", "secret").unwrap();

        assert!(store.login("spodi", "secret").unwrap().is_some());
        assert!(store.login("Spodi", "wrong").unwrap().is_none());
        assert!(store.login("nobody", "secret").unwrap().is_none());
    }

    #[test]
    fn test_failed_save_does_not_keep_the_account() {
        let path = std::env::temp_dir()
            .join(format!("netgore-missing-{}", std::process::id()))
            .join("accounts.bin");
        let mut store = FileAccountStore::open(&path, true).unwrap();

        assert!(store.create_account("alice", "pw").is_err());
        assert!(store.is_empty());
        assert!(store.login("alice", "other").is_err());
        assert!(store.is_empty());
    }

    #[test]
    fn test_auto_register() {
        let mut store = FileAccountStore::in_memory(true);
        let first = store.login("alice", "pw").unwrap().unwrap();
        let second = store.login("bob", "pw").unwrap().unwrap();
        assert_ne!(first.character_id, second.character_id);
        assert!(store.login("bad name!", "pw").unwrap().is_none());
        assert!(store.login("carol", "").unwrap().is_none());
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_file_round_trip() {
        let path = temp_path("round-trip");
        let _ = fs::remove_file(&path);

        let mut store = FileAccountStore::open(&path, true).unwrap();
        assert!(store.is_empty());
        store.login("alice", "pw").unwrap();
        let mut values = NamedValues::new();
        values.write_i32("cash", 77);
        store.save_character("alice", values.clone()).unwrap();

        let mut reopened = FileAccountStore::open(&path, false).unwrap();
        let record = reopened.login("alice", "pw").unwrap().unwrap();
        assert_eq!(record.character, values);

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let path = temp_path("corrupt");
        fs::write(&path, [0xFF; 3]).unwrap();
        assert!(matches!(
            FileAccountStore::open(&path, true),
            Err(StoreError::Corrupt(_))
        ));
        let _ = fs::remove_file(&path);
    }
}
