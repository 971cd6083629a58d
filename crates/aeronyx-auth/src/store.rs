//! Durable credential storage.
//!
//! A persisted credential lets a restart skip the signing prompt while the
//! credential is still valid. Entries are always re-validated on load.

use crate::error::PersistError;
use aeronyx_core::{Credential, CredentialKey};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Storage for the last credential per `(address, purpose)`.
pub trait CredentialStore: Send + Sync {
    fn load(&self, key: &CredentialKey) -> Result<Option<Credential>, PersistError>;

    fn save(&self, credential: &Credential) -> Result<(), PersistError>;

    fn remove(&self, key: &CredentialKey) -> Result<(), PersistError>;

    /// Remove every purpose stored for an address. Returns how many were removed.
    fn remove_address(&self, wallet_address: &str) -> Result<usize, PersistError>;
}

/// One JSON file per credential under a directory.
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    dir: PathBuf,
}

impl FileCredentialStore {
    /// Create the store, creating `dir` if needed.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, PersistError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &CredentialKey) -> PathBuf {
        self.dir
            .join(format!("{}_{}.json", key.wallet_address, sanitize(&key.purpose)))
    }
}

/// Keep file names portable.
fn sanitize(s: &str) -> String {
    s.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '-'
            }
        })
        .collect()
}

impl CredentialStore for FileCredentialStore {
    fn load(&self, key: &CredentialKey) -> Result<Option<Credential>, PersistError> {
        let path = self.path_for(key);
        let bytes = match fs::read(&path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    fn save(&self, credential: &Credential) -> Result<(), PersistError> {
        let path = self.path_for(&credential.key());
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(credential)?)?;
        fs::rename(&tmp, &path)?;
        debug!(path = %path.display(), "Persisted credential");
        Ok(())
    }

    fn remove(&self, key: &CredentialKey) -> Result<(), PersistError> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn remove_address(&self, wallet_address: &str) -> Result<usize, PersistError> {
        let prefix = format!("{}_", wallet_address.to_ascii_lowercase());
        let mut removed = 0;
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if name.starts_with(&prefix) && name.ends_with(".json") {
                fs::remove_file(entry.path())?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}

/// In-memory store, for tests and for runs without a state directory.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    entries: Mutex<HashMap<CredentialKey, Credential>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn load(&self, key: &CredentialKey) -> Result<Option<Credential>, PersistError> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn save(&self, credential: &Credential) -> Result<(), PersistError> {
        self.entries
            .lock()
            .insert(credential.key(), credential.clone());
        Ok(())
    }

    fn remove(&self, key: &CredentialKey) -> Result<(), PersistError> {
        self.entries.lock().remove(key);
        Ok(())
    }

    fn remove_address(&self, wallet_address: &str) -> Result<usize, PersistError> {
        let address = wallet_address.to_ascii_lowercase();
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|key, _| key.wallet_address != address);
        Ok(before - entries.len())
    }
}
