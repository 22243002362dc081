//! Persistent key-value storage for client state.
//!
//! Values are JSON text. A value that no longer parses is treated as absent
//! and its key is removed, so one corrupt entry never wedges the client.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::error::ClientError;

pub const REMINDERS_KEY: &str = "reminders";
pub const LAST_GENERATED_KEY: &str = "lastRemindersGeneratedDate";
pub const PREFERENCES_KEY: &str = "notificationPreferences";
pub const CONTACT_KEY: &str = "userContact";
pub const AUTH_TOKEN_KEY: &str = "auth_token";
pub const USER_KEY: &str = "user";

pub trait LocalStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, ClientError>;

    fn set(&self, key: &str, value: &str) -> Result<(), ClientError>;

    fn remove(&self, key: &str) -> Result<(), ClientError>;
}

/// Volatile store, for tests and ephemeral sessions.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LocalStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, ClientError> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), ClientError> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), ClientError> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.remove(key);
        Ok(())
    }
}

/// All keys in one JSON object on disk, rewritten on every change.
pub struct FileStore {
    path: PathBuf,
    entries: Mutex<HashMap<String, String>>,
}

impl FileStore {
    /// Open or create the store at `path`. An unreadable file starts empty.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ClientError> {
        let path = path.as_ref().to_path_buf();
        let entries = match fs::read_to_string(&path) {
            Ok(text) => serde_json::from_str(&text).unwrap_or_else(|e| {
                warn!("Local store {} is corrupt, starting empty: {}", path.display(), e);
                HashMap::new()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(e.into()),
        };
        debug!("Opened local store {} ({} keys)", path.display(), entries.len());
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    fn flush(&self, entries: &HashMap<String, String>) -> Result<(), ClientError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        // Write-then-rename so a crash never leaves a half-written file
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(entries)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl LocalStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, ClientError> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), ClientError> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(key.to_string(), value.to_string());
        self.flush(&entries)
    }

    fn remove(&self, key: &str) -> Result<(), ClientError> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        if entries.remove(key).is_some() {
            self.flush(&entries)?;
        }
        Ok(())
    }
}

/// Read and decode `key`. Undecodable values are cleared and read as `None`.
pub fn read_json<T: DeserializeOwned>(store: &dyn LocalStore, key: &str) -> Result<Option<T>, ClientError> {
    let Some(raw) = store.get(key)? else {
        return Ok(None);
    };
    match serde_json::from_str(&raw) {
        Ok(value) => Ok(Some(value)),
        Err(e) => {
            warn!("Clearing corrupt local value '{}': {}", key, e);
            store.remove(key)?;
            Ok(None)
        }
    }
}

pub fn write_json<T: Serialize + ?Sized>(store: &dyn LocalStore, key: &str, value: &T) -> Result<(), ClientError> {
    store.set(key, &serde_json::to_string(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path() -> PathBuf {
        std::env::temp_dir().join(format!("medminder-store-{}.json", uuid::Uuid::new_v4()))
    }

    #[test]
    fn corrupt_value_is_cleared() {
        let store = MemoryStore::new();
        store.set("reminders", "{not json").unwrap();

        let value: Option<Vec<String>> = read_json(&store, "reminders").unwrap();
        assert!(value.is_none());
        assert!(store.get("reminders").unwrap().is_none());
    }

    #[test]
    fn file_store_survives_reopen() {
        let path = temp_path();
        {
            let store = FileStore::open(&path).unwrap();
            write_json(&store, "userContact", &vec!["a", "b"]).unwrap();
            store.set("auth_token", "\"tok\"").unwrap();
            store.remove("auth_token").unwrap();
        }

        let store = FileStore::open(&path).unwrap();
        let contact: Option<Vec<String>> = read_json(&store, "userContact").unwrap();
        assert_eq!(contact, Some(vec!["a".to_string(), "b".to_string()]));
        assert!(store.get("auth_token").unwrap().is_none());

        fs::remove_file(&path).ok();
    }

    #[test]
    fn corrupt_file_starts_empty() {
        let path = temp_path();
        fs::write(&path, "garbage").unwrap();
        let store = FileStore::open(&path).unwrap();
        assert!(store.get("reminders").unwrap().is_none());
        fs::remove_file(&path).ok();
    }
}
