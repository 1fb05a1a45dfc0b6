//! storage.rs
//!
//! Клиентское хранилище "ключ - строка" (аналог localStorage браузера).
//! Значения непрозрачны: сторы кладут туда JSON.

use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use tracing::warn;

pub const SELECTED_SEATS_KEY: &str = "cia-app-selected-seats";
pub const PRE_RESERVED_SEATS_KEY: &str = "cia-app-pre-reserved-seats";

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub trait Storage: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// Хранилище в памяти процесса, для тестов и `STORAGE_BACKEND=memory`.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.remove(key);
        Ok(())
    }
}

/// Файловое хранилище: один файл на ключ в корневом каталоге.
#[derive(Debug, Clone)]
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    pub fn open(root: impl AsRef<Path>) -> Result<Self, StorageError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        // Ключи содержат ':' и '-', в имени файла оставляем только безопасные символы
        let name: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.root.join(format!("{name}.json"))
    }
}

impl Storage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Обёртка, добавляющая префикс к ключам: у каждой браузерной сессии своё пространство.
#[derive(Clone)]
pub struct ScopedStorage {
    inner: Arc<dyn Storage>,
    prefix: String,
}

impl ScopedStorage {
    pub fn new(inner: Arc<dyn Storage>, scope: impl std::fmt::Display) -> Self {
        Self { inner, prefix: format!("session:{scope}:") }
    }

    fn scoped(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }
}

impl Storage for ScopedStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.inner.get(&self.scoped(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.inner.set(&self.scoped(key), value)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.inner.remove(&self.scoped(key))
    }
}

pub fn save_json<T: Serialize + ?Sized>(storage: &dyn Storage, key: &str, value: &T) -> Result<(), StorageError> {
    let data = serde_json::to_string(value)?;
    storage.set(key, &data)
}

/// Читает JSON по ключу. Битые данные логируются и считаются отсутствующими.
pub fn load_json<T: DeserializeOwned>(storage: &dyn Storage, key: &str) -> Option<T> {
    let raw = match storage.get(key) {
        Ok(Some(raw)) => raw,
        Ok(None) => return None,
        Err(e) => {
            warn!("Failed to read storage key {}: {}", key, e);
            return None;
        }
    };
    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("Ignoring corrupt storage value under {}: {}", key, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_storage_roundtrip() {
        let storage = MemoryStorage::new();
        assert_eq!(storage.get("k").unwrap(), None);
        storage.set("k", "v").unwrap();
        assert_eq!(storage.get("k").unwrap().as_deref(), Some("v"));
        storage.remove("k").unwrap();
        assert_eq!(storage.get("k").unwrap(), None);
    }

    #[test]
    fn file_storage_persists_between_instances() {
        let dir = tempfile::tempdir().unwrap();
        let first = FileStorage::open(dir.path()).unwrap();
        first.set("session:1:cia-app-token", "\"abc\"").unwrap();

        let second = FileStorage::open(dir.path()).unwrap();
        assert_eq!(second.get("session:1:cia-app-token").unwrap().as_deref(), Some("\"abc\""));
        second.remove("session:1:cia-app-token").unwrap();
        second.remove("session:1:cia-app-token").unwrap();
        assert_eq!(first.get("session:1:cia-app-token").unwrap(), None);
    }

    #[test]
    fn scoped_storage_isolates_sessions() {
        let shared: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        let a = ScopedStorage::new(shared.clone(), "a");
        let b = ScopedStorage::new(shared.clone(), "b");
        a.set(SELECTED_SEATS_KEY, "[\"A1\"]").unwrap();
        assert_eq!(b.get(SELECTED_SEATS_KEY).unwrap(), None);
        assert!(shared.get("session:a:cia-app-selected-seats").unwrap().is_some());
    }

    #[test]
    fn corrupt_json_reads_as_absent() {
        let storage = MemoryStorage::new();
        storage.set(SELECTED_SEATS_KEY, "{not json").unwrap();
        assert_eq!(load_json::<Vec<String>>(&storage, SELECTED_SEATS_KEY), None);
        save_json(&storage, SELECTED_SEATS_KEY, &["A1"]).unwrap();
        assert_eq!(load_json::<Vec<String>>(&storage, SELECTED_SEATS_KEY), Some(vec!["A1".to_string()]));
    }
}
