use super::PersistenceError;
use serde::{de::DeserializeOwned, Serialize};
use std::marker::PhantomData;
use std::path::PathBuf;

/// Trait for types that can be persisted in a JsonStore.
pub trait Storable: Serialize + DeserializeOwned {
    fn key(&self) -> &str;
}

/// Generic JSON-file-per-key persistence slot.
pub struct JsonStore<T> {
    dir: PathBuf,
    _phantom: PhantomData<T>,
}

impl<T: Storable> JsonStore<T> {
    pub fn new(dir: PathBuf) -> Self {
        Self {
            dir,
            _phantom: PhantomData,
        }
    }

    pub fn ensure_dir(&self) -> Result<(), PersistenceError> {
        std::fs::create_dir_all(&self.dir)?;
        Ok(())
    }

    /// Keys are free text (subject names), so anything outside
    /// `[A-Za-z0-9_-]` is replaced to keep the file inside `dir`.
    pub fn file_path(&self, key: &str) -> PathBuf {
        let name: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{}.json", name))
    }

    /// Save a record, replacing any previous one under the same key.
    pub fn save(&self, data: &T) -> Result<(), PersistenceError> {
        self.ensure_dir()?;
        let path = self.file_path(data.key());
        let json = serde_json::to_string_pretty(data)?;
        std::fs::write(&path, json)?;
        Ok(())
    }

    /// Load a record by key. Returns None if not found.
    pub fn load(&self, key: &str) -> Result<Option<T>, PersistenceError> {
        let path = self.file_path(key);
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&path)?;
        let data: T = serde_json::from_str(&contents)?;
        // Two keys may sanitize to the same file name.
        if data.key() != key {
            return Ok(None);
        }
        Ok(Some(data))
    }

    /// Delete a record by key.
    pub fn delete(&self, key: &str) -> Result<(), PersistenceError> {
        let path = self.file_path(key);
        if path.exists() {
            std::fs::remove_file(&path)?;
        }
        Ok(())
    }

    /// Delete every record in the store directory.
    pub fn clear(&self) -> Result<(), PersistenceError> {
        if !self.dir.exists() {
            return Ok(());
        }
        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) == Some("json") {
                if let Err(e) = std::fs::remove_file(&path) {
                    tracing::warn!("Failed to remove cache file {:?}: {}", path, e);
                }
            }
        }
        Ok(())
    }
}
