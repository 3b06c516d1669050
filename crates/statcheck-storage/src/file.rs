//! File-backed storage implementation.

use crate::{DeviceStorage, StorageError, StorageResult};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Mutex;

/// Storage backed by a single JSON file on disk.
///
/// Every operation reads the whole file, applies the change, and writes the
/// whole file back. The file is small (a handful of keys), so the simplicity
/// wins over incremental updates. A process-local mutex serializes writers.
pub struct FileStorage {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStorage {
    /// Create a new file storage rooted at the given path.
    ///
    /// The file is created lazily on first write.
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            lock: Mutex::new(()),
        }
    }

    fn load(&self) -> StorageResult<BTreeMap<String, String>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let content = std::fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&content)
            .map_err(|e| StorageError::Encoding(format!("corrupt storage file: {}", e)))
    }

    fn store(&self, data: &BTreeMap<String, String>) -> StorageResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(data)
            .map_err(|e| StorageError::Encoding(e.to_string()))?;
        std::fs::write(&self.path, content)?;
        Ok(())
    }
}

impl DeviceStorage for FileStorage {
    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        let _guard = self.lock.lock().map_err(|_| {
            StorageError::Platform("storage lock poisoned".to_string())
        })?;
        let mut data = self.load()?;
        data.insert(key.to_string(), value.to_string());
        self.store(&data)
    }

    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let _guard = self.lock.lock().map_err(|_| {
            StorageError::Platform("storage lock poisoned".to_string())
        })?;
        Ok(self.load()?.get(key).cloned())
    }

    fn delete(&self, key: &str) -> StorageResult<bool> {
        let _guard = self.lock.lock().map_err(|_| {
            StorageError::Platform("storage lock poisoned".to_string())
        })?;
        let mut data = self.load()?;
        let removed = data.remove(key).is_some();
        if removed {
            self.store(&data)?;
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn set_get_delete_roundtrip() {
        let dir = tempdir().unwrap();
        let storage = FileStorage::new(dir.path().join("device.json"));

        storage.set("key", "value").unwrap();
        assert_eq!(storage.get("key").unwrap(), Some("value".to_string()));
        assert!(storage.has("key").unwrap());

        assert!(storage.delete("key").unwrap());
        assert!(!storage.delete("key").unwrap());
        assert_eq!(storage.get("key").unwrap(), None);
    }

    #[test]
    fn values_survive_a_fresh_handle_on_the_same_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("device.json");

        {
            let storage = FileStorage::new(path.clone());
            storage.set("persisted", "yes").unwrap();
        }

        // Simulated restart: new handle, same path.
        let storage = FileStorage::new(path);
        assert_eq!(storage.get("persisted").unwrap(), Some("yes".to_string()));
    }

    #[test]
    fn missing_file_reads_as_empty() {
        let dir = tempdir().unwrap();
        let storage = FileStorage::new(dir.path().join("never-written.json"));

        assert_eq!(storage.get("anything").unwrap(), None);
        assert!(!storage.has("anything").unwrap());
    }

    #[test]
    fn creates_parent_directories_on_first_write() {
        let dir = tempdir().unwrap();
        let storage = FileStorage::new(dir.path().join("nested/dir/device.json"));

        storage.set("key", "value").unwrap();
        assert_eq!(storage.get("key").unwrap(), Some("value".to_string()));
    }

    #[test]
    fn corrupt_file_is_an_encoding_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("device.json");
        std::fs::write(&path, "not json {").unwrap();

        let storage = FileStorage::new(path);
        assert!(matches!(
            storage.get("key"),
            Err(StorageError::Encoding(_))
        ));
    }
}
