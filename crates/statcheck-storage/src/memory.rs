//! In-memory storage for tests and ephemeral sessions.

use crate::{DeviceStorage, StorageError, StorageResult};
use std::collections::HashMap;
use std::sync::Mutex;

/// In-memory storage implementation.
///
/// Nothing survives the process; intended for tests and previews.
#[derive(Default)]
pub struct MemoryStorage {
    data: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    /// Create a new empty in-memory storage.
    pub fn new() -> Self {
        Self::default()
    }
}

impl DeviceStorage for MemoryStorage {
    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        let mut data = self
            .data
            .lock()
            .map_err(|_| StorageError::Platform("storage lock poisoned".to_string()))?;
        data.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let data = self
            .data
            .lock()
            .map_err(|_| StorageError::Platform("storage lock poisoned".to_string()))?;
        Ok(data.get(key).cloned())
    }

    fn delete(&self, key: &str) -> StorageResult<bool> {
        let mut data = self
            .data
            .lock()
            .map_err(|_| StorageError::Platform("storage lock poisoned".to_string()))?;
        Ok(data.remove(key).is_some())
    }
}
