//! [`KeyValueStore`] implementations for widget state.

use crate::storage::AtomicFile;
use asa_core::error::Result;
use asa_core::store::KeyValueStore;
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::RwLock;

/// Process-local store, the stand-in for session storage.
#[derive(Debug, Default)]
pub struct MemoryKeyValueStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|map| map.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KeyValueStore for MemoryKeyValueStore {
    fn get(&self, key: &str) -> Option<String> {
        let entries = match self.entries.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        entries.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = match self.entries.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut entries = match self.entries.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        entries.remove(key);
        Ok(())
    }
}

/// Persistent store kept as one JSON object on disk, the stand-in for local storage.
pub struct JsonFileKeyValueStore {
    file: AtomicFile<BTreeMap<String, String>>,
}

impl JsonFileKeyValueStore {
    pub fn new(path: PathBuf) -> Self {
        Self {
            file: AtomicFile::json(path),
        }
    }
}

impl KeyValueStore for JsonFileKeyValueStore {
    fn get(&self, key: &str) -> Option<String> {
        match self.file.load() {
            Ok(map) => map.and_then(|mut map| map.remove(key)),
            Err(err) => {
                tracing::warn!("[Storage] Unreadable store {:?}: {}", self.file.path(), err);
                None
            }
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.file.update(BTreeMap::new(), |map| {
            map.insert(key.to_string(), value.to_string());
        })
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.file.update(BTreeMap::new(), |map| {
            map.remove(key);
        })
    }
}
