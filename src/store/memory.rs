//! In-memory storage for testing.

use std::collections::BTreeMap;

use parking_lot::RwLock;
use serde_json::Value;

use super::{validate_key, DurableStorage, StorageError};

/// In-memory storage for testing.
///
/// Records are kept as serialized text so corrupt records can be injected
/// and parsed the same way the file backend parses them. Uses a BTreeMap
/// for deterministic key order.
#[derive(Debug, Default)]
pub struct InMemoryStorage {
    records: RwLock<BTreeMap<String, String>>,
}

impl InMemoryStorage {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert raw text under `key`, bypassing serialization.
    pub fn insert_raw(&self, key: impl Into<String>, raw: impl Into<String>) {
        self.records.write().insert(key.into(), raw.into());
    }

    /// Raw text stored under `key`.
    pub fn raw(&self, key: &str) -> Option<String> {
        self.records.read().get(key).cloned()
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

impl DurableStorage for InMemoryStorage {
    fn load(&self, key: &str) -> Result<Option<Value>, StorageError> {
        validate_key(key)?;
        let records = self.records.read();
        let Some(raw) = records.get(key) else {
            return Ok(None);
        };
        serde_json::from_str(raw)
            .map(Some)
            .map_err(|e| StorageError::Corrupt {
                key: key.to_string(),
                reason: e.to_string(),
            })
    }

    fn save(&self, key: &str, value: &Value) -> Result<(), StorageError> {
        validate_key(key)?;
        let raw = serde_json::to_string(value).map_err(|e| StorageError::Corrupt {
            key: key.to_string(),
            reason: e.to_string(),
        })?;
        self.records.write().insert(key.to_string(), raw);
        Ok(())
    }

    fn keys(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        Ok(self
            .records
            .read()
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }
}
