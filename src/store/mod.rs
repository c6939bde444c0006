//! Durable storage backends.
//!
//! Counters and the dedupe ledger persist through a small key/value
//! interface holding JSON documents. Each key is one logical record:
//! `counters_<channel>` for a channel's counts and `processed_messages`
//! for the ledger.

pub mod file;
pub mod memory;

use serde_json::Value;

/// Errors raised by storage backends.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Underlying I/O failure.
    #[error("I/O error on record '{key}': {source}")]
    Io {
        /// Record key.
        key: String,
        /// Source error.
        #[source]
        source: std::io::Error,
    },

    /// Record exists but is not valid JSON.
    #[error("Corrupt record '{key}': {reason}")]
    Corrupt {
        /// Record key.
        key: String,
        /// Parser message.
        reason: String,
    },

    /// Key contains characters the backend cannot address.
    #[error("Invalid record key: {0}")]
    InvalidKey(String),
}

/// Trait for durable key/value backends.
///
/// Writes are synchronous and must be atomic per record: a reader never
/// observes a half-written value.
pub trait DurableStorage: Send + Sync {
    /// Load a record. `Ok(None)` when the key has never been written.
    fn load(&self, key: &str) -> Result<Option<Value>, StorageError>;

    /// Replace a record.
    fn save(&self, key: &str, value: &Value) -> Result<(), StorageError>;

    /// List keys starting with `prefix`, sorted.
    fn keys(&self, prefix: &str) -> Result<Vec<String>, StorageError>;
}

/// Check that a key is safe to use as a file stem.
pub(crate) fn validate_key(key: &str) -> Result<(), StorageError> {
    let valid = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
        && !key.starts_with('.');
    if valid {
        Ok(())
    } else {
        Err(StorageError::InvalidKey(key.to_string()))
    }
}

pub use file::FileStorage;
pub use memory::InMemoryStorage;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_key() {
        assert!(validate_key("counters_-100123").is_ok());
        assert!(validate_key("processed_messages").is_ok());
        assert!(validate_key("").is_err());
        assert!(validate_key("../etc/passwd").is_err());
        assert!(validate_key(".hidden").is_err());
        assert!(validate_key("a/b").is_err());
    }
}
