//! Key-value persistence adapter.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::StoreError;

// ---------------------------------------------------------------------------
// Keys
// ---------------------------------------------------------------------------

/// Durable: identifier of the job being tracked.
pub const JOB_ID_KEY: &str = "seo-job-id";
/// Volatile: per-process session identity.
pub const SESSION_ID_KEY: &str = "seo-session-id";
/// Durable: newline-separated URL list of the form draft.
pub const URLS_KEY: &str = "seo-urls-list";
/// Durable: check flags of the form draft (JSON object).
pub const SETTINGS_KEY: &str = "seo-settings";
/// Durable: runtime options of the form draft (JSON object).
pub const RUNTIME_KEY: &str = "seo-runtime";

// ---------------------------------------------------------------------------
// KeyValueStore
// ---------------------------------------------------------------------------

/// Named string blobs that outlive a single operation.
///
/// Implementations are shared across tasks behind an `Arc`, so all
/// methods take `&self`.
pub trait KeyValueStore: Send + Sync {
    fn save(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// The stored value, or `None` when absent or unreadable.
    fn load(&self, key: &str) -> Option<String>;

    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// Load a JSON-encoded value, treating a malformed entry as absent.
pub fn load_json<T: DeserializeOwned>(store: &dyn KeyValueStore, key: &str) -> Option<T> {
    let raw = store.load(key)?;
    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(key, error = %e, "Ignoring malformed stored value");
            None
        }
    }
}

/// Store a value as JSON.
pub fn save_json<T: Serialize>(
    store: &dyn KeyValueStore,
    key: &str,
    value: &T,
) -> Result<(), StoreError> {
    let raw = serde_json::to_string(value)?;
    store.save(key, &raw)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::memory::MemoryStore;

    #[test]
    fn json_value_round_trips() {
        let store = MemoryStore::new();
        let flags = BTreeMap::from([("a".to_string(), true)]);
        save_json(&store, "flags", &flags).unwrap();

        let loaded: Option<BTreeMap<String, bool>> = load_json(&store, "flags");
        assert_eq!(loaded, Some(flags));
    }

    #[test]
    fn malformed_json_is_absent() {
        let store = MemoryStore::new();
        store.save("flags", "{not json").unwrap();

        let loaded: Option<BTreeMap<String, bool>> = load_json(&store, "flags");
        assert!(loaded.is_none());
    }

    #[test]
    fn wrong_shape_is_absent() {
        let store = MemoryStore::new();
        store.save("flags", "[1, 2, 3]").unwrap();

        let loaded: Option<BTreeMap<String, bool>> = load_json(&store, "flags");
        assert!(loaded.is_none());
    }
}
