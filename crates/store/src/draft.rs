//! Persisted form draft: URL list, check flags and runtime options.
//!
//! Each part is stored under its own key and loaded independently, so a
//! corrupted entry only resets that part to its defaults.

use std::collections::BTreeMap;

use limefrog_core::options::{CheckOptions, JobRequest, RuntimeOptions};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::kv::{load_json, save_json, KeyValueStore, RUNTIME_KEY, SETTINGS_KEY, URLS_KEY};

/// Runtime fields as last entered. Unset fields fall back to defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeDraft {
    #[serde(default)]
    pub concurrency: Option<u32>,
    #[serde(default)]
    pub timeout: Option<u32>,
    #[serde(default)]
    pub retries: Option<u32>,
    #[serde(default)]
    pub filename: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormDraft {
    pub urls: String,
    pub settings: BTreeMap<String, bool>,
    pub runtime: RuntimeDraft,
}

impl FormDraft {
    /// Default check flags overlaid with the saved ones.
    pub fn check_options(&self) -> CheckOptions {
        let mut options = CheckOptions::default();
        options.merge_known(&self.settings);
        options
    }

    /// Runtime options with zero or missing values replaced by defaults.
    pub fn runtime_options(&self) -> RuntimeOptions {
        let defaults = RuntimeOptions::default();
        let nonzero = |v: Option<u32>| v.filter(|n| *n > 0);
        RuntimeOptions {
            concurrency: nonzero(self.runtime.concurrency).unwrap_or(defaults.concurrency),
            timeout_seconds: nonzero(self.runtime.timeout).unwrap_or(defaults.timeout_seconds),
            retries: self.runtime.retries.unwrap_or(defaults.retries),
            filename: self
                .runtime
                .filename
                .clone()
                .filter(|name| !name.trim().is_empty()),
        }
    }

    pub fn to_request(&self) -> JobRequest {
        JobRequest::from_text(&self.urls, self.check_options(), self.runtime_options())
    }
}

pub fn save_all(store: &dyn KeyValueStore, draft: &FormDraft) -> Result<(), StoreError> {
    store.save(URLS_KEY, &draft.urls)?;
    save_json(store, SETTINGS_KEY, &draft.settings)?;
    save_json(store, RUNTIME_KEY, &draft.runtime)
}

pub fn load_all(store: &dyn KeyValueStore) -> FormDraft {
    FormDraft {
        urls: store.load(URLS_KEY).unwrap_or_default(),
        settings: load_json(store, SETTINGS_KEY).unwrap_or_default(),
        runtime: load_json(store, RUNTIME_KEY).unwrap_or_default(),
    }
}

pub fn clear_all(store: &dyn KeyValueStore) -> Result<(), StoreError> {
    store.remove(URLS_KEY)?;
    store.remove(SETTINGS_KEY)?;
    store.remove(RUNTIME_KEY)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;

    fn sample() -> FormDraft {
        FormDraft {
            urls: "example.com\nfoo.org".into(),
            settings: BTreeMap::from([("check_robots".to_string(), false)]),
            runtime: RuntimeDraft {
                concurrency: Some(5),
                timeout: Some(30),
                retries: Some(0),
                filename: Some("report".into()),
            },
        }
    }

    #[test]
    fn draft_round_trips() {
        let store = MemoryStore::new();
        save_all(&store, &sample()).unwrap();
        assert_eq!(load_all(&store), sample());
    }

    #[test]
    fn corrupted_part_resets_only_that_part() {
        let store = MemoryStore::new();
        save_all(&store, &sample()).unwrap();
        store.save(SETTINGS_KEY, "not json").unwrap();

        let draft = load_all(&store);
        assert!(draft.settings.is_empty());
        assert_eq!(draft.urls, sample().urls);
        assert_eq!(draft.runtime, sample().runtime);
    }

    #[test]
    fn runtime_options_fill_defaults() {
        let draft = FormDraft {
            runtime: RuntimeDraft {
                concurrency: Some(0),
                timeout: None,
                retries: Some(0),
                filename: Some("  ".into()),
            },
            ..Default::default()
        };
        let runtime = draft.runtime_options();
        assert_eq!(runtime, RuntimeOptions {
            retries: 0,
            ..RuntimeOptions::default()
        });
    }

    #[test]
    fn request_from_draft() {
        let request = sample().to_request();
        assert_eq!(request.urls, vec!["example.com", "foo.org"]);
        assert!(!request.options.is_enabled("check_robots"));
        assert!(request.options.is_enabled("check_titles"));
        assert_eq!(request.runtime.concurrency, 5);
    }

    #[test]
    fn clear_removes_every_part() {
        let store = MemoryStore::new();
        save_all(&store, &sample()).unwrap();
        clear_all(&store).unwrap();
        assert_eq!(load_all(&store), FormDraft::default());
    }
}
