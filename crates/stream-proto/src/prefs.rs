//! Persisted user preferences behind a plain key-value seam.
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use tracing::warn;

pub const KEY_QUALITY: &str = "quality";
pub const KEY_FAVORITE: &str = "favorite_station";
pub const KEY_VOLUME: &str = "volume";

/// Minimal get/set store.  Writes happen on user action only, so
/// implementations are free to persist synchronously.
pub trait PreferenceStore: Send {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()>;
}

/// Preferences kept as a flat JSON object in a single file.
pub struct JsonFileStore {
    path: PathBuf,
    values: BTreeMap<String, String>,
}

impl JsonFileStore {
    /// Open (or lazily create) the store.  A missing or corrupt file yields
    /// an empty store rather than an error.
    pub fn open(path: PathBuf) -> Self {
        let values = Self::load(&path);
        Self { path, values }
    }

    fn load(path: &PathBuf) -> BTreeMap<String, String> {
        let Ok(content) = std::fs::read_to_string(path) else {
            return BTreeMap::new();
        };
        match serde_json::from_str(&content) {
            Ok(values) => values,
            Err(e) => {
                warn!("prefs: ignoring unreadable {}: {}", path.display(), e);
                BTreeMap::new()
            }
        }
    }

    fn save(&self) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&self.values)?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }
}

impl PreferenceStore for JsonFileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        self.values.insert(key.to_string(), value.to_string());
        self.save()
    }
}

/// In-memory store.  Clones share the same map, so a caller can keep a
/// handle to inspect what was written.
#[derive(Clone, Default)]
pub struct MemoryStore {
    values: Arc<Mutex<BTreeMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(entries: &[(&str, &str)]) -> Self {
        let store = Self::new();
        if let Ok(mut map) = store.values.lock() {
            for (k, v) in entries {
                map.insert(k.to_string(), v.to_string());
            }
        }
        store
    }
}

impl PreferenceStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.lock().ok()?.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        let mut map = self
            .values
            .lock()
            .map_err(|_| anyhow::anyhow!("preference map poisoned"))?;
        map.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_store_persists_across_opens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("prefs.json");

        let mut store = JsonFileStore::open(path.clone());
        assert_eq!(store.get(KEY_QUALITY), None);
        store.set(KEY_QUALITY, "192").unwrap();
        store.set(KEY_FAVORITE, "deep").unwrap();

        let reopened = JsonFileStore::open(path);
        assert_eq!(reopened.get(KEY_QUALITY).as_deref(), Some("192"));
        assert_eq!(reopened.get(KEY_FAVORITE).as_deref(), Some("deep"));
    }

    #[test]
    fn test_json_store_tolerates_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.json");
        std::fs::write(&path, "{not json").unwrap();
        let store = JsonFileStore::open(path);
        assert_eq!(store.get(KEY_VOLUME), None);
    }

    #[test]
    fn test_memory_store_clones_share_state() {
        let store = MemoryStore::with(&[(KEY_VOLUME, "0.8")]);
        let mut writer = store.clone();
        writer.set(KEY_FAVORITE, "jazz").unwrap();
        assert_eq!(store.get(KEY_FAVORITE).as_deref(), Some("jazz"));
        assert_eq!(store.get(KEY_VOLUME).as_deref(), Some("0.8"));
    }
}
