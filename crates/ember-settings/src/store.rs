//! Key/value configuration stores

use anyhow::{Context, Result};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::settings_file;

/// A flat string key/value configuration store.
///
/// Stores use interior mutability so one instance can be shared behind an
/// `Arc` by every consumer in the process.
pub trait ConfigStore: Send + Sync {
    fn get_value(&self, key: &str) -> Option<String>;

    fn set_value(&self, key: &str, value: &str);

    /// Remove a key, returning whether it was present
    fn remove(&self, key: &str) -> bool;

    /// All keys starting with `prefix`, in key order
    fn keys_with_prefix(&self, prefix: &str) -> Vec<String>;

    /// Read a boolean. Accepts `true`/`false` and `1`/`0`; anything else
    /// yields `default`.
    fn get_bool(&self, key: &str, default: bool) -> bool {
        match self.get_value(key).as_deref().map(str::trim) {
            Some("true") | Some("1") => true,
            Some("false") | Some("0") => false,
            _ => default,
        }
    }

    fn get_int(&self, key: &str, default: i64) -> i64 {
        self.get_value(key)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(default)
    }

    fn set_bool(&self, key: &str, value: bool) {
        self.set_value(key, if value { "true" } else { "false" });
    }

    fn set_int(&self, key: &str, value: i64) {
        self.set_value(key, &value.to_string());
    }
}

/// In-memory store with no persistence
#[derive(Debug, Default)]
pub struct MemoryConfigStore {
    values: RwLock<BTreeMap<String, String>>,
}

impl MemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.values.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.read().is_empty()
    }
}

impl ConfigStore for MemoryConfigStore {
    fn get_value(&self, key: &str) -> Option<String> {
        self.values.read().get(key).cloned()
    }

    fn set_value(&self, key: &str, value: &str) {
        self.values.write().insert(key.to_string(), value.to_string());
    }

    fn remove(&self, key: &str) -> bool {
        self.values.write().remove(key).is_some()
    }

    fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        prefix_keys(&self.values.read(), prefix)
    }
}

/// Store backed by a JSON object on disk.
///
/// Changes stay in memory until [`FileConfigStore::save`] is called.
#[derive(Debug)]
pub struct FileConfigStore {
    path: PathBuf,
    values: RwLock<BTreeMap<String, String>>,
}

impl FileConfigStore {
    /// Load the store from `path`. A missing file yields an empty store.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let values: BTreeMap<String, String> = if path.exists() {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {:?}", path))?;
            serde_json::from_str(&content).with_context(|| "Failed to parse settings JSON")?
        } else {
            BTreeMap::new()
        };
        tracing::debug!(path = %path.display(), keys = values.len(), "loaded configuration");
        Ok(Self {
            path,
            values: RwLock::new(values),
        })
    }

    /// Load the store from the user's config directory
    pub fn load_default() -> Result<Self> {
        Self::load(settings_file::config_file()?)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {:?}", parent))?;
        }
        let content = serde_json::to_string_pretty(&*self.values.read())?;
        std::fs::write(&self.path, content)
            .with_context(|| format!("Failed to write settings to {:?}", self.path))?;
        tracing::debug!(path = %self.path.display(), "saved configuration");
        Ok(())
    }
}

impl ConfigStore for FileConfigStore {
    fn get_value(&self, key: &str) -> Option<String> {
        self.values.read().get(key).cloned()
    }

    fn set_value(&self, key: &str, value: &str) {
        self.values.write().insert(key.to_string(), value.to_string());
    }

    fn remove(&self, key: &str) -> bool {
        self.values.write().remove(key).is_some()
    }

    fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        prefix_keys(&self.values.read(), prefix)
    }
}

fn prefix_keys(values: &BTreeMap<String, String>, prefix: &str) -> Vec<String> {
    values
        .range(prefix.to_string()..)
        .take_while(|(k, _)| k.starts_with(prefix))
        .map(|(k, _)| k.clone())
        .collect()
}
