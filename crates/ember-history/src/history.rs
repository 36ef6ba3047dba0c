//! Bounded list of recently executed statements

use ember_settings::{ConfigStore, HistorySettings, keys};
use std::collections::VecDeque;
use std::sync::Arc;

/// Recent statements of one scope, oldest first.
///
/// Limits are read from the configuration store on every change, so edits
/// to the settings apply to the next statement added.
pub struct StatementHistory {
    storage_name: String,
    items: VecDeque<String>,
    store: Arc<dyn ConfigStore>,
}

impl StatementHistory {
    /// Read the entries stored under `storage_name`, stopping at the first
    /// missing index.
    pub fn load(store: Arc<dyn ConfigStore>, storage_name: impl Into<String>) -> Self {
        let storage_name = storage_name.into();
        let mut items = VecDeque::new();
        while let Some(text) = store.get_value(&keys::history_item(&storage_name, items.len())) {
            items.push_back(text);
        }
        tracing::debug!(scope = %storage_name, count = items.len(), "loaded statement history");
        Self {
            storage_name,
            items,
            store,
        }
    }

    pub fn storage_name(&self) -> &str {
        &self.storage_name
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Entry at `position`, or an empty string when out of range
    pub fn get(&self, position: usize) -> &str {
        self.items.get(position).map(String::as_str).unwrap_or_default()
    }

    /// Replace the entry at `position`, appending when out of range
    pub fn set(&mut self, position: usize, text: impl Into<String>) {
        let text = text.into();
        match self.items.get_mut(position) {
            Some(item) => *item = text,
            None => self.items.push_back(text),
        }
        let settings = self.settings();
        self.enforce_count_limit(&settings);
    }

    /// Append `text` unless it repeats the newest entry or exceeds the item
    /// size limit. Returns the position of the newest entry, `None` while
    /// the history is empty.
    pub fn add(&mut self, text: impl Into<String>) -> Option<usize> {
        let text = text.into();
        let settings = self.settings();
        if settings.accepts_item(text.chars().count()) {
            if self.items.back() != Some(&text) {
                self.items.push_back(text);
            }
            self.enforce_count_limit(&settings);
        } else {
            tracing::debug!(scope = %self.storage_name, len = text.len(), "statement too long for history");
        }
        self.items.len().checked_sub(1)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(String::as_str)
    }

    /// Write the non-empty entries under consecutive indices and drop keys
    /// left over from a longer history.
    pub fn save(&self) {
        let mut written = 0;
        for text in self.items.iter().filter(|t| !t.is_empty()) {
            self.store.set_value(&keys::history_item(&self.storage_name, written), text);
            written += 1;
        }

        let prefix = keys::history_prefix(&self.storage_name);
        for key in self.store.keys_with_prefix(&prefix) {
            let stale = key[prefix.len()..]
                .parse::<usize>()
                .is_ok_and(|index| index >= written);
            if stale {
                self.store.remove(&key);
            }
        }
        tracing::debug!(scope = %self.storage_name, count = written, "saved statement history");
    }

    fn settings(&self) -> HistorySettings {
        HistorySettings::from_store(self.store.as_ref())
    }

    fn enforce_count_limit(&mut self, settings: &HistorySettings) {
        if let Some(max) = settings.max_items() {
            while self.items.len() > max {
                self.items.pop_front();
            }
        }
    }
}

impl std::fmt::Debug for StatementHistory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatementHistory")
            .field("storage_name", &self.storage_name)
            .field("items", &self.items)
            .finish()
    }
}
