//! Process-wide set of statement histories

use ember_core::{EmberError, Result};
use ember_metadata::Database;
use ember_settings::{ConfigStore, HistorySettings};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

use crate::history::StatementHistory;
use crate::scope::HistoryScope;

/// Histories keyed by scope, created on first use and written back to the
/// configuration store on [`HistoryRegistry::flush`] and on drop.
pub struct HistoryRegistry {
    store: Arc<dyn ConfigStore>,
    histories: HashMap<HistoryScope, StatementHistory>,
}

impl HistoryRegistry {
    pub fn new(store: Arc<dyn ConfigStore>) -> Self {
        Self {
            store,
            histories: HashMap::new(),
        }
    }

    /// History used for statements run against `database`. The scope
    /// follows the configured granularity at the time of the call.
    pub fn get(&mut self, database: &Database) -> &mut StatementHistory {
        let granularity = HistorySettings::from_store(self.store.as_ref()).granularity;
        self.get_scope(HistoryScope::for_database(granularity, database))
    }

    pub fn get_scope(&mut self, scope: HistoryScope) -> &mut StatementHistory {
        let store = &self.store;
        self.histories.entry(scope).or_insert_with_key(|scope| {
            StatementHistory::load(Arc::clone(store), scope.storage_name())
        })
    }

    /// Number of histories loaded so far
    pub fn len(&self) -> usize {
        self.histories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.histories.is_empty()
    }

    /// Write every loaded history to the store
    pub fn flush(&self) {
        for history in self.histories.values() {
            history.save();
        }
        tracing::debug!(histories = self.histories.len(), "flushed statement histories");
    }
}

impl Drop for HistoryRegistry {
    fn drop(&mut self) {
        self.flush();
    }
}

static GLOBAL_REGISTRY: Lazy<Mutex<Option<HistoryRegistry>>> = Lazy::new(|| Mutex::new(None));

/// Install the process-wide registry. A registry installed before is
/// flushed and replaced.
pub fn init_global(store: Arc<dyn ConfigStore>) {
    let previous = GLOBAL_REGISTRY.lock().replace(HistoryRegistry::new(store));
    if previous.is_some() {
        tracing::warn!("statement history registry initialized twice, replacing");
    }
}

/// Run `f` with the process-wide registry.
///
/// # Errors
/// `EmberError::Configuration` when [`init_global`] has not been called.
pub fn with_global<R>(f: impl FnOnce(&mut HistoryRegistry) -> R) -> Result<R> {
    let mut guard = GLOBAL_REGISTRY.lock();
    let registry = guard.as_mut().ok_or_else(|| {
        EmberError::Configuration("statement history registry not initialized".into())
    })?;
    Ok(f(registry))
}

/// Flush and remove the process-wide registry
pub fn shutdown_global() {
    let registry = GLOBAL_REGISTRY.lock().take();
    if let Some(registry) = registry {
        tracing::info!(histories = registry.len(), "shutting down statement history registry");
        drop(registry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_settings::{MemoryConfigStore, keys};
    use pretty_assertions::assert_eq;

    fn registry_with(granularity: i64) -> (Arc<MemoryConfigStore>, HistoryRegistry) {
        let store = Arc::new(MemoryConfigStore::new());
        store.set_int(keys::STATEMENT_HISTORY_GRANULARITY, granularity);
        let registry = HistoryRegistry::new(store.clone());
        (store, registry)
    }

    #[test]
    fn test_per_database_scope() {
        let (_store, mut registry) = registry_with(2);
        let first = Database::new("SALES", "/a/sales.fdb");
        let second = Database::new("SALES", "/b/sales.fdb");

        registry.get(&first).add("select * from orders");

        assert_eq!(registry.get(&first).len(), 1);
        assert!(registry.get(&second).is_empty());
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_per_database_name_scope_is_shared() {
        let (_store, mut registry) = registry_with(1);
        let first = Database::new("SALES", "/a/sales.fdb");
        let second = Database::new("SALES", "/b/sales.fdb");

        registry.get(&first).add("select * from orders");

        assert_eq!(registry.get(&second).get(0), "select * from orders");
        assert_eq!(registry.get(&second).storage_name(), "DATABASENAMESALES");
    }

    #[test]
    fn test_granularity_is_read_at_each_call() {
        let (store, mut registry) = registry_with(2);
        let database = Database::new("SALES", "/a/sales.fdb");
        registry.get(&database).add("select 1 from rdb$database");

        store.set_int(keys::STATEMENT_HISTORY_GRANULARITY, 0);

        assert_eq!(registry.get(&database).storage_name(), "");
        assert!(registry.get(&database).is_empty());
    }

    #[test]
    fn test_drop_flushes_to_store() {
        let (store, mut registry) = registry_with(0);
        let database = Database::new("SALES", "/a/sales.fdb");
        registry.get(&database).add("commit");

        drop(registry);

        assert_eq!(store.get_value("HISTORY__ITEM_0").as_deref(), Some("commit"));
    }

    #[test]
    fn test_global_registry_lifecycle() {
        let store = Arc::new(MemoryConfigStore::new());
        store.set_int(keys::STATEMENT_HISTORY_GRANULARITY, 0);
        let database = Database::new("SALES", "/a/sales.fdb");

        init_global(store.clone());
        let position = with_global(|registry| registry.get(&database).add("rollback")).unwrap();
        assert_eq!(position, Some(0));

        shutdown_global();
        assert_eq!(store.get_value("HISTORY__ITEM_0").as_deref(), Some("rollback"));
        assert!(matches!(
            with_global(|registry| registry.len()),
            Err(EmberError::Configuration(_))
        ));
    }
}
