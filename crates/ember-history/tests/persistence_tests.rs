//! Integration tests for statement history persistence
//!
//! Histories are written through a JSON settings file and read back by a
//! fresh registry, as happens across application restarts.

use std::sync::Arc;

use ember_history::{HistoryRegistry, HistoryScope, StatementHistory};
use ember_metadata::Database;
use ember_settings::{ConfigStore, FileConfigStore, keys};
use pretty_assertions::assert_eq;
use uuid::Uuid;

#[test]
fn history_survives_a_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ember").join("config.json");
    let id = Uuid::new_v4();

    {
        let store = Arc::new(FileConfigStore::load(&path).unwrap());
        let database = Database::new("SALES", "/data/sales.fdb").with_id(id);
        let mut registry = HistoryRegistry::new(store.clone());
        let history = registry.get(&database);
        history.add("select * from customer");
        history.add("select * from orders");
        drop(registry);
        store.save().unwrap();
    }

    let store = Arc::new(FileConfigStore::load(&path).unwrap());
    let database = Database::new("SALES", "/data/sales.fdb").with_id(id);
    let mut registry = HistoryRegistry::new(store);
    let history = registry.get(&database);

    assert_eq!(
        history.iter().collect::<Vec<_>>(),
        vec!["select * from customer", "select * from orders"]
    );
    assert_eq!(history.storage_name(), format!("DATABASE{}", id));
}

#[test]
fn limits_follow_the_stored_settings() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(
        &path,
        r#"{"limitHistorySize": "true", "statementHistorySize": "2", "statementHistoryGranularity": "0"}"#,
    )
    .unwrap();
    let store = Arc::new(FileConfigStore::load(&path).unwrap());
    let mut registry = HistoryRegistry::new(store.clone());

    let history = registry.get_scope(HistoryScope::Global);
    for statement in ["a", "b", "c"] {
        history.add(statement);
    }
    registry.flush();

    assert_eq!(store.get_value(&keys::history_item("", 0)).as_deref(), Some("b"));
    assert_eq!(store.get_value(&keys::history_item("", 1)).as_deref(), Some("c"));
    assert_eq!(store.get_value(&keys::history_item("", 2)), None);

    let reloaded = StatementHistory::load(store, "");
    assert_eq!(reloaded.len(), 2);
}
