//! Integration tests for the item graph built from a live catalog
//!
//! A server owns one connected database whose objects are read from the
//! catalog, then walked, cross-referenced and observed.

mod common;

use std::sync::Arc;

use ember_metadata::{
    Database, MetadataNode, Observer, Server, TypeNameCollector, walk,
};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use uuid::Uuid;

use common::sales_catalog;

fn sales_server(catalog: &ember_core::testing::MockCatalog) -> Server {
    let mut server = Server::new("localhost", "3050");
    let database = server.add_database(Database::new("SALES", "/data/sales.fdb"));
    database.connect(Arc::new(catalog.clone()));
    database.load_objects().unwrap();
    server
}

#[derive(Default)]
struct Notifications(Mutex<Vec<Uuid>>);

impl Observer for Notifications {
    fn update(&self, subject: Uuid) {
        self.0.lock().push(subject);
    }
}

#[test]
fn walk_visits_only_loaded_items() {
    let catalog = sales_catalog();
    let mut server = sales_server(&catalog);

    let mut collector = TypeNameCollector::default();
    walk(&server, &mut collector);
    assert_eq!(
        collector.names,
        vec![
            "SERVER localhost",
            "DATABASE SALES",
            "TABLE CUSTOMER",
            "TABLE ORDERS",
            "TABLE ORDER_LINE",
            "VIEW OPEN_ORDERS",
            "PROCEDURE ORDER_TOTAL",
        ]
    );

    let database = &mut server.databases_mut()[0];
    database.find_table_mut("ORDERS").unwrap().columns();

    let mut collector = TypeNameCollector::default();
    walk(&server.databases()[0], &mut collector);
    assert_eq!(
        collector.names[..5].to_vec(),
        vec![
            "DATABASE SALES",
            "TABLE CUSTOMER",
            "TABLE ORDERS",
            "COLUMN ID",
            "COLUMN CUSTOMER_ID",
        ]
    );
}

#[test]
fn tables_relate_follows_keys_in_both_directions() {
    let catalog = sales_catalog();
    let mut server = sales_server(&catalog);
    let database = &mut server.databases_mut()[0];

    let related = database
        .tables_relate(&["CUSTOMER".to_string(), "ORDER_LINE".to_string()], "ORDERS")
        .unwrap();

    let names: Vec<&str> = related.iter().map(|fk| fk.name.as_str()).collect();
    assert_eq!(names, vec!["FK_ORDERS_CUSTOMER", "FK_LINE_ORDER"]);
    assert_eq!(related[0].referenced_table, "CUSTOMER");
    assert_eq!(related[1].table, "ORDER_LINE");
    assert_eq!(related[1].columns, vec!["ORDER_ID", "ORDER_CUSTOMER"]);
    assert_eq!(related[1].referenced_columns, vec!["ID", "CUSTOMER_ID"]);
    assert_eq!(
        related[1].join_condition(),
        "ORDER_LINE.ORDER_ID = ORDERS.ID AND ORDER_LINE.ORDER_CUSTOMER = ORDERS.CUSTOMER_ID"
    );

    // object list, then one shared transaction for every nested load
    assert_eq!(catalog.transactions_started(), 2);
    assert_eq!(catalog.commits(), 2);
}

#[test]
fn tables_relate_without_listed_tables_is_empty() {
    let catalog = sales_catalog();
    let mut server = sales_server(&catalog);

    let related = server.databases_mut()[0]
        .tables_relate(&["CUSTOMER".to_string()], "ORDER_LINE")
        .unwrap();
    assert!(related.is_empty());
}

#[test]
fn facet_load_notifies_observers_once() {
    let catalog = sales_catalog();
    let mut server = sales_server(&catalog);
    let table = server.databases_mut()[0].find_table_mut("ORDER_LINE").unwrap();

    let notifications = Arc::new(Notifications::default());
    let observer: Arc<dyn Observer> = notifications.clone();
    table.item().attach_observer(&observer);

    assert_eq!(table.foreign_keys().len(), 1);
    assert_eq!(table.foreign_keys().len(), 1);
    assert_eq!(*notifications.0.lock(), vec![table.item().id()]);
}

#[test]
fn disconnecting_clears_the_graph() {
    let catalog = sales_catalog();
    let mut server = sales_server(&catalog);
    assert!(server.has_connected_database());

    server.databases_mut()[0].disconnect();

    assert!(!server.has_connected_database());
    let mut children = Vec::new();
    assert!(!server.databases()[0].get_children(&mut children));
}
