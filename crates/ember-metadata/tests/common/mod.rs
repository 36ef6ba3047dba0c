//! Shared fixtures for ember-metadata integration tests

#![allow(dead_code)]

use ember_core::testing::{MockCatalog, MockRow};
use ember_core::{EmberError, Result, Value};
use ember_metadata::{ProgressIndicator, ServiceConnector, ServiceSession, User};
use parking_lot::Mutex;

/// Service manager that accepts a fixed set of logins
#[derive(Default)]
pub struct MockServiceConnector {
    accepted: Vec<(String, String)>,
    users: Vec<String>,
    attempts: Mutex<Vec<(String, String)>>,
}

impl MockServiceConnector {
    pub fn accepting(logins: &[(&str, &str)]) -> Self {
        Self {
            accepted: logins
                .iter()
                .map(|(u, p)| (u.to_string(), p.to_string()))
                .collect(),
            ..Default::default()
        }
    }

    pub fn with_users(mut self, users: &[&str]) -> Self {
        self.users = users.iter().map(|u| u.to_string()).collect();
        self
    }

    /// Every (username, password) tried so far, in order
    pub fn attempts(&self) -> Vec<(String, String)> {
        self.attempts.lock().clone()
    }
}

struct MockServiceSession {
    users: Vec<String>,
}

impl ServiceSession for MockServiceSession {
    fn users(&mut self) -> Result<Vec<User>> {
        Ok(self
            .users
            .iter()
            .map(|name| User {
                username: name.clone(),
                ..Default::default()
            })
            .collect())
    }
}

impl ServiceConnector for MockServiceConnector {
    fn connect(&self, _connection_string: &str, username: &str, password: &str) -> Result<Box<dyn ServiceSession>> {
        self.attempts
            .lock()
            .push((username.to_string(), password.to_string()));
        if self
            .accepted
            .iter()
            .any(|(u, p)| u == username && p == password)
        {
            Ok(Box::new(MockServiceSession {
                users: self.users.clone(),
            }))
        } else {
            Err(EmberError::Connection(format!("login of {} rejected", username)))
        }
    }
}

/// Progress indicator keeping every message
#[derive(Default)]
pub struct RecordingProgress {
    pub messages: Vec<String>,
    pub steps: usize,
    pub canceled: bool,
}

impl ProgressIndicator for RecordingProgress {
    fn init_progress(&mut self, message: &str, _steps: usize) {
        self.messages.push(message.to_string());
    }

    fn set_progress_message(&mut self, message: &str) {
        self.messages.push(message.to_string());
    }

    fn step_progress(&mut self) {
        self.steps += 1;
    }

    fn is_canceled(&self) -> bool {
        self.canceled
    }
}

/// Row of the foreign key query: constraint, column, update rule, delete
/// rule, referenced unique constraint, index
pub fn fk_row(name: &str, column: &str, referenced: &str) -> MockRow {
    vec![
        Value::from(format!("{:<31}", name)),
        Value::from(format!("{:<31}", column)),
        Value::from("RESTRICT   "),
        Value::from("CASCADE    "),
        Value::from(format!("{:<31}", referenced)),
        Value::from(format!("RDB$FOREIGN_{}", name)),
    ]
}

/// Row of the column query for an INTEGER column
pub fn integer_column(name: &str, position: i16) -> MockRow {
    let mut row = vec![Value::Null; 17];
    row[0] = Value::from(format!("{:<31}", name));
    row[2] = Value::from("RDB$1");
    row[8] = Value::Int16(8);
    row[10] = Value::Int16(4);
    row[16] = Value::Int16(position);
    row
}

/// A sales schema: CUSTOMER <- ORDERS <- ORDER_LINE, plus a view and a
/// selectable procedure
pub fn sales_catalog() -> MockCatalog {
    MockCatalog::new("SALES")
        .with_rows(
            "rdb$view_blr",
            vec![
                vec!["CUSTOMER".into(), Value::Null],
                vec!["ORDERS".into(), Value::Null],
                vec!["ORDER_LINE".into(), Value::Null],
                vec!["OPEN_ORDERS".into(), Value::Bytes(vec![5])],
            ],
        )
        .with_rows("order by rdb$procedure_name", vec![vec!["ORDER_TOTAL".into()]])
        .with_rows_for(
            "rdb$relation_fields",
            "ORDERS",
            vec![integer_column("ID", 0), integer_column("CUSTOMER_ID", 1)],
        )
        .with_rows_for(
            "'FOREIGN KEY'",
            "ORDERS",
            vec![fk_row("FK_ORDERS_CUSTOMER", "CUSTOMER_ID", "PK_CUSTOMER")],
        )
        .with_rows_for(
            "'FOREIGN KEY'",
            "ORDER_LINE",
            vec![
                fk_row("FK_LINE_ORDER", "ORDER_ID", "PK_ORDERS"),
                fk_row("FK_LINE_ORDER", "ORDER_CUSTOMER", "PK_ORDERS"),
            ],
        )
        .with_rows_for(
            "where r.rdb$constraint_name = ?",
            "PK_CUSTOMER",
            vec![vec!["CUSTOMER".into(), "ID".into()]],
        )
        .with_rows_for(
            "where r.rdb$constraint_name = ?",
            "PK_ORDERS",
            vec![
                vec!["ORDERS".into(), "ID".into()],
                vec!["ORDERS".into(), "CUSTOMER_ID".into()],
            ],
        )
        .with_rows_for(
            "rdb$dependencies",
            "ORDERS",
            vec![
                vec!["ORDER_LINE".into(), Value::Int16(0)],
                vec!["CHECK_ORDERS".into(), Value::Int16(2)],
            ],
        )
}
