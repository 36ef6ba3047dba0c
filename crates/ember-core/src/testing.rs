//! Scripted in-memory catalog for tests
//!
//! `MockCatalog` answers queries by matching a SQL fragment, optionally
//! narrowed by the value bound to the first parameter, and records every
//! execution so tests can assert on what the loaders actually ran.

use crate::{CatalogConnection, CatalogStatement, EmberError, Result, Value};
use parking_lot::Mutex;
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

/// A row returned by the mock, one value per selected column
pub type MockRow = Vec<Value>;

/// One recorded statement execution
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutedStatement {
    pub sql: String,
    /// Bound values ordered by position
    pub params: Vec<Value>,
}

struct Response {
    fragment: String,
    first_param: Option<Value>,
    rows: Vec<MockRow>,
}

#[derive(Default)]
struct MockState {
    connected: bool,
    in_transaction: bool,
    transactions_started: usize,
    commits: usize,
    rollbacks: usize,
    prepared: usize,
    responses: Vec<Response>,
    prepare_failures: Vec<(String, String)>,
    execute_failures: Vec<(String, String)>,
    executed: Vec<ExecutedStatement>,
}

/// In-memory `CatalogConnection`
#[derive(Clone)]
pub struct MockCatalog {
    database_name: String,
    username: String,
    password: String,
    state: Arc<Mutex<MockState>>,
}

impl MockCatalog {
    /// A connected catalog logged in as SYSDBA
    pub fn new(database_name: impl Into<String>) -> Self {
        Self {
            database_name: database_name.into(),
            username: "SYSDBA".to_string(),
            password: "masterkey".to_string(),
            state: Arc::new(Mutex::new(MockState {
                connected: true,
                ..Default::default()
            })),
        }
    }

    pub fn with_credentials(mut self, username: &str, password: &str) -> Self {
        self.username = username.to_string();
        self.password = password.to_string();
        self
    }

    /// Answer every query containing `fragment` with `rows`
    pub fn with_rows(self, fragment: &str, rows: Vec<MockRow>) -> Self {
        self.state.lock().responses.push(Response {
            fragment: fragment.to_string(),
            first_param: None,
            rows,
        });
        self
    }

    /// Answer queries containing `fragment` whose first parameter equals
    /// `first_param`. Takes precedence over an unfiltered response.
    pub fn with_rows_for(
        self,
        fragment: &str,
        first_param: impl Into<Value>,
        rows: Vec<MockRow>,
    ) -> Self {
        self.state.lock().responses.push(Response {
            fragment: fragment.to_string(),
            first_param: Some(first_param.into()),
            rows,
        });
        self
    }

    pub fn with_prepare_failure(self, fragment: &str, message: &str) -> Self {
        self.state
            .lock()
            .prepare_failures
            .push((fragment.to_string(), message.to_string()));
        self
    }

    pub fn with_execute_failure(self, fragment: &str, message: &str) -> Self {
        self.state
            .lock()
            .execute_failures
            .push((fragment.to_string(), message.to_string()));
        self
    }

    pub fn set_connected(&self, connected: bool) {
        self.state.lock().connected = connected;
    }

    /// Number of successful `prepare` calls
    pub fn prepared_count(&self) -> usize {
        self.state.lock().prepared
    }

    pub fn executed(&self) -> Vec<ExecutedStatement> {
        self.state.lock().executed.clone()
    }

    /// Executions whose SQL contains `fragment`
    pub fn executions_matching(&self, fragment: &str) -> Vec<ExecutedStatement> {
        self.state
            .lock()
            .executed
            .iter()
            .filter(|e| e.sql.contains(fragment))
            .cloned()
            .collect()
    }

    pub fn transactions_started(&self) -> usize {
        self.state.lock().transactions_started
    }

    pub fn commits(&self) -> usize {
        self.state.lock().commits
    }

    pub fn rollbacks(&self) -> usize {
        self.state.lock().rollbacks
    }
}

impl CatalogConnection for MockCatalog {
    fn database_name(&self) -> &str {
        &self.database_name
    }

    fn username(&self) -> &str {
        &self.username
    }

    fn password(&self) -> &str {
        &self.password
    }

    fn is_connected(&self) -> bool {
        self.state.lock().connected
    }

    fn prepare(&self, sql: &str) -> Result<Box<dyn CatalogStatement>> {
        let mut state = self.state.lock();
        if !state.connected {
            return Err(EmberError::Connection("not connected".into()));
        }
        if let Some((_, message)) = state
            .prepare_failures
            .iter()
            .find(|(fragment, _)| sql.contains(fragment.as_str()))
        {
            return Err(EmberError::Prepare(message.clone()));
        }
        state.prepared += 1;
        Ok(Box::new(MockStatement {
            sql: sql.to_string(),
            params: BTreeMap::new(),
            rows: VecDeque::new(),
            current: None,
            state: Arc::clone(&self.state),
        }))
    }

    fn start_read_transaction(&self) -> Result<()> {
        let mut state = self.state.lock();
        if state.in_transaction {
            return Err(EmberError::Connection("transaction already active".into()));
        }
        state.in_transaction = true;
        state.transactions_started += 1;
        Ok(())
    }

    fn commit(&self) -> Result<()> {
        let mut state = self.state.lock();
        if !state.in_transaction {
            return Err(EmberError::Connection("no active transaction".into()));
        }
        state.in_transaction = false;
        state.commits += 1;
        Ok(())
    }

    fn rollback(&self) -> Result<()> {
        let mut state = self.state.lock();
        state.in_transaction = false;
        state.rollbacks += 1;
        Ok(())
    }

    fn in_transaction(&self) -> bool {
        self.state.lock().in_transaction
    }
}

struct MockStatement {
    sql: String,
    params: BTreeMap<usize, Value>,
    rows: VecDeque<MockRow>,
    current: Option<MockRow>,
    state: Arc<Mutex<MockState>>,
}

impl CatalogStatement for MockStatement {
    fn bind(&mut self, position: usize, value: Value) -> Result<()> {
        if position == 0 {
            return Err(EmberError::Query("parameter positions start at 1".into()));
        }
        self.params.insert(position, value);
        Ok(())
    }

    fn execute(&mut self) -> Result<()> {
        let mut state = self.state.lock();
        if !state.in_transaction {
            return Err(EmberError::Connection(
                "statement executed outside a transaction".into(),
            ));
        }
        state.executed.push(ExecutedStatement {
            sql: self.sql.clone(),
            params: self.params.values().cloned().collect(),
        });
        if let Some((_, message)) = state
            .execute_failures
            .iter()
            .find(|(fragment, _)| self.sql.contains(fragment.as_str()))
        {
            return Err(EmberError::Query(message.clone()));
        }

        let first = self.params.get(&1);
        let candidates: Vec<&Response> = state
            .responses
            .iter()
            .filter(|r| self.sql.contains(r.fragment.as_str()))
            .collect();
        let response = candidates
            .iter()
            .find(|r| r.first_param.is_some() && r.first_param.as_ref() == first)
            .or_else(|| candidates.iter().find(|r| r.first_param.is_none()));

        self.rows = response
            .map(|r| r.rows.iter().cloned().collect())
            .unwrap_or_default();
        self.current = None;
        Ok(())
    }

    fn fetch(&mut self) -> Result<bool> {
        self.current = self.rows.pop_front();
        Ok(self.current.is_some())
    }

    fn get(&self, position: usize) -> Result<Value> {
        let row = self
            .current
            .as_ref()
            .ok_or_else(|| EmberError::Query("no current row".into()))?;
        position
            .checked_sub(1)
            .and_then(|index| row.get(index))
            .cloned()
            .ok_or_else(|| EmberError::Query(format!("column {} out of range", position)))
    }
}
