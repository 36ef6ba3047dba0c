//! Gateway for catalog queries
//!
//! Every facet load goes through a [`MetadataLoader`]. It keeps one prepared
//! statement per distinct SQL text and scopes all reads inside a read
//! transaction whose lifetime is reference counted by
//! [`MetadataLoaderTransaction`] guards, so nested loads share a single
//! server transaction.

use ember_core::{CatalogConnection, CatalogStatement, EmberError, Result, Value};
use parking_lot::{Mutex, MutexGuard};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

type SharedStatement = Arc<Mutex<Box<dyn CatalogStatement>>>;

/// Statement cache and transaction scope for one database connection
pub struct MetadataLoader {
    connection: Arc<dyn CatalogConnection>,
    statements: Mutex<HashMap<String, SharedStatement>>,
    depth: Arc<AtomicUsize>,
}

impl MetadataLoader {
    pub fn new(connection: Arc<dyn CatalogConnection>) -> Self {
        Self {
            connection,
            statements: Mutex::new(HashMap::new()),
            depth: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn connection(&self) -> &Arc<dyn CatalogConnection> {
        &self.connection
    }

    /// Get the prepared statement for `sql`, preparing it on first use.
    ///
    /// # Errors
    /// `EmberError::Connection` when the connection is gone; preparation
    /// failures are returned as reported by the driver.
    pub fn get_statement(&self, sql: &str) -> Result<StatementHandle> {
        if !self.connection.is_connected() {
            return Err(EmberError::Connection(format!(
                "{}: not connected",
                self.connection.database_name()
            )));
        }

        let mut statements = self.statements.lock();
        if let Some(statement) = statements.get(sql) {
            return Ok(StatementHandle {
                statement: Arc::clone(statement),
                depth: Arc::clone(&self.depth),
            });
        }

        let statement: SharedStatement = Arc::new(Mutex::new(self.connection.prepare(sql)?));
        tracing::trace!(sql, cached = statements.len() + 1, "prepared catalog statement");
        statements.insert(sql.to_string(), Arc::clone(&statement));
        Ok(StatementHandle {
            statement,
            depth: Arc::clone(&self.depth),
        })
    }

    /// Enter the loader's transaction scope.
    ///
    /// The first guard starts a read transaction; the last one dropped
    /// commits it.
    pub fn transaction(&self) -> Result<MetadataLoaderTransaction<'_>> {
        if self.depth.load(Ordering::SeqCst) == 0 {
            self.connection.start_read_transaction()?;
            tracing::trace!(database = self.connection.database_name(), "metadata transaction started");
        }
        self.depth.fetch_add(1, Ordering::SeqCst);
        Ok(MetadataLoaderTransaction { loader: self })
    }

    /// Number of nested transaction guards currently alive
    pub fn transaction_depth(&self) -> usize {
        self.depth.load(Ordering::SeqCst)
    }

    /// Number of cached prepared statements
    pub fn statement_count(&self) -> usize {
        self.statements.lock().len()
    }

    /// Drop every cached statement
    pub fn clear_statements(&self) {
        self.statements.lock().clear();
    }

    fn release(&self) {
        if self.depth.fetch_sub(1, Ordering::SeqCst) != 1 {
            return;
        }
        if let Err(e) = self.connection.commit() {
            tracing::warn!(
                database = self.connection.database_name(),
                error = %e,
                "failed to commit metadata transaction, rolling back"
            );
            if let Err(e) = self.connection.rollback() {
                tracing::error!(error = %e, "failed to roll back metadata transaction");
            }
        } else {
            tracing::trace!(database = self.connection.database_name(), "metadata transaction committed");
        }
    }
}

/// RAII guard over the loader's shared read transaction
#[must_use = "the transaction ends when the guard is dropped"]
pub struct MetadataLoaderTransaction<'a> {
    loader: &'a MetadataLoader,
}

impl Drop for MetadataLoaderTransaction<'_> {
    fn drop(&mut self) {
        self.loader.release();
    }
}

/// A cached prepared statement
#[derive(Clone)]
pub struct StatementHandle {
    statement: SharedStatement,
    depth: Arc<AtomicUsize>,
}

impl std::fmt::Debug for StatementHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatementHandle")
            .field("transaction_depth", &self.depth.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl StatementHandle {
    /// Take exclusive use of the statement
    pub fn lock(&self) -> LockedStatement<'_> {
        LockedStatement {
            statement: self.statement.lock(),
            depth: &self.depth,
        }
    }
}

/// Exclusive access to a cached statement.
///
/// Execution is refused unless the owning loader has an open transaction.
pub struct LockedStatement<'a> {
    statement: MutexGuard<'a, Box<dyn CatalogStatement>>,
    depth: &'a AtomicUsize,
}

impl LockedStatement<'_> {
    pub fn bind(&mut self, position: usize, value: impl Into<Value>) -> Result<()> {
        self.statement.bind(position, value.into())
    }

    pub fn execute(&mut self) -> Result<()> {
        if self.depth.load(Ordering::SeqCst) == 0 {
            return Err(EmberError::Connection(
                "catalog query executed outside a metadata transaction".into(),
            ));
        }
        self.statement.execute()
    }

    pub fn fetch(&mut self) -> Result<bool> {
        self.statement.fetch()
    }

    pub fn get(&self, position: usize) -> Result<Value> {
        self.statement.get(position)
    }

    pub fn is_null(&self, position: usize) -> Result<bool> {
        self.statement.is_null(position)
    }

    pub fn read_blob(&self, position: usize) -> Result<String> {
        self.statement.read_blob(position)
    }

    pub fn get_trimmed(&self, position: usize) -> Result<String> {
        self.statement.get_trimmed(position)
    }

    pub fn get_i64_or(&self, position: usize, default: i64) -> Result<i64> {
        self.statement.get_i64_or(position, default)
    }

    /// Text column, `None` when NULL or blank
    pub fn get_optional(&self, position: usize) -> Result<Option<String>> {
        let text = self.get_trimmed(position)?;
        Ok(if text.is_empty() { None } else { Some(text) })
    }
}
