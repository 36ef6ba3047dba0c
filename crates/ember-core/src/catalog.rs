//! Catalog connection and statement traits
//!
//! The metadata engine only ever talks to the server through this narrow
//! contract: prepare a statement, bind positional parameters, execute,
//! fetch rows and read columns. Positions are 1-based, matching the
//! catalog driver convention.

use crate::{Result, Value, identifier};

/// A prepared catalog query
pub trait CatalogStatement: Send {
    /// Bind a value to a 1-based parameter position
    fn bind(&mut self, position: usize, value: Value) -> Result<()>;

    /// Execute the statement with the currently bound parameters
    fn execute(&mut self) -> Result<()>;

    /// Advance to the next row. Returns `false` when the result is exhausted.
    fn fetch(&mut self) -> Result<bool>;

    /// Read a column of the current row
    fn get(&self, position: usize) -> Result<Value>;

    /// Check if a column of the current row is NULL
    fn is_null(&self, position: usize) -> Result<bool> {
        Ok(self.get(position)?.is_null())
    }

    /// Read a large-object text column. A NULL blob reads as an empty string.
    fn read_blob(&self, position: usize) -> Result<String> {
        Ok(match self.get(position)? {
            Value::Null => String::new(),
            Value::Bytes(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            other => other.to_string(),
        })
    }

    /// Read a fixed-width text column with its padding removed.
    /// NULL reads as an empty string.
    fn get_trimmed(&self, position: usize) -> Result<String> {
        Ok(match self.get(position)? {
            Value::Null => String::new(),
            other => identifier::trim_catalog(&other.to_string()).to_string(),
        })
    }

    /// Read an integer column, falling back to `default` for NULL
    fn get_i64_or(&self, position: usize, default: i64) -> Result<i64> {
        Ok(self.get(position)?.as_i64().unwrap_or(default))
    }
}

/// A live connection to a database's system catalog
pub trait CatalogConnection: Send + Sync {
    /// Name of the database this connection is attached to
    fn database_name(&self) -> &str;

    /// User name the connection was established with
    fn username(&self) -> &str;

    /// Password the connection was established with
    fn password(&self) -> &str;

    /// Whether the connection is still usable
    fn is_connected(&self) -> bool;

    /// Prepare a catalog query
    fn prepare(&self, sql: &str) -> Result<Box<dyn CatalogStatement>>;

    /// Start a read-only transaction that subsequent statements run in
    fn start_read_transaction(&self) -> Result<()>;

    /// Commit the active transaction
    fn commit(&self) -> Result<()>;

    /// Roll back the active transaction
    fn rollback(&self) -> Result<()>;

    /// Whether a transaction is currently active
    fn in_transaction(&self) -> bool;
}
