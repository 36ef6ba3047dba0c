//! Object name normalization and quoting
//!
//! Catalog names are stored upper-cased and padded to the width of the
//! catalog column. A name only needs double quotes in generated SQL when it
//! would otherwise be read back differently: lower-case letters, characters
//! outside the regular identifier set, or a reserved word.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Words that always need quoting when used as object names
const RESERVED_WORDS: &[&str] = &[
    "ACTIVE", "ADD", "ADMIN", "AFTER", "ALL", "ALTER", "AND", "ANY", "AS", "ASC", "ASCENDING",
    "AT", "AUTO", "AVG", "BEFORE", "BEGIN", "BETWEEN", "BIGINT", "BLOB", "BY", "CASCADE", "CASE",
    "CAST", "CHAR", "CHARACTER", "CHECK", "COLLATE", "COLUMN", "COMMIT", "COMPUTED", "CONSTRAINT",
    "CONTAINING", "COUNT", "CREATE", "CROSS", "CURRENT", "CURRENT_DATE", "CURRENT_TIME",
    "CURRENT_TIMESTAMP", "CURRENT_USER", "CURSOR", "DATABASE", "DATE", "DAY", "DEC", "DECIMAL",
    "DECLARE", "DEFAULT", "DELETE", "DESC", "DESCENDING", "DISTINCT", "DO", "DOMAIN", "DOUBLE",
    "DROP", "ELSE", "END", "ENTRY_POINT", "ESCAPE", "EXCEPTION", "EXECUTE", "EXISTS", "EXIT",
    "EXTERNAL", "EXTRACT", "FETCH", "FILE", "FILTER", "FLOAT", "FOR", "FOREIGN", "FROM", "FULL",
    "FUNCTION", "GENERATOR", "GRANT", "GROUP", "HAVING", "HOUR", "IF", "IN", "INACTIVE", "INDEX",
    "INNER", "INSERT", "INT", "INTEGER", "INTO", "IS", "JOIN", "KEY", "LEFT", "LIKE", "MAX", "MIN",
    "MINUTE", "MONTH", "NATURAL", "NO", "NOT", "NULL", "NUMERIC", "OF", "ON", "ONLY", "OPTION",
    "OR", "ORDER", "OUTER", "PARAMETER", "PASSWORD", "PLAN", "POSITION", "PRECISION", "PRIMARY",
    "PRIVILEGES", "PROCEDURE", "PUBLIC", "REFERENCES", "RETURNS", "REVOKE", "RIGHT", "ROLE",
    "ROLLBACK", "SECOND", "SELECT", "SET", "SMALLINT", "SOME", "SUM", "SUSPEND", "TABLE", "THEN",
    "TIME", "TIMESTAMP", "TO", "TRIGGER", "UNION", "UNIQUE", "UPDATE", "UPPER", "USER", "USING",
    "VALUE", "VALUES", "VARCHAR", "VARIABLE", "VARYING", "VIEW", "WHEN", "WHERE", "WHILE", "WITH",
    "WORK", "YEAR",
];

/// Strip the trailing padding of a fixed-width catalog text field
pub fn trim_catalog(text: &str) -> &str {
    text.trim_end_matches(' ')
}

/// Check whether a word is reserved (case-insensitive)
pub fn is_reserved_word(word: &str) -> bool {
    let upper = word.to_ascii_uppercase();
    RESERVED_WORDS.binary_search(&upper.as_str()).is_ok()
}

/// Check whether a raw catalog name has to be quoted in generated SQL
pub fn needs_quoting(raw: &str) -> bool {
    let mut chars = raw.chars();
    match chars.next() {
        Some(first) if first.is_ascii_uppercase() => {}
        _ => return true,
    }
    if chars.any(|c| !(c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_' || c == '$')) {
        return true;
    }
    is_reserved_word(raw)
}

/// Quote a raw name if needed, doubling embedded quotes
pub fn quote(raw: &str) -> String {
    if needs_quoting(raw) {
        format!("\"{}\"", raw.replace('"', "\"\""))
    } else {
        raw.to_string()
    }
}

/// The name of a metadata object, stored in its catalog form
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Identifier {
    raw: String,
}

impl Identifier {
    /// Create an identifier from a catalog name, dropping its padding
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self {
            raw: trim_catalog(raw.as_ref()).to_string(),
        }
    }

    /// Create an identifier from text typed by a user.
    ///
    /// Unquoted names fold to upper case; quoted names keep their case and
    /// have doubled quotes collapsed.
    pub fn from_user_input(text: &str) -> Self {
        let text = text.trim();
        let raw = if text.len() >= 2 && text.starts_with('"') && text.ends_with('"') {
            text[1..text.len() - 1].replace("\"\"", "\"")
        } else {
            text.to_uppercase()
        };
        Self { raw }
    }

    /// The name as stored in the catalog
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// The name as it must appear in SQL text
    pub fn quoted(&self) -> String {
        quote(&self.raw)
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// Whether this name belongs to a system object
    pub fn is_system(&self) -> bool {
        self.raw.starts_with("RDB$") || self.raw.starts_with("MON$")
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl From<&str> for Identifier {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Identifier {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}
