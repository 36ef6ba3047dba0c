//! Table constraint value objects

use ember_core::identifier;
use serde::{Deserialize, Serialize};

/// Referential action of a foreign key
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ForeignKeyAction {
    #[default]
    Restrict,
    NoAction,
    Cascade,
    SetNull,
    SetDefault,
}

impl ForeignKeyAction {
    /// Decode an `rdb$update_rule`/`rdb$delete_rule` value
    pub fn from_rule(rule: &str) -> Self {
        match rule.trim().to_ascii_uppercase().as_str() {
            "NO ACTION" => Self::NoAction,
            "CASCADE" => Self::Cascade,
            "SET NULL" => Self::SetNull,
            "SET DEFAULT" => Self::SetDefault,
            _ => Self::Restrict,
        }
    }

    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Restrict => "RESTRICT",
            Self::NoAction => "NO ACTION",
            Self::Cascade => "CASCADE",
            Self::SetNull => "SET NULL",
            Self::SetDefault => "SET DEFAULT",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrimaryKeyConstraint {
    pub name: String,
    /// Key columns in segment order
    pub columns: Vec<String>,
    /// Index backing the constraint
    pub index_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKey {
    pub name: String,
    /// Name of the table that owns the key
    pub table: String,
    pub columns: Vec<String>,
    pub referenced_table: String,
    pub referenced_columns: Vec<String>,
    pub update_action: ForeignKeyAction,
    pub delete_action: ForeignKeyAction,
    pub index_name: String,
}

impl ForeignKey {
    /// Join condition between the owning and the referenced table,
    /// e.g. `ORDERS.CUSTOMER_ID = CUSTOMER.ID`
    pub fn join_condition(&self) -> String {
        let table = identifier::quote(&self.table);
        let referenced = identifier::quote(&self.referenced_table);
        self.columns
            .iter()
            .zip(&self.referenced_columns)
            .map(|(column, other)| {
                format!(
                    "{}.{} = {}.{}",
                    table,
                    identifier::quote(column),
                    referenced,
                    identifier::quote(other)
                )
            })
            .collect::<Vec<_>>()
            .join(" AND ")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UniqueConstraint {
    pub name: String,
    pub columns: Vec<String>,
    pub index_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckConstraint {
    pub name: String,
    /// Source of the check trigger, e.g. `CHECK (QTY > 0)`
    pub source: String,
}

/// Comma separated list of quoted column names
pub fn quoted_column_list(columns: &[String]) -> String {
    columns
        .iter()
        .map(|c| identifier::quote(c))
        .collect::<Vec<_>>()
        .join(", ")
}
