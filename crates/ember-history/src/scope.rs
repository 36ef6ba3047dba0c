use ember_metadata::Database;
use ember_settings::HistoryGranularity;
use uuid::Uuid;

/// Which history a statement belongs to
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HistoryScope {
    Global,
    DatabaseName(String),
    Database(Uuid),
}

impl HistoryScope {
    pub fn for_database(granularity: HistoryGranularity, database: &Database) -> Self {
        match granularity {
            HistoryGranularity::Global => HistoryScope::Global,
            HistoryGranularity::PerDatabaseName => {
                HistoryScope::DatabaseName(database.name().raw().to_string())
            }
            HistoryGranularity::PerDatabase => HistoryScope::Database(database.id()),
        }
    }

    /// Scope part of the configuration keys
    pub fn storage_name(&self) -> String {
        match self {
            HistoryScope::Global => String::new(),
            HistoryScope::DatabaseName(name) => format!("DATABASENAME{}", name),
            HistoryScope::Database(id) => format!("DATABASE{}", id),
        }
    }
}
