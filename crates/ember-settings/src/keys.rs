//! Configuration keys read by the engine

pub const STATEMENT_HISTORY_GRANULARITY: &str = "statementHistoryGranularity";
pub const LIMIT_HISTORY_ITEM_SIZE: &str = "limitHistoryItemSize";
/// Maximum statement length in KiB
pub const STATEMENT_HISTORY_ITEM_SIZE: &str = "statementHistoryItemSize";
pub const LIMIT_HISTORY_SIZE: &str = "limitHistorySize";
pub const STATEMENT_HISTORY_SIZE: &str = "statementHistorySize";

/// Key of one persisted history entry
pub fn history_item(storage_name: &str, index: usize) -> String {
    format!("HISTORY_{}_ITEM_{}", storage_name, index)
}

/// Common prefix of every entry of one history scope
pub fn history_prefix(storage_name: &str) -> String {
    format!("HISTORY_{}_ITEM_", storage_name)
}
