//! Typed statement-history settings

use serde::{Deserialize, Serialize};

use crate::{ConfigStore, keys};

/// Which history instance a database uses
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HistoryGranularity {
    /// One history shared by every database
    Global,
    /// One history per database name
    PerDatabaseName,
    /// One history per registered database
    #[default]
    PerDatabase,
}

impl HistoryGranularity {
    /// Decode the stored integer code. Unknown codes select the default.
    pub fn from_code(code: i64) -> Self {
        match code {
            0 => Self::Global,
            1 => Self::PerDatabaseName,
            _ => Self::PerDatabase,
        }
    }

    pub fn code(self) -> i64 {
        match self {
            Self::Global => 0,
            Self::PerDatabaseName => 1,
            Self::PerDatabase => 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistorySettings {
    pub granularity: HistoryGranularity,
    pub limit_item_size: bool,
    /// Maximum statement length in KiB
    pub item_size_kib: i64,
    pub limit_history_size: bool,
    /// Maximum number of entries, negative for unlimited
    pub history_size: i64,
}

impl Default for HistorySettings {
    fn default() -> Self {
        Self {
            granularity: HistoryGranularity::PerDatabase,
            limit_item_size: true,
            item_size_kib: 10,
            limit_history_size: false,
            history_size: 50,
        }
    }
}

impl HistorySettings {
    pub fn from_store(store: &dyn ConfigStore) -> Self {
        let defaults = Self::default();
        Self {
            granularity: HistoryGranularity::from_code(store.get_int(
                keys::STATEMENT_HISTORY_GRANULARITY,
                defaults.granularity.code(),
            )),
            limit_item_size: store.get_bool(keys::LIMIT_HISTORY_ITEM_SIZE, defaults.limit_item_size),
            item_size_kib: store.get_int(keys::STATEMENT_HISTORY_ITEM_SIZE, defaults.item_size_kib),
            limit_history_size: store
                .get_bool(keys::LIMIT_HISTORY_SIZE, defaults.limit_history_size),
            history_size: store.get_int(keys::STATEMENT_HISTORY_SIZE, defaults.history_size),
        }
    }

    pub fn write_to(&self, store: &dyn ConfigStore) {
        store.set_int(keys::STATEMENT_HISTORY_GRANULARITY, self.granularity.code());
        store.set_bool(keys::LIMIT_HISTORY_ITEM_SIZE, self.limit_item_size);
        store.set_int(keys::STATEMENT_HISTORY_ITEM_SIZE, self.item_size_kib);
        store.set_bool(keys::LIMIT_HISTORY_SIZE, self.limit_history_size);
        store.set_int(keys::STATEMENT_HISTORY_SIZE, self.history_size);
    }

    /// Whether a statement of `len` characters may be stored
    pub fn accepts_item(&self, len: usize) -> bool {
        if !self.limit_item_size {
            return true;
        }
        let limit = usize::try_from(self.item_size_kib.max(0))
            .unwrap_or(usize::MAX)
            .saturating_mul(1024);
        len < limit
    }

    /// Entry count limit, `None` when unlimited
    pub fn max_items(&self) -> Option<usize> {
        if self.limit_history_size && self.history_size >= 0 {
            Some(self.history_size as usize)
        } else {
            None
        }
    }
}
