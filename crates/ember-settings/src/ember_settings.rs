//! Configuration storage for Ember
//!
//! The metadata engine reads its tunables (statement history limits and
//! scope) from a flat key/value store. Hosts can plug in their own
//! [`ConfigStore`]; [`FileConfigStore`] keeps the values in a JSON file and
//! [`MemoryConfigStore`] is used by tests and embedders without persistence.

mod history_settings;
pub mod keys;
pub mod settings_file;
mod store;

pub use history_settings::{HistoryGranularity, HistorySettings};
pub use store::{ConfigStore, FileConfigStore, MemoryConfigStore};
