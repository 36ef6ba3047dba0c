//! Ember History - recently executed statements
//!
//! Each database (or database name, or the whole application, depending on
//! the configured granularity) keeps a bounded [`StatementHistory`]. The
//! [`HistoryRegistry`] hands out the right one and persists them to the
//! configuration store.

mod history;
mod registry;
mod scope;

pub use history::StatementHistory;
pub use registry::{HistoryRegistry, init_global, shutdown_global, with_global};
pub use scope::HistoryScope;
