//! Ember Core - Core abstractions for the metadata catalog engine
//!
//! This crate provides the fundamental traits and types that all other
//! Ember crates depend on. It defines:
//!
//! - `CatalogConnection` - Trait for a live connection to the system catalog
//! - `CatalogStatement` - Trait for a prepared catalog query
//! - `Identifier` - Object name normalization and quoting
//! - `EmberError` - The error taxonomy shared by every loader
//! - Common types like `Value`

mod catalog;
mod error;
pub mod identifier;
pub mod logging;
mod types;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use catalog::*;
pub use error::*;
pub use identifier::Identifier;
pub use types::*;
