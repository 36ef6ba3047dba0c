//! Ember Metadata - Lazily loaded model of server catalog objects
//!
//! This crate provides:
//! - `MetadataLoader`, the statement cache and shared read transaction all
//!   catalog queries go through
//! - `MetadataItem`, facets and observer notification
//! - Tables, views, procedures and their constraints, indices and parameters
//! - `Database` and `Server`, including service credential resolution
//! - A visitor over the item graph

mod column;
mod constraints;
mod database;
mod datatype;
mod dependency;
mod index;
mod item;
mod loader;
mod procedure;
mod relation;
mod server;
pub mod service;
mod subject;
mod table;
mod view;
pub mod visitor;

pub use column::Column;
pub use constraints::{
    CheckConstraint, ForeignKey, ForeignKeyAction, PrimaryKeyConstraint, UniqueConstraint,
    quoted_column_list,
};
pub use database::Database;
pub use datatype::FieldType;
pub use dependency::Dependency;
pub use index::{Index, IndexDirection};
pub use item::{Facet, FacetKind, ItemKind, MetadataItem};
pub use loader::{LockedStatement, MetadataLoader, MetadataLoaderTransaction, StatementHandle};
pub use procedure::{Parameter, ParameterDirection, Privilege, Procedure};
pub use relation::Relation;
pub use server::Server;
pub use service::{ProgressIndicator, ServiceConnector, ServiceSession, User};
pub use subject::{Observer, Subject, SubjectLocker};
pub use table::Table;
pub use view::View;
pub use visitor::{MetadataItemVisitor, MetadataNode, TypeNameCollector, walk};
