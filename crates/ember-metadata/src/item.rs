//! Base entity shared by every metadata object

use ember_core::{EmberError, Identifier, Result};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

use crate::loader::MetadataLoader;
use crate::subject::{Observer, Subject, SubjectLocker};

/// Kind tag of a metadata item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemKind {
    Server,
    Database,
    Table,
    View,
    Procedure,
    Column,
    Parameter,
    Index,
    PrimaryKey,
    ForeignKey,
    Unique,
    Check,
    Trigger,
    Domain,
    Generator,
    Function,
    User,
}

impl ItemKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            ItemKind::Server => "SERVER",
            ItemKind::Database => "DATABASE",
            ItemKind::Table => "TABLE",
            ItemKind::View => "VIEW",
            ItemKind::Procedure => "PROCEDURE",
            ItemKind::Column => "COLUMN",
            ItemKind::Parameter => "PARAMETER",
            ItemKind::Index => "INDEX",
            ItemKind::PrimaryKey => "PRIMARY KEY",
            ItemKind::ForeignKey => "FOREIGN KEY",
            ItemKind::Unique => "UNIQUE",
            ItemKind::Check => "CHECK",
            ItemKind::Trigger => "TRIGGER",
            ItemKind::Domain => "DOMAIN",
            ItemKind::Generator => "GENERATOR",
            ItemKind::Function => "FUNCTION",
            ItemKind::User => "USER",
        }
    }

    /// Decode the object type code used by `rdb$dependencies`
    pub fn from_object_type(code: i64) -> Option<Self> {
        match code {
            0 => Some(ItemKind::Table),
            1 => Some(ItemKind::View),
            2 => Some(ItemKind::Trigger),
            5 => Some(ItemKind::Procedure),
            9 => Some(ItemKind::Domain),
            14 => Some(ItemKind::Generator),
            15 => Some(ItemKind::Function),
            _ => None,
        }
    }

    /// Object type code used by `rdb$dependencies`, for the kinds that have one
    pub fn object_type(&self) -> Option<i64> {
        match self {
            ItemKind::Table => Some(0),
            ItemKind::View => Some(1),
            ItemKind::Trigger => Some(2),
            ItemKind::Procedure => Some(5),
            ItemKind::Domain => Some(9),
            ItemKind::Generator => Some(14),
            ItemKind::Function => Some(15),
            _ => None,
        }
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

/// Independently loadable aspects of metadata items
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FacetKind {
    Columns,
    PrimaryKey,
    ForeignKeys,
    CheckConstraints,
    UniqueConstraints,
    Indices,
    ExternalPath,
    Source,
    Parameters,
    Privileges,
    Description,
}

/// Load state of one facet. The cached value is only valid when loaded.
#[derive(Debug, Clone, Default)]
pub enum Facet<T> {
    #[default]
    Unloaded,
    Loading,
    Loaded(T),
}

impl<T> Facet<T> {
    pub fn is_loaded(&self) -> bool {
        matches!(self, Facet::Loaded(_))
    }

    pub fn get(&self) -> Option<&T> {
        match self {
            Facet::Loaded(value) => Some(value),
            _ => None,
        }
    }

    pub fn get_mut(&mut self) -> Option<&mut T> {
        match self {
            Facet::Loaded(value) => Some(value),
            _ => None,
        }
    }

    /// Drop the cached value. Returns whether anything was loaded.
    pub fn invalidate(&mut self) -> bool {
        let was_loaded = self.is_loaded();
        *self = Facet::Unloaded;
        was_loaded
    }
}

/// Identity, context and notification state common to all items
pub struct MetadataItem {
    id: Uuid,
    name: Identifier,
    kind: ItemKind,
    parent: Option<Uuid>,
    loader: Option<Arc<MetadataLoader>>,
    last_error: Mutex<Option<String>>,
    subject: Subject,
}

impl MetadataItem {
    pub fn new(kind: ItemKind, name: impl Into<Identifier>) -> Self {
        let id = Uuid::new_v4();
        Self {
            id,
            name: name.into(),
            kind,
            parent: None,
            loader: None,
            last_error: Mutex::new(None),
            subject: Subject::new(id),
        }
    }

    /// Replace the generated id with a persisted one. Observers attached
    /// before the call are dropped.
    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = id;
        self.subject = Subject::new(id);
        self
    }

    /// Attach the item to its parent and the loader of its database
    pub fn with_context(mut self, parent: Uuid, loader: Option<Arc<MetadataLoader>>) -> Self {
        self.parent = Some(parent);
        self.loader = loader;
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &Identifier {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<Identifier>) {
        self.name = name.into();
        self.notify_observers();
    }

    /// Name as it appears in SQL text
    pub fn quoted_name(&self) -> String {
        self.name.quoted()
    }

    pub fn kind(&self) -> ItemKind {
        self.kind
    }

    pub fn type_name(&self) -> &'static str {
        self.kind.type_name()
    }

    pub fn parent(&self) -> Option<Uuid> {
        self.parent
    }

    pub fn loader(&self) -> Option<&Arc<MetadataLoader>> {
        self.loader.as_ref()
    }

    pub(crate) fn set_parent(&mut self, parent: Option<Uuid>) {
        self.parent = parent;
    }

    pub(crate) fn set_loader(&mut self, loader: Option<Arc<MetadataLoader>>) {
        self.loader = loader;
    }

    /// The loader, or `MissingContext` when the item has no database
    pub fn require_loader(&self) -> Result<Arc<MetadataLoader>> {
        self.loader
            .clone()
            .ok_or_else(|| EmberError::MissingContext(format!("{} {}", self.kind, self.name)))
    }

    /// Message of the most recent failed load
    pub fn last_error(&self) -> Option<String> {
        self.last_error.lock().clone()
    }

    pub(crate) fn set_last_error(&self, message: impl Into<String>) {
        *self.last_error.lock() = Some(message.into());
    }

    pub fn subject(&self) -> &Subject {
        &self.subject
    }

    pub fn attach_observer(&self, observer: &Arc<dyn Observer>) {
        self.subject.attach(observer);
    }

    pub fn detach_observer(&self, observer: &Arc<dyn Observer>) {
        self.subject.detach(observer);
    }

    pub fn notify_observers(&self) {
        self.subject.notify();
    }

    /// Record a failed operation and hand the error back
    pub(crate) fn fail(&self, error: EmberError) -> EmberError {
        self.set_last_error(error.to_string());
        error
    }
}

impl fmt::Debug for MetadataItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetadataItem")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("parent", &self.parent)
            .finish()
    }
}

/// Load one facet of `item` unless it is already loaded.
///
/// The fetch runs inside the loader's transaction with the item's subject
/// locked, so observers see a single notification once the value is in
/// place. On failure the facet is left unloaded and the message is kept as
/// the item's last error.
pub(crate) fn load_facet<T>(
    item: &MetadataItem,
    facet: &mut Facet<T>,
    kind: FacetKind,
    fetch: impl FnOnce(&Arc<MetadataLoader>) -> Result<T>,
) -> Result<()> {
    if facet.is_loaded() {
        return Ok(());
    }
    *facet = Facet::Loading;

    let result = item
        .require_loader()
        .and_then(|loader| populate(item, facet, &loader, fetch));

    match result {
        Ok(()) => {
            tracing::debug!(item = %item.name(), kind = %item.kind(), facet = ?kind, "facet loaded");
            Ok(())
        }
        Err(e) => {
            *facet = Facet::Unloaded;
            tracing::warn!(item = %item.name(), facet = ?kind, error = %e, "facet load failed");
            Err(item.fail(e))
        }
    }
}

fn populate<T>(
    item: &MetadataItem,
    facet: &mut Facet<T>,
    loader: &Arc<MetadataLoader>,
    fetch: impl FnOnce(&Arc<MetadataLoader>) -> Result<T>,
) -> Result<()> {
    let _transaction = loader.transaction()?;
    let _locker = SubjectLocker::new(item.subject());
    *facet = Facet::Loaded(fetch(loader)?);
    item.notify_observers();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_core::CatalogConnection;
    use ember_core::testing::MockCatalog;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_type_names() {
        assert_eq!(ItemKind::PrimaryKey.type_name(), "PRIMARY KEY");
        assert_eq!(ItemKind::Procedure.to_string(), "PROCEDURE");
        assert_eq!(ItemKind::from_object_type(5), Some(ItemKind::Procedure));
        assert_eq!(ItemKind::from_object_type(42), None);
        assert_eq!(ItemKind::View.object_type(), Some(1));
    }

    #[test]
    fn test_facet_invalidate_reports_loaded_state() {
        let mut facet = Facet::Loaded(3);
        assert_eq!(facet.get(), Some(&3));
        assert!(facet.invalidate());
        assert!(!facet.invalidate());
        assert_eq!(facet.get(), None);
    }

    #[test]
    fn test_load_without_database_is_missing_context() {
        let item = MetadataItem::new(ItemKind::Table, "ORDERS");
        let mut facet: Facet<u32> = Facet::Unloaded;

        let err = load_facet(&item, &mut facet, FacetKind::Columns, |_| Ok(1)).unwrap_err();
        assert!(matches!(err, EmberError::MissingContext(_)));
        assert_eq!(
            item.last_error().as_deref(),
            Some("TABLE ORDERS: database not set")
        );
        assert!(!facet.is_loaded());
    }

    #[test]
    fn test_loaded_facet_is_not_fetched_again() {
        let mock = MockCatalog::new("EMPLOYEE");
        let loader = Arc::new(MetadataLoader::new(Arc::new(mock.clone())));
        let item = MetadataItem::new(ItemKind::Table, "ORDERS").with_context(Uuid::new_v4(), Some(loader));
        let mut facet = Facet::Unloaded;

        load_facet(&item, &mut facet, FacetKind::Columns, |_| Ok(7)).unwrap();
        load_facet(&item, &mut facet, FacetKind::Columns, |_| -> Result<i32> {
            panic!("must not reload")
        })
        .unwrap();

        assert_eq!(facet.get(), Some(&7));
        assert_eq!(mock.transactions_started(), 1);
        assert_eq!(mock.commits(), 1);
    }

    #[test]
    fn test_failed_fetch_reverts_to_unloaded() {
        let mock = MockCatalog::new("EMPLOYEE");
        let loader = Arc::new(MetadataLoader::new(Arc::new(mock.clone())));
        let item = MetadataItem::new(ItemKind::View, "V").with_context(Uuid::new_v4(), Some(loader));
        let mut facet: Facet<String> = Facet::Unloaded;

        let err = load_facet(&item, &mut facet, FacetKind::Source, |_| {
            Err(EmberError::Query("lock conflict".into()))
        })
        .unwrap_err();

        assert!(matches!(err, EmberError::Query(_)));
        assert!(matches!(facet, Facet::Unloaded));
        assert_eq!(item.last_error().as_deref(), Some("Query error: lock conflict"));
        assert!(!mock.in_transaction());
    }
}
