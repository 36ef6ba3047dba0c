//! A database registered on a server, and the objects loaded from it

use ember_core::{CatalogConnection, EmberError, Identifier, Result};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

use crate::constraints::ForeignKey;
use crate::dependency::{Dependency, load_dependencies};
use crate::item::{FacetKind, ItemKind, MetadataItem};
use crate::loader::MetadataLoader;
use crate::procedure::Procedure;
use crate::subject::SubjectLocker;
use crate::table::Table;
use crate::view::View;
use crate::visitor::{MetadataItemVisitor, MetadataNode};

const RELATIONS_SQL: &str = "select rdb$relation_name, rdb$view_blr from rdb$relations \
     where rdb$system_flag = 0 or rdb$system_flag is null \
     order by rdb$relation_name";

const PROCEDURES_SQL: &str = "select rdb$procedure_name from rdb$procedures \
     where rdb$system_flag = 0 or rdb$system_flag is null \
     order by rdb$procedure_name";

pub struct Database {
    item: MetadataItem,
    path: String,
    username: String,
    password: String,
    role: String,
    charset: String,
    connection: Option<Arc<dyn CatalogConnection>>,
    tables: Vec<Table>,
    views: Vec<View>,
    procedures: Vec<Procedure>,
}

impl Database {
    pub fn new(name: impl Into<Identifier>, path: impl Into<String>) -> Self {
        Self {
            item: MetadataItem::new(ItemKind::Database, name),
            path: path.into(),
            username: String::new(),
            password: String::new(),
            role: String::new(),
            charset: String::new(),
            connection: None,
            tables: Vec::new(),
            views: Vec::new(),
            procedures: Vec::new(),
        }
    }

    /// Keep the id a registration was saved with
    pub fn with_id(mut self, id: Uuid) -> Self {
        self.item = self.item.with_id(id);
        self
    }

    /// Stored login used when the database is not connected
    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = username.into();
        self.password = password.into();
        self
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = role.into();
        self
    }

    pub fn with_charset(mut self, charset: impl Into<String>) -> Self {
        self.charset = charset.into();
        self
    }

    pub fn id(&self) -> Uuid {
        self.item.id()
    }

    pub fn name(&self) -> &Identifier {
        self.item.name()
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    pub fn role(&self) -> &str {
        &self.role
    }

    pub fn charset(&self) -> &str {
        &self.charset
    }

    pub fn set_credentials(&mut self, username: impl Into<String>, password: impl Into<String>) {
        self.username = username.into();
        self.password = password.into();
        self.item.notify_observers();
    }

    pub(crate) fn set_server(&mut self, server: Option<Uuid>) {
        self.item.set_parent(server);
    }

    /// Attach a live catalog connection. Objects loaded over an earlier
    /// connection are dropped; objects added while disconnected are kept
    /// and load through the new connection.
    pub fn connect(&mut self, connection: Arc<dyn CatalogConnection>) {
        if self.connection.is_some() {
            self.disconnect();
        }
        let loader = Arc::new(MetadataLoader::new(Arc::clone(&connection)));
        tracing::info!(database = %self.name(), user = connection.username(), "database connected");
        for table in &mut self.tables {
            table.set_loader(Some(Arc::clone(&loader)));
        }
        for view in &mut self.views {
            view.set_loader(Some(Arc::clone(&loader)));
        }
        for procedure in &mut self.procedures {
            procedure.set_loader(Some(Arc::clone(&loader)));
        }
        self.item.set_loader(Some(loader));
        self.connection = Some(connection);
        self.item.notify_observers();
    }

    pub fn disconnect(&mut self) {
        if let Some(loader) = self.item.loader() {
            loader.clear_statements();
        }
        self.item.set_loader(None);
        self.connection = None;
        self.tables.clear();
        self.views.clear();
        self.procedures.clear();
        tracing::info!(database = %self.name(), "database disconnected");
        self.item.notify_observers();
    }

    pub fn is_connected(&self) -> bool {
        self.connection.as_ref().is_some_and(|c| c.is_connected())
    }

    /// Login of the live connection
    pub fn connected_username(&self) -> Option<&str> {
        self.connection.as_deref().map(|c| c.username())
    }

    pub fn connected_password(&self) -> Option<&str> {
        self.connection.as_deref().map(|c| c.password())
    }

    pub fn loader(&self) -> Option<&Arc<MetadataLoader>> {
        self.item.loader()
    }

    fn live_loader(&self) -> Result<Arc<MetadataLoader>> {
        self.item
            .loader()
            .cloned()
            .ok_or_else(|| EmberError::Connection(format!("{}: not connected", self.name())))
    }

    /// Read the names of the user tables, views and procedures, replacing
    /// any objects created before.
    pub fn load_objects(&mut self) -> Result<()> {
        let loader = self.live_loader()?;
        let _transaction = loader.transaction()?;
        let _locker = SubjectLocker::new(self.item.subject());

        let mut relations = Vec::new();
        {
            let handle = loader.get_statement(RELATIONS_SQL)?;
            let mut st = handle.lock();
            st.execute()?;
            while st.fetch()? {
                relations.push((st.get_trimmed(1)?, st.is_null(2)?));
            }
        }
        let mut procedures = Vec::new();
        {
            let handle = loader.get_statement(PROCEDURES_SQL)?;
            let mut st = handle.lock();
            st.execute()?;
            while st.fetch()? {
                procedures.push(st.get_trimmed(1)?);
            }
        }

        let id = self.id();
        self.tables.clear();
        self.views.clear();
        for (name, is_table) in relations {
            if is_table {
                self.tables.push(Table::in_database(name, id, Some(Arc::clone(&loader))));
            } else {
                self.views.push(View::in_database(name, id, Some(Arc::clone(&loader))));
            }
        }
        self.procedures = procedures
            .into_iter()
            .map(|name| Procedure::in_database(name, id, Some(Arc::clone(&loader))))
            .collect();

        tracing::debug!(
            database = %self.name(),
            tables = self.tables.len(),
            views = self.views.len(),
            procedures = self.procedures.len(),
            "loaded database objects"
        );
        self.item.notify_observers();
        Ok(())
    }

    pub fn add_table(&mut self, name: impl Into<Identifier>) -> &mut Table {
        let table = Table::in_database(name, self.id(), self.item.loader().cloned());
        self.tables.push(table);
        self.item.notify_observers();
        let last = self.tables.len() - 1;
        &mut self.tables[last]
    }

    pub fn add_view(&mut self, name: impl Into<Identifier>) -> &mut View {
        let view = View::in_database(name, self.id(), self.item.loader().cloned());
        self.views.push(view);
        self.item.notify_observers();
        let last = self.views.len() - 1;
        &mut self.views[last]
    }

    pub fn add_procedure(&mut self, name: impl Into<Identifier>) -> &mut Procedure {
        let procedure = Procedure::in_database(name, self.id(), self.item.loader().cloned());
        self.procedures.push(procedure);
        self.item.notify_observers();
        let last = self.procedures.len() - 1;
        &mut self.procedures[last]
    }

    pub fn tables(&self) -> &[Table] {
        &self.tables
    }

    pub fn tables_mut(&mut self) -> &mut [Table] {
        &mut self.tables
    }

    pub fn views(&self) -> &[View] {
        &self.views
    }

    pub fn views_mut(&mut self) -> &mut [View] {
        &mut self.views
    }

    pub fn procedures(&self) -> &[Procedure] {
        &self.procedures
    }

    pub fn procedures_mut(&mut self) -> &mut [Procedure] {
        &mut self.procedures
    }

    pub fn find_table_mut(&mut self, name: &str) -> Option<&mut Table> {
        self.tables.iter_mut().find(|t| t.name().raw() == name)
    }

    pub fn find_view_mut(&mut self, name: &str) -> Option<&mut View> {
        self.views.iter_mut().find(|v| v.name().raw() == name)
    }

    pub fn find_procedure_mut(&mut self, name: &str) -> Option<&mut Procedure> {
        self.procedures.iter_mut().find(|p| p.name().raw() == name)
    }

    /// Objects `name` depends on (`of_object`), or the objects depending on it
    pub fn get_dependencies(&self, name: &str, kind: ItemKind, of_object: bool) -> Result<Vec<Dependency>> {
        let loader = self.live_loader()?;
        load_dependencies(&loader, name, kind, of_object)
    }

    /// Foreign keys linking `table` with any of `tables`, in both directions:
    /// keys of `table` referencing one of them, then for every listed table
    /// that depends on `table`, its first key referencing `table`.
    pub fn tables_relate(&mut self, tables: &[String], table: &str) -> Result<Vec<ForeignKey>> {
        let loader = self.live_loader()?;
        let _transaction = loader.transaction()?;

        let target = self
            .find_table_mut(table)
            .ok_or_else(|| EmberError::NotFound(format!("TABLE {}", table)))?;
        target.load_foreign_keys()?;
        let mut related: Vec<ForeignKey> = target
            .foreign_keys()
            .iter()
            .filter(|fk| tables.contains(&fk.referenced_table))
            .cloned()
            .collect();

        for dependency in load_dependencies(&loader, table, ItemKind::Table, false)? {
            if dependency.kind != ItemKind::Table || !tables.contains(&dependency.name) {
                continue;
            }
            let Some(other) = self.find_table_mut(&dependency.name) else {
                continue;
            };
            other.load_foreign_keys()?;
            if let Some(fk) = other.foreign_keys().iter().find(|fk| fk.referenced_table == table) {
                related.push(fk.clone());
            }
        }
        Ok(related)
    }
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("item", &self.item)
            .field("path", &self.path)
            .field("username", &self.username)
            .field("connected", &self.is_connected())
            .field("tables", &self.tables.len())
            .field("views", &self.views.len())
            .field("procedures", &self.procedures.len())
            .finish()
    }
}

impl MetadataNode for Database {
    fn item(&self) -> &MetadataItem {
        &self.item
    }

    fn accept_visitor(&self, visitor: &mut dyn MetadataItemVisitor) {
        visitor.visit_database(self);
    }

    fn get_children<'a>(&'a self, out: &mut Vec<&'a dyn MetadataNode>) -> bool {
        let before = out.len();
        out.extend(self.tables.iter().map(|t| t as &dyn MetadataNode));
        out.extend(self.views.iter().map(|v| v as &dyn MetadataNode));
        out.extend(self.procedures.iter().map(|p| p as &dyn MetadataNode));
        out.len() > before
    }

    fn invalidate(&mut self, facet: Option<FacetKind>) {
        let _locker = SubjectLocker::new(self.item.subject());
        for table in &mut self.tables {
            table.invalidate(facet);
        }
        for view in &mut self.views {
            view.invalidate(facet);
        }
        for procedure in &mut self.procedures {
            procedure.invalidate(facet);
        }
    }
}
