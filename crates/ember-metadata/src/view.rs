use ember_core::{Identifier, Result};
use std::sync::Arc;
use uuid::Uuid;

use crate::column::Column;
use crate::item::{Facet, FacetKind, ItemKind, MetadataItem, load_facet};
use crate::loader::MetadataLoader;
use crate::relation::Relation;
use crate::visitor::{MetadataItemVisitor, MetadataNode};

const SOURCE_SQL: &str = "select rdb$view_source from rdb$relations where rdb$relation_name = ?";

#[derive(Debug)]
pub struct View {
    relation: Relation,
    source: Facet<String>,
}

impl View {
    pub fn new(name: impl Into<Identifier>) -> Self {
        Self::from_item(MetadataItem::new(ItemKind::View, name))
    }

    pub(crate) fn in_database(
        name: impl Into<Identifier>,
        database: Uuid,
        loader: Option<Arc<MetadataLoader>>,
    ) -> Self {
        Self::from_item(MetadataItem::new(ItemKind::View, name).with_context(database, loader))
    }

    fn from_item(item: MetadataItem) -> Self {
        Self {
            relation: Relation::new(item),
            source: Facet::Unloaded,
        }
    }

    pub fn name(&self) -> &Identifier {
        self.relation.item().name()
    }

    pub fn relation(&self) -> &Relation {
        &self.relation
    }

    pub(crate) fn set_loader(&mut self, loader: Option<Arc<MetadataLoader>>) {
        self.relation.set_loader(loader);
    }

    pub fn load_columns(&mut self) -> Result<()> {
        self.relation.load_columns()
    }

    pub fn columns(&mut self) -> &[Column] {
        self.relation.columns()
    }

    pub fn load_description(&mut self) -> Result<()> {
        self.relation.load_description()
    }

    pub fn description(&mut self) -> Option<&str> {
        self.relation.description()
    }

    pub fn load_source(&mut self) -> Result<()> {
        let item = self.relation.item();
        load_facet(item, &mut self.source, FacetKind::Source, |loader| {
            let handle = loader.get_statement(SOURCE_SQL)?;
            let mut st = handle.lock();
            st.bind(1, item.name().raw())?;
            st.execute()?;
            if st.fetch()? {
                Ok(st.read_blob(1)?.trim().to_string())
            } else {
                Ok(String::new())
            }
        })
    }

    /// The `SELECT` the view is defined by; empty when it cannot be loaded
    pub fn source(&mut self) -> &str {
        let _ = self.load_source();
        self.source.get().map(String::as_str).unwrap_or_default()
    }

    /// `CREATE VIEW` statement recreating the view
    pub fn create_sql(&mut self) -> Result<String> {
        self.relation.load_columns()?;
        self.load_source()?;
        let columns: Vec<String> = self
            .relation
            .loaded_columns()
            .iter()
            .map(Column::quoted_name)
            .collect();
        Ok(format!(
            "CREATE VIEW {} ({})\nAS {};\n",
            self.relation.item().quoted_name(),
            columns.join(", "),
            self.source.get().map(String::as_str).unwrap_or_default()
        ))
    }

    pub fn create_sql_template() -> &'static str {
        "CREATE VIEW name ( view_column, ...)\nAS\n/* write select statement here */\nWITH CHECK OPTION;\n"
    }
}

impl MetadataNode for View {
    fn item(&self) -> &MetadataItem {
        self.relation.item()
    }

    fn accept_visitor(&self, visitor: &mut dyn MetadataItemVisitor) {
        visitor.visit_view(self);
    }

    fn get_children<'a>(&'a self, out: &mut Vec<&'a dyn MetadataNode>) -> bool {
        self.relation.push_children(out)
    }

    fn invalidate(&mut self, facet: Option<FacetKind>) {
        let changed = match facet {
            None => self.source.invalidate() | self.relation.invalidate_facet(None),
            Some(FacetKind::Source) => self.source.invalidate(),
            other => self.relation.invalidate_facet(other),
        };
        if changed {
            self.relation.item().notify_observers();
        }
    }
}
