//! Column-bearing base shared by tables and views

use ember_core::Result;
use std::sync::Arc;

use crate::column::{Column, blob_text, columns_sql};
use crate::item::{Facet, FacetKind, MetadataItem, load_facet};
use crate::loader::MetadataLoader;
use crate::visitor::MetadataNode;

const DESCRIPTION_SQL: &str =
    "select rdb$description from rdb$relations where rdb$relation_name = ?";

#[derive(Debug)]
pub struct Relation {
    item: MetadataItem,
    columns: Facet<Vec<Column>>,
    description: Facet<Option<String>>,
}

impl Relation {
    pub(crate) fn new(item: MetadataItem) -> Self {
        Self {
            item,
            columns: Facet::Unloaded,
            description: Facet::Unloaded,
        }
    }

    pub fn item(&self) -> &MetadataItem {
        &self.item
    }

    pub(crate) fn set_loader(&mut self, loader: Option<Arc<MetadataLoader>>) {
        self.item.set_loader(loader);
    }

    /// Load the columns in field position order. Owners go through their
    /// own `load_columns` so dependent facets are dropped first.
    pub(crate) fn load_columns(&mut self) -> Result<()> {
        let item = &self.item;
        load_facet(item, &mut self.columns, FacetKind::Columns, |loader| {
            let handle = loader.get_statement(&columns_sql())?;
            let mut st = handle.lock();
            st.bind(1, item.name().raw())?;
            st.execute()?;
            let mut columns = Vec::new();
            while st.fetch()? {
                columns.push(Column::from_row(&st, item.id(), loader)?);
            }
            tracing::debug!(relation = %item.name(), count = columns.len(), "loaded columns");
            Ok(columns)
        })
    }

    pub fn columns_loaded(&self) -> bool {
        self.columns.is_loaded()
    }

    /// Columns, loading them first. Empty when the load fails.
    pub(crate) fn columns(&mut self) -> &[Column] {
        // failures are logged and kept as the last error
        let _ = self.load_columns();
        self.loaded_columns()
    }

    /// Columns if already loaded, without touching the catalog
    pub fn loaded_columns(&self) -> &[Column] {
        self.columns.get().map(Vec::as_slice).unwrap_or_default()
    }

    pub(crate) fn load_description(&mut self) -> Result<()> {
        let item = &self.item;
        load_facet(item, &mut self.description, FacetKind::Description, |loader| {
            let handle = loader.get_statement(DESCRIPTION_SQL)?;
            let mut st = handle.lock();
            st.bind(1, item.name().raw())?;
            st.execute()?;
            if st.fetch()? {
                blob_text(&st, 1)
            } else {
                Ok(None)
            }
        })
    }

    pub(crate) fn description(&mut self) -> Option<&str> {
        let _ = self.load_description();
        self.description.get().and_then(|d| d.as_deref())
    }

    /// Drop a relation-level facet. Returns whether anything loaded was dropped.
    pub(crate) fn invalidate_facet(&mut self, facet: Option<FacetKind>) -> bool {
        match facet {
            None => {
                let columns = self.columns.invalidate();
                self.description.invalidate() | columns
            }
            Some(FacetKind::Columns) => self.columns.invalidate(),
            Some(FacetKind::Description) => self.description.invalidate(),
            Some(_) => false,
        }
    }

    pub(crate) fn push_children<'a>(&'a self, out: &mut Vec<&'a dyn MetadataNode>) -> bool {
        let columns = self.loaded_columns();
        out.extend(columns.iter().map(|c| c as &dyn MetadataNode));
        !columns.is_empty()
    }
}
