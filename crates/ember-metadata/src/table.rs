//! Tables and their constraint, index and storage facets

use ember_core::{Identifier, Result};
use std::sync::Arc;
use uuid::Uuid;

use crate::column::Column;
use crate::constraints::{
    CheckConstraint, ForeignKey, ForeignKeyAction, PrimaryKeyConstraint, UniqueConstraint,
};
use crate::index::{Index, IndexDirection};
use crate::item::{Facet, FacetKind, ItemKind, MetadataItem, load_facet};
use crate::loader::MetadataLoader;
use crate::relation::Relation;
use crate::visitor::{MetadataItemVisitor, MetadataNode};

const PRIMARY_KEY_SQL: &str = "select r.rdb$constraint_name, i.rdb$field_name, r.rdb$index_name \
     from rdb$relation_constraints r, rdb$index_segments i \
     where r.rdb$relation_name = ? and r.rdb$index_name = i.rdb$index_name \
     and (r.rdb$constraint_type = 'PRIMARY KEY') \
     order by r.rdb$constraint_name, i.rdb$field_position";

const UNIQUE_SQL: &str = "select r.rdb$constraint_name, i.rdb$field_name, r.rdb$index_name \
     from rdb$relation_constraints r, rdb$index_segments i \
     where r.rdb$relation_name = ? and r.rdb$index_name = i.rdb$index_name \
     and (r.rdb$constraint_type = 'UNIQUE') \
     order by r.rdb$constraint_name, i.rdb$field_position";

const FOREIGN_KEY_SQL: &str = "select r.rdb$constraint_name, i.rdb$field_name, c.rdb$update_rule, \
     c.rdb$delete_rule, c.rdb$const_name_uq, r.rdb$index_name \
     from rdb$relation_constraints r, rdb$index_segments i, rdb$ref_constraints c \
     where r.rdb$relation_name = ? and r.rdb$index_name = i.rdb$index_name \
     and r.rdb$constraint_name = c.rdb$constraint_name \
     and (r.rdb$constraint_type = 'FOREIGN KEY') \
     order by 1, i.rdb$field_position";

const REFERENCED_KEY_SQL: &str = "select r.rdb$relation_name, i.rdb$field_name \
     from rdb$relation_constraints r \
     join rdb$index_segments i on i.rdb$index_name = r.rdb$index_name \
     where r.rdb$constraint_name = ? \
     order by i.rdb$field_position";

const CHECK_SQL: &str = "select r.rdb$constraint_name, t.rdb$trigger_source \
     from rdb$relation_constraints r \
     join rdb$check_constraints c on r.rdb$constraint_name = c.rdb$constraint_name \
     and r.rdb$constraint_type = 'CHECK' \
     join rdb$triggers t on c.rdb$trigger_name = t.rdb$trigger_name and t.rdb$trigger_type = 1 \
     where r.rdb$relation_name = ?";

const INDICES_SQL: &str = "select i.rdb$index_name, i.rdb$unique_flag, i.rdb$index_inactive, \
     i.rdb$index_type, i.rdb$statistics, s.rdb$field_name, rc.rdb$constraint_name, \
     i.rdb$expression_source \
     from rdb$indices i \
     left join rdb$index_segments s on i.rdb$index_name = s.rdb$index_name \
     left join rdb$relation_constraints rc on rc.rdb$index_name = i.rdb$index_name \
     where i.rdb$relation_name = ? \
     order by i.rdb$index_name, s.rdb$field_position";

const EXTERNAL_FILE_SQL: &str =
    "select rdb$external_file from rdb$relations where rdb$relation_name = ?";

#[derive(Debug)]
pub struct Table {
    relation: Relation,
    primary_key: Facet<Option<PrimaryKeyConstraint>>,
    foreign_keys: Facet<Vec<ForeignKey>>,
    check_constraints: Facet<Vec<CheckConstraint>>,
    unique_constraints: Facet<Vec<UniqueConstraint>>,
    indices: Facet<Vec<Index>>,
    external_path: Facet<String>,
}

impl Table {
    /// A table not attached to any database
    pub fn new(name: impl Into<Identifier>) -> Self {
        Self::from_item(MetadataItem::new(ItemKind::Table, name))
    }

    pub(crate) fn in_database(
        name: impl Into<Identifier>,
        database: Uuid,
        loader: Option<Arc<MetadataLoader>>,
    ) -> Self {
        Self::from_item(MetadataItem::new(ItemKind::Table, name).with_context(database, loader))
    }

    fn from_item(item: MetadataItem) -> Self {
        Self {
            relation: Relation::new(item),
            primary_key: Facet::Unloaded,
            foreign_keys: Facet::Unloaded,
            check_constraints: Facet::Unloaded,
            unique_constraints: Facet::Unloaded,
            indices: Facet::Unloaded,
            external_path: Facet::Unloaded,
        }
    }

    pub fn name(&self) -> &Identifier {
        self.relation.item().name()
    }

    pub fn quoted_name(&self) -> String {
        self.relation.item().quoted_name()
    }

    pub fn relation(&self) -> &Relation {
        &self.relation
    }

    pub(crate) fn set_loader(&mut self, loader: Option<Arc<MetadataLoader>>) {
        self.relation.set_loader(loader);
    }

    /// Load the columns. An actual reload drops the cached keys,
    /// constraints and indices, which are fetched again on next access.
    pub fn load_columns(&mut self) -> Result<()> {
        if !self.relation.columns_loaded() {
            self.primary_key.invalidate();
            self.foreign_keys.invalidate();
            self.check_constraints.invalidate();
            self.unique_constraints.invalidate();
            self.indices.invalidate();
        }
        self.relation.load_columns()
    }

    pub fn columns(&mut self) -> &[Column] {
        let _ = self.load_columns();
        self.relation.loaded_columns()
    }

    pub fn find_column(&mut self, name: &str) -> Option<&Column> {
        self.columns().iter().find(|c| c.name().raw() == name)
    }

    pub fn load_description(&mut self) -> Result<()> {
        self.relation.load_description()
    }

    pub fn description(&mut self) -> Option<&str> {
        self.relation.description()
    }

    pub fn load_primary_key(&mut self) -> Result<()> {
        let item = self.relation.item();
        load_facet(item, &mut self.primary_key, FacetKind::PrimaryKey, |loader| {
            let handle = loader.get_statement(PRIMARY_KEY_SQL)?;
            let mut st = handle.lock();
            st.bind(1, item.name().raw())?;
            st.execute()?;
            let mut key: Option<PrimaryKeyConstraint> = None;
            while st.fetch()? {
                let pk = key.get_or_insert_with(PrimaryKeyConstraint::default);
                pk.name = st.get_trimmed(1)?;
                pk.columns.push(st.get_trimmed(2)?);
                pk.index_name = st.get_trimmed(3)?;
            }
            Ok(key)
        })
    }

    /// The primary key, or `None` when the table has none or it cannot
    /// be loaded
    pub fn primary_key(&mut self) -> Option<&PrimaryKeyConstraint> {
        let _ = self.load_primary_key();
        self.primary_key.get().and_then(Option::as_ref)
    }

    pub fn load_foreign_keys(&mut self) -> Result<()> {
        let item = self.relation.item();
        load_facet(item, &mut self.foreign_keys, FacetKind::ForeignKeys, |loader| {
            let table = item.name().raw();
            let rows = {
                let handle = loader.get_statement(FOREIGN_KEY_SQL)?;
                let mut st = handle.lock();
                st.bind(1, table)?;
                st.execute()?;
                let mut rows = Vec::new();
                while st.fetch()? {
                    rows.push((
                        st.get_trimmed(1)?,
                        st.get_trimmed(2)?,
                        st.get_trimmed(3)?,
                        st.get_trimmed(4)?,
                        st.get_trimmed(5)?,
                        st.get_trimmed(6)?,
                    ));
                }
                rows
            };

            let mut keys: Vec<ForeignKey> = Vec::new();
            for (name, column, update_rule, delete_rule, unique_constraint, index_name) in rows {
                if let Some(key) = keys.last_mut().filter(|k| k.name == name) {
                    key.columns.push(column);
                    continue;
                }
                let (referenced_table, referenced_columns) =
                    referenced_key(loader, &unique_constraint)?;
                keys.push(ForeignKey {
                    name,
                    table: table.to_string(),
                    columns: vec![column],
                    referenced_table,
                    referenced_columns,
                    update_action: ForeignKeyAction::from_rule(&update_rule),
                    delete_action: ForeignKeyAction::from_rule(&delete_rule),
                    index_name,
                });
            }
            tracing::debug!(table, count = keys.len(), "loaded foreign keys");
            Ok(keys)
        })
    }

    pub fn foreign_keys(&mut self) -> &[ForeignKey] {
        let _ = self.load_foreign_keys();
        self.foreign_keys.get().map(Vec::as_slice).unwrap_or_default()
    }

    pub fn load_unique_constraints(&mut self) -> Result<()> {
        let item = self.relation.item();
        load_facet(item, &mut self.unique_constraints, FacetKind::UniqueConstraints, |loader| {
            let handle = loader.get_statement(UNIQUE_SQL)?;
            let mut st = handle.lock();
            st.bind(1, item.name().raw())?;
            st.execute()?;
            let mut constraints: Vec<UniqueConstraint> = Vec::new();
            while st.fetch()? {
                let name = st.get_trimmed(1)?;
                let column = st.get_trimmed(2)?;
                match constraints.last_mut() {
                    Some(current) if current.name == name => current.columns.push(column),
                    _ => constraints.push(UniqueConstraint {
                        name,
                        columns: vec![column],
                        index_name: st.get_trimmed(3)?,
                    }),
                }
            }
            Ok(constraints)
        })
    }

    pub fn unique_constraints(&mut self) -> &[UniqueConstraint] {
        let _ = self.load_unique_constraints();
        self.unique_constraints.get().map(Vec::as_slice).unwrap_or_default()
    }

    pub fn load_check_constraints(&mut self) -> Result<()> {
        let item = self.relation.item();
        load_facet(item, &mut self.check_constraints, FacetKind::CheckConstraints, |loader| {
            let handle = loader.get_statement(CHECK_SQL)?;
            let mut st = handle.lock();
            st.bind(1, item.name().raw())?;
            st.execute()?;
            let mut constraints = Vec::new();
            while st.fetch()? {
                constraints.push(CheckConstraint {
                    name: st.get_trimmed(1)?,
                    source: st.read_blob(2)?.trim_end_matches(' ').to_string(),
                });
            }
            Ok(constraints)
        })
    }

    pub fn check_constraints(&mut self) -> &[CheckConstraint] {
        let _ = self.load_check_constraints();
        self.check_constraints.get().map(Vec::as_slice).unwrap_or_default()
    }

    pub fn load_indices(&mut self) -> Result<()> {
        let item = self.relation.item();
        load_facet(item, &mut self.indices, FacetKind::Indices, |loader| {
            let handle = loader.get_statement(INDICES_SQL)?;
            let mut st = handle.lock();
            st.bind(1, item.name().raw())?;
            st.execute()?;
            let mut indices: Vec<Index> = Vec::new();
            while st.fetch()? {
                let name = st.get_trimmed(1)?;
                let segment = st.get_trimmed(6)?;
                if let Some(current) = indices.last_mut().filter(|i| i.name == name) {
                    current.segments.push(segment);
                    continue;
                }
                let statistics = if st.is_null(5)? {
                    -1.0
                } else {
                    st.get(5)?.as_f64().unwrap_or(-1.0)
                };
                indices.push(Index {
                    name,
                    unique: st.get_i64_or(2, 0)? == 1,
                    active: st.get_i64_or(3, 0)? == 0,
                    direction: if st.get_i64_or(4, 0)? == 0 {
                        IndexDirection::Ascending
                    } else {
                        IndexDirection::Descending
                    },
                    statistics,
                    is_system: !st.is_null(7)?,
                    expression: st.read_blob(8)?.trim().to_string(),
                    segments: if segment.is_empty() { Vec::new() } else { vec![segment] },
                });
            }
            Ok(indices)
        })
    }

    pub fn indices(&mut self) -> &[Index] {
        let _ = self.load_indices();
        self.indices.get().map(Vec::as_slice).unwrap_or_default()
    }

    /// Drop the cached indices if they include `for_index`, or
    /// unconditionally when no index is named
    pub fn invalidate_indices(&mut self, for_index: Option<&str>) {
        let Some(indices) = self.indices.get() else {
            return;
        };
        let affected = match for_index {
            None => true,
            Some(name) => indices.iter().any(|i| i.name == name),
        };
        if affected {
            self.indices.invalidate();
            self.relation.item().notify_observers();
        }
    }

    pub fn load_external_path(&mut self) -> Result<()> {
        let item = self.relation.item();
        load_facet(item, &mut self.external_path, FacetKind::ExternalPath, |loader| {
            let handle = loader.get_statement(EXTERNAL_FILE_SQL)?;
            let mut st = handle.lock();
            st.bind(1, item.name().raw())?;
            st.execute()?;
            if st.fetch()? && !st.is_null(1)? {
                st.get_trimmed(1)
            } else {
                Ok(String::new())
            }
        })
    }

    /// File backing an external table; empty for regular tables
    pub fn external_path(&mut self) -> &str {
        let _ = self.load_external_path();
        self.external_path.get().map(String::as_str).unwrap_or_default()
    }

    /// `INSERT` statement over the stored (non-computed) columns.
    ///
    /// The value list holds the default for columns that have one and the
    /// column name otherwise; required columns are marked with `*`.
    pub fn insert_statement(&mut self) -> String {
        let quoted = self.quoted_name();
        let mut columns = Vec::new();
        let mut values = Vec::new();
        for column in self.columns().iter().filter(|c| !c.is_computed()) {
            columns.push(column.quoted_name());
            let mut value = String::new();
            if !column.nullable && !column.has_default() {
                value.push('*');
            }
            match &column.default {
                Some(default) => value.push_str(default),
                None => value.push_str(column.name().raw()),
            }
            values.push(value);
        }
        format!(
            "INSERT INTO {} ({})\n VALUES (\n{}\n)",
            quoted,
            columns.join(", "),
            values.join(", \n")
        )
    }

    /// Selectable procedure returning every column of the table.
    ///
    /// Column character sets are spelled out when they differ from
    /// `database_charset`.
    pub fn procedure_template(&mut self, database_charset: &str) -> String {
        let procedure = Identifier::new(format!("SP_{}", self.name().raw())).quoted();
        let quoted = self.quoted_name();
        let mut parameters = Vec::new();
        let mut selected = Vec::new();
        let mut targets = Vec::new();
        for column in self.columns() {
            let mut datatype = column.datatype();
            if let Some(charset) = column.charset.as_deref()
                && charset != database_charset
            {
                datatype.push_str(" CHARACTER SET ");
                datatype.push_str(charset);
            }
            parameters.push(format!("\n\t{} {}", column.quoted_name(), datatype));
            selected.push(format!("a.{}", column.quoted_name()));
            targets.push(format!(":{}", column.quoted_name()));
        }
        format!(
            "SET TERM !! ;\nCREATE PROCEDURE {}\nRETURNS ({})\nAS\nBEGIN\n\tFOR SELECT {}\n\t    FROM {} a\n\t    INTO {}\n\tDO\n\tBEGIN\n\t\tSUSPEND;\n\tEND\nEND!!\nSET TERM ; !!\n",
            procedure,
            parameters.join(","),
            selected.join(", "),
            quoted,
            targets.join(", ")
        )
    }

    pub fn create_sql_template() -> &'static str {
        "CREATE TABLE table_name\n\
         (\n    \
         column_name {< datatype> | COMPUTED BY (< expr>) | domain}\n        \
         [DEFAULT { literal | NULL | USER}] [NOT NULL]\n    \
         ...\n    \
         CONSTRAINT constraint_name\n        \
         PRIMARY KEY (column_list),\n        \
         UNIQUE      (column_list),\n        \
         FOREIGN KEY (column_list) REFERENCES other_table (column_list),\n        \
         CHECK       (condition),\n    \
         ...\n\
         );\n"
    }
}

/// Referenced table and columns of the unique or primary key named
/// `constraint`
fn referenced_key(loader: &MetadataLoader, constraint: &str) -> Result<(String, Vec<String>)> {
    let handle = loader.get_statement(REFERENCED_KEY_SQL)?;
    let mut st = handle.lock();
    st.bind(1, constraint)?;
    st.execute()?;
    let mut table = String::new();
    let mut columns = Vec::new();
    while st.fetch()? {
        table = st.get_trimmed(1)?;
        columns.push(st.get_trimmed(2)?);
    }
    Ok((table, columns))
}

impl MetadataNode for Table {
    fn item(&self) -> &MetadataItem {
        self.relation.item()
    }

    fn accept_visitor(&self, visitor: &mut dyn MetadataItemVisitor) {
        visitor.visit_table(self);
    }

    fn get_children<'a>(&'a self, out: &mut Vec<&'a dyn MetadataNode>) -> bool {
        self.relation.push_children(out)
    }

    fn invalidate(&mut self, facet: Option<FacetKind>) {
        let changed = match facet {
            None => {
                let mut changed = self.relation.invalidate_facet(None);
                changed |= self.primary_key.invalidate();
                changed |= self.foreign_keys.invalidate();
                changed |= self.check_constraints.invalidate();
                changed |= self.unique_constraints.invalidate();
                changed |= self.indices.invalidate();
                changed |= self.external_path.invalidate();
                changed
            }
            Some(FacetKind::PrimaryKey) => self.primary_key.invalidate(),
            Some(FacetKind::ForeignKeys) => self.foreign_keys.invalidate(),
            Some(FacetKind::CheckConstraints) => self.check_constraints.invalidate(),
            Some(FacetKind::UniqueConstraints) => self.unique_constraints.invalidate(),
            Some(FacetKind::Indices) => self.indices.invalidate(),
            Some(FacetKind::ExternalPath) => self.external_path.invalidate(),
            other => self.relation.invalidate_facet(other),
        };
        if changed {
            self.relation.item().notify_observers();
        }
    }
}

#[cfg(test)]
mod tests;
