//! Kind dispatch over the metadata graph

use crate::column::Column;
use crate::database::Database;
use crate::item::{FacetKind, MetadataItem};
use crate::procedure::{Parameter, Procedure};
use crate::server::Server;
use crate::table::Table;
use crate::view::View;

/// One method per item kind; every method defaults to doing nothing
pub trait MetadataItemVisitor {
    fn visit_server(&mut self, _server: &Server) {}
    fn visit_database(&mut self, _database: &Database) {}
    fn visit_table(&mut self, _table: &Table) {}
    fn visit_view(&mut self, _view: &View) {}
    fn visit_procedure(&mut self, _procedure: &Procedure) {}
    fn visit_column(&mut self, _column: &Column) {}
    fn visit_parameter(&mut self, _parameter: &Parameter) {}
}

/// Behaviour shared by every node of the metadata graph
pub trait MetadataNode {
    fn item(&self) -> &MetadataItem;

    fn accept_visitor(&self, visitor: &mut dyn MetadataItemVisitor);

    /// Append the already loaded direct children to `out`.
    ///
    /// Never triggers a load. Returns whether anything was appended.
    fn get_children<'a>(&'a self, _out: &mut Vec<&'a dyn MetadataNode>) -> bool {
        false
    }

    /// Drop one cached facet, or all of them when `facet` is `None`.
    /// Observers are notified when something loaded was dropped.
    fn invalidate(&mut self, _facet: Option<FacetKind>) {}
}

/// Collects a `TYPE name` label for every visited item
#[derive(Debug, Default)]
pub struct TypeNameCollector {
    pub names: Vec<String>,
}

impl TypeNameCollector {
    fn push(&mut self, item: &MetadataItem) {
        self.names.push(format!("{} {}", item.type_name(), item.name()));
    }
}

impl MetadataItemVisitor for TypeNameCollector {
    fn visit_server(&mut self, server: &Server) {
        self.push(server.item());
    }

    fn visit_database(&mut self, database: &Database) {
        self.push(database.item());
    }

    fn visit_table(&mut self, table: &Table) {
        self.push(table.item());
    }

    fn visit_view(&mut self, view: &View) {
        self.push(view.item());
    }

    fn visit_procedure(&mut self, procedure: &Procedure) {
        self.push(procedure.item());
    }

    fn visit_column(&mut self, column: &Column) {
        self.push(column.item());
    }

    fn visit_parameter(&mut self, parameter: &Parameter) {
        self.push(parameter.item());
    }
}

/// Visit `node` and, depth first, every loaded descendant
pub fn walk(node: &dyn MetadataNode, visitor: &mut dyn MetadataItemVisitor) {
    node.accept_visitor(visitor);
    let mut children = Vec::new();
    if node.get_children(&mut children) {
        for child in children {
            walk(child, visitor);
        }
    }
}
