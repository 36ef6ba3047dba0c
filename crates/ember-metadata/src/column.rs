use ember_core::{Identifier, Result};
use std::sync::Arc;
use uuid::Uuid;

use crate::datatype::{FIELD_TYPE_COLUMNS, FieldType};
use crate::item::{ItemKind, MetadataItem};
use crate::loader::{LockedStatement, MetadataLoader};
use crate::visitor::{MetadataItemVisitor, MetadataNode};

/// Column query of a relation; bound to the relation name
pub(crate) fn columns_sql() -> String {
    format!(
        "select r.rdb$field_name, r.rdb$null_flag, r.rdb$field_source, l.rdb$collation_name, \
         f.rdb$computed_source, r.rdb$default_source, r.rdb$description, c.rdb$character_set_name, \
         {FIELD_TYPE_COLUMNS}, f.rdb$null_flag, f.rdb$default_source, r.rdb$field_position \
         from rdb$fields f \
         join rdb$relation_fields r on f.rdb$field_name = r.rdb$field_source \
         left outer join rdb$collations l on l.rdb$collation_id = r.rdb$collation_id \
         and l.rdb$character_set_id = f.rdb$character_set_id \
         left outer join rdb$character_sets c on c.rdb$character_set_id = f.rdb$character_set_id \
         where r.rdb$relation_name = ? \
         order by r.rdb$field_position"
    )
}

/// A column of a table or view
#[derive(Debug)]
pub struct Column {
    item: MetadataItem,
    pub position: i64,
    /// Domain the column is based on; server generated for inline types
    pub domain: String,
    pub field_type: FieldType,
    pub nullable: bool,
    /// Default value without the `DEFAULT` keyword
    pub default: Option<String>,
    pub computed_source: Option<String>,
    pub collation: Option<String>,
    pub charset: Option<String>,
    pub description: Option<String>,
}

impl Column {
    pub fn new(name: impl Into<Identifier>) -> Self {
        Self {
            item: MetadataItem::new(ItemKind::Column, name),
            position: 0,
            domain: String::new(),
            field_type: FieldType::default(),
            nullable: true,
            default: None,
            computed_source: None,
            collation: None,
            charset: None,
            description: None,
        }
    }

    /// Build a column from one row of [`columns_sql`]
    pub(crate) fn from_row(
        st: &LockedStatement<'_>,
        relation: Uuid,
        loader: &Arc<MetadataLoader>,
    ) -> Result<Self> {
        let name = st.get_trimmed(1)?;
        let column_not_null = st.get_i64_or(2, 0)? != 0;
        let domain_not_null = st.get_i64_or(15, 0)? != 0;
        let default = blob_text(st, 6)?.or(blob_text(st, 16)?);

        Ok(Self {
            item: MetadataItem::new(ItemKind::Column, name)
                .with_context(relation, Some(Arc::clone(loader))),
            position: st.get_i64_or(17, 0)?,
            domain: st.get_trimmed(3)?,
            field_type: FieldType::read(st, 9)?,
            nullable: !(column_not_null || domain_not_null),
            default: default.map(|d| strip_default_keyword(&d)),
            computed_source: blob_text(st, 5)?,
            collation: st.get_optional(4)?,
            charset: st.get_optional(8)?,
            description: blob_text(st, 7)?,
        })
    }

    pub fn name(&self) -> &Identifier {
        self.item.name()
    }

    pub fn quoted_name(&self) -> String {
        self.item.quoted_name()
    }

    /// SQL datatype of the column
    pub fn datatype(&self) -> String {
        self.field_type.datatype()
    }

    /// Whether the column uses a named, user-defined domain
    pub fn has_user_domain(&self) -> bool {
        !self.domain.is_empty() && !self.domain.starts_with("RDB$")
    }

    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }

    pub fn is_computed(&self) -> bool {
        self.computed_source.is_some()
    }
}

impl MetadataNode for Column {
    fn item(&self) -> &MetadataItem {
        &self.item
    }

    fn accept_visitor(&self, visitor: &mut dyn MetadataItemVisitor) {
        visitor.visit_column(self);
    }
}

/// Blob text with padding removed, `None` when NULL or blank
pub(crate) fn blob_text(st: &LockedStatement<'_>, position: usize) -> Result<Option<String>> {
    let text = st.read_blob(position)?;
    let text = text.trim();
    Ok(if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    })
}

fn strip_default_keyword(source: &str) -> String {
    let source = source.trim();
    match source.get(..7) {
        Some(keyword) if keyword.eq_ignore_ascii_case("DEFAULT") => source[7..].trim().to_string(),
        _ => source.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_strip_default_keyword() {
        assert_eq!(strip_default_keyword("DEFAULT 0"), "0");
        assert_eq!(strip_default_keyword("default 'N'"), "'N'");
        assert_eq!(strip_default_keyword("CURRENT_DATE"), "CURRENT_DATE");
        assert_eq!(strip_default_keyword("DEF"), "DEF");
    }

    #[test]
    fn test_user_domain_detection() {
        let mut column = Column::new("AMOUNT");
        column.domain = "RDB$12".to_string();
        assert!(!column.has_user_domain());
        column.domain = "MONEY".to_string();
        assert!(column.has_user_domain());
    }
}
