//! Rendering of catalog field type codes as SQL datatypes

use ember_core::Result;
use serde::{Deserialize, Serialize};

use crate::loader::LockedStatement;

/// Type columns of an `rdb$fields` row
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldType {
    pub field_type: i64,
    pub sub_type: i64,
    pub length: i64,
    pub precision: i64,
    pub scale: i64,
    /// Length in characters for text types, when the catalog knows it
    pub char_length: Option<i64>,
}

/// Columns a catalog query must select, in this order, for [`FieldType::read`]
pub(crate) const FIELD_TYPE_COLUMNS: &str = "f.rdb$field_type, f.rdb$field_sub_type, \
     f.rdb$field_length, f.rdb$field_precision, f.rdb$field_scale, f.rdb$character_length";

impl FieldType {
    /// Read the six type columns starting at position `first`
    pub(crate) fn read(st: &LockedStatement<'_>, first: usize) -> Result<Self> {
        let char_length = st.get(first + 5)?.as_i64();
        Ok(Self {
            field_type: st.get_i64_or(first, 0)?,
            sub_type: st.get_i64_or(first + 1, 0)?,
            length: st.get_i64_or(first + 2, 0)?,
            precision: st.get_i64_or(first + 3, 0)?,
            scale: st.get_i64_or(first + 4, 0)?,
            char_length,
        })
    }

    pub fn is_text(&self) -> bool {
        matches!(self.field_type, 14 | 37 | 40)
    }

    /// SQL spelling of the type, e.g. `VARCHAR(30)` or `NUMERIC(18,2)`
    pub fn datatype(&self) -> String {
        match self.field_type {
            7 | 8 | 16 if self.scale < 0 || self.sub_type == 1 || self.sub_type == 2 => {
                let name = if self.sub_type == 2 { "DECIMAL" } else { "NUMERIC" };
                let precision = if self.precision > 0 {
                    self.precision
                } else {
                    match self.field_type {
                        7 => 4,
                        8 => 9,
                        _ => 18,
                    }
                };
                format!("{}({},{})", name, precision, -self.scale)
            }
            7 => "SMALLINT".to_string(),
            8 => "INTEGER".to_string(),
            16 => "BIGINT".to_string(),
            9 => "QUAD".to_string(),
            10 => "FLOAT".to_string(),
            27 => "DOUBLE PRECISION".to_string(),
            12 => "DATE".to_string(),
            13 => "TIME".to_string(),
            35 => "TIMESTAMP".to_string(),
            23 => "BOOLEAN".to_string(),
            14 => format!("CHAR({})", self.text_length()),
            37 => format!("VARCHAR({})", self.text_length()),
            40 => format!("CSTRING({})", self.text_length()),
            261 => match self.sub_type {
                1 => "BLOB SUB_TYPE TEXT".to_string(),
                n => format!("BLOB SUB_TYPE {}", n),
            },
            45 => "BLOB_ID".to_string(),
            other => format!("UNKNOWN({})", other),
        }
    }

    fn text_length(&self) -> i64 {
        self.char_length.unwrap_or(self.length)
    }
}
