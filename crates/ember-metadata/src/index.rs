use serde::{Deserialize, Serialize};

/// Sort direction of an index
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndexDirection {
    #[default]
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Index {
    pub name: String,
    pub unique: bool,
    pub active: bool,
    pub direction: IndexDirection,
    /// Selectivity, or -1 when statistics were never computed
    pub statistics: f64,
    /// Created by the server to enforce a constraint
    pub is_system: bool,
    /// Expression source for expression indices, empty otherwise
    pub expression: String,
    /// Indexed columns in segment order
    pub segments: Vec<String>,
}

impl Index {
    pub fn is_ascending(&self) -> bool {
        self.direction == IndexDirection::Ascending
    }

    pub fn is_expression(&self) -> bool {
        !self.expression.is_empty()
    }

    /// Segment list for display, or the expression for expression indices
    pub fn columns_as_string(&self) -> String {
        if self.is_expression() {
            self.expression.clone()
        } else {
            self.segments.join(", ")
        }
    }
}
