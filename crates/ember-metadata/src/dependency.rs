//! Object dependencies recorded in `rdb$dependencies`

use ember_core::Result;
use serde::{Deserialize, Serialize};

use crate::item::ItemKind;
use crate::loader::MetadataLoader;

const DEPENDS_ON_SQL: &str = "select distinct d.rdb$depended_on_name, d.rdb$depended_on_type \
     from rdb$dependencies d \
     where d.rdb$dependent_name = ? and d.rdb$dependent_type = ? \
     order by d.rdb$depended_on_type, d.rdb$depended_on_name";

const DEPENDENTS_SQL: &str = "select distinct d.rdb$dependent_name, d.rdb$dependent_type \
     from rdb$dependencies d \
     where d.rdb$depended_on_name = ? and d.rdb$depended_on_type = ? \
     order by d.rdb$dependent_type, d.rdb$dependent_name";

/// One end of a dependency edge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    pub name: String,
    pub kind: ItemKind,
}

/// Objects `name` depends on when `of_object` is set, otherwise the
/// objects that depend on it. Rows with an object type the model does not
/// know are skipped.
pub(crate) fn load_dependencies(
    loader: &MetadataLoader,
    name: &str,
    kind: ItemKind,
    of_object: bool,
) -> Result<Vec<Dependency>> {
    let Some(object_type) = kind.object_type() else {
        return Ok(Vec::new());
    };

    let _transaction = loader.transaction()?;
    let handle = loader.get_statement(if of_object { DEPENDS_ON_SQL } else { DEPENDENTS_SQL })?;
    let mut st = handle.lock();
    st.bind(1, name)?;
    st.bind(2, object_type)?;
    st.execute()?;

    let mut dependencies = Vec::new();
    while st.fetch()? {
        let code = st.get_i64_or(2, -1)?;
        match ItemKind::from_object_type(code) {
            Some(kind) => dependencies.push(Dependency {
                name: st.get_trimmed(1)?,
                kind,
            }),
            None => tracing::trace!(object = name, code, "skipping dependency of unknown type"),
        }
    }
    tracing::debug!(object = name, of_object, count = dependencies.len(), "loaded dependencies");
    Ok(dependencies)
}
