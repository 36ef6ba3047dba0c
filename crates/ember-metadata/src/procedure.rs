//! Stored procedures: parameters, source, privileges and generated SQL

use ember_core::{EmberError, Identifier, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use uuid::Uuid;

use crate::column::blob_text;
use crate::datatype::{FIELD_TYPE_COLUMNS, FieldType};
use crate::item::{Facet, FacetKind, ItemKind, MetadataItem, load_facet};
use crate::loader::{LockedStatement, MetadataLoader};
use crate::visitor::{MetadataItemVisitor, MetadataNode};

fn parameters_sql() -> String {
    format!(
        "select p.rdb$parameter_name, p.rdb$field_source, p.rdb$parameter_type, \
         c.rdb$character_set_name, {FIELD_TYPE_COLUMNS}, p.rdb$parameter_number \
         from rdb$procedure_parameters p \
         join rdb$fields f on f.rdb$field_name = p.rdb$field_source \
         left outer join rdb$character_sets c on c.rdb$character_set_id = f.rdb$character_set_id \
         where p.rdb$procedure_name = ? \
         order by p.rdb$parameter_type, p.rdb$parameter_number"
    )
}

const SOURCE_SQL: &str =
    "select rdb$procedure_source from rdb$procedures where rdb$procedure_name = ?";

const DESCRIPTION_SQL: &str =
    "select rdb$description from rdb$procedures where rdb$procedure_name = ?";

const PRIVILEGES_SQL: &str = "select rdb$user, rdb$user_type, rdb$grantor, rdb$privilege, \
     rdb$grant_option, rdb$field_name \
     from rdb$user_privileges \
     where rdb$relation_name = ? and rdb$object_type = 5 \
     order by rdb$user, rdb$user_type, rdb$privilege";

/// Direction of a procedure parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParameterDirection {
    Input,
    Output,
}

impl ParameterDirection {
    /// Decode `rdb$parameter_type`: 0 is input, anything else output
    pub fn from_code(code: i64) -> Self {
        if code == 0 {
            ParameterDirection::Input
        } else {
            ParameterDirection::Output
        }
    }
}

#[derive(Debug)]
pub struct Parameter {
    item: MetadataItem,
    pub direction: ParameterDirection,
    pub position: i64,
    pub domain: String,
    pub field_type: FieldType,
    pub charset: Option<String>,
}

impl Parameter {
    fn from_row(st: &LockedStatement<'_>, procedure: Uuid, loader: &Arc<MetadataLoader>) -> Result<Self> {
        Ok(Self {
            item: MetadataItem::new(ItemKind::Parameter, st.get_trimmed(1)?)
                .with_context(procedure, Some(Arc::clone(loader))),
            domain: st.get_trimmed(2)?,
            direction: ParameterDirection::from_code(st.get_i64_or(3, 0)?),
            charset: st.get_optional(4)?,
            field_type: FieldType::read(st, 5)?,
            position: st.get_i64_or(11, 0)?,
        })
    }

    pub fn name(&self) -> &Identifier {
        self.item.name()
    }

    pub fn quoted_name(&self) -> String {
        self.item.quoted_name()
    }

    pub fn datatype(&self) -> String {
        self.field_type.datatype()
    }

    pub fn is_input(&self) -> bool {
        self.direction == ParameterDirection::Input
    }

    pub fn is_output(&self) -> bool {
        self.direction == ParameterDirection::Output
    }

    /// Datatype followed by the character set, when there is one
    fn declaration(&self) -> String {
        match &self.charset {
            Some(charset) => format!("{} {} CHARACTER SET {}", self.quoted_name(), self.datatype(), charset),
            None => format!("{} {}", self.quoted_name(), self.datatype()),
        }
    }
}

impl MetadataNode for Parameter {
    fn item(&self) -> &MetadataItem {
        &self.item
    }

    fn accept_visitor(&self, visitor: &mut dyn MetadataItemVisitor) {
        visitor.visit_parameter(self);
    }
}

/// Rights one grantee holds on a procedure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Privilege {
    pub grantee: String,
    /// Catalog object type of the grantee (8 user, 13 role, 5 procedure, ...)
    pub grantee_type: i64,
    pub grantor: String,
    pub grant_option: bool,
    /// Single character privilege codes, e.g. `X` for execute
    pub privileges: BTreeSet<char>,
}

impl Privilege {
    pub fn has(&self, code: char) -> bool {
        self.privileges.contains(&code)
    }
}

#[derive(Debug)]
pub struct Procedure {
    item: MetadataItem,
    parameters: Facet<Vec<Parameter>>,
    source: Facet<String>,
    privileges: Facet<Vec<Privilege>>,
    description: Facet<Option<String>>,
}

impl Procedure {
    pub fn new(name: impl Into<Identifier>) -> Self {
        Self::from_item(MetadataItem::new(ItemKind::Procedure, name))
    }

    pub(crate) fn in_database(
        name: impl Into<Identifier>,
        database: Uuid,
        loader: Option<Arc<MetadataLoader>>,
    ) -> Self {
        Self::from_item(MetadataItem::new(ItemKind::Procedure, name).with_context(database, loader))
    }

    fn from_item(item: MetadataItem) -> Self {
        Self {
            item,
            parameters: Facet::Unloaded,
            source: Facet::Unloaded,
            privileges: Facet::Unloaded,
            description: Facet::Unloaded,
        }
    }

    pub fn name(&self) -> &Identifier {
        self.item.name()
    }

    pub fn quoted_name(&self) -> String {
        self.item.quoted_name()
    }

    pub(crate) fn set_loader(&mut self, loader: Option<Arc<MetadataLoader>>) {
        self.item.set_loader(loader);
    }

    /// Load the parameters, inputs first, each group in catalog order
    pub fn load_parameters(&mut self) -> Result<()> {
        let item = &self.item;
        load_facet(item, &mut self.parameters, FacetKind::Parameters, |loader| {
            let handle = loader.get_statement(&parameters_sql())?;
            let mut st = handle.lock();
            st.bind(1, item.name().raw())?;
            st.execute()?;
            let mut parameters = Vec::new();
            while st.fetch()? {
                parameters.push(Parameter::from_row(&st, item.id(), loader)?);
            }
            tracing::debug!(procedure = %item.name(), count = parameters.len(), "loaded parameters");
            Ok(parameters)
        })
    }

    pub fn parameters(&mut self) -> &[Parameter] {
        let _ = self.load_parameters();
        self.parameters.get().map(Vec::as_slice).unwrap_or_default()
    }

    /// Load the parameters if needed, or always when `force` is set, and
    /// notify observers. Returns whether the parameters are loaded.
    pub fn check_and_load_parameters(&mut self, force: bool) -> bool {
        if force || !self.parameters.is_loaded() {
            self.parameters.invalidate();
            let _ = self.load_parameters();
            self.item.notify_observers();
        }
        self.parameters.is_loaded()
    }

    /// Whether the procedure returns rows and can be used in a `SELECT`
    pub fn is_selectable(&mut self) -> bool {
        self.parameters().iter().any(Parameter::is_output)
    }

    /// `SELECT` over the procedure. Lists the output parameters when
    /// `with_columns` is set, `*` otherwise.
    pub fn select_statement(&mut self, with_columns: bool) -> String {
        let quoted = self.quoted_name();
        let (inputs, outputs) = self.split_parameter_names();
        let mut sql = String::from("SELECT ");
        if with_columns {
            sql.push_str(&outputs.join(", "));
        } else {
            sql.push_str("* ");
        }
        sql.push_str("\nFROM ");
        sql.push_str(&quoted);
        if !inputs.is_empty() {
            sql.push_str(&format!("({})", inputs.join(", ")));
        }
        sql
    }

    pub fn execute_statement(&mut self) -> String {
        let quoted = self.quoted_name();
        let (inputs, _) = self.split_parameter_names();
        if inputs.is_empty() {
            format!("EXECUTE PROCEDURE {}", quoted)
        } else {
            format!("EXECUTE PROCEDURE {}({})", quoted, inputs.join(", "))
        }
    }

    fn split_parameter_names(&mut self) -> (Vec<String>, Vec<String>) {
        let (inputs, outputs): (Vec<&Parameter>, Vec<&Parameter>) =
            self.parameters().iter().partition(|p| p.is_input());
        (
            inputs.iter().map(|p| p.quoted_name()).collect(),
            outputs.iter().map(|p| p.quoted_name()).collect(),
        )
    }

    /// Human readable signature, one parameter per line
    pub fn definition(&mut self) -> String {
        self.check_and_load_parameters(false);
        let quoted = self.quoted_name();
        let params = self.parameters.get().map(Vec::as_slice).unwrap_or_default();
        let render = |list: Vec<&Parameter>| -> String {
            let last = list.len().saturating_sub(1);
            list.iter()
                .enumerate()
                .map(|(i, p)| {
                    format!(
                        "    {} {}{}\n",
                        p.quoted_name(),
                        p.datatype(),
                        if i == last { "" } else { "," }
                    )
                })
                .collect()
        };
        let inputs = render(params.iter().filter(|p| p.is_input()).collect());
        let outputs = render(params.iter().filter(|p| p.is_output()).collect());

        let mut definition = quoted;
        if !inputs.is_empty() {
            definition.push_str(&format!("(\n{})", inputs));
        }
        definition.push('\n');
        if !outputs.is_empty() {
            definition.push_str("returns:\n");
            definition.push_str(&outputs);
        }
        definition
    }

    pub fn load_source(&mut self) -> Result<()> {
        let item = &self.item;
        load_facet(item, &mut self.source, FacetKind::Source, |loader| {
            let handle = loader.get_statement(SOURCE_SQL)?;
            let mut st = handle.lock();
            st.bind(1, item.name().raw())?;
            st.execute()?;
            if st.fetch()? {
                st.read_blob(1)
            } else {
                Ok(String::new())
            }
        })
    }

    /// Procedure body; empty when it cannot be loaded
    pub fn source(&mut self) -> &str {
        let _ = self.load_source();
        self.source.get().map(String::as_str).unwrap_or_default()
    }

    /// `ALTER PROCEDURE` script recreating the procedure.
    ///
    /// # Errors
    /// `EmberError::PreconditionNotMet` carrying the load failure when the
    /// parameters or the source cannot be loaded.
    pub fn alter_sql(&mut self) -> Result<String> {
        self.load_parameters()
            .and_then(|_| self.load_source())
            .map_err(|e| EmberError::PreconditionNotMet(self.item.last_error().unwrap_or_else(|| e.to_string())))?;

        let params = self.parameters.get().map(Vec::as_slice).unwrap_or_default();
        let source = self.source.get().map(String::as_str).unwrap_or_default();

        let mut input = String::new();
        let mut output = String::new();
        for parameter in params {
            let list = if parameter.is_input() { &mut input } else { &mut output };
            if list.is_empty() {
                list.push_str(if parameter.is_input() {
                    " (\n    "
                } else {
                    "\nRETURNS (\n    "
                });
            } else {
                list.push_str(",\n    ");
            }
            list.push_str(&parameter.declaration());
        }

        let mut sql = format!("SET TERM ^ ;\nALTER PROCEDURE {}", self.item.quoted_name());
        if !input.is_empty() {
            sql.push_str(&input);
            sql.push_str(" )");
        }
        if !output.is_empty() {
            sql.push_str(&output);
            sql.push_str(" )");
        }
        sql.push_str("\nAS\n");
        sql.push_str(source);
        sql.push_str("^\nSET TERM ; ^");
        Ok(sql)
    }

    /// Load the grants, one record per grantee
    pub fn load_privileges(&mut self) -> Result<()> {
        let item = &self.item;
        load_facet(item, &mut self.privileges, FacetKind::Privileges, |loader| {
            let handle = loader.get_statement(PRIVILEGES_SQL)?;
            let mut st = handle.lock();
            st.bind(1, item.name().raw())?;
            st.execute()?;
            let mut privileges: Vec<Privilege> = Vec::new();
            while st.fetch()? {
                let grantee = st.get_trimmed(1)?;
                let grantee_type = st.get_i64_or(2, 0)?;
                let code = st.get_trimmed(4)?.chars().next();
                let same_grantee = privileges
                    .last()
                    .is_some_and(|p| p.grantee == grantee && p.grantee_type == grantee_type);
                if !same_grantee {
                    privileges.push(Privilege {
                        grantee,
                        grantee_type,
                        grantor: st.get_trimmed(3)?,
                        grant_option: st.get_i64_or(5, 0)? == 1,
                        privileges: BTreeSet::new(),
                    });
                }
                if let (Some(current), Some(code)) = (privileges.last_mut(), code) {
                    current.privileges.insert(code);
                }
            }
            Ok(privileges)
        })
    }

    pub fn privileges(&mut self) -> &[Privilege] {
        let _ = self.load_privileges();
        self.privileges.get().map(Vec::as_slice).unwrap_or_default()
    }

    pub fn load_description(&mut self) -> Result<()> {
        let item = &self.item;
        load_facet(item, &mut self.description, FacetKind::Description, |loader| {
            let handle = loader.get_statement(DESCRIPTION_SQL)?;
            let mut st = handle.lock();
            st.bind(1, item.name().raw())?;
            st.execute()?;
            if st.fetch()? { blob_text(&st, 1) } else { Ok(None) }
        })
    }

    pub fn description(&mut self) -> Option<&str> {
        let _ = self.load_description();
        self.description.get().and_then(|d| d.as_deref())
    }

    pub fn create_sql_template() -> &'static str {
        "SET TERM ^ ;\n\n\
         CREATE PROCEDURE name \n \
         ( input_parameter_name < datatype>, ... ) \n\
         RETURNS \n \
         ( output_parameter_name < datatype>, ... )\n\
         AS \n\
         DECLARE VARIABLE variable_name < datatype>; \n\
         BEGIN\n  \
         /* write your code here */ \n\
         END^\n\n\
         SET TERM ; ^\n"
    }
}

impl MetadataNode for Procedure {
    fn item(&self) -> &MetadataItem {
        &self.item
    }

    fn accept_visitor(&self, visitor: &mut dyn MetadataItemVisitor) {
        visitor.visit_procedure(self);
    }

    fn get_children<'a>(&'a self, out: &mut Vec<&'a dyn MetadataNode>) -> bool {
        let parameters = self.parameters.get().map(Vec::as_slice).unwrap_or_default();
        out.extend(parameters.iter().map(|p| p as &dyn MetadataNode));
        !parameters.is_empty()
    }

    fn invalidate(&mut self, facet: Option<FacetKind>) {
        let changed = match facet {
            None => {
                let mut changed = self.parameters.invalidate();
                changed |= self.source.invalidate();
                changed |= self.privileges.invalidate();
                changed |= self.description.invalidate();
                changed
            }
            Some(FacetKind::Parameters) => self.parameters.invalidate(),
            Some(FacetKind::Source) => self.source.invalidate(),
            Some(FacetKind::Privileges) => self.privileges.invalidate(),
            Some(FacetKind::Description) => self.description.invalidate(),
            Some(_) => false,
        };
        if changed {
            self.item.notify_observers();
        }
    }
}
