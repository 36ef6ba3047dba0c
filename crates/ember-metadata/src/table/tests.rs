use super::*;
use crate::subject::Observer;
use ember_core::{CatalogConnection, Value};
use ember_core::testing::{MockCatalog, MockRow};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;

fn table_on(mock: &MockCatalog, name: &str) -> Table {
    let loader = Arc::new(MetadataLoader::new(Arc::new(mock.clone())));
    Table::in_database(name, Uuid::new_v4(), Some(loader))
}

fn column_row(name: &str, not_null: bool, default: Option<&str>, computed: Option<&str>) -> MockRow {
    vec![
        Value::from(format!("{:<31}", name)),
        if not_null { Value::Int16(1) } else { Value::Null },
        Value::from("RDB$1"),
        Value::Null,
        Value::from(computed.map(str::to_string)),
        Value::from(default.map(|d| format!("DEFAULT {}", d))),
        Value::Null,
        Value::Null,
        Value::Int16(8),
        Value::Int16(0),
        Value::Int16(4),
        Value::Int16(0),
        Value::Int16(0),
        Value::Null,
        Value::Null,
        Value::Null,
        Value::Int16(0),
    ]
}

fn varchar_row(name: &str, charset: &str) -> MockRow {
    let mut row = column_row(name, false, None, None);
    row[7] = Value::from(charset);
    row[8] = Value::Int16(37);
    row[10] = Value::Int16(40);
    row[13] = Value::Int16(40);
    row
}

#[derive(Default)]
struct Counter {
    count: Mutex<usize>,
}

impl Observer for Counter {
    fn update(&self, _subject: Uuid) {
        *self.count.lock() += 1;
    }
}

#[test]
fn test_primary_key_absent_on_zero_rows() {
    let mock = MockCatalog::new("EMPLOYEE");
    let mut table = table_on(&mock, "LOG");

    assert_eq!(table.primary_key(), None);
    assert_eq!(mock.executions_matching("'PRIMARY KEY'").len(), 1);
}

#[test]
fn test_primary_key_collects_ordered_columns() {
    let mock = MockCatalog::new("EMPLOYEE").with_rows(
        "'PRIMARY KEY'",
        vec![
            vec!["PK_ORDER_LINE   ".into(), "ORDER_ID   ".into(), "RDB$PRIMARY7  ".into()],
            vec!["PK_ORDER_LINE   ".into(), "LINE_NO    ".into(), "RDB$PRIMARY7  ".into()],
        ],
    );
    let mut table = table_on(&mock, "ORDER_LINE");

    let pk = table.primary_key().cloned().unwrap();
    assert_eq!(pk.name, "PK_ORDER_LINE");
    assert_eq!(pk.columns, vec!["ORDER_ID", "LINE_NO"]);
    assert_eq!(pk.index_name, "RDB$PRIMARY7");
    assert_eq!(mock.executed()[0].params, vec![Value::from("ORDER_LINE")]);
}

#[test]
fn test_foreign_keys_grouped_by_constraint_name() {
    let mock = MockCatalog::new("EMPLOYEE")
        .with_rows(
            "'FOREIGN KEY'",
            vec![
                vec!["FK1".into(), "A".into(), "RESTRICT".into(), "CASCADE".into(), "PK_P".into(), "IX1".into()],
                vec!["FK1".into(), "B".into(), "RESTRICT".into(), "CASCADE".into(), "PK_P".into(), "IX1".into()],
                vec!["FK2".into(), "C".into(), "SET NULL".into(), "NO ACTION".into(), "UQ_Q".into(), "IX2".into()],
            ],
        )
        .with_rows_for(
            "where r.rdb$constraint_name = ?",
            "PK_P",
            vec![vec!["PARENT  ".into(), "X ".into()], vec!["PARENT  ".into(), "Y ".into()]],
        )
        .with_rows_for(
            "where r.rdb$constraint_name = ?",
            "UQ_Q",
            vec![vec!["OTHER".into(), "Z".into()]],
        );
    let mut table = table_on(&mock, "CHILD");

    let keys = table.foreign_keys().to_vec();
    assert_eq!(keys.len(), 2);
    assert_eq!(keys[0].name, "FK1");
    assert_eq!(keys[0].columns, vec!["A", "B"]);
    assert_eq!(keys[0].referenced_table, "PARENT");
    assert_eq!(keys[0].referenced_columns, vec!["X", "Y"]);
    assert_eq!(keys[0].delete_action, ForeignKeyAction::Cascade);
    assert_eq!(keys[1].columns, vec!["C"]);
    assert_eq!(keys[1].referenced_table, "OTHER");
    assert_eq!(keys[1].update_action, ForeignKeyAction::SetNull);
    assert_eq!(keys[0].join_condition(), "CHILD.A = PARENT.X AND CHILD.B = PARENT.Y");

    // one lookup per key, all inside one transaction
    assert_eq!(mock.executions_matching("where r.rdb$constraint_name = ?").len(), 2);
    assert_eq!(mock.transactions_started(), 1);
    assert_eq!(mock.commits(), 1);
}

#[test]
fn test_unique_constraints_grouped() {
    let mock = MockCatalog::new("EMPLOYEE").with_rows(
        "'UNIQUE'",
        vec![
            vec!["UQ_A".into(), "X".into(), "IX_A".into()],
            vec!["UQ_A".into(), "Y".into(), "IX_A".into()],
            vec!["UQ_B".into(), "Z".into(), "IX_B".into()],
        ],
    );
    let mut table = table_on(&mock, "T");

    let uniques = table.unique_constraints();
    assert_eq!(uniques.len(), 2);
    assert_eq!(uniques[0].columns, vec!["X", "Y"]);
    assert_eq!(uniques[1].index_name, "IX_B");
}

#[test]
fn test_check_constraint_reads_trigger_source() {
    let mock = MockCatalog::new("EMPLOYEE").with_rows(
        "rdb$check_constraints",
        vec![vec![
            "INTEG_12   ".into(),
            Value::Bytes(b"CHECK (QTY > 0)   ".to_vec()),
        ]],
    );
    let mut table = table_on(&mock, "T");

    assert_eq!(
        table.check_constraints(),
        &[CheckConstraint {
            name: "INTEG_12".into(),
            source: "CHECK (QTY > 0)".into(),
        }]
    );
}

#[test]
fn test_index_null_flags_use_defaults() {
    let mock = MockCatalog::new("EMPLOYEE").with_rows(
        "from rdb$indices",
        vec![
            vec![
                "IX_NAME".into(),
                Value::Null,
                Value::Null,
                Value::Null,
                Value::Null,
                "LAST_NAME".into(),
                Value::Null,
                Value::Null,
            ],
            vec![
                "IX_NAME".into(),
                Value::Null,
                Value::Null,
                Value::Null,
                Value::Null,
                "FIRST_NAME".into(),
                Value::Null,
                Value::Null,
            ],
            vec![
                "RDB$PRIMARY1".into(),
                Value::Int16(1),
                Value::Int16(1),
                Value::Int16(1),
                Value::Float64(0.25),
                "ID".into(),
                "PK_T".into(),
                Value::Null,
            ],
        ],
    );
    let mut table = table_on(&mock, "T");

    let indices = table.indices();
    assert_eq!(indices.len(), 2);

    let plain = &indices[0];
    assert!(!plain.unique);
    assert!(plain.active);
    assert!(plain.is_ascending());
    assert_eq!(plain.statistics, -1.0);
    assert!(!plain.is_system);
    assert_eq!(plain.segments, vec!["LAST_NAME", "FIRST_NAME"]);

    let pk = &indices[1];
    assert!(pk.unique);
    assert!(!pk.active);
    assert_eq!(pk.direction, IndexDirection::Descending);
    assert_eq!(pk.statistics, 0.25);
    assert!(pk.is_system);
}

#[test]
fn test_expression_index() {
    let mock = MockCatalog::new("EMPLOYEE").with_rows(
        "from rdb$indices",
        vec![vec![
            "IX_UPPER".into(),
            Value::Int16(0),
            Value::Int16(0),
            Value::Int16(0),
            Value::Float64(1.0),
            Value::Null,
            Value::Null,
            Value::Bytes(b"(UPPER(NAME))".to_vec()),
        ]],
    );
    let mut table = table_on(&mock, "T");

    let index = &table.indices()[0];
    assert!(index.is_expression());
    assert!(index.segments.is_empty());
    assert_eq!(index.columns_as_string(), "(UPPER(NAME))");
}

#[test]
fn test_external_path_defaults_to_empty() {
    let mock = MockCatalog::new("EMPLOYEE")
        .with_rows_for("rdb$external_file", "EXT", vec![vec!["/data/ext.txt   ".into()]])
        .with_rows_for("rdb$external_file", "T", vec![vec![Value::Null]]);

    assert_eq!(table_on(&mock, "EXT").external_path(), "/data/ext.txt");
    assert_eq!(table_on(&mock, "T").external_path(), "");
}

#[test]
fn test_column_load_invalidates_dependent_facets_without_reloading() {
    let mock = MockCatalog::new("EMPLOYEE")
        .with_rows("'PRIMARY KEY'", vec![vec!["PK".into(), "ID".into(), "IX".into()]])
        .with_rows("rdb$relation_fields", vec![column_row("ID", true, None, None)]);
    let mut table = table_on(&mock, "T");

    assert!(table.primary_key().is_some());
    table.load_indices().unwrap();
    let queries_before = mock.executed().len();

    table.load_columns().unwrap();

    assert!(!table.primary_key.is_loaded());
    assert!(!table.foreign_keys.is_loaded());
    assert!(!table.check_constraints.is_loaded());
    assert!(!table.unique_constraints.is_loaded());
    assert!(!table.indices.is_loaded());
    // only the column query ran
    assert_eq!(mock.executed().len(), queries_before + 1);
}

#[test]
fn test_column_reload_after_invalidate_drops_dependent_facets() {
    let mock = MockCatalog::new("EMPLOYEE")
        .with_rows("'PRIMARY KEY'", vec![vec!["PK".into(), "ID".into(), "IX".into()]])
        .with_rows("rdb$relation_fields", vec![column_row("ID", true, None, None)]);
    let mut table = table_on(&mock, "T");

    table.load_columns().unwrap();
    assert!(table.primary_key().is_some());
    table.invalidate(Some(FacetKind::Columns));

    assert!(table.find_column("ID").is_some());
    assert!(table.relation().columns_loaded());
    assert!(!table.primary_key.is_loaded());
}

#[test]
fn test_failed_load_records_last_error_and_returns_empty() {
    let mock = MockCatalog::new("EMPLOYEE").with_execute_failure("'UNIQUE'", "deadlock");
    let mut table = table_on(&mock, "T");

    assert!(table.unique_constraints().is_empty());
    assert_eq!(
        table.relation().item().last_error().as_deref(),
        Some("Query error: deadlock")
    );
    assert!(!table.unique_constraints.is_loaded());
    assert!(!mock.in_transaction());
}

#[test]
fn test_table_without_database_cannot_load() {
    let mut table = Table::new("ORPHAN");
    let err = table.load_primary_key().unwrap_err();
    assert!(matches!(err, ember_core::EmberError::MissingContext(_)));
}

#[test]
fn test_invalidate_indices_for_named_index_only() {
    let mock = MockCatalog::new("EMPLOYEE").with_rows(
        "from rdb$indices",
        vec![vec![
            "IX_A".into(),
            Value::Null,
            Value::Null,
            Value::Null,
            Value::Null,
            "A".into(),
            Value::Null,
            Value::Null,
        ]],
    );
    let mut table = table_on(&mock, "T");
    let counter = Arc::new(Counter::default());
    let observer: Arc<dyn Observer> = counter.clone();
    table.item().attach_observer(&observer);

    table.load_indices().unwrap();
    assert_eq!(*counter.count.lock(), 1);

    table.invalidate_indices(Some("IX_OTHER"));
    assert!(table.indices.is_loaded());

    table.invalidate_indices(Some("IX_A"));
    assert!(!table.indices.is_loaded());
    assert_eq!(*counter.count.lock(), 2);

    // nothing loaded, nothing to announce
    table.invalidate_indices(None);
    assert_eq!(*counter.count.lock(), 2);
}

#[test]
fn test_insert_statement_layout() {
    let mock = MockCatalog::new("EMPLOYEE").with_rows(
        "rdb$relation_fields",
        vec![
            column_row("ID", true, None, None),
            column_row("STATUS", true, Some("'N'"), None),
            column_row("NOTE", false, None, None),
            column_row("TOTAL", false, None, Some("(A + B)")),
        ],
    );
    let mut table = table_on(&mock, "ORDERS");

    assert_eq!(
        table.insert_statement(),
        "INSERT INTO ORDERS (ID, STATUS, NOTE)\n VALUES (\n*ID, \n'N', \nNOTE\n)"
    );
}

#[test]
fn test_procedure_template_layout() {
    let mock = MockCatalog::new("EMPLOYEE").with_rows(
        "rdb$relation_fields",
        vec![
            column_row("ID", true, None, None),
            varchar_row("NAME", "UTF8"),
            varchar_row("CODE", "NONE"),
        ],
    );
    let mut table = table_on(&mock, "Customer");

    assert_eq!(
        table.procedure_template("NONE"),
        "SET TERM !! ;\nCREATE PROCEDURE \"SP_Customer\"\nRETURNS (\
         \n\tID INTEGER,\n\tNAME VARCHAR(40) CHARACTER SET UTF8,\n\tCODE VARCHAR(40))\
         \nAS\nBEGIN\n\tFOR SELECT a.ID, a.NAME, a.CODE\n\t    FROM \"Customer\" a\
         \n\t    INTO :ID, :NAME, :CODE\n\tDO\n\tBEGIN\n\t\tSUSPEND;\n\tEND\nEND!!\nSET TERM ; !!\n"
    );
}

#[test]
fn test_create_template_has_only_placeholders() {
    let template = Table::create_sql_template();
    assert!(template.starts_with("CREATE TABLE table_name\n(\n    column_name"));
    assert!(template.ends_with("    ...\n);\n"));
    assert!(template.contains("        PRIMARY KEY (column_list),\n"));
}

#[test]
fn test_children_are_loaded_columns_only() {
    let mock = MockCatalog::new("EMPLOYEE").with_rows(
        "rdb$relation_fields",
        vec![column_row("A", false, None, None), column_row("B", false, None, None)],
    );
    let mut table = table_on(&mock, "T");

    let mut children = Vec::new();
    assert!(!table.get_children(&mut children));
    assert!(mock.executed().is_empty());

    table.load_columns().unwrap();
    let mut children = Vec::new();
    assert!(table.get_children(&mut children));
    let names: Vec<_> = children.iter().map(|c| c.item().name().to_string()).collect();
    assert_eq!(names, vec!["A", "B"]);
    assert_eq!(children[0].item().parent(), Some(table.item().id()));
}
