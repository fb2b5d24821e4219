// tests/inspector/sqlite_test.rs
use tgdmine::inspector::query::{ColumnRef, Equality, MatchQuery, QueryAtom};
use tgdmine::inspector::{Inspector, InspectorError, MemoryInspector, SqliteInspector, Value};

fn seeded_sqlite() -> SqliteInspector {
    let inspector = SqliteInspector::open_in_memory("clinic").unwrap();
    inspector
        .connection()
        .execute_batch(
            "CREATE TABLE patient (id INTEGER PRIMARY KEY, name TEXT);
             CREATE TABLE lab (patient_id INTEGER REFERENCES patient, value REAL);
             INSERT INTO patient VALUES (1, 'ann'), (2, 'bo'), (3, 'cy');
             INSERT INTO lab VALUES (1, 70.0), (2, 81.0), (3, 92.0);",
        )
        .unwrap();
    inspector
}

fn seeded_memory() -> MemoryInspector {
    let mut db = MemoryInspector::new("clinic");
    db.create_table("patient", &[("id", "INTEGER"), ("name", "TEXT")]);
    db.set_primary_key("patient", "id").unwrap();
    db.create_table("lab", &[("patient_id", "INTEGER"), ("value", "REAL")]);
    db.add_foreign_key("lab", "patient_id", "patient", "id").unwrap();
    db.insert_rows(
        "patient",
        vec![
            vec![Value::Int(1), Value::text("ann")],
            vec![Value::Int(2), Value::text("bo")],
            vec![Value::Int(3), Value::text("cy")],
        ],
    )
    .unwrap();
    db.insert_rows(
        "lab",
        vec![
            vec![Value::Int(1), Value::Int(70)],
            vec![Value::Int(2), Value::Int(81)],
            vec![Value::Int(3), Value::Int(92)],
        ],
    )
    .unwrap();
    db
}

/// lab ⋈ patient on patient_id = id, with an existential second patient
/// occurrence whose name matches the first one.
fn join_query() -> MatchQuery {
    MatchQuery {
        atoms: vec![
            QueryAtom {
                table: "lab".to_string(),
                alias: "t0".to_string(),
                in_body: true,
            },
            QueryAtom {
                table: "patient".to_string(),
                alias: "t1".to_string(),
                in_body: true,
            },
            QueryAtom {
                table: "patient".to_string(),
                alias: "t2".to_string(),
                in_body: false,
            },
        ],
        equalities: vec![
            Equality {
                left: ColumnRef {
                    atom: 0,
                    column: "patient_id".to_string(),
                },
                right: ColumnRef {
                    atom: 1,
                    column: "id".to_string(),
                },
                in_body: true,
            },
            Equality {
                left: ColumnRef {
                    atom: 1,
                    column: "name".to_string(),
                },
                right: ColumnRef {
                    atom: 2,
                    column: "name".to_string(),
                },
                in_body: false,
            },
        ],
        anchor: 1,
    }
}

#[test]
fn test_schema_introspection() {
    let db = seeded_sqlite();
    assert_eq!(db.list_tables().unwrap(), vec!["lab", "patient"]);

    let columns = db.list_columns("patient").unwrap();
    assert_eq!(columns.len(), 2);
    assert!(columns[0].primary_key);
    assert_eq!(columns[0].name, "id");
    assert!(!columns[1].primary_key);

    assert_eq!(db.row_count("patient").unwrap(), 3);
    assert_eq!(db.distinct_values("patient", "name").unwrap(), 3);
}

#[test]
fn test_foreign_keys_resolve_implicit_primary_key() {
    let db = seeded_sqlite();
    let fks = db.foreign_keys("lab").unwrap();
    assert_eq!(fks.len(), 1);
    assert_eq!(fks[0].column, "patient_id");
    assert_eq!(fks[0].referenced_table, "patient");
    // `REFERENCES patient` without a column resolves to the primary key.
    assert_eq!(fks[0].referenced_column, "id");
}

#[test]
fn test_overlap_ratio_between_columns() {
    let db = seeded_sqlite();
    let ratio = db
        .overlap_ratio("lab", "patient_id", "patient", "id")
        .unwrap();
    assert!((ratio - 1.0).abs() < f64::EPSILON);

    let none = db.overlap_ratio("patient", "name", "patient", "id").unwrap();
    assert_eq!(none, 0.0);
}

#[test]
fn test_missing_objects_are_reported() {
    let db = seeded_sqlite();
    assert!(matches!(
        db.row_count("ghost"),
        Err(InspectorError::MissingTable(_))
    ));
    assert!(matches!(
        db.distinct_values("patient", "ghost"),
        Err(InspectorError::MissingColumn { .. })
    ));
}

#[test]
fn test_match_counts() {
    let db = seeded_sqlite();
    let query = join_query();
    assert_eq!(db.count_body_matches(&query).unwrap(), 3);
    // Every body binding has a witness: the patient row itself.
    assert_eq!(db.count_both_matches(&query).unwrap(), 3);
    assert_eq!(db.count_anchor_matches(&query).unwrap(), 3);
}

#[test]
fn test_backends_agree_on_counts() {
    let sqlite = seeded_sqlite();
    let memory = seeded_memory();
    let query = join_query();

    assert_eq!(
        sqlite.count_body_matches(&query).unwrap(),
        memory.count_body_matches(&query).unwrap()
    );
    assert_eq!(
        sqlite.count_both_matches(&query).unwrap(),
        memory.count_both_matches(&query).unwrap()
    );
    assert_eq!(
        sqlite.count_anchor_matches(&query).unwrap(),
        memory.count_anchor_matches(&query).unwrap()
    );
    assert_eq!(
        sqlite
            .overlap_ratio("lab", "patient_id", "patient", "id")
            .unwrap(),
        memory
            .overlap_ratio("lab", "patient_id", "patient", "id")
            .unwrap()
    );
}

#[test]
fn test_existential_anchor_counts_witness_rows() {
    let db = seeded_sqlite();
    let mut query = join_query();
    // Anchor on the existential patient occurrence instead.
    query.anchor = 2;
    assert_eq!(db.count_anchor_matches(&query).unwrap(), 3);
}
