// tests/compat/compat_test.rs
use tgdmine::attrs::AttributeInterner;
use tgdmine::compat::CompatibilityAnalyzer;
use tgdmine::config::DiscoveryConfig;
use tgdmine::inspector::{MemoryInspector, Value};

fn clinic() -> MemoryInspector {
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

fn analyze(
    db: &MemoryInspector,
    config: &DiscoveryConfig,
) -> (AttributeInterner, tgdmine::compat::CompatibilityRelation) {
    let interner = AttributeInterner::from_inspector(db).unwrap();
    let relation = CompatibilityAnalyzer::new(db, &interner, config)
        .analyze()
        .unwrap();
    (interner, relation)
}

#[test]
fn test_foreign_key_pair_is_compatible() {
    let db = clinic();
    let (interner, relation) = analyze(&db, &DiscoveryConfig::default());
    let id = interner.id_of("patient", "id").unwrap();
    let patient_id = interner.id_of("lab", "patient_id").unwrap();
    assert!(relation.compatible(id, patient_id));
}

#[test]
fn test_overlap_pair_is_compatible_without_foreign_key() {
    let mut db = MemoryInspector::new("social");
    db.create_table("knows", &[("a", "TEXT"), ("b", "TEXT")]);
    let rows: Vec<Vec<Value>> = (0..10)
        .map(|i| vec![Value::text(format!("p{i}")), Value::text(format!("p{}", (i + 1) % 10))])
        .collect();
    db.insert_rows("knows", rows).unwrap();

    let (interner, relation) = analyze(&db, &DiscoveryConfig::default());
    let a = interner.id_of("knows", "a").unwrap();
    let b = interner.id_of("knows", "b").unwrap();
    assert!(relation.compatible(a, b));
}

#[test]
fn test_type_classes_must_agree() {
    let db = clinic();
    let (interner, relation) = analyze(&db, &DiscoveryConfig::default());
    // Identifier vs numeric: same underlying integers would overlap, but
    // the coarse classes differ.
    let id = interner.id_of("patient", "id").unwrap();
    let value = interner.id_of("lab", "value").unwrap();
    assert!(!relation.compatible(id, value));
}

#[test]
fn test_low_overlap_is_incompatible() {
    let mut db = MemoryInspector::new("low");
    db.create_table("left", &[("x", "TEXT")]);
    db.create_table("right", &[("y", "TEXT")]);
    // 2 of 10 values shared: ratio 0.2 < 0.5.
    db.insert_rows(
        "left",
        (0..10).map(|i| vec![Value::text(format!("l{i}"))]).collect(),
    )
    .unwrap();
    let mut right_rows: Vec<Vec<Value>> =
        (0..8).map(|i| vec![Value::text(format!("r{i}"))]).collect();
    right_rows.push(vec![Value::text("l0")]);
    right_rows.push(vec![Value::text("l1")]);
    db.insert_rows("right", right_rows).unwrap();

    let (interner, relation) = analyze(&db, &DiscoveryConfig::default());
    let x = interner.id_of("left", "x").unwrap();
    let y = interner.id_of("right", "y").unwrap();
    assert!(!relation.compatible(x, y));
}

#[test]
fn test_overlap_floor_rejects_tiny_cardinality() {
    let mut db = MemoryInspector::new("tiny");
    db.create_table("left", &[("x", "TEXT")]);
    db.create_table("right", &[("y", "TEXT")]);
    // Perfect ratio but only two common values: below the floor of 3.
    db.insert_rows(
        "left",
        vec![vec![Value::text("a")], vec![Value::text("b")]],
    )
    .unwrap();
    db.insert_rows(
        "right",
        vec![vec![Value::text("a")], vec![Value::text("b")]],
    )
    .unwrap();

    let (interner, relation) = analyze(&db, &DiscoveryConfig::default());
    let x = interner.id_of("left", "x").unwrap();
    let y = interner.id_of("right", "y").unwrap();
    assert!(!relation.compatible(x, y));
}

#[test]
fn test_relation_is_symmetric() {
    let db = clinic();
    let (interner, relation) = analyze(&db, &DiscoveryConfig::default());
    for (a, _) in interner.iter() {
        for (b, _) in interner.iter() {
            assert_eq!(
                relation.compatible(a, b),
                relation.compatible(b, a),
                "compatibility must be symmetric"
            );
        }
    }
}

#[test]
fn test_empty_attribute_is_compatible_with_nothing() {
    let mut db = clinic();
    db.create_table("empty", &[("patient_id", "INTEGER")]);
    db.add_foreign_key("empty", "patient_id", "patient", "id").unwrap();

    let (interner, relation) = analyze(&db, &DiscoveryConfig::default());
    let empty = interner.id_of("empty", "patient_id").unwrap();
    for (other, _) in interner.iter() {
        assert!(!relation.compatible(empty, other));
    }
}

#[test]
fn test_self_compatibility_requires_an_evidenced_partner() {
    // knows.a has a partner (knows.b), so it may join another occurrence
    // of itself; an isolated column may not.
    let mut db = MemoryInspector::new("mixed");
    db.create_table("knows", &[("a", "TEXT"), ("b", "TEXT")]);
    db.insert_rows(
        "knows",
        (0..8)
            .map(|i| vec![Value::text(format!("p{i}")), Value::text(format!("p{}", (i + 1) % 8))])
            .collect(),
    )
    .unwrap();
    db.create_table("colors", &[("name", "TEXT")]);
    db.insert_rows(
        "colors",
        vec![
            vec![Value::text("red")],
            vec![Value::text("green")],
            vec![Value::text("blue")],
        ],
    )
    .unwrap();

    let (interner, relation) = analyze(&db, &DiscoveryConfig::default());
    let a = interner.id_of("knows", "a").unwrap();
    let color = interner.id_of("colors", "name").unwrap();
    assert!(relation.compatible(a, a));
    assert!(!relation.compatible(color, color));
}

#[test]
fn test_json_export_uses_attribute_keys() {
    let db = clinic();
    let (interner, relation) = analyze(&db, &DiscoveryConfig::default());
    let json = relation.to_json(&interner);
    let map = json.as_object().unwrap();
    assert!(map.contains_key("lab___sep___patient_id"));
    let partners = map["lab___sep___patient_id"].as_array().unwrap();
    assert!(partners
        .iter()
        .any(|v| v.as_str() == Some("patient___sep___id")));
}
