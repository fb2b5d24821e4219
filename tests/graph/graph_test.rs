// tests/graph/graph_test.rs
use tgdmine::attrs::{AttributeInterner, IndexedAttr, Jia};
use tgdmine::compat::{CompatibilityAnalyzer, CompatibilityRelation};
use tgdmine::config::DiscoveryConfig;
use tgdmine::graph::{ConstraintGraph, ConstraintGraphBuilder, GraphBuildError};
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

fn build(
    db: &MemoryInspector,
    config: &DiscoveryConfig,
) -> (
    AttributeInterner,
    CompatibilityRelation,
    Result<ConstraintGraph, GraphBuildError>,
) {
    let interner = AttributeInterner::from_inspector(db).unwrap();
    let compat = CompatibilityAnalyzer::new(db, &interner, config)
        .analyze()
        .unwrap();
    let builder = ConstraintGraphBuilder::new(&interner, &compat, config);
    let universe = builder.enumerate_jias();
    let graph = builder.build(&universe);
    (interner, compat, graph)
}

fn jia(interner: &AttributeInterner, members: &[(&str, &str, u8)]) -> Jia {
    Jia::new(
        members
            .iter()
            .map(|(table, column, occurrence)| {
                IndexedAttr::new(interner.id_of(table, column).unwrap(), *occurrence)
            })
            .collect(),
    )
}

#[test]
fn test_universe_contains_join_jia_and_singletons() {
    let db = clinic();
    let config = DiscoveryConfig::default().with_max_tables(2).with_max_vars(2);
    let (interner, _, graph) = build(&db, &config);
    let graph = graph.unwrap();

    let fk_join = jia(
        &interner,
        &[("patient", "id", 0), ("lab", "patient_id", 0)],
    );
    assert!(graph.node_of(&fk_join).is_some());

    let name_singleton = jia(&interner, &[("patient", "name", 0)]);
    assert!(graph.node_of(&name_singleton).is_some());
}

#[test]
fn test_roots_are_join_jias_with_prefix_occurrences() {
    let db = clinic();
    let config = DiscoveryConfig::default().with_max_tables(2).with_max_vars(2);
    let (interner, _, graph) = build(&db, &config);
    let graph = graph.unwrap();

    let fk_join = jia(
        &interner,
        &[("patient", "id", 0), ("lab", "patient_id", 0)],
    );
    let fk_node = graph.node_of(&fk_join).unwrap();
    assert!(graph.roots().contains(&fk_node));

    // A join whose lab occurrence starts at 1 cannot open a rule.
    let gapped = jia(
        &interner,
        &[("patient", "id", 0), ("lab", "patient_id", 1)],
    );
    if let Some(node) = graph.node_of(&gapped) {
        assert!(!graph.roots().contains(&node));
    }

    // Singletons are never roots.
    let name_singleton = jia(&interner, &[("patient", "name", 0)]);
    let node = graph.node_of(&name_singleton).unwrap();
    assert!(!graph.roots().contains(&node));
}

#[test]
fn test_edges_respect_disjointness_and_occupancy() {
    let db = clinic();
    let config = DiscoveryConfig::default().with_max_tables(2).with_max_vars(2);
    let (interner, _, graph) = build(&db, &config);
    let graph = graph.unwrap();

    let fk_join = jia(
        &interner,
        &[("patient", "id", 0), ("lab", "patient_id", 0)],
    );
    let fk_node = graph.node_of(&fk_join).unwrap();
    let name_singleton = jia(&interner, &[("patient", "name", 0)]);
    let name_node = graph.node_of(&name_singleton).unwrap();
    assert!(graph.has_edge(fk_node, name_node));

    // Sharing an indexed attribute forbids the edge.
    let id_singleton = jia(&interner, &[("patient", "id", 0)]);
    let id_node = graph.node_of(&id_singleton).unwrap();
    assert!(!graph.has_edge(fk_node, id_node));

    // A second patient occurrence would exceed max_tables = 2 here.
    let second_name = jia(&interner, &[("patient", "name", 1)]);
    if let Some(node) = graph.node_of(&second_name) {
        assert!(!graph.has_edge(fk_node, node));
    }
}

#[test]
fn test_metrics_report_counts() {
    let db = clinic();
    let config = DiscoveryConfig::default().with_max_tables(2).with_max_vars(2);
    let (_, _, graph) = build(&db, &config);
    let graph = graph.unwrap();
    let metrics = graph.metrics();
    assert_eq!(metrics.nodes, graph.node_count());
    assert_eq!(metrics.edges, graph.edge_count());
    assert_eq!(metrics.roots, graph.roots().len());
    assert!(metrics.nodes > 0);
    assert!(metrics.roots > 0);
}

#[test]
fn test_disjoint_domains_build_empty_graph() {
    let mut db = MemoryInspector::new("disjoint");
    db.create_table("colors", &[("name", "TEXT")]);
    db.create_table("sizes", &[("label", "TEXT")]);
    db.insert_rows(
        "colors",
        vec![
            vec![Value::text("red")],
            vec![Value::text("green")],
            vec![Value::text("blue")],
        ],
    )
    .unwrap();
    db.insert_rows(
        "sizes",
        vec![
            vec![Value::text("small")],
            vec![Value::text("medium")],
            vec![Value::text("large")],
        ],
    )
    .unwrap();

    let config = DiscoveryConfig::default();
    let (_, _, graph) = build(&db, &config);
    assert!(matches!(graph, Err(GraphBuildError::GraphEmpty)));
}

#[test]
fn test_occurrence_limit_caps_indexed_attributes() {
    let mut db = MemoryInspector::new("social");
    db.create_table("knows", &[("a", "TEXT"), ("b", "TEXT")]);
    db.insert_rows(
        "knows",
        (0..8)
            .map(|i| vec![Value::text(format!("p{i}")), Value::text(format!("p{}", (i + 1) % 8))])
            .collect(),
    )
    .unwrap();

    let config = DiscoveryConfig::default().with_max_occurrence(2);
    let interner = AttributeInterner::from_inspector(&db).unwrap();
    let compat = CompatibilityAnalyzer::new(&db, &interner, &config)
        .analyze()
        .unwrap();
    let builder = ConstraintGraphBuilder::new(&interner, &compat, &config);
    let universe = builder.enumerate_jias();
    for jia in universe.iter() {
        for ia in jia.ias() {
            assert!(ia.occurrence < 2, "occurrence index beyond the limit");
        }
    }
}
