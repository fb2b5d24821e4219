// tests/score/metrics_test.rs
use tgdmine::attrs::{AttributeInterner, IndexedAttr, Jia};
use tgdmine::compat::CompatibilityAnalyzer;
use tgdmine::config::DiscoveryConfig;
use tgdmine::discovery::DiscoveryContext;
use tgdmine::graph::{ConstraintGraph, ConstraintGraphBuilder};
use tgdmine::inspector::{MemoryInspector, Value};
use tgdmine::rule::CandidateRule;
use tgdmine::score::MetricEvaluator;
use tgdmine::traverse::CancelToken;

fn clinic(lab_rows: Vec<Vec<Value>>) -> MemoryInspector {
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
    db.insert_rows("lab", lab_rows).unwrap();
    db
}

fn matching_labs() -> Vec<Vec<Value>> {
    vec![
        vec![Value::Int(1), Value::Int(70)],
        vec![Value::Int(2), Value::Int(81)],
        vec![Value::Int(3), Value::Int(92)],
    ]
}

fn dangling_labs() -> Vec<Vec<Value>> {
    vec![
        vec![Value::Int(7), Value::Int(70)],
        vec![Value::Int(8), Value::Int(81)],
        vec![Value::Int(9), Value::Int(92)],
    ]
}

struct Fixture {
    interner: AttributeInterner,
    graph: ConstraintGraph,
    config: DiscoveryConfig,
}

fn fixture(db: &MemoryInspector) -> Fixture {
    let config = DiscoveryConfig::default().with_max_tables(2).with_max_vars(2);
    let interner = AttributeInterner::from_inspector(db).unwrap();
    let compat = CompatibilityAnalyzer::new(db, &interner, &config)
        .analyze()
        .unwrap();
    let builder = ConstraintGraphBuilder::new(&interner, &compat, &config);
    let universe = builder.enumerate_jias();
    let graph = builder.build(&universe).unwrap();
    Fixture {
        interner,
        graph,
        config,
    }
}

/// The FK rule: body joins lab.patient_id with patient.id, head asserts
/// the patient has a name.
fn fk_rule(f: &Fixture) -> CandidateRule {
    let join = f
        .graph
        .node_of(&Jia::new(vec![
            IndexedAttr::new(f.interner.id_of("patient", "id").unwrap(), 0),
            IndexedAttr::new(f.interner.id_of("lab", "patient_id").unwrap(), 0),
        ]))
        .unwrap();
    let name = f
        .graph
        .node_of(&Jia::singleton(IndexedAttr::new(
            f.interner.id_of("patient", "name").unwrap(),
            0,
        )))
        .unwrap();
    CandidateRule::root(&f.graph, &f.interner, join).extended(&f.graph, &f.interner, name)
}

#[test]
fn test_fk_rule_scores_perfectly_on_matching_data() {
    let db = clinic(matching_labs());
    let f = fixture(&db);
    let evaluator = MetricEvaluator::new(&db, &f.interner, &f.config);

    let rule = fk_rule(&f);
    let metrics = evaluator.evaluate(&rule, 1, &f.graph).unwrap();
    assert_eq!(metrics.confidence, 1.0);
    assert_eq!(metrics.support, 1.0);
    assert_eq!(metrics.accuracy, 1.0);
    assert!(evaluator.passes(&metrics));
}

#[test]
fn test_empty_body_yields_zero_not_nan() {
    // The foreign key is declared but no lab row resolves, so the body
    // join is empty.
    let db = clinic(dangling_labs());
    let f = fixture(&db);
    let evaluator = MetricEvaluator::new(&db, &f.interner, &f.config);

    let rule = fk_rule(&f);
    let metrics = evaluator.evaluate(&rule, 1, &f.graph).unwrap();
    assert_eq!(metrics.confidence, 0.0);
    assert_eq!(metrics.support, 0.0);
    assert!(!metrics.confidence.is_nan());
    assert!(!evaluator.passes(&metrics));
}

#[test]
fn test_path_pruning_admits_valid_rules() {
    let db = clinic(matching_labs());
    let f = fixture(&db);
    let evaluator = MetricEvaluator::new(&db, &f.interner, &f.config);
    assert!(evaluator.path_pruning(&fk_rule(&f)));
}

#[test]
fn test_all_emitted_metrics_stay_in_range() {
    let db = clinic(matching_labs());
    let config = DiscoveryConfig::default().with_max_tables(2).with_max_vars(2);
    let ctx = DiscoveryContext::initialize(config, &db).unwrap();
    let stream = ctx.rules(&db, CancelToken::new());
    let mut count = 0;
    for tgd in stream {
        assert!((0.0..=1.0).contains(&tgd.support), "support out of range");
        assert!(
            (0.0..=1.0).contains(&tgd.confidence),
            "confidence out of range"
        );
        assert_eq!(tgd.accuracy, 1.0);
        count += 1;
    }
    assert!(count > 0);
}

#[test]
fn test_match_query_flattens_rule_shape() {
    let db = clinic(matching_labs());
    let f = fixture(&db);
    let evaluator = MetricEvaluator::new(&db, &f.interner, &f.config);

    let rule = fk_rule(&f);
    let query = evaluator.build_query(&rule, 1, &f.graph);
    assert_eq!(query.atoms.len(), 2);
    assert!(query.atoms.iter().all(|a| a.in_body));
    assert_eq!(query.body_equalities().count(), 1);
    assert_eq!(query.head_equalities().count(), 0);
    // The anchor is the first head JIA's occurrence: patient.
    assert_eq!(query.atoms[query.anchor].table, "patient");
}
