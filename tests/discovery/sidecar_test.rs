// tests/discovery/sidecar_test.rs
use tgdmine::config::DiscoveryConfig;
use tgdmine::discovery::DiscoveryContext;
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

#[test]
fn test_side_files_are_written_to_the_results_dir() {
    let db = clinic();
    let dir = tempfile::tempdir().unwrap();
    let config = DiscoveryConfig::default()
        .with_max_tables(2)
        .with_max_vars(2)
        .with_results_dir(dir.path());
    let ctx = DiscoveryContext::initialize(config, &db).unwrap();
    ctx.write_side_files().unwrap();

    let compat: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(dir.path().join("compatibility_clinic.json")).unwrap(),
    )
    .unwrap();
    let map = compat.as_object().unwrap();
    assert!(map.keys().all(|k| k.contains("___sep___")));
    assert!(map
        .get("lab___sep___patient_id")
        .and_then(|v| v.as_array())
        .is_some_and(|partners| !partners.is_empty()));

    let metrics: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(dir.path().join("cg_metrics_clinic.json")).unwrap(),
    )
    .unwrap();
    for field in ["nodes", "edges", "roots"] {
        assert!(metrics[field].as_u64().unwrap() > 0);
    }

    let timings: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(dir.path().join("init_time_metrics_clinic.json")).unwrap(),
    )
    .unwrap();
    for field in [
        "time_compute_compatible",
        "time_to_compute_indexed",
        "time_building_cg",
    ] {
        assert!(timings[field].as_f64().unwrap() >= 0.0);
    }
}

#[test]
fn test_missing_results_dir_silently_skips_side_files() {
    let db = clinic();
    let config = DiscoveryConfig::default().with_max_tables(2).with_max_vars(2);
    assert!(config.results_dir.is_none());
    let ctx = DiscoveryContext::initialize(config, &db).unwrap();
    // A run without a results path must not touch the filesystem, let
    // alone crash the discovery.
    ctx.write_side_files().unwrap();
}

#[test]
fn test_empty_results_path_is_treated_as_absent() {
    let db = clinic();
    let config = DiscoveryConfig::default()
        .with_max_tables(2)
        .with_max_vars(2)
        .with_results_dir("");
    let ctx = DiscoveryContext::initialize(config, &db).unwrap();
    ctx.write_side_files().unwrap();
    assert!(!std::path::Path::new("compatibility_clinic.json").exists());
}
