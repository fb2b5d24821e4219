// tests/property/invariants_test.rs
//
// Property tests over the universal invariants: canonicalization,
// hashing, type classification, and metric ranges on randomized inputs.

use proptest::prelude::*;

use tgdmine::attrs::{AttrId, ColumnType, IndexedAttr, Jia};
use tgdmine::config::{DiscoveryConfig, StrategyKind};
use tgdmine::discovery::DiscoveryContext;
use tgdmine::inspector::{MemoryInspector, Value};
use tgdmine::materialize::compute_hash;
use tgdmine::traverse::CancelToken;

fn ia_strategy() -> impl Strategy<Value = IndexedAttr> {
    (0u32..6, 0u8..3).prop_map(|(attr, occurrence)| IndexedAttr::new(AttrId(attr), occurrence))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_jia_canonical_form_is_order_independent(
        mut members in proptest::collection::vec(ia_strategy(), 1..6),
    ) {
        let original = Jia::new(members.clone());
        members.reverse();
        let reversed = Jia::new(members.clone());
        members.sort();
        let sorted = Jia::new(members);
        prop_assert_eq!(&original, &reversed);
        prop_assert_eq!(&original, &sorted);
    }

    #[test]
    fn prop_compute_hash_is_stable_and_sensitive(
        body in proptest::collection::vec("[a-z]{1,8}", 0..4),
        head in proptest::collection::vec("[a-z]{1,8}", 1..4),
    ) {
        let value = serde_json::json!({"body": body, "head": head});
        let h1 = compute_hash(&value).unwrap();
        let h2 = compute_hash(&value).unwrap();
        prop_assert_eq!(&h1, &h2);
        prop_assert_eq!(h1.len(), 64);

        let mut altered_head = head.clone();
        altered_head.push("extra".to_string());
        let altered = serde_json::json!({"body": body, "head": altered_head});
        prop_assert_ne!(h1, compute_hash(&altered).unwrap());
    }

    #[test]
    fn prop_classify_id_suffix_is_identifier(name in "[a-z]{1,10}_id") {
        prop_assert_eq!(
            ColumnType::classify("INTEGER", &name, false),
            ColumnType::Identifier
        );
    }

    #[test]
    fn prop_classify_is_total(declared in "[A-Za-z0-9() ]{0,16}", name in "[a-z_]{1,12}") {
        // Any declared type and name classify without panicking.
        let _ = ColumnType::classify(&declared, &name, false);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(12))]

    /// Every rule emitted over a randomized two-column table carries
    /// metrics inside [0, 1] and a structural accuracy of 1.
    #[test]
    fn prop_emitted_metrics_stay_in_range(
        rows in proptest::collection::vec((0i64..5, 0i64..5), 5..15),
    ) {
        let mut db = MemoryInspector::new("random");
        db.create_table("r", &[("x", "INTEGER"), ("y", "INTEGER")]);
        db.insert_rows(
            "r",
            rows.into_iter()
                .map(|(x, y)| vec![Value::Int(x), Value::Int(y)])
                .collect(),
        )
        .unwrap();

        let config = DiscoveryConfig::default()
            .with_max_tables(2)
            .with_max_vars(2)
            .with_max_occurrence(2)
            .with_strategy(StrategyKind::Dfs);
        let ctx = DiscoveryContext::initialize(config, &db).unwrap();
        for tgd in ctx.rules(&db, CancelToken::new()).take(200) {
            prop_assert!((0.0..=1.0).contains(&tgd.support));
            prop_assert!((0.0..=1.0).contains(&tgd.confidence));
            prop_assert_eq!(tgd.accuracy, 1.0);
        }
    }
}
