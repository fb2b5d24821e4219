//! Rule materialization: accepted paths become TGD records.
//!
//! A [`TgdRule`] carries the body/head predicate lists, a canonical display
//! string, the three metric values, and a stable content hash used for
//! deduplication within and across runs.
//!
//! Predicate strings follow the
//! `Predicate(variable1='T0', relation='<table>___sep___<column>', variable2='V0')`
//! form: `variable1` is the row variable of the table occurrence,
//! `variable2` the value variable of the JIA.

use std::collections::BTreeMap;

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::attrs::{AttributeInterner, IndexedAttr, TableOcc};
use crate::graph::ConstraintGraph;
use crate::rule::CandidateRule;
use crate::score::SplitMetrics;

/// Compute the SHA256 hash of a serializable value.
///
/// The value is serialized to JSON first, so equal values hash equally.
/// Returns a 64-character lowercase hexadecimal string.
pub fn compute_hash<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let json = serde_json::to_string(value)?;
    let mut hasher = Sha256::new();
    hasher.update(json.as_bytes());
    Ok(format!("{:x}", hasher.finalize()))
}

/// One emitted TGD with its metric annotations.
#[derive(Debug, Clone, Serialize)]
pub struct TgdRule {
    #[serde(rename = "type")]
    pub record_type: &'static str,
    pub body: Vec<String>,
    pub head: Vec<String>,
    pub display: String,
    pub accuracy: f64,
    pub confidence: f64,
    pub support: f64,
    /// Stable content hash over the canonical (body, head) JIA sets.
    #[serde(skip)]
    pub hash: String,
}

/// Canonical form hashed for deduplication: the sorted JIA keys of each
/// side of the split.
#[derive(Serialize)]
struct DedupKey {
    body: Vec<String>,
    head: Vec<String>,
}

/// Converts accepted `(rule, split)` pairs into TGD records.
pub struct Materializer<'a> {
    interner: &'a AttributeInterner,
}

impl<'a> Materializer<'a> {
    pub fn new(interner: &'a AttributeInterner) -> Self {
        Self { interner }
    }

    pub fn materialize(
        &self,
        rule: &CandidateRule,
        split: usize,
        graph: &ConstraintGraph,
        metrics: &SplitMetrics,
    ) -> TgdRule {
        let order = rule.atom_order();
        let atom_index: BTreeMap<TableOcc, usize> =
            order.iter().enumerate().map(|(i, &occ)| (occ, i)).collect();

        let mut body = Vec::new();
        let mut head = Vec::new();
        for (position, &node) in rule.nodes().iter().enumerate() {
            let side = if position < split { &mut body } else { &mut head };
            for &ia in graph.jia(node).ias() {
                side.push(self.predicate(ia, position, &atom_index));
            }
        }

        let display = format!("{} :- {}", head.join(", "), body.join(", "));
        let hash = self.dedup_hash(rule, split, graph);

        TgdRule {
            record_type: "TGDRule",
            body,
            head,
            display,
            accuracy: metrics.accuracy,
            confidence: metrics.confidence,
            support: metrics.support,
            hash,
        }
    }

    fn predicate(
        &self,
        ia: IndexedAttr,
        jia_position: usize,
        atom_index: &BTreeMap<TableOcc, usize>,
    ) -> String {
        let attr = self.interner.attr(ia.attr);
        let occ = TableOcc {
            table: attr.table,
            occurrence: ia.occurrence,
        };
        format!(
            "Predicate(variable1='T{}', relation='{}', variable2='V{}')",
            atom_index[&occ],
            self.interner.key(ia.attr),
            jia_position
        )
    }

    /// Deduplication key: the canonicalized (sorted) JIA sets of body and
    /// head. Materializing the same `(rule, split)` twice always produces
    /// the same hash.
    fn dedup_hash(&self, rule: &CandidateRule, split: usize, graph: &ConstraintGraph) -> String {
        let jia_key = |node: petgraph::graph::NodeIndex| {
            graph
                .jia(node)
                .ias()
                .iter()
                .map(|ia| format!("{}#{}", self.interner.key(ia.attr), ia.occurrence))
                .collect::<Vec<_>>()
                .join("+")
        };
        let mut key = DedupKey {
            body: rule.nodes()[..split].iter().map(|&n| jia_key(n)).collect(),
            head: rule.nodes()[split..].iter().map(|&n| jia_key(n)).collect(),
        };
        key.body.sort_unstable();
        key.head.sort_unstable();
        // Serialization of a string map cannot fail.
        compute_hash(&key).unwrap_or_default()
    }
}
