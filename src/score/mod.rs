//! Path pruning and split-level metric evaluation.
//!
//! `path_pruning` is the syntactic gate applied before a rule is yielded;
//! it currently admits every valid rule and exists as an extension point.
//! All data-dependent filtering happens per split point: the evaluator
//! flattens the rule into a [`MatchQuery`], asks the inspector for the
//! three counts, and derives support, confidence, and the structural
//! accuracy gate.
//!
//! Numeric policy: ratios are f64, zero denominators yield 0 (never NaN),
//! and counts beyond exact f64 range cause the rule to be skipped with a
//! warning.

use std::collections::BTreeMap;

use crate::attrs::{AttributeInterner, IndexedAttr, TableOcc};
use crate::config::DiscoveryConfig;
use crate::graph::ConstraintGraph;
use crate::inspector::query::{ColumnRef, Equality, MatchQuery, QueryAtom};
use crate::inspector::{Inspector, InspectorError, InspectorResult};
use crate::rule::CandidateRule;

/// Largest count that is still exactly representable as f64. Anything
/// beyond it is an implausible overflow for these workloads.
const MAX_EXACT_COUNT: u64 = 1 << 53;

/// Metrics of one `(rule, split)` pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SplitMetrics {
    /// Fraction of anchor-table rows participating in a full match.
    pub support: f64,
    /// Conditional probability of the head given the body.
    pub confidence: f64,
    /// Structural validity gate: 1 when every referenced table and column
    /// exists, 0 otherwise. Not a quality score.
    pub accuracy: f64,
}

/// Why a `(rule, split)` evaluation was abandoned.
#[derive(Debug)]
pub enum EvalSkip {
    /// Backend failure that survived one retry.
    Backend(InspectorError),
    /// The rule references schema objects the backend does not know.
    StructurallyInvalid,
    /// A count exceeded exact f64 range.
    Saturated,
}

impl EvalSkip {
    /// Counter key for the run summary.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Backend(_) => "backend_error",
            Self::StructurallyInvalid => "structurally_invalid",
            Self::Saturated => "saturated",
        }
    }
}

/// Evaluates candidate rules against the data.
pub struct MetricEvaluator<'a> {
    inspector: &'a dyn Inspector,
    interner: &'a AttributeInterner,
    config: &'a DiscoveryConfig,
}

impl<'a> MetricEvaluator<'a> {
    pub fn new(
        inspector: &'a dyn Inspector,
        interner: &'a AttributeInterner,
        config: &'a DiscoveryConfig,
    ) -> Self {
        Self {
            inspector,
            interner,
            config,
        }
    }

    /// Path-level gate, called before a rule is yielded.
    ///
    /// Admits every syntactically valid rule: the earlier zero-threshold
    /// prediction filter rejected all partial rules and has been retired in
    /// favor of the split-level thresholds.
    pub fn path_pruning(&self, _rule: &CandidateRule) -> bool {
        true
    }

    /// Whether a split's metrics clear the emission thresholds.
    pub fn passes(&self, metrics: &SplitMetrics) -> bool {
        metrics.accuracy > 0.0
            && metrics.support >= self.config.tau_support
            && metrics.confidence >= self.config.tau_confidence
    }

    /// Evaluate one split point.
    pub fn evaluate(
        &self,
        rule: &CandidateRule,
        split: usize,
        graph: &ConstraintGraph,
    ) -> Result<SplitMetrics, EvalSkip> {
        let query = self.build_query(rule, split, graph);

        let body = self.counted(|| self.inspector.count_body_matches(&query))?;
        let both = self.counted(|| self.inspector.count_both_matches(&query))?;
        let anchor = self.counted(|| self.inspector.count_anchor_matches(&query))?;
        if body > MAX_EXACT_COUNT || both > MAX_EXACT_COUNT || anchor > MAX_EXACT_COUNT {
            tracing::warn!(body, both, anchor, "match count saturated, skipping rule");
            return Err(EvalSkip::Saturated);
        }

        let anchor_table = self.anchor_occurrence(rule, split, graph).table;
        let anchor_rows = self.interner.table_row_count(anchor_table);

        let support = if anchor_rows == 0 {
            0.0
        } else {
            anchor as f64 / anchor_rows as f64
        };
        let confidence = if body == 0 {
            0.0
        } else {
            both as f64 / body as f64
        };

        Ok(SplitMetrics {
            support,
            confidence,
            accuracy: 1.0,
        })
    }

    /// Flatten a rule at a split point into the conjunctive-query IR.
    ///
    /// Atoms are the rule's table occurrences in introduction order; each
    /// JIA contributes a chain of equalities over its members; the anchor
    /// is the occurrence of the first head JIA's first member.
    pub fn build_query(
        &self,
        rule: &CandidateRule,
        split: usize,
        graph: &ConstraintGraph,
    ) -> MatchQuery {
        let order = rule.atom_order();
        let atom_index: BTreeMap<TableOcc, usize> =
            order.iter().enumerate().map(|(i, &occ)| (occ, i)).collect();

        let atoms = order
            .iter()
            .enumerate()
            .map(|(i, occ)| QueryAtom {
                table: self.interner.table_name(occ.table).to_string(),
                alias: format!("t{i}"),
                in_body: rule.introduced()[occ] < split,
            })
            .collect();

        let mut equalities = Vec::new();
        for (position, &node) in rule.nodes().iter().enumerate() {
            let ias = graph.jia(node).ias();
            for pair in ias.windows(2) {
                equalities.push(Equality {
                    left: self.column_ref(pair[0], &atom_index),
                    right: self.column_ref(pair[1], &atom_index),
                    in_body: position < split,
                });
            }
        }

        let anchor = atom_index[&self.anchor_occurrence(rule, split, graph)];

        MatchQuery {
            atoms,
            equalities,
            anchor,
        }
    }

    /// The anchor: the table occurrence of the first head JIA's first
    /// member. Fixed for a whole run so support values stay comparable.
    fn anchor_occurrence(
        &self,
        rule: &CandidateRule,
        split: usize,
        graph: &ConstraintGraph,
    ) -> TableOcc {
        let first = graph.jia(rule.nodes()[split]).first();
        TableOcc {
            table: self.interner.attr(first.attr).table,
            occurrence: first.occurrence,
        }
    }

    fn column_ref(&self, ia: IndexedAttr, atom_index: &BTreeMap<TableOcc, usize>) -> ColumnRef {
        let attr = self.interner.attr(ia.attr);
        let occ = TableOcc {
            table: attr.table,
            occurrence: ia.occurrence,
        };
        ColumnRef {
            atom: atom_index[&occ],
            column: attr.column.clone(),
        }
    }

    /// Run a count with one retry for transient backend failures. Schema
    /// misses become structural-invalidity skips without a retry.
    fn counted(&self, run: impl Fn() -> InspectorResult<u64>) -> Result<u64, EvalSkip> {
        match run() {
            Ok(n) => Ok(n),
            Err(InspectorError::MissingTable(table)) => {
                tracing::debug!(%table, "rule references unknown table");
                Err(EvalSkip::StructurallyInvalid)
            }
            Err(InspectorError::MissingColumn { table, column }) => {
                tracing::debug!(%table, %column, "rule references unknown column");
                Err(EvalSkip::StructurallyInvalid)
            }
            Err(err) => {
                tracing::debug!(error = %err, "count failed, retrying once");
                run().map_err(EvalSkip::Backend)
            }
        }
    }
}
