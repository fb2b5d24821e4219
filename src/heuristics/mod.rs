//! Scoring functions for best-first traversal.
//!
//! Each heuristic maps a partial rule to a non-negative cost; lower is
//! more promising. The evaluator is created once per run and reads the
//! per-table statistics (row counts, distinct counts) the interner cached
//! at startup, so no inspector round-trips happen during traversal.

use crate::attrs::AttributeInterner;
use crate::config::{DiscoveryConfig, HeuristicKind, HybridWeights};
use crate::graph::ConstraintGraph;
use crate::rule::CandidateRule;

/// A configured heuristic, ready to score partial rules.
pub struct HeuristicEval<'a> {
    kind: HeuristicKind,
    weights: HybridWeights,
    interner: &'a AttributeInterner,
}

impl<'a> HeuristicEval<'a> {
    pub fn new(config: &DiscoveryConfig, interner: &'a AttributeInterner) -> Self {
        Self {
            kind: config.heuristic,
            weights: config.hybrid_weights,
            interner,
        }
    }

    pub fn kind(&self) -> HeuristicKind {
        self.kind
    }

    /// Cost of a partial rule under the configured heuristic.
    pub fn cost(&self, rule: &CandidateRule, graph: &ConstraintGraph) -> f64 {
        match self.kind {
            HeuristicKind::Naive => self.naive(rule),
            HeuristicKind::TableSize => self.table_size(rule),
            HeuristicKind::JoinSelectivity => self.join_selectivity(rule, graph),
            HeuristicKind::Hybrid => {
                let w = self.weights;
                w.naive * self.naive(rule)
                    + w.table_size * self.table_size(rule)
                    + w.join_selectivity * self.join_selectivity(rule, graph)
            }
        }
    }

    /// Number of JIAs so far. Prefers short rules.
    fn naive(&self, rule: &CandidateRule) -> f64 {
        rule.len() as f64
    }

    /// `Σ log(1 + row_count(t))` over the distinct tables in the rule.
    /// Prefers small tables (cheaper joins).
    fn table_size(&self, rule: &CandidateRule) -> f64 {
        let tables: std::collections::BTreeSet<_> =
            rule.introduced().keys().map(|occ| occ.table).collect();
        tables
            .iter()
            .map(|&t| (1.0 + self.interner.table_row_count(t) as f64).ln())
            .sum()
    }

    /// Log of the estimated match-set cardinality: the product of the
    /// occurrence row counts and one selectivity factor
    /// `1 / max(distinct(A), distinct(B))` per unified attribute pair.
    /// Prefers selective joins.
    fn join_selectivity(&self, rule: &CandidateRule, graph: &ConstraintGraph) -> f64 {
        let mut log_estimate: f64 = rule
            .introduced()
            .keys()
            .map(|occ| (1.0 + self.interner.table_row_count(occ.table) as f64).ln())
            .sum();
        for &node in rule.nodes() {
            let ias = graph.jia(node).ias();
            for pair in ias.windows(2) {
                let left = self.interner.attr(pair[0].attr).distinct_count;
                let right = self.interner.attr(pair[1].attr).distinct_count;
                let denom = left.max(right).max(1) as f64;
                log_estimate -= denom.ln();
            }
        }
        log_estimate.max(0.0)
    }
}
