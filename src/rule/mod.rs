//! Candidate rules and the validity checks on them.
//!
//! A candidate rule is an ordered JIA sequence forming a path through the
//! constraint graph. Rules are built incrementally on the traversal
//! frontier; each extension carries forward the covered-attribute set and
//! the table-occurrence bookkeeping so the validator checks stay cheap.
//!
//! A split point `s` partitions the sequence into body `[0, s)` and head
//! `[s, len)`. Table occurrences first introduced by a head JIA are
//! existentially quantified.

use std::collections::{BTreeMap, BTreeSet};

use petgraph::graph::NodeIndex;

use crate::attrs::{AttributeInterner, IndexedAttr, TableOcc};
use crate::config::DiscoveryConfig;
use crate::graph::ConstraintGraph;

/// An ordered sequence of JIAs with incremental bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateRule {
    nodes: Vec<NodeIndex>,
    covered: BTreeSet<IndexedAttr>,
    /// First-introduction position of every table occurrence.
    introduced: BTreeMap<TableOcc, usize>,
}

impl CandidateRule {
    /// Start a rule at a root JIA.
    pub fn root(graph: &ConstraintGraph, interner: &AttributeInterner, node: NodeIndex) -> Self {
        let jia = graph.jia(node);
        let covered = jia.ias().iter().copied().collect();
        let introduced = jia.occurrences(interner).into_iter().map(|o| (o, 0)).collect();
        Self {
            nodes: vec![node],
            covered,
            introduced,
        }
    }

    /// Append a JIA, carrying the bookkeeping forward.
    pub fn extended(
        &self,
        graph: &ConstraintGraph,
        interner: &AttributeInterner,
        node: NodeIndex,
    ) -> Self {
        let mut next = self.clone();
        let position = next.nodes.len();
        let jia = graph.jia(node);
        next.nodes.push(node);
        next.covered.extend(jia.ias().iter().copied());
        for occ in jia.occurrences(interner) {
            next.introduced.entry(occ).or_insert(position);
        }
        next
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> &[NodeIndex] {
        &self.nodes
    }

    pub fn last(&self) -> NodeIndex {
        *self.nodes.last().expect("a rule is never empty")
    }

    /// A rule becomes a candidate for emission once it has a body and a
    /// head to split between.
    pub fn is_candidate(&self) -> bool {
        self.nodes.len() >= 2
    }

    pub fn covered(&self) -> &BTreeSet<IndexedAttr> {
        &self.covered
    }

    /// Distinct table occurrences, with their introduction positions.
    pub fn introduced(&self) -> &BTreeMap<TableOcc, usize> {
        &self.introduced
    }

    pub fn occurrence_count(&self) -> usize {
        self.introduced.len()
    }

    /// Table occurrences in evaluation order: by introduction position,
    /// then by `(table, occurrence)`. The scorer and the materializer both
    /// derive their atom numbering from this.
    pub fn atom_order(&self) -> Vec<TableOcc> {
        let mut occs: Vec<(usize, TableOcc)> = self
            .introduced
            .iter()
            .map(|(&occ, &pos)| (pos, occ))
            .collect();
        occs.sort_unstable();
        occs.into_iter().map(|(_, occ)| occ).collect()
    }

    /// Valid split points: every index that leaves a non-empty body and a
    /// non-empty head.
    pub fn splits(&self) -> std::ops::Range<usize> {
        1..self.nodes.len().max(1)
    }
}

/// Pure validity checks over (partial) rules.
///
/// `next_node_test` gates every traversal step; the three named checks are
/// also exported on their own so emitted rules can be re-verified.
pub struct RuleValidator<'a> {
    graph: &'a ConstraintGraph,
    interner: &'a AttributeInterner,
    config: &'a DiscoveryConfig,
}

impl<'a> RuleValidator<'a> {
    pub fn new(
        graph: &'a ConstraintGraph,
        interner: &'a AttributeInterner,
        config: &'a DiscoveryConfig,
    ) -> Self {
        Self {
            graph,
            interner,
            config,
        }
    }

    /// Every JIA contributes at least one indexed attribute that no prefix
    /// of the rule already covered. Rules failing this are equivalent to a
    /// shorter one and are discarded.
    pub fn check_minimal(&self, rule: &CandidateRule) -> bool {
        let mut covered: BTreeSet<IndexedAttr> = BTreeSet::new();
        for &node in rule.nodes() {
            let jia = self.graph.jia(node);
            let fresh = jia.ias().iter().any(|ia| !covered.contains(ia));
            if !fresh {
                return false;
            }
            covered.extend(jia.ias().iter().copied());
        }
        true
    }

    /// For each table, the occurrence indices used must be exactly
    /// `{0, …, k}`: no gaps, no index at or above the occurrence limit.
    pub fn check_table_occurrences(&self, rule: &CandidateRule) -> bool {
        let limit = self.config.occurrence_limit() as u8;
        let mut per_table: BTreeMap<_, BTreeSet<u8>> = BTreeMap::new();
        for occ in rule.introduced().keys() {
            if occ.occurrence >= limit {
                return false;
            }
            per_table.entry(occ.table).or_default().insert(occ.occurrence);
        }
        per_table
            .values()
            .all(|indices| indices.iter().copied().eq(0..indices.len() as u8))
    }

    /// Variable and table-occurrence limits.
    pub fn check_limits(&self, rule: &CandidateRule) -> bool {
        rule.len() <= self.config.max_vars && rule.occurrence_count() <= self.config.max_tables
    }

    /// Whether `node` may be appended to `rule`: the node must be reachable
    /// from the rule's frontier in the constraint graph, must not repeat a
    /// covered indexed attribute, and the extended rule must pass all three
    /// checks.
    pub fn next_node_test(&self, rule: &CandidateRule, node: NodeIndex) -> bool {
        if !self.graph.has_edge(rule.last(), node) {
            return false;
        }
        let jia = self.graph.jia(node);
        if jia.ias().iter().any(|ia| rule.covered().contains(ia)) {
            return false;
        }
        let extended = rule.extended(self.graph, self.interner, node);
        self.check_minimal(&extended)
            && self.check_table_occurrences(&extended)
            && self.check_limits(&extended)
    }
}
