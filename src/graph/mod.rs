//! The constraint graph over JIAs.
//!
//! Nodes are JIAs; an edge `J → J'` means `J'` is a legal next JIA to
//! append after `J` in some candidate rule. The graph is finite, built once
//! per input, and read-only during traversal. Every valid candidate rule is
//! a path starting at a root node.
//!
//! Construction runs in three passes:
//!
//! 1. **JIA enumeration**: every clique of the indexed-attribute
//!    compatibility graph that fits within `max_occurrence` occurrences per
//!    table and `max_tables` occurrences total, plus every singleton JIA
//!    (free and existential variables). Restricting to maximal cliques
//!    would be more compact but makes rules built from several smaller
//!    JIAs unreachable, so sub-cliques are materialized too.
//! 2. **Root marking**: a JIA is a root iff it expresses a join (two or
//!    more members) and is a valid rule prefix on its own (per-table
//!    occurrence indices `{0, …, k}`).
//! 3. **Edge insertion**: `J → J'` iff the JIAs share no indexed
//!    attribute and their occurrence union can still grow into a rule
//!    within the `max_tables` bound. Edges are not symmetric. Candidate
//!    pairs are found through occupancy buckets, so only pairs whose
//!    occurrence sets can coexist are ever examined.

use std::collections::{BTreeMap, HashMap};

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use serde::Serialize;

use crate::attrs::{AttributeInterner, IndexedAttr, Jia, TableOcc};
use crate::compat::CompatibilityRelation;
use crate::config::DiscoveryConfig;

/// Result type for graph construction.
pub type GraphBuildResult<T> = Result<T, GraphBuildError>;

/// Errors from constraint-graph construction.
#[derive(Debug, thiserror::Error)]
pub enum GraphBuildError {
    /// No root JIAs exist; discovery reports "no candidates".
    #[error("constraint graph has no root nodes")]
    GraphEmpty,
}

/// Size summary written to the `cg_metrics_<db>.json` side file.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct GraphMetrics {
    pub nodes: usize,
    pub edges: usize,
    pub roots: usize,
}

/// The JIA universe produced by enumeration (pass 1), in canonical order.
#[derive(Debug, Default)]
pub struct JiaUniverse {
    jias: Vec<Jia>,
}

impl JiaUniverse {
    pub fn len(&self) -> usize {
        self.jias.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jias.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Jia> {
        self.jias.iter()
    }
}

/// The constraint graph.
#[derive(Debug)]
pub struct ConstraintGraph {
    graph: DiGraph<Jia, ()>,
    node_of: HashMap<Jia, NodeIndex>,
    roots: Vec<NodeIndex>,
}

impl ConstraintGraph {
    pub fn jia(&self, node: NodeIndex) -> &Jia {
        &self.graph[node]
    }

    /// Root nodes, in canonical JIA order.
    pub fn roots(&self) -> &[NodeIndex] {
        &self.roots
    }

    /// Outgoing neighbors in ascending node order (deterministic).
    pub fn successors(&self, node: NodeIndex) -> Vec<NodeIndex> {
        let mut out: Vec<NodeIndex> = self
            .graph
            .neighbors_directed(node, Direction::Outgoing)
            .collect();
        out.sort_unstable();
        out
    }

    pub fn has_edge(&self, from: NodeIndex, to: NodeIndex) -> bool {
        self.graph.find_edge(from, to).is_some()
    }

    pub fn node_of(&self, jia: &Jia) -> Option<NodeIndex> {
        self.node_of.get(jia).copied()
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn metrics(&self) -> GraphMetrics {
        GraphMetrics {
            nodes: self.node_count(),
            edges: self.edge_count(),
            roots: self.roots.len(),
        }
    }
}

/// Builds the constraint graph from the compatibility relation.
pub struct ConstraintGraphBuilder<'a> {
    interner: &'a AttributeInterner,
    compat: &'a CompatibilityRelation,
    config: &'a DiscoveryConfig,
}

impl<'a> ConstraintGraphBuilder<'a> {
    pub fn new(
        interner: &'a AttributeInterner,
        compat: &'a CompatibilityRelation,
        config: &'a DiscoveryConfig,
    ) -> Self {
        Self {
            interner,
            compat,
            config,
        }
    }

    /// Pass 1: enumerate the JIA universe.
    pub fn enumerate_jias(&self) -> JiaUniverse {
        let occ_limit = self.config.occurrence_limit() as u8;

        // Indexed-attribute universe. Empty attributes are compatible with
        // nothing, so they contribute no positions at all.
        let mut ias = Vec::new();
        for (id, attr) in self.interner.iter() {
            if attr.distinct_count == 0 {
                continue;
            }
            for occurrence in 0..occ_limit {
                ias.push(IndexedAttr::new(id, occurrence));
            }
        }

        let adjacency = self.ia_adjacency(&ias);

        let mut jias: Vec<Jia> = Vec::new();
        let mut r = Vec::new();
        self.cliques(&mut r, &(0..ias.len()).collect::<Vec<_>>(), &ias, &adjacency, &mut jias);

        // Singleton JIAs: free variables on the body side, existential
        // witnesses on the head side.
        jias.extend(ias.iter().map(|&ia| Jia::singleton(ia)));

        jias.sort_unstable();
        jias.dedup();
        JiaUniverse { jias }
    }

    /// Passes 2 and 3: mark roots and insert edges.
    pub fn build(&self, universe: &JiaUniverse) -> GraphBuildResult<ConstraintGraph> {
        let mut graph = DiGraph::new();
        let mut node_of = HashMap::with_capacity(universe.len());
        let mut occupancies: Vec<Vec<TableOcc>> = Vec::with_capacity(universe.len());

        for jia in universe.iter() {
            let node = graph.add_node(jia.clone());
            node_of.insert(jia.clone(), node);
            occupancies.push(jia.occurrences(self.interner).into_iter().collect());
        }

        // A root must express a join: rules made purely of free variables
        // assert nothing and would otherwise flood the stream.
        let roots: Vec<NodeIndex> = graph
            .node_indices()
            .filter(|&n| !graph[n].is_singleton() && graph[n].is_valid_prefix(self.interner))
            .collect();
        if roots.is_empty() {
            return Err(GraphBuildError::GraphEmpty);
        }

        // Bucket nodes by their exact occurrence set; only bucket pairs
        // whose union fits under max_tables produce edge candidates.
        let mut buckets: BTreeMap<Vec<TableOcc>, Vec<NodeIndex>> = BTreeMap::new();
        for node in graph.node_indices() {
            buckets
                .entry(occupancies[node.index()].clone())
                .or_default()
                .push(node);
        }

        let keys: Vec<&Vec<TableOcc>> = buckets.keys().collect();
        let max = self.config.max_tables;
        let mut edges: Vec<(NodeIndex, NodeIndex)> = Vec::new();
        for (i, &k1) in keys.iter().enumerate() {
            for &k2 in &keys[i..] {
                // Full-occupancy buckets can only pair with subsets of
                // themselves; checking that first avoids building unions
                // for the quadratic bulk of the key pairs.
                let union = if k1.len() == max {
                    if !is_subset(k2, k1) {
                        continue;
                    }
                    k1.clone()
                } else if k2.len() == max {
                    if !is_subset(k1, k2) {
                        continue;
                    }
                    k2.clone()
                } else {
                    match bounded_union(k1, k2, max) {
                        Some(union) => union,
                        None => continue,
                    }
                };
                if union.len() + missing_occurrences(&union) > max {
                    continue;
                }
                for &a in &buckets[k1] {
                    for &b in &buckets[k2] {
                        if a != b && !graph[a].intersects(&graph[b]) {
                            edges.push((a, b));
                            edges.push((b, a));
                        }
                    }
                }
            }
        }
        edges.sort_unstable();
        edges.dedup();
        for (a, b) in edges {
            graph.add_edge(a, b, ());
        }

        Ok(ConstraintGraph {
            graph,
            node_of,
            roots,
        })
    }

    /// IA-level compatibility: attribute compatibility, minus pairs that
    /// would unify two columns of the same table occurrence.
    fn ia_adjacency(&self, ias: &[IndexedAttr]) -> Vec<Vec<bool>> {
        let n = ias.len();
        let mut adjacency = vec![vec![false; n]; n];
        for i in 0..n {
            for j in (i + 1)..n {
                let (a, b) = (ias[i], ias[j]);
                let same_occurrence = a.occurrence == b.occurrence
                    && self.interner.attr(a.attr).table == self.interner.attr(b.attr).table;
                if same_occurrence || !self.compat.compatible(a.attr, b.attr) {
                    continue;
                }
                adjacency[i][j] = true;
                adjacency[j][i] = true;
            }
        }
        adjacency
    }

    /// Enumerate every clique of size ≥ 2 whose occupancy fits under
    /// `max_tables`. Candidates are kept in ascending order so each clique
    /// is visited exactly once.
    fn cliques(
        &self,
        r: &mut Vec<usize>,
        candidates: &[usize],
        ias: &[IndexedAttr],
        adjacency: &[Vec<bool>],
        out: &mut Vec<Jia>,
    ) {
        for (i, &v) in candidates.iter().enumerate() {
            if !self.fits(r, v, ias) {
                continue;
            }
            r.push(v);
            if r.len() >= 2 {
                out.push(Jia::new(r.iter().map(|&w| ias[w]).collect()));
            }
            let narrowed: Vec<usize> = candidates[i + 1..]
                .iter()
                .copied()
                .filter(|&w| adjacency[v][w])
                .collect();
            self.cliques(r, &narrowed, ias, adjacency, out);
            r.pop();
        }
    }

    fn fits(&self, r: &[usize], v: usize, ias: &[IndexedAttr]) -> bool {
        let occ_of = |w: usize| TableOcc {
            table: self.interner.attr(ias[w].attr).table,
            occurrence: ias[w].occurrence,
        };
        let new = occ_of(v);
        let mut occupancy: Vec<TableOcc> = r.iter().map(|&w| occ_of(w)).collect();
        if occupancy.contains(&new) {
            return true;
        }
        occupancy.sort_unstable();
        occupancy.dedup();
        occupancy.len() < self.config.max_tables
    }
}

/// Whether sorted `a` is contained in sorted `b`.
fn is_subset(a: &[TableOcc], b: &[TableOcc]) -> bool {
    let mut j = 0;
    for item in a {
        while j < b.len() && b[j] < *item {
            j += 1;
        }
        if j >= b.len() || b[j] != *item {
            return false;
        }
        j += 1;
    }
    true
}

/// Merge two sorted occurrence sets, bailing out once the union exceeds
/// the bound.
fn bounded_union(a: &[TableOcc], b: &[TableOcc], max: usize) -> Option<Vec<TableOcc>> {
    let mut union = Vec::with_capacity(a.len() + b.len());
    let (mut i, mut j) = (0, 0);
    while i < a.len() || j < b.len() {
        let next = match (a.get(i), b.get(j)) {
            (Some(&x), Some(&y)) if x == y => {
                i += 1;
                j += 1;
                x
            }
            (Some(&x), Some(&y)) if x < y => {
                i += 1;
                x
            }
            (Some(_), Some(&y)) => {
                j += 1;
                y
            }
            (Some(&x), None) => {
                i += 1;
                x
            }
            (None, Some(&y)) => {
                j += 1;
                y
            }
            (None, None) => break,
        };
        union.push(next);
        if union.len() > max {
            return None;
        }
    }
    Some(union)
}

/// Occurrence slots a rule containing `union` would still have to fill:
/// for each table, every index below the maximum one that is absent.
fn missing_occurrences(union: &[TableOcc]) -> usize {
    let mut per_table: BTreeMap<_, Vec<u8>> = BTreeMap::new();
    for occ in union {
        per_table.entry(occ.table).or_default().push(occ.occurrence);
    }
    per_table
        .values()
        .map(|indices| {
            let max = *indices.iter().max().unwrap_or(&0) as usize;
            max + 1 - indices.len()
        })
        .sum()
}
