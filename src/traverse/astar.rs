// src/traverse/astar.rs
//! Best-first traversal.
//!
//! A priority queue keyed by `f(rule) = g(rule) + h(rule)`, where `g` is
//! the accumulated path cost (rule length × 1.0) and `h` the configured
//! heuristic. Ties break by insertion order to keep the run deterministic.
//!
//! Not guaranteed complete when the heuristic is inadmissible. When the
//! frontier outgrows the configured cap the strategy downgrades to
//! depth-first mid-run, keeping the most promising states on top.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use super::{Strategy, TraversalContext};
use crate::rule::CandidateRule;

struct Entry {
    cost: f64,
    seq: u64,
    rule: CandidateRule,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap: reverse so the lowest cost pops first,
        // with FIFO tie-breaking on the insertion sequence.
        other
            .cost
            .partial_cmp(&self.cost)
            .unwrap_or(Ordering::Equal)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

#[derive(Default)]
pub struct AstarStrategy {
    heap: BinaryHeap<Entry>,
    /// DFS stack used after a frontier overflow.
    fallback: Vec<CandidateRule>,
    downgraded: bool,
    seq: u64,
    seeded: bool,
}

impl AstarStrategy {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, rule: CandidateRule, cx: &TraversalContext<'_>) {
        let g = rule.len() as f64;
        let h = cx.heuristic.cost(&rule, cx.graph);
        self.seq += 1;
        self.heap.push(Entry {
            cost: g + h,
            seq: self.seq,
            rule,
        });
    }

    /// Drain the heap into a DFS stack, best states on top.
    fn downgrade(&mut self) {
        tracing::warn!(
            frontier = self.heap.len(),
            "best-first frontier exceeded its cap, downgrading to depth-first"
        );
        let mut entries: Vec<Entry> = std::mem::take(&mut self.heap).into_vec();
        // Ascending heap order leaves the most promising state on top of
        // the stack.
        entries.sort_by(|a, b| a.cmp(b));
        self.fallback = entries.into_iter().map(|e| e.rule).collect();
        self.downgraded = true;
    }

    fn next_depth_first(&mut self, cx: &TraversalContext<'_>) -> Option<CandidateRule> {
        while let Some(rule) = self.fallback.pop() {
            let mut successors = cx.valid_successors(&rule);
            successors.reverse();
            self.fallback.extend(successors);
            if rule.is_candidate() {
                return Some(rule);
            }
        }
        None
    }
}

impl Strategy for AstarStrategy {
    fn name(&self) -> &'static str {
        "astar"
    }

    fn next_candidate(&mut self, cx: &TraversalContext<'_>) -> Option<CandidateRule> {
        if !self.seeded {
            self.seeded = true;
            for rule in cx.root_rules() {
                self.push(rule, cx);
            }
        }
        loop {
            if self.downgraded {
                return self.next_depth_first(cx);
            }
            let entry = self.heap.pop()?;
            let rule = entry.rule;
            for successor in cx.valid_successors(&rule) {
                self.push(successor, cx);
            }
            if self.heap.len() > cx.config.frontier_cap {
                self.downgrade();
            }
            if rule.is_candidate() {
                return Some(rule);
            }
        }
    }

    fn downgraded(&self) -> bool {
        self.downgraded
    }
}
