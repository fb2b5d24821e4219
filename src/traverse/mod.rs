//! Traversal strategies over the constraint graph.
//!
//! Three strategies share one contract: given the graph, its roots, and
//! the bounds, produce candidate rules in some order, applying the
//! validator's `next_node_test` before every extension. Within one
//! strategy the order is deterministic for the same inputs; DFS and BFS
//! visit the same set of rules, while best-first may omit rules when its
//! heuristic is inadmissible.
//!
//! The engine is single-threaded and cooperative: the caller drives it one
//! candidate at a time, and a shared [`CancelToken`] is polled between
//! node expansions and at every yield.

mod astar;
mod bfs;
mod dfs;

pub use astar::AstarStrategy;
pub use bfs::BfsStrategy;
pub use dfs::DfsStrategy;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::attrs::AttributeInterner;
use crate::config::{DiscoveryConfig, StrategyKind};
use crate::graph::ConstraintGraph;
use crate::heuristics::HeuristicEval;
use crate::rule::{CandidateRule, RuleValidator};

/// Shared stop signal. Setting it stops a run within one node expansion's
/// worth of work; timeouts are enforced externally by flipping the flag
/// from a timer.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// Read-only state shared by every strategy during one run.
pub struct TraversalContext<'a> {
    pub graph: &'a ConstraintGraph,
    pub interner: &'a AttributeInterner,
    pub validator: &'a RuleValidator<'a>,
    pub heuristic: &'a HeuristicEval<'a>,
    pub config: &'a DiscoveryConfig,
}

impl<'a> TraversalContext<'a> {
    /// Length-1 rules for every root, in canonical order.
    pub fn root_rules(&self) -> Vec<CandidateRule> {
        self.graph
            .roots()
            .iter()
            .map(|&root| CandidateRule::root(self.graph, self.interner, root))
            .collect()
    }

    /// Every legal one-step extension of a rule, in successor order.
    pub fn valid_successors(&self, rule: &CandidateRule) -> Vec<CandidateRule> {
        if rule.len() >= self.config.max_vars {
            return Vec::new();
        }
        self.graph
            .successors(rule.last())
            .into_iter()
            .filter(|&node| self.validator.next_node_test(rule, node))
            .map(|node| rule.extended(self.graph, self.interner, node))
            .collect()
    }
}

/// One traversal strategy behind a uniform interface.
pub trait Strategy {
    fn name(&self) -> &'static str;

    /// Advance to the next candidate rule (length ≥ 2), or `None` when the
    /// search space is exhausted.
    fn next_candidate(&mut self, cx: &TraversalContext<'_>) -> Option<CandidateRule>;

    /// Whether the strategy fell back to DFS mid-run (best-first frontier
    /// overflow).
    fn downgraded(&self) -> bool {
        false
    }
}

/// Select a strategy implementation by name.
pub fn strategy_for(kind: StrategyKind) -> Box<dyn Strategy> {
    match kind {
        StrategyKind::Dfs => Box::new(DfsStrategy::new()),
        StrategyKind::Bfs => Box::new(BfsStrategy::new()),
        StrategyKind::Astar => Box::new(AstarStrategy::new()),
    }
}
