// src/traverse/dfs.rs
//! Depth-first traversal (the default strategy).
//!
//! Keeps a stack of partial rules, each paired with a cursor over the
//! outgoing edges of its last JIA, so live memory stays proportional to
//! the search depth rather than the frontier width. Backtracking is
//! implicit in the stack; rules are yielded in pre-order, when first
//! created.

use petgraph::graph::NodeIndex;

use super::{Strategy, TraversalContext};
use crate::rule::CandidateRule;

struct Frame {
    rule: CandidateRule,
    succs: Vec<NodeIndex>,
    cursor: usize,
}

#[derive(Default)]
pub struct DfsStrategy {
    stack: Vec<Frame>,
    seeded: bool,
}

impl DfsStrategy {
    pub fn new() -> Self {
        Self::default()
    }

    fn seed(&mut self, cx: &TraversalContext<'_>) {
        // Reversed so the first root sits on top of the stack.
        for &root in cx.graph.roots().iter().rev() {
            self.stack.push(Frame {
                rule: CandidateRule::root(cx.graph, cx.interner, root),
                succs: cx.graph.successors(root),
                cursor: 0,
            });
        }
    }
}

impl Strategy for DfsStrategy {
    fn name(&self) -> &'static str {
        "dfs"
    }

    fn next_candidate(&mut self, cx: &TraversalContext<'_>) -> Option<CandidateRule> {
        if !self.seeded {
            self.seeded = true;
            self.seed(cx);
        }
        while let Some(frame) = self.stack.last_mut() {
            if frame.cursor >= frame.succs.len() {
                self.stack.pop();
                continue;
            }
            let node = frame.succs[frame.cursor];
            frame.cursor += 1;
            if !cx.validator.next_node_test(&frame.rule, node) {
                continue;
            }
            let rule = frame.rule.extended(cx.graph, cx.interner, node);
            let succs = if rule.len() < cx.config.max_vars {
                cx.graph.successors(node)
            } else {
                Vec::new()
            };
            self.stack.push(Frame {
                rule: rule.clone(),
                succs,
                cursor: 0,
            });
            return Some(rule);
        }
        None
    }
}
