// src/traverse/bfs.rs
//! Breadth-first traversal.
//!
//! A FIFO queue over partial rules expands a full level before moving to
//! the next, so shorter rules surface first. Memory cost is the width of
//! the current level.

use std::collections::VecDeque;

use super::{Strategy, TraversalContext};
use crate::rule::CandidateRule;

#[derive(Default)]
pub struct BfsStrategy {
    queue: VecDeque<CandidateRule>,
    seeded: bool,
}

impl BfsStrategy {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Strategy for BfsStrategy {
    fn name(&self) -> &'static str {
        "bfs"
    }

    fn next_candidate(&mut self, cx: &TraversalContext<'_>) -> Option<CandidateRule> {
        if !self.seeded {
            self.seeded = true;
            self.queue.extend(cx.root_rules());
        }
        while let Some(rule) = self.queue.pop_front() {
            self.queue.extend(cx.valid_successors(&rule));
            if rule.is_candidate() {
                return Some(rule);
            }
        }
        None
    }
}
