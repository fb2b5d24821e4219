//! Conjunctive-query IR for match counting.
//!
//! A [`MatchQuery`] is the flattened form of one candidate rule at one split
//! point: a list of table occurrences (atoms) and a list of column
//! equalities, each tagged with the side of the split it belongs to. The
//! scorer builds these; inspector backends evaluate them.

use serde::Serialize;

/// One table occurrence in a query.
#[derive(Debug, Clone, Serialize)]
pub struct QueryAtom {
    /// Table name.
    pub table: String,
    /// Unique alias within the query (`t0`, `t1`, ...).
    pub alias: String,
    /// Whether this occurrence was introduced by a body JIA. Head-only
    /// atoms are existentially quantified.
    pub in_body: bool,
}

/// A column reference: atom index plus column name.
#[derive(Debug, Clone, Serialize)]
pub struct ColumnRef {
    /// Index into [`MatchQuery::atoms`].
    pub atom: usize,
    /// Column name.
    pub column: String,
}

/// An equality constraint between two columns.
#[derive(Debug, Clone, Serialize)]
pub struct Equality {
    pub left: ColumnRef,
    pub right: ColumnRef,
    /// Whether the constraint comes from a body JIA. Head constraints may
    /// reference both body and head atoms.
    pub in_body: bool,
}

/// A candidate rule flattened for evaluation.
#[derive(Debug, Clone, Serialize)]
pub struct MatchQuery {
    /// Table occurrences, body atoms first (in introduction order).
    pub atoms: Vec<QueryAtom>,
    /// Column equalities derived from the rule's JIAs.
    pub equalities: Vec<Equality>,
    /// Index of the anchor atom (the support denominator's table).
    pub anchor: usize,
}

impl MatchQuery {
    /// Body atoms (universally quantified side).
    pub fn body_atoms(&self) -> impl Iterator<Item = (usize, &QueryAtom)> {
        self.atoms.iter().enumerate().filter(|(_, a)| a.in_body)
    }

    /// Head-only atoms (existentially quantified side).
    pub fn head_atoms(&self) -> impl Iterator<Item = (usize, &QueryAtom)> {
        self.atoms.iter().enumerate().filter(|(_, a)| !a.in_body)
    }

    /// Equalities belonging to the body pattern.
    pub fn body_equalities(&self) -> impl Iterator<Item = &Equality> {
        self.equalities.iter().filter(|eq| eq.in_body)
    }

    /// Equalities contributed by head JIAs.
    pub fn head_equalities(&self) -> impl Iterator<Item = &Equality> {
        self.equalities.iter().filter(|eq| !eq.in_body)
    }

    /// Whether any head equality or head atom exists at all.
    pub fn has_head(&self) -> bool {
        self.head_atoms().next().is_some() || self.head_equalities().next().is_some()
    }
}
