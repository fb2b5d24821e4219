//! Read-only database access.
//!
//! The [`Inspector`] trait is the only way the engine sees a database: schema
//! listing, row and distinct counts, declared foreign keys, value overlap
//! between columns, and match counting for candidate rules. Calls are
//! synchronous; the engine never mutates the source and an inspector must be
//! safe for concurrent read calls if the host runs several discoveries.
//!
//! Match counting is expressed over a neutral conjunctive-query IR
//! ([`query::MatchQuery`]) rather than engine-internal rule types, so
//! backends stay decoupled from the traversal machinery.
//!
//! Two backends ship with the crate: [`SqliteInspector`] for SQLite files
//! and [`MemoryInspector`], an in-memory fixture used by tests and examples.

mod memory;
pub mod query;
mod sqlite;

pub use memory::{MemoryInspector, Value};
pub use sqlite::SqliteInspector;

use serde::{Deserialize, Serialize};

use query::MatchQuery;

/// Result type for inspector operations.
pub type InspectorResult<T> = Result<T, InspectorError>;

/// Errors raised by inspector backends.
///
/// During metric evaluation the engine treats every variant as a data-level
/// rejection of the offending rule; only failures during initialization are
/// surfaced to the caller.
#[derive(Debug, thiserror::Error)]
pub enum InspectorError {
    /// A referenced table does not exist.
    #[error("table not found: {0}")]
    MissingTable(String),

    /// A referenced column does not exist.
    #[error("column not found: {table}.{column}")]
    MissingColumn { table: String, column: String },

    /// The backend failed (I/O, driver, malformed data). Retried once per
    /// call before the current rule is skipped.
    #[error("inspector backend error: {0}")]
    Backend(String),
}

impl InspectorError {
    /// Whether a single retry is worth attempting.
    pub fn is_retriable(&self) -> bool {
        matches!(self, Self::Backend(_))
    }
}

/// A column as reported by the backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnInfo {
    /// Column name.
    pub name: String,
    /// Backend-specific declared type (e.g. `INTEGER`, `VARCHAR(40)`).
    pub declared_type: String,
    /// Whether the column is part of the primary key.
    pub primary_key: bool,
}

/// A declared foreign key edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKey {
    /// Local column.
    pub column: String,
    /// Referenced table.
    pub referenced_table: String,
    /// Referenced column.
    pub referenced_column: String,
}

/// Read-only access to schema and tuple contents.
pub trait Inspector: Send + Sync {
    /// A short name for the data source, used in side-file names.
    fn source_name(&self) -> String;

    /// All table names, in a stable order.
    fn list_tables(&self) -> InspectorResult<Vec<String>>;

    /// Columns of a table, in declaration order.
    fn list_columns(&self, table: &str) -> InspectorResult<Vec<ColumnInfo>>;

    /// Number of rows in a table.
    fn row_count(&self, table: &str) -> InspectorResult<u64>;

    /// Number of distinct non-null values in a column.
    fn distinct_values(&self, table: &str, column: &str) -> InspectorResult<u64>;

    /// Declared foreign keys of a table.
    fn foreign_keys(&self, table: &str) -> InspectorResult<Vec<ForeignKey>>;

    /// Fraction of shared values between two columns:
    /// `|values(A) ∩ values(B)| / min(|values(A)|, |values(B)|)`.
    ///
    /// Returns 0.0 when either column has no values.
    fn overlap_ratio(
        &self,
        left_table: &str,
        left_column: &str,
        right_table: &str,
        right_column: &str,
    ) -> InspectorResult<f64>;

    /// Number of bindings of the body atoms satisfying the body equalities.
    fn count_body_matches(&self, query: &MatchQuery) -> InspectorResult<u64>;

    /// Number of body bindings for which the head pattern is satisfiable.
    ///
    /// The head is evaluated with existential semantics, so the result never
    /// exceeds [`Inspector::count_body_matches`] for the same query.
    fn count_both_matches(&self, query: &MatchQuery) -> InspectorResult<u64>;

    /// Number of distinct anchor-atom rows participating in a full
    /// (body ∧ head) match. Never exceeds the anchor table's row count.
    fn count_anchor_matches(&self, query: &MatchQuery) -> InspectorResult<u64>;
}
