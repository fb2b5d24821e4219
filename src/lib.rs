//! # tgdmine
//!
//! Discovers tuple-generating dependencies (TGDs), implications of the
//! form `∀x⃗. body(x⃗) ⇒ ∃y⃗. head(x⃗,y⃗)`, from the contents of a
//! relational database.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │              Inspector (read-only database)              │
//! │        (schema, counts, overlap, match counting)         │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [compatibility analysis]
//! ┌─────────────────────────────────────────────────────────┐
//! │       Compatible attribute pairs (symmetric relation)    │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [constraint graph builder]
//! ┌─────────────────────────────────────────────────────────┐
//! │        Constraint graph over JIAs (roots + edges)        │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [traversal: dfs | bfs | astar]
//! ┌─────────────────────────────────────────────────────────┐
//! │   Candidate rules → split scoring → TGD records (lazy)   │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! The engine is single-threaded and cooperative: [`discovery::RuleStream`]
//! yields one rule at a time and polls a shared stop signal between node
//! expansions. All run-scoped state lives in a
//! [`discovery::DiscoveryContext`].

pub mod attrs;
pub mod compat;
pub mod config;
pub mod discovery;
pub mod graph;
pub mod heuristics;
pub mod inspector;
pub mod materialize;
pub mod rule;
pub mod score;
pub mod traverse;

/// Re-exports for convenient usage.
pub mod prelude {
    pub use crate::config::{DiscoveryConfig, HeuristicKind, StrategyKind};
    pub use crate::discovery::{
        DiscoveryContext, DiscoveryError, DiscoverySummary, RuleStream, RunOutcome,
    };
    pub use crate::inspector::{
        Inspector, InspectorError, MemoryInspector, SqliteInspector, Value,
    };
    pub use crate::materialize::TgdRule;
    pub use crate::traverse::CancelToken;
}

pub use config::{DiscoveryConfig, HeuristicKind, StrategyKind};
pub use discovery::{DiscoveryContext, DiscoverySummary, RunOutcome};
pub use materialize::TgdRule;
pub use traverse::CancelToken;
