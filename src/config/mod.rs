//! Discovery configuration.
//!
//! All numeric tunables of the engine live in [`DiscoveryConfig`] with their
//! defaults exposed as named constants in [`defaults`]. A config is validated
//! once, before any work starts; the engine itself never re-checks ranges and
//! never embeds magic numbers.
//!
//! Supports an optional TOML file (tgdmine.toml):
//! ```toml
//! max_tables = 3
//! max_vars = 6
//! strategy = "dfs"
//! heuristic = "hybrid"
//! tau_support = 0.1
//! tau_confidence = 0.5
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Error type for configuration loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("unknown traversal strategy: {0}")]
    UnknownStrategy(String),

    #[error("unknown heuristic: {0}")]
    UnknownHeuristic(String),

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Default values for every tunable, as named constants.
pub mod defaults {
    /// Maximum distinct (table, occurrence) pairs per rule (the parameter `N`).
    pub const MAX_TABLES: usize = 3;
    /// Maximum distinct variables (JIAs) per rule.
    pub const MAX_VARS: usize = 6;
    /// Maximum occurrences of one table in a rule (bound on occurrence indices).
    pub const MAX_OCCURRENCE: usize = 3;
    /// Minimum value-overlap ratio for two attributes to be join-compatible.
    pub const TAU_OVERLAP: f64 = 0.5;
    /// Minimum number of common values behind an overlap ratio. Rejects
    /// tiny-cardinality noise.
    pub const OVERLAP_FLOOR: u64 = 3;
    /// Minimum support for a rule to be emitted.
    pub const TAU_SUPPORT: f64 = 0.1;
    /// Minimum confidence for a rule to be emitted.
    pub const TAU_CONFIDENCE: f64 = 0.5;
    /// Best-first frontier size above which the engine downgrades to DFS.
    pub const FRONTIER_CAP: usize = 100_000;

    /// Hybrid heuristic weights.
    pub mod hybrid {
        pub const NAIVE_WEIGHT: f64 = 0.3;
        pub const TABLE_SIZE_WEIGHT: f64 = 0.4;
        pub const JOIN_SELECTIVITY_WEIGHT: f64 = 0.3;
    }
}

/// Traversal strategy selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    /// Depth-first search (default).
    #[default]
    Dfs,
    /// Breadth-first search; shortest rules first.
    Bfs,
    /// Best-first search guided by a heuristic.
    Astar,
}

impl StrategyKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::Dfs => "dfs",
            Self::Bfs => "bfs",
            Self::Astar => "astar",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for StrategyKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dfs" => Ok(Self::Dfs),
            "bfs" => Ok(Self::Bfs),
            "astar" | "a*" | "best-first" => Ok(Self::Astar),
            other => Err(ConfigError::UnknownStrategy(other.to_string())),
        }
    }
}

/// Heuristic selector for best-first traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HeuristicKind {
    /// Number of JIAs so far; prefers short rules.
    Naive,
    /// Sum of log row counts; prefers small tables.
    TableSize,
    /// Log of the estimated match-set cardinality; prefers selective joins.
    JoinSelectivity,
    /// Weighted blend of the other three (recommended default).
    #[default]
    Hybrid,
}

impl HeuristicKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::Naive => "naive",
            Self::TableSize => "table-size",
            Self::JoinSelectivity => "join-selectivity",
            Self::Hybrid => "hybrid",
        }
    }
}

impl fmt::Display for HeuristicKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for HeuristicKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "naive" => Ok(Self::Naive),
            "table-size" | "table_size" => Ok(Self::TableSize),
            "join-selectivity" | "join_selectivity" => Ok(Self::JoinSelectivity),
            "hybrid" => Ok(Self::Hybrid),
            other => Err(ConfigError::UnknownHeuristic(other.to_string())),
        }
    }
}

/// Weights for the hybrid heuristic.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct HybridWeights {
    pub naive: f64,
    pub table_size: f64,
    pub join_selectivity: f64,
}

impl Default for HybridWeights {
    fn default() -> Self {
        Self {
            naive: defaults::hybrid::NAIVE_WEIGHT,
            table_size: defaults::hybrid::TABLE_SIZE_WEIGHT,
            join_selectivity: defaults::hybrid::JOIN_SELECTIVITY_WEIGHT,
        }
    }
}

/// Configuration for one discovery run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Maximum distinct (table, occurrence) pairs per rule.
    pub max_tables: usize,
    /// Maximum distinct JIAs (variables) per rule.
    pub max_vars: usize,
    /// Maximum occurrences of one table in a rule.
    pub max_occurrence: usize,
    /// Traversal strategy.
    pub strategy: StrategyKind,
    /// Heuristic used by best-first traversal.
    pub heuristic: HeuristicKind,
    /// Minimum overlap ratio for attribute compatibility.
    pub tau_overlap: f64,
    /// Minimum absolute number of common values behind an overlap ratio.
    pub overlap_floor: u64,
    /// Minimum support for emission.
    pub tau_support: f64,
    /// Minimum confidence for emission.
    pub tau_confidence: f64,
    /// Best-first frontier cap; exceeding it downgrades to DFS.
    pub frontier_cap: usize,
    /// Hybrid heuristic weights.
    pub hybrid_weights: HybridWeights,
    /// Directory for side files (compatibility, CG metrics, init timings).
    /// `None` or an empty path silently skips them.
    pub results_dir: Option<PathBuf>,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            max_tables: defaults::MAX_TABLES,
            max_vars: defaults::MAX_VARS,
            max_occurrence: defaults::MAX_OCCURRENCE,
            strategy: StrategyKind::default(),
            heuristic: HeuristicKind::default(),
            tau_overlap: defaults::TAU_OVERLAP,
            overlap_floor: defaults::OVERLAP_FLOOR,
            tau_support: defaults::TAU_SUPPORT,
            tau_confidence: defaults::TAU_CONFIDENCE,
            frontier_cap: defaults::FRONTIER_CAP,
            hybrid_weights: HybridWeights::default(),
            results_dir: None,
        }
    }
}

impl DiscoveryConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let source = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&source)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate parameter ranges. Called once before any work starts.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.max_tables == 0 {
            return Err(ConfigError::InvalidParameter(
                "max_tables must be at least 1".to_string(),
            ));
        }
        if self.max_vars < 2 {
            return Err(ConfigError::InvalidParameter(
                "max_vars must be at least 2 (a rule needs a body and a head)".to_string(),
            ));
        }
        if self.max_occurrence == 0 {
            return Err(ConfigError::InvalidParameter(
                "max_occurrence must be at least 1".to_string(),
            ));
        }
        for (name, value) in [
            ("tau_overlap", self.tau_overlap),
            ("tau_support", self.tau_support),
            ("tau_confidence", self.tau_confidence),
        ] {
            if !(0.0..=1.0).contains(&value) || value.is_nan() {
                return Err(ConfigError::InvalidParameter(format!(
                    "{name} must be within [0, 1], got {value}"
                )));
            }
        }
        let w = &self.hybrid_weights;
        if w.naive < 0.0 || w.table_size < 0.0 || w.join_selectivity < 0.0 {
            return Err(ConfigError::InvalidParameter(
                "hybrid weights must be non-negative".to_string(),
            ));
        }
        if w.naive + w.table_size + w.join_selectivity <= 0.0 {
            return Err(ConfigError::InvalidParameter(
                "hybrid weights must not all be zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Occurrence indices are additionally capped by `max_tables`: a table
    /// cannot appear more often than the rule has occurrence slots.
    pub fn occurrence_limit(&self) -> usize {
        self.max_occurrence.min(self.max_tables)
    }

    /// True when a results directory is configured and non-empty.
    pub fn writes_side_files(&self) -> bool {
        self.results_dir
            .as_deref()
            .is_some_and(|p| !p.as_os_str().is_empty())
    }

    // Builder-style setters, used by tests and the CLI.

    pub fn with_max_tables(mut self, n: usize) -> Self {
        self.max_tables = n;
        self
    }

    pub fn with_max_vars(mut self, n: usize) -> Self {
        self.max_vars = n;
        self
    }

    pub fn with_max_occurrence(mut self, n: usize) -> Self {
        self.max_occurrence = n;
        self
    }

    pub fn with_strategy(mut self, strategy: StrategyKind) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_heuristic(mut self, heuristic: HeuristicKind) -> Self {
        self.heuristic = heuristic;
        self
    }

    pub fn with_thresholds(mut self, tau_support: f64, tau_confidence: f64) -> Self {
        self.tau_support = tau_support;
        self.tau_confidence = tau_confidence;
        self
    }

    pub fn with_tau_overlap(mut self, tau_overlap: f64) -> Self {
        self.tau_overlap = tau_overlap;
        self
    }

    pub fn with_results_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.results_dir = Some(dir.into());
        self
    }

    pub fn with_frontier_cap(mut self, cap: usize) -> Self {
        self.frontier_cap = cap;
        self
    }
}
