//! Discovery orchestration.
//!
//! [`DiscoveryContext::initialize`] runs the three initialization phases
//! (compatibility analysis, JIA enumeration, constraint-graph build) with
//! wall-clock timings, and [`DiscoveryContext::rules`] returns the lazy
//! rule stream the caller drives. All run-scoped state lives in the
//! context; nothing is process-global.
//!
//! Per-rule failures during metric evaluation are logged at debug level
//! and skipped; only configuration and schema problems surface as errors.
//! An empty constraint graph is a successful empty result.

use std::collections::{BTreeMap, HashSet, VecDeque};
use std::path::Path;
use std::time::Instant;

use serde::Serialize;

use crate::attrs::AttributeInterner;
use crate::compat::{CompatibilityAnalyzer, CompatibilityRelation};
use crate::config::{ConfigError, DiscoveryConfig};
use crate::graph::{ConstraintGraph, ConstraintGraphBuilder, GraphBuildError, GraphMetrics};
use crate::heuristics::HeuristicEval;
use crate::inspector::{Inspector, InspectorError};
use crate::materialize::{Materializer, TgdRule};
use crate::rule::{CandidateRule, RuleValidator};
use crate::score::{EvalSkip, MetricEvaluator};
use crate::traverse::{strategy_for, CancelToken, Strategy, TraversalContext};

/// Fatal discovery errors. Everything else becomes an empty result, a
/// warning, or a quietly skipped rule.
#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("schema error: {0}")]
    Schema(String),

    #[error("inspector backend failure: {0}")]
    Backend(String),

    #[error("failed to write side files: {0}")]
    SideFile(#[from] std::io::Error),
}

impl From<InspectorError> for DiscoveryError {
    fn from(err: InspectorError) -> Self {
        match err {
            InspectorError::MissingTable(_) | InspectorError::MissingColumn { .. } => {
                Self::Schema(err.to_string())
            }
            InspectorError::Backend(message) => Self::Backend(message),
        }
    }
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// The search space was exhausted.
    Completed,
    /// The stop signal was raised; the stream holds partial results.
    Cancelled,
    /// No root JIAs existed; zero rules, not an error.
    GraphEmpty,
}

/// Structured summary returned alongside the rule sequence.
#[derive(Debug, Clone, Serialize)]
pub struct DiscoverySummary {
    pub rules_considered: u64,
    pub rules_emitted: u64,
    pub rules_skipped_by_reason: BTreeMap<&'static str, u64>,
    pub outcome: RunOutcome,
    /// Set when best-first fell back to DFS mid-run.
    pub downgraded_to_dfs: bool,
}

impl DiscoverySummary {
    fn new(outcome: RunOutcome) -> Self {
        Self {
            rules_considered: 0,
            rules_emitted: 0,
            rules_skipped_by_reason: BTreeMap::new(),
            outcome,
            downgraded_to_dfs: false,
        }
    }

    fn skip(&mut self, reason: &'static str) {
        *self.rules_skipped_by_reason.entry(reason).or_insert(0) += 1;
    }
}

/// Wall-clock initialization timings, in seconds. Written to the
/// `init_time_metrics_<db>.json` side file.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct InitTimings {
    pub time_compute_compatible: f64,
    pub time_to_compute_indexed: f64,
    pub time_building_cg: f64,
}

/// Immutable per-run state: config, interner, compatibility relation, and
/// the constraint graph. Shareable by reference across concurrent reads.
pub struct DiscoveryContext {
    config: DiscoveryConfig,
    source_name: String,
    interner: AttributeInterner,
    compat: CompatibilityRelation,
    graph: Option<ConstraintGraph>,
    timings: InitTimings,
}

impl DiscoveryContext {
    /// Validate the config and run the three initialization phases.
    pub fn initialize(
        config: DiscoveryConfig,
        inspector: &dyn Inspector,
    ) -> Result<Self, DiscoveryError> {
        config.validate()?;
        let source_name = inspector.source_name();

        let started = Instant::now();
        let interner = AttributeInterner::from_inspector(inspector)?;
        let compat = CompatibilityAnalyzer::new(inspector, &interner, &config).analyze()?;
        let time_compute_compatible = started.elapsed().as_secs_f64();

        let builder = ConstraintGraphBuilder::new(&interner, &compat, &config);
        let started = Instant::now();
        let universe = builder.enumerate_jias();
        let time_to_compute_indexed = started.elapsed().as_secs_f64();

        let started = Instant::now();
        let graph = match builder.build(&universe) {
            Ok(graph) => Some(graph),
            Err(GraphBuildError::GraphEmpty) => {
                tracing::info!("constraint graph has no roots, reporting no candidates");
                None
            }
        };
        let time_building_cg = started.elapsed().as_secs_f64();

        if let Some(graph) = &graph {
            let metrics = graph.metrics();
            tracing::info!(
                nodes = metrics.nodes,
                edges = metrics.edges,
                roots = metrics.roots,
                "constraint graph built"
            );
        }

        Ok(Self {
            config,
            source_name,
            interner,
            compat,
            graph,
            timings: InitTimings {
                time_compute_compatible,
                time_to_compute_indexed,
                time_building_cg,
            },
        })
    }

    pub fn config(&self) -> &DiscoveryConfig {
        &self.config
    }

    pub fn interner(&self) -> &AttributeInterner {
        &self.interner
    }

    pub fn compatibility(&self) -> &CompatibilityRelation {
        &self.compat
    }

    pub fn timings(&self) -> InitTimings {
        self.timings
    }

    /// Graph metrics; all zero when the graph is empty.
    pub fn graph_metrics(&self) -> GraphMetrics {
        self.graph.as_ref().map_or(
            GraphMetrics {
                nodes: 0,
                edges: 0,
                roots: 0,
            },
            ConstraintGraph::metrics,
        )
    }

    pub fn graph(&self) -> Option<&ConstraintGraph> {
        self.graph.as_ref()
    }

    /// Write the three side files when a results directory is configured.
    ///
    /// A `None` or empty path silently skips them; an earlier incarnation
    /// of this pipeline crashed the whole discovery by writing to a null
    /// path.
    pub fn write_side_files(&self) -> Result<(), DiscoveryError> {
        if !self.config.writes_side_files() {
            return Ok(());
        }
        let dir = self
            .config
            .results_dir
            .as_deref()
            .expect("writes_side_files checked the path");
        std::fs::create_dir_all(dir)?;

        self.write_json(
            dir,
            &format!("compatibility_{}.json", self.source_name),
            &self.compat.to_json(&self.interner),
        )?;
        self.write_json(
            dir,
            &format!("cg_metrics_{}.json", self.source_name),
            &self.graph_metrics(),
        )?;
        self.write_json(
            dir,
            &format!("init_time_metrics_{}.json", self.source_name),
            &self.timings,
        )?;
        Ok(())
    }

    fn write_json<T: Serialize>(
        &self,
        dir: &Path,
        file: &str,
        value: &T,
    ) -> Result<(), DiscoveryError> {
        let payload = serde_json::to_string_pretty(value)
            .map_err(|e| DiscoveryError::Backend(e.to_string()))?;
        std::fs::write(dir.join(file), payload)?;
        Ok(())
    }

    /// The lazy rule stream for this context. The caller drives it; the
    /// cancel token stops it between expansions.
    pub fn rules<'a>(&'a self, inspector: &'a dyn Inspector, cancel: CancelToken) -> RuleStream<'a> {
        RuleStream::new(self, inspector, cancel)
    }
}

/// The graph-dependent half of a stream; absent when the constraint graph
/// is empty.
struct StreamEngine<'a> {
    graph: &'a ConstraintGraph,
    strategy: Box<dyn Strategy>,
    validator: RuleValidator<'a>,
    heuristic: HeuristicEval<'a>,
}

/// Lazy iterator over emitted TGDs.
///
/// One candidate rule may emit once per passing split point, ordered by
/// split; duplicates (by content hash) are dropped.
pub struct RuleStream<'a> {
    ctx: &'a DiscoveryContext,
    engine: Option<StreamEngine<'a>>,
    evaluator: MetricEvaluator<'a>,
    materializer: Materializer<'a>,
    cancel: CancelToken,
    seen: HashSet<String>,
    pending: VecDeque<TgdRule>,
    summary: DiscoverySummary,
    done: bool,
}

impl<'a> RuleStream<'a> {
    fn new(ctx: &'a DiscoveryContext, inspector: &'a dyn Inspector, cancel: CancelToken) -> Self {
        let engine = ctx.graph.as_ref().map(|graph| StreamEngine {
            graph,
            strategy: strategy_for(ctx.config.strategy),
            validator: RuleValidator::new(graph, &ctx.interner, &ctx.config),
            heuristic: HeuristicEval::new(&ctx.config, &ctx.interner),
        });
        let outcome = if engine.is_some() {
            RunOutcome::Completed
        } else {
            RunOutcome::GraphEmpty
        };
        Self {
            ctx,
            done: engine.is_none(),
            engine,
            evaluator: MetricEvaluator::new(inspector, &ctx.interner, &ctx.config),
            materializer: Materializer::new(&ctx.interner),
            cancel,
            seen: HashSet::new(),
            pending: VecDeque::new(),
            summary: DiscoverySummary::new(outcome),
        }
    }

    /// The structured run summary. Final once the stream has returned
    /// `None`.
    pub fn summary(&self) -> &DiscoverySummary {
        &self.summary
    }

    /// Consume the stream and return the summary.
    pub fn into_summary(self) -> DiscoverySummary {
        self.summary
    }

    fn process(&mut self, rule: &CandidateRule, graph: &'a ConstraintGraph) {
        self.summary.rules_considered += 1;
        if !self.evaluator.path_pruning(rule) {
            self.summary.skip("pruned");
            return;
        }
        for split in rule.splits() {
            match self.evaluator.evaluate(rule, split, graph) {
                Ok(metrics) if self.evaluator.passes(&metrics) => {
                    let tgd = self.materializer.materialize(rule, split, graph, &metrics);
                    if self.seen.insert(tgd.hash.clone()) {
                        self.pending.push_back(tgd);
                    } else {
                        self.summary.skip("duplicate");
                    }
                }
                Ok(_) => self.summary.skip("below_threshold"),
                Err(skip) => {
                    if let EvalSkip::Backend(err) = &skip {
                        tracing::debug!(error = %err, "metric evaluation failed, skipping rule");
                    }
                    self.summary.skip(skip.reason());
                    // The rest of this rule's splits are abandoned too.
                    break;
                }
            }
        }
    }
}

impl Iterator for RuleStream<'_> {
    type Item = TgdRule;

    fn next(&mut self) -> Option<TgdRule> {
        loop {
            // Poll the stop signal before touching any queued emission so
            // cancellation never half-emits a rule.
            if !self.done && self.cancel.is_cancelled() {
                self.summary.outcome = RunOutcome::Cancelled;
                self.done = true;
            }
            if self.done {
                return None;
            }
            if let Some(tgd) = self.pending.pop_front() {
                self.summary.rules_emitted += 1;
                return Some(tgd);
            }
            let Some(engine) = self.engine.as_mut() else {
                self.done = true;
                return None;
            };
            let graph = engine.graph;
            let cx = TraversalContext {
                graph,
                interner: &self.ctx.interner,
                validator: &engine.validator,
                heuristic: &engine.heuristic,
                config: &self.ctx.config,
            };
            let candidate = engine.strategy.next_candidate(&cx);
            let downgraded = engine.strategy.downgraded();
            match candidate {
                Some(rule) => {
                    self.process(&rule, graph);
                    self.summary.downgraded_to_dfs |= downgraded;
                }
                None => {
                    self.done = true;
                    return None;
                }
            }
        }
    }
}
