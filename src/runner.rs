//! Top-level runner: dataset in, oriented PAG out.
//!
//! Wires an external skeleton builder, the closure collaborators, and a
//! change test into one entry point. The runner owns the boundary checks
//! (empty data, significance level, node-set agreement), the pre-pass that
//! strips illegal arrowheads at the environment node, and the decision of
//! whether there is an environment to orient against at all.
//!
//! # Citations
//! - Huang, Zhang, Zhang, Ramsey, Sanchez-Romero, Glymour & Schölkopf,
//!   "Causal discovery from heterogeneous/nonstationary data", Journal of
//!   Machine Learning Research (2020)

use crate::closure::{ClosureError, ClosureFactory, PagBuilder};
use crate::core::{Mark, Pag, VarId, VarRole};
use crate::dataset::Dataset;
use crate::engine::{EngineConfig, EngineError, EngineStats, OrientationEngine};
use crate::oracle::{ChangeTest, DatasetChangeOracle};
use crate::trace::OrientationTrace;
use thiserror::Error;
use tracing::{debug, info};

/// Error raised at the runner boundary or forwarded from a run.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// The dataset has no rows or no columns; there is nothing to analyze.
    #[error("empty dataset")]
    EmptyDataset,
    /// The significance level is outside `(0, 1)`.
    #[error("significance level must lie in (0, 1), got {0}")]
    InvalidAlpha(f64),
    /// The builder's graph does not range over the dataset's columns.
    #[error("builder returned {got} variables for a dataset with {expected} columns")]
    NodeSetMismatch {
        /// Number of dataset columns.
        expected: usize,
        /// Number of variables the builder returned.
        got: usize,
    },
    /// The orientation engine aborted.
    #[error(transparent)]
    Engine(#[from] EngineError),
    /// The skeleton builder failed.
    #[error(transparent)]
    Builder(#[from] ClosureError),
}

/// Result of a runner invocation.
///
/// `oriented` distinguishes "no environment column, graph returned
/// unchanged" from "orientation engine ran to completion"; a failed run
/// returns an error instead of an outcome.
#[derive(Debug)]
pub struct RunOutcome {
    /// The finished graph.
    pub graph: Pag,
    /// The environment node, when one was designated.
    pub env: Option<VarId>,
    /// Whether the orientation engine ran.
    pub oriented: bool,
    /// Decision record of the engine run, when one happened.
    pub trace: Option<OrientationTrace>,
    /// Engine counters (all zero when the engine did not run).
    pub stats: EngineStats,
}

/// Replaces every arrowhead at the environment node's side with a circle.
///
/// The far endpoint is never touched: the neighbor keeps whatever mark it
/// had, and no tail is forced anywhere. Returns the number of marks
/// replaced.
pub fn strip_context_arrowheads(pag: &mut Pag, env: VarId) -> usize {
    let mut stripped = 0;
    for u in pag.neighbors_of(env) {
        if pag.mark_at(u, env) == Some(Mark::Arrow) {
            pag.set_mark(u, env, Mark::Circle);
            stripped += 1;
        }
    }
    stripped
}

/// The assembled pipeline: builder, closure collaborators, change test,
/// engine configuration.
pub struct Runner<B, F, T> {
    builder: B,
    factory: F,
    test: T,
    config: EngineConfig,
}

impl<B, F, T> Runner<B, F, T>
where
    B: PagBuilder,
    F: ClosureFactory,
    T: ChangeTest,
{
    /// Creates a runner with the default engine configuration.
    pub fn new(builder: B, factory: F, test: T) -> Self {
        Self {
            builder,
            factory,
            test,
            config: EngineConfig::default(),
        }
    }

    /// Replaces the engine configuration.
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Builds the skeleton and, when an environment column is designated,
    /// orients it against the environment.
    ///
    /// The last dataset column is the environment node when
    /// `last_column_is_env` is set; without one the builder's graph is
    /// returned unchanged and the engine never runs.
    pub fn run(
        &self,
        data: &Dataset,
        last_column_is_env: bool,
        alpha: f64,
    ) -> Result<RunOutcome, RunnerError> {
        if data.is_empty() {
            return Err(RunnerError::EmptyDataset);
        }
        if !(alpha > 0.0 && alpha < 1.0) {
            return Err(RunnerError::InvalidAlpha(alpha));
        }

        let mut pag = self.builder.build(data)?;
        if pag.var_count() != data.n_cols() {
            return Err(RunnerError::NodeSetMismatch {
                expected: data.n_cols(),
                got: pag.var_count(),
            });
        }

        let env = if last_column_is_env {
            data.last_column()
        } else {
            None
        };
        let Some(env) = env else {
            info!("no environment column; returning the builder's graph unchanged");
            return Ok(RunOutcome {
                graph: pag,
                env: None,
                oriented: false,
                trace: None,
                stats: EngineStats::default(),
            });
        };

        // Environment nodes are exogenous: no arrowhead may point at one,
        // whatever the builder concluded.
        pag.set_role(env, VarRole::Context);
        let stripped = strip_context_arrowheads(&mut pag, env);
        if stripped > 0 {
            debug!(env = %env, stripped, "stripped arrowheads at the environment node");
        }

        let oracle = DatasetChangeOracle::new(data, env, alpha, &self.test);
        let closure = self.factory.closure(&pag);
        let mut engine = OrientationEngine::new(self.config.clone());
        let graph = engine.run(
            pag,
            &oracle,
            closure.propagator.as_ref(),
            closure.legality.as_ref(),
        )?;
        Ok(RunOutcome {
            env: Some(env),
            oriented: true,
            trace: engine.take_trace(),
            stats: *engine.stats(),
            graph,
        })
    }
}
