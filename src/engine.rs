//! Constraint-driven edge-orientation engine.
//!
//! For each eligible ordered pair (child, candidate parent), the engine
//! searches bounded conditioning sets, consults the change oracle for the
//! C1 guard, tentatively places an arrowhead at the child, hands the graph
//! to the external propagator, and keeps the result only when the external
//! legality oracle accepts it. Every tentative mutation is preceded by a
//! reversal record, so a failed candidate restores the working graph
//! exactly, and a final safety net unwinds committed orientations until the
//! propagated graph is legal again.
//!
//! Determinism is load-bearing: pairs are visited in the graph's native
//! node and adjacency order, conditioning sets in the enumerator's fixed
//! order, and the first candidate that passes the guards and legality wins.
//!
//! # Citations
//! - Huang, Zhang, Zhang, Ramsey, Sanchez-Romero, Glymour & Schölkopf,
//!   "Causal discovery from heterogeneous/nonstationary data", Journal of
//!   Machine Learning Research (2020)
//! - Zhang, "On the completeness of orientation rules for causal discovery
//!   in the presence of latent confounders and selection bias", Artificial
//!   Intelligence (2008)

use crate::closure::{ClosureError, LegalityOracle, Propagator};
use crate::core::{Mark, Pag, VarId};
use crate::fingerprint::graph_fingerprint;
use crate::oracle::{ChangeOracle, OracleError};
use crate::subsets::Subsets;
use crate::trace::{OrientationStep, OrientationTrace, StepOutcome, UndoEntry, UndoLog};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Error raised by an engine run.
///
/// Oracle and collaborator failures abort the run; they are never folded
/// into "no orientation found".
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// The change oracle could not answer a query.
    #[error(transparent)]
    Oracle(#[from] OracleError),
    /// The propagator or legality oracle failed.
    #[error(transparent)]
    Closure(#[from] ClosureError),
    /// An edge the engine was about to mutate is gone; a collaborator
    /// removed an adjacency it must not touch.
    #[error("edge between {a} and {b} disappeared during orientation")]
    MissingEdge {
        /// One endpoint of the vanished edge.
        a: VarId,
        /// The other endpoint.
        b: VarId,
    },
}

/// Configuration of one engine run.
///
/// All configuration is explicit and immutable per run; the engine keeps no
/// state across runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Inclusive bound on conditioning-set size. Subset search is
    /// combinatorially explosive; 0 to 2 is typical.
    pub max_subset_size: usize,
    /// Require some individual context node alone to stabilize the target
    /// before accepting a candidate parent.
    pub use_proxy_guard: bool,
    /// Keep context nodes out of the conditioning-set search space.
    pub exclude_contexts_from_cond: bool,
    /// Optional background ordering: smaller tier means earlier. A
    /// candidate parent whose tier is not strictly earlier than the
    /// child's is skipped. Applies only when both nodes carry a tier.
    pub tiers: BTreeMap<VarId, i32>,
    /// Extra nodes that may never receive an arrowhead, merged with the
    /// oracle's context nodes.
    pub protected: BTreeSet<VarId>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_subset_size: 1,
            use_proxy_guard: true,
            exclude_contexts_from_cond: true,
            tiers: BTreeMap::new(),
            protected: BTreeSet::new(),
        }
    }
}

/// Counters describing one engine run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineStats {
    /// Ordered pairs that passed the eligibility gates and entered subset
    /// search.
    pub pairs_searched: u64,
    /// Conditioning sets tested against the C1 guard.
    pub candidates_tested: u64,
    /// Orientations kept after propagation and legality.
    pub commits: u64,
    /// Tentative orientations restored after a failed legality check.
    pub rollbacks: u64,
    /// Reversal records popped by the final safety net.
    pub safety_net_pops: u64,
}

/// The orientation engine.
///
/// Owns its configuration plus the statistics and trace of the most recent
/// run. [`run`](Self::run) is a pure function of its inputs apart from
/// those two observers.
#[derive(Debug, Default)]
pub struct OrientationEngine {
    config: EngineConfig,
    stats: EngineStats,
    trace: Option<OrientationTrace>,
}

impl OrientationEngine {
    /// Creates an engine with the given configuration.
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            stats: EngineStats::default(),
            trace: None,
        }
    }

    /// The engine's configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Counters of the most recent run.
    pub fn stats(&self) -> &EngineStats {
        &self.stats
    }

    /// Takes the trace of the most recent run, leaving `None` behind.
    pub fn take_trace(&mut self) -> Option<OrientationTrace> {
        self.trace.take()
    }

    /// Runs the orientation search over `pag` and returns the finished
    /// graph.
    ///
    /// Single pass over ordered pairs; within a pair the first conditioning
    /// set that passes the C1 guard and yields a legal propagated graph
    /// wins. After all pairs, a safety net re-propagates and, while the
    /// graph is illegal, unwinds one reversal record at a time until
    /// legality returns or the log is exhausted (the best graph reached is
    /// returned in that degraded case).
    pub fn run(
        &mut self,
        pag: Pag,
        oracle: &dyn ChangeOracle,
        propagator: &dyn Propagator,
        legality: &dyn LegalityOracle,
    ) -> Result<Pag, EngineError> {
        self.stats = EngineStats::default();
        let mut working = pag;
        let mut undo = UndoLog::new();
        let mut trace = OrientationTrace::new(graph_fingerprint(&working));

        let mut protected = self.config.protected.clone();
        protected.extend(oracle.contexts().iter().copied());

        let children: Vec<VarId> = working.var_ids().collect();
        for y in children {
            if protected.contains(&y) {
                continue;
            }
            for x in working.neighbors_of(y) {
                if protected.contains(&x) {
                    continue;
                }
                if self.tier_forbids(x, y) {
                    debug!(parent = %x, child = %y, "pair skipped by tier constraint");
                    continue;
                }
                if working.fully_directed(x, y) {
                    continue;
                }
                self.stats.pairs_searched += 1;
                self.search_pair(
                    x,
                    y,
                    &mut working,
                    &mut undo,
                    &mut trace,
                    oracle,
                    propagator,
                    legality,
                )?;
            }
        }

        // Safety net: close the graph once more, then unwind until legal.
        propagator.propagate(&mut working)?;
        while !legality.is_legal(&working)? {
            let Some(entry) = undo.pop() else {
                warn!(
                    "undo log exhausted with the graph still illegal; \
                     returning best graph reached"
                );
                break;
            };
            let pre = graph_fingerprint(&working);
            entry.apply(&mut working);
            propagator.propagate(&mut working)?;
            self.stats.safety_net_pops += 1;
            trace.record(OrientationStep {
                parent: entry.a,
                child: entry.b,
                cond: Vec::new(),
                outcome: StepOutcome::SafetyNetUndo,
                pre_fingerprint: pre,
                post_fingerprint: graph_fingerprint(&working),
            });
            debug!(a = %entry.a, b = %entry.b, "safety net unwound one orientation");
        }

        info!(
            pairs = self.stats.pairs_searched,
            commits = self.stats.commits,
            rollbacks = self.stats.rollbacks,
            safety_net_pops = self.stats.safety_net_pops,
            "orientation run finished"
        );
        self.trace = Some(trace);
        Ok(working)
    }

    /// True when the tier map forbids orienting `parent` into `child`.
    fn tier_forbids(&self, parent: VarId, child: VarId) -> bool {
        match (self.config.tiers.get(&parent), self.config.tiers.get(&child)) {
            (Some(tp), Some(tc)) => tp >= tc,
            _ => false,
        }
    }

    /// Searches conditioning sets for one ordered pair, committing the
    /// first candidate that passes the C1 guard and legality.
    #[allow(clippy::too_many_arguments)]
    fn search_pair(
        &mut self,
        x: VarId,
        y: VarId,
        working: &mut Pag,
        undo: &mut UndoLog,
        trace: &mut OrientationTrace,
        oracle: &dyn ChangeOracle,
        propagator: &dyn Propagator,
        legality: &dyn LegalityOracle,
    ) -> Result<(), EngineError> {
        let contexts = oracle.contexts();
        let pool: Vec<VarId> = working
            .neighbors_of(y)
            .into_iter()
            .filter(|&u| u != x)
            .filter(|u| !self.config.exclude_contexts_from_cond || !contexts.contains(u))
            .collect();

        for cond in Subsets::new(&pool, self.config.max_subset_size) {
            self.stats.candidates_tested += 1;
            if !self.c1_guard(x, y, &cond, oracle)? {
                continue;
            }

            // Tentative orientation: reversal record first, then the
            // arrowhead at the child side only.
            let entry = UndoEntry::capture(working, x, y)
                .ok_or(EngineError::MissingEdge { a: x, b: y })?;
            let pre = graph_fingerprint(working);
            undo.push(entry);
            if working.set_mark(x, y, Mark::Arrow).is_none() {
                return Err(EngineError::MissingEdge { a: x, b: y });
            }

            // Propagation runs on an internal candidate copy so that a
            // failed attempt leaves the working graph restorable from the
            // single reversal record.
            let mut candidate = working.clone();
            propagator.propagate(&mut candidate)?;
            if legality.is_legal(&candidate)? {
                *working = candidate;
                self.stats.commits += 1;
                trace.record(OrientationStep {
                    parent: x,
                    child: y,
                    cond: cond.clone(),
                    outcome: StepOutcome::Committed,
                    pre_fingerprint: pre,
                    post_fingerprint: graph_fingerprint(working),
                });
                info!(parent = %x, child = %y, cond = ?cond, "oriented edge");
                return Ok(());
            }

            // Illegal: restore this one mutation and try the next set.
            if let Some(entry) = undo.pop() {
                entry.apply(working);
            }
            self.stats.rollbacks += 1;
            debug_assert_eq!(graph_fingerprint(working), pre);
            trace.record(OrientationStep {
                parent: x,
                child: y,
                cond: cond.clone(),
                outcome: StepOutcome::RolledBack,
                pre_fingerprint: pre,
                post_fingerprint: graph_fingerprint(working),
            });
            debug!(parent = %x, child = %y, cond = ?cond, "rolled back illegal orientation");
        }
        Ok(())
    }

    /// The C1 orientation test for one candidate conditioning set.
    ///
    /// Requires unexplained environment-dependence of the child given the
    /// set, requires the candidate parent to explain it away, and
    /// optionally requires some single context node to do the same.
    fn c1_guard(
        &self,
        x: VarId,
        y: VarId,
        cond: &[VarId],
        oracle: &dyn ChangeOracle,
    ) -> Result<bool, EngineError> {
        if !oracle.changes(y, cond)? {
            return Ok(false);
        }
        let mut with_parent = cond.to_vec();
        with_parent.push(x);
        with_parent.sort_unstable();
        if !oracle.stable(y, &with_parent)? {
            return Ok(false);
        }
        if self.config.use_proxy_guard && !oracle.contexts().is_empty() {
            let mut proxied = false;
            for &c in oracle.contexts() {
                let mut with_context = cond.to_vec();
                with_context.push(c);
                with_context.sort_unstable();
                if oracle.stable(y, &with_context)? {
                    proxied = true;
                    break;
                }
            }
            if !proxied {
                return Ok(false);
            }
        }
        Ok(true)
    }
}
