//! Capability traits for the external closure collaborators.
//!
//! The orientation engine treats closure-rule propagation, strong-legality
//! checking, and skeleton construction as opaque collaborators, consumed
//! through trait objects rather than bare function pointers so that
//! stateful implementations (caching, instrumented, remote) plug in without
//! changing the engine's control flow. Reference FCI rule sets and
//! `PAG(MAG(G)) == G` checkers live outside this crate.
//!
//! # Citations
//! - Zhang, "On the completeness of orientation rules for causal discovery
//!   in the presence of latent confounders and selection bias", Artificial
//!   Intelligence (2008), rules R1-R10
//! - Ali, Richardson & Spirtes, "Markov equivalence for ancestral graphs",
//!   Annals of Statistics (2009)

use crate::core::Pag;
use crate::dataset::Dataset;
use thiserror::Error;

/// Failure reported by an external collaborator.
///
/// Not locally recoverable: the engine aborts the run rather than guess at
/// the state of a half-propagated graph.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClosureError {
    /// The propagator failed on the given graph.
    #[error("propagator failure: {0}")]
    Propagator(String),
    /// The legality oracle failed to produce a verdict.
    #[error("legality check failure: {0}")]
    Legality(String),
    /// The skeleton builder failed on the dataset.
    #[error("builder failure: {0}")]
    Builder(String),
}

/// Completes a graph's orientations under the closure rule set.
///
/// # Contract
/// - Mutates the graph in place and must be idempotent on an already
///   closed graph: propagating twice equals propagating once. Use
///   [`check_idempotent`] to verify a test implementation.
/// - Never adds or removes adjacencies; only endpoint marks change.
pub trait Propagator {
    /// Applies the closure rules to the whole graph.
    fn propagate(&self, pag: &mut Pag) -> Result<(), ClosureError>;
}

/// Decides whether a graph satisfies strong legality
/// (`PAG(MAG(G)) == G`).
///
/// # Contract
/// - Deterministic and side-effect-free for a fixed graph.
pub trait LegalityOracle {
    /// True iff the graph is strongly legal.
    fn is_legal(&self, pag: &Pag) -> Result<bool, ClosureError>;
}

/// Builds the initial PAG skeleton from a dataset.
///
/// FCI, RFCI, and BOSS-style searches all fit behind this boundary. The
/// returned graph must range over exactly the dataset's columns; the
/// runner validates this and treats a mismatch as fatal.
pub trait PagBuilder {
    /// Runs the discovery search over the full dataset.
    fn build(&self, data: &Dataset) -> Result<Pag, ClosureError>;
}

/// A propagator/legality pair prepared for one graph.
pub struct Closure {
    /// Closure-rule propagator.
    pub propagator: Box<dyn Propagator>,
    /// Strong-legality oracle.
    pub legality: Box<dyn LegalityOracle>,
}

/// Produces the closure collaborators for a given graph.
///
/// A factory rather than a pair of values because real propagators are
/// typically constructed against a specific node table.
pub trait ClosureFactory {
    /// Builds the collaborators for `pag`.
    fn closure(&self, pag: &Pag) -> Closure;
}

/// Propagator that applies no rules at all.
///
/// Trivially idempotent; used by tests and benches.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityPropagator;

impl Propagator for IdentityPropagator {
    fn propagate(&self, _pag: &mut Pag) -> Result<(), ClosureError> {
        Ok(())
    }
}

/// Legality oracle that accepts every graph.
///
/// Used by tests and benches.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysLegal;

impl LegalityOracle for AlwaysLegal {
    fn is_legal(&self, _pag: &Pag) -> Result<bool, ClosureError> {
        Ok(true)
    }
}

/// Factory bundling [`IdentityPropagator`] and [`AlwaysLegal`].
#[derive(Debug, Clone, Copy, Default)]
pub struct TrivialClosureFactory;

impl ClosureFactory for TrivialClosureFactory {
    fn closure(&self, _pag: &Pag) -> Closure {
        Closure {
            propagator: Box::new(IdentityPropagator),
            legality: Box::new(AlwaysLegal),
        }
    }
}

/// Verifies the idempotence contract of a propagator on a given graph.
///
/// Returns `true` when `propagate(propagate(G)) == propagate(G)` with all
/// endpoint marks compared exactly. Contract tests for stub propagators
/// must call this and reject implementations for which it returns `false`.
pub fn check_idempotent(
    propagator: &dyn Propagator,
    pag: &Pag,
) -> Result<bool, ClosureError> {
    let mut once = pag.clone();
    propagator.propagate(&mut once)?;
    let mut twice = once.clone();
    propagator.propagate(&mut twice)?;
    Ok(once == twice)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Mark, Pag, VarId};

    fn circle_pair() -> Pag {
        let mut pag = Pag::from_names(["x", "y"]);
        pag.add_edge(VarId::new(0), VarId::new(1), Mark::Circle, Mark::Circle);
        pag
    }

    /// Propagator that keeps sharpening marks forever: each call rotates
    /// the mark at y, so it can never be idempotent.
    struct RotatingPropagator;

    impl Propagator for RotatingPropagator {
        fn propagate(&self, pag: &mut Pag) -> Result<(), ClosureError> {
            let (x, y) = (VarId::new(0), VarId::new(1));
            let next = match pag.mark_at(x, y) {
                Some(Mark::Circle) => Mark::Arrow,
                Some(Mark::Arrow) => Mark::Tail,
                Some(Mark::Tail) => Mark::Circle,
                None => return Err(ClosureError::Propagator("missing edge".into())),
            };
            pag.set_mark(x, y, next);
            Ok(())
        }
    }

    #[test]
    fn identity_propagator_is_idempotent() {
        let pag = circle_pair();
        assert!(check_idempotent(&IdentityPropagator, &pag).unwrap());
    }

    #[test]
    fn rotating_propagator_fails_the_contract_check() {
        let pag = circle_pair();
        assert!(!check_idempotent(&RotatingPropagator, &pag).unwrap());
    }

    #[test]
    fn identity_propagator_leaves_the_graph_alone() {
        let pag = circle_pair();
        let mut touched = pag.clone();
        IdentityPropagator.propagate(&mut touched).unwrap();
        assert_eq!(pag, touched);
    }

    #[test]
    fn always_legal_accepts_anything() {
        assert!(AlwaysLegal.is_legal(&circle_pair()).unwrap());
    }

    #[test]
    fn trivial_factory_bundles_the_trivial_pair() {
        let pag = circle_pair();
        let closure = TrivialClosureFactory.closure(&pag);
        let mut copy = pag.clone();
        closure.propagator.propagate(&mut copy).unwrap();
        assert_eq!(copy, pag);
        assert!(closure.legality.is_legal(&pag).unwrap());
    }
}
