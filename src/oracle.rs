//! Change oracle: does a variable's conditional distribution shift with
//! the environment?
//!
//! Wraps a dataset, an environment indicator, a significance level, and a
//! pluggable statistical test into the two boolean queries the orientation
//! engine needs, with memoized verdicts. A test that cannot produce a
//! verdict surfaces a failure; it is never folded into "no change
//! detected", because a silent false would corrupt the causal conclusion.
//!
//! # Citations
//! - Huang, Zhang, Zhang, Ramsey, Sanchez-Romero, Glymour & Schölkopf,
//!   "Causal discovery from heterogeneous/nonstationary data", Journal of
//!   Machine Learning Research (2020)
//! - Peters, Bühlmann & Meinshausen, "Causal inference by using invariant
//!   prediction", Journal of the Royal Statistical Society B (2016)

use crate::cache::{OracleCache, VerdictKey};
use crate::core::VarId;
use crate::dataset::Dataset;
use std::cell::RefCell;
use thiserror::Error;

/// Failure reported by a pluggable change test.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChangeTestError {
    /// A stratum was too small or constant to test.
    #[error("degenerate data: {0}")]
    DegenerateData(String),
    /// The test statistic could not be computed.
    #[error("numerical failure: {0}")]
    Numerical(String),
    /// Any other test-specific failure.
    #[error("{0}")]
    Other(String),
}

/// Failure surfaced by the oracle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OracleError {
    /// The underlying statistical test could not produce a verdict.
    /// Fatal for the whole run.
    #[error("change test could not produce a verdict for {target}: {source}")]
    TestFailure {
        /// The query's target variable.
        target: VarId,
        /// What the test reported.
        #[source]
        source: ChangeTestError,
    },
    /// A query referenced a variable outside the dataset.
    #[error("unknown variable {0}")]
    UnknownVariable(VarId),
}

/// A statistical test deciding whether `target`'s conditional distribution
/// given `cond` varies with the environment at level `alpha`.
///
/// Implementations must be deterministic for fixed inputs. Likelihood-ratio
/// and kernel two-sample tests are typical; none ship with this crate.
pub trait ChangeTest {
    /// Returns `true` when the conditional distribution changes across
    /// environments, `false` when it is invariant, or an error when no
    /// verdict is possible.
    fn test(
        &self,
        data: &Dataset,
        target: VarId,
        cond: &[VarId],
        env: VarId,
        alpha: f64,
    ) -> Result<bool, ChangeTestError>;
}

/// The query surface the orientation engine consumes.
///
/// `stable` defaults to the negation of `changes` at the same significance
/// level: the same underlying test, read the other way around.
pub trait ChangeOracle {
    /// True iff `target`'s conditional distribution given `cond` varies
    /// with the environment.
    fn changes(&self, target: VarId, cond: &[VarId]) -> Result<bool, OracleError>;

    /// True iff the conditional distribution is invariant: conditioning on
    /// `cond` explains away the environment-dependence.
    fn stable(&self, target: VarId, cond: &[VarId]) -> Result<bool, OracleError> {
        Ok(!self.changes(target, cond)?)
    }

    /// The environment/context variables relevant to this run.
    ///
    /// Usually a single node; the engine supports any number.
    fn contexts(&self) -> &[VarId];
}

/// Dataset-backed oracle: one fixed dataset, environment, significance
/// level, and test, with verdicts memoized across queries.
///
/// The cache sits behind a `RefCell` because the engine holds the oracle by
/// shared reference throughout its single-threaded run.
pub struct DatasetChangeOracle<'a, T: ChangeTest + ?Sized> {
    data: &'a Dataset,
    contexts: Vec<VarId>,
    alpha: f64,
    test: &'a T,
    cache: RefCell<OracleCache>,
}

impl<'a, T: ChangeTest + ?Sized> DatasetChangeOracle<'a, T> {
    /// Creates an oracle for one environment variable.
    ///
    /// `alpha` must lie in `(0, 1)`; the runner validates this at its
    /// boundary before construction.
    pub fn new(data: &'a Dataset, env: VarId, alpha: f64, test: &'a T) -> Self {
        Self {
            data,
            contexts: vec![env],
            alpha,
            test,
            cache: RefCell::new(OracleCache::new()),
        }
    }

    /// The significance level the verdicts are taken at.
    #[inline]
    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// Hit/miss counters of the verdict cache.
    pub fn cache_stats(&self) -> crate::cache::CacheStats {
        self.cache.borrow().stats()
    }

    fn check_in_range(&self, id: VarId) -> Result<(), OracleError> {
        if id.index() < self.data.n_cols() {
            Ok(())
        } else {
            Err(OracleError::UnknownVariable(id))
        }
    }
}

impl<'a, T: ChangeTest + ?Sized> ChangeOracle for DatasetChangeOracle<'a, T> {
    fn changes(&self, target: VarId, cond: &[VarId]) -> Result<bool, OracleError> {
        self.check_in_range(target)?;
        for &c in cond {
            self.check_in_range(c)?;
        }
        let key = VerdictKey::new(target, cond);
        if let Some(verdict) = self.cache.borrow_mut().lookup(&key) {
            return Ok(verdict);
        }
        // One environment variable per oracle; the first context is it.
        let env = self.contexts[0];
        let verdict = self
            .test
            .test(self.data, target, &key.cond, env, self.alpha)
            .map_err(|source| OracleError::TestFailure { target, source })?;
        self.cache.borrow_mut().insert(key, verdict);
        Ok(verdict)
    }

    fn contexts(&self) -> &[VarId] {
        &self.contexts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use std::cell::Cell;

    /// Test double that answers from a fixed rule and counts evaluations.
    struct CountingTest {
        calls: Cell<u64>,
    }

    impl ChangeTest for CountingTest {
        fn test(
            &self,
            _data: &Dataset,
            _target: VarId,
            cond: &[VarId],
            _env: VarId,
            _alpha: f64,
        ) -> Result<bool, ChangeTestError> {
            self.calls.set(self.calls.get() + 1);
            // Changes unless something is conditioned on.
            Ok(cond.is_empty())
        }
    }

    struct FailingTest;

    impl ChangeTest for FailingTest {
        fn test(
            &self,
            _data: &Dataset,
            _target: VarId,
            _cond: &[VarId],
            _env: VarId,
            _alpha: f64,
        ) -> Result<bool, ChangeTestError> {
            Err(ChangeTestError::DegenerateData("constant stratum".into()))
        }
    }

    fn two_col_data() -> Dataset {
        Dataset::new(
            vec!["x".into(), "e".into()],
            array![[0.1, 0.0], [0.2, 1.0], [0.3, 1.0]],
        )
        .unwrap()
    }

    #[test]
    fn stable_is_the_negation_of_changes() {
        let data = two_col_data();
        let test = CountingTest { calls: Cell::new(0) };
        let oracle = DatasetChangeOracle::new(&data, VarId::new(1), 0.05, &test);
        let x = VarId::new(0);
        assert!(oracle.changes(x, &[]).unwrap());
        assert!(!oracle.stable(x, &[]).unwrap());
        assert!(oracle.stable(x, &[VarId::new(1)]).unwrap());
    }

    #[test]
    fn verdicts_are_memoized_per_normalized_set() {
        let data = two_col_data();
        let test = CountingTest { calls: Cell::new(0) };
        let oracle = DatasetChangeOracle::new(&data, VarId::new(1), 0.05, &test);
        let x = VarId::new(0);
        let e = VarId::new(1);
        oracle.changes(x, &[e]).unwrap();
        // Same set, same verdict, no second evaluation.
        oracle.changes(x, &[e]).unwrap();
        oracle.stable(x, &[e]).unwrap();
        assert_eq!(test.calls.get(), 1);
        let stats = oracle.cache_stats();
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
    }

    #[test]
    fn test_failure_is_surfaced_not_swallowed() {
        let data = two_col_data();
        let test = FailingTest;
        let oracle = DatasetChangeOracle::new(&data, VarId::new(1), 0.05, &test);
        let err = oracle.changes(VarId::new(0), &[]).unwrap_err();
        assert!(matches!(err, OracleError::TestFailure { .. }));
    }

    #[test]
    fn out_of_range_variables_are_rejected() {
        let data = two_col_data();
        let test = CountingTest { calls: Cell::new(0) };
        let oracle = DatasetChangeOracle::new(&data, VarId::new(1), 0.05, &test);
        let err = oracle.changes(VarId::new(7), &[]).unwrap_err();
        assert_eq!(err, OracleError::UnknownVariable(VarId::new(7)));
        let err = oracle.changes(VarId::new(0), &[VarId::new(7)]).unwrap_err();
        assert_eq!(err, OracleError::UnknownVariable(VarId::new(7)));
    }

    #[test]
    fn contexts_reports_the_environment() {
        let data = two_col_data();
        let test = CountingTest { calls: Cell::new(0) };
        let oracle = DatasetChangeOracle::new(&data, VarId::new(1), 0.05, &test);
        assert_eq!(oracle.contexts(), &[VarId::new(1)]);
    }
}
