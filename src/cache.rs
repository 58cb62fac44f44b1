//! Memoization for change-oracle verdicts.
//!
//! The orientation engine asks the same `(target, conditioning set)`
//! question many times while it walks candidate parents of a shared child,
//! and each answer costs a full statistical test over the dataset. Verdicts
//! are deterministic for fixed inputs, so they are safe to memoize for the
//! lifetime of a run.
//!
//! # References
//! - Deterministic cache keys: [Stable Hashing for Incremental Computation, PLDI 2021]
//! - Memoization of oracle calls: [Self-Adjusting Computation, POPL 2009]

use crate::core::VarId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Key for a cached oracle verdict.
///
/// The conditioning set is stored sorted and deduplicated, so two queries
/// over the same mathematical set always collide on the same entry
/// regardless of the order the engine assembled them in.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct VerdictKey {
    /// Variable whose conditional distribution is being probed.
    pub target: VarId,
    /// Sorted, deduplicated conditioning set.
    pub cond: Vec<VarId>,
}

impl VerdictKey {
    /// Creates a key, normalizing the conditioning set.
    pub fn new(target: VarId, cond: &[VarId]) -> Self {
        let mut cond = cond.to_vec();
        cond.sort_unstable();
        cond.dedup();
        Self { target, cond }
    }
}

/// Hit/miss counters for a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Lookups answered from the cache.
    pub hits: u64,
    /// Lookups that fell through to the statistical test.
    pub misses: u64,
}

/// Verdict store for one oracle over one dataset.
///
/// Backed by a `BTreeMap` so that iteration (for diagnostics) is
/// deterministic. Entries are never invalidated: the dataset, environment,
/// and significance level are fixed for the cache's lifetime.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OracleCache {
    verdicts: BTreeMap<VerdictKey, bool>,
    stats: CacheStats,
}

impl OracleCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up a verdict, counting the outcome.
    pub fn lookup(&mut self, key: &VerdictKey) -> Option<bool> {
        match self.verdicts.get(key).copied() {
            Some(v) => {
                self.stats.hits += 1;
                Some(v)
            }
            None => {
                self.stats.misses += 1;
                None
            }
        }
    }

    /// Stores a verdict.
    pub fn insert(&mut self, key: VerdictKey, verdict: bool) {
        self.verdicts.insert(key, verdict);
    }

    /// Number of stored verdicts.
    pub fn len(&self) -> usize {
        self.verdicts.len()
    }

    /// True when nothing has been stored yet.
    pub fn is_empty(&self) -> bool {
        self.verdicts.is_empty()
    }

    /// Current hit/miss counters.
    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    /// Drops all verdicts and resets the counters.
    pub fn clear(&mut self) {
        self.verdicts.clear();
        self.stats = CacheStats::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_normalizes_order_and_duplicates() {
        let a = VerdictKey::new(VarId::new(0), &[VarId::new(3), VarId::new(1)]);
        let b = VerdictKey::new(
            VarId::new(0),
            &[VarId::new(1), VarId::new(3), VarId::new(1)],
        );
        assert_eq!(a, b);
    }

    #[test]
    fn different_targets_never_collide() {
        let a = VerdictKey::new(VarId::new(0), &[VarId::new(1)]);
        let b = VerdictKey::new(VarId::new(2), &[VarId::new(1)]);
        assert_ne!(a, b);
    }

    #[test]
    fn lookup_counts_hits_and_misses() {
        let mut cache = OracleCache::new();
        let key = VerdictKey::new(VarId::new(0), &[]);
        assert_eq!(cache.lookup(&key), None);
        cache.insert(key.clone(), true);
        assert_eq!(cache.lookup(&key), Some(true));
        assert_eq!(cache.lookup(&key), Some(true));
        assert_eq!(cache.stats(), CacheStats { hits: 2, misses: 1 });
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn clear_resets_everything() {
        let mut cache = OracleCache::new();
        let key = VerdictKey::new(VarId::new(4), &[VarId::new(2)]);
        cache.insert(key.clone(), false);
        cache.lookup(&key);
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.stats(), CacheStats::default());
    }
}
