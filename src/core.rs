//! Core data structures for partial ancestral graphs.
//!
//! Implements the endpoint-marked graph representation used throughout the
//! crate: each adjacent pair of variables carries two independent marks, one
//! per side, drawn from circle (undetermined), arrowhead, and tail.
//!
//! # Citations
//! - Richardson & Spirtes, "Ancestral graph Markov models", Annals of Statistics (2002)
//! - Zhang, "On the completeness of orientation rules for causal discovery in the
//!   presence of latent confounders and selection bias", Artificial Intelligence (2008)
//! - Spirtes, Glymour & Scheines, "Causation, Prediction, and Search" (2000)

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Unique identifier for a variable in the graph.
///
/// Uses a transparent `u32` wrapper; the value is the variable's dataset
/// column index, so identifier order is column order.
///
/// # Invariant
/// - `VarId`s are dense within a given `Pag` instance: `0..var_count`.
/// - Equality, ordering, and hash are based solely on the inner `u32`.
#[repr(transparent)]
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct VarId(u32);

impl VarId {
    /// Smallest possible identifier (for range queries).
    pub const MIN: VarId = VarId(0);
    /// Largest possible identifier (for range queries).
    pub const MAX: VarId = VarId(u32::MAX);

    /// Creates a new `VarId` from a raw `u32`.
    ///
    /// The caller must ensure the index refers to a variable of the graph
    /// the identifier will be used with. Prefer [`Pag::var_ids`].
    #[inline]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw `u32` representation.
    #[inline]
    pub const fn as_u32(&self) -> u32 {
        self.0
    }

    /// Returns the identifier as a `usize` index.
    #[inline]
    pub const fn index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for VarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "V{}", self.0)
    }
}

/// Role of a variable with respect to the observed regime.
///
/// Context variables indicate which environment a sample was drawn from and
/// are assumed exogenous: no edge may carry an arrowhead at a context
/// variable's end.
///
/// # Citations
/// - Mooij, Magliacane & Claassen, "Joint causal inference from multiple
///   contexts", Journal of Machine Learning Research (2020)
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum VarRole {
    /// Ordinary measured (or latent-proxy) variable; orientable.
    Measured,
    /// Environment/context indicator; protected from arrowheads.
    Context,
}

/// A variable of the graph: a column name plus its role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variable {
    /// Column name from the originating dataset.
    pub name: String,
    /// Measured or context.
    pub role: VarRole,
}

impl Variable {
    /// Creates a measured variable with the given name.
    #[inline]
    pub fn measured(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            role: VarRole::Measured,
        }
    }

    /// Creates a context variable with the given name.
    #[inline]
    pub fn context(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            role: VarRole::Context,
        }
    }
}

/// An edge endpoint mark.
///
/// A partial ancestral graph stores one mark per edge side. A fully directed
/// edge `a -> b` has `Tail` at `a` and `Arrow` at `b`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Mark {
    /// Undetermined endpoint (`o`).
    Circle,
    /// Arrowhead (`>`): the causal-effect direction points into this side.
    Arrow,
    /// Tail (`-`): the direction points away from this side.
    Tail,
}

impl Mark {
    /// Stable one-byte code used for canonical serialization.
    #[inline]
    pub const fn code(&self) -> u8 {
        match self {
            Mark::Circle => 0,
            Mark::Arrow => 1,
            Mark::Tail => 2,
        }
    }
}

impl fmt::Display for Mark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mark::Circle => write!(f, "o"),
            Mark::Arrow => write!(f, ">"),
            Mark::Tail => write!(f, "-"),
        }
    }
}

/// A partial ancestral graph with per-side endpoint marks.
///
/// The variable table is indexed by [`VarId`]; the endpoint map holds, for
/// every adjacent ordered pair `(a, b)`, the mark at `b`'s end of the edge
/// between `a` and `b`. Both orientations of a pair are inserted and removed
/// together, so adjacency can be derived from the map.
///
/// A `BTreeMap` keyed by ordered pairs gives the deterministic native node
/// and adjacency enumeration order that the orientation engine's
/// reproducibility contract depends on.
///
/// # Invariants
/// - `(a, b)` is present iff `(b, a)` is present.
/// - No self-loops: `(v, v)` is never present.
/// - All keyed identifiers are below `var_count`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pag {
    /// Variable table, indexed by `VarId`.
    variables: Vec<Variable>,
    /// Mark at the second coordinate's end of the edge between the pair.
    marks: BTreeMap<(VarId, VarId), Mark>,
}

impl Pag {
    /// Creates a graph over the given variables with no edges.
    #[inline]
    pub fn new(variables: Vec<Variable>) -> Self {
        Self {
            variables,
            marks: BTreeMap::new(),
        }
    }

    /// Creates a graph of measured variables from column names.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(names.into_iter().map(Variable::measured).collect())
    }

    /// Returns the number of variables.
    #[inline]
    pub fn var_count(&self) -> usize {
        self.variables.len()
    }

    /// Returns the number of (undirected) edges.
    #[inline]
    pub fn edge_count(&self) -> usize {
        self.marks.len() / 2
    }

    /// Looks up a variable by identifier.
    #[inline]
    pub fn var(&self, id: VarId) -> Option<&Variable> {
        self.variables.get(id.index())
    }

    /// Returns an iterator over all variables in identifier order.
    #[inline]
    pub fn variables(&self) -> impl Iterator<Item = &Variable> {
        self.variables.iter()
    }

    /// Returns all variable identifiers in ascending order.
    ///
    /// This is the graph's native node enumeration order.
    pub fn var_ids(&self) -> impl Iterator<Item = VarId> {
        (0..self.variables.len() as u32).map(VarId::new)
    }

    /// Checks whether the variable carries the context role.
    #[inline]
    pub fn is_context(&self, id: VarId) -> bool {
        matches!(self.var(id), Some(v) if v.role == VarRole::Context)
    }

    /// Reassigns a variable's role.
    ///
    /// Returns `false` when the identifier is out of range.
    pub fn set_role(&mut self, id: VarId, role: VarRole) -> bool {
        match self.variables.get_mut(id.index()) {
            Some(v) => {
                v.role = role;
                true
            }
            None => false,
        }
    }

    /// Adds an edge between `a` and `b` with the given marks at each side.
    ///
    /// # Panics
    /// If `a == b`, either identifier is out of range, or the pair is
    /// already adjacent.
    pub fn add_edge(&mut self, a: VarId, b: VarId, mark_at_a: Mark, mark_at_b: Mark) {
        assert!(a != b, "self-loops are not representable in a PAG");
        assert!(
            a.index() < self.variables.len() && b.index() < self.variables.len(),
            "edge endpoint out of range"
        );
        assert!(!self.is_adjacent(a, b), "pair is already adjacent");
        self.marks.insert((b, a), mark_at_a);
        self.marks.insert((a, b), mark_at_b);
    }

    /// Removes the edge between `a` and `b`, returning `true` if one existed.
    pub fn remove_edge(&mut self, a: VarId, b: VarId) -> bool {
        let at_b = self.marks.remove(&(a, b)).is_some();
        let at_a = self.marks.remove(&(b, a)).is_some();
        debug_assert_eq!(at_a, at_b);
        at_a && at_b
    }

    /// Checks whether `a` and `b` are adjacent.
    #[inline]
    pub fn is_adjacent(&self, a: VarId, b: VarId) -> bool {
        self.marks.contains_key(&(a, b))
    }

    /// Returns the mark at `b`'s end of the edge between `a` and `b`.
    #[inline]
    pub fn mark_at(&self, a: VarId, b: VarId) -> Option<Mark> {
        self.marks.get(&(a, b)).copied()
    }

    /// Sets the mark at `b`'s end of the edge between `a` and `b`.
    ///
    /// Returns the prior mark, or `None` (and changes nothing) when the pair
    /// is not adjacent.
    pub fn set_mark(&mut self, a: VarId, b: VarId, mark: Mark) -> Option<Mark> {
        match self.marks.get_mut(&(a, b)) {
            Some(slot) => Some(std::mem::replace(slot, mark)),
            None => None,
        }
    }

    /// Returns both marks of the edge between `a` and `b` as
    /// `(mark at a, mark at b)`.
    pub fn edge_marks(&self, a: VarId, b: VarId) -> Option<(Mark, Mark)> {
        Some((self.mark_at(b, a)?, self.mark_at(a, b)?))
    }

    /// Checks whether the edge between `a` and `b` is fully directed in
    /// either direction (tail at one end, arrowhead at the other).
    pub fn fully_directed(&self, a: VarId, b: VarId) -> bool {
        matches!(
            self.edge_marks(a, b),
            Some((Mark::Tail, Mark::Arrow)) | Some((Mark::Arrow, Mark::Tail))
        )
    }

    /// Returns the neighbors of `v` in ascending identifier order.
    ///
    /// This is the graph's native adjacency order.
    pub fn neighbors_of(&self, v: VarId) -> Vec<VarId> {
        self.marks
            .range((v, VarId::MIN)..=(v, VarId::MAX))
            .map(|(&(_, u), _)| u)
            .collect()
    }

    /// Checks whether any incident edge carries an arrowhead at `v`.
    pub fn has_arrow_at(&self, v: VarId) -> bool {
        self.neighbors_of(v)
            .into_iter()
            .any(|u| self.mark_at(u, v) == Some(Mark::Arrow))
    }

    /// Returns all edges as `(a, b, mark at a, mark at b)` with `a < b`,
    /// in ascending pair order.
    pub fn edges(&self) -> Vec<(VarId, VarId, Mark, Mark)> {
        self.marks
            .iter()
            .filter(|(&(a, b), _)| a < b)
            .map(|(&(a, b), &at_b)| {
                let at_a = self.marks[&(b, a)];
                (a, b, at_a, at_b)
            })
            .collect()
    }
}
