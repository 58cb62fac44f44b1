//! Undo log and orientation trace.
//!
//! The engine's transaction protocol records every tentative mutation as
//! data before it happens: an [`UndoEntry`] captures the exact prior marks
//! on both sides of one edge, so rolling back is a pure restore with no
//! closures over live graph state. Alongside the log, an
//! [`OrientationTrace`] keeps a replayable record of every attempt for
//! diagnostics; traces serialize to CBOR and round-trip from disk. The
//! trace never feeds back into the run result.
//!
//! # Citations
//! - Command pattern as data: Gamma, Helm, Johnson & Vlissides, "Design
//!   Patterns" (1994), Memento
//! - Transformation traces: Jouault & Kurtev, "Transforming models with
//!   ATL" (2005)

use crate::core::{Mark, Pag, VarId};
use crate::fingerprint::HashValue;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Reversal record for one tentative edge mutation.
///
/// Captures both endpoint marks of the edge between `a` and `b` exactly as
/// they were before the mutation. Applying the entry restores both marks,
/// whether or not the mutation ever touched them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UndoEntry {
    /// One endpoint of the edge.
    pub a: VarId,
    /// The other endpoint.
    pub b: VarId,
    /// Prior mark at `a`'s end.
    pub mark_at_a: Mark,
    /// Prior mark at `b`'s end.
    pub mark_at_b: Mark,
}

impl UndoEntry {
    /// Captures the current marks of the edge between `a` and `b`.
    ///
    /// Returns `None` when the pair is not adjacent.
    pub fn capture(pag: &Pag, a: VarId, b: VarId) -> Option<Self> {
        let (mark_at_a, mark_at_b) = pag.edge_marks(a, b)?;
        Some(Self {
            a,
            b,
            mark_at_a,
            mark_at_b,
        })
    }

    /// Restores both recorded marks on the graph.
    ///
    /// Returns `false` when the edge no longer exists (nothing restored).
    pub fn apply(&self, pag: &mut Pag) -> bool {
        let at_a = pag.set_mark(self.b, self.a, self.mark_at_a).is_some();
        let at_b = pag.set_mark(self.a, self.b, self.mark_at_b).is_some();
        at_a && at_b
    }
}

/// LIFO stack of reversal records.
///
/// Pushed immediately before every tentative mutation; popped either to
/// roll back a single failed candidate or, in the final safety net, entry
/// by entry until the graph is legal again or the log is exhausted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UndoLog {
    entries: Vec<UndoEntry>,
}

impl UndoLog {
    /// Creates an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Pushes a reversal record.
    pub fn push(&mut self, entry: UndoEntry) {
        self.entries.push(entry);
    }

    /// Pops the most recent reversal record.
    pub fn pop(&mut self) -> Option<UndoEntry> {
        self.entries.pop()
    }

    /// Number of records on the log.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing is on the log.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// What became of one orientation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepOutcome {
    /// The guards passed and the propagated graph was legal; the arrowhead
    /// stayed.
    Committed,
    /// The propagated graph was illegal; the prior marks were restored.
    RolledBack,
    /// The final safety net popped this edge's reversal record.
    SafetyNetUndo,
}

/// Record of one orientation attempt on one ordered pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrientationStep {
    /// Candidate parent (the `X` of `X *-> Y`).
    pub parent: VarId,
    /// Candidate child (the side receiving the arrowhead).
    pub child: VarId,
    /// Conditioning set the C1 guard passed with (empty for safety-net
    /// undos).
    pub cond: Vec<VarId>,
    /// How the attempt ended.
    pub outcome: StepOutcome,
    /// Graph fingerprint immediately before the tentative mutation.
    pub pre_fingerprint: HashValue,
    /// Graph fingerprint after commit or restore.
    pub post_fingerprint: HashValue,
}

/// Error raised by trace persistence.
///
/// Storage failures are diagnostics-only and never turn into run failures.
#[derive(Debug, Error)]
pub enum TraceStorageError {
    /// CBOR encoding or decoding failed.
    #[error("trace encoding: {0}")]
    Encoding(#[from] serde_cbor::Error),
    /// Reading or writing the backing file failed.
    #[error("trace io: {0}")]
    Io(#[from] std::io::Error),
}

/// Append-only record of a run's orientation decisions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrientationTrace {
    /// Fingerprint of the graph the engine started from.
    initial_fingerprint: HashValue,
    /// Steps in the order they were attempted.
    steps: Vec<OrientationStep>,
}

impl OrientationTrace {
    /// Creates an empty trace for a run starting from the fingerprinted
    /// graph.
    pub fn new(initial_fingerprint: HashValue) -> Self {
        Self {
            initial_fingerprint,
            steps: Vec::new(),
        }
    }

    /// Fingerprint of the initial graph.
    pub fn initial_fingerprint(&self) -> HashValue {
        self.initial_fingerprint
    }

    /// Appends a step.
    pub fn record(&mut self, step: OrientationStep) {
        self.steps.push(step);
    }

    /// All steps in attempt order.
    pub fn steps(&self) -> &[OrientationStep] {
        &self.steps
    }

    /// Number of recorded steps.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// True when no attempt was recorded.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Number of committed orientations.
    pub fn committed_count(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| s.outcome == StepOutcome::Committed)
            .count()
    }

    /// Serializes the trace to CBOR bytes.
    pub fn to_cbor(&self) -> Result<Vec<u8>, TraceStorageError> {
        Ok(serde_cbor::to_vec(self)?)
    }

    /// Deserializes a trace from CBOR bytes.
    pub fn from_cbor(bytes: &[u8]) -> Result<Self, TraceStorageError> {
        Ok(serde_cbor::from_slice(bytes)?)
    }

    /// Writes the trace to a file in CBOR format.
    pub fn save_to_file(&self, path: &std::path::Path) -> Result<(), TraceStorageError> {
        std::fs::write(path, self.to_cbor()?)?;
        Ok(())
    }

    /// Reads a trace back from a CBOR file.
    pub fn load_from_file(path: &std::path::Path) -> Result<Self, TraceStorageError> {
        Self::from_cbor(&std::fs::read(path)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::graph_fingerprint;

    fn circle_pair() -> Pag {
        let mut pag = Pag::from_names(["x", "y"]);
        pag.add_edge(VarId::new(0), VarId::new(1), Mark::Circle, Mark::Circle);
        pag
    }

    #[test]
    fn capture_and_apply_restore_both_marks() {
        let mut pag = circle_pair();
        let (x, y) = (VarId::new(0), VarId::new(1));
        let entry = UndoEntry::capture(&pag, x, y).unwrap();
        let before = graph_fingerprint(&pag);
        pag.set_mark(x, y, Mark::Arrow);
        pag.set_mark(y, x, Mark::Tail);
        assert_ne!(graph_fingerprint(&pag), before);
        assert!(entry.apply(&mut pag));
        assert_eq!(graph_fingerprint(&pag), before);
    }

    #[test]
    fn capture_fails_without_an_edge() {
        let pag = Pag::from_names(["x", "y"]);
        assert!(UndoEntry::capture(&pag, VarId::new(0), VarId::new(1)).is_none());
    }

    #[test]
    fn undo_log_is_lifo() {
        let pag = circle_pair();
        let (x, y) = (VarId::new(0), VarId::new(1));
        let first = UndoEntry::capture(&pag, x, y).unwrap();
        let second = UndoEntry {
            mark_at_a: Mark::Tail,
            ..first
        };
        let mut log = UndoLog::new();
        assert!(log.is_empty());
        log.push(first);
        log.push(second);
        assert_eq!(log.len(), 2);
        assert_eq!(log.pop(), Some(second));
        assert_eq!(log.pop(), Some(first));
        assert_eq!(log.pop(), None);
    }

    #[test]
    fn trace_counts_commits() {
        let fp = HashValue::zero();
        let mut trace = OrientationTrace::new(fp);
        assert!(trace.is_empty());
        let step = OrientationStep {
            parent: VarId::new(0),
            child: VarId::new(1),
            cond: vec![],
            outcome: StepOutcome::Committed,
            pre_fingerprint: fp,
            post_fingerprint: fp,
        };
        trace.record(step.clone());
        trace.record(OrientationStep {
            outcome: StepOutcome::RolledBack,
            ..step
        });
        assert_eq!(trace.len(), 2);
        assert_eq!(trace.committed_count(), 1);
    }

    #[test]
    fn trace_round_trips_through_cbor() {
        let mut trace = OrientationTrace::new(HashValue::zero());
        trace.record(OrientationStep {
            parent: VarId::new(2),
            child: VarId::new(0),
            cond: vec![VarId::new(1)],
            outcome: StepOutcome::Committed,
            pre_fingerprint: HashValue::zero(),
            post_fingerprint: HashValue::from_bytes([7u8; 32]),
        });
        let bytes = trace.to_cbor().unwrap();
        let restored = OrientationTrace::from_cbor(&bytes).unwrap();
        assert_eq!(trace, restored);
    }

    #[test]
    fn trace_round_trips_through_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.trace");
        let trace = OrientationTrace::new(HashValue::from_bytes([3u8; 32]));
        trace.save_to_file(&path).unwrap();
        let restored = OrientationTrace::load_from_file(&path).unwrap();
        assert_eq!(trace, restored);
    }
}
