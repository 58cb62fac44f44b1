//! Deterministic structural hashing for partial ancestral graphs.
//!
//! Provides a canonical byte encoding of a graph's variables and endpoint
//! marks, hashed with SHA-256 under domain separation and length prefixing
//! so that identical graphs always produce identical fingerprints across
//! fresh builds and runs. The engine uses fingerprints to verify rollback
//! restoration and to record pre/post state in orientation traces.
//!
//! # Citations
//! - SHA-256: NIST FIPS 180-4 (2015)
//! - Domain separation and length prefixing: Bernstein et al., "How to hash
//!   into elliptic curves", Section 3 (2009)

use crate::core::Pag;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A 256-bit hash value.
///
/// Wraps a byte array for type safety; equality and ordering are on the raw
/// bytes.
#[repr(transparent)]
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct HashValue(pub [u8; 32]);

impl HashValue {
    /// Creates a zero hash (all zeros).
    #[inline]
    pub fn zero() -> Self {
        Self([0u8; 32])
    }

    /// Creates a hash from a raw byte array.
    #[inline]
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Returns the raw byte array.
    #[inline]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Computes SHA-256 of the given data with domain separation.
    ///
    /// The digest input is `b"SPG:" || domain || b":v1" ||
    /// length_prefix(data) || data`, where the length prefix is a 64-bit
    /// little-endian byte count.
    pub fn hash_with_domain(domain: &[u8], data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(b"SPG:");
        hasher.update(domain);
        hasher.update(b":v1");
        let len = data.len() as u64;
        hasher.update(len.to_le_bytes());
        hasher.update(data);
        Self(hasher.finalize().into())
    }
}

impl std::fmt::Display for HashValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // First 4 bytes in hex for readability.
        write!(
            f,
            "HashValue({:02x}{:02x}{:02x}{:02x}…)",
            self.0[0], self.0[1], self.0[2], self.0[3]
        )
    }
}

/// Domain tag for whole-graph fingerprints.
const DOMAIN_PAG_V0: &[u8] = b"PAG_GRAPH_V0";

/// Returns the canonical byte encoding of a graph.
///
/// Layout, all counts 64-bit little-endian:
/// variable count, then per variable a length-prefixed UTF-8 name and a
/// role byte; edge count, then per edge (ascending `(a, b)` pair order with
/// `a < b`) both raw identifiers and both mark codes. Two graphs have equal
/// canonical bytes exactly when every variable and every endpoint mark
/// agrees.
pub fn canonical_bytes(pag: &Pag) -> Vec<u8> {
    let mut out = Vec::with_capacity(64 + 16 * pag.var_count());
    out.extend_from_slice(&(pag.var_count() as u64).to_le_bytes());
    for var in pag.variables() {
        out.extend_from_slice(&(var.name.len() as u64).to_le_bytes());
        out.extend_from_slice(var.name.as_bytes());
        out.push(match var.role {
            crate::core::VarRole::Measured => 0,
            crate::core::VarRole::Context => 1,
        });
    }
    let edges = pag.edges();
    out.extend_from_slice(&(edges.len() as u64).to_le_bytes());
    for (a, b, at_a, at_b) in edges {
        out.extend_from_slice(&a.as_u32().to_le_bytes());
        out.extend_from_slice(&b.as_u32().to_le_bytes());
        out.push(at_a.code());
        out.push(at_b.code());
    }
    out
}

/// Computes the structural fingerprint of a graph.
pub fn graph_fingerprint(pag: &Pag) -> HashValue {
    HashValue::hash_with_domain(DOMAIN_PAG_V0, &canonical_bytes(pag))
}
