//! Nucleotide sequence value type used by graph edges.
//!
//! Every edge in the graph carries a validated, upper-case ACGT sequence.
//! The two central operations are reverse complementation (conjugate edges
//! carry the reverse complement of their twin) and k-overlap merging
//! (vertex compression glues two edge sequences sharing k nucleotides).

use anyhow::{anyhow, Result};
use bio::alphabets::dna;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A validated DNA sequence (upper-case `A`/`C`/`G`/`T` bytes).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Sequence(Vec<u8>);

impl Sequence {
    /// Build a sequence from raw bytes, normalizing case and rejecting
    /// anything outside the ACGT alphabet.
    pub fn new(bytes: &[u8]) -> Result<Self> {
        let mut data = Vec::with_capacity(bytes.len());
        for (i, &b) in bytes.iter().enumerate() {
            match b.to_ascii_uppercase() {
                c @ (b'A' | b'C' | b'G' | b'T') => data.push(c),
                other => {
                    return Err(anyhow!(
                        "Invalid DNA character '{}' at position {}",
                        other as char,
                        i
                    ))
                }
            }
        }
        Ok(Self(data))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Reverse complement of this sequence.
    pub fn revcomp(&self) -> Self {
        Self(dna::revcomp(&self.0))
    }

    /// A sequence equal to its own reverse complement.
    pub fn is_palindrome(&self) -> bool {
        self.0 == dna::revcomp(&self.0)
    }

    /// Merge `self` and `other`, which must share `k` nucleotides at the
    /// seam (suffix of `self` == prefix of `other`).
    pub fn overlap_merge(&self, other: &Sequence, k: usize) -> Self {
        assert!(
            self.len() >= k && other.len() >= k,
            "overlap merge requires both sequences to span the k-overlap"
        );
        debug_assert_eq!(
            &self.0[self.len() - k..],
            &other.0[..k],
            "overlap merge called on sequences that do not share a (k)-mer"
        );
        let mut merged = self.0.clone();
        merged.extend_from_slice(&other.0[k..]);
        Self(merged)
    }

    /// Hamming distance over the common prefix of the two sequences.
    pub fn hamming(&self, other: &Sequence) -> usize {
        self.0
            .iter()
            .zip(other.0.iter())
            .filter(|(a, b)| a != b)
            .count()
    }

    /// Per-nucleotide counts (A, C, G, T order) over `range`.
    pub fn nucleotide_counts(&self, start: usize, end: usize) -> [usize; 4] {
        let mut counts = [0usize; 4];
        for &b in &self.0[start..end] {
            match b {
                b'A' => counts[0] += 1,
                b'C' => counts[1] += 1,
                b'G' => counts[2] += 1,
                b'T' => counts[3] += 1,
                _ => unreachable!("sequence bytes are validated on construction"),
            }
        }
        counts
    }
}

impl fmt::Display for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Construction guarantees ASCII.
        f.write_str(std::str::from_utf8(&self.0).expect("ACGT bytes are valid UTF-8"))
    }
}

impl std::str::FromStr for Sequence {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s.as_bytes())
    }
}
