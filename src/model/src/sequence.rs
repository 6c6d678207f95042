//! The digital sequence data model (spec.md §3).
use thiserror::Error;

use crate::index::SeqPos;

/// Errors constructing or indexing a [`DigitalSequence`].
#[derive(Error, Debug, PartialEq, Eq)]
pub enum SequenceError {
    #[error("digital residue code {0} is out of range for an alphabet of cardinality {1}")]
    ResidueOutOfRange(u8, usize),

    #[error("sequence position {0} is a sentinel (0 or L+1) and carries no residue")]
    SentinelAccess(usize),
}

/// A digital sequence: residues `1..=L` drawn from an alphabet of
/// cardinality `K`, with implicit sentinels at `0` and `L+1`.
///
/// Residues are stored as `0..K` digital codes, one byte each -- the
/// mapping from a textual alphabet (e.g. `ACGT` or the twenty amino acids)
/// to digital codes is a concern of the (out-of-scope) model-building
/// layer; this type only requires that codes be `< alphabet_size`.
#[derive(Debug, Clone)]
pub struct DigitalSequence {
    alphabet_size: usize,
    residues: Vec<u8>,
}

impl DigitalSequence {
    /// Build a digital sequence from already-encoded residue codes.
    ///
    /// # Errors
    /// Returns [`SequenceError::ResidueOutOfRange`] if any code is
    /// `>= alphabet_size`.
    pub fn new(alphabet_size: usize, residues: Vec<u8>) -> Result<Self, SequenceError> {
        if let Some(&bad) = residues.iter().find(|&&r| usize::from(r) >= alphabet_size) {
            return Err(SequenceError::ResidueOutOfRange(bad, alphabet_size));
        }
        Ok(Self { alphabet_size, residues })
    }

    /// `L`, the sequence length (number of real residues, excluding
    /// sentinels).
    #[must_use]
    pub fn len(&self) -> usize {
        self.residues.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.residues.is_empty()
    }

    #[must_use]
    pub fn alphabet_size(&self) -> usize {
        self.alphabet_size
    }

    /// The digital code of residue `i`, for `1 <= i <= L`.
    ///
    /// # Errors
    /// Returns [`SequenceError::SentinelAccess`] for `i == 0` or
    /// `i == L + 1` (and any `i` further out of bounds).
    pub fn residue(&self, i: SeqPos) -> Result<u8, SequenceError> {
        let idx = i.get();
        if idx == 0 || idx > self.len() {
            return Err(SequenceError::SentinelAccess(idx));
        }
        Ok(self.residues[idx - 1])
    }

    /// Borrow the raw `1..=L` residue codes (no sentinels).
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.residues
    }
}
