//! Newtype indices distinguishing model-consensus positions from sequence
//! positions at the type level, so `viterbi_matrix[i][k]` cannot be
//! transposed by accident.
use index_derive::DpIndex;

/// A model consensus position `k`, `0 <= k <= M`. `k == 0` denotes "no node"
/// (spec.md §3: "tsc[k=0] is -inf for all transitions").
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, DpIndex)]
pub struct ModelPos(pub usize);

/// A sequence position `i`, `0 <= i <= L+1`. `i == 0` and `i == L+1` are the
/// sentinel positions (spec.md §3: "positions 0 and L+1 are sentinels").
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, DpIndex)]
pub struct SeqPos(pub usize);

impl ModelPos {
    pub const ROOT: ModelPos = ModelPos(0);

    #[must_use]
    pub fn is_root(self) -> bool {
        self.0 == 0
    }
}

impl SeqPos {
    pub const START: SeqPos = SeqPos(0);

    #[must_use]
    pub fn is_sentinel(self, l: usize) -> bool {
        self.0 == 0 || self.0 == l + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arithmetic_and_display() {
        let k = ModelPos(5);
        assert_eq!((k + 1).get(), 6);
        assert_eq!((k - 10).get(), 0); // saturates, never panics
        assert_eq!(format!("{k}"), "5");
        assert_eq!(usize::from(k), 5);
        assert_eq!(ModelPos::from(7), ModelPos(7));
    }

    #[test]
    fn root_and_sentinel() {
        assert!(ModelPos::ROOT.is_root());
        assert!(!ModelPos(1).is_root());
        assert!(SeqPos(0).is_sentinel(10));
        assert!(SeqPos(11).is_sentinel(10));
        assert!(!SeqPos(5).is_sentinel(10));
    }
}
