//! Reference Viterbi (spec.md §4.3): the optimal-path score.
use phmm_model::prelude::Profile;
use phmm_model::sequence::DigitalSequence;

use crate::errors::EngineResult;
use crate::matrix::{DenseMatrix, MatrixKind};
use crate::recursion;

/// Fills `matrix` (tagged [`MatrixKind::Viterbi`], grown to fit) with the
/// Viterbi recursion and returns the optimal alignment score in nats.
///
/// # Errors
/// Never returns an error for a well-formed matrix (spec.md §4.3: "errors
/// are impossible in a well-formed matrix"); the `Result` exists for
/// consistency with the rest of the DP surface and to surface caller
/// contract violations caught upstream.
pub fn viterbi(profile: &Profile, sequence: &DigitalSequence, matrix: &mut DenseMatrix) -> EngineResult<f32> {
    matrix.set_kind(MatrixKind::Viterbi);
    matrix.grow(profile.m(), sequence.len());
    recursion::run(profile, sequence, matrix, f32::max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use phmm_model::prelude::*;

    fn single_node_profile() -> Profile {
        let m = 1;
        let mut tsc = vec![[f32::NEG_INFINITY; NUM_TRANSITIONS]; m + 1];
        tsc[0] = [f32::NEG_INFINITY; NUM_TRANSITIONS];
        let bsc = vec![f32::NEG_INFINITY, 0.0];
        let esc = vec![f32::NEG_INFINITY, 0.0];
        let gm = vec![f32::NEG_INFINITY]; // glocal entry disabled: local-only profile
        let half = 0.5_f32.ln();
        let xsc = SpecialTransitions::new([
            [half, half],
            [f32::NEG_INFINITY, 0.0],
            [f32::NEG_INFINITY, 0.0], // J unreachable: unihit
            [0.0, f32::NEG_INFINITY], // B: always local
            [half, half],
        ]);
        let match_scores = vec![0.0, 0.0, 0.0]; // M=1, K=3: row0 (sentinel) + row1
        let insert_scores = vec![f32::NEG_INFINITY; 3];
        Profile::from_raw(
            m, 3, tsc, bsc, esc, gm, match_scores, insert_scores, xsc,
            Mode::new(Topology::LocalOnly, Multiplicity::Unihit, LengthModel::LengthL),
        ).unwrap()
    }

    #[test]
    fn single_residue_single_node_alignment() {
        let profile = single_node_profile();
        let seq = DigitalSequence::new(3, vec![0]).unwrap();
        let mut matrix = DenseMatrix::new(MatrixKind::Viterbi, 1, 1);
        let score = viterbi(&profile, &seq, &mut matrix).unwrap();
        // N->B (move, log 0.5) -> L (0.0) -> M1 (bsc 0.0 + emission 0.0) -> E (esc 0.0)
        // -> C (move_to_c 0.0) -> T (xsc[C].Move, log 0.5)
        let expected = 2.0 * 0.5_f32.ln();
        assert!(float_cmp::approx_eq!(f32, score, expected, epsilon = 1e-5), "got {score}, expected {expected}");
    }
}
