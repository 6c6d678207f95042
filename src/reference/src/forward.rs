//! Reference Forward (spec.md §4.4): the total log-probability summed over
//! all alignment paths.
use phmm_model::logsum::logsum;
use phmm_model::prelude::Profile;
use phmm_model::sequence::DigitalSequence;

use crate::errors::EngineResult;
use crate::matrix::{DenseMatrix, MatrixKind};
use crate::recursion;

/// Fills `matrix` (tagged [`MatrixKind::Fwd`], grown to fit) with the
/// Forward recursion and returns the total log-odds score in nats.
///
/// # Errors
/// Never fails for a well-formed profile/sequence pair; kept as a `Result`
/// for uniformity with the rest of the DP surface.
pub fn forward(profile: &Profile, sequence: &DigitalSequence, matrix: &mut DenseMatrix) -> EngineResult<f32> {
    matrix.set_kind(MatrixKind::Fwd);
    matrix.grow(profile.m(), sequence.len());
    recursion::run(profile, sequence, matrix, logsum)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::viterbi::viterbi;
    use phmm_model::logsum::init_logsum;
    use phmm_model::prelude::*;

    fn two_node_profile() -> Profile {
        let m = 2;
        let mut tsc = vec![[f32::NEG_INFINITY; NUM_TRANSITIONS]; m + 1];
        tsc[1][Transition::MmL.index()] = -0.2;
        let bsc = vec![f32::NEG_INFINITY, -0.1, f32::NEG_INFINITY];
        let esc = vec![f32::NEG_INFINITY, f32::NEG_INFINITY, -0.3];
        let gm = vec![f32::NEG_INFINITY, f32::NEG_INFINITY];
        let half = 0.5_f32.ln();
        let xsc = SpecialTransitions::new([
            [half, half],
            [f32::NEG_INFINITY, 0.0],
            [f32::NEG_INFINITY, 0.0],
            [0.0, f32::NEG_INFINITY],
            [half, half],
        ]);
        let match_scores = vec![0.0; (m + 1) * 4];
        let insert_scores = vec![f32::NEG_INFINITY; (m + 1) * 4];
        Profile::from_raw(
            m, 4, tsc, bsc, esc, gm, match_scores, insert_scores, xsc,
            Mode::new(Topology::LocalOnly, Multiplicity::Unihit, LengthModel::LengthL),
        ).unwrap()
    }

    #[test]
    fn forward_is_at_least_viterbi() {
        init_logsum();
        let profile = two_node_profile();
        let seq = DigitalSequence::new(4, vec![0, 1]).unwrap();
        let mut fmx = DenseMatrix::new(MatrixKind::Fwd, 2, 2);
        let mut vmx = DenseMatrix::new(MatrixKind::Viterbi, 2, 2);
        let fwd = forward(&profile, &seq, &mut fmx).unwrap();
        let vit = viterbi(&profile, &seq, &mut vmx).unwrap();
        assert!(fwd >= vit - 1e-4, "Forward {fwd} should be >= Viterbi {vit}");
    }
}
