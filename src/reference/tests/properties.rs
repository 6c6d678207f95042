//! Cross-routine regression scenarios that don't belong to any single DP
//! file: duality between dual-mode Forward and its local/glocal halves, and
//! a small hand-built profile scored at several sequence lengths to check
//! Forward/Viterbi/Backward agree with each other the way the per-routine
//! unit tests check each in isolation but not against one another at once.
use phmm_model::logsum::{init_logsum, logsum};
use phmm_model::prelude::*;
use phmm_model::sequence::DigitalSequence;
use phmm_reference::backward::backward;
use phmm_reference::forward::forward;
use phmm_reference::matrix::{DenseMatrix, MatrixKind};
use phmm_reference::viterbi::viterbi;

/// A one-node profile whose local/glocal entry split is configurable, so the
/// same emission/exit scores can be scored as local-only, glocal-only, or
/// both at once (dual), for the duality check.
fn one_node_profile(topology: Topology, enter_local: f32, enter_glocal: f32) -> Profile {
    let m = 1;
    let tsc = vec![[f32::NEG_INFINITY; NUM_TRANSITIONS]; m + 1];
    let bsc = if enter_local.is_finite() { vec![f32::NEG_INFINITY, -0.1] } else { vec![f32::NEG_INFINITY, f32::NEG_INFINITY] };
    let gm = if enter_glocal.is_finite() { vec![-0.1] } else { vec![f32::NEG_INFINITY] };
    let esc = vec![f32::NEG_INFINITY, -0.2];
    let xsc = SpecialTransitions::new([
        [0.5_f32.ln(), 0.5_f32.ln()],
        [f32::NEG_INFINITY, 0.0],
        [f32::NEG_INFINITY, 0.0],
        [enter_local, enter_glocal],
        [0.5_f32.ln(), 0.5_f32.ln()],
    ]);
    let match_scores = vec![0.0, -0.05];
    let insert_scores = vec![f32::NEG_INFINITY; 2];
    Profile::from_raw(
        m, 2, tsc, bsc, esc, gm, match_scores, insert_scores, xsc,
        Mode::new(topology, Multiplicity::Unihit, LengthModel::LengthL),
    )
    .unwrap()
}

/// (P9) For a unihit dual-mode profile, `Forward_dual` should equal
/// `logsum(Forward_local, Forward_glocal) - log 2`: the dual profile is
/// exactly the local-only and glocal-only profiles each entered with half
/// the prior mass.
#[test]
fn dual_forward_matches_logsum_of_local_and_glocal_minus_log2() {
    init_logsum();
    let seq = DigitalSequence::new(2, vec![0]).unwrap();

    let local = one_node_profile(Topology::LocalOnly, 0.0, f32::NEG_INFINITY);
    let glocal = one_node_profile(Topology::GlocalOnly, f32::NEG_INFINITY, 0.0);
    let dual = one_node_profile(Topology::Dual, 0.5_f32.ln(), 0.5_f32.ln());

    let mut mx = DenseMatrix::new(MatrixKind::Fwd, 1, 1);
    let fwd_local = forward(&local, &seq, &mut mx).unwrap();
    let fwd_glocal = forward(&glocal, &seq, &mut mx).unwrap();
    let fwd_dual = forward(&dual, &seq, &mut mx).unwrap();

    let expected = logsum(fwd_local, fwd_glocal) - 2.0_f32.ln();
    assert!(
        (fwd_dual - expected).abs() < 1e-3,
        "dual={fwd_dual} expected={expected} (local={fwd_local}, glocal={fwd_glocal})"
    );
}

/// A hand-built 3-node local-only profile scored against polyA sequences of
/// increasing length, checking (P1) Forward >= Viterbi and (P2) Forward ==
/// Backward hold simultaneously rather than in separate files against
/// separate fixtures.
fn three_node_profile() -> Profile {
    let m = 3;
    let mut tsc = vec![[f32::NEG_INFINITY; NUM_TRANSITIONS]; m + 1];
    for k in 1..m {
        tsc[k][Transition::MmL.index()] = -0.3;
    }
    let bsc = vec![f32::NEG_INFINITY, -0.1, f32::NEG_INFINITY, f32::NEG_INFINITY];
    let esc = vec![f32::NEG_INFINITY, f32::NEG_INFINITY, f32::NEG_INFINITY, -0.2];
    let gm = vec![f32::NEG_INFINITY; m];
    let half = 0.5_f32.ln();
    let xsc = SpecialTransitions::new([
        [half, half],
        [f32::NEG_INFINITY, 0.0],
        [f32::NEG_INFINITY, 0.0],
        [0.0, f32::NEG_INFINITY],
        [half, half],
    ]);
    let match_scores = vec![-0.05_f32; (m + 1) * 4];
    let insert_scores = vec![f32::NEG_INFINITY; (m + 1) * 4];
    Profile::from_raw(
        m, 4, tsc, bsc, esc, gm, match_scores, insert_scores, xsc,
        Mode::new(Topology::LocalOnly, Multiplicity::Unihit, LengthModel::LengthL),
    )
    .unwrap()
}

#[test]
fn forward_viterbi_backward_agree_across_polya_lengths() {
    init_logsum();
    let profile = three_node_profile();
    for length in 1..=4usize {
        let seq = DigitalSequence::new(4, vec![0u8; length]).unwrap();
        let mut fmx = DenseMatrix::new(MatrixKind::Fwd, profile.m(), length);
        let mut vmx = DenseMatrix::new(MatrixKind::Viterbi, profile.m(), length);
        let mut bmx = DenseMatrix::new(MatrixKind::Bck, profile.m(), length);

        let fwd = forward(&profile, &seq, &mut fmx).unwrap();
        let vit = viterbi(&profile, &seq, &mut vmx).unwrap();
        let bck = backward(&profile, &seq, &mut bmx).unwrap();

        assert!(fwd >= vit - 1e-4, "length {length}: Forward {fwd} should be >= Viterbi {vit}");
        assert!((fwd - bck).abs() < 1e-3, "length {length}: Forward {fwd} should equal Backward {bck}");
    }
}
