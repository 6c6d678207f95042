//! Maximum-expected-gain (gamma-centroid) alignment (spec.md §4.7).
//!
//! Reuses the Viterbi-shaped recursion (`max` over alternatives) but with
//! "DELTA" semantics: transition contributions are `0`/`-inf` (legality-only,
//! via [`Profile::transition_allowed`]) and emission contributions become
//! `pp[i,s] - 1/(1+gamma)`.
use phmm_model::prelude::{Lane, ModelPos, Profile, SeqPos, Transition};
use phmm_model::sequence::DigitalSequence;

use crate::errors::{EngineError, EngineResult};
use crate::matrix::{DenseMatrix, MainSlot, MatrixKind, SpecialSlot};

fn delta(allowed: bool) -> f32 {
    if allowed {
        0.0
    } else {
        f32::NEG_INFINITY
    }
}

/// Runs gamma-centroid alignment against posterior-decoding matrix `pp`,
/// writing the DP into `matrix` (tagged [`MatrixKind::Alignment`]) and
/// returning the total expected-gain score.
///
/// # Errors
/// [`EngineError::InvalidArgument`] if `gamma <= 0.0`.
pub fn meg(profile: &Profile, sequence: &DigitalSequence, pp: &DenseMatrix, gamma: f32, matrix: &mut DenseMatrix) -> EngineResult<f32> {
    if gamma <= 0.0 {
        return Err(EngineError::InvalidArgument(format!("gamma must be > 0, got {gamma}")));
    }
    let reward = 1.0 / (1.0 + gamma);
    let m = profile.m();
    let l = sequence.len();
    matrix.set_kind(MatrixKind::Alignment);
    matrix.grow(m, l);

    for i in 1..=l {
        let cur = SeqPos(i);
        let prev = SeqPos(i - 1);
        let mut d_local_prev = f32::NEG_INFINITY;
        let mut d_glocal_prev = f32::NEG_INFINITY;

        for k in 1..=m {
            let kc = ModelPos(k);
            let kp = ModelPos(k - 1);

            let ml = [
                matrix.get(prev, kp, MainSlot::ML) + delta(profile.transition_allowed(kp, Transition::mm(Lane::Local))),
                matrix.get(prev, kp, MainSlot::IL) + delta(profile.transition_allowed(kp, Transition::im(Lane::Local))),
                matrix.get(prev, kp, MainSlot::DL) + delta(profile.transition_allowed(kp, Transition::dm(Lane::Local))),
                matrix.special(prev, SpecialSlot::L) + delta(profile.bsc(kc).is_finite()),
            ]
            .into_iter()
            .fold(f32::NEG_INFINITY, f32::max)
                + (pp.get(cur, kc, MainSlot::ML) - reward);
            matrix.set(cur, kc, MainSlot::ML, ml);

            let mg = [
                matrix.get(prev, kp, MainSlot::MG) + delta(profile.transition_allowed(kp, Transition::mm(Lane::Glocal))),
                matrix.get(prev, kp, MainSlot::IG) + delta(profile.transition_allowed(kp, Transition::im(Lane::Glocal))),
                matrix.get(prev, kp, MainSlot::DG) + delta(profile.transition_allowed(kp, Transition::dm(Lane::Glocal))),
                matrix.special(prev, SpecialSlot::G) + delta(profile.gm_entry(kc).is_finite()),
            ]
            .into_iter()
            .fold(f32::NEG_INFINITY, f32::max)
                + (pp.get(cur, kc, MainSlot::MG) - reward);
            matrix.set(cur, kc, MainSlot::MG, mg);

            if k < m {
                let il = f32::max(
                    matrix.get(prev, kc, MainSlot::ML) + delta(profile.transition_allowed(kc, Transition::mi(Lane::Local))),
                    matrix.get(prev, kc, MainSlot::IL) + delta(profile.transition_allowed(kc, Transition::ii(Lane::Local))),
                ) + (pp.get(cur, kc, MainSlot::IL) - reward);
                matrix.set(cur, kc, MainSlot::IL, il);

                let ig = f32::max(
                    matrix.get(prev, kc, MainSlot::MG) + delta(profile.transition_allowed(kc, Transition::mi(Lane::Glocal))),
                    matrix.get(prev, kc, MainSlot::IG) + delta(profile.transition_allowed(kc, Transition::ii(Lane::Glocal))),
                ) + (pp.get(cur, kc, MainSlot::IG) - reward);
                matrix.set(cur, kc, MainSlot::IG, ig);
            } else {
                matrix.set(cur, kc, MainSlot::IL, f32::NEG_INFINITY);
                matrix.set(cur, kc, MainSlot::IG, f32::NEG_INFINITY);
            }

            let dl = f32::max(
                matrix.get(cur, kp, MainSlot::ML) + delta(profile.transition_allowed(kp, Transition::md(Lane::Local))),
                d_local_prev + delta(profile.transition_allowed(kp, Transition::dd(Lane::Local))),
            );
            matrix.set(cur, kc, MainSlot::DL, dl);
            d_local_prev = dl;

            let dg = f32::max(
                matrix.get(cur, kp, MainSlot::MG) + delta(profile.transition_allowed(kp, Transition::md(Lane::Glocal))),
                d_glocal_prev + delta(profile.transition_allowed(kp, Transition::dd(Lane::Glocal))),
            );
            matrix.set(cur, kc, MainSlot::DG, dg);
            d_glocal_prev = dg;
        }

        let mut e = f32::NEG_INFINITY;
        for k in 1..=m {
            let kc = ModelPos(k);
            e = f32::max(e, matrix.get(cur, kc, MainSlot::ML) + delta(profile.esc(kc).is_finite()));
        }
        e = f32::max(e, matrix.get(cur, ModelPos(m), MainSlot::MG));
        e = f32::max(e, matrix.get(cur, ModelPos(m), MainSlot::DG));
        matrix.set_special(cur, SpecialSlot::E, e);
        matrix.set_special(cur, SpecialSlot::L, e);
        matrix.set_special(cur, SpecialSlot::G, e);
    }

    Ok(matrix.special(SeqPos(l), SpecialSlot::E))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoding::decode;
    use crate::forward::forward;
    use crate::backward::backward;
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
    fn rejects_nonpositive_gamma() {
        let profile = two_node_profile();
        let seq = DigitalSequence::new(4, vec![0, 1]).unwrap();
        let pp = DenseMatrix::new(MatrixKind::Decoding, 2, 2);
        let mut out = DenseMatrix::new(MatrixKind::Alignment, 2, 2);
        assert!(meg(&profile, &seq, &pp, 0.0, &mut out).is_err());
        assert!(meg(&profile, &seq, &pp, -1.0, &mut out).is_err());
    }

    #[test]
    fn scores_a_real_posterior_matrix_without_blowing_up() {
        init_logsum();
        let profile = two_node_profile();
        let seq = DigitalSequence::new(4, vec![0, 1]).unwrap();

        let mut fwd = DenseMatrix::new(MatrixKind::Fwd, 2, 2);
        let totsc = forward(&profile, &seq, &mut fwd).unwrap();
        let mut bck = DenseMatrix::new(MatrixKind::Bck, 2, 2);
        backward(&profile, &seq, &mut bck).unwrap();
        let mut pp = DenseMatrix::new(MatrixKind::Decoding, 2, 2);
        decode(&profile, &seq, &fwd, &bck, totsc, &mut pp).unwrap();

        let mut out = DenseMatrix::new(MatrixKind::Alignment, 2, 2);
        let score = meg(&profile, &seq, &pp, 1.0, &mut out).unwrap();
        assert!(score.is_finite());
    }
}
