//! Posterior decoding (spec.md §4.6): combines matched Forward/Backward
//! matrices into per-cell posterior probabilities.
use phmm_model::prelude::{ModelPos, Profile, SeqPos};
use phmm_model::sequence::DigitalSequence;

use crate::errors::{EngineError, EngineResult};
use crate::matrix::{DenseMatrix, MainSlot, MatrixKind, SpecialSlot};

/// Builds `decoding` (tagged [`MatrixKind::Decoding`]) from a matched
/// `fwd`/`bck` pair and the shared total score, per spec.md §4.6:
/// `pp[i,k,s] = exp(fwd[i,k,s] + bck[i,k,s] - totsc)`, with glocal wing
/// unfolding redistributing `G -> M_k` mass onto the intermediate `D_j^G`
/// cells, and each row renormalised so its emitting-state posteriors sum to
/// one.
///
/// # Errors
/// [`EngineError::WrongMatrixKind`] if `fwd`/`bck` are not tagged
/// `Fwd`/`Bck`, or [`EngineError::InvalidArgument`] on a shape mismatch.
pub fn decode(
    profile: &Profile,
    sequence: &DigitalSequence,
    fwd: &DenseMatrix,
    bck: &DenseMatrix,
    totsc: f32,
    decoding: &mut DenseMatrix,
) -> EngineResult<()> {
    fwd.require_kind(MatrixKind::Fwd)?;
    bck.require_kind(MatrixKind::Bck)?;
    if fwd.m() != bck.m() || fwd.l() != bck.l() {
        return Err(EngineError::InvalidArgument("fwd/bck matrix shapes differ".into()));
    }
    let m = profile.m();
    let l = sequence.len();
    decoding.set_kind(MatrixKind::Decoding);
    decoding.grow(m, l);

    for i in 0..=l {
        let pos = SeqPos(i);
        for k in 1..=m {
            let kc = ModelPos(k);
            for slot in [MainSlot::ML, MainSlot::MG, MainSlot::IL, MainSlot::IG, MainSlot::DL, MainSlot::DG] {
                let pp = ((fwd.get(pos, kc, slot) + bck.get(pos, kc, slot)) - totsc).exp();
                decoding.set(pos, kc, slot, pp);
            }
        }
        for slot in [SpecialSlot::E, SpecialSlot::N, SpecialSlot::J, SpecialSlot::B, SpecialSlot::L, SpecialSlot::G, SpecialSlot::C] {
            let pp = ((fwd.special(pos, slot) + bck.special(pos, slot)) - totsc).exp();
            decoding.set_special(pos, slot, pp);
        }
    }

    // JJ/CC: the posterior that residue i was absorbed by the J or C loop
    // specifically (as opposed to J/C's non-emitting alternatives), computed
    // from the residue-absorbing transition directly rather than reread from
    // the N/J/C cell itself (spec.md §4.6).
    let xsc = profile.xsc();
    use phmm_model::prelude::{SpecialState, XscSlot};
    for i in 1..=l {
        let pos = SeqPos(i);
        let prev = SeqPos(i - 1);
        let jj = ((fwd.special(prev, SpecialSlot::J) + xsc.get(SpecialState::J, XscSlot::Loop) + bck.special(pos, SpecialSlot::J)) - totsc).exp();
        let cc = ((fwd.special(prev, SpecialSlot::C) + xsc.get(SpecialState::C, XscSlot::Loop) + bck.special(pos, SpecialSlot::C)) - totsc).exp();
        decoding.set_special(pos, SpecialSlot::Jj, jj);
        decoding.set_special(pos, SpecialSlot::Cc, cc);
    }

    // Wing unfolding: redistribute each G -> M_k path's mass onto the
    // intermediate D_1^G..D_{k-1}^G cells it wing-retracted through.
    for i in 1..=l {
        let pos = SeqPos(i);
        let prev = SeqPos(i - 1);
        let residue = sequence.residue(pos).expect("i in 1..=l is never a sentinel");
        for k in 2..=m {
            let kc = ModelPos(k);
            let path_mass = ((fwd.special(prev, SpecialSlot::G)
                + profile.gm_entry(kc)
                + profile.emissions().match_score(kc, residue)
                + bck.get(pos, kc, MainSlot::MG))
                - totsc)
                .exp();
            if path_mass <= 0.0 {
                continue;
            }
            for j in 1..k {
                let jc = ModelPos(j);
                let prior = decoding.get(prev, jc, MainSlot::DG);
                decoding.set(prev, jc, MainSlot::DG, prior + path_mass);
            }
        }
    }

    renormalize_rows(decoding, m, l);
    Ok(())
}

fn renormalize_rows(decoding: &mut DenseMatrix, m: usize, l: usize) {
    for i in 1..=l {
        let pos = SeqPos(i);
        let mut total = 0.0_f32;
        for k in 1..=m {
            let kc = ModelPos(k);
            for slot in [MainSlot::ML, MainSlot::MG, MainSlot::IL, MainSlot::IG] {
                total += decoding.get(pos, kc, slot).max(0.0);
            }
        }
        total += decoding.special(pos, SpecialSlot::Jj).max(0.0) + decoding.special(pos, SpecialSlot::Cc).max(0.0);
        if total <= 0.0 || !total.is_finite() {
            continue;
        }
        for k in 1..=m {
            let kc = ModelPos(k);
            for slot in [MainSlot::ML, MainSlot::MG, MainSlot::IL, MainSlot::IG] {
                let v = decoding.get(pos, kc, slot) / total;
                decoding.set(pos, kc, slot, v);
            }
        }
        let jj = decoding.special(pos, SpecialSlot::Jj) / total;
        let cc = decoding.special(pos, SpecialSlot::Cc) / total;
        decoding.set_special(pos, SpecialSlot::Jj, jj);
        decoding.set_special(pos, SpecialSlot::Cc, cc);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backward::backward;
    use crate::forward::forward;
    use phmm_model::logsum::init_logsum;
    use phmm_model::prelude::*;

    /// Local-only profile whose only completing path is `M1 -> D2 -> M3`:
    /// row 1 carries both `M1`'s (emitting) and `D2`'s (non-emitting) full
    /// posterior mass at once, so a renormalisation that leaks `DL`/`DG`
    /// into the denominator under-counts the emitting-state row sum.
    fn delete_skip_profile() -> Profile {
        let m = 3;
        let mut tsc = vec![[f32::NEG_INFINITY; NUM_TRANSITIONS]; m + 1];
        tsc[1][Transition::MdL.index()] = 0.0;
        tsc[2][Transition::DmL.index()] = 0.0;
        let bsc = vec![f32::NEG_INFINITY, 0.0, f32::NEG_INFINITY, f32::NEG_INFINITY];
        let esc = vec![f32::NEG_INFINITY, f32::NEG_INFINITY, f32::NEG_INFINITY, 0.0];
        let gm = vec![f32::NEG_INFINITY; m];
        let half = 0.5_f32.ln();
        let xsc = SpecialTransitions::new([
            [half, half],
            [f32::NEG_INFINITY, 0.0],
            [f32::NEG_INFINITY, 0.0],
            [0.0, -1.0e6], // B: local always, glocal effectively never (finite, not -inf, to keep backward's B subtraction finite)
            [half, half],
        ]);
        let match_scores = vec![0.0; (m + 1) * 2];
        let insert_scores = vec![f32::NEG_INFINITY; (m + 1) * 2];
        Profile::from_raw(
            m, 2, tsc, bsc, esc, gm, match_scores, insert_scores, xsc,
            Mode::new(Topology::LocalOnly, Multiplicity::Unihit, LengthModel::LengthL),
        )
        .unwrap()
    }

    #[test]
    fn emitting_states_sum_to_one_after_renormalisation() {
        init_logsum();
        let profile = delete_skip_profile();
        let seq = DigitalSequence::new(2, vec![0, 0]).unwrap();
        let mut fmx = DenseMatrix::new(MatrixKind::Fwd, profile.m(), seq.len());
        let mut bmx = DenseMatrix::new(MatrixKind::Bck, profile.m(), seq.len());
        let totsc = forward(&profile, &seq, &mut fmx).unwrap();
        backward(&profile, &seq, &mut bmx).unwrap();
        let mut pp = DenseMatrix::new(MatrixKind::Decoding, profile.m(), seq.len());
        decode(&profile, &seq, &fmx, &bmx, totsc, &mut pp).unwrap();

        let pos = SeqPos(1);
        let mut emitting = 0.0_f32;
        for k in 1..=profile.m() {
            let kc = ModelPos(k);
            emitting += pp.get(pos, kc, MainSlot::ML)
                + pp.get(pos, kc, MainSlot::MG)
                + pp.get(pos, kc, MainSlot::IL)
                + pp.get(pos, kc, MainSlot::IG);
        }
        emitting += pp.special(pos, SpecialSlot::Jj) + pp.special(pos, SpecialSlot::Cc);
        assert!(
            float_cmp::approx_eq!(f32, emitting, 1.0, epsilon = 1e-3),
            "emitting-state row sum was {emitting}, expected ~1.0 (DL/DG must not dilute the denominator)"
        );
    }

    /// Glocal-only profile whose sole entry point is `G -> M_3`: the dense
    /// recursion never visits `D_1^G`/`D_2^G` directly (`tsc` stays `-inf`
    /// throughout), so any posterior mass on them comes entirely from wing
    /// unfolding and must be the undivided path mass, not a `1/(k-1)` share.
    fn glocal_wing_profile() -> Profile {
        let m = 3;
        let tsc = vec![[f32::NEG_INFINITY; NUM_TRANSITIONS]; m + 1];
        let bsc = vec![f32::NEG_INFINITY; m + 1];
        let esc = vec![f32::NEG_INFINITY; m + 1];
        let gm = vec![f32::NEG_INFINITY, f32::NEG_INFINITY, -0.1];
        let half = 0.5_f32.ln();
        let xsc = SpecialTransitions::new([
            [half, half],
            [f32::NEG_INFINITY, 0.0],
            [f32::NEG_INFINITY, 0.0],
            [-1.0e6, 0.0], // B: local effectively never (finite), glocal always
            [half, half],
        ]);
        let match_scores = vec![0.0; (m + 1) * 2];
        let insert_scores = vec![f32::NEG_INFINITY; (m + 1) * 2];
        Profile::from_raw(
            m, 2, tsc, bsc, esc, gm, match_scores, insert_scores, xsc,
            Mode::new(Topology::GlocalOnly, Multiplicity::Unihit, LengthModel::LengthL),
        )
        .unwrap()
    }

    #[test]
    fn wing_unfolding_gives_each_intermediate_delete_the_full_mass() {
        init_logsum();
        let profile = glocal_wing_profile();
        let seq = DigitalSequence::new(2, vec![0]).unwrap();
        let mut fmx = DenseMatrix::new(MatrixKind::Fwd, profile.m(), seq.len());
        let mut bmx = DenseMatrix::new(MatrixKind::Bck, profile.m(), seq.len());
        let totsc = forward(&profile, &seq, &mut fmx).unwrap();
        backward(&profile, &seq, &mut bmx).unwrap();
        let mut pp = DenseMatrix::new(MatrixKind::Decoding, profile.m(), seq.len());
        decode(&profile, &seq, &fmx, &bmx, totsc, &mut pp).unwrap();

        let prev = SeqPos(0);
        let pos = SeqPos(1);
        let k3 = ModelPos(3);
        let residue = seq.residue(pos).unwrap();
        let path_mass = ((fmx.special(prev, SpecialSlot::G)
            + profile.gm_entry(k3)
            + profile.emissions().match_score(k3, residue)
            + bmx.get(pos, k3, MainSlot::MG))
            - totsc)
            .exp();
        assert!(path_mass > 0.5, "path_mass should carry most of the probability mass, got {path_mass}");

        for j in 1..3 {
            let got = pp.get(prev, ModelPos(j), MainSlot::DG);
            assert!(
                float_cmp::approx_eq!(f32, got, path_mass, epsilon = 1e-3),
                "D_{j}^G got {got}, expected the full undivided path_mass {path_mass} (not path_mass / (k - 1))"
            );
        }
    }
}
