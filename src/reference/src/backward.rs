//! Reference Backward (spec.md §4.5): traverses the sequence top-down,
//! computing the reverse-direction counterpart to Forward.
use phmm_model::logsum::logsum;
use phmm_model::prelude::{Lane, ModelPos, Profile, SeqPos, SpecialState, Transition, XscSlot};
use phmm_model::sequence::DigitalSequence;

use crate::errors::EngineResult;
use crate::matrix::{DenseMatrix, MainSlot, MatrixKind, SpecialSlot};

/// Fills `matrix` (tagged [`MatrixKind::Bck`], grown to fit) with the
/// Backward recursion and returns `N(0)`, the total log-odds score.
///
/// # Errors
/// Never fails for a well-formed profile/sequence pair.
pub fn backward(profile: &Profile, sequence: &DigitalSequence, matrix: &mut DenseMatrix) -> EngineResult<f32> {
    matrix.set_kind(MatrixKind::Bck);
    matrix.grow(profile.m(), sequence.len());

    let m = profile.m();
    let l = sequence.len();
    let xsc = profile.xsc();

    // Row L: reachable-from-E base case (spec.md §4.5).
    let row_l = SeqPos(l);
    for k in 1..=m {
        let kc = ModelPos(k);
        let ml = profile.esc(kc);
        matrix.set(row_l, kc, MainSlot::ML, ml);
        matrix.set(row_l, kc, MainSlot::IL, f32::NEG_INFINITY);
    }
    matrix.set(row_l, ModelPos(m), MainSlot::MG, 0.0);
    matrix.set(row_l, ModelPos(m), MainSlot::DG, 0.0);
    matrix.set(row_l, ModelPos(m), MainSlot::IG, f32::NEG_INFINITY);
    // D_L never exits directly; D_G exits with probability 1 only at k=M.
    matrix.set(row_l, ModelPos(m), MainSlot::DL, f32::NEG_INFINITY);
    for k in (1..m).rev() {
        let kc = ModelPos(k);
        let kn = ModelPos(k + 1);
        // D_L never exits directly, so it only has the delete-chain alternative.
        matrix.set(row_l, kc, MainSlot::DL, matrix.get(row_l, kn, MainSlot::DL) + profile.transition_score(kc, Transition::dd(Lane::Local)));
        let dg = matrix.get(row_l, kn, MainSlot::DG) + profile.transition_score(kc, Transition::dd(Lane::Glocal));
        matrix.set(row_l, kc, MainSlot::DG, dg);
        let mg = profile.transition_score(kc, Transition::md(Lane::Glocal)) + matrix.get(row_l, kn, MainSlot::DG);
        matrix.set(row_l, kc, MainSlot::MG, mg);
        matrix.set(row_l, kc, MainSlot::IG, f32::NEG_INFINITY);
    }
    matrix.set_special(row_l, SpecialSlot::E, 0.0);
    matrix.set_special(row_l, SpecialSlot::J, xsc.loop_to_j());
    matrix.set_special(row_l, SpecialSlot::C, xsc.move_to_c());
    matrix.set_special(row_l, SpecialSlot::N, f32::NEG_INFINITY);
    matrix.set_special(row_l, SpecialSlot::B, f32::NEG_INFINITY);
    matrix.set_special(row_l, SpecialSlot::L, f32::NEG_INFINITY);
    matrix.set_special(row_l, SpecialSlot::G, f32::NEG_INFINITY);

    for i in (0..l).rev() {
        let cur = SeqPos(i);
        let next = SeqPos(i + 1);
        let residue_next = sequence.residue(next).expect("i+1 in 1..=l is never a sentinel");

        // B(i)/L(i)/G(i): xG/xL accumulation over row i+1's already-known
        // main cells (spec.md §4.5 "accumulate xG and xL").
        let mut b_terms = f32::NEG_INFINITY;
        for k in 1..=m {
            let kc = ModelPos(k);
            let via_local = profile.bsc(kc) + profile.emissions().match_score(kc, residue_next) + matrix.get(next, kc, MainSlot::ML);
            b_terms = logsum(b_terms, via_local);
        }
        let mut g_terms = f32::NEG_INFINITY;
        for k in 1..=m {
            let kc = ModelPos(k);
            let via_glocal = profile.gm_entry(kc) + profile.emissions().match_score(kc, residue_next) + matrix.get(next, kc, MainSlot::MG);
            g_terms = logsum(g_terms, via_glocal);
        }
        matrix.set_special(cur, SpecialSlot::L, b_terms);
        matrix.set_special(cur, SpecialSlot::G, g_terms);
        // B(i) is not separately stored as a distinct value in this
        // convention (L/G already carry B(i)'s downstream effect for the
        // main-cell recursion); J/N/E below read the enter_local/glocal
        // -weighted originals directly via l_terms/g_terms, matching the
        // forward recursion's B -> L/G fan-out in reverse.
        let b = logsum(
            b_terms - profile.xsc().enter_local(),
            g_terms - profile.xsc().enter_glocal(),
        );
        matrix.set_special(cur, SpecialSlot::B, b);

        let j_next = matrix.special(next, SpecialSlot::J);
        let j = logsum(j_next + profile.xsc().get(SpecialState::J, XscSlot::Loop), b + profile.xsc().get(SpecialState::J, XscSlot::Move));
        matrix.set_special(cur, SpecialSlot::J, j);

        let c = matrix.special(next, SpecialSlot::C) + profile.xsc().get(SpecialState::C, XscSlot::Loop);
        matrix.set_special(cur, SpecialSlot::C, c);

        let n_next = matrix.special(next, SpecialSlot::N);
        let e = logsum(j + profile.xsc().loop_to_j(), c + profile.xsc().move_to_c());
        matrix.set_special(cur, SpecialSlot::E, e);
        let n = if i == 0 {
            logsum(f32::NEG_INFINITY, b + profile.xsc().get(SpecialState::N, XscSlot::Move))
        } else {
            logsum(n_next + profile.xsc().get(SpecialState::N, XscSlot::Loop), b + profile.xsc().get(SpecialState::N, XscSlot::Move))
        };
        matrix.set_special(cur, SpecialSlot::N, n);

        if i >= 1 {
            let mut d_local_next = f32::NEG_INFINITY;
            let mut d_glocal_next = f32::NEG_INFINITY;
            for k in (1..=m).rev() {
                let kc = ModelPos(k);
                let local_exit = profile.esc(kc) + e;
                let local_cont = if k < m {
                    profile.transition_score(kc, Transition::mm(Lane::Local)) + profile.emissions().match_score(ModelPos(k + 1), residue_next) + matrix.get(next, ModelPos(k + 1), MainSlot::ML)
                } else {
                    f32::NEG_INFINITY
                };
                let local_ins = if k < m {
                    profile.transition_score(kc, Transition::mi(Lane::Local)) + profile.emissions().insert_score(kc, residue_next) + matrix.get(next, kc, MainSlot::IL)
                } else {
                    f32::NEG_INFINITY
                };
                let local_del = if k < m {
                    profile.transition_score(kc, Transition::md(Lane::Local)) + d_local_next
                } else {
                    f32::NEG_INFINITY
                };
                let ml = logsum(logsum(local_exit, local_cont), logsum(local_ins, local_del));
                matrix.set(cur, kc, MainSlot::ML, ml);

                let glocal_exit = if k == m { e } else { f32::NEG_INFINITY };
                let glocal_cont = if k < m {
                    profile.transition_score(kc, Transition::mm(Lane::Glocal)) + profile.emissions().match_score(ModelPos(k + 1), residue_next) + matrix.get(next, ModelPos(k + 1), MainSlot::MG)
                } else {
                    f32::NEG_INFINITY
                };
                let glocal_ins = if k < m {
                    profile.transition_score(kc, Transition::mi(Lane::Glocal)) + profile.emissions().insert_score(kc, residue_next) + matrix.get(next, kc, MainSlot::IG)
                } else {
                    f32::NEG_INFINITY
                };
                let glocal_del = if k < m {
                    profile.transition_score(kc, Transition::md(Lane::Glocal)) + d_glocal_next
                } else {
                    f32::NEG_INFINITY
                };
                let mg = logsum(logsum(glocal_exit, glocal_cont), logsum(glocal_ins, glocal_del));
                matrix.set(cur, kc, MainSlot::MG, mg);

                let dl = if k == m {
                    f32::NEG_INFINITY
                } else {
                    logsum(
                        profile.transition_score(kc, Transition::dm(Lane::Local)) + profile.emissions().match_score(ModelPos(k + 1), residue_next) + matrix.get(next, ModelPos(k + 1), MainSlot::ML),
                        profile.transition_score(kc, Transition::dd(Lane::Local)) + d_local_next,
                    )
                };
                matrix.set(cur, kc, MainSlot::DL, dl);
                d_local_next = dl;

                let dg = if k == m {
                    e
                } else {
                    logsum(
                        profile.transition_score(kc, Transition::dm(Lane::Glocal)) + profile.emissions().match_score(ModelPos(k + 1), residue_next) + matrix.get(next, ModelPos(k + 1), MainSlot::MG),
                        profile.transition_score(kc, Transition::dd(Lane::Glocal)) + d_glocal_next,
                    )
                };
                matrix.set(cur, kc, MainSlot::DG, dg);
                d_glocal_next = dg;

                let il = if k == m {
                    f32::NEG_INFINITY
                } else {
                    logsum(
                        profile.transition_score(kc, Transition::im(Lane::Local)) + profile.emissions().match_score(ModelPos(k + 1), residue_next) + matrix.get(next, ModelPos(k + 1), MainSlot::ML),
                        profile.transition_score(kc, Transition::ii(Lane::Local)) + profile.emissions().insert_score(kc, residue_next) + matrix.get(next, kc, MainSlot::IL),
                    )
                };
                matrix.set(cur, kc, MainSlot::IL, il);

                let ig = if k == m {
                    f32::NEG_INFINITY
                } else {
                    logsum(
                        profile.transition_score(kc, Transition::im(Lane::Glocal)) + profile.emissions().match_score(ModelPos(k + 1), residue_next) + matrix.get(next, ModelPos(k + 1), MainSlot::MG),
                        profile.transition_score(kc, Transition::ii(Lane::Glocal)) + profile.emissions().insert_score(kc, residue_next) + matrix.get(next, kc, MainSlot::IG),
                    )
                };
                matrix.set(cur, kc, MainSlot::IG, ig);
            }
        }
    }

    Ok(matrix.special(SeqPos(0), SpecialSlot::N))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forward::forward;
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
    fn forward_equals_backward_total_score() {
        init_logsum();
        let profile = two_node_profile();
        let seq = DigitalSequence::new(4, vec![0, 1]).unwrap();
        let mut fmx = DenseMatrix::new(MatrixKind::Fwd, 2, 2);
        let mut bmx = DenseMatrix::new(MatrixKind::Bck, 2, 2);
        let fwd = forward(&profile, &seq, &mut fmx).unwrap();
        let bck = backward(&profile, &seq, &mut bmx).unwrap();
        assert!(float_cmp::approx_eq!(f32, fwd, bck, epsilon = 1e-3), "Forward {fwd} should equal Backward {bck}");
    }
}
