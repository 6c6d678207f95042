//! Shared row-major recursion body for Viterbi (§4.3) and Forward (§4.4).
//!
//! Both algorithms have the same shape -- the only difference is whether
//! alternative paths are combined with `max` (Viterbi) or `logsum`
//! (Forward) -- so the recursion is written once, parameterised over the
//! combine operator, matching spec.md §9's framing of Viterbi as Forward's
//! max-plus cousin.
use phmm_model::prelude::{Lane, ModelPos, Profile, SeqPos, Transition};
use phmm_model::sequence::DigitalSequence;

use crate::errors::EngineResult;
use crate::matrix::{DenseMatrix, MainSlot, SpecialSlot};

/// Combine `n` alternative log-odds terms into one, `-inf`-safe.
fn fold(combine: &impl Fn(f32, f32) -> f32, terms: impl IntoIterator<Item = f32>) -> f32 {
    terms.into_iter().fold(f32::NEG_INFINITY, |acc, x| combine(acc, x))
}

/// Runs the shared Viterbi/Forward recursion over `matrix`, already sized
/// and tagged by the caller. Returns the final score, `C(L) + xsc[C][Move]`.
pub(crate) fn run(
    profile: &Profile,
    sequence: &DigitalSequence,
    matrix: &mut DenseMatrix,
    combine: impl Fn(f32, f32) -> f32,
) -> EngineResult<f32> {
    let m = profile.m();
    let l = sequence.len();
    let xsc = profile.xsc();
    use phmm_model::prelude::{SpecialState, XscSlot};

    matrix.set_special(SeqPos(0), SpecialSlot::N, 0.0);
    let b0 = combine(
        0.0 + xsc.get(SpecialState::N, XscSlot::Move),
        f32::NEG_INFINITY, // J(0) is -inf: no domain has completed yet
    );
    matrix.set_special(SeqPos(0), SpecialSlot::B, b0);
    matrix.set_special(SeqPos(0), SpecialSlot::L, b0 + xsc.enter_local());
    matrix.set_special(SeqPos(0), SpecialSlot::G, b0 + xsc.enter_glocal());

    for i in 1..=l {
        let cur = SeqPos(i);
        let prev = SeqPos(i - 1);
        let residue = sequence.residue(cur).expect("i in 1..=l is never a sentinel");

        let n_prev = matrix.special(prev, SpecialSlot::N);
        matrix.set_special(cur, SpecialSlot::N, n_prev + xsc.get(SpecialState::N, XscSlot::Loop));

        let l_prev = matrix.special(prev, SpecialSlot::L);
        let g_prev = matrix.special(prev, SpecialSlot::G);

        let mut d_local_prev = f32::NEG_INFINITY;
        let mut d_glocal_prev = f32::NEG_INFINITY;
        let mut exit_terms: Vec<f32> = Vec::with_capacity(m + 2);

        for k in 1..=m {
            let kc = ModelPos(k);
            let kp = ModelPos(k - 1);

            let ml_prev = matrix.get(prev, kp, MainSlot::ML);
            let il_prev = matrix.get(prev, kp, MainSlot::IL);
            let dl_prev = matrix.get(prev, kp, MainSlot::DL);
            let ml_entry = l_prev + profile.bsc(kc);
            let ml = fold(
                &combine,
                [
                    ml_prev + profile.transition_score(kp, Transition::mm(Lane::Local)),
                    il_prev + profile.transition_score(kp, Transition::im(Lane::Local)),
                    dl_prev + profile.transition_score(kp, Transition::dm(Lane::Local)),
                    ml_entry,
                ],
            ) + profile.emissions().match_score(kc, residue);
            matrix.set(cur, kc, MainSlot::ML, ml);

            let mg_prev = matrix.get(prev, kp, MainSlot::MG);
            let ig_prev = matrix.get(prev, kp, MainSlot::IG);
            let dg_prev = matrix.get(prev, kp, MainSlot::DG);
            let mg_entry = g_prev + profile.gm_entry(kc);
            let mg = fold(
                &combine,
                [
                    mg_prev + profile.transition_score(kp, Transition::mm(Lane::Glocal)),
                    ig_prev + profile.transition_score(kp, Transition::im(Lane::Glocal)),
                    dg_prev + profile.transition_score(kp, Transition::dm(Lane::Glocal)),
                    mg_entry,
                ],
            ) + profile.emissions().match_score(kc, residue);
            matrix.set(cur, kc, MainSlot::MG, mg);

            if k < m {
                let ml_prev_same_k = matrix.get(prev, kc, MainSlot::ML);
                let il_prev_same_k = matrix.get(prev, kc, MainSlot::IL);
                let il = combine(
                    ml_prev_same_k + profile.transition_score(kc, Transition::mi(Lane::Local)),
                    il_prev_same_k + profile.transition_score(kc, Transition::ii(Lane::Local)),
                ) + profile.emissions().insert_score(kc, residue);
                matrix.set(cur, kc, MainSlot::IL, il);

                let mg_prev_same_k = matrix.get(prev, kc, MainSlot::MG);
                let ig_prev_same_k = matrix.get(prev, kc, MainSlot::IG);
                let ig = combine(
                    mg_prev_same_k + profile.transition_score(kc, Transition::mi(Lane::Glocal)),
                    ig_prev_same_k + profile.transition_score(kc, Transition::ii(Lane::Glocal)),
                ) + profile.emissions().insert_score(kc, residue);
                matrix.set(cur, kc, MainSlot::IG, ig);
            } else {
                matrix.set(cur, kc, MainSlot::IL, f32::NEG_INFINITY);
                matrix.set(cur, kc, MainSlot::IG, f32::NEG_INFINITY);
            }

            // Deferred-storage D(i,k): uses M(i,k-1) and D(i,k-1), both
            // already written earlier this same k-loop (spec.md §9).
            let dl = combine(
                matrix.get(cur, kp, MainSlot::ML) + profile.transition_score(kp, Transition::md(Lane::Local)),
                d_local_prev + profile.transition_score(kp, Transition::dd(Lane::Local)),
            );
            matrix.set(cur, kc, MainSlot::DL, dl);
            d_local_prev = dl;

            let dg = combine(
                matrix.get(cur, kp, MainSlot::MG) + profile.transition_score(kp, Transition::md(Lane::Glocal)),
                d_glocal_prev + profile.transition_score(kp, Transition::dd(Lane::Glocal)),
            );
            matrix.set(cur, kc, MainSlot::DG, dg);
            d_glocal_prev = dg;

            exit_terms.push(ml + profile.esc(kc));
            if k == m {
                exit_terms.push(mg);
                exit_terms.push(dg);
            }
        }

        let e = fold(&combine, exit_terms);
        matrix.set_special(cur, SpecialSlot::E, e);

        let j_prev = matrix.special(prev, SpecialSlot::J);
        let j = combine(
            j_prev + xsc.get(SpecialState::J, XscSlot::Loop),
            e + xsc.loop_to_j(),
        );
        matrix.set_special(cur, SpecialSlot::J, j);

        let c_prev = matrix.special(prev, SpecialSlot::C);
        let c = combine(
            c_prev + xsc.get(SpecialState::C, XscSlot::Loop),
            e + xsc.move_to_c(),
        );
        matrix.set_special(cur, SpecialSlot::C, c);

        let n = matrix.special(cur, SpecialSlot::N);
        let b = combine(n + xsc.get(SpecialState::N, XscSlot::Move), j + xsc.get(SpecialState::J, XscSlot::Move));
        matrix.set_special(cur, SpecialSlot::B, b);
        matrix.set_special(cur, SpecialSlot::L, b + xsc.enter_local());
        matrix.set_special(cur, SpecialSlot::G, b + xsc.enter_glocal());
    }

    let final_c = matrix.special(SeqPos(l), SpecialSlot::C);
    Ok(final_c + xsc.move_to_c())
}
