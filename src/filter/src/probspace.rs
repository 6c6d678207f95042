//! The checkpointed filter's per-row recursion, in probability space
//! (spec.md §4.10). Shape-identical to the reference [`forward`]/[`backward`]
//! recursions, but summing instead of log-summing, over striped storage,
//! with a rescale step at the end of every row.
//!
//! [`forward`]: phmm_reference::forward::forward
//! [`backward`]: phmm_reference::backward::backward
use phmm_model::prelude::{Lane, ModelPos, Profile, SpecialState, Transition, XscSlot};

use crate::layout::StripeLayout;
use crate::row::{FilterSpecial, StripedRow};

/// `exp(profile.transition_score(k, t))`.
fn lin_t(profile: &Profile, k: ModelPos, t: Transition) -> f32 {
    profile.transition_score(k, t).exp()
}

/// Advance the Forward filter by one row, consuming `residue` at `cur`.
/// `prev` must be the already-computed, already-rescaled row at `cur - 1`
/// (the seeded [`boundary_row`] for `cur == 1`). Returns the new row and
/// the linear scale factor it applied (`1.0` if none was needed); callers
/// accumulate `ln(factor)` into a running log-total.
#[must_use]
pub fn step_forward(profile: &Profile, layout: &StripeLayout, residue: u8, prev: &StripedRow) -> (StripedRow, f32) {
    let m = profile.m();
    let xsc = profile.xsc();
    let mut cur = StripedRow::zeros(layout);

    let n_prev = prev.special[FilterSpecial::N as usize];
    cur.special[FilterSpecial::N as usize] = n_prev * xsc.get(SpecialState::N, XscSlot::Loop).exp();

    let l_prev = prev.special[FilterSpecial::L as usize];
    let g_prev = prev.special[FilterSpecial::G as usize];

    let mut d_local_prev = 0.0_f32;
    let mut d_glocal_prev = 0.0_f32;
    let mut e = 0.0_f32;

    for k in 1..=m {
        let kc = ModelPos(k);
        let kp = ModelPos(k - 1);
        let idx = layout.index(kc);
        let idx_prev = layout.index(kp);

        let ml_entry = l_prev * profile.bsc(kc).exp();
        let ml = (prev.ml[idx_prev] * lin_t(profile, kp, Transition::mm(Lane::Local))
            + prev.il[idx_prev] * lin_t(profile, kp, Transition::im(Lane::Local))
            + prev.dl[idx_prev] * lin_t(profile, kp, Transition::dm(Lane::Local))
            + ml_entry)
            * profile.emissions().match_score(kc, residue).exp();
        cur.ml[idx] = ml;

        let mg_entry = g_prev * profile.gm_entry(kc).exp();
        let mg = (prev.mg[idx_prev] * lin_t(profile, kp, Transition::mm(Lane::Glocal))
            + prev.ig[idx_prev] * lin_t(profile, kp, Transition::im(Lane::Glocal))
            + prev.dg[idx_prev] * lin_t(profile, kp, Transition::dm(Lane::Glocal))
            + mg_entry)
            * profile.emissions().match_score(kc, residue).exp();
        cur.mg[idx] = mg;

        if k < m {
            let idx_same = layout.index(kc);
            cur.il[idx] = (prev.ml[idx_same] * lin_t(profile, kc, Transition::mi(Lane::Local))
                + prev.il[idx_same] * lin_t(profile, kc, Transition::ii(Lane::Local)))
                * profile.emissions().insert_score(kc, residue).exp();

            cur.ig[idx] = (prev.mg[idx_same] * lin_t(profile, kc, Transition::mi(Lane::Glocal))
                + prev.ig[idx_same] * lin_t(profile, kc, Transition::ii(Lane::Glocal)))
                * profile.emissions().insert_score(kc, residue).exp();
        }

        // Deferred-storage D(i,k): reads M(i,k-1)/D(i,k-1), already written
        // earlier this same k-loop (spec.md §9).
        let dl = cur.ml[idx_prev] * lin_t(profile, kp, Transition::md(Lane::Local)) + d_local_prev * lin_t(profile, kp, Transition::dd(Lane::Local));
        cur.dl[idx] = dl;
        d_local_prev = dl;

        let dg = cur.mg[idx_prev] * lin_t(profile, kp, Transition::md(Lane::Glocal)) + d_glocal_prev * lin_t(profile, kp, Transition::dd(Lane::Glocal));
        cur.dg[idx] = dg;
        d_glocal_prev = dg;

        e += ml * profile.esc(kc).exp();
        if k == m {
            e += mg + dg;
        }
    }

    cur.special[FilterSpecial::E as usize] = e;
    let j_prev = prev.special[FilterSpecial::J as usize];
    let j = j_prev * xsc.get(SpecialState::J, XscSlot::Loop).exp() + e * xsc.loop_to_j().exp();
    cur.special[FilterSpecial::J as usize] = j;

    let c_prev = prev.special[FilterSpecial::C as usize];
    let c = c_prev * xsc.get(SpecialState::C, XscSlot::Loop).exp() + e * xsc.move_to_c().exp();
    cur.special[FilterSpecial::C as usize] = c;

    let n = cur.special[FilterSpecial::N as usize];
    let b = n * xsc.get(SpecialState::N, XscSlot::Move).exp() + j * xsc.get(SpecialState::J, XscSlot::Move).exp();
    cur.special[FilterSpecial::B as usize] = b;
    cur.special[FilterSpecial::L as usize] = b * xsc.enter_local().exp();
    cur.special[FilterSpecial::G as usize] = b * xsc.enter_glocal().exp();

    let factor = cur.rescale_if_needed();
    (cur, factor)
}

/// The seeded boundary row at `i = 0` (spec.md §4.2's `N(0)=1` initial
/// condition, transcribed into probability space).
#[must_use]
pub fn boundary_row(profile: &Profile, layout: &StripeLayout) -> StripedRow {
    let xsc = profile.xsc();
    let mut row = StripedRow::zeros(layout);
    row.special[FilterSpecial::N as usize] = 1.0;
    let b0 = xsc.get(SpecialState::N, XscSlot::Move).exp();
    row.special[FilterSpecial::B as usize] = b0;
    row.special[FilterSpecial::L as usize] = b0 * xsc.enter_local().exp();
    row.special[FilterSpecial::G as usize] = b0 * xsc.enter_glocal().exp();
    row.special[FilterSpecial::Scale as usize] = 1.0;
    row
}

/// The seeded row at `i = L`, the "reachable from E" base case (spec.md
/// §4.5), in probability space.
#[must_use]
pub fn seed_row_l(profile: &Profile, layout: &StripeLayout) -> StripedRow {
    let m = profile.m();
    let mut row = StripedRow::zeros(layout);
    for k in 1..=m {
        let kc = ModelPos(k);
        let idx = layout.index(kc);
        row.ml[idx] = profile.esc(kc).exp();
    }
    let idx_m = layout.index(ModelPos(m));
    row.mg[idx_m] = 1.0;
    row.dg[idx_m] = 1.0;
    for k in (1..m).rev() {
        let kc = ModelPos(k);
        let kn = ModelPos(k + 1);
        let idx = layout.index(kc);
        let idx_n = layout.index(kn);
        row.dl[idx] = row.dl[idx_n] * lin_t(profile, kc, Transition::dd(Lane::Local));
        let dg = row.dg[idx_n] * lin_t(profile, kc, Transition::dd(Lane::Glocal));
        row.dg[idx] = dg;
        row.mg[idx] = lin_t(profile, kc, Transition::md(Lane::Glocal)) * row.dg[idx_n];
    }
    let xsc = profile.xsc();
    row.special[FilterSpecial::E as usize] = 1.0;
    row.special[FilterSpecial::J as usize] = xsc.loop_to_j().exp();
    row.special[FilterSpecial::C as usize] = xsc.move_to_c().exp();
    row.special[FilterSpecial::Scale as usize] = 1.0;
    row
}

/// Advance the Backward filter by one row (`i`, descending from `L-1` down
/// to `0`), given `next` (the already-computed row at `i + 1`) and the
/// residue consumed entering `next`.
#[must_use]
pub fn step_backward(profile: &Profile, layout: &StripeLayout, residue_next: u8, at_start: bool, next: &StripedRow) -> (StripedRow, f32) {
    let m = profile.m();
    let xsc = profile.xsc();
    let mut cur = StripedRow::zeros(layout);

    let mut b_terms = 0.0_f32;
    let mut g_terms = 0.0_f32;
    for k in 1..=m {
        let kc = ModelPos(k);
        let idx = layout.index(kc);
        let emit = profile.emissions().match_score(kc, residue_next).exp();
        b_terms += profile.bsc(kc).exp() * emit * next.ml[idx];
        g_terms += profile.gm_entry(kc).exp() * emit * next.mg[idx];
    }
    cur.special[FilterSpecial::L as usize] = b_terms;
    cur.special[FilterSpecial::G as usize] = g_terms;
    let b = b_terms / xsc.enter_local().exp() + g_terms / xsc.enter_glocal().exp();
    cur.special[FilterSpecial::B as usize] = b;

    let j_next = next.special[FilterSpecial::J as usize];
    let j = j_next * xsc.get(SpecialState::J, XscSlot::Loop).exp() + b * xsc.get(SpecialState::J, XscSlot::Move).exp();
    cur.special[FilterSpecial::J as usize] = j;

    let c_next = next.special[FilterSpecial::C as usize];
    let c = c_next * xsc.get(SpecialState::C, XscSlot::Loop).exp();
    cur.special[FilterSpecial::C as usize] = c;

    let e = j * xsc.loop_to_j().exp() + c * xsc.move_to_c().exp();
    cur.special[FilterSpecial::E as usize] = e;

    let n_next = next.special[FilterSpecial::N as usize];
    let n_loop = if at_start { 0.0 } else { n_next * xsc.get(SpecialState::N, XscSlot::Loop).exp() };
    cur.special[FilterSpecial::N as usize] = n_loop + b * xsc.get(SpecialState::N, XscSlot::Move).exp();

    let mut d_local_next = 0.0_f32;
    let mut d_glocal_next = 0.0_f32;
    for k in (1..=m).rev() {
        let kc = ModelPos(k);
        let idx = layout.index(kc);
        let local_exit = profile.esc(kc).exp() * e;

        let (local_cont, local_ins, local_del, glocal_cont, glocal_ins, glocal_del) = if k < m {
            let kn = ModelPos(k + 1);
            let idx_n = layout.index(kn);
            let match_next = profile.emissions().match_score(kn, residue_next).exp();
            let insert_cur = profile.emissions().insert_score(kc, residue_next).exp();
            (
                lin_t(profile, kc, Transition::mm(Lane::Local)) * match_next * next.ml[idx_n],
                lin_t(profile, kc, Transition::mi(Lane::Local)) * insert_cur * next.il[idx],
                lin_t(profile, kc, Transition::md(Lane::Local)) * d_local_next,
                lin_t(profile, kc, Transition::mm(Lane::Glocal)) * match_next * next.mg[idx_n],
                lin_t(profile, kc, Transition::mi(Lane::Glocal)) * insert_cur * next.ig[idx],
                lin_t(profile, kc, Transition::md(Lane::Glocal)) * d_glocal_next,
            )
        } else {
            (0.0, 0.0, 0.0, 0.0, 0.0, 0.0)
        };

        cur.ml[idx] = local_exit + local_cont + local_ins + local_del;
        let glocal_exit = if k == m { e } else { 0.0 };
        cur.mg[idx] = glocal_exit + glocal_cont + glocal_ins + glocal_del;

        // D_L never exits directly; D_G exits with probability 1 only at k=M.
        let dl = if k == m {
            0.0
        } else {
            lin_t(profile, kc, Transition::dm(Lane::Local)) * next.ml[layout.index(ModelPos(k + 1))] + lin_t(profile, kc, Transition::dd(Lane::Local)) * d_local_next
        };
        cur.dl[idx] = dl;
        d_local_next = dl;

        let dg = if k == m {
            e
        } else {
            lin_t(profile, kc, Transition::dm(Lane::Glocal)) * next.mg[layout.index(ModelPos(k + 1))] + lin_t(profile, kc, Transition::dd(Lane::Glocal)) * d_glocal_next
        };
        cur.dg[idx] = dg;
        d_glocal_next = dg;

        cur.il[idx] = if k == m {
            0.0
        } else {
            lin_t(profile, kc, Transition::im(Lane::Local)) * profile.emissions().match_score(ModelPos(k + 1), residue_next).exp() * next.ml[layout.index(ModelPos(k + 1))]
                + lin_t(profile, kc, Transition::ii(Lane::Local)) * profile.emissions().insert_score(kc, residue_next).exp() * next.il[idx]
        };
        cur.ig[idx] = if k == m {
            0.0
        } else {
            lin_t(profile, kc, Transition::im(Lane::Glocal)) * profile.emissions().match_score(ModelPos(k + 1), residue_next).exp() * next.mg[layout.index(ModelPos(k + 1))]
                + lin_t(profile, kc, Transition::ii(Lane::Glocal)) * profile.emissions().insert_score(kc, residue_next).exp() * next.ig[idx]
        };
    }

    let factor = cur.rescale_if_needed();
    (cur, factor)
}
