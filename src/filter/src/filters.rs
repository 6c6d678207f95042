//! SSV/MSV/Viterbi saturating integer filter stages (spec.md §4.11).
//!
//! Each stage quantises the profile's log-odds scores to fixed-point
//! integers and runs a cut-down DP over striped storage: SSV is a
//! single-hit ungapped local alignment, MSV the same recursion with
//! multi-hit looping through `N`/`J`/`C`, Viterbi the full gapped state
//! machine. All three report a promoted-hit flag, an overflow ("promote,
//! score unknown"), or a conclusive rejection -- never a bare numeric
//! score a caller might mistake for a calibrated one (spec.md §4.11).
use phmm_model::prelude::{Lane, ModelPos, Profile, SeqPos, Transition};
use phmm_model::sequence::DigitalSequence;
use phmm_reference::errors::{EngineError, EngineResult};

use crate::layout::{StripeLayout, LANES_BYTE, LANES_WORD};

/// Fixed-point scale applied to a log-odds nat before quantising to an
/// integer lane; chosen so that typical per-residue scores (a few nats)
/// land well inside `i8`/`i16` range before the bias offset is applied.
const FILTER_SCALE: f32 = 3.0;

/// What a filter stage concluded about a (profile, sequence) pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FilterOutcome {
    /// Score cleared the promotion threshold; pass to a heavier stage.
    Promoted { scaled_score: i32 },
    /// Conclusively below threshold; no further stage needs to run.
    Rejected,
}

fn quantize(score: f32) -> i32 {
    (score * FILTER_SCALE).round() as i32
}

/// Saturating ungapped local-alignment DP shared by SSV and MSV: `multi_hit`
/// toggles whether a new diagonal may start from a prior segment's end
/// (via the loop score `reentry_bonus`) or only from zero.
fn ungapped_filter(
    profile: &Profile,
    sequence: &DigitalSequence,
    layout: &StripeLayout,
    lane_ceiling: i32,
    multi_hit: bool,
) -> EngineResult<FilterOutcome> {
    let m = profile.m();
    let l = sequence.len();
    let reentry_bonus = if multi_hit { quantize(profile.xsc().get(phmm_model::prelude::SpecialState::J, phmm_model::prelude::XscSlot::Loop)) } else { 0 };

    let mut prev = vec![0i32; layout.len()];
    let mut cur = vec![0i32; layout.len()];
    let mut best = 0i32;
    let mut overflowed = false;

    for i in 1..=l {
        let pos = SeqPos(i);
        let residue = sequence.residue(pos).expect("i in 1..=l is never a sentinel");
        let mut running_best_end = 0i32;
        for k in 1..=m {
            let kc = ModelPos(k);
            let idx = layout.index(kc);
            let prev_diag = if k == 1 { 0 } else { prev[layout.index(ModelPos(k - 1))] };
            let entry = if multi_hit { prev_diag.max(running_best_end + reentry_bonus).max(0) } else { prev_diag.max(0) };
            let emit = quantize(profile.emissions().match_score(kc, residue));
            let score = entry.saturating_add(emit);
            cur[idx] = score;
            running_best_end = running_best_end.max(score);
            best = best.max(score);
            if score >= lane_ceiling || score <= -lane_ceiling {
                overflowed = true;
            }
        }
        std::mem::swap(&mut prev, &mut cur);
    }

    if overflowed {
        return Err(EngineError::FilterOverflow);
    }
    Ok(classify(best))
}

/// Single-segment variant: exactly one ungapped diagonal run may
/// contribute (spec.md §4.11: "SSV: single-segment variant of MSV").
///
/// # Errors
/// [`EngineError::FilterOverflow`] if any lane saturates before a verdict
/// is reached.
pub fn ssv_filter(profile: &Profile, sequence: &DigitalSequence) -> EngineResult<FilterOutcome> {
    let layout = StripeLayout::new(profile.m(), LANES_BYTE);
    ungapped_filter(profile, sequence, &layout, i32::from(i8::MAX), false)
}

/// Multi-segment ungapped match filter: diagonals may chain through the
/// `N`/`J`/`C` loop score (spec.md §4.11: "MSV: ungapped match only").
///
/// # Errors
/// [`EngineError::FilterOverflow`] if any lane saturates before a verdict
/// is reached.
pub fn msv_filter(profile: &Profile, sequence: &DigitalSequence) -> EngineResult<FilterOutcome> {
    let layout = StripeLayout::new(profile.m(), LANES_BYTE);
    ungapped_filter(profile, sequence, &layout, i32::from(i8::MAX), true)
}

fn classify(best: i32) -> FilterOutcome {
    const PROMOTION_THRESHOLD: i32 = 1;
    if best >= PROMOTION_THRESHOLD {
        FilterOutcome::Promoted { scaled_score: best }
    } else {
        FilterOutcome::Rejected
    }
}

/// Full gapped state machine in saturating 16-bit fixed point (spec.md
/// §4.11: "Vit: full state machine"). Shape-identical to
/// [`phmm_reference::recursion::run`]'s max-plus recursion, but summing
/// quantised integers with saturation instead of log-summing floats.
///
/// # Errors
/// [`EngineError::FilterOverflow`] if any lane saturates, or
/// [`EngineError::FilterNoResult`] if the bias/transition sums needed to
/// even start the recursion already exceed the saturating ceiling
/// (spec.md §4.11: "if they don't, return a distinguished no-result
/// status").
pub fn viterbi_filter(profile: &Profile, sequence: &DigitalSequence) -> EngineResult<FilterOutcome> {
    let layout = StripeLayout::new(profile.m(), LANES_WORD);
    let m = profile.m();
    let l = sequence.len();
    let ceiling = i32::from(i16::MAX);

    let bias = quantize(profile.xsc().get(phmm_model::prelude::SpecialState::N, phmm_model::prelude::XscSlot::Move));
    if bias.abs() >= ceiling {
        return Err(EngineError::FilterNoResult);
    }

    let mut ml = vec![i32::MIN / 2; layout.len()];
    let mut mg = ml.clone();
    let mut il = ml.clone();
    let mut ig = ml.clone();
    let mut dl = ml.clone();
    let mut dg = ml.clone();
    let (mut n, mut j, mut c) = (0i32, i32::MIN / 2, i32::MIN / 2);
    let mut overflowed = false;

    let qt = |k: ModelPos, t: Transition| quantize(profile.transition_score(k, t));

    for i in 1..=l {
        let pos = SeqPos(i);
        let residue = sequence.residue(pos).expect("i in 1..=l is never a sentinel");
        let mut new_ml = vec![i32::MIN / 2; layout.len()];
        let mut new_mg = new_ml.clone();
        let mut new_il = new_ml.clone();
        let mut new_ig = new_ml.clone();
        let mut new_dl = new_ml.clone();
        let mut new_dg = new_ml.clone();
        let mut e = i32::MIN / 2;
        let b = n.saturating_add(bias);
        let mut d_local_prev = i32::MIN / 2;
        let mut d_glocal_prev = i32::MIN / 2;

        for k in 1..=m {
            let kc = ModelPos(k);
            let idx = layout.index(kc);
            let emit_m = quantize(profile.emissions().match_score(kc, residue));
            let emit_i = if k < m { quantize(profile.emissions().insert_score(kc, residue)) } else { 0 };

            let entry_l = if k == 1 { b.saturating_add(quantize(profile.bsc(kc))) } else {
                let kp = ModelPos(k - 1);
                let pidx = layout.index(kp);
                let candidate = ml[pidx]
                    .saturating_add(qt(kp, Transition::mm(Lane::Local)))
                    .max(il[pidx].saturating_add(qt(kp, Transition::im(Lane::Local))))
                    .max(dl[pidx].saturating_add(qt(kp, Transition::dm(Lane::Local))));
                candidate.max(b.saturating_add(quantize(profile.bsc(kc))))
            };
            let new_ml_val = entry_l.saturating_add(emit_m);
            new_ml[idx] = new_ml_val;

            let entry_g = if k == 1 { b.saturating_add(quantize(profile.gm_entry(kc))) } else {
                let kp = ModelPos(k - 1);
                let pidx = layout.index(kp);
                let candidate = mg[pidx]
                    .saturating_add(qt(kp, Transition::mm(Lane::Glocal)))
                    .max(ig[pidx].saturating_add(qt(kp, Transition::im(Lane::Glocal))))
                    .max(dg[pidx].saturating_add(qt(kp, Transition::dm(Lane::Glocal))));
                candidate.max(b.saturating_add(quantize(profile.gm_entry(kc))))
            };
            let new_mg_val = entry_g.saturating_add(emit_m);
            new_mg[idx] = new_mg_val;

            if k < m {
                new_il[idx] = ml[idx].saturating_add(qt(kc, Transition::mi(Lane::Local))).max(il[idx].saturating_add(qt(kc, Transition::ii(Lane::Local)))).saturating_add(emit_i);
                new_ig[idx] = mg[idx].saturating_add(qt(kc, Transition::mi(Lane::Glocal))).max(ig[idx].saturating_add(qt(kc, Transition::ii(Lane::Glocal)))).saturating_add(emit_i);
            }

            let dl_val = if k == 1 { i32::MIN / 2 } else {
                let kp = ModelPos(k - 1);
                new_ml[layout.index(kp)].saturating_add(qt(kp, Transition::md(Lane::Local))).max(d_local_prev.saturating_add(qt(kp, Transition::dd(Lane::Local))))
            };
            new_dl[idx] = dl_val;
            d_local_prev = dl_val;

            let dg_val = if k == 1 { i32::MIN / 2 } else {
                let kp = ModelPos(k - 1);
                new_mg[layout.index(kp)].saturating_add(qt(kp, Transition::md(Lane::Glocal))).max(d_glocal_prev.saturating_add(qt(kp, Transition::dd(Lane::Glocal))))
            };
            new_dg[idx] = dg_val;
            d_glocal_prev = dg_val;

            e = e.max(new_ml_val.saturating_add(quantize(profile.esc(kc))));
            if k == m {
                e = e.max(new_mg_val).max(dg_val);
            }

            for v in [new_ml_val, new_mg_val, new_il[idx], new_ig[idx], dl_val, dg_val] {
                if v != i32::MIN / 2 && (v >= ceiling || v <= -ceiling) {
                    overflowed = true;
                }
            }
        }

        ml = new_ml;
        mg = new_mg;
        il = new_il;
        ig = new_ig;
        dl = new_dl;
        dg = new_dg;

        j = j.saturating_add(quantize(profile.xsc().get(phmm_model::prelude::SpecialState::J, phmm_model::prelude::XscSlot::Loop))).max(e.saturating_add(quantize(profile.xsc().loop_to_j())));
        c = c.saturating_add(quantize(profile.xsc().get(phmm_model::prelude::SpecialState::C, phmm_model::prelude::XscSlot::Loop))).max(e.saturating_add(quantize(profile.xsc().move_to_c())));
        n = n.saturating_add(quantize(profile.xsc().get(phmm_model::prelude::SpecialState::N, phmm_model::prelude::XscSlot::Loop)));
    }

    if overflowed {
        return Err(EngineError::FilterOverflow);
    }
    let total = c.saturating_add(quantize(profile.xsc().move_to_c()));
    Ok(classify(total))
}
