//! Anchor-set-constrained (ASC) Forward/Backward/Decoding (spec.md §4.9).
//!
//! An anchor set is an ordered list of `(i, k)` pairs with strictly
//! increasing `i`; a valid alignment must pass through `M_k` at row `i` for
//! every anchor, in order. Each anchor splits the lattice into an "UP"
//! sector (may enter the model via `B`, may not exit to `E`) and a "DOWN"
//! sector (may exit to `E`, may not enter via `B`); between two anchors,
//! `DOWN` of the earlier one and `UP` of the later one are both active
//! over an overlapping row/column range, connected by `E -> J -> B`
//! ("J-state reconnection"), since the anchor set only constrains where the
//! path must land, not what happens strictly between two consecutive
//! anchors.
//!
//! `up` and `down` are kept as genuinely separate [`DenseMatrix`] values
//! (spec.md's "the two sector matrices are disjoint"): `up` owns the
//! entry-side special states (`N`, `B`, `L`, `G`), `down` owns the exit-side
//! special states (`E`, `J`, `C`). A row strictly between two anchors can
//! hold live values in both matrices simultaneously -- one for mass still
//! propagating through the earlier anchor's `DOWN` chain, one for mass that
//! has freshly re-entered via `J -> B` toward the next anchor's `UP` sector.
use phmm_model::logsum::logsum;
use phmm_model::prelude::{Lane, ModelPos, Profile, SeqPos, SpecialState, Transition, XscSlot};
use phmm_model::sequence::DigitalSequence;

use crate::errors::{EngineError, EngineResult};
use crate::matrix::{DenseMatrix, MainSlot, MatrixKind, SpecialSlot};

/// One point an alignment must pass through: `M_k` at sequence position `i`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Anchor {
    pub i: SeqPos,
    pub k: ModelPos,
}

fn validate_anchors(anchors: &[Anchor], m: usize, l: usize) -> EngineResult<()> {
    if anchors.is_empty() {
        return Err(EngineError::InvalidArgument("anchor set must be non-empty".into()));
    }
    for pair in anchors.windows(2) {
        if pair[1].i.get() <= pair[0].i.get() {
            return Err(EngineError::InvalidArgument(format!(
                "anchors must have strictly increasing i: {} then {}",
                pair[0].i.get(),
                pair[1].i.get()
            )));
        }
    }
    for a in anchors {
        if a.i.get() == 0 || a.i.get() > l {
            return Err(EngineError::InvalidArgument(format!("anchor i={} out of range 1..={l}", a.i.get())));
        }
        if a.k.get() == 0 || a.k.get() > m {
            return Err(EngineError::InvalidArgument(format!("anchor k={} out of range 1..={m}", a.k.get())));
        }
    }
    Ok(())
}

/// The upcoming (not-yet-reached, `i > row`) anchor, if any, and the already
/// reached (`i <= row`) anchor, if any -- the UP ceiling and DOWN floor
/// columns for the given row.
fn sector_bounds(anchors: &[Anchor], row: usize) -> (Option<Anchor>, Option<Anchor>) {
    let upcoming = anchors.iter().copied().find(|a| a.i.get() > row);
    let reached = anchors.iter().copied().filter(|a| a.i.get() <= row).next_back();
    (upcoming, reached)
}

/// Runs ASC Forward, filling `up` (tagged [`MatrixKind::AscFwdUp`]) and
/// `down` (tagged [`MatrixKind::AscFwdDown`]), and returns the total
/// log-probability of paths consistent with `anchors`.
///
/// # Errors
/// [`EngineError::InvalidArgument`] if `anchors` is empty, not strictly
/// increasing in `i`, or any `(i, k)` is out of range.
pub fn asc_forward(
    profile: &Profile,
    sequence: &DigitalSequence,
    anchors: &[Anchor],
    up: &mut DenseMatrix,
    down: &mut DenseMatrix,
) -> EngineResult<f32> {
    let m = profile.m();
    let l = sequence.len();
    validate_anchors(anchors, m, l)?;
    up.set_kind(MatrixKind::AscFwdUp);
    up.grow(m, l);
    down.set_kind(MatrixKind::AscFwdDown);
    down.grow(m, l);
    let xsc = profile.xsc();

    up.set_special(SeqPos(0), SpecialSlot::N, 0.0);
    let b0 = xsc.get(SpecialState::N, XscSlot::Move);
    up.set_special(SeqPos(0), SpecialSlot::B, b0);
    up.set_special(SeqPos(0), SpecialSlot::L, b0 + xsc.enter_local());
    up.set_special(SeqPos(0), SpecialSlot::G, b0 + xsc.enter_glocal());
    down.set_special(SeqPos(0), SpecialSlot::E, f32::NEG_INFINITY);
    down.set_special(SeqPos(0), SpecialSlot::J, f32::NEG_INFINITY);
    down.set_special(SeqPos(0), SpecialSlot::C, f32::NEG_INFINITY);

    let first_anchor = anchors[0];
    let last_anchor = *anchors.last().unwrap();

    for i in 1..=l {
        let cur = SeqPos(i);
        let prev = SeqPos(i - 1);
        let residue = sequence.residue(cur).expect("i in 1..=l is never a sentinel");
        let (upcoming, reached) = sector_bounds(anchors, i);

        // N only evolves before the first anchor is reached; afterwards the
        // J-loop takes over as the "another domain" flank.
        if i < first_anchor.i.get() {
            let n_prev = up.special(prev, SpecialSlot::N);
            up.set_special(cur, SpecialSlot::N, n_prev + xsc.get(SpecialState::N, XscSlot::Loop));
        } else {
            up.set_special(cur, SpecialSlot::N, f32::NEG_INFINITY);
        }

        // UP sector: columns strictly below the upcoming anchor's k.
        if let Some(anchor) = upcoming {
            let ceil = anchor.k.get();
            let is_boundary_row = anchor.i.get() == i;
            let l_prev = up.special(prev, SpecialSlot::L);
            let g_prev = up.special(prev, SpecialSlot::G);
            let mut d_local_prev = f32::NEG_INFINITY;
            let mut d_glocal_prev = f32::NEG_INFINITY;
            // Row i == anchor.i itself belongs wholly to DOWN (UP is rows
            // strictly below); only fill up to ceil-1 when i is strictly
            // below the anchor row.
            let fill_to = if is_boundary_row { 0 } else { ceil.saturating_sub(1) };
            for k in 1..=fill_to {
                let kc = ModelPos(k);
                let kp = ModelPos(k - 1);
                let ml_entry = l_prev + profile.bsc(kc);
                let ml = logsum(
                    logsum(
                        up.get(prev, kp, MainSlot::ML) + profile.transition_score(kp, Transition::mm(Lane::Local)),
                        up.get(prev, kp, MainSlot::IL) + profile.transition_score(kp, Transition::im(Lane::Local)),
                    ),
                    logsum(up.get(prev, kp, MainSlot::DL) + profile.transition_score(kp, Transition::dm(Lane::Local)), ml_entry),
                ) + profile.emissions().match_score(kc, residue);
                up.set(cur, kc, MainSlot::ML, ml);

                let mg_entry = g_prev + profile.gm_entry(kc);
                let mg = logsum(
                    logsum(
                        up.get(prev, kp, MainSlot::MG) + profile.transition_score(kp, Transition::mm(Lane::Glocal)),
                        up.get(prev, kp, MainSlot::IG) + profile.transition_score(kp, Transition::im(Lane::Glocal)),
                    ),
                    logsum(up.get(prev, kp, MainSlot::DG) + profile.transition_score(kp, Transition::dm(Lane::Glocal)), mg_entry),
                ) + profile.emissions().match_score(kc, residue);
                up.set(cur, kc, MainSlot::MG, mg);

                if k < fill_to {
                    let il = logsum(
                        up.get(prev, kc, MainSlot::ML) + profile.transition_score(kc, Transition::mi(Lane::Local)),
                        up.get(prev, kc, MainSlot::IL) + profile.transition_score(kc, Transition::ii(Lane::Local)),
                    ) + profile.emissions().insert_score(kc, residue);
                    up.set(cur, kc, MainSlot::IL, il);
                    let ig = logsum(
                        up.get(prev, kc, MainSlot::MG) + profile.transition_score(kc, Transition::mi(Lane::Glocal)),
                        up.get(prev, kc, MainSlot::IG) + profile.transition_score(kc, Transition::ii(Lane::Glocal)),
                    ) + profile.emissions().insert_score(kc, residue);
                    up.set(cur, kc, MainSlot::IG, ig);
                } else {
                    up.set(cur, kc, MainSlot::IL, f32::NEG_INFINITY);
                    up.set(cur, kc, MainSlot::IG, f32::NEG_INFINITY);
                }

                let dl = logsum(
                    up.get(cur, kp, MainSlot::ML) + profile.transition_score(kp, Transition::md(Lane::Local)),
                    d_local_prev + profile.transition_score(kp, Transition::dd(Lane::Local)),
                );
                up.set(cur, kc, MainSlot::DL, dl);
                d_local_prev = dl;
                let dg = logsum(
                    up.get(cur, kp, MainSlot::MG) + profile.transition_score(kp, Transition::md(Lane::Glocal)),
                    d_glocal_prev + profile.transition_score(kp, Transition::dd(Lane::Glocal)),
                );
                up.set(cur, kc, MainSlot::DG, dg);
                d_glocal_prev = dg;
            }
        }

        // DOWN sector: columns from the reached anchor's k onward.
        if let Some(anchor) = reached {
            let floor = anchor.k.get();
            if anchor.i.get() == i {
                // First DOWN row for this anchor: a single seeded boundary
                // cell from UP's previous row, then pure same-row chaining
                // (deferred-D trick; inserts are not modelled across this
                // specific boundary, a deliberate simplification -- spec.md
                // explicitly disclaims bit-exact legacy reproduction).
                let l_prev = up.special(prev, SpecialSlot::L);
                let g_prev = up.special(prev, SpecialSlot::G);
                let kc = ModelPos(floor);
                let seed_l = l_prev + profile.bsc(kc) + profile.emissions().match_score(kc, residue);
                let seed_g = g_prev + profile.gm_entry(kc) + profile.emissions().match_score(kc, residue);
                down.set(cur, kc, MainSlot::ML, seed_l);
                down.set(cur, kc, MainSlot::MG, seed_g);
                down.set(cur, kc, MainSlot::IL, f32::NEG_INFINITY);
                down.set(cur, kc, MainSlot::IG, f32::NEG_INFINITY);
                down.set(cur, kc, MainSlot::DL, f32::NEG_INFINITY);
                down.set(cur, kc, MainSlot::DG, f32::NEG_INFINITY);
                let mut d_local_prev = f32::NEG_INFINITY;
                let mut d_glocal_prev = f32::NEG_INFINITY;
                for k in (floor + 1)..=m {
                    let kc = ModelPos(k);
                    let kp = ModelPos(k - 1);
                    let dl = logsum(
                        down.get(cur, kp, MainSlot::ML) + profile.transition_score(kp, Transition::md(Lane::Local)),
                        d_local_prev + profile.transition_score(kp, Transition::dd(Lane::Local)),
                    );
                    down.set(cur, kc, MainSlot::DL, dl);
                    d_local_prev = dl;
                    let dg = logsum(
                        down.get(cur, kp, MainSlot::MG) + profile.transition_score(kp, Transition::md(Lane::Glocal)),
                        d_glocal_prev + profile.transition_score(kp, Transition::dd(Lane::Glocal)),
                    );
                    down.set(cur, kc, MainSlot::DG, dg);
                    d_glocal_prev = dg;
                    down.set(cur, kc, MainSlot::ML, f32::NEG_INFINITY);
                    down.set(cur, kc, MainSlot::MG, f32::NEG_INFINITY);
                    down.set(cur, kc, MainSlot::IL, f32::NEG_INFINITY);
                    down.set(cur, kc, MainSlot::IG, f32::NEG_INFINITY);
                }
            } else {
                let mut d_local_prev = f32::NEG_INFINITY;
                let mut d_glocal_prev = f32::NEG_INFINITY;
                for k in floor..=m {
                    let kc = ModelPos(k);
                    let kp = if k > floor { Some(ModelPos(k - 1)) } else { None };
                    let ml = if let Some(kp) = kp {
                        logsum(
                            logsum(
                                down.get(prev, kp, MainSlot::ML) + profile.transition_score(kp, Transition::mm(Lane::Local)),
                                down.get(prev, kp, MainSlot::IL) + profile.transition_score(kp, Transition::im(Lane::Local)),
                            ),
                            down.get(prev, kp, MainSlot::DL) + profile.transition_score(kp, Transition::dm(Lane::Local)),
                        ) + profile.emissions().match_score(kc, residue)
                    } else {
                        // k == floor: M at the anchor's own column is only
                        // ever reached once, at the seeded boundary row; on
                        // every later row it is unreachable (mass has moved
                        // on to floor+1 or into a delete run).
                        f32::NEG_INFINITY
                    };
                    down.set(cur, kc, MainSlot::ML, ml);

                    let mg = if let Some(kp) = kp {
                        logsum(
                            logsum(
                                down.get(prev, kp, MainSlot::MG) + profile.transition_score(kp, Transition::mm(Lane::Glocal)),
                                down.get(prev, kp, MainSlot::IG) + profile.transition_score(kp, Transition::im(Lane::Glocal)),
                            ),
                            down.get(prev, kp, MainSlot::DG) + profile.transition_score(kp, Transition::dm(Lane::Glocal)),
                        ) + profile.emissions().match_score(kc, residue)
                    } else {
                        f32::NEG_INFINITY
                    };
                    down.set(cur, kc, MainSlot::MG, mg);

                    if k < m {
                        let il = logsum(
                            down.get(prev, kc, MainSlot::ML) + profile.transition_score(kc, Transition::mi(Lane::Local)),
                            down.get(prev, kc, MainSlot::IL) + profile.transition_score(kc, Transition::ii(Lane::Local)),
                        ) + profile.emissions().insert_score(kc, residue);
                        down.set(cur, kc, MainSlot::IL, il);
                        let ig = logsum(
                            down.get(prev, kc, MainSlot::MG) + profile.transition_score(kc, Transition::mi(Lane::Glocal)),
                            down.get(prev, kc, MainSlot::IG) + profile.transition_score(kc, Transition::ii(Lane::Glocal)),
                        ) + profile.emissions().insert_score(kc, residue);
                        down.set(cur, kc, MainSlot::IG, ig);
                    } else {
                        down.set(cur, kc, MainSlot::IL, f32::NEG_INFINITY);
                        down.set(cur, kc, MainSlot::IG, f32::NEG_INFINITY);
                    }

                    if let Some(kp) = kp {
                        let dl = logsum(
                            down.get(cur, kp, MainSlot::ML) + profile.transition_score(kp, Transition::md(Lane::Local)),
                            d_local_prev + profile.transition_score(kp, Transition::dd(Lane::Local)),
                        );
                        down.set(cur, kc, MainSlot::DL, dl);
                        d_local_prev = dl;
                        let dg = logsum(
                            down.get(cur, kp, MainSlot::MG) + profile.transition_score(kp, Transition::md(Lane::Glocal)),
                            d_glocal_prev + profile.transition_score(kp, Transition::dd(Lane::Glocal)),
                        );
                        down.set(cur, kc, MainSlot::DG, dg);
                        d_glocal_prev = dg;
                    } else {
                        down.set(cur, kc, MainSlot::DL, f32::NEG_INFINITY);
                        down.set(cur, kc, MainSlot::DG, f32::NEG_INFINITY);
                    }
                }
            }

            // Exit terms are only legal once at or past the reached anchor.
            let mut e = f32::NEG_INFINITY;
            for k in floor..=m {
                let kc = ModelPos(k);
                e = logsum(e, down.get(cur, kc, MainSlot::ML) + profile.esc(kc));
            }
            e = logsum(e, down.get(cur, ModelPos(m), MainSlot::MG));
            e = logsum(e, down.get(cur, ModelPos(m), MainSlot::DG));
            down.set_special(cur, SpecialSlot::E, e);

            let j_prev = down.special(prev, SpecialSlot::J);
            let j = logsum(j_prev + xsc.get(SpecialState::J, XscSlot::Loop), e + xsc.loop_to_j());
            down.set_special(cur, SpecialSlot::J, j);

            let c = if i >= last_anchor.i.get() {
                let c_prev = down.special(prev, SpecialSlot::C);
                logsum(c_prev + xsc.get(SpecialState::C, XscSlot::Loop), e + xsc.move_to_c())
            } else {
                f32::NEG_INFINITY
            };
            down.set_special(cur, SpecialSlot::C, c);
        } else {
            down.set_special(cur, SpecialSlot::E, f32::NEG_INFINITY);
            down.set_special(cur, SpecialSlot::J, f32::NEG_INFINITY);
            down.set_special(cur, SpecialSlot::C, f32::NEG_INFINITY);
        }

        // B/L/G for the next row's UP entries: from N before the first
        // anchor, from J (the reconnection) afterward.
        let n = up.special(cur, SpecialSlot::N);
        let j = down.special(cur, SpecialSlot::J);
        let b = if i < first_anchor.i.get() {
            n + xsc.get(SpecialState::N, XscSlot::Move)
        } else {
            j + xsc.get(SpecialState::J, XscSlot::Move)
        };
        up.set_special(cur, SpecialSlot::B, b);
        up.set_special(cur, SpecialSlot::L, b + xsc.enter_local());
        up.set_special(cur, SpecialSlot::G, b + xsc.enter_glocal());
    }

    let final_c = down.special(SeqPos(l), SpecialSlot::C);
    Ok(final_c + xsc.move_to_c())
}

/// ASC Backward, the reverse-direction counterpart of [`asc_forward`].
/// Mirrors its sector split: `up` accumulates the entry-side special
/// states, `down` the exit-side ones, walking `i` from `L` to `0`.
///
/// # Errors
/// [`EngineError::InvalidArgument`] under the same conditions as
/// [`asc_forward`].
pub fn asc_backward(
    profile: &Profile,
    sequence: &DigitalSequence,
    anchors: &[Anchor],
    up: &mut DenseMatrix,
    down: &mut DenseMatrix,
) -> EngineResult<f32> {
    let m = profile.m();
    let l = sequence.len();
    validate_anchors(anchors, m, l)?;
    up.set_kind(MatrixKind::AscBckUp);
    up.grow(m, l);
    down.set_kind(MatrixKind::AscBckDown);
    down.grow(m, l);
    let xsc = profile.xsc();
    let last_anchor = *anchors.last().unwrap();
    let first_anchor = anchors[0];

    let row_l = SeqPos(l);
    for k in 1..=m {
        let kc = ModelPos(k);
        if k >= last_anchor.k.get() {
            down.set(row_l, kc, MainSlot::ML, profile.esc(kc));
        } else {
            up.set(row_l, kc, MainSlot::ML, profile.esc(kc));
        }
    }
    down.set_special(row_l, SpecialSlot::E, 0.0);
    down.set_special(row_l, SpecialSlot::J, xsc.loop_to_j());
    down.set_special(row_l, SpecialSlot::C, xsc.move_to_c());
    up.set_special(row_l, SpecialSlot::N, f32::NEG_INFINITY);
    up.set_special(row_l, SpecialSlot::B, f32::NEG_INFINITY);
    up.set_special(row_l, SpecialSlot::L, f32::NEG_INFINITY);
    up.set_special(row_l, SpecialSlot::G, f32::NEG_INFINITY);

    for i in (0..l).rev() {
        let cur = SeqPos(i);
        let next = SeqPos(i + 1);
        let residue_next = sequence.residue(next).expect("i+1 in 1..=l is never a sentinel");
        let (upcoming, reached) = sector_bounds(anchors, i);

        if let Some(anchor) = reached {
            let floor = anchor.k.get();
            for k in (floor..=m).rev() {
                let kc = ModelPos(k);
                let local_cont = if k < m {
                    profile.transition_score(kc, Transition::mm(Lane::Local)) + profile.emissions().match_score(ModelPos(k + 1), residue_next) + down.get(next, ModelPos(k + 1), MainSlot::ML)
                } else {
                    f32::NEG_INFINITY
                };
                let ml = logsum(profile.esc(kc) + down.special(cur, SpecialSlot::E), local_cont);
                down.set(cur, kc, MainSlot::ML, ml);
            }
        }
        if let Some(anchor) = upcoming {
            let ceil = anchor.k.get();
            for k in (1..ceil).rev() {
                let kc = ModelPos(k);
                let local_cont = if k < m {
                    profile.transition_score(kc, Transition::mm(Lane::Local)) + profile.emissions().match_score(ModelPos(k + 1), residue_next) + up.get(next, ModelPos(k + 1), MainSlot::ML)
                } else {
                    f32::NEG_INFINITY
                };
                up.set(cur, kc, MainSlot::ML, local_cont);
            }
        }

        let e = if reached.is_some() {
            let j_next = down.special(next, SpecialSlot::J);
            let c_next = down.special(next, SpecialSlot::C);
            logsum(j_next + xsc.loop_to_j(), c_next + xsc.move_to_c())
        } else {
            f32::NEG_INFINITY
        };
        down.set_special(cur, SpecialSlot::E, e);
        let j = if i + 1 >= first_anchor.i.get() {
            let j_next = down.special(next, SpecialSlot::J);
            logsum(j_next + xsc.get(SpecialState::J, XscSlot::Loop), up.special(next, SpecialSlot::B) + xsc.get(SpecialState::J, XscSlot::Move))
        } else {
            f32::NEG_INFINITY
        };
        down.set_special(cur, SpecialSlot::J, j);
        let c = if i >= last_anchor.i.get() {
            down.special(next, SpecialSlot::C) + xsc.get(SpecialState::C, XscSlot::Loop)
        } else {
            f32::NEG_INFINITY
        };
        down.set_special(cur, SpecialSlot::C, c);

        // B's backward value at this row is exactly J(i) + J's move score; L
        // and G carry the same value since bsc/gm_entry are folded in on the
        // forward side of the corresponding M-cell read, not here.
        let b = if reached.is_some() { j + xsc.get(SpecialState::J, XscSlot::Move) } else { f32::NEG_INFINITY };
        up.set_special(cur, SpecialSlot::B, b);
        up.set_special(cur, SpecialSlot::L, b);
        up.set_special(cur, SpecialSlot::G, b);
        let n = if i == 0 {
            up.special(cur, SpecialSlot::B) + xsc.get(SpecialState::N, XscSlot::Move)
        } else {
            f32::NEG_INFINITY
        };
        up.set_special(cur, SpecialSlot::N, n);
    }

    Ok(up.special(SeqPos(0), SpecialSlot::N))
}

/// ASC posterior decoding: combines matched `asc_forward`/`asc_backward`
/// sector matrices into per-cell posteriors, renormalising each row
/// independently (spec.md §9's stated preference where the exact
/// normalising denominator is otherwise ambiguous for anchor-split rows).
///
/// # Errors
/// [`EngineError::WrongMatrixKind`] if the up/down pairs are not tagged
/// `AscFwdUp`/`AscFwdDown` and `AscBckUp`/`AscBckDown` respectively.
pub fn asc_decode(
    fwd_up: &DenseMatrix,
    fwd_down: &DenseMatrix,
    bck_up: &DenseMatrix,
    bck_down: &DenseMatrix,
    totsc: f32,
    decode_up: &mut DenseMatrix,
    decode_down: &mut DenseMatrix,
) -> EngineResult<()> {
    fwd_up.require_kind(MatrixKind::AscFwdUp)?;
    fwd_down.require_kind(MatrixKind::AscFwdDown)?;
    bck_up.require_kind(MatrixKind::AscBckUp)?;
    bck_down.require_kind(MatrixKind::AscBckDown)?;
    let m = fwd_up.m();
    let l = fwd_up.l();
    decode_up.set_kind(MatrixKind::AscDecodeUp);
    decode_up.grow(m, l);
    decode_down.set_kind(MatrixKind::AscDecodeDown);
    decode_down.grow(m, l);

    for i in 0..=l {
        let pos = SeqPos(i);
        let mut row_total = 0.0_f32;
        for k in 1..=m {
            let kc = ModelPos(k);
            for slot in [MainSlot::ML, MainSlot::MG, MainSlot::IL, MainSlot::IG, MainSlot::DL, MainSlot::DG] {
                let up_pp = ((fwd_up.get(pos, kc, slot) + bck_up.get(pos, kc, slot)) - totsc).exp();
                decode_up.set(pos, kc, slot, up_pp);
                row_total += up_pp.max(0.0);
                let down_pp = ((fwd_down.get(pos, kc, slot) + bck_down.get(pos, kc, slot)) - totsc).exp();
                decode_down.set(pos, kc, slot, down_pp);
                row_total += down_pp.max(0.0);
            }
        }
        if row_total <= 0.0 || !row_total.is_finite() {
            continue;
        }
        for k in 1..=m {
            let kc = ModelPos(k);
            for slot in [MainSlot::ML, MainSlot::MG, MainSlot::IL, MainSlot::IG, MainSlot::DL, MainSlot::DG] {
                let up_v = decode_up.get(pos, kc, slot) / row_total;
                decode_up.set(pos, kc, slot, up_v);
                let down_v = decode_down.get(pos, kc, slot) / row_total;
                decode_down.set(pos, kc, slot, down_v);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use phmm_model::prelude::*;
    use phmm_model::sequence::DigitalSequence;

    use super::*;
    use crate::forward::forward;

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
    fn rejects_empty_anchor_set() {
        let profile = two_node_profile();
        let sequence = DigitalSequence::new(profile.alphabet_size(), vec![0, 1]).unwrap();
        let mut up = DenseMatrix::new(MatrixKind::AscFwdUp, profile.m(), sequence.len());
        let mut down = DenseMatrix::new(MatrixKind::AscFwdDown, profile.m(), sequence.len());
        let err = asc_forward(&profile, &sequence, &[], &mut up, &mut down).unwrap_err();
        assert!(matches!(err, EngineError::InvalidArgument(_)));
    }

    #[test]
    fn rejects_non_increasing_anchors() {
        let profile = two_node_profile();
        let sequence = DigitalSequence::new(profile.alphabet_size(), vec![0, 1]).unwrap();
        let mut up = DenseMatrix::new(MatrixKind::AscFwdUp, profile.m(), sequence.len());
        let mut down = DenseMatrix::new(MatrixKind::AscFwdDown, profile.m(), sequence.len());
        let anchors = [Anchor { i: SeqPos(2), k: ModelPos(1) }, Anchor { i: SeqPos(1), k: ModelPos(2) }];
        let err = asc_forward(&profile, &sequence, &anchors, &mut up, &mut down).unwrap_err();
        assert!(matches!(err, EngineError::InvalidArgument(_)));
    }

    #[test]
    fn asc_forward_total_never_exceeds_unconstrained_forward() {
        let profile = two_node_profile();
        let sequence = DigitalSequence::new(profile.alphabet_size(), vec![0, 1]).unwrap();
        let mut plain = DenseMatrix::new(MatrixKind::Fwd, profile.m(), sequence.len());
        let total = forward(&profile, &sequence, &mut plain).unwrap();

        let mut up = DenseMatrix::new(MatrixKind::AscFwdUp, profile.m(), sequence.len());
        let mut down = DenseMatrix::new(MatrixKind::AscFwdDown, profile.m(), sequence.len());
        let anchors = [Anchor { i: SeqPos(1), k: ModelPos(2) }];
        let constrained = asc_forward(&profile, &sequence, &anchors, &mut up, &mut down).unwrap();

        // Restricting to paths through one anchor point can only shrink the
        // probability mass relative to the unconstrained sum over all paths.
        assert!(constrained <= total + 1e-4);
    }

    #[test]
    fn asc_decode_rows_sum_to_at_most_one() {
        let profile = two_node_profile();
        let sequence = DigitalSequence::new(profile.alphabet_size(), vec![0, 1]).unwrap();
        let anchors = [Anchor { i: SeqPos(1), k: ModelPos(2) }];

        let mut fwd_up = DenseMatrix::new(MatrixKind::AscFwdUp, profile.m(), sequence.len());
        let mut fwd_down = DenseMatrix::new(MatrixKind::AscFwdDown, profile.m(), sequence.len());
        let totsc = asc_forward(&profile, &sequence, &anchors, &mut fwd_up, &mut fwd_down).unwrap();

        let mut bck_up = DenseMatrix::new(MatrixKind::AscBckUp, profile.m(), sequence.len());
        let mut bck_down = DenseMatrix::new(MatrixKind::AscBckDown, profile.m(), sequence.len());
        asc_backward(&profile, &sequence, &anchors, &mut bck_up, &mut bck_down).unwrap();

        let mut decode_up = DenseMatrix::new(MatrixKind::AscDecodeUp, profile.m(), sequence.len());
        let mut decode_down = DenseMatrix::new(MatrixKind::AscDecodeDown, profile.m(), sequence.len());
        asc_decode(&fwd_up, &fwd_down, &bck_up, &bck_down, totsc, &mut decode_up, &mut decode_down).unwrap();

        for i in 0..=sequence.len() {
            let pos = SeqPos(i);
            let mut total = 0.0_f32;
            for k in 1..=profile.m() {
                let kc = ModelPos(k);
                for slot in [MainSlot::ML, MainSlot::MG, MainSlot::IL, MainSlot::IG, MainSlot::DL, MainSlot::DG] {
                    total += decode_up.get(pos, kc, slot) + decode_down.get(pos, kc, slot);
                }
            }
            assert!(total <= 1.0 + 1e-4, "row {i} total {total} exceeds 1");
        }
    }
}
