//! Checkpointed striped-vector Forward/Backward (spec.md §4.10): runs
//! Forward once over `O(sqrt(L))` physical rows, then Backward from `L`
//! down to `0`, regenerating any un-stored Forward row by replaying from
//! the nearest earlier checkpoint. Posteriors from the matched pair feed a
//! [`SparseMask`] the same way [`phmm_reference::decoding`] builds dense
//! posteriors, just restricted to what this crate actually stores.
use phmm_model::prelude::Profile;
use phmm_model::sequence::DigitalSequence;
use phmm_reference::errors::EngineResult;

use crate::layout::{StripeLayout, LANES_FLOAT};
use crate::probspace::{boundary_row, seed_row_l, step_backward, step_forward};
use crate::row::StripedRow;
use crate::schedule::{CheckpointSchedule, RowSlot};
use crate::sparse::SparseMask;

/// Bytes one physical [`StripedRow`] occupies, used to turn a RAM budget
/// into the row-count budget [`CheckpointSchedule`] wants.
#[must_use]
pub fn bytes_per_row(layout: &StripeLayout) -> usize {
    6 * layout.len() * std::mem::size_of::<f32>() + crate::row::NUM_FILTER_SPECIAL * std::mem::size_of::<f32>()
}

#[must_use]
pub fn rows_for_ram_budget(layout: &StripeLayout, ram_budget_bytes: u64) -> usize {
    let per_row = bytes_per_row(layout) as u64;
    ((ram_budget_bytes / per_row.max(1)) as usize).max(2)
}

/// The result of a checkpointed Forward pass: every row the schedule chose
/// to keep, plus the cumulative log-scale needed to read any stored row
/// back in log space (spec.md §4.10's "product of row scale factors times
/// C(L) equals the unscaled Forward value").
pub struct CheckpointedForward {
    layout: StripeLayout,
    schedule: CheckpointSchedule,
    boundary: StripedRow,
    rows: Vec<StripedRow>,
    /// `ln` of the cumulative scale factor at each physical slot.
    log_scale: Vec<f32>,
    pub total_score: f32,
}

impl CheckpointedForward {
    /// Runs Forward over `sequence`, storing only the rows `schedule`
    /// assigns a physical slot to.
    ///
    /// # Errors
    /// Never fails for a well-formed profile/sequence pair; kept as a
    /// `Result` for uniformity with the rest of the DP surface.
    pub fn run(profile: &Profile, sequence: &DigitalSequence, r_budget: usize) -> EngineResult<Self> {
        let l = sequence.len();
        let layout = StripeLayout::new(profile.m(), LANES_FLOAT);
        let schedule = CheckpointSchedule::new(l, r_budget);
        let boundary = boundary_row(profile, &layout);
        let mut rows = vec![StripedRow::zeros(&layout); schedule.physical_rows()];
        let mut log_scale = vec![0.0_f32; schedule.physical_rows()];

        let mut prev = boundary.clone();
        let mut cumulative = 0.0_f32;
        for i in 1..=l {
            let residue = sequence.residue(phmm_model::prelude::SeqPos(i)).expect("i in 1..=l is never a sentinel");
            let (cur, factor) = step_forward(profile, &layout, residue, &prev);
            cumulative += factor.ln();
            if let RowSlot::Stored(slot) = schedule.slot_for(i) {
                rows[slot] = cur.clone();
                log_scale[slot] = cumulative;
            }
            prev = cur;
        }

        let xsc = profile.xsc();
        let total_score = prev.special[crate::row::FilterSpecial::C as usize].ln() + cumulative + xsc.move_to_c();

        Ok(Self { layout, schedule, boundary, rows, log_scale, total_score })
    }

    /// Reads back the stored row at `i` (which must be a [`RowSlot::Stored`]
    /// row) as `(row, cumulative_log_scale)`.
    fn stored(&self, i: usize) -> (&StripedRow, f32) {
        match self.schedule.slot_for(i) {
            RowSlot::Stored(slot) => (&self.rows[slot], self.log_scale[slot]),
            RowSlot::Regenerate { .. } => unreachable!("stored() called on a row the schedule doesn't keep"),
        }
    }

    /// Replays Forward from the nearest stored row at or before `from_i`
    /// (or the seeded boundary if none) through `to_i` inclusive, returning
    /// every intermediate row and its cumulative log-scale. Used to
    /// regenerate a whole checkpointed block once for a Backward descent
    /// through it, rather than re-replaying per row.
    fn replay_block(&self, profile: &Profile, sequence: &DigitalSequence, from_i: usize, to_i: usize) -> Vec<(StripedRow, f32)> {
        let (mut prev, mut cumulative) = if from_i == 0 {
            (self.boundary.clone(), 0.0_f32)
        } else {
            let (row, scale) = self.stored(from_i);
            (row.clone(), scale)
        };
        let mut out = Vec::with_capacity(to_i - from_i);
        for i in (from_i + 1)..=to_i {
            let residue = sequence
                .residue(phmm_model::prelude::SeqPos(i))
                .expect("replay range was already validated by the original Forward pass");
            let (cur, factor) = step_forward(profile, &self.layout, residue, &prev);
            cumulative += factor.ln();
            out.push((cur.clone(), cumulative));
            prev = cur;
        }
        out
    }

    /// The Forward row at `i` in log space, regenerating it via
    /// [`replay_block`] if the schedule didn't keep it.
    fn forward_row_at(&self, profile: &Profile, sequence: &DigitalSequence, i: usize) -> (StripedRow, f32) {
        match self.schedule.slot_for(i) {
            RowSlot::Stored(slot) => (self.rows[slot].clone(), self.log_scale[slot]),
            RowSlot::Regenerate { replay_from } => {
                let block = self.replay_block(profile, sequence, replay_from, i);
                block.into_iter().next_back().expect("i > replay_from guarantees a non-empty block")
            }
        }
    }

    #[must_use]
    pub fn layout(&self) -> &StripeLayout {
        &self.layout
    }

    #[must_use]
    pub fn schedule(&self) -> &CheckpointSchedule {
        &self.schedule
    }
}

/// Posterior mass below this is dropped from the sparse mask (spec.md §3
/// "ranges per row are sorted and non-overlapping" -- built from whichever
/// cells clear a per-engine threshold, not a fixed legacy constant).
pub const DEFAULT_POSTERIOR_THRESHOLD: f32 = 1e-3;

/// Runs Backward from `L` down to `1` against an already-computed
/// [`CheckpointedForward`], emitting a [`SparseMask`] of every `(i, k)`
/// whose combined posterior clears `threshold`. Regenerates each
/// checkpointed block's Forward rows once via [`CheckpointedForward::replay_block`]
/// and reuses them for every row in that block rather than replaying per
/// row (spec.md §4.10: "this adds at most one extra Forward pass").
///
/// # Errors
/// Never fails for a well-formed profile/sequence pair; kept as a `Result`
/// for uniformity with the rest of the DP surface.
pub fn backward_checkpointed(
    profile: &Profile,
    sequence: &DigitalSequence,
    fwd: &CheckpointedForward,
    threshold: f32,
) -> EngineResult<SparseMask> {
    let l = sequence.len();
    let layout = fwd.layout();
    let totsc = fwd.total_score;
    let mut mask = SparseMask::new(l);

    let mut next = seed_row_l(profile, layout);
    let mut next_log_scale = 0.0_f32;

    // Cache of the checkpointed block currently being walked, so rows
    // between two checkpoints are regenerated once per block, not once
    // per row descended into.
    let mut cached_block: Option<(usize, Vec<(StripedRow, f32)>)> = None;

    for i in (1..=l).rev() {
        let residue_next = sequence.residue(phmm_model::prelude::SeqPos(i)).expect("i in 1..=l is never a sentinel");
        let at_start = i == 1;
        let (cur, factor) = step_backward(profile, layout, residue_next, at_start, &next);
        let cur_log_scale = next_log_scale + factor.ln();

        let (fwd_row, fwd_log_scale) = match fwd.schedule().slot_for(i) {
            RowSlot::Stored(_) => fwd.forward_row_at(profile, sequence, i),
            RowSlot::Regenerate { replay_from } => {
                let block_start = replay_from;
                let reuse = cached_block.as_ref().is_some_and(|(start, _)| *start == block_start);
                if !reuse {
                    let block_end = fwd.schedule().checkpoint_at_or_after(i);
                    cached_block = Some((block_start, fwd.replay_block(profile, sequence, block_start, block_end)));
                }
                let (start, block) = cached_block.as_ref().expect("just populated if absent");
                block[i - start - 1].clone()
            }
        };

        let m = profile.m();
        let mut row_best = 0.0_f32;
        let mut ranges: Vec<(usize, usize)> = Vec::new();
        let mut open: Option<usize> = None;
        for k in 1..=m {
            let idx = layout.index(phmm_model::prelude::ModelPos(k));
            let emitting = fwd_row.ml[idx] * cur.ml[idx] + fwd_row.mg[idx] * cur.mg[idx] + fwd_row.il[idx] * cur.il[idx] + fwd_row.ig[idx] * cur.ig[idx];
            let log_pp = if emitting > 0.0 {
                emitting.ln() + fwd_log_scale + cur_log_scale - totsc
            } else {
                f32::NEG_INFINITY
            };
            let pp = log_pp.exp();
            row_best = row_best.max(pp);
            if pp >= threshold {
                if open.is_none() {
                    open = Some(k);
                }
            } else if let Some(start) = open.take() {
                ranges.push((start, k - 1));
            }
        }
        if let Some(start) = open {
            ranges.push((start, m));
        }
        for (lo, hi) in ranges {
            mask.push_range(i, lo, hi);
        }
        let _ = row_best;

        next = cur;
        next_log_scale = cur_log_scale;
    }

    Ok(mask)
}

#[cfg(test)]
mod tests {
    use super::*;
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

    fn longer_sequence(len: usize) -> DigitalSequence {
        DigitalSequence::new(4, (0..len).map(|i| (i % 4) as u8).collect()).unwrap()
    }

    #[test]
    fn checkpointed_forward_matches_reference_forward_within_tolerance() {
        init_logsum();
        let profile = two_node_profile();
        let seq = longer_sequence(40);

        let checkpointed = CheckpointedForward::run(&profile, &seq, 6).unwrap();
        assert!(checkpointed.schedule().rc() > 0, "budget of 6 rows for L=40 should force checkpointing");

        let mut dense = phmm_reference::matrix::DenseMatrix::new(phmm_reference::matrix::MatrixKind::Fwd, profile.m(), seq.len());
        let reference_score = phmm_reference::forward::forward(&profile, &seq, &mut dense).unwrap();

        assert!(
            float_cmp::approx_eq!(f32, checkpointed.total_score, reference_score, epsilon = 1e-2),
            "checkpointed={} reference={}", checkpointed.total_score, reference_score
        );
    }

    #[test]
    fn replay_regenerates_the_same_row_the_original_pass_would_have_stored() {
        init_logsum();
        let profile = two_node_profile();
        let seq = longer_sequence(40);
        let generous = CheckpointedForward::run(&profile, &seq, 40).unwrap();
        let tight = CheckpointedForward::run(&profile, &seq, 6).unwrap();

        for i in [5usize, 13, 27, 39] {
            let (generous_row, generous_scale) = generous.forward_row_at(&profile, &seq, i);
            let (tight_row, tight_scale) = tight.forward_row_at(&profile, &seq, i);
            let idx = generous.layout().index(ModelPos(1));
            let a = generous_row.ml[idx].ln() + generous_scale;
            let b = tight_row.ml[idx].ln() + tight_scale;
            assert!((a - b).abs() < 1e-2, "row {i}: generous={a} tight={b}");
        }
    }

    #[test]
    fn backward_checkpointed_produces_a_nonempty_mask_when_threshold_is_lax() {
        init_logsum();
        let profile = two_node_profile();
        let seq = longer_sequence(20);
        let fwd = CheckpointedForward::run(&profile, &seq, 6).unwrap();
        let mask = backward_checkpointed(&profile, &seq, &fwd, 1e-6).unwrap();
        assert!(!mask.is_empty());
    }

    #[test]
    fn backward_checkpointed_mask_shrinks_as_threshold_tightens() {
        init_logsum();
        let profile = two_node_profile();
        let seq = longer_sequence(20);
        let fwd = CheckpointedForward::run(&profile, &seq, 6).unwrap();
        let lax = backward_checkpointed(&profile, &seq, &fwd, 1e-6).unwrap();
        let strict = backward_checkpointed(&profile, &seq, &fwd, 0.99).unwrap();
        let lax_total: usize = (1..=seq.len()).map(|i| lax.ranges(i).len()).sum();
        let strict_total: usize = (1..=seq.len()).map(|i| strict.ranges(i).len()).sum();
        assert!(strict_total <= lax_total);
    }
}
