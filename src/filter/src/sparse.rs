//! The sparse mask and sparse-restricted DP surface (spec.md §3 "Sparse
//! mask", §4.10's pipeline output, §4.11 "restricted... over a sparse mask
//! produced by the filter core").
use phmm_model::logsum::logsum;
use phmm_model::prelude::{Lane, ModelPos, Profile, SeqPos, Transition};
use phmm_model::sequence::DigitalSequence;
use phmm_reference::errors::{EngineError, EngineResult};
use phmm_reference::matrix::{DenseMatrix, MainSlot, MatrixKind, SpecialSlot};

/// A half-open `[lo, hi]` (inclusive) column range surviving the posterior
/// threshold for one sequence row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KRange {
    pub lo: usize,
    pub hi: usize,
}

impl KRange {
    #[must_use]
    pub fn contains(&self, k: usize) -> bool {
        k >= self.lo && k <= self.hi
    }
}

/// Per-row survivor ranges (spec.md §3: "ranges per row are sorted and
/// non-overlapping"). Keyed by row rather than densely indexed: a mask
/// that only covers a thin diagonal band of a long sequence should cost
/// proportionally to what survived, not to `L` (spec.md §3's whole point
/// for this type over a dense matrix).
#[derive(Debug, Clone, Default)]
pub struct SparseMask {
    l: usize,
    rows: ahash::AHashMap<usize, Vec<KRange>>,
}

impl SparseMask {
    #[must_use]
    pub fn new(l: usize) -> Self {
        Self { l, rows: ahash::AHashMap::default() }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.l
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.values().all(Vec::is_empty)
    }

    /// Insert a range for row `i`. Caller is responsible for inserting in
    /// increasing, non-overlapping order (how every builder in this crate
    /// produces them); debug-checked, not re-sorted.
    pub fn push_range(&mut self, i: usize, lo: usize, hi: usize) {
        debug_assert!(lo <= hi);
        let row = self.rows.entry(i).or_default();
        debug_assert!(row.last().is_none_or(|prev| prev.hi < lo), "ranges must be inserted sorted and non-overlapping");
        row.push(KRange { lo, hi });
    }

    #[must_use]
    pub fn ranges(&self, i: usize) -> &[KRange] {
        self.rows.get(&i).map_or(&[], Vec::as_slice)
    }

    #[must_use]
    pub fn contains(&self, i: usize, k: usize) -> bool {
        self.rows.get(&i).is_some_and(|row| row.iter().any(|r| r.contains(k)))
    }

    /// Maximal runs of consecutive rows that each have at least one range
    /// (spec.md §3: "a segment covers a maximal run of rows that each have
    /// at least one range").
    #[must_use]
    pub fn segments(&self) -> Vec<(usize, usize)> {
        let mut segments = Vec::new();
        let mut start: Option<usize> = None;
        for i in 1..=self.l {
            let has_rows = self.rows.get(&i).is_some_and(|r| !r.is_empty());
            match (has_rows, start) {
                (true, None) => start = Some(i),
                (false, Some(s)) => {
                    segments.push((s, i - 1));
                    start = None;
                }
                _ => {}
            }
        }
        if let Some(s) = start {
            segments.push((s, self.l));
        }
        segments
    }
}

/// Zero out every posterior cell in `decode` (a [`MatrixKind::Decoding`]
/// matrix already filled by [`phmm_reference::decoding::decode`]) whose
/// `(i, k)` falls outside `mask`. This is the practical shape of "Decoding
/// restricted to a sparse mask" for a caller that already has the dense
/// posteriors and wants to discard everything the filter ruled out.
///
/// # Errors
/// [`EngineError::WrongMatrixKind`] if `decode` isn't tagged `Decoding`.
pub fn restrict_decoding_to_mask(decode: &mut DenseMatrix, mask: &SparseMask) -> EngineResult<()> {
    decode.require_kind(MatrixKind::Decoding)?;
    let m = decode.m();
    for i in 1..=decode.l().min(mask.len()) {
        for k in 1..=m {
            if !mask.contains(i, k) {
                for slot in [MainSlot::ML, MainSlot::MG, MainSlot::IL, MainSlot::IG, MainSlot::DL, MainSlot::DG] {
                    decode.set(SeqPos(i), ModelPos(k), slot, 0.0);
                }
            }
        }
    }
    Ok(())
}

/// Forward restricted to `mask`'s surviving `(i, k)` cells: a cell outside
/// every range for its row is treated as unreachable (`-inf`), exactly as
/// if the model had no transitions into it. `mask` must have been built
/// against the same `profile`/`sequence` pair, or this silently scores a
/// different, more-constrained model.
///
/// # Errors
/// [`EngineError::InvalidArgument`] if `mask.len()` disagrees with
/// `sequence.len()`.
pub fn sparse_forward(profile: &Profile, sequence: &DigitalSequence, mask: &SparseMask) -> EngineResult<f32> {
    let l = sequence.len();
    if mask.len() != l {
        return Err(EngineError::InvalidArgument(format!("mask covers {} rows, sequence has length {l}", mask.len())));
    }
    let m = profile.m();
    let mut matrix = DenseMatrix::new(MatrixKind::Fwd, m, l);
    let xsc = profile.xsc();
    use phmm_model::prelude::{SpecialState, XscSlot};

    matrix.set_special(SeqPos(0), SpecialSlot::N, 0.0);
    let b0 = 0.0 + xsc.get(SpecialState::N, XscSlot::Move);
    matrix.set_special(SeqPos(0), SpecialSlot::B, b0);
    matrix.set_special(SeqPos(0), SpecialSlot::L, b0 + xsc.enter_local());
    matrix.set_special(SeqPos(0), SpecialSlot::G, b0 + xsc.enter_glocal());

    for i in 1..=l {
        let cur = SeqPos(i);
        let prev = SeqPos(i - 1);
        let residue = sequence.residue(cur).expect("i in 1..=l is never a sentinel");
        let ranges = mask.ranges(i);

        let n_prev = matrix.special(prev, SpecialSlot::N);
        matrix.set_special(cur, SpecialSlot::N, n_prev + xsc.get(SpecialState::N, XscSlot::Loop));
        let l_prev = matrix.special(prev, SpecialSlot::L);
        let g_prev = matrix.special(prev, SpecialSlot::G);

        let mut d_local_prev = f32::NEG_INFINITY;
        let mut d_glocal_prev = f32::NEG_INFINITY;
        let mut e = f32::NEG_INFINITY;

        for k in 1..=m {
            let kc = ModelPos(k);
            let kp = ModelPos(k - 1);
            if !ranges.iter().any(|r| r.contains(k)) {
                matrix.set(cur, kc, MainSlot::ML, f32::NEG_INFINITY);
                matrix.set(cur, kc, MainSlot::MG, f32::NEG_INFINITY);
                matrix.set(cur, kc, MainSlot::IL, f32::NEG_INFINITY);
                matrix.set(cur, kc, MainSlot::IG, f32::NEG_INFINITY);
                matrix.set(cur, kc, MainSlot::DL, f32::NEG_INFINITY);
                matrix.set(cur, kc, MainSlot::DG, f32::NEG_INFINITY);
                d_local_prev = f32::NEG_INFINITY;
                d_glocal_prev = f32::NEG_INFINITY;
                continue;
            }

            let ml = logsum(
                logsum(
                    matrix.get(prev, kp, MainSlot::ML) + profile.transition_score(kp, Transition::mm(Lane::Local)),
                    matrix.get(prev, kp, MainSlot::IL) + profile.transition_score(kp, Transition::im(Lane::Local)),
                ),
                logsum(
                    matrix.get(prev, kp, MainSlot::DL) + profile.transition_score(kp, Transition::dm(Lane::Local)),
                    l_prev + profile.bsc(kc),
                ),
            ) + profile.emissions().match_score(kc, residue);
            matrix.set(cur, kc, MainSlot::ML, ml);

            let mg = logsum(
                logsum(
                    matrix.get(prev, kp, MainSlot::MG) + profile.transition_score(kp, Transition::mm(Lane::Glocal)),
                    matrix.get(prev, kp, MainSlot::IG) + profile.transition_score(kp, Transition::im(Lane::Glocal)),
                ),
                logsum(
                    matrix.get(prev, kp, MainSlot::DG) + profile.transition_score(kp, Transition::dm(Lane::Glocal)),
                    g_prev + profile.gm_entry(kc),
                ),
            ) + profile.emissions().match_score(kc, residue);
            matrix.set(cur, kc, MainSlot::MG, mg);

            if k < m {
                let il = logsum(
                    matrix.get(prev, kc, MainSlot::ML) + profile.transition_score(kc, Transition::mi(Lane::Local)),
                    matrix.get(prev, kc, MainSlot::IL) + profile.transition_score(kc, Transition::ii(Lane::Local)),
                ) + profile.emissions().insert_score(kc, residue);
                matrix.set(cur, kc, MainSlot::IL, il);

                let ig = logsum(
                    matrix.get(prev, kc, MainSlot::MG) + profile.transition_score(kc, Transition::mi(Lane::Glocal)),
                    matrix.get(prev, kc, MainSlot::IG) + profile.transition_score(kc, Transition::ii(Lane::Glocal)),
                ) + profile.emissions().insert_score(kc, residue);
                matrix.set(cur, kc, MainSlot::IG, ig);
            } else {
                matrix.set(cur, kc, MainSlot::IL, f32::NEG_INFINITY);
                matrix.set(cur, kc, MainSlot::IG, f32::NEG_INFINITY);
            }

            let dl = logsum(
                matrix.get(cur, kp, MainSlot::ML) + profile.transition_score(kp, Transition::md(Lane::Local)),
                d_local_prev + profile.transition_score(kp, Transition::dd(Lane::Local)),
            );
            matrix.set(cur, kc, MainSlot::DL, dl);
            d_local_prev = dl;

            let dg = logsum(
                matrix.get(cur, kp, MainSlot::MG) + profile.transition_score(kp, Transition::md(Lane::Glocal)),
                d_glocal_prev + profile.transition_score(kp, Transition::dd(Lane::Glocal)),
            );
            matrix.set(cur, kc, MainSlot::DG, dg);
            d_glocal_prev = dg;

            e = logsum(e, ml + profile.esc(kc));
            if k == m {
                e = logsum(logsum(e, mg), dg);
            }
        }

        matrix.set_special(cur, SpecialSlot::E, e);
        let j_prev = matrix.special(prev, SpecialSlot::J);
        let j = logsum(j_prev + xsc.get(SpecialState::J, XscSlot::Loop), e + xsc.loop_to_j());
        matrix.set_special(cur, SpecialSlot::J, j);
        let c_prev = matrix.special(prev, SpecialSlot::C);
        let c = logsum(c_prev + xsc.get(SpecialState::C, XscSlot::Loop), e + xsc.move_to_c());
        matrix.set_special(cur, SpecialSlot::C, c);
        let n = matrix.special(cur, SpecialSlot::N);
        let b = logsum(n + xsc.get(SpecialState::N, XscSlot::Move), j + xsc.get(SpecialState::J, XscSlot::Move));
        matrix.set_special(cur, SpecialSlot::B, b);
        matrix.set_special(cur, SpecialSlot::L, b + xsc.enter_local());
        matrix.set_special(cur, SpecialSlot::G, b + xsc.enter_glocal());
    }

    let final_c = matrix.special(SeqPos(l), SpecialSlot::C);
    Ok(final_c + xsc.move_to_c())
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

    #[test]
    fn full_mask_matches_dense_forward() {
        init_logsum();
        let profile = two_node_profile();
        let seq = DigitalSequence::new(4, vec![0, 1]).unwrap();
        let mut mask = SparseMask::new(2);
        mask.push_range(1, 1, 2);
        mask.push_range(2, 1, 2);

        let mut dense = DenseMatrix::new(MatrixKind::Fwd, 2, 2);
        let dense_score = phmm_reference::forward::forward(&profile, &seq, &mut dense).unwrap();
        let sparse_score = sparse_forward(&profile, &seq, &mask).unwrap();
        assert!((dense_score - sparse_score).abs() < 1e-4);
    }

    #[test]
    fn narrowed_mask_never_exceeds_dense_forward() {
        init_logsum();
        let profile = two_node_profile();
        let seq = DigitalSequence::new(4, vec![0, 1]).unwrap();
        let mut mask = SparseMask::new(2);
        mask.push_range(1, 1, 1);
        mask.push_range(2, 2, 2);

        let mut dense = DenseMatrix::new(MatrixKind::Fwd, 2, 2);
        let dense_score = phmm_reference::forward::forward(&profile, &seq, &mut dense).unwrap();
        let sparse_score = sparse_forward(&profile, &seq, &mask).unwrap();
        assert!(sparse_score <= dense_score + 1e-4);
    }

    #[test]
    fn segments_group_consecutive_covered_rows() {
        let mut mask = SparseMask::new(5);
        mask.push_range(1, 1, 1);
        mask.push_range(2, 1, 1);
        mask.push_range(4, 1, 1);
        pretty_assertions::assert_eq!(mask.segments(), vec![(1, 2), (4, 4)]);
    }
}
