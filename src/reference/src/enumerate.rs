//! Brute-force Forward enumeration (spec.md §8, properties P5/P6 and
//! scenarios S2/S5): sums `exp(Forward(profile, x))` over every sequence `x`
//! up to a given length over a small alphabet, for checking that an
//! "enumerable" profile's Forward scores integrate to (approximately) one
//! probability mass unit.
use phmm_model::prelude::Profile;
use phmm_model::sequence::DigitalSequence;

use crate::errors::EngineResult;
use crate::forward::forward;
use crate::matrix::{DenseMatrix, MatrixKind};

/// Sums `exp(Forward(profile, x))` over every digital sequence of length
/// `0..=max_len` drawn from `profile`'s alphabet. Cost is
/// `O(alphabet_size^max_len)`; callers are expected to keep `max_len` and
/// the alphabet small (spec.md's enumerable-profile scenarios use `M <= 8`
/// over 2-4 symbols, `max_len` around `2M-1`).
///
/// # Errors
/// Propagates any [`crate::errors::EngineError`] a `forward` call returns.
pub fn enumerate_forward_mass(profile: &Profile, max_len: usize) -> EngineResult<f64> {
    let alphabet_size = profile.alphabet_size();
    let mut matrix = DenseMatrix::new(MatrixKind::Fwd, profile.m(), max_len);
    let mut total = 0.0_f64;
    let mut residues = Vec::with_capacity(max_len);

    total += walk(profile, &mut residues, alphabet_size, max_len, &mut matrix)?;
    Ok(total)
}

fn walk(profile: &Profile, residues: &mut Vec<u8>, alphabet_size: usize, max_len: usize, matrix: &mut DenseMatrix) -> EngineResult<f64> {
    let sequence = DigitalSequence::new(alphabet_size, residues.clone()).expect("residues built from 0..alphabet_size are always in range");
    let score = forward(profile, &sequence, matrix)?;
    let mut total = if score.is_finite() { f64::from(score).exp() } else { 0.0 };

    if residues.len() < max_len {
        for code in 0..alphabet_size {
            residues.push(code as u8);
            total += walk(profile, residues, alphabet_size, max_len, matrix)?;
            residues.pop();
        }
    }
    Ok(total)
}

/// The mute-path probability `G -> D_1 -> .. -> D_M -> E`, the glocal path
/// that emits nothing: every consensus position deleted. Spec.md's
/// enumeration property (P5) adds this in separately from the enumerated
/// sum since it is a length-0-sequence path through the glocal wing that
/// some Forward formulations fold into the `L=0` row and others compute
/// directly from the delete-chain transitions.
#[must_use]
pub fn mute_path_probability(profile: &Profile) -> f64 {
    use phmm_model::prelude::{Lane, ModelPos, Transition};

    let m = profile.m();
    if m == 0 {
        return 0.0;
    }
    let mut score = profile.gm_entry(ModelPos(1));
    for k in 1..m {
        score += profile.transition_score(ModelPos(k), Transition::dd(Lane::Glocal));
    }
    // D_M^G -> E is a free transition, contributing esc only for local; the
    // glocal wing always reaches E once M consensus positions are behind it.
    f64::from(score).exp()
}
