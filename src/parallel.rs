//! Fan-out over independent `(profile, sequence)` pairs (spec.md §5:
//! "Parallelism is obtained exclusively at the level of independent
//! (profile, sequence) pairs processed in parallel threads; each thread
//! owns its own matrices, trace, and LogSum table").
//!
//! Shaped after the worker-pool pattern `vcf-fst::run` uses for
//! independent per-file jobs: a sized [`rayon::ThreadPoolBuilder`] pool,
//! `pool.scope` spawning one task per input, each task owning everything
//! it touches so no lock is needed except the final result slot.
use std::sync::Mutex;

use phmm_model::prelude::Profile;
use phmm_model::sequence::DigitalSequence;
use phmm_reference::errors::EngineError;
use phmm_reference::matrix::{DenseMatrix, MatrixKind};

/// The Forward score for one input of a [`run_batch`] call, or the engine
/// error that input produced (spec.md §5: no panic propagates across the
/// pool boundary, a data-dependent failure on one input never aborts the
/// others).
pub type BatchOutcome = Result<f32, EngineError>;

/// Runs Forward for every `(profile, sequence)` pair in `inputs` across a
/// thread pool sized to `threads`, returning one [`BatchOutcome`] per
/// input in the same order. Each task allocates its own [`DenseMatrix`];
/// nothing is shared across threads but the (already logically read-only)
/// `Profile` references themselves (spec.md §5: "Profiles are immutable
/// after build and may be shared by reference among threads").
///
/// # Panics
/// If the underlying `rayon` thread pool fails to build (e.g. `threads ==
/// 0` on a platform that rejects it).
#[must_use]
pub fn run_batch(inputs: &[(&Profile, &DigitalSequence)], threads: usize) -> Vec<BatchOutcome> {
    log::debug!("scoring {} profile/sequence pairs across {} threads", inputs.len(), threads.max(1));
    let pool = rayon::ThreadPoolBuilder::new().num_threads(threads.max(1)).build().expect("thread pool construction with a sane thread count should never fail");

    let results: Mutex<Vec<Option<BatchOutcome>>> = Mutex::new((0..inputs.len()).map(|_| None).collect());

    pool.scope(|scope| {
        for (idx, (profile, sequence)) in inputs.iter().enumerate() {
            let results = &results;
            scope.spawn(move |_| {
                let mut matrix = DenseMatrix::new(MatrixKind::Fwd, profile.m(), sequence.len());
                let outcome = phmm_reference::forward::forward(profile, sequence, &mut matrix);
                if let Some(slot) = results.lock().expect("result mutex is never held across a panic in this module").get_mut(idx) {
                    *slot = Some(outcome);
                }
            });
        }
    });

    results.into_inner().expect("pool.scope joined every task before returning").into_iter().map(|slot| slot.expect("every index was spawned exactly once")).collect()
}
