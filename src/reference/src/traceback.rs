//! Traceback (spec.md §4.8): reconstructing an alignment path from a filled
//! DP matrix by walking backward and testing near-equality between a cell's
//! stored value and each candidate source-cell-plus-transition-plus-emission
//! sum.
use rand::RngCore;

use phmm_model::prelude::{Lane, ModelPos, Profile, SeqPos, SpecialState, Transition, XscSlot};
use phmm_model::sequence::DigitalSequence;
use phmm_model::trace::{StateKind, Trace, TraceStep};

use crate::errors::{EngineError, EngineResult};
use crate::matrix::{DenseMatrix, MainSlot, SpecialSlot};

/// Absolute tolerance for traceback near-equality comparisons (spec.md
/// §4.8, §9): floating-point re-association makes exact equality fragile.
pub const TRACEBACK_TOLERANCE: f32 = 1e-5;

/// A candidate predecessor of the node currently being traced.
enum Predecessor {
    /// Continue in the main lattice at model node `k`, row `i`, in `lane`,
    /// as an `M`/`I`/`D` node.
    Main { i: usize, k: usize, lane: Lane, state: StateKind },
    /// `B -> M_k`: enters the model from the begin state (row drops by one).
    EnterFromSpecial,
    /// `{M,D} -> E`: exits the model to the end state (same row).
    ExitToSpecial,
    /// A lane-agnostic special-state predecessor (`N`, `J`, `C`).
    /// `consumes` is true for the residue-absorbing loop alternative, false
    /// for the non-emitting move/entry alternative.
    Special { state: StateKind, consumes: bool },
}

struct Candidate {
    score: f32,
    predecessor: Predecessor,
}

/// Enumerates every candidate predecessor of `(state, lane, k)` at row `i`,
/// together with the score each predecessor implies, in the same order the
/// forward recursion combined them (spec.md §9: "evaluate candidate
/// transitions in the same order the forward recursion did, to minimise
/// re-association error").
fn candidates(
    profile: &Profile,
    sequence: &DigitalSequence,
    matrix: &DenseMatrix,
    state: StateKind,
    lane: Option<Lane>,
    k: Option<ModelPos>,
    i: usize,
) -> Vec<Candidate> {
    let mut out = Vec::new();
    match (state, lane, k) {
        (StateKind::M, Some(lane), Some(kc)) if i >= 1 => {
            let kp = ModelPos(kc.get() - 1);
            let prev = SeqPos(i - 1);
            let residue = sequence.residue(SeqPos(i)).unwrap();
            let emission = profile.emissions().match_score(kc, residue);
            out.push(Candidate {
                score: matrix.get(prev, kp, MainSlot::ML) + profile.transition_score(kp, Transition::mm(lane)) + emission,
                predecessor: Predecessor::Main { i: i - 1, k: kp.get(), lane, state: StateKind::M },
            });
            out.push(Candidate {
                score: matrix.get(prev, kp, MainSlot::IL) + profile.transition_score(kp, Transition::im(lane)) + emission,
                predecessor: Predecessor::Main { i: i - 1, k: kp.get(), lane, state: StateKind::I },
            });
            out.push(Candidate {
                score: matrix.get(prev, kp, MainSlot::DL) + profile.transition_score(kp, Transition::dm(lane)) + emission,
                predecessor: Predecessor::Main { i: i - 1, k: kp.get(), lane, state: StateKind::D },
            });
            let entry = match lane {
                Lane::Local => matrix.special(prev, SpecialSlot::L) + profile.bsc(kc),
                Lane::Glocal => matrix.special(prev, SpecialSlot::G) + profile.gm_entry(kc),
            };
            out.push(Candidate { score: entry + emission, predecessor: Predecessor::EnterFromSpecial });
        }
        (StateKind::I, Some(lane), Some(kc)) if i >= 1 => {
            let prev = SeqPos(i - 1);
            let residue = sequence.residue(SeqPos(i)).unwrap();
            let emission = profile.emissions().insert_score(kc, residue);
            out.push(Candidate {
                score: matrix.get(prev, kc, MainSlot::ML) + profile.transition_score(kc, Transition::mi(lane)) + emission,
                predecessor: Predecessor::Main { i: i - 1, k: kc.get(), lane, state: StateKind::M },
            });
            out.push(Candidate {
                score: matrix.get(prev, kc, MainSlot::IL) + profile.transition_score(kc, Transition::ii(lane)) + emission,
                predecessor: Predecessor::Main { i: i - 1, k: kc.get(), lane, state: StateKind::I },
            });
        }
        (StateKind::D, Some(lane), Some(kc)) => {
            let kp = ModelPos(kc.get() - 1);
            out.push(Candidate {
                score: matrix.get(SeqPos(i), kp, MainSlot::ML) + profile.transition_score(kp, Transition::md(lane)),
                predecessor: Predecessor::Main { i, k: kp.get(), lane, state: StateKind::M },
            });
            out.push(Candidate {
                score: matrix.get(SeqPos(i), kp, MainSlot::DL) + profile.transition_score(kp, Transition::dd(lane)),
                predecessor: Predecessor::Main { i, k: kp.get(), lane, state: StateKind::D },
            });
        }
        (StateKind::E, None, None) => {
            for k in 1..=profile.m() {
                let kc = ModelPos(k);
                out.push(Candidate {
                    score: matrix.get(SeqPos(i), kc, MainSlot::ML) + profile.esc(kc),
                    predecessor: Predecessor::Main { i, k, lane: Lane::Local, state: StateKind::M },
                });
            }
            let mc = ModelPos(profile.m());
            out.push(Candidate {
                score: matrix.get(SeqPos(i), mc, MainSlot::MG),
                predecessor: Predecessor::Main { i, k: profile.m(), lane: Lane::Glocal, state: StateKind::M },
            });
            out.push(Candidate {
                score: matrix.get(SeqPos(i), mc, MainSlot::DG),
                predecessor: Predecessor::Main { i, k: profile.m(), lane: Lane::Glocal, state: StateKind::D },
            });
        }
        (StateKind::J, None, None) if i >= 1 => {
            out.push(Candidate {
                score: matrix.special(SeqPos(i - 1), SpecialSlot::J) + profile.xsc().get(SpecialState::J, XscSlot::Loop),
                predecessor: Predecessor::Special { state: StateKind::J, consumes: true },
            });
            out.push(Candidate {
                score: matrix.special(SeqPos(i), SpecialSlot::E) + profile.xsc().loop_to_j(),
                predecessor: Predecessor::ExitToSpecial,
            });
        }
        (StateKind::C, None, None) if i >= 1 => {
            out.push(Candidate {
                score: matrix.special(SeqPos(i - 1), SpecialSlot::C) + profile.xsc().get(SpecialState::C, XscSlot::Loop),
                predecessor: Predecessor::Special { state: StateKind::C, consumes: true },
            });
            out.push(Candidate {
                score: matrix.special(SeqPos(i), SpecialSlot::E) + profile.xsc().move_to_c(),
                predecessor: Predecessor::ExitToSpecial,
            });
        }
        (StateKind::B, None, None) => {
            out.push(Candidate {
                score: matrix.special(SeqPos(i), SpecialSlot::N) + profile.xsc().get(SpecialState::N, XscSlot::Move),
                predecessor: Predecessor::Special { state: StateKind::N, consumes: false },
            });
            out.push(Candidate {
                score: matrix.special(SeqPos(i), SpecialSlot::J) + profile.xsc().get(SpecialState::J, XscSlot::Move),
                predecessor: Predecessor::Special { state: StateKind::J, consumes: false },
            });
        }
        (StateKind::N, None, None) if i >= 1 => {
            out.push(Candidate {
                score: matrix.special(SeqPos(i - 1), SpecialSlot::N) + profile.xsc().get(SpecialState::N, XscSlot::Loop),
                predecessor: Predecessor::Special { state: StateKind::N, consumes: true },
            });
        }
        _ => {}
    }
    out
}

fn main_slot(state: StateKind, lane: Lane) -> MainSlot {
    match (state, lane) {
        (StateKind::M, Lane::Local) => MainSlot::ML,
        (StateKind::M, Lane::Glocal) => MainSlot::MG,
        (StateKind::I, Lane::Local) => MainSlot::IL,
        (StateKind::I, Lane::Glocal) => MainSlot::IG,
        (StateKind::D, Lane::Local) => MainSlot::DL,
        (StateKind::D, Lane::Glocal) => MainSlot::DG,
        _ => unreachable!("main_slot is only called for M/I/D states"),
    }
}

fn special_slot(state: StateKind) -> SpecialSlot {
    match state {
        StateKind::E => SpecialSlot::E,
        StateKind::N => SpecialSlot::N,
        StateKind::J => SpecialSlot::J,
        StateKind::B => SpecialSlot::B,
        StateKind::C => SpecialSlot::C,
        StateKind::M | StateKind::I | StateKind::D => unreachable!("special_slot is only called for special states"),
    }
}

/// The matrix value a `(state, lane, k)` node at row `i` is expected to
/// hold, so [`walk`]'s candidates can be tested against it.
fn target(matrix: &DenseMatrix, state: StateKind, lane: Option<Lane>, k: Option<ModelPos>, i: usize) -> f32 {
    match (lane, k) {
        (Some(lane), Some(kc)) => matrix.get(SeqPos(i), kc, main_slot(state, lane)),
        _ => matrix.special(SeqPos(i), special_slot(state)),
    }
}

/// Walks a filled matrix backward from `(L, C)` to `(0, N)`, calling
/// `choose` at each step to pick one of the enumerated candidates by index.
/// Shared by [`traceback`] (nearest-match selection) and
/// [`stochastic_traceback`] (sampled selection), mirroring how
/// `recursion::run` shares the Viterbi/Forward body by parameterising over
/// the combine operator.
///
/// A node only ever consumes a residue through one specific incoming edge
/// (the `M`/`I` emission, or the `N`/`J`/`C` residue-absorbing loop); since
/// that is only known once the node's own predecessor has been found, the
/// consuming edge's residue index is stamped onto the *already-pushed*
/// step for that node, not onto the newly discovered predecessor.
fn walk(
    profile: &Profile,
    sequence: &DigitalSequence,
    matrix: &DenseMatrix,
    mut choose: impl FnMut(&[Candidate], f32) -> Option<usize>,
) -> EngineResult<Trace> {
    let l = sequence.len();
    let mut steps = vec![TraceStep::special(StateKind::C, None)];

    let mut state = StateKind::C;
    let mut lane = None;
    let mut k: Option<ModelPos> = None;
    let mut i = l;

    while !(state == StateKind::N && i == 0) {
        let cands = candidates(profile, sequence, matrix, state, lane, k, i);
        if cands.is_empty() {
            return Err(EngineError::TracebackInconsistency { i, k: k.map_or(0, ModelPos::get) });
        }
        let tgt = target(matrix, state, lane, k, i);
        let idx = choose(&cands, tgt).ok_or(EngineError::TracebackInconsistency { i, k: k.map_or(0, ModelPos::get) })?;
        let chosen = cands.into_iter().nth(idx).expect("choose returned a valid index");

        match chosen.predecessor {
            Predecessor::Main { i: ni, k: nk, lane: nl, state: ns } => {
                let emits = matches!(ns, StateKind::M | StateKind::I);
                steps.push(TraceStep::node(ns, nl, ModelPos(nk), if emits { Some(SeqPos(ni)) } else { None }));
                i = ni;
                k = Some(ModelPos(nk));
                lane = Some(nl);
                state = ns;
            }
            Predecessor::EnterFromSpecial => {
                i -= 1;
                steps.push(TraceStep::special(StateKind::B, None));
                state = StateKind::B;
                k = None;
                lane = None;
            }
            Predecessor::ExitToSpecial => {
                steps.push(TraceStep::special(StateKind::E, None));
                state = StateKind::E;
                k = None;
                lane = None;
            }
            Predecessor::Special { state: ns, consumes } => {
                if consumes {
                    steps.last_mut().expect("seeded with at least one step").i = Some(SeqPos(i));
                    i -= 1;
                }
                steps.push(TraceStep::special(ns, None));
                state = ns;
                k = None;
                lane = None;
            }
        }
    }

    steps.reverse();
    let mut trace = Trace::new();
    for step in steps {
        trace.push(step);
    }
    Ok(trace)
}

/// Reference optimal traceback: starts at `(L, C)` and walks backward,
/// selecting at each step the candidate whose implied score near-equals the
/// matrix's stored value (spec.md §4.8).
///
/// # Errors
/// [`EngineError::TracebackInconsistency`] if no candidate matches within
/// [`TRACEBACK_TOLERANCE`].
pub fn traceback(profile: &Profile, sequence: &DigitalSequence, matrix: &DenseMatrix) -> EngineResult<Trace> {
    walk(profile, sequence, matrix, |cands, tgt| cands.iter().position(|c| (c.score - tgt).abs() <= TRACEBACK_TOLERANCE))
}

/// Stochastic traceback (spec.md §4.8): same candidate enumeration, but at
/// each step the candidates are log-normalised into a probability vector
/// and sampled from with a caller-provided RNG, ignoring the matrix's
/// stored (max- or sum-combined) value entirely.
///
/// # Errors
/// [`EngineError::TracebackInconsistency`] if a node has no candidates at
/// all (should not happen for a profile/sequence pair that produced the
/// matrix, since every reachable node's value derives from at least one).
pub fn stochastic_traceback(
    profile: &Profile,
    sequence: &DigitalSequence,
    matrix: &DenseMatrix,
    rng: &mut dyn RngCore,
) -> EngineResult<Trace> {
    walk(profile, sequence, matrix, |cands, _tgt| {
        let max = cands.iter().map(|c| c.score).fold(f32::NEG_INFINITY, f32::max);
        let weights: Vec<f32> = cands.iter().map(|c| (c.score - max).exp()).collect();
        let total: f32 = weights.iter().sum();
        let draw = (rng.next_u32() as f64 / u32::MAX as f64) as f32 * total;
        let mut acc = 0.0;
        for (idx, w) in weights.iter().enumerate() {
            acc += w;
            if draw <= acc {
                return Some(idx);
            }
        }
        Some(weights.len() - 1)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use phmm_model::logsum::init_logsum;
    use phmm_model::prelude::*;
    use rand::rngs::mock::StepRng;

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
    fn optimal_traceback_reproduces_viterbi_score() {
        use crate::matrix::MatrixKind;
        use crate::viterbi::viterbi;
        init_logsum();
        let profile = two_node_profile();
        let seq = DigitalSequence::new(4, vec![0, 1]).unwrap();
        let mut vmx = DenseMatrix::new(MatrixKind::Viterbi, 2, 2);
        let total = viterbi(&profile, &seq, &mut vmx).unwrap();

        let trace = traceback(&profile, &seq, &vmx).unwrap();
        trace.validate(2).unwrap();
        let replayed = trace.score(&profile, &seq).unwrap();
        assert!((replayed - total).abs() < 1e-4, "replayed {replayed}, expected {total}");
    }

    #[test]
    fn stochastic_traceback_produces_a_valid_path() {
        use crate::matrix::MatrixKind;
        use crate::forward::forward;
        init_logsum();
        let profile = two_node_profile();
        let seq = DigitalSequence::new(4, vec![0, 1]).unwrap();
        let mut fmx = DenseMatrix::new(MatrixKind::Fwd, 2, 2);
        forward(&profile, &seq, &mut fmx).unwrap();

        let mut rng = StepRng::new(0, u32::MAX as u64 / 3);
        let trace = stochastic_traceback(&profile, &seq, &fmx, &mut rng).unwrap();
        trace.validate(2).unwrap();
    }
}
