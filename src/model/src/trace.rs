//! Traceback paths (spec.md §3 "Trace", §4.8).
use thiserror::Error;

use crate::index::{ModelPos, SeqPos};
use crate::profile::{Lane, Profile, Transition};
use crate::sequence::DigitalSequence;

/// The kind of state visited by one step of a trace. Distinct from
/// [`Transition`], which names an edge; this names a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateKind {
    N,
    B,
    /// Match, insert, or delete at a model node, in lane `lane`.
    M,
    I,
    D,
    E,
    J,
    C,
}

/// One visited node in a trace.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TraceStep {
    pub state: StateKind,
    /// `Some` for `M`/`I`/`D`; `None` for the lane-agnostic special states.
    pub lane: Option<Lane>,
    /// The model node visited, for `M`/`I`/`D`. `None` otherwise.
    pub k: Option<ModelPos>,
    /// The residue consumed at this step, for `M`/`I`/`N`/`C`/`J` when
    /// looping. `None` for non-emitting steps (`B`, `D`, `E`, and the
    /// move-transitions out of `N`/`C`/`J`).
    pub i: Option<SeqPos>,
}

impl TraceStep {
    #[must_use]
    pub fn special(state: StateKind, i: Option<SeqPos>) -> Self {
        debug_assert!(matches!(state, StateKind::N | StateKind::B | StateKind::E | StateKind::J | StateKind::C));
        Self { state, lane: None, k: None, i }
    }

    #[must_use]
    pub fn node(state: StateKind, lane: Lane, k: ModelPos, i: Option<SeqPos>) -> Self {
        debug_assert!(matches!(state, StateKind::M | StateKind::I | StateKind::D));
        Self { state, lane: Some(lane), k: Some(k), i }
    }

    #[must_use]
    pub fn emits(&self) -> bool {
        self.i.is_some()
    }
}

#[derive(Error, Debug, PartialEq)]
pub enum TraceError {
    #[error("empty trace")]
    Empty,

    #[error("trace must begin at N, found {0:?}")]
    BadStart(StateKind),

    #[error("trace must end at C, found {0:?}")]
    BadEnd(StateKind),

    #[error("node index did not advance monotonically: {prev:?} -> {cur:?} at k={k}")]
    NonMonotonicNode { prev: usize, cur: usize, k: usize },

    #[error("residue {0} was emitted more than once")]
    ResidueEmittedTwice(usize),

    #[error("residue {0} was never emitted")]
    ResidueNeverEmitted(usize),

    #[error("no transition score defined between step {from:?} and {to:?}")]
    UnscoredEdge { from: StateKind, to: StateKind },
}

/// An ordered path through the model's implicit state graph, S=N at the
/// start and C at the end (spec.md §4.8: "begins S→N→…, ends …→C→T").
#[derive(Debug, Clone, Default)]
pub struct Trace {
    steps: Vec<TraceStep>,
}

impl Trace {
    #[must_use]
    pub fn new() -> Self {
        Self { steps: Vec::new() }
    }

    pub fn push(&mut self, step: TraceStep) {
        self.steps.push(step);
    }

    #[must_use]
    pub fn steps(&self) -> &[TraceStep] {
        &self.steps
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Checks the structural invariants spec.md §4.8 places on any trace:
    /// starts at N, ends at C, `M`/`D` node indices advance monotonically
    /// within each local/glocal domain run, and every residue `1..=L` is
    /// emitted exactly once, in order.
    ///
    /// # Errors
    /// Returns the first [`TraceError`] found.
    pub fn validate(&self, target_len: usize) -> Result<(), TraceError> {
        let first = self.steps.first().ok_or(TraceError::Empty)?;
        if first.state != StateKind::N {
            return Err(TraceError::BadStart(first.state));
        }
        let last = self.steps.last().ok_or(TraceError::Empty)?;
        if last.state != StateKind::C {
            return Err(TraceError::BadEnd(last.state));
        }

        let mut last_node: Option<usize> = None;
        let mut seen = vec![false; target_len + 1];
        for step in &self.steps {
            if matches!(step.state, StateKind::M | StateKind::D) {
                if let Some(k) = step.k {
                    if let Some(prev) = last_node {
                        if k.get() <= prev {
                            return Err(TraceError::NonMonotonicNode { prev, cur: k.get(), k: k.get() });
                        }
                    }
                    last_node = Some(k.get());
                }
            }
            if let Some(i) = step.i {
                let idx = i.get();
                if idx == 0 || idx > target_len {
                    continue;
                }
                if seen[idx] {
                    return Err(TraceError::ResidueEmittedTwice(idx));
                }
                seen[idx] = true;
            }
        }
        if let Some(missing) = seen.iter().skip(1).position(|&b| !b) {
            return Err(TraceError::ResidueNeverEmitted(missing + 1));
        }
        Ok(())
    }

    /// Recomputes this trace's total log-odds score by replaying its edges
    /// against `profile`, independent of whatever DP routine produced it.
    /// Used to cross-check Viterbi/traceback consistency (spec.md §8 P1/P2).
    ///
    /// # Errors
    /// Returns [`TraceError::UnscoredEdge`] if a consecutive step pair has no
    /// corresponding score in the profile (e.g. an `M -> M` edge whose node
    /// indices do not differ by exactly one).
    pub fn score(&self, profile: &Profile, sequence: &DigitalSequence) -> Result<f32, TraceError> {
        let mut total = 0.0_f32;
        for window in self.steps.windows(2) {
            let (from, to) = (&window[0], &window[1]);
            total += self.edge_score(profile, from, to)?;
            if let Some(i) = to.i {
                if let Ok(residue) = sequence.residue(i) {
                    total += match to.state {
                        StateKind::M => profile.emissions().match_score(to.k.unwrap(), residue),
                        StateKind::I => profile.emissions().insert_score(to.k.unwrap(), residue),
                        _ => 0.0,
                    };
                }
            }
        }
        Ok(total)
    }

    fn edge_score(&self, profile: &Profile, from: &TraceStep, to: &TraceStep) -> Result<f32, TraceError> {
        use StateKind::{B, C, D, E, I, J, M, N};
        let xsc = profile.xsc();
        match (from.state, to.state) {
            (N, N) => Ok(xsc.get(crate::profile::SpecialState::N, crate::profile::XscSlot::Loop)),
            (N, B) => Ok(xsc.get(crate::profile::SpecialState::N, crate::profile::XscSlot::Move)),
            (J, J) => Ok(xsc.get(crate::profile::SpecialState::J, crate::profile::XscSlot::Loop)),
            (J, B) => Ok(xsc.get(crate::profile::SpecialState::J, crate::profile::XscSlot::Move)),
            (C, C) => Ok(xsc.get(crate::profile::SpecialState::C, crate::profile::XscSlot::Loop)),
            (E, J) => Ok(xsc.loop_to_j()),
            (E, C) => Ok(xsc.move_to_c()),
            (B, M) => match to.lane {
                Some(Lane::Local) => Ok(profile.bsc(to.k.unwrap())),
                Some(Lane::Glocal) => Ok(profile.gm_entry(to.k.unwrap())),
                None => Err(TraceError::UnscoredEdge { from: from.state, to: to.state }),
            },
            (M, E) | (D, E) => match from.lane {
                Some(Lane::Local) => Ok(profile.esc(from.k.unwrap())),
                Some(Lane::Glocal) => Ok(0.0), // wing-retracted glocal exit, deterministic once at k=M
                None => Err(TraceError::UnscoredEdge { from: from.state, to: to.state }),
            },
            (M, M) | (M, I) | (M, D) | (I, M) | (I, I) | (D, M) | (D, D) => {
                let lane = from.lane.ok_or(TraceError::UnscoredEdge { from: from.state, to: to.state })?;
                let k = from.k.ok_or(TraceError::UnscoredEdge { from: from.state, to: to.state })?;
                let t = match (from.state, to.state) {
                    (M, M) => Transition::mm(lane),
                    (M, I) => Transition::mi(lane),
                    (M, D) => Transition::md(lane),
                    (I, M) => Transition::im(lane),
                    (I, I) => Transition::ii(lane),
                    (D, M) => Transition::dm(lane),
                    (D, D) => Transition::dd(lane),
                    _ => unreachable!(),
                };
                Ok(profile.transition_score(k, t))
            }
            _ => Err(TraceError::UnscoredEdge { from: from.state, to: to.state }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::{LengthModel, Mode, Multiplicity, SpecialTransitions, Topology};

    fn tiny_profile() -> Profile {
        let m = 2;
        let mut tsc = vec![[f32::NEG_INFINITY; crate::profile::NUM_TRANSITIONS]; m + 1];
        tsc[1][Transition::MmL.index()] = -0.1;
        let bsc = vec![f32::NEG_INFINITY, -0.2, -0.3];
        let esc = vec![f32::NEG_INFINITY, -0.4, -0.5];
        let gm = vec![0.0, 0.0];
        let half = 0.5_f32.ln();
        let xsc = SpecialTransitions::new([
            [half, half],
            [f32::NEG_INFINITY, 0.0],
            [half, half],
            [half, half],
            [half, half],
        ]);
        Profile::from_raw(
            m, 4, tsc, bsc, esc, gm, vec![0.0; (m + 1) * 4], vec![0.0; (m + 1) * 4], xsc,
            Mode::new(Topology::Dual, Multiplicity::Unihit, LengthModel::LengthL),
        ).unwrap()
    }

    #[test]
    fn validates_well_formed_trace() {
        let mut trace = Trace::new();
        trace.push(TraceStep::special(StateKind::N, None));
        trace.push(TraceStep::special(StateKind::B, None));
        trace.push(TraceStep::node(StateKind::M, Lane::Local, ModelPos(1), Some(SeqPos(1))));
        trace.push(TraceStep::node(StateKind::M, Lane::Local, ModelPos(2), Some(SeqPos(2))));
        trace.push(TraceStep::special(StateKind::E, None));
        trace.push(TraceStep::special(StateKind::C, None));
        trace.validate(2).unwrap();
    }

    #[test]
    fn rejects_repeated_residue() {
        let mut trace = Trace::new();
        trace.push(TraceStep::special(StateKind::N, None));
        trace.push(TraceStep::node(StateKind::M, Lane::Local, ModelPos(1), Some(SeqPos(1))));
        trace.push(TraceStep::node(StateKind::M, Lane::Local, ModelPos(2), Some(SeqPos(1))));
        trace.push(TraceStep::special(StateKind::C, None));
        pretty_assertions::assert_eq!(trace.validate(1), Err(TraceError::ResidueEmittedTwice(1)));
    }

    #[test]
    fn scores_a_simple_path() {
        let profile = tiny_profile();
        let seq = DigitalSequence::new(4, vec![0, 1]).unwrap();
        let mut trace = Trace::new();
        trace.push(TraceStep::special(StateKind::N, None));
        trace.push(TraceStep::special(StateKind::B, None));
        trace.push(TraceStep::node(StateKind::M, Lane::Local, ModelPos(1), Some(SeqPos(1))));
        trace.push(TraceStep::node(StateKind::M, Lane::Local, ModelPos(2), Some(SeqPos(2))));
        trace.push(TraceStep::special(StateKind::E, None));
        trace.push(TraceStep::special(StateKind::C, None));
        let score = trace.score(&profile, &seq).unwrap();
        // N->B (move) + B->M1 (bsc) + M1->M2 (tsc) + M2->E (esc) + E->C (move)
        let expected = 0.5_f32.ln() + -0.2 + -0.1 + -0.5 + 0.0;
        assert!(float_cmp::approx_eq!(f32, score, expected, epsilon = 1e-5), "got {score}, expected {expected}");
    }
}
