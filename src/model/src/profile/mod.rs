//! The `Profile` value object (spec.md §3): an immutable-after-build
//! position-specific scoring model over `M` consensus positions.
pub mod mode;
pub mod special;
pub mod transitions;

pub use mode::{LengthModel, Mode, Multiplicity, Topology};
pub use special::{SpecialState, SpecialTransitions, XscSlot};
pub use transitions::{Lane, Transition, ALL_TRANSITIONS, NUM_TRANSITIONS};

use thiserror::Error;

use crate::index::ModelPos;
use crate::logsum::logsum_exact;

#[derive(Error, Debug, PartialEq)]
pub enum ProfileError {
    #[error("tsc row length mismatch: expected {expected} rows (0..=M), got {got}")]
    TscLengthMismatch { expected: usize, got: usize },

    #[error("tsc[0] must be -inf for every transition (no node 0); found finite entry {0:?}={1}")]
    NonInfiniteRootTransition(Transition, f32),

    #[error("tsc[M] must be -inf for every transition (I_M does not exist and there is no node M+1); found finite entry {0:?}={1}")]
    NonInfiniteFinalTransition(Transition, f32),

    #[error("bsc/esc/gm length mismatch: {what} expected length {expected}, got {got}")]
    LengthMismatch { what: &'static str, expected: usize, got: usize },

    #[error("emission table length mismatch: {what} expected length {expected}, got {got}")]
    EmissionLengthMismatch { what: &'static str, expected: usize, got: usize },

    #[error("{state} LOOP+MOVE is not a valid distribution (logsum = {logsum}, expected ~0 within 1e-3)")]
    InvalidLengthModel { state: SpecialState, logsum: f32 },
}

/// Dense match/insert emission scores, `rsc[x][k]` in spec.md's notation,
/// stored row-major by `k` for cache-friendly per-row DP access.
#[derive(Debug, Clone)]
pub struct Emissions {
    alphabet_size: usize,
    match_scores: Vec<f32>,
    insert_scores: Vec<f32>,
}

impl Emissions {
    fn offset(&self, k: ModelPos, x: u8) -> usize {
        k.get() * self.alphabet_size + usize::from(x)
    }

    #[must_use]
    pub fn match_score(&self, k: ModelPos, x: u8) -> f32 {
        self.match_scores[self.offset(k, x)]
    }

    #[must_use]
    pub fn insert_score(&self, k: ModelPos, x: u8) -> f32 {
        self.insert_scores[self.offset(k, x)]
    }
}

/// The immutable profile HMM parameter set.
#[derive(Debug, Clone)]
pub struct Profile {
    m: usize,
    alphabet_size: usize,
    tsc: Vec<[f32; NUM_TRANSITIONS]>,
    emissions: Emissions,
    bsc: Vec<f32>,
    esc: Vec<f32>,
    /// `gm[k-1]` = the wing-retracted `G -> M_k` entry score, for `k in 1..=M`
    /// (spec.md §4.2/§9: "off-by-one storage of G->M_k").
    gm: Vec<f32>,
    xsc: SpecialTransitions,
    mode: Mode,
}

#[allow(clippy::too_many_arguments)]
impl Profile {
    /// Build and validate a profile from already-computed log-odds tables.
    /// Building a profile *from a multiple sequence alignment* is out of
    /// scope (spec.md §1); this constructor only assembles and checks
    /// already-scored tables, which is what every DP routine here consumes.
    ///
    /// # Errors
    /// Returns [`ProfileError`] if any of spec.md §3's structural invariants
    /// are violated.
    pub fn from_raw(
        m: usize,
        alphabet_size: usize,
        tsc: Vec<[f32; NUM_TRANSITIONS]>,
        bsc: Vec<f32>,
        esc: Vec<f32>,
        gm: Vec<f32>,
        match_scores: Vec<f32>,
        insert_scores: Vec<f32>,
        xsc: SpecialTransitions,
        mode: Mode,
    ) -> Result<Self, ProfileError> {
        if tsc.len() != m + 1 {
            return Err(ProfileError::TscLengthMismatch { expected: m + 1, got: tsc.len() });
        }
        for (idx, t) in ALL_TRANSITIONS.iter().enumerate() {
            let v = tsc[0][idx];
            if v != f32::NEG_INFINITY {
                return Err(ProfileError::NonInfiniteRootTransition(*t, v));
            }
        }
        for (idx, t) in ALL_TRANSITIONS.iter().enumerate() {
            let v = tsc[m][idx];
            if v != f32::NEG_INFINITY {
                return Err(ProfileError::NonInfiniteFinalTransition(*t, v));
            }
        }
        if bsc.len() != m + 1 {
            return Err(ProfileError::LengthMismatch { what: "bsc", expected: m + 1, got: bsc.len() });
        }
        if esc.len() != m + 1 {
            return Err(ProfileError::LengthMismatch { what: "esc", expected: m + 1, got: esc.len() });
        }
        if gm.len() != m {
            return Err(ProfileError::LengthMismatch { what: "gm", expected: m, got: gm.len() });
        }
        let expected_emission_len = (m + 1) * alphabet_size;
        if match_scores.len() != expected_emission_len {
            return Err(ProfileError::EmissionLengthMismatch { what: "match_scores", expected: expected_emission_len, got: match_scores.len() });
        }
        if insert_scores.len() != expected_emission_len {
            return Err(ProfileError::EmissionLengthMismatch { what: "insert_scores", expected: expected_emission_len, got: insert_scores.len() });
        }

        for state in [SpecialState::N, SpecialState::C, SpecialState::J, SpecialState::E] {
            let total = logsum_exact(xsc.get(state, XscSlot::Loop), xsc.get(state, XscSlot::Move));
            if (total).abs() > 1e-3 {
                return Err(ProfileError::InvalidLengthModel { state, logsum: total });
            }
        }

        Ok(Self {
            m,
            alphabet_size,
            tsc,
            emissions: Emissions { alphabet_size, match_scores, insert_scores },
            bsc,
            esc,
            gm,
            xsc,
            mode,
        })
    }

    #[must_use]
    pub fn m(&self) -> usize {
        self.m
    }

    #[must_use]
    pub fn alphabet_size(&self) -> usize {
        self.alphabet_size
    }

    #[must_use]
    pub fn mode(&self) -> Mode {
        self.mode
    }

    #[must_use]
    pub fn xsc(&self) -> &SpecialTransitions {
        &self.xsc
    }

    #[must_use]
    pub fn emissions(&self) -> &Emissions {
        &self.emissions
    }

    /// `tsc[k][t]`.
    #[must_use]
    pub fn transition_score(&self, k: ModelPos, t: Transition) -> f32 {
        self.tsc[k.get()][t.index()]
    }

    /// Whether transition `t` leaving node `k` carries any probability mass.
    /// Used by MEG (spec.md §4.7: "Forbidden transitions contribute -inf")
    /// and available to any other DP routine that wants an explicit legality
    /// query instead of relying on `-inf` propagating through `logsum`/`max`.
    #[must_use]
    pub fn transition_allowed(&self, k: ModelPos, t: Transition) -> bool {
        self.transition_score(k, t).is_finite()
    }

    /// `bsc[k]`: the uniform local-entry (`L -> M_k^L`) score.
    #[must_use]
    pub fn bsc(&self, k: ModelPos) -> f32 {
        self.bsc[k.get()]
    }

    /// `esc[k]`: the local-exit (`M_k^L -> E`) score.
    #[must_use]
    pub fn esc(&self, k: ModelPos) -> f32 {
        self.esc[k.get()]
    }

    /// The wing-retracted glocal entry score for `M_k^G`, `1 <= k <= M`,
    /// read from the off-by-one-indexed `gm` table (spec.md §4.2/§9).
    #[must_use]
    pub fn gm_entry(&self, k: ModelPos) -> f32 {
        debug_assert!(k.get() >= 1 && k.get() <= self.m);
        self.gm[k.get() - 1]
    }
}
