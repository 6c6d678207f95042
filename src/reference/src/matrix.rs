//! The dense, type-tagged reference DP matrix (spec.md §3).
use phmm_model::prelude::{ModelPos, SeqPos};

use crate::errors::{EngineError, EngineResult};

/// Which calculation a matrix is currently filled with. Constrains which
/// routines may read/write it (spec.md §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatrixKind {
    Fwd,
    Bck,
    Decoding,
    Viterbi,
    Alignment,
    AscFwdUp,
    AscFwdDown,
    AscBckUp,
    AscBckDown,
    AscDecodeUp,
    AscDecodeDown,
}

impl MatrixKind {
    fn name(self) -> &'static str {
        match self {
            MatrixKind::Fwd => "Fwd",
            MatrixKind::Bck => "Bck",
            MatrixKind::Decoding => "Decoding",
            MatrixKind::Viterbi => "Viterbi",
            MatrixKind::Alignment => "Alignment",
            MatrixKind::AscFwdUp => "AscFwdUp",
            MatrixKind::AscFwdDown => "AscFwdDown",
            MatrixKind::AscBckUp => "AscBckUp",
            MatrixKind::AscBckDown => "AscBckDown",
            MatrixKind::AscDecodeUp => "AscDecodeUp",
            MatrixKind::AscDecodeDown => "AscDecodeDown",
        }
    }
}

/// One of the six per-(i,k) supercell slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum MainSlot {
    ML = 0,
    MG,
    IL,
    IG,
    DL,
    DG,
}
pub const NUM_MAIN_SLOTS: usize = 6;

/// One of the nine per-row special-state slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum SpecialSlot {
    E = 0,
    N,
    J,
    B,
    L,
    G,
    C,
    Jj,
    Cc,
}
pub const NUM_SPECIAL_SLOTS: usize = 9;

/// A dense `(M+2) x (L+2)` reference matrix: six main-state floats per
/// `(i, k)` supercell, plus nine special-state floats per row `i`.
///
/// Reallocatable and reused across DP calls (spec.md §3 "Lifecycle"): `grow`
/// only allocates when the requested shape exceeds the current one, matching
/// the "grow-to-fit is the only allocation operation during a run" resource
/// model (spec.md §5).
#[derive(Debug, Clone)]
pub struct DenseMatrix {
    kind: MatrixKind,
    m: usize,
    l: usize,
    alloc_m: usize,
    alloc_l: usize,
    main: Vec<f32>,
    special: Vec<f32>,
}

impl DenseMatrix {
    #[must_use]
    pub fn new(kind: MatrixKind, m: usize, l: usize) -> Self {
        let mut matrix = Self { kind, m: 0, l: 0, alloc_m: 0, alloc_l: 0, main: Vec::new(), special: Vec::new() };
        matrix.grow(m, l);
        matrix
    }

    #[must_use]
    pub fn kind(&self) -> MatrixKind {
        self.kind
    }

    pub fn set_kind(&mut self, kind: MatrixKind) {
        self.kind = kind;
    }

    #[must_use]
    pub fn m(&self) -> usize {
        self.m
    }

    #[must_use]
    pub fn l(&self) -> usize {
        self.l
    }

    /// Require that this matrix is tagged `expected`.
    ///
    /// # Errors
    /// [`EngineError::WrongMatrixKind`] if the tags differ.
    pub fn require_kind(&self, expected: MatrixKind) -> EngineResult<()> {
        if self.kind != expected {
            return Err(EngineError::WrongMatrixKind { expected: expected.name(), got: self.kind.name() });
        }
        Ok(())
    }

    /// Grow the backing allocation to fit `m`/`l` if needed, and reset the
    /// logical shape; never shrinks the underlying `Vec` capacity.
    pub fn grow(&mut self, m: usize, l: usize) {
        self.m = m;
        self.l = l;
        let needed_main = (m + 2) * (l + 2) * NUM_MAIN_SLOTS;
        let needed_special = (l + 2) * NUM_SPECIAL_SLOTS;
        if m > self.alloc_m || l > self.alloc_l || self.main.len() < needed_main {
            self.alloc_m = self.alloc_m.max(m);
            self.alloc_l = self.alloc_l.max(l);
            self.main.resize((self.alloc_m + 2) * (self.alloc_l + 2) * NUM_MAIN_SLOTS, f32::NEG_INFINITY);
            self.special.resize((self.alloc_l + 2) * NUM_SPECIAL_SLOTS, f32::NEG_INFINITY);
        }
        self.main.fill(f32::NEG_INFINITY);
        self.special.fill(f32::NEG_INFINITY);
    }

    fn main_row_stride(&self) -> usize {
        (self.alloc_m.max(self.m) + 2) * NUM_MAIN_SLOTS
    }

    fn main_offset(&self, i: SeqPos, k: ModelPos, slot: MainSlot) -> usize {
        i.get() * self.main_row_stride() + k.get() * NUM_MAIN_SLOTS + slot as usize
    }

    fn special_offset(&self, i: SeqPos, slot: SpecialSlot) -> usize {
        i.get() * NUM_SPECIAL_SLOTS + slot as usize
    }

    #[must_use]
    pub fn get(&self, i: SeqPos, k: ModelPos, slot: MainSlot) -> f32 {
        self.main[self.main_offset(i, k, slot)]
    }

    pub fn set(&mut self, i: SeqPos, k: ModelPos, slot: MainSlot, value: f32) {
        let off = self.main_offset(i, k, slot);
        self.main[off] = value;
    }

    #[must_use]
    pub fn special(&self, i: SeqPos, slot: SpecialSlot) -> f32 {
        self.special[self.special_offset(i, slot)]
    }

    pub fn set_special(&mut self, i: SeqPos, slot: SpecialSlot, value: f32) {
        let off = self.special_offset(i, slot);
        self.special[off] = value;
    }
}
