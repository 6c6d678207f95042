//! Striped memory layout for a production-style DP row (spec.md §3
//! "Checkpointed striped matrix", §9 "Struct-of-arrays striped layout").
//!
//! Position `k in [1..M]` maps onto `Q` vectors of `V` lanes each via
//! `(q, z) = ((k-1) mod Q, (k-1) div Q)`, stored flat as `q * V + z`. This
//! crate has no real SIMD intrinsics to vectorise over (the example corpus
//! carries no `std::simd`/`packed_simd`/`wide` dependency), so the lane
//! dimension here is a pure memory-layout property: every recursion still
//! walks `k` in its natural order, it just writes into this striped index
//! instead of a linear one. The layout itself -- and the fact that a filter
//! row is a single flat allocation reinterpretable at three different
//! element widths (spec.md §9 "two representations of the same matrix") --
//! is what's being modelled, not the vector instructions.
use phmm_model::prelude::ModelPos;

/// Typical 128-bit SIMD register widths for each element size the filter
/// stages use: 16 lanes of `i8`, 8 lanes of `i16`, 4 lanes of `f32`.
pub const LANES_BYTE: usize = 16;
pub const LANES_WORD: usize = 8;
pub const LANES_FLOAT: usize = 4;

/// The `(Q, V)` shape of a striped row for a profile of length `m`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StripeLayout {
    m: usize,
    q: usize,
    v: usize,
}

impl StripeLayout {
    /// `Q = ceil((M-1)/V) + 1`, `Q >= 2` (spec.md §3).
    #[must_use]
    pub fn new(m: usize, v: usize) -> Self {
        let q = (m.saturating_sub(1)).div_ceil(v).max(1) + 1;
        Self { m, q, v }
    }

    #[must_use]
    pub fn m(&self) -> usize {
        self.m
    }

    #[must_use]
    pub fn q(&self) -> usize {
        self.q
    }

    #[must_use]
    pub fn v(&self) -> usize {
        self.v
    }

    /// Total flat length of one state's vector (`Q * V`), always `>= m`.
    #[must_use]
    pub fn len(&self) -> usize {
        self.q * self.v
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `(q, z)` coordinates for model position `k`.
    #[must_use]
    pub fn coords(&self, k: ModelPos) -> (usize, usize) {
        let kk = k.get() - 1;
        (kk % self.q, kk / self.q)
    }

    /// Flat storage offset for model position `k`.
    #[must_use]
    pub fn index(&self, k: ModelPos) -> usize {
        let (q, z) = self.coords(k);
        q * self.v + z
    }

    /// The model position stored at `(q, z)`, or `None` if that slot is
    /// padding (`Q * V` generally overshoots `M`).
    #[must_use]
    pub fn model_pos(&self, q: usize, z: usize) -> Option<ModelPos> {
        let k = z * self.q + q + 1;
        if k <= self.m {
            Some(ModelPos(k))
        } else {
            None
        }
    }
}
