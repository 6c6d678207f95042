//! `phmm-reference`: dense, type-tagged reference dynamic-programming
//! matrices and the DP routines that fill them -- [`viterbi`], [`forward`],
//! [`backward`], posterior [`decoding`], gamma-centroid [`meg`] alignment,
//! [`traceback`], anchor-set-constrained [`asc`] Forward/Backward/Decoding,
//! and brute-force [`enumerate`]ration for correctness checks against an
//! "enumerable" profile's total probability mass.
//!
//! Every routine here is the intentionally unoptimized, dense-matrix,
//! easy-to-audit counterpart to the checkpointed/filtered DP in
//! `phmm-filter`: it exists to be correct and legible, not fast, and is what
//! the filtered engine's own test suite checks itself against.
pub mod asc;
pub mod backward;
pub mod decoding;
pub mod enumerate;
pub mod errors;
pub mod forward;
pub mod matrix;
pub mod meg;
mod recursion;
pub mod traceback;
pub mod viterbi;

pub mod prelude {
    pub use crate::asc::{asc_backward, asc_decode, asc_forward, Anchor};
    pub use crate::backward::backward;
    pub use crate::decoding::decode;
    pub use crate::enumerate::{enumerate_forward_mass, mute_path_probability};
    pub use crate::errors::{EngineError, EngineResult, Status};
    pub use crate::forward::forward;
    pub use crate::matrix::{DenseMatrix, MainSlot, MatrixKind, SpecialSlot};
    pub use crate::meg::meg;
    pub use crate::traceback::{stochastic_traceback, traceback, TRACEBACK_TOLERANCE};
    pub use crate::viterbi::viterbi;
}
