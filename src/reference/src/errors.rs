//! Status/error contract shared by every reference DP routine (spec.md §6-§7).
use thiserror::Error;

/// Data-dependent or contract-violation failures a DP routine can hit.
#[derive(Error, Debug, PartialEq)]
pub enum EngineError {
    #[error("matrix kind mismatch: routine expects {expected:?}, got {got:?}")]
    WrongMatrixKind { expected: &'static str, got: &'static str },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("arithmetic degenerate: all paths have zero probability")]
    ArithmeticDegenerate,

    #[error("traceback inconsistency: no source cell near-equals the stored value at i={i}, k={k}")]
    TracebackInconsistency { i: usize, k: usize },

    #[error("filter overflow: saturating arithmetic exceeded the representable range")]
    FilterOverflow,

    #[error("filter produced no usable result")]
    FilterNoResult,
}

/// The routine-level status contract (spec.md §6): every DP entry point
/// returns one of these instead of throwing, so callers can short-circuit a
/// processing chain without exceptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    MemoryError,
    ArithmeticFailure,
    TracebackFailure,
    FilterNoResult,
    FilterOverflow,
}

impl EngineError {
    /// Maps a data-dependent failure onto its status code. `WrongMatrixKind`
    /// and `InvalidArgument` are caller contract violations (spec.md §7 item
    /// 5), not data-dependent outcomes, and are deliberately left unmapped --
    /// they propagate as a plain `Err`, never silently become a `Status`.
    #[must_use]
    pub fn status(&self) -> Option<Status> {
        match self {
            EngineError::ArithmeticDegenerate => Some(Status::ArithmeticFailure),
            EngineError::TracebackInconsistency { .. } => Some(Status::TracebackFailure),
            EngineError::FilterOverflow => Some(Status::FilterOverflow),
            EngineError::FilterNoResult => Some(Status::FilterNoResult),
            EngineError::WrongMatrixKind { .. } | EngineError::InvalidArgument(_) => None,
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
