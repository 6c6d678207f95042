//! `phmmcore`: umbrella crate wiring together the profile HMM data model
//! ([`phmm_model`]), the dense reference DP routines ([`phmm_reference`]),
//! the checkpointed/striped production path and filter stages
//! ([`phmm_filter`]), and engine configuration ([`phmm_config`]).
//!
//! Re-exports each member crate's prelude so a caller depending only on
//! `phmmcore` gets the whole surface; [`parallel`] is the one piece of
//! logic that lives here rather than in a member crate, since fanning
//! independent `(profile, sequence)` pairs out across a thread pool is a
//! whole-workspace concern, not any one DP routine's.
pub mod parallel;

/// Initialize process-wide logging for an embedder of this crate; thin
/// re-export so callers don't need a direct `logger` dependency just to
/// turn verbosity up.
pub fn init_logger(verbosity: &u8) {
    logger::init_logger(verbosity);
}

pub mod model {
    pub use phmm_model::prelude::*;
}

pub mod reference {
    pub use phmm_reference::prelude::*;
}

pub mod filter {
    pub use phmm_filter::prelude::*;
}

pub mod config {
    pub use phmm_config::prelude::*;
}

pub mod prelude {
    pub use phmm_config::prelude::*;
    pub use phmm_filter::prelude::*;
    pub use phmm_model::prelude::*;
    pub use phmm_reference::prelude::*;

    pub use crate::parallel::{run_batch, BatchOutcome};
}
