//! `phmm-model`: the profile HMM value types shared by every DP crate in
//! this workspace -- [`logsum`] arithmetic, [`index`] newtypes, the
//! [`sequence`] and [`profile::Profile`] data model, [`trace`] paths, and
//! the [`null_model`] used to report bit scores.
pub mod index;
pub mod logsum;
pub mod null_model;
pub mod profile;
pub mod sequence;
pub mod trace;

pub mod prelude {
    pub use crate::index::{ModelPos, SeqPos};
    pub use crate::logsum::{init_logsum, logsum, logsum_exact};
    pub use crate::null_model::NullModel;
    pub use crate::profile::{
        Emissions, Lane, LengthModel, Mode, Multiplicity, Profile, ProfileError, SpecialState,
        SpecialTransitions, Topology, Transition, XscSlot, NUM_TRANSITIONS,
    };
    pub use crate::sequence::DigitalSequence;
    pub use crate::trace::{StateKind, Trace, TraceStep};
}
