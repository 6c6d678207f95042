//! `phmm-filter`: the production-shaped counterpart to `phmm-reference`'s
//! dense matrices -- a checkpointed, striped-vector Forward/Backward that
//! runs in `O(sqrt(L))` memory ([`checkpointed`], [`schedule`], [`layout`],
//! [`row`], [`probspace`]), the saturating-integer SSV/MSV/Viterbi filter
//! stages that decide whether a (profile, sequence) pair is even worth
//! running the heavier DP on ([`filters`]), and the sparse DP surface the
//! filter's posterior pass hands downstream ([`sparse`]).
pub mod checkpointed;
pub mod filters;
pub mod layout;
pub mod probspace;
pub mod row;
pub mod schedule;
pub mod sparse;

pub mod prelude {
    pub use crate::checkpointed::{backward_checkpointed, bytes_per_row, rows_for_ram_budget, CheckpointedForward, DEFAULT_POSTERIOR_THRESHOLD};
    pub use crate::filters::{msv_filter, ssv_filter, viterbi_filter, FilterOutcome};
    pub use crate::layout::{StripeLayout, LANES_BYTE, LANES_FLOAT, LANES_WORD};
    pub use crate::row::{FilterSpecial, StripedRow};
    pub use crate::schedule::{CheckpointSchedule, RowSlot};
    pub use crate::sparse::{restrict_decoding_to_mask, sparse_forward, KRange, SparseMask};
}
