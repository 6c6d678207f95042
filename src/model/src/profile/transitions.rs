//! The per-node transition table (spec.md §4.2).
//!
//! For each model node `k`, seven kinds of internal transition exist, each
//! with a local (`L`) and glocal (`G`) copy: `MM`, `MI`, `MD`, `IM`, `II`,
//! `DM`, `DD`. That's the 14-wide row stored at `tsc[k]`.
//!
//! Lane-entry (`L -> M_k^L` and the glocal wing-retracted `G -> M_k^G`) and
//! exit (`M_k^{L,G} -> E`, `D_M^G -> E`) scores are *not* part of this table;
//! they live in [`super::Profile::bsc`]/[`super::Profile::gm_entry`] and
//! [`super::Profile::esc`] respectively, mirroring spec.md's treatment of
//! them as distinct fields.
use std::fmt;

/// Which lane (local or glocal) a transition or emitting state belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lane {
    Local,
    Glocal,
}

impl fmt::Display for Lane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Lane::Local => "L",
            Lane::Glocal => "G",
        })
    }
}

/// One of the 14 per-node transition kinds (7 base kinds x 2 lanes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum Transition {
    MmL = 0,
    MmG,
    MiL,
    MiG,
    MdL,
    MdG,
    ImL,
    ImG,
    IiL,
    IiG,
    DmL,
    DmG,
    DdL,
    DdG,
}

/// Width of the per-node transition row.
pub const NUM_TRANSITIONS: usize = 14;

/// All 14 transition kinds, in table order (matches [`Transition as usize`]).
pub const ALL_TRANSITIONS: [Transition; NUM_TRANSITIONS] = [
    Transition::MmL, Transition::MmG,
    Transition::MiL, Transition::MiG,
    Transition::MdL, Transition::MdG,
    Transition::ImL, Transition::ImG,
    Transition::IiL, Transition::IiG,
    Transition::DmL, Transition::DmG,
    Transition::DdL, Transition::DdG,
];

impl Transition {
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    #[must_use]
    pub fn lane(self) -> Lane {
        match self {
            Transition::MmL | Transition::MiL | Transition::MdL
            | Transition::ImL | Transition::IiL | Transition::DmL | Transition::DdL => Lane::Local,
            _ => Lane::Glocal,
        }
    }

    /// The lane-specific `M -> M` transition.
    #[must_use]
    pub const fn mm(lane: Lane) -> Self {
        match lane {
            Lane::Local => Transition::MmL,
            Lane::Glocal => Transition::MmG,
        }
    }

    #[must_use]
    pub const fn mi(lane: Lane) -> Self {
        match lane {
            Lane::Local => Transition::MiL,
            Lane::Glocal => Transition::MiG,
        }
    }

    #[must_use]
    pub const fn md(lane: Lane) -> Self {
        match lane {
            Lane::Local => Transition::MdL,
            Lane::Glocal => Transition::MdG,
        }
    }

    #[must_use]
    pub const fn im(lane: Lane) -> Self {
        match lane {
            Lane::Local => Transition::ImL,
            Lane::Glocal => Transition::ImG,
        }
    }

    #[must_use]
    pub const fn ii(lane: Lane) -> Self {
        match lane {
            Lane::Local => Transition::IiL,
            Lane::Glocal => Transition::IiG,
        }
    }

    #[must_use]
    pub const fn dm(lane: Lane) -> Self {
        match lane {
            Lane::Local => Transition::DmL,
            Lane::Glocal => Transition::DmG,
        }
    }

    #[must_use]
    pub const fn dd(lane: Lane) -> Self {
        match lane {
            Lane::Local => Transition::DdL,
            Lane::Glocal => Transition::DdG,
        }
    }
}
